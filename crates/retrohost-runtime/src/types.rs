use libretro_host::{BindError, CoreError, EnvironmentConfig};
use retrohost_vfs::VfsError;

use crate::manifest::ManifestError;

/// Seconds of gameplay kept in the rewind history.
pub const DEFAULT_REWIND_SECONDS: f64 = 60.0;

/// Largest game image read into memory. Matches what a `Vec` can address.
pub const MAX_BUFFER_LEN: u64 = isize::MAX as u64;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Try the in-memory strategies before handing out paths.
    pub prefer_vfs: bool,
    /// Keep "zip" in a core's extension list. Most cores crash on archives
    /// they claim to support, so this is opt-in.
    pub allow_archive_extension: bool,
    pub rewind_seconds: f64,
    /// Files larger than this are never read into memory.
    pub max_buffer_len: u64,
    pub environment: EnvironmentConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefer_vfs: false,
            allow_archive_extension: false,
            rewind_seconds: DEFAULT_REWIND_SECONDS,
            max_buffer_len: MAX_BUFFER_LEN,
            environment: EnvironmentConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("content belongs to game client {requested}, not {actual}")]
    WrongCore { requested: String, actual: String },
    #[error("no loading strategy could present {0} to the core")]
    NoStrategy(String),
    #[error("no game is playing")]
    NotPlaying,
    #[error(transparent)]
    SessionBusy(#[from] BindError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Failure to materialize content for an in-memory strategy.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Vfs(#[from] VfsError),
    #[error("{0} is empty")]
    EmptyFile(String),
    #[error("{path} is {len} bytes, over the {limit} byte limit")]
    TooLarge { path: String, len: u64, limit: u64 },
    #[error("read {read} of {expected} bytes from {path}")]
    ShortRead {
        path: String,
        read: usize,
        expected: u64,
    },
}

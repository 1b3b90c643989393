mod manifest;
mod session;
mod strategy;
mod timing;
mod types;

pub use manifest::{AddonManifest, GAME_CLIENT_POINT, MANIFEST_FILE, ManifestError};
pub use session::{ContentRequest, Session, SessionState};
pub use strategy::{
    Candidate, DEFAULT_ORDER, LoadingStrategy, Resolved, Resolver, Source, read_content,
    strategy_order,
};
pub use timing::{FramePacer, PlaybackClock};
pub use types::{DEFAULT_REWIND_SECONDS, MAX_BUFFER_LEN, ReadError, SessionConfig, SessionError};

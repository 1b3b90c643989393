use crate::{
    core::{CoreBinary, GameDescriptor, SystemAvInfo, SystemInfo},
    dynamic::CoreLoader,
    raw,
};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Extension used for archive containers.
pub const ARCHIVE_EXTENSION: &str = ".zip";

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("failed to load core image {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("core image does not export {name}: {source}")]
    MissingSymbol {
        name: &'static str,
        #[source]
        source: libloading::Error,
    },
    #[error("API version error: host is at version {host}, {core_name} is at version {core}")]
    ProtocolVersion {
        host: u32,
        core: u32,
        core_name: String,
    },
    #[error("failed to release core image: {0}")]
    Unload(#[source] libloading::Error),
    #[error("{0}")]
    Loader(String),
    #[error("serialize size was not queried after the game was loaded")]
    SerializeSizeUnknown,
    #[error("state buffer is {actual} bytes, core expects {expected}")]
    SerializeSizeMismatch { expected: usize, actual: usize },
    #[error("core claimed it could serialize, but failed")]
    SerializeFailed,
    #[error("core failed to restore a serialized state")]
    UnserializeFailed,
}

/// What a core declared about itself, normalized for lookups.
///
/// Populated once per core load and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreCapabilities {
    pub library_name: String,
    pub library_version: String,
    /// Lower-case extensions with a leading dot (".nes"), without duplicates.
    pub extensions: Vec<String>,
    /// The core accepts content as an in-memory buffer (`!need_fullpath`).
    pub allows_vfs: bool,
    /// Content inside an archive must not be extracted for this core.
    pub blocks_extraction: bool,
}

impl CoreCapabilities {
    /// Normalizes the metadata reported by the core.
    ///
    /// The archive extension is dropped unless `allow_archive_extension` is
    /// set: most cores crash when handed archives they claim to support.
    pub fn from_system_info(info: &SystemInfo, allow_archive_extension: bool) -> Self {
        Self {
            library_name: info
                .library_name
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            library_version: info
                .library_version
                .clone()
                .unwrap_or_else(|| "v0.0".to_string()),
            extensions: parse_extensions(
                info.valid_extensions.as_deref().unwrap_or_default(),
                allow_archive_extension,
            ),
            allows_vfs: !info.need_fullpath,
            blocks_extraction: info.block_extract,
        }
    }

    /// Checks an extension (with or without the leading dot) against the
    /// core's list. Cores that declare no extensions accept everything.
    pub fn is_extension_valid(&self, ext: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let ext = normalize_extension(ext);
        self.extensions.iter().any(|known| *known == ext)
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

fn parse_extensions(list: &str, allow_archive_extension: bool) -> Vec<String> {
    let mut extensions: Vec<String> = Vec::new();
    for ext in list.split('|').map(str::trim).filter(|ext| !ext.is_empty()) {
        let ext = normalize_extension(ext);
        if ext == ARCHIVE_EXTENSION && !allow_archive_extension {
            continue;
        }
        if !extensions.contains(&ext) {
            extensions.push(ext);
        }
    }
    extensions
}

/// A bound libretro core.
///
/// Owns the core image for its whole lifetime and tracks how far the core
/// got through its lifecycle, so teardown only undoes what was done.
pub struct CoreHandle {
    binary: Option<Box<dyn CoreBinary>>,
    path: PathBuf,
    capabilities: CoreCapabilities,
    inited: bool,
    game_loaded: bool,
    serialize_size: Option<usize>,
}

impl CoreHandle {
    /// Loads the core image at `path` and validates it.
    pub fn load(
        loader: &dyn CoreLoader,
        path: &Path,
        allow_archive_extension: bool,
    ) -> Result<Self, CoreError> {
        let binary = loader.load(path).inspect_err(|err| {
            error!("error loading core {}: {err}", path.display());
        })?;
        Self::from_binary(binary, path, allow_archive_extension)
    }

    /// Wraps an already opened binary.
    ///
    /// A core built against a different API version is released before the
    /// error is returned.
    pub fn from_binary(
        binary: Box<dyn CoreBinary>,
        path: &Path,
        allow_archive_extension: bool,
    ) -> Result<Self, CoreError> {
        let info = binary.system_info();
        let capabilities = CoreCapabilities::from_system_info(&info, allow_archive_extension);
        info!(
            "loaded {} core at version {}",
            capabilities.library_name, capabilities.library_version
        );

        let version = binary.api_version();
        if version != raw::RETRO_API_VERSION {
            error!(
                "API version error: host is at version {}, {} is at version {version}",
                raw::RETRO_API_VERSION,
                capabilities.library_name
            );
            if let Err(err) = binary.close() {
                error!("error unloading core: {err}");
            }
            return Err(CoreError::ProtocolVersion {
                host: raw::RETRO_API_VERSION,
                core: version,
                core_name: capabilities.library_name,
            });
        }

        info!("core library: {}", path.display());
        info!(
            "valid extensions: {}",
            info.valid_extensions.as_deref().unwrap_or("-")
        );
        info!(
            "allow VFS: {}, block extract: {}",
            if capabilities.allows_vfs { "yes" } else { "no" },
            if capabilities.blocks_extraction { "yes" } else { "no" },
        );

        Ok(Self {
            binary: Some(binary),
            path: path.to_path_buf(),
            capabilities,
            inited: false,
            game_loaded: false,
            serialize_size: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capabilities(&self) -> &CoreCapabilities {
        &self.capabilities
    }

    pub fn is_inited(&self) -> bool {
        self.inited
    }

    pub fn is_game_loaded(&self) -> bool {
        self.game_loaded
    }

    fn binary(&mut self) -> &mut dyn CoreBinary {
        // Only `teardown` takes the binary, and it consumes or drops `self`.
        match self.binary.as_deref_mut() {
            Some(binary) => binary,
            None => unreachable!("core binary used after teardown"),
        }
    }

    /// Installs the environment callback and calls `retro_init`.
    ///
    /// Runs at most once per core load; later calls are ignored.
    pub fn init(&mut self, environment: raw::retro_environment_t) {
        if self.inited {
            return;
        }
        let binary = self.binary();
        binary.set_environment(environment);
        binary.init();
        self.inited = true;
    }

    pub fn load_game(&mut self, game: &GameDescriptor) -> bool {
        let loaded = self.binary().load_game(game);
        if loaded {
            self.game_loaded = true;
            self.serialize_size = None;
        }
        loaded
    }

    /// Unloads the current game, if any.
    pub fn unload_game(&mut self) {
        if self.game_loaded {
            self.binary().unload_game();
            self.game_loaded = false;
            self.serialize_size = None;
        }
    }

    pub fn install_callbacks(&mut self, callbacks: &crate::routing::Callbacks) {
        let binary = self.binary();
        binary.set_video_refresh(callbacks.video_refresh);
        binary.set_audio_sample(callbacks.audio_sample);
        binary.set_audio_sample_batch(callbacks.audio_sample_batch);
        binary.set_input_state(callbacks.input_state);
        binary.set_input_poll(callbacks.input_poll);
    }

    pub fn system_av_info(&mut self) -> SystemAvInfo {
        self.binary().system_av_info()
    }

    pub fn run(&mut self) {
        self.binary().run();
    }

    pub fn reset(&mut self) {
        self.binary().reset();
    }

    pub fn region(&mut self) -> u32 {
        self.binary().region()
    }

    pub fn set_controller_port_device(&mut self, port: u32, device: u32) {
        self.binary().set_controller_port_device(port, device);
    }

    /// Queries and pins the serialized state size for the loaded game.
    pub fn query_serialize_size(&mut self) -> usize {
        let size = self.binary().serialize_size();
        self.serialize_size = Some(size);
        size
    }

    pub fn serialize_size(&self) -> Option<usize> {
        self.serialize_size
    }

    /// Serializes the core into `dst`, which must be exactly the pinned size.
    pub fn serialize(&mut self, dst: &mut [u8]) -> Result<(), CoreError> {
        self.check_state_len(dst.len())?;
        if self.binary().serialize(dst) {
            Ok(())
        } else {
            Err(CoreError::SerializeFailed)
        }
    }

    pub fn unserialize(&mut self, src: &[u8]) -> Result<(), CoreError> {
        self.check_state_len(src.len())?;
        if self.binary().unserialize(src) {
            Ok(())
        } else {
            Err(CoreError::UnserializeFailed)
        }
    }

    fn check_state_len(&self, actual: usize) -> Result<(), CoreError> {
        match self.serialize_size {
            None => Err(CoreError::SerializeSizeUnknown),
            Some(expected) if expected != actual => {
                Err(CoreError::SerializeSizeMismatch { expected, actual })
            }
            Some(_) => Ok(()),
        }
    }

    /// Unloads the game, deinitializes the core and releases the image.
    ///
    /// Teardown always runs to completion; only the release of the image can
    /// fail, and that failure is returned for the caller to report.
    pub fn unload(mut self) -> Result<(), CoreError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), CoreError> {
        let Some(mut binary) = self.binary.take() else {
            return Ok(());
        };
        if self.game_loaded {
            binary.unload_game();
            self.game_loaded = false;
        }
        if self.inited {
            binary.deinit();
            self.inited = false;
        }
        binary.close()
    }
}

impl Drop for CoreHandle {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            warn!("error unloading core {}: {err}", self.path.display());
        }
    }
}

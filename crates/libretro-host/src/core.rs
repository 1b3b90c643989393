use crate::raw;
use std::{
    ffi::{CStr, c_char},
    fmt,
    path::{Path, PathBuf},
};

/// Host-side view of a libretro game client.
///
/// Every method forwards to the matching `retro_*` entry point. The trait is
/// the seam between the session logic and the loaded image: [`DynamicCore`]
/// implements it for shared libraries opened at runtime, while tests can
/// implement it directly in Rust.
///
/// Calls are ordering sensitive in the same way the C interface is: the
/// environment callback must be installed before [`init`](Self::init),
/// [`system_av_info`](Self::system_av_info) and the serialization calls are
/// only meaningful after a successful [`load_game`](Self::load_game).
///
/// [`DynamicCore`]: crate::DynamicCore
pub trait CoreBinary: Send {
    /// Reports the libretro API version the core was built against.
    fn api_version(&self) -> u32;

    /// Returns the static metadata of the core.
    fn system_info(&self) -> SystemInfo;

    fn set_environment(&mut self, callback: raw::retro_environment_t);
    fn set_video_refresh(&mut self, callback: raw::retro_video_refresh_t);
    fn set_audio_sample(&mut self, callback: raw::retro_audio_sample_t);
    fn set_audio_sample_batch(&mut self, callback: raw::retro_audio_sample_batch_t);
    fn set_input_poll(&mut self, callback: raw::retro_input_poll_t);
    fn set_input_state(&mut self, callback: raw::retro_input_state_t);

    fn init(&mut self);
    fn deinit(&mut self);

    /// Hands content to the core. Returns `false` when the core rejects it.
    fn load_game(&mut self, game: &GameDescriptor) -> bool;
    fn unload_game(&mut self);

    /// Runs exactly one frame of emulation.
    fn run(&mut self);
    fn reset(&mut self);

    fn system_av_info(&mut self) -> SystemAvInfo;

    /// Size of a serialized state in bytes. Zero means unsupported.
    fn serialize_size(&mut self) -> usize;
    fn serialize(&mut self, dst: &mut [u8]) -> bool;
    fn unserialize(&mut self, src: &[u8]) -> bool;

    fn region(&mut self) -> u32;
    fn set_controller_port_device(&mut self, port: u32, device: u32);

    /// Releases the underlying image.
    ///
    /// Consumes the binary; failures are reported but the binary is gone
    /// either way.
    fn close(self: Box<Self>) -> Result<(), crate::CoreError> {
        Ok(())
    }
}

/// Metadata reported by `retro_get_system_info`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemInfo {
    pub library_name: Option<String>,
    pub library_version: Option<String>,
    /// Pipe-delimited list of file extensions, as reported by the core.
    pub valid_extensions: Option<String>,
    /// The core wants a path on disk instead of an in-memory buffer.
    pub need_fullpath: bool,
    /// Archives must not be extracted before being handed to the core.
    pub block_extract: bool,
}

impl SystemInfo {
    pub fn new(library_name: impl Into<String>, library_version: impl Into<String>) -> Self {
        Self {
            library_name: Some(library_name.into()),
            library_version: Some(library_version.into()),
            ..Self::default()
        }
    }

    pub fn with_extensions(mut self, extensions: impl Into<String>) -> Self {
        self.valid_extensions = Some(extensions.into());
        self
    }

    pub fn need_fullpath(mut self, need: bool) -> Self {
        self.need_fullpath = need;
        self
    }

    pub fn block_extract(mut self, block: bool) -> Self {
        self.block_extract = block;
        self
    }

    /// Copies the strings out of a raw structure filled in by a core.
    ///
    /// # Safety
    /// Every non-null string pointer in `info` must reference a valid,
    /// NUL-terminated string.
    pub unsafe fn from_raw(info: &raw::retro_system_info) -> Self {
        unsafe {
            Self {
                library_name: c_str_to_string(info.library_name),
                library_version: c_str_to_string(info.library_version),
                valid_extensions: c_str_to_string(info.valid_extensions),
                need_fullpath: info.need_fullpath,
                block_extract: info.block_extract,
            }
        }
    }
}

/// Combined AV geometry/timing data.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemAvInfo {
    pub geometry: GameGeometry,
    pub timing: SystemTiming,
}

impl From<raw::retro_system_av_info> for SystemAvInfo {
    fn from(info: raw::retro_system_av_info) -> Self {
        Self {
            geometry: GameGeometry {
                base_width: info.geometry.base_width,
                base_height: info.geometry.base_height,
                max_width: info.geometry.max_width,
                max_height: info.geometry.max_height,
                aspect_ratio: info.geometry.aspect_ratio,
            },
            timing: SystemTiming {
                fps: info.timing.fps,
                sample_rate: info.timing.sample_rate,
            },
        }
    }
}

/// Matches `retro_game_geometry`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GameGeometry {
    pub base_width: u32,
    pub base_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub aspect_ratio: f32,
}

/// Matches `retro_system_timing`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemTiming {
    pub fps: f64,
    pub sample_rate: f64,
}

impl SystemTiming {
    /// Convenience constructor for a 60 FPS system with the provided sample rate.
    pub fn ntsc(sample_rate: f64) -> Self {
        Self {
            fps: 60.0,
            sample_rate,
        }
    }
}

/// Content handed to `retro_load_game`: either a path the core opens itself,
/// or the complete file contents.
///
/// A buffer descriptor owns its bytes. After a successful load the session
/// keeps the descriptor alive until the game is unloaded, since cores are
/// allowed to keep pointing into the buffer.
#[derive(Clone, PartialEq, Eq)]
pub enum GameDescriptor {
    Path(PathBuf),
    Buffer(Vec<u8>),
}

impl GameDescriptor {
    pub fn path(&self) -> Option<&Path> {
        match self {
            GameDescriptor::Path(path) => Some(path),
            GameDescriptor::Buffer(_) => None,
        }
    }

    pub fn data(&self) -> Option<&[u8]> {
        match self {
            GameDescriptor::Path(_) => None,
            GameDescriptor::Buffer(data) => Some(data),
        }
    }
}

impl fmt::Debug for GameDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameDescriptor::Path(path) => f.debug_tuple("Path").field(path).finish(),
            GameDescriptor::Buffer(data) => write!(f, "Buffer({} bytes)", data.len()),
        }
    }
}

/// Television standard reported by `retro_get_region`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Ntsc,
    Pal,
}

impl Region {
    /// Anything other than NTSC or PAL is treated as unknown.
    pub fn from_raw(region: u32) -> Option<Self> {
        match region {
            raw::RETRO_REGION_NTSC => Some(Region::Ntsc),
            raw::RETRO_REGION_PAL => Some(Region::Pal),
            _ => None,
        }
    }
}

/// Pixel formats a host can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 5 bit color, high bit must be zero. The libretro default.
    #[default]
    Rgb1555,
    /// 8 bit color, high byte is ignored.
    Xrgb8888,
    Rgb565,
}

impl PixelFormat {
    pub fn from_raw(format: raw::retro_pixel_format) -> Option<Self> {
        match format {
            raw::RETRO_PIXEL_FORMAT_0RGB1555 => Some(PixelFormat::Rgb1555),
            raw::RETRO_PIXEL_FORMAT_XRGB8888 => Some(PixelFormat::Xrgb8888),
            raw::RETRO_PIXEL_FORMAT_RGB565 => Some(PixelFormat::Rgb565),
            _ => None,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb1555 | PixelFormat::Rgb565 => 2,
            PixelFormat::Xrgb8888 => 4,
        }
    }
}

/// Number of controller ports the host routes input for.
pub const MAX_PLAYERS: u32 = 8;

/// Device classes that may be attached to a controller port.
///
/// Cores overflow internal buffers when handed devices they do not know, so
/// anything outside this list is refused.
pub fn is_known_device(device: u32) -> bool {
    device <= raw::RETRO_DEVICE_ANALOG
        || device == raw::RETRO_DEVICE_JOYPAD_MULTITAP
        || device == raw::RETRO_DEVICE_LIGHTGUN_SUPER_SCOPE
        || device == raw::RETRO_DEVICE_LIGHTGUN_JUSTIFIER
        || device == raw::RETRO_DEVICE_LIGHTGUN_JUSTIFIERS
}

pub(crate) unsafe fn c_str_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }

    Some(
        unsafe { CStr::from_ptr(ptr) }
            .to_string_lossy()
            .into_owned(),
    )
}

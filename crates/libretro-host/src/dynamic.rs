use crate::{
    CoreError,
    core::{CoreBinary, GameDescriptor, SystemAvInfo, SystemInfo},
    raw::{self, entry},
};
use libloading::Library;
use std::{
    ffi::{CString, c_void},
    path::Path,
    ptr,
};
use tracing::{debug, warn};

/// Produces [`CoreBinary`] instances from a library path.
pub trait CoreLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Box<dyn CoreBinary>, CoreError>;
}

/// Opens libretro cores as shared libraries.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicLoader;

impl CoreLoader for DynamicLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn CoreBinary>, CoreError> {
        Ok(Box::new(DynamicCore::open(path)?))
    }
}

#[derive(Clone, Copy)]
struct EntryPoints {
    set_environment: entry::SetEnvironment,
    set_video_refresh: entry::SetVideoRefresh,
    set_audio_sample: entry::SetAudioSample,
    set_audio_sample_batch: entry::SetAudioSampleBatch,
    set_input_poll: entry::SetInputPoll,
    set_input_state: entry::SetInputState,
    init: entry::Init,
    deinit: entry::Deinit,
    api_version: entry::ApiVersion,
    get_system_info: entry::GetSystemInfo,
    get_system_av_info: entry::GetSystemAvInfo,
    set_controller_port_device: entry::SetControllerPortDevice,
    reset: entry::Reset,
    run: entry::Run,
    serialize_size: entry::SerializeSize,
    serialize: entry::Serialize,
    unserialize: entry::Unserialize,
    load_game: entry::LoadGame,
    unload_game: entry::UnloadGame,
    get_region: entry::GetRegion,
}

impl EntryPoints {
    /// # Safety
    /// The library must be a libretro core whose exports match the signatures
    /// in [`raw::entry`].
    unsafe fn resolve(library: &Library) -> Result<Self, CoreError> {
        unsafe {
            Ok(Self {
                set_environment: symbol(library, "retro_set_environment")?,
                set_video_refresh: symbol(library, "retro_set_video_refresh")?,
                set_audio_sample: symbol(library, "retro_set_audio_sample")?,
                set_audio_sample_batch: symbol(library, "retro_set_audio_sample_batch")?,
                set_input_poll: symbol(library, "retro_set_input_poll")?,
                set_input_state: symbol(library, "retro_set_input_state")?,
                init: symbol(library, "retro_init")?,
                deinit: symbol(library, "retro_deinit")?,
                api_version: symbol(library, "retro_api_version")?,
                get_system_info: symbol(library, "retro_get_system_info")?,
                get_system_av_info: symbol(library, "retro_get_system_av_info")?,
                set_controller_port_device: symbol(library, "retro_set_controller_port_device")?,
                reset: symbol(library, "retro_reset")?,
                run: symbol(library, "retro_run")?,
                serialize_size: symbol(library, "retro_serialize_size")?,
                serialize: symbol(library, "retro_serialize")?,
                unserialize: symbol(library, "retro_unserialize")?,
                load_game: symbol(library, "retro_load_game")?,
                unload_game: symbol(library, "retro_unload_game")?,
                get_region: symbol(library, "retro_get_region")?,
            })
        }
    }
}

unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T, CoreError> {
    let symbol = unsafe { library.get::<T>(name.as_bytes()) }
        .map_err(|source| CoreError::MissingSymbol { name, source })?;
    Ok(*symbol)
}

/// A libretro core loaded from a shared library.
///
/// The resolved entry points are plain function pointers copied out of the
/// library; they stay valid for as long as `library` is alive, which is the
/// lifetime of this value.
pub struct DynamicCore {
    entry: EntryPoints,
    library: Library,
}

impl DynamicCore {
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        // SAFETY: loading a library runs its initializers; libretro cores are
        // expected to have none with observable side effects.
        let library = unsafe { Library::new(path) }.map_err(|source| CoreError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let entry = unsafe { EntryPoints::resolve(&library)? };
        debug!("resolved libretro entry points from {}", path.display());
        Ok(Self { entry, library })
    }
}

impl CoreBinary for DynamicCore {
    fn api_version(&self) -> u32 {
        unsafe { (self.entry.api_version)() }
    }

    fn system_info(&self) -> SystemInfo {
        let mut info = raw::retro_system_info::default();
        unsafe {
            (self.entry.get_system_info)(&mut info);
            SystemInfo::from_raw(&info)
        }
    }

    fn set_environment(&mut self, callback: raw::retro_environment_t) {
        unsafe { (self.entry.set_environment)(callback) }
    }

    fn set_video_refresh(&mut self, callback: raw::retro_video_refresh_t) {
        unsafe { (self.entry.set_video_refresh)(callback) }
    }

    fn set_audio_sample(&mut self, callback: raw::retro_audio_sample_t) {
        unsafe { (self.entry.set_audio_sample)(callback) }
    }

    fn set_audio_sample_batch(&mut self, callback: raw::retro_audio_sample_batch_t) {
        unsafe { (self.entry.set_audio_sample_batch)(callback) }
    }

    fn set_input_poll(&mut self, callback: raw::retro_input_poll_t) {
        unsafe { (self.entry.set_input_poll)(callback) }
    }

    fn set_input_state(&mut self, callback: raw::retro_input_state_t) {
        unsafe { (self.entry.set_input_state)(callback) }
    }

    fn init(&mut self) {
        unsafe { (self.entry.init)() }
    }

    fn deinit(&mut self) {
        unsafe { (self.entry.deinit)() }
    }

    fn load_game(&mut self, game: &GameDescriptor) -> bool {
        let path = match game.path().map(path_to_c_string).transpose() {
            Ok(path) => path,
            Err(()) => {
                warn!("game path contains an interior NUL byte; not passing it to the core");
                return false;
            }
        };

        let data = game.data().unwrap_or_default();
        let info = raw::retro_game_info {
            path: path.as_ref().map_or(ptr::null(), |p| p.as_ptr()),
            data: if data.is_empty() {
                ptr::null()
            } else {
                data.as_ptr() as *const c_void
            },
            size: data.len(),
            meta: ptr::null(),
        };

        unsafe { (self.entry.load_game)(&info) }
    }

    fn unload_game(&mut self) {
        unsafe { (self.entry.unload_game)() }
    }

    fn run(&mut self) {
        unsafe { (self.entry.run)() }
    }

    fn reset(&mut self) {
        unsafe { (self.entry.reset)() }
    }

    fn system_av_info(&mut self) -> SystemAvInfo {
        let mut info = raw::retro_system_av_info::default();
        unsafe { (self.entry.get_system_av_info)(&mut info) };
        info.into()
    }

    fn serialize_size(&mut self) -> usize {
        unsafe { (self.entry.serialize_size)() }
    }

    fn serialize(&mut self, dst: &mut [u8]) -> bool {
        unsafe { (self.entry.serialize)(dst.as_mut_ptr() as *mut c_void, dst.len()) }
    }

    fn unserialize(&mut self, src: &[u8]) -> bool {
        unsafe { (self.entry.unserialize)(src.as_ptr() as *const c_void, src.len()) }
    }

    fn region(&mut self) -> u32 {
        unsafe { (self.entry.get_region)() }
    }

    fn set_controller_port_device(&mut self, port: u32, device: u32) {
        unsafe { (self.entry.set_controller_port_device)(port, device) }
    }

    fn close(self: Box<Self>) -> Result<(), CoreError> {
        let DynamicCore { library, .. } = *self;
        library.close().map_err(CoreError::Unload)
    }
}

fn path_to_c_string(path: &Path) -> Result<CString, ()> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        CString::new(path.as_os_str().as_bytes()).map_err(|_| ())
    }
    #[cfg(not(unix))]
    {
        CString::new(path.to_string_lossy().into_owned()).map_err(|_| ())
    }
}

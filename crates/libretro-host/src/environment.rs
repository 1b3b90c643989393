//! Answers the environment queries a core issues through `retro_environment_t`.

use crate::{
    core::{PixelFormat, c_str_to_string},
    raw,
};
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashMap},
    ffi::{CString, c_void},
    fmt,
    path::PathBuf,
    ptr,
    sync::Arc,
};
use tracing::{debug, error, info, warn};

/// Receives everything a running core produces or asks the player for.
///
/// All methods are called synchronously from inside a core call, usually on
/// the frame thread, and must return promptly. The session driving the core
/// is locked for the duration, so implementations must not call back into it.
pub trait Frontend: Send + Sync {
    fn video_frame(&self, frame: VideoFrame<'_>);

    /// Interleaved stereo samples (`L, R, L, R, ...`).
    fn audio_frames(&self, samples: &[i16]);

    fn input_state(&self, port: u32, device: u32, index: u32, id: u32) -> i16;

    fn set_pixel_format(&self, format: PixelFormat);

    fn set_keyboard_callback(&self, callback: Option<KeyboardCallback>);

    fn show_message(&self, _message: &str, _frames: u32) {}

    /// The core asked to be shut down. Players should stop playback if this
    /// core is the one driving them.
    fn shutdown(&self) {}
}

/// A frame submitted through `retro_video_refresh_t`.
#[derive(Debug, Clone, Copy)]
pub enum VideoFrame<'a> {
    Pixels {
        data: &'a [u8],
        width: u32,
        height: u32,
        pitch: usize,
    },
    /// Repeat the previous frame.
    Duplicate,
}

/// Keyboard event callback registered by a core.
#[derive(Clone, Copy)]
pub struct KeyboardCallback(unsafe extern "C" fn(bool, u32, u32, u16));

impl KeyboardCallback {
    pub fn from_raw(callback: raw::retro_keyboard_event_t) -> Option<Self> {
        callback.map(Self)
    }

    /// Notifies the core of a key event.
    ///
    /// `character` is the UTF-32 text of the key, `modifiers` a set of
    /// `RETROKMOD` bits.
    pub fn send(&self, down: bool, keycode: u32, character: u32, modifiers: u16) {
        unsafe { (self.0)(down, keycode, character, modifiers) }
    }
}

impl PartialEq for KeyboardCallback {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::fn_addr_eq(self.0, other.0)
    }
}

impl Eq for KeyboardCallback {}

impl fmt::Debug for KeyboardCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyboardCallback({:p})", self.0 as *const ())
    }
}

/// Host policy answered to environment queries.
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// `true` asks cores to keep overscan, `false` to crop it away.
    pub overscan: bool,
    /// Whether a null frame may be passed to the video callback.
    pub can_dupe: bool,
    /// Directory for BIOS images and similar files. `None` lets the core
    /// pick its own default.
    pub system_directory: Option<PathBuf>,
    /// Values answered to `GET_VARIABLE`.
    pub variables: BTreeMap<String, String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            overscan: false,
            can_dupe: true,
            system_directory: None,
            variables: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvironmentError {
    #[error("environment query {cmd}: no data")]
    NullPayload { cmd: u32 },
    #[error("environment query {cmd}: unknown command")]
    UnknownCommand { cmd: u32 },
    #[error("invalid pixel format: {0}")]
    UnsupportedPixelFormat(u32),
    #[error("invalid performance level: {0}")]
    InvalidPerformanceLevel(u32),
}

/// A variable a core declared through `SET_VARIABLES`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDeclaration {
    pub key: String,
    pub description: Option<String>,
}

/// An input bind a core described through `SET_INPUT_DESCRIPTORS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDescriptor {
    pub port: u32,
    pub device: u32,
    pub index: u32,
    pub id: u32,
    pub description: String,
}

#[derive(Debug, Default)]
struct EnvironmentState {
    pixel_format: PixelFormat,
    rotation: u32,
    performance_level: Option<u32>,
    keyboard: Option<KeyboardCallback>,
    declared_variables: Vec<VariableDeclaration>,
    input_descriptors: Vec<InputDescriptor>,
    shutdown_requested: bool,
}

/// Host services for one session.
pub struct Environment {
    config: EnvironmentConfig,
    frontend: Arc<dyn Frontend>,
    // Pointers into these strings are handed to the core, so they live as
    // long as the environment and are never mutated.
    system_directory: Option<CString>,
    variables: HashMap<String, CString>,
    state: Mutex<EnvironmentState>,
}

impl Environment {
    pub fn new(config: EnvironmentConfig, frontend: Arc<dyn Frontend>) -> Self {
        let system_directory = config
            .system_directory
            .as_ref()
            .and_then(|dir| CString::new(dir.to_string_lossy().into_owned()).ok());
        let variables = config
            .variables
            .iter()
            .filter_map(|(key, value)| {
                CString::new(value.as_str())
                    .ok()
                    .map(|value| (key.clone(), value))
            })
            .collect();

        Self {
            config,
            frontend,
            system_directory,
            variables,
            state: Mutex::new(EnvironmentState::default()),
        }
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn frontend(&self) -> &Arc<dyn Frontend> {
        &self.frontend
    }

    /// Restores the defaults a core expects before `retro_init`: the libretro
    /// default pixel format and no keyboard callback.
    pub fn reset_defaults(&self) {
        {
            let mut state = self.state.lock();
            state.pixel_format = PixelFormat::default();
            state.keyboard = None;
            state.shutdown_requested = false;
        }
        self.frontend.set_pixel_format(PixelFormat::default());
        self.frontend.set_keyboard_callback(None);
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.state.lock().pixel_format
    }

    /// Screen rotation in degrees, counter-clockwise.
    pub fn rotation_degrees(&self) -> u32 {
        self.state.lock().rotation * 90
    }

    pub fn performance_level(&self) -> Option<u32> {
        self.state.lock().performance_level
    }

    pub fn keyboard_callback(&self) -> Option<KeyboardCallback> {
        self.state.lock().keyboard
    }

    pub fn declared_variables(&self) -> Vec<VariableDeclaration> {
        self.state.lock().declared_variables.clone()
    }

    pub fn input_descriptors(&self) -> Vec<InputDescriptor> {
        self.state.lock().input_descriptors.clone()
    }

    pub fn shutdown_requested(&self) -> bool {
        self.state.lock().shutdown_requested
    }

    /// Handles one environment query.
    ///
    /// # Safety
    /// `data` must be null or point to the payload type libretro documents
    /// for `cmd`. Arrays must be terminated the way the header describes.
    pub unsafe fn dispatch(&self, cmd: u32, data: *mut c_void) -> Result<(), EnvironmentError> {
        // SHUTDOWN carries no payload; GET_SYSTEM_DIRECTORY writes through it.
        if data.is_null()
            && cmd != raw::RETRO_ENVIRONMENT_SHUTDOWN
            && cmd != raw::RETRO_ENVIRONMENT_GET_SYSTEM_DIRECTORY
        {
            return Err(EnvironmentError::NullPayload { cmd });
        }

        unsafe {
            match cmd {
                raw::RETRO_ENVIRONMENT_GET_OVERSCAN => {
                    *(data as *mut bool) = self.config.overscan;
                    info!(
                        "environment: {}",
                        if self.config.overscan {
                            "use overscan"
                        } else {
                            "crop away overscan"
                        }
                    );
                }
                raw::RETRO_ENVIRONMENT_GET_CAN_DUPE => {
                    *(data as *mut bool) = self.config.can_dupe;
                    info!(
                        "environment: frame duping is {}",
                        if self.config.can_dupe { "enabled" } else { "disabled" }
                    );
                }
                raw::RETRO_ENVIRONMENT_GET_VARIABLE => {
                    self.get_variable(&mut *(data as *mut raw::retro_variable));
                }
                raw::RETRO_ENVIRONMENT_SET_VARIABLES => {
                    self.set_variables(data as *const raw::retro_variable)?;
                }
                raw::RETRO_ENVIRONMENT_SET_MESSAGE => {
                    let msg = &*(data as *const raw::retro_message);
                    if let Some(text) = c_str_to_string(msg.msg)
                        && msg.frames > 0
                    {
                        info!("environment: display msg \"{text}\" for {} frames", msg.frames);
                        self.frontend.show_message(&text, msg.frames);
                    }
                }
                raw::RETRO_ENVIRONMENT_SET_ROTATION => {
                    let rotation = *(data as *const u32);
                    if rotation > 3 {
                        error!("environment: invalid rotation {rotation}, ignored");
                    } else {
                        info!("environment: set screen rotation to {} degrees", rotation * 90);
                        self.state.lock().rotation = rotation;
                    }
                }
                raw::RETRO_ENVIRONMENT_SHUTDOWN => {
                    info!("environment: game signaled shutdown event");
                    self.state.lock().shutdown_requested = true;
                    self.frontend.shutdown();
                }
                raw::RETRO_ENVIRONMENT_SET_PERFORMANCE_LEVEL => {
                    let level = *(data as *const u32);
                    match level {
                        0..=3 => info!("environment: performance hint: {level}"),
                        4 => info!("environment: performance hint: high-end desktop required"),
                        _ => return Err(EnvironmentError::InvalidPerformanceLevel(level)),
                    }
                    self.state.lock().performance_level = Some(level);
                }
                raw::RETRO_ENVIRONMENT_GET_SYSTEM_DIRECTORY => {
                    if data.is_null() {
                        warn!("environment: system directory query without an out pointer");
                        return Ok(());
                    }
                    let dir = self
                        .system_directory
                        .as_ref()
                        .map_or(ptr::null(), |dir| dir.as_ptr());
                    *(data as *mut *const std::ffi::c_char) = dir;
                    match &self.system_directory {
                        Some(dir) => info!("environment: system directory {dir:?}"),
                        None => info!("environment: no system directory given to core"),
                    }
                }
                raw::RETRO_ENVIRONMENT_SET_PIXEL_FORMAT => {
                    let raw_format = *(data as *const raw::retro_pixel_format);
                    let format = PixelFormat::from_raw(raw_format)
                        .ok_or(EnvironmentError::UnsupportedPixelFormat(raw_format))?;
                    info!("environment: set pixel format: {format:?}");
                    self.state.lock().pixel_format = format;
                    self.frontend.set_pixel_format(format);
                }
                raw::RETRO_ENVIRONMENT_SET_INPUT_DESCRIPTORS => {
                    self.set_input_descriptors(data as *const raw::retro_input_descriptor)?;
                }
                raw::RETRO_ENVIRONMENT_SET_KEYBOARD_CALLBACK => {
                    let callback = &*(data as *const raw::retro_keyboard_callback);
                    if let Some(callback) = KeyboardCallback::from_raw(callback.callback) {
                        info!("environment: set keyboard callback");
                        self.state.lock().keyboard = Some(callback);
                        self.frontend.set_keyboard_callback(Some(callback));
                    }
                }
                _ => return Err(EnvironmentError::UnknownCommand { cmd }),
            }
        }

        Ok(())
    }

    unsafe fn get_variable(&self, var: &mut raw::retro_variable) {
        let Some(key) = (unsafe { c_str_to_string(var.key) }) else {
            var.value = ptr::null();
            error!("environment: no variable given");
            return;
        };

        match self.variables.get(&key) {
            Some(value) => {
                var.value = value.as_ptr();
                info!("environment: variable {key} set to {value:?}");
            }
            None => {
                var.value = ptr::null();
                debug!("environment: undefined variable {key}");
            }
        }
    }

    unsafe fn set_variables(
        &self,
        mut vars: *const raw::retro_variable,
    ) -> Result<(), EnvironmentError> {
        let mut declared = Vec::new();
        unsafe {
            while let Some(key) = c_str_to_string((*vars).key) {
                let description = c_str_to_string((*vars).value);
                match &description {
                    Some(description) => info!("environment: notified of var {key} ({description})"),
                    None => warn!("environment: var {key} has no description"),
                }
                declared.push(VariableDeclaration { key, description });
                vars = vars.add(1);
            }
        }

        if declared.is_empty() {
            error!("environment: no variables given");
        }
        self.state.lock().declared_variables = declared;
        Ok(())
    }

    unsafe fn set_input_descriptors(
        &self,
        mut descriptor: *const raw::retro_input_descriptor,
    ) -> Result<(), EnvironmentError> {
        let mut descriptors = Vec::new();
        unsafe {
            while let Some(description) = c_str_to_string((*descriptor).description) {
                let d = &*descriptor;
                info!(
                    "environment: notified of input {description} (port={}, device={}, index={}, id={})",
                    d.port, d.device, d.index, d.id
                );
                descriptors.push(InputDescriptor {
                    port: d.port,
                    device: d.device,
                    index: d.index,
                    id: d.id,
                    description,
                });
                descriptor = descriptor.add(1);
            }
        }

        if descriptors.is_empty() {
            warn!("environment: no input descriptors given");
        }
        self.state.lock().input_descriptors = descriptors;
        Ok(())
    }
}

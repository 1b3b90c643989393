//! The subset of `libretro.h` a host needs to drive a game client.
//!
//! Layouts match the C header (`#[repr(C)]`) so pointers to these structures
//! can be exchanged with a core directly.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_void};

pub const RETRO_API_VERSION: u32 = 1;

pub const RETRO_DEVICE_TYPE_SHIFT: u32 = 8;
pub const RETRO_DEVICE_MASK: u32 = (1 << RETRO_DEVICE_TYPE_SHIFT) - 1;

pub const fn retro_device_subclass(base: u32, id: u32) -> u32 {
    ((id + 1) << RETRO_DEVICE_TYPE_SHIFT) | base
}

pub const RETRO_DEVICE_NONE: u32 = 0;
pub const RETRO_DEVICE_JOYPAD: u32 = 1;
pub const RETRO_DEVICE_MOUSE: u32 = 2;
pub const RETRO_DEVICE_KEYBOARD: u32 = 3;
pub const RETRO_DEVICE_LIGHTGUN: u32 = 4;
pub const RETRO_DEVICE_ANALOG: u32 = 5;

pub const RETRO_DEVICE_JOYPAD_MULTITAP: u32 = retro_device_subclass(RETRO_DEVICE_JOYPAD, 0);
pub const RETRO_DEVICE_LIGHTGUN_SUPER_SCOPE: u32 = retro_device_subclass(RETRO_DEVICE_LIGHTGUN, 0);
pub const RETRO_DEVICE_LIGHTGUN_JUSTIFIER: u32 = retro_device_subclass(RETRO_DEVICE_LIGHTGUN, 1);
pub const RETRO_DEVICE_LIGHTGUN_JUSTIFIERS: u32 = retro_device_subclass(RETRO_DEVICE_LIGHTGUN, 2);

pub const RETRO_DEVICE_ID_JOYPAD_B: u32 = 0;
pub const RETRO_DEVICE_ID_JOYPAD_A: u32 = 8;

pub const RETRO_REGION_NTSC: u32 = 0;
pub const RETRO_REGION_PAL: u32 = 1;

pub const RETRO_ENVIRONMENT_SET_ROTATION: u32 = 1;
pub const RETRO_ENVIRONMENT_GET_OVERSCAN: u32 = 2;
pub const RETRO_ENVIRONMENT_GET_CAN_DUPE: u32 = 3;
pub const RETRO_ENVIRONMENT_SET_MESSAGE: u32 = 6;
pub const RETRO_ENVIRONMENT_SHUTDOWN: u32 = 7;
pub const RETRO_ENVIRONMENT_SET_PERFORMANCE_LEVEL: u32 = 8;
pub const RETRO_ENVIRONMENT_GET_SYSTEM_DIRECTORY: u32 = 9;
pub const RETRO_ENVIRONMENT_SET_PIXEL_FORMAT: u32 = 10;
pub const RETRO_ENVIRONMENT_SET_INPUT_DESCRIPTORS: u32 = 11;
pub const RETRO_ENVIRONMENT_SET_KEYBOARD_CALLBACK: u32 = 12;
pub const RETRO_ENVIRONMENT_GET_VARIABLE: u32 = 15;
pub const RETRO_ENVIRONMENT_SET_VARIABLES: u32 = 16;

pub type retro_pixel_format = u32;
pub const RETRO_PIXEL_FORMAT_0RGB1555: retro_pixel_format = 0;
pub const RETRO_PIXEL_FORMAT_XRGB8888: retro_pixel_format = 1;
pub const RETRO_PIXEL_FORMAT_RGB565: retro_pixel_format = 2;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct retro_system_info {
    pub library_name: *const c_char,
    pub library_version: *const c_char,
    pub valid_extensions: *const c_char,
    pub need_fullpath: bool,
    pub block_extract: bool,
}

impl Default for retro_system_info {
    fn default() -> Self {
        Self {
            library_name: std::ptr::null(),
            library_version: std::ptr::null(),
            valid_extensions: std::ptr::null(),
            need_fullpath: false,
            block_extract: false,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct retro_game_geometry {
    pub base_width: u32,
    pub base_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub aspect_ratio: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct retro_system_timing {
    pub fps: f64,
    pub sample_rate: f64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct retro_system_av_info {
    pub geometry: retro_game_geometry,
    pub timing: retro_system_timing,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct retro_game_info {
    pub path: *const c_char,
    pub data: *const c_void,
    pub size: usize,
    pub meta: *const c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct retro_variable {
    pub key: *const c_char,
    pub value: *const c_char,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct retro_message {
    pub msg: *const c_char,
    pub frames: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct retro_input_descriptor {
    pub port: u32,
    pub device: u32,
    pub index: u32,
    pub id: u32,
    pub description: *const c_char,
}

pub type retro_keyboard_event_t =
    Option<unsafe extern "C" fn(down: bool, keycode: u32, character: u32, key_modifiers: u16)>;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct retro_keyboard_callback {
    pub callback: retro_keyboard_event_t,
}

pub type retro_environment_t = Option<unsafe extern "C" fn(cmd: u32, data: *mut c_void) -> bool>;
pub type retro_video_refresh_t =
    Option<unsafe extern "C" fn(data: *const c_void, width: u32, height: u32, pitch: usize)>;
pub type retro_audio_sample_t = Option<unsafe extern "C" fn(left: i16, right: i16)>;
pub type retro_audio_sample_batch_t =
    Option<unsafe extern "C" fn(data: *const i16, frames: usize) -> usize>;
pub type retro_input_poll_t = Option<unsafe extern "C" fn()>;
pub type retro_input_state_t =
    Option<unsafe extern "C" fn(port: u32, device: u32, index: u32, id: u32) -> i16>;

/// Entry point signatures exported by every libretro core.
pub mod entry {
    use super::*;

    pub type SetEnvironment = unsafe extern "C" fn(retro_environment_t);
    pub type SetVideoRefresh = unsafe extern "C" fn(retro_video_refresh_t);
    pub type SetAudioSample = unsafe extern "C" fn(retro_audio_sample_t);
    pub type SetAudioSampleBatch = unsafe extern "C" fn(retro_audio_sample_batch_t);
    pub type SetInputPoll = unsafe extern "C" fn(retro_input_poll_t);
    pub type SetInputState = unsafe extern "C" fn(retro_input_state_t);
    pub type Init = unsafe extern "C" fn();
    pub type Deinit = unsafe extern "C" fn();
    pub type ApiVersion = unsafe extern "C" fn() -> u32;
    pub type GetSystemInfo = unsafe extern "C" fn(*mut retro_system_info);
    pub type GetSystemAvInfo = unsafe extern "C" fn(*mut retro_system_av_info);
    pub type SetControllerPortDevice = unsafe extern "C" fn(port: u32, device: u32);
    pub type Reset = unsafe extern "C" fn();
    pub type Run = unsafe extern "C" fn();
    pub type SerializeSize = unsafe extern "C" fn() -> usize;
    pub type Serialize = unsafe extern "C" fn(data: *mut c_void, size: usize) -> bool;
    pub type Unserialize = unsafe extern "C" fn(data: *const c_void, size: usize) -> bool;
    pub type LoadGame = unsafe extern "C" fn(game: *const retro_game_info) -> bool;
    pub type UnloadGame = unsafe extern "C" fn();
    pub type GetRegion = unsafe extern "C" fn() -> u32;
}

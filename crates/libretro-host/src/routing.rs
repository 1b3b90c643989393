//! Process-wide routing of libretro callbacks.
//!
//! libretro callbacks carry no user-data pointer, so the host can only route
//! them to one [`Environment`] at a time. A session binds its environment
//! before initializing its core and unbinds when it closes; binding while
//! another environment is active fails instead of silently stealing the
//! callbacks.

use crate::{
    environment::{Environment, VideoFrame},
    raw,
};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::{ffi::c_void, slice, sync::Arc};
use tracing::{error, trace, warn};

static ACTIVE: Lazy<RwLock<Option<Arc<Environment>>>> = Lazy::new(|| RwLock::new(None));

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("another session currently owns the libretro callbacks")]
pub struct BindError;

/// Keeps an environment bound to the callback routing. Unbinds on drop.
#[must_use = "the environment is unbound as soon as the binding is dropped"]
pub struct Binding {
    environment: Arc<Environment>,
}

impl Binding {
    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        let mut active = ACTIVE.write();
        if active
            .as_ref()
            .is_some_and(|env| Arc::ptr_eq(env, &self.environment))
        {
            *active = None;
        }
    }
}

/// Routes every callback to `environment` until the returned [`Binding`] is
/// dropped.
///
/// Must not be called while a frame is running on another thread.
pub fn bind(environment: Arc<Environment>) -> Result<Binding, BindError> {
    let mut active = ACTIVE.write();
    if active.is_some() {
        return Err(BindError);
    }
    *active = Some(Arc::clone(&environment));
    Ok(Binding { environment })
}

/// Returns `true` if some environment is currently bound.
pub fn is_bound() -> bool {
    ACTIVE.read().is_some()
}

fn active() -> Option<Arc<Environment>> {
    ACTIVE.read().clone()
}

/// The host-side callback table handed to a core.
#[derive(Clone, Copy)]
pub struct Callbacks {
    pub environment: raw::retro_environment_t,
    pub video_refresh: raw::retro_video_refresh_t,
    pub audio_sample: raw::retro_audio_sample_t,
    pub audio_sample_batch: raw::retro_audio_sample_batch_t,
    pub input_poll: raw::retro_input_poll_t,
    pub input_state: raw::retro_input_state_t,
}

impl Callbacks {
    /// Trampolines forwarding into the bound environment.
    pub fn routed() -> Self {
        Self {
            environment: Some(environment),
            video_refresh: Some(video_refresh),
            audio_sample: Some(audio_sample),
            audio_sample_batch: Some(audio_sample_batch),
            input_poll: Some(input_poll),
            input_state: Some(input_state),
        }
    }
}

unsafe extern "C" fn environment(cmd: u32, data: *mut c_void) -> bool {
    let Some(env) = active() else {
        warn!("environment query {cmd} with no active session");
        return false;
    };

    match unsafe { env.dispatch(cmd, data) } {
        Ok(()) => true,
        Err(err) => {
            error!("environment query {cmd} rejected: {err}");
            false
        }
    }
}

unsafe extern "C" fn video_refresh(data: *const c_void, width: u32, height: u32, pitch: usize) {
    let Some(env) = active() else {
        return;
    };

    if data.is_null() {
        env.frontend().video_frame(VideoFrame::Duplicate);
        return;
    }
    // Verify everything the core hands over before building a slice from it.
    if width == 0 || height == 0 || pitch == 0 {
        trace!("dropping video frame {width}x{height} (pitch {pitch})");
        return;
    }
    let Some(len) = pitch.checked_mul(height as usize) else {
        return;
    };

    let pixels = unsafe { slice::from_raw_parts(data as *const u8, len) };
    env.frontend().video_frame(VideoFrame::Pixels {
        data: pixels,
        width,
        height,
        pitch,
    });
}

unsafe extern "C" fn audio_sample(left: i16, right: i16) {
    let frame = [left, right];
    unsafe { audio_sample_batch(frame.as_ptr(), 1) };
}

unsafe extern "C" fn audio_sample_batch(data: *const i16, frames: usize) -> usize {
    if data.is_null() || frames == 0 {
        return frames;
    }
    if let Some(env) = active() {
        let samples = unsafe { slice::from_raw_parts(data, frames * 2) };
        env.frontend().audio_frames(samples);
    }
    frames
}

// Input is sampled by the player before each frame; nothing to poll here.
unsafe extern "C" fn input_poll() {}

unsafe extern "C" fn input_state(port: u32, device: u32, index: u32, id: u32) -> i16 {
    match active() {
        Some(env) => env.frontend().input_state(port, device, index, id),
        None => 0,
    }
}

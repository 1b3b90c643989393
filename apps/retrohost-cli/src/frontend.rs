use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use libretro_host::{Frontend, KeyboardCallback, PixelFormat, VideoFrame};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Swallows output and keeps counts for the end-of-run report.
#[derive(Default)]
pub struct StatsFrontend {
    video_frames: AtomicU64,
    duplicate_frames: AtomicU64,
    audio_frames: AtomicU64,
    last_size: Mutex<Option<(u32, u32)>>,
    pixel_format: Mutex<PixelFormat>,
    keyboard: AtomicBool,
    shutdown: AtomicBool,
}

#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub video_frames: u64,
    pub duplicate_frames: u64,
    pub audio_frames: u64,
    pub last_size: Option<(u32, u32)>,
    pub pixel_format: PixelFormat,
    pub keyboard: bool,
    pub shutdown: bool,
}

impl StatsFrontend {
    pub fn stats(&self) -> Stats {
        Stats {
            video_frames: self.video_frames.load(Ordering::Relaxed),
            duplicate_frames: self.duplicate_frames.load(Ordering::Relaxed),
            audio_frames: self.audio_frames.load(Ordering::Relaxed),
            last_size: *self.last_size.lock(),
            pixel_format: *self.pixel_format.lock(),
            keyboard: self.keyboard.load(Ordering::Relaxed),
            shutdown: self.shutdown.load(Ordering::Relaxed),
        }
    }
}

impl Frontend for StatsFrontend {
    fn video_frame(&self, frame: VideoFrame<'_>) {
        match frame {
            VideoFrame::Pixels { width, height, .. } => {
                self.video_frames.fetch_add(1, Ordering::Relaxed);
                let mut last = self.last_size.lock();
                if *last != Some((width, height)) {
                    debug!("video size changed to {width}x{height}");
                    *last = Some((width, height));
                }
            }
            VideoFrame::Duplicate => {
                self.duplicate_frames.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn audio_frames(&self, samples: &[i16]) {
        self.audio_frames
            .fetch_add(samples.len() as u64 / 2, Ordering::Relaxed);
    }

    fn input_state(&self, _port: u32, _device: u32, _index: u32, _id: u32) -> i16 {
        0
    }

    fn set_pixel_format(&self, format: PixelFormat) {
        *self.pixel_format.lock() = format;
    }

    fn set_keyboard_callback(&self, callback: Option<KeyboardCallback>) {
        self.keyboard.store(callback.is_some(), Ordering::Relaxed);
    }

    fn show_message(&self, message: &str, frames: u32) {
        info!("core message ({frames} frames): {message}");
    }

    fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

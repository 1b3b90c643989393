#![allow(dead_code)]

use libretro_host::{
    CoreBinary, CoreError, CoreLoader, Frontend, GameDescriptor, GameGeometry, KeyboardCallback,
    PixelFormat, SystemAvInfo, SystemInfo, SystemTiming, VideoFrame, raw,
};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard};
use retrohost_vfs::{ContentPath, StdVfs, VfsError, VfsFile, VirtualFs};
use std::{
    ffi::c_void,
    io::{Cursor, Write},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

pub const CORE_ID: &str = "gameclient.stub";

static ROUTING: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Callback routing is process-wide; sessions in one test binary must take
/// turns.
pub fn exclusive() -> MutexGuard<'static, ()> {
    ROUTING.lock()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Init,
    Deinit,
    LoadPath(PathBuf),
    LoadBuffer(Vec<u8>),
    UnloadGame,
    Run,
    Reset,
    Unserialize(Vec<u8>),
    SetDevice(u32, u32),
    Close,
}

pub type Calls = Arc<Mutex<Vec<Call>>>;

#[derive(Debug, Clone)]
pub struct StubOptions {
    pub api_version: u32,
    pub extensions: Option<&'static str>,
    pub need_fullpath: bool,
    pub block_extract: bool,
    pub serialize_size: usize,
    pub fps: f64,
    pub region: u32,
    /// Refuse content handed over as a path.
    pub reject_paths: bool,
    /// Ask the host to shut down during this frame (1-based).
    pub shutdown_on_frame: Option<u32>,
    /// Fail to serialize after this many frames have run. 0 is the capture
    /// taken right after loading.
    pub fail_serialize_after: Option<u32>,
    pub fail_unserialize: bool,
}

impl Default for StubOptions {
    fn default() -> Self {
        Self {
            api_version: raw::RETRO_API_VERSION,
            extensions: Some("nes"),
            need_fullpath: false,
            block_extract: false,
            serialize_size: 1024,
            fps: 60.0,
            region: raw::RETRO_REGION_NTSC,
            reject_paths: false,
            shutdown_on_frame: None,
            fail_serialize_after: None,
            fail_unserialize: false,
        }
    }
}

pub struct StubCore {
    options: StubOptions,
    calls: Calls,
    state: Vec<u8>,
    frame: u32,
    environment: raw::retro_environment_t,
    video: raw::retro_video_refresh_t,
    audio_batch: raw::retro_audio_sample_batch_t,
    input_state: raw::retro_input_state_t,
}

impl StubCore {
    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn environment(&self, cmd: u32, data: *mut c_void) -> bool {
        match self.environment {
            Some(callback) => unsafe { callback(cmd, data) },
            None => false,
        }
    }
}

impl CoreBinary for StubCore {
    fn api_version(&self) -> u32 {
        self.options.api_version
    }

    fn system_info(&self) -> SystemInfo {
        SystemInfo {
            library_name: Some("Stub".into()),
            library_version: Some("0.1".into()),
            valid_extensions: self.options.extensions.map(str::to_string),
            need_fullpath: self.options.need_fullpath,
            block_extract: self.options.block_extract,
        }
    }

    fn set_environment(&mut self, callback: raw::retro_environment_t) {
        self.environment = callback;
    }

    fn set_video_refresh(&mut self, callback: raw::retro_video_refresh_t) {
        self.video = callback;
    }

    fn set_audio_sample(&mut self, _callback: raw::retro_audio_sample_t) {}

    fn set_audio_sample_batch(&mut self, callback: raw::retro_audio_sample_batch_t) {
        self.audio_batch = callback;
    }

    fn set_input_poll(&mut self, _callback: raw::retro_input_poll_t) {}

    fn set_input_state(&mut self, callback: raw::retro_input_state_t) {
        self.input_state = callback;
    }

    fn init(&mut self) {
        self.record(Call::Init);
        let mut format = raw::RETRO_PIXEL_FORMAT_XRGB8888;
        self.environment(
            raw::RETRO_ENVIRONMENT_SET_PIXEL_FORMAT,
            &mut format as *mut u32 as *mut c_void,
        );
    }

    fn deinit(&mut self) {
        self.record(Call::Deinit);
    }

    fn load_game(&mut self, game: &GameDescriptor) -> bool {
        match game {
            GameDescriptor::Path(path) => {
                self.record(Call::LoadPath(path.clone()));
                !self.options.reject_paths
            }
            GameDescriptor::Buffer(data) => {
                self.record(Call::LoadBuffer(data.clone()));
                true
            }
        }
    }

    fn unload_game(&mut self) {
        self.record(Call::UnloadGame);
    }

    /// Flips the 4-byte word at `frame`, then emits a frame, audio and an
    /// input query.
    fn run(&mut self) {
        self.record(Call::Run);
        let offset = (self.frame as usize * 4) % self.state.len().max(4);
        if let Some(word) = self.state.get_mut(offset..offset + 4) {
            for byte in word {
                *byte ^= 0xFF;
            }
        }
        self.frame += 1;

        if let Some(video) = self.video {
            let pixels = [0u8; 4 * 2 * 2];
            unsafe { video(pixels.as_ptr() as *const c_void, 2, 2, 8) };
        }
        if let Some(batch) = self.audio_batch {
            let samples = [1i16, -1, 2, -2];
            unsafe { batch(samples.as_ptr(), 2) };
        }
        if let Some(input) = self.input_state {
            unsafe { input(0, raw::RETRO_DEVICE_JOYPAD, 0, raw::RETRO_DEVICE_ID_JOYPAD_A) };
        }
        if self.options.shutdown_on_frame == Some(self.frame) {
            self.environment(raw::RETRO_ENVIRONMENT_SHUTDOWN, std::ptr::null_mut());
        }
    }

    fn reset(&mut self) {
        self.record(Call::Reset);
    }

    fn system_av_info(&mut self) -> SystemAvInfo {
        SystemAvInfo {
            geometry: GameGeometry {
                base_width: 256,
                base_height: 224,
                max_width: 512,
                max_height: 448,
                aspect_ratio: 0.0,
            },
            timing: SystemTiming {
                fps: self.options.fps,
                sample_rate: 32_040.5,
            },
        }
    }

    fn serialize_size(&mut self) -> usize {
        self.options.serialize_size
    }

    fn serialize(&mut self, dst: &mut [u8]) -> bool {
        if dst.len() != self.state.len() || self.options.fail_serialize_after == Some(self.frame) {
            return false;
        }
        dst.copy_from_slice(&self.state);
        true
    }

    fn unserialize(&mut self, src: &[u8]) -> bool {
        self.record(Call::Unserialize(src.to_vec()));
        if src.len() != self.state.len() || self.options.fail_unserialize {
            return false;
        }
        self.state.copy_from_slice(src);
        true
    }

    fn region(&mut self) -> u32 {
        self.options.region
    }

    fn set_controller_port_device(&mut self, port: u32, device: u32) {
        self.record(Call::SetDevice(port, device));
    }

    fn close(self: Box<Self>) -> Result<(), CoreError> {
        self.record(Call::Close);
        Ok(())
    }
}

/// Hands out stub cores instead of opening shared libraries.
pub struct StubLoader {
    pub options: StubOptions,
    pub calls: Calls,
    pub loads: AtomicUsize,
}

impl StubLoader {
    pub fn new(options: StubOptions) -> Arc<Self> {
        Arc::new(Self {
            options,
            calls: Calls::default(),
            loads: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Calls other than frame traffic, in order.
    pub fn lifecycle(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, Call::Run))
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl CoreLoader for StubLoader {
    fn load(&self, _path: &Path) -> Result<Box<dyn CoreBinary>, CoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubCore {
            options: self.options.clone(),
            calls: Arc::clone(&self.calls),
            state: vec![0; self.options.serialize_size],
            frame: 0,
            environment: None,
            video: None,
            audio_batch: None,
            input_state: None,
        }))
    }
}

/// Counts reads on top of the real filesystem.
#[derive(Default)]
pub struct CountingVfs {
    inner: StdVfs,
    pub opens: AtomicUsize,
}

impl CountingVfs {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl VirtualFs for CountingVfs {
    fn open(&self, path: &ContentPath) -> Result<VfsFile, VfsError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.inner.open(path)
    }

    fn list_archive(&self, archive: &ContentPath) -> Result<Vec<ContentPath>, VfsError> {
        self.inner.list_archive(archive)
    }
}

#[derive(Default)]
pub struct RecordingFrontend {
    pub frames: AtomicUsize,
    pub samples: Mutex<Vec<i16>>,
    pub pixel_formats: Mutex<Vec<PixelFormat>>,
    pub input_queries: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

impl Frontend for RecordingFrontend {
    fn video_frame(&self, _frame: VideoFrame<'_>) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }

    fn audio_frames(&self, samples: &[i16]) {
        self.samples.lock().extend_from_slice(samples);
    }

    fn input_state(&self, _port: u32, _device: u32, _index: u32, _id: u32) -> i16 {
        self.input_queries.fetch_add(1, Ordering::SeqCst);
        0
    }

    fn set_pixel_format(&self, format: PixelFormat) {
        self.pixel_formats.lock().push(format);
    }

    fn set_keyboard_callback(&self, _callback: Option<KeyboardCallback>) {}

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    let bytes = writer.finish().unwrap().into_inner();
    std::fs::write(path, bytes).unwrap();
}

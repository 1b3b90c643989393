use crate::{
    manifest::AddonManifest,
    strategy::{LoadingStrategy, Resolver},
    types::{SessionConfig, SessionError},
};
use libretro_host::{
    CoreCapabilities, CoreHandle, CoreLoader, DynamicLoader, Environment, Frontend,
    GameDescriptor, MAX_PLAYERS, Region, SystemAvInfo, is_known_device, raw,
    routing::{self, Binding, Callbacks},
};
use parking_lot::Mutex;
use retrohost_rewind::{RewindBuffer, capacity_for};
use retrohost_vfs::{ContentPath, StdVfs, VirtualFs};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{error, info, warn};

/// A file to open, optionally tagged with the game client it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub path: ContentPath,
    pub game_client: Option<String>,
}

impl ContentRequest {
    pub fn new(path: impl Into<ContentPath>) -> Self {
        Self {
            path: path.into(),
            game_client: None,
        }
    }

    pub fn with_game_client(mut self, id: impl Into<String>) -> Self {
        self.game_client = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No core image is loaded.
    Unloaded,
    /// The core image is loaded but `retro_init` has not run.
    Loaded,
    /// The core is initialized and has no game.
    Inited,
    Playing,
}

struct Game {
    path: ContentPath,
    strategy: LoadingStrategy,
    // Cores may keep pointing into a buffer they were handed, so the
    // descriptor lives until the game is unloaded.
    descriptor: GameDescriptor,
    av_info: SystemAvInfo,
    region: Option<Region>,
    rewind: Option<RewindBuffer>,
}

#[derive(Default)]
struct SessionInner {
    core: Option<CoreHandle>,
    game: Option<Game>,
    binding: Option<Binding>,
}

impl SessionInner {
    fn close_game(&mut self) {
        if let Some(core) = self.core.as_mut() {
            core.unload_game();
        }
        if let Some(game) = self.game.take() {
            info!("closed {}", game.path);
        }
    }

    fn teardown(&mut self) {
        if let Some(core) = self.core.take() {
            let path = core.path().to_path_buf();
            if let Err(err) = core.unload() {
                error!("error unloading core {}: {err}", path.display());
            }
        }
        // The game buffer and the callback routing outlive the core.
        self.game = None;
        self.binding = None;
    }

    fn playing(&mut self) -> Option<(&mut CoreHandle, &mut Game)> {
        match (self.core.as_mut(), self.game.as_mut()) {
            (Some(core), Some(game)) => Some((core, game)),
            _ => None,
        }
    }
}

/// One game client and the game it is playing.
///
/// Frame execution and rewinding share one lock. The other operations take
/// it too, but callers should still drive a session from a single owner:
/// nothing interrupts a running frame.
pub struct Session {
    id: String,
    library: PathBuf,
    config: SessionConfig,
    loader: Arc<dyn CoreLoader>,
    vfs: Arc<dyn VirtualFs>,
    environment: Arc<Environment>,
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        library: impl Into<PathBuf>,
        frontend: Arc<dyn Frontend>,
        config: SessionConfig,
    ) -> Self {
        let environment = Arc::new(Environment::new(config.environment.clone(), frontend));
        Self {
            id: id.into(),
            library: library.into(),
            config,
            loader: Arc::new(DynamicLoader),
            vfs: Arc::new(StdVfs),
            environment,
            inner: Mutex::new(SessionInner::default()),
        }
    }

    /// A session for the game client an addon manifest describes.
    pub fn from_manifest(
        manifest: &AddonManifest,
        frontend: Arc<dyn Frontend>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        Ok(Self::new(
            manifest.id.clone(),
            manifest.library_path()?,
            frontend,
            config,
        ))
    }

    pub fn with_loader(mut self, loader: Arc<dyn CoreLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_vfs(mut self, vfs: Arc<dyn VirtualFs>) -> Self {
        self.vfs = vfs;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn library(&self) -> &Path {
        &self.library
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    pub fn state(&self) -> SessionState {
        let inner = self.inner.lock();
        match (&inner.core, &inner.game) {
            (None, _) => SessionState::Unloaded,
            (Some(_), Some(_)) => SessionState::Playing,
            (Some(core), None) if core.is_inited() => SessionState::Inited,
            (Some(_), None) => SessionState::Loaded,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().game.is_some()
    }

    /// `None` until the core image is loaded.
    pub fn capabilities(&self) -> Option<CoreCapabilities> {
        self.inner
            .lock()
            .core
            .as_ref()
            .map(|core| core.capabilities().clone())
    }

    pub fn av_info(&self) -> Option<SystemAvInfo> {
        self.inner.lock().game.as_ref().map(|game| game.av_info)
    }

    /// Region of the playing game. `None` when nothing is playing or the
    /// core reported something other than NTSC or PAL.
    pub fn region(&self) -> Option<Region> {
        self.inner.lock().game.as_ref().and_then(|game| game.region)
    }

    pub fn strategy(&self) -> Option<LoadingStrategy> {
        self.inner.lock().game.as_ref().map(|game| game.strategy)
    }

    /// Size of the in-memory image handed to the core, `None` when the core
    /// was given a path.
    pub fn game_data_len(&self) -> Option<usize> {
        self.inner
            .lock()
            .game
            .as_ref()
            .and_then(|game| game.descriptor.data())
            .map(<[u8]>::len)
    }

    pub fn game_path(&self) -> Option<ContentPath> {
        self.inner.lock().game.as_ref().map(|game| game.path.clone())
    }

    /// Frame rate reported by the core, or 0 when nothing is playing.
    pub fn frame_rate(&self) -> f64 {
        self.av_info().map_or(0.0, |info| info.timing.fps)
    }

    pub fn sample_rate(&self) -> f64 {
        self.av_info().map_or(0.0, |info| info.timing.sample_rate)
    }

    fn load_core(&self) -> Result<CoreHandle, SessionError> {
        Ok(CoreHandle::load(
            self.loader.as_ref(),
            &self.library,
            self.config.allow_archive_extension,
        )?)
    }

    /// Loads the core image, releasing any previously loaded one first.
    pub fn init(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        inner.teardown();
        inner.core = Some(self.load_core()?);
        Ok(())
    }

    /// Unloads the game, deinitializes the core, releases the image and
    /// gives up the callback routing. Failures are logged.
    pub fn deinit(&self) {
        self.inner.lock().teardown();
    }

    /// Loads the core if needed, initializes it and loads a game.
    ///
    /// On failure the core stays loaded (and initialized, if it got that far)
    /// with no game bound.
    pub fn open_file(&self, request: &ContentRequest) -> Result<(), SessionError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let core = match inner.core.take() {
            Some(core) => core,
            None => self.load_core()?,
        };
        let core = inner.core.insert(core);

        if let Some(requested) = &request.game_client
            && *requested != self.id
        {
            error!(
                "{} is tagged for game client {requested}, not {}",
                request.path, self.id
            );
            return Err(SessionError::WrongCore {
                requested: requested.clone(),
                actual: self.id.clone(),
            });
        }

        if let Some(game) = inner.game.take() {
            core.unload_game();
            info!("closed {}", game.path);
        }
        if inner.binding.is_none() {
            inner.binding = Some(routing::bind(Arc::clone(&self.environment))?);
        }

        self.environment.reset_defaults();
        let callbacks = Callbacks::routed();
        core.init(callbacks.environment);

        let capabilities = core.capabilities().clone();
        let resolver = Resolver::new(
            self.vfs.as_ref(),
            &capabilities,
            self.config.prefer_vfs,
            self.config.max_buffer_len,
        );
        let Some(resolved) = resolver.resolve(&request.path, |game| core.load_game(game)) else {
            error!("{} could not load {}", capabilities.library_name, request.path);
            return Err(SessionError::NoStrategy(request.path.to_string()));
        };

        let av_info = core.system_av_info();
        let geometry = av_info.geometry;
        info!("opened file {}", request.path);
        info!(
            "base size: {}x{}, max size: {}x{}, aspect ratio: {}",
            geometry.base_width,
            geometry.base_height,
            geometry.max_width,
            geometry.max_height,
            geometry.aspect_ratio
        );
        info!(
            "fps: {}, sample rate: {}",
            av_info.timing.fps, av_info.timing.sample_rate
        );

        let rewind = prepare_rewind(core, av_info.timing.fps, self.config.rewind_seconds);
        let region = Region::from_raw(core.region());
        core.install_callbacks(&callbacks);
        core.set_controller_port_device(0, raw::RETRO_DEVICE_JOYPAD);

        inner.game = Some(Game {
            path: request.path.clone(),
            strategy: resolved.strategy,
            descriptor: resolved.game,
            av_info,
            region,
            rewind,
        });
        Ok(())
    }

    /// Unloads the current game, if any.
    pub fn close_file(&self) {
        self.inner.lock().close_game();
    }

    /// Runs one frame and records it in the rewind history.
    ///
    /// A shutdown requested by the core during the frame closes the game.
    pub fn run_frame(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        let (core, game) = inner.playing().ok_or(SessionError::NotPlaying)?;

        core.run();
        if let Some(rewind) = game.rewind.as_mut()
            && let Err(err) = rewind.capture(|state| core.serialize(state))
        {
            error!("{err}");
        }

        if self.environment.shutdown_requested() {
            info!("core signaled shutdown, closing {}", game.path);
            inner.close_game();
        }
        Ok(())
    }

    /// Steps back up to `frames` frames and returns how many were rewound.
    pub fn rewind_frames(&self, frames: usize) -> usize {
        let mut inner = self.inner.lock();
        let Some((core, game)) = inner.playing() else {
            return 0;
        };
        let Some(rewind) = game.rewind.as_mut() else {
            return 0;
        };

        let rewound = rewind.rewind(frames);
        if rewound > 0
            && let Err(err) = core.unserialize(rewind.current().as_bytes())
        {
            warn!("failed to restore rewound state: {err}");
        }
        rewound
    }

    /// Frames that can be rewound right now.
    pub fn rewind_frames_avail(&self) -> usize {
        self.with_rewind(RewindBuffer::available)
    }

    /// Capacity of the rewind history.
    pub fn rewind_frames_avail_max(&self) -> usize {
        self.with_rewind(RewindBuffer::capacity)
    }

    fn with_rewind(&self, f: impl FnOnce(&RewindBuffer) -> usize) -> usize {
        self.inner
            .lock()
            .game
            .as_ref()
            .and_then(|game| game.rewind.as_ref())
            .map_or(0, f)
    }

    pub fn reset(&self) {
        if let Some((core, _)) = self.inner.lock().playing() {
            core.reset();
        }
    }

    /// Attaches `device` to `port`. Unknown devices and ports beyond the
    /// supported player count are ignored.
    pub fn set_device(&self, port: u32, device: u32) {
        let mut inner = self.inner.lock();
        let Some((core, _)) = inner.playing() else {
            return;
        };
        if port >= MAX_PLAYERS {
            warn!("ignoring device for port {port}, only {MAX_PLAYERS} players supported");
            return;
        }
        if !is_known_device(device) {
            warn!("ignoring unknown device {device} for port {port}");
            return;
        }
        core.set_controller_port_device(port, device);
    }

    /// Rewinds one second, or ten for a large step.
    pub fn seek_back(&self, large_step: bool) -> usize {
        self.rewind_seconds(if large_step { 10.0 } else { 1.0 })
    }

    pub fn rewind_seconds(&self, seconds: f64) -> usize {
        let frames = seconds * self.frame_rate();
        if frames >= 1.0 {
            self.rewind_frames(frames as usize)
        } else {
            0
        }
    }

    /// Rewinds until the history is filled to `percent` of its capacity.
    pub fn seek_percentage(&self, percent: f64) -> usize {
        let max = self.rewind_frames_avail_max();
        if max == 0 {
            return 0;
        }
        let target = (max as f64 * percent / 100.0).max(0.0) as usize;
        let current = self.rewind_frames_avail();
        if current > target {
            self.rewind_frames(current - target)
        } else {
            0
        }
    }

    /// How full the rewind history is, in percent.
    pub fn percentage(&self) -> f64 {
        let max = self.rewind_frames_avail_max();
        if max == 0 {
            return 0.0;
        }
        self.rewind_frames_avail() as f64 * 100.0 / max as f64
    }

    /// Rewinds until `time_ms` of history remain.
    pub fn seek_time_ms(&self, time_ms: u64) -> usize {
        let current = self.rewind_frames_avail();
        let target = (time_ms as f64 * self.frame_rate() / 1000.0) as usize;
        if current > target {
            self.rewind_frames(current - target)
        } else {
            0
        }
    }

    /// Length of the rewind history in milliseconds.
    pub fn time_ms(&self) -> u64 {
        frames_to_ms(self.rewind_frames_avail(), self.frame_rate())
    }

    /// Longest possible rewind history in milliseconds.
    pub fn total_time_ms(&self) -> u64 {
        frames_to_ms(self.rewind_frames_avail_max(), self.frame_rate())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.inner.get_mut().teardown();
    }
}

fn frames_to_ms(frames: usize, fps: f64) -> u64 {
    if fps > 0.0 {
        (1000.0 * frames as f64 / fps) as u64
    } else {
        0
    }
}

fn prepare_rewind(core: &mut CoreHandle, fps: f64, seconds: f64) -> Option<RewindBuffer> {
    let size = core.query_serialize_size();
    if size == 0 {
        info!("core does not support save states, rewind disabled");
        return None;
    }

    let capacity = capacity_for(fps, seconds);
    let mut rewind = RewindBuffer::new(size, capacity);
    if let Err(err) = rewind.capture_initial(|state| core.serialize(state)) {
        warn!("rewind disabled: {err}");
        return None;
    }
    info!("rewind enabled: up to {capacity} frames of {size} bytes");
    Some(rewind)
}

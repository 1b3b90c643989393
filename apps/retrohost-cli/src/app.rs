use std::{sync::Arc, time::Instant};

use anyhow::{Context, Result};
use libretro_host::EnvironmentConfig;
use retrohost_runtime::{
    AddonManifest, ContentRequest, FramePacer, PlaybackClock, Session, SessionConfig,
};
use tracing::{info, warn};

use crate::{args::Args, frontend::StatsFrontend};

pub struct App {
    session: Session,
    frontend: Arc<StatsFrontend>,
    args: Args,
}

impl App {
    pub fn new(args: Args) -> Result<Self> {
        let config = SessionConfig {
            prefer_vfs: args.prefer_vfs,
            allow_archive_extension: args.allow_zip,
            rewind_seconds: args.rewind_seconds,
            environment: EnvironmentConfig {
                system_directory: args.system_dir.clone(),
                variables: args.variables.iter().cloned().collect(),
                ..EnvironmentConfig::default()
            },
            ..SessionConfig::default()
        };
        let frontend = Arc::new(StatsFrontend::default());

        let session = if args.core.is_dir() {
            let manifest = AddonManifest::load(&args.core)
                .with_context(|| format!("Failed to read addon at {}", args.core.display()))?;
            info!(
                "game client {} {}",
                manifest.id,
                manifest.version.as_deref().unwrap_or("")
            );
            Session::from_manifest(&manifest, frontend.clone(), config)?
        } else {
            let id = args
                .core
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("core")
                .to_string();
            Session::new(id, &args.core, frontend.clone(), config)
        };

        Ok(Self {
            session,
            frontend,
            args,
        })
    }

    pub fn run(self) -> Result<()> {
        let session = &self.session;
        session
            .open_file(&ContentRequest::new(self.args.game.clone()))
            .with_context(|| format!("Failed to open {}", self.args.game))?;

        let clock = PlaybackClock::new(session.frame_rate(), session.sample_rate());
        let mut pacer = FramePacer::new(clock.frame_duration());
        let started = Instant::now();
        let mut frames = 0;

        while frames < self.args.frames {
            session.run_frame()?;
            frames += 1;
            if !session.is_playing() {
                warn!("core shut down after {frames} frames");
                break;
            }
            if !self.args.unpaced {
                pacer.wait();
            }
        }
        let elapsed = started.elapsed();

        if let Some(requested) = self.args.rewind {
            let rewound = session.rewind_frames(requested);
            info!("rewound {rewound} of {requested} frames");
        }

        let stats = self.frontend.stats();
        println!("game:           {}", self.args.game);
        if let Some(strategy) = session.strategy() {
            println!("loaded via:     {strategy}");
        }
        if let Some(region) = session.region() {
            println!("region:         {region:?}");
        }
        println!(
            "timing:         {:.3} fps, {}",
            clock.fps(),
            clock
                .sample_rate()
                .map_or_else(|| "no audio".to_string(), |rate| format!("{rate} Hz"))
        );
        println!(
            "frames:         {frames} in {:.2}s ({} video, {} duplicated)",
            elapsed.as_secs_f64(),
            stats.video_frames,
            stats.duplicate_frames
        );
        if let Some((width, height)) = stats.last_size {
            println!("video:          {width}x{height} {:?}", stats.pixel_format);
        }
        println!("audio frames:   {}", stats.audio_frames);
        println!(
            "rewind:         {} of {} frames ({:.0}%, {} ms of {} ms)",
            session.rewind_frames_avail(),
            session.rewind_frames_avail_max(),
            session.percentage(),
            session.time_ms(),
            session.total_time_ms()
        );
        if stats.keyboard {
            println!("keyboard:       requested by core");
        }
        if stats.shutdown {
            println!("shutdown:       requested by core");
        }

        session.deinit();
        Ok(())
    }
}

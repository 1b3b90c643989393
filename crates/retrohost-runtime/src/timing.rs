use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const DEFAULT_FPS: f64 = 60.0;
pub const MIN_FPS: f64 = 5.0;
pub const MAX_FPS: f64 = 100.0;
pub const MAX_SAMPLE_RATE: f64 = 384_000.0;

/// Playback rates derived from what a core reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackClock {
    fps: f64,
    sample_rate: Option<u32>,
}

impl PlaybackClock {
    /// Sanitizes the reported timing.
    ///
    /// Frame rates outside 5..=100 are replaced by 60. Sample rates outside
    /// 1..=384000 disable audio. A fractional sample rate is truncated and the
    /// frame rate scaled by the same ratio, so audio and video stay in step.
    pub fn new(fps: f64, sample_rate: f64) -> Self {
        let mut fps = fps;
        if !(MIN_FPS..=MAX_FPS).contains(&fps) {
            info!("core reported {fps} fps, assuming {DEFAULT_FPS} fps");
            fps = DEFAULT_FPS;
        }

        if !(1.0..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            info!("core reported sample rate of {sample_rate}, continuing without sound");
            return Self {
                fps,
                sample_rate: None,
            };
        }

        let truncated = sample_rate.trunc();
        if truncated != sample_rate {
            let adjusted = fps * truncated / sample_rate;
            debug!("frame rate changed from {fps} to {adjusted}");
            debug!("sample rate changed from {sample_rate} to {truncated}");
            fps = adjusted;
        }

        Self {
            fps,
            sample_rate: Some(truncated as u32),
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// `None` when audio is disabled.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }
}

/// Deadline tracking for a fixed frame rate.
#[derive(Debug, Clone)]
pub struct FramePacer {
    frame_duration: Duration,
    next_deadline: Instant,
}

impl FramePacer {
    pub fn new(frame_duration: Duration) -> Self {
        Self::starting_at(frame_duration, Instant::now())
    }

    pub fn starting_at(frame_duration: Duration, now: Instant) -> Self {
        Self {
            frame_duration,
            next_deadline: now + frame_duration,
        }
    }

    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    /// Advances to the next frame and returns how long to sleep before it.
    ///
    /// When more than two frames behind, the schedule restarts from `now`
    /// instead of running frames back to back to catch up.
    pub fn advance(&mut self, now: Instant) -> Duration {
        let wait = self.next_deadline.saturating_duration_since(now);
        self.next_deadline += self.frame_duration;

        if now > self.next_deadline && now.duration_since(self.next_deadline) > self.frame_duration * 2
        {
            self.next_deadline = now + self.frame_duration;
        }
        wait
    }

    /// Sleeps until the current deadline, then schedules the next one.
    pub fn wait(&mut self) {
        let wait = self.advance(Instant::now());
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }
}

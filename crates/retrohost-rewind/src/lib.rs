//! Frame-by-frame rewind history built from XOR deltas between serialized
//! core states.
//!
//! # Design
//! - The latest serialized state is kept in full as the *current* snapshot.
//! - Each captured frame stores a sparse [`DeltaFrame`]: the 32-bit words that
//!   changed since the previous capture, paired with `cur ^ prev`.
//! - Because XOR is self-inverse, applying a delta to the current snapshot
//!   yields the previous state. Rewinding `n` frames pops `n` deltas from the
//!   back of the history and applies them in order.
//!
//! # Invariants
//! - `current` reflects the state after the last capture, or the state restored
//!   by the most recent rewind.
//! - The history never holds more than `capacity` deltas; the oldest is evicted
//!   from the front.
//! - Every snapshot in a buffer has the same byte length.

mod snapshot;

pub use crate::snapshot::Snapshot;

use std::collections::VecDeque;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum RewindError {
    #[error("core claimed it could serialize, but failed: {0}")]
    Serialize(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("state is {actual} bytes, rewind buffer holds {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// The words that changed between two consecutive snapshots.
///
/// An empty delta is valid and means the state did not change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaFrame {
    changes: Vec<(u32, u32)>,
}

impl DeltaFrame {
    /// Computes `cur ^ prev` for every word that differs.
    pub fn between(prev: &Snapshot, cur: &Snapshot) -> Self {
        let changes = prev
            .words()
            .iter()
            .zip(cur.words())
            .enumerate()
            .filter_map(|(index, (a, b))| {
                let xor = a ^ b;
                (xor != 0).then_some((index as u32, xor))
            })
            .collect();
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changed words.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// `(word index, xor value)` pairs in ascending index order.
    pub fn changes(&self) -> &[(u32, u32)] {
        &self.changes
    }

    /// XORs the delta into `snapshot` in place.
    pub fn apply(&self, snapshot: &mut Snapshot) {
        let words = snapshot.words_mut();
        for &(index, xor) in &self.changes {
            words[index as usize] ^= xor;
        }
    }
}

/// Number of frames kept for `seconds` of rewind at `fps`.
pub fn capacity_for(fps: f64, seconds: f64) -> usize {
    let frames = (seconds * fps).round();
    if frames.is_finite() && frames > 0.0 {
        frames as usize
    } else {
        0
    }
}

/// Bounded rewind history for a single loaded game.
pub struct RewindBuffer {
    capacity: usize,
    current: Snapshot,
    scratch: Snapshot,
    history: VecDeque<DeltaFrame>,
}

impl RewindBuffer {
    /// Creates a buffer for states of `state_len` bytes, starting from a
    /// zeroed snapshot. Sessions seed it with [`capture_initial`].
    ///
    /// [`capture_initial`]: Self::capture_initial
    pub fn new(state_len: usize, capacity: usize) -> Self {
        Self {
            capacity,
            current: Snapshot::zeroed(state_len),
            scratch: Snapshot::zeroed(state_len),
            history: VecDeque::with_capacity(capacity.min(4096)),
        }
    }

    /// Maximum number of frames that can be rewound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of frames that can be rewound right now.
    pub fn available(&self) -> usize {
        self.history.len()
    }

    /// Size of a serialized state in bytes.
    pub fn state_len(&self) -> usize {
        self.current.len()
    }

    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// Serializes the starting state without recording a delta.
    pub fn capture_initial<F, E>(&mut self, serialize: F) -> Result<(), RewindError>
    where
        F: FnOnce(&mut [u8]) -> Result<(), E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        serialize(self.current.as_bytes_mut()).map_err(|err| RewindError::Serialize(err.into()))
    }

    /// Serializes the state after a frame and appends its delta.
    ///
    /// On failure nothing is recorded and the current snapshot is untouched.
    pub fn capture<F, E>(&mut self, serialize: F) -> Result<(), RewindError>
    where
        F: FnOnce(&mut [u8]) -> Result<(), E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        serialize(self.scratch.as_bytes_mut()).map_err(|err| RewindError::Serialize(err.into()))?;
        self.commit_scratch();
        Ok(())
    }

    /// Appends the delta from the current snapshot to `state`.
    pub fn push(&mut self, state: &[u8]) -> Result<(), RewindError> {
        if state.len() != self.current.len() {
            return Err(RewindError::SizeMismatch {
                expected: self.current.len(),
                actual: state.len(),
            });
        }
        self.scratch.as_bytes_mut().copy_from_slice(state);
        self.commit_scratch();
        Ok(())
    }

    fn commit_scratch(&mut self) {
        let delta = DeltaFrame::between(&self.current, &self.scratch);
        std::mem::swap(&mut self.current, &mut self.scratch);

        if self.capacity == 0 {
            return;
        }
        self.history.push_back(delta);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
    }

    /// Rewinds up to `frames` frames and returns how many were rewound.
    ///
    /// The caller pushes [`current`](Self::current) back into the core when
    /// the result is non-zero.
    pub fn rewind(&mut self, frames: usize) -> usize {
        let mut rewound = 0;
        while rewound < frames {
            let Some(delta) = self.history.pop_back() else {
                break;
            };
            delta.apply(&mut self.current);
            rewound += 1;
        }
        if rewound < frames {
            debug!("rewind requested {frames} frames, only {rewound} available");
        }
        rewound
    }

    /// Drops the history, keeping the current snapshot.
    pub fn clear(&mut self) {
        if !self.history.is_empty() {
            warn!("discarding {} rewind frames", self.history.len());
        }
        self.history.clear();
    }
}

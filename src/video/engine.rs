//! Constant-frame-rate pacing over an irregular capture stream.
//!
//! Screen capture delivers frames whenever the compositor has one; the
//! encoder wants exactly `fps` frames per second with gapless indices. The
//! pacer bridges the two: a wall-clock anchor decides how many frames SHOULD
//! have been emitted by now, and each missing slot is filled from the ring
//! or, on underrun, by duplicating the last good frame. Only the emission
//! count drives frame indices, so output PTS stays perfectly regular no
//! matter how bursty capture is.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::errors::EngineError;
use crate::video::ring::{FrameRing, RawVideoFrame};

/// One frame leaving the pacer, stamped with its CFR slot.
#[derive(Debug, Clone)]
pub struct PacedFrame {
    pub frame: RawVideoFrame,
    /// Gapless output index; the file-mode PTS in `1/fps` units.
    pub frame_index: u64,
    /// Whether this is a repeat of the previous frame rather than fresh
    /// capture.
    pub duplicated: bool,
}

/// Sink for paced frames, invoked synchronously from `tick()`.
pub type FrameSink = Box<dyn FnMut(PacedFrame) + Send>;

struct PacerState {
    ring: FrameRing,
    fps: u32,
    started_at: Option<Instant>,
}

/// CFR pacing engine.
///
/// Capture threads call [`push_frame`](Self::push_frame); one pacing thread
/// calls [`tick`](Self::tick). State lives behind a single mutex that is
/// released while the sink runs.
pub struct VideoClockEngine {
    state: Mutex<PacerState>,
    sink: Mutex<Option<FrameSink>>,
    running: AtomicBool,
    frames_emitted: AtomicU64,
    frames_fresh: AtomicU64,
    frames_duplicated: AtomicU64,
}

impl VideoClockEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PacerState {
                ring: FrameRing::new(),
                fps: 0,
                started_at: None,
            }),
            sink: Mutex::new(None),
            running: AtomicBool::new(false),
            frames_emitted: AtomicU64::new(0),
            frames_fresh: AtomicU64::new(0),
            frames_duplicated: AtomicU64::new(0),
        }
    }

    /// Set the target rate and the sink for paced frames.
    pub fn initialize(&self, fps: u32, sink: FrameSink) -> Result<(), EngineError> {
        if fps == 0 {
            return Err(EngineError::VideoError("fps must be nonzero".into()));
        }
        self.state.lock().unwrap().fps = fps;
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    /// Anchor the CFR clock at "now" and begin emitting.
    pub fn start(&self) -> Result<(), EngineError> {
        if self.running.load(Ordering::Acquire) {
            return Err(EngineError::VideoError("pacer already running".into()));
        }
        {
            let mut state = self.state.lock().unwrap();
            if state.fps == 0 || self.sink.lock().unwrap().is_none() {
                return Err(EngineError::VideoError(
                    "pacer not initialized; call initialize() first".into(),
                ));
            }
            state.ring.clear();
            state.started_at = Some(Instant::now());
        }
        self.frames_emitted.store(0, Ordering::Release);
        self.frames_fresh.store(0, Ordering::Release);
        self.frames_duplicated.store(0, Ordering::Release);
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    /// Stop pacing and drop queued frames. Idempotent.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        let mut state = self.state.lock().unwrap();
        state.ring.clear();
        state.started_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Queue a captured frame. Returns `false` when the frame displaced an
    /// older queued frame (the pacer is falling behind capture). No-op
    /// while stopped.
    pub fn push_frame(&self, frame: RawVideoFrame) -> bool {
        if !self.running.load(Ordering::Acquire) {
            return true;
        }
        let overwrote = self.state.lock().unwrap().ring.push(frame);
        if overwrote {
            log::debug!("video ring full, discarded oldest queued frame");
        }
        !overwrote
    }

    /// How many frames the CFR clock says should exist by now.
    pub fn expected_frame_number(&self) -> u64 {
        let state = self.state.lock().unwrap();
        match state.started_at {
            Some(anchor) => (anchor.elapsed().as_secs_f64() * state.fps as f64) as u64,
            None => 0,
        }
    }

    /// Emit every frame slot the clock has passed since the last tick.
    ///
    /// Each slot takes the oldest queued frame if one exists, otherwise a
    /// duplicate of the last good frame. Before any frame has ever arrived
    /// there is nothing to duplicate and the slot stays unfilled; indices
    /// only advance on emission, so output stays gapless.
    pub fn tick(&self) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        loop {
            let emitted = self.frames_emitted.load(Ordering::Acquire);
            let (frame, duplicated) = {
                let mut state = self.state.lock().unwrap();
                let expected = match state.started_at {
                    Some(anchor) => {
                        (anchor.elapsed().as_secs_f64() * state.fps as f64) as u64
                    }
                    None => return,
                };
                if emitted >= expected {
                    return;
                }
                match state.ring.pop() {
                    Some(frame) => (frame, false),
                    None => match state.ring.last_frame() {
                        Some(frame) => (frame, true),
                        None => return,
                    },
                }
            };

            self.frames_emitted.store(emitted + 1, Ordering::Release);
            if duplicated {
                self.frames_duplicated.fetch_add(1, Ordering::Relaxed);
            } else {
                self.frames_fresh.fetch_add(1, Ordering::Relaxed);
            }

            let paced = PacedFrame {
                frame,
                frame_index: emitted,
                duplicated,
            };
            // Sink runs outside the ring lock so capture never stalls on
            // encoding.
            if let Some(sink) = self.sink.lock().unwrap().as_mut() {
                sink(paced);
            }
        }
    }

    /// Total frames emitted so far; the index of the next frame.
    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted.load(Ordering::Acquire)
    }

    pub fn frames_fresh(&self) -> u64 {
        self.frames_fresh.load(Ordering::Relaxed)
    }

    pub fn frames_duplicated(&self) -> u64 {
        self.frames_duplicated.load(Ordering::Relaxed)
    }
}

impl Default for VideoClockEngine {
    fn default() -> Self {
        Self::new()
    }
}

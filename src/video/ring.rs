//! Shallow frame queue between capture and the pacing loop.

use std::collections::VecDeque;
use std::time::Instant;

/// Frames the ring holds before overwriting. Video frames are large and
/// stale frames are worthless, so the queue stays shallow: when the pacer
/// falls behind we keep the newest frames and lose the oldest.
const RING_DEPTH: usize = 4;

/// One captured frame, pixels plus its capture timestamp.
#[derive(Debug, Clone)]
pub struct RawVideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub capture_ts: Instant,
}

impl RawVideoFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            capture_ts: Instant::now(),
        }
    }
}

/// Fixed-depth frame queue that favors recency.
///
/// `push` on a full ring discards the OLDEST queued frame and keeps the new
/// one. `last_frame` remembers the most recently pushed frame even after it
/// has been popped or overwritten, so the pacer always has something to
/// duplicate on underrun.
pub struct FrameRing {
    frames: VecDeque<RawVideoFrame>,
    last: Option<RawVideoFrame>,
}

impl FrameRing {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::with_capacity(RING_DEPTH),
            last: None,
        }
    }

    /// Queue a frame. Returns `true` if an older frame was discarded to
    /// make room.
    pub fn push(&mut self, frame: RawVideoFrame) -> bool {
        self.last = Some(frame.clone());
        let overwrote = self.frames.len() == RING_DEPTH;
        if overwrote {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
        overwrote
    }

    /// Pop the oldest queued frame.
    pub fn pop(&mut self) -> Option<RawVideoFrame> {
        self.frames.pop_front()
    }

    /// The most recently pushed frame, regardless of queue state.
    pub fn last_frame(&self) -> Option<RawVideoFrame> {
        self.last.clone()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.last = None;
    }
}

impl Default for FrameRing {
    fn default() -> Self {
        Self::new()
    }
}

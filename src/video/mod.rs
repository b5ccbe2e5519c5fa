//! Video path: the capture-side frame ring and the CFR pacing engine.

pub mod engine;
pub mod ring;

pub use engine::{FrameSink, PacedFrame, VideoClockEngine};
pub use ring::{FrameRing, RawVideoFrame};

//! Deskcast: timing, buffering, and A/V synchronization for desktop capture
//!
//! This crate is the clocking core of a screen recorder and streamer: it
//! turns irregular capture callbacks into steady, sync-safe encoded output.
//!
//! # Features
//! - Audio-as-master-clock mixing with silence padding (48 kHz stereo)
//! - Constant-frame-rate video pacing with duplicate-on-underrun
//! - Counter-derived timestamps, never wall-clock at write time
//! - Bounded, priority-aware packet queueing for streaming
//! - File and stream muxing behind one pluggable sink trait
//!
//! # Usage
//! ```rust,ignore
//! use deskcast::{RecorderSession, SessionConfig};
//!
//! let mut session = RecorderSession::new(
//!     SessionConfig::default(),
//!     video_encoder,
//!     audio_encoder,
//!     mp4_sink,
//! )?;
//! session.start()?;
//! // capture callbacks:
//! session.on_captured_frame(pixels, 1920, 1080);
//! session.on_audio_data("mic", &samples);
//! session.stop()?;
//! ```

pub mod audio;
pub mod config;
pub mod errors;
pub mod mux;
pub mod queue;
pub mod session;
pub mod sink;
pub mod stats;
pub mod video;

// Re-exports for convenience
pub use audio::{AudioClockEngine, AudioSource, MixedAudioBlock};
pub use config::{QualityPreset, SessionConfig};
pub use errors::EngineError;
pub use mux::{FileMuxer, StreamMuxer, Timebase};
pub use queue::PacketQueue;
pub use session::{RecorderSession, StreamerSession};
pub use sink::{
    AudioEncoder, ContainerSink, EncodedPacket, SinkPacket, StreamDesc, StreamKind, VideoEncoder,
};
pub use stats::{SessionStats, StatsSnapshot};
pub use video::{PacedFrame, RawVideoFrame, VideoClockEngine};

/// Crate version for diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name for diagnostics.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize env_logger with sane defaults for interactive use.
///
/// Respects `RUST_LOG` when set; safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("deskcast=info"),
    )
    .try_init();
}

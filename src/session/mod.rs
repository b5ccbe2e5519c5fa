//! Capture sessions: wire the engines, encoders, and a muxer into threads.
//!
//! Both session flavors share the same thread layout:
//!
//! - an audio tick thread driving [`AudioClockEngine::tick`] every 10 ms,
//! - an audio worker consuming mixed blocks from a small bounded channel
//!   (the tick thread never blocks on encoding; a full channel drops the
//!   block and counts it),
//! - a video pacing thread driving [`VideoClockEngine::tick`] every 5 ms,
//!   with encode and mux happening inline in its frame sink,
//! - for streaming, one more thread draining the packet queue to the sink.
//!
//! Capture callbacks (`on_captured_frame`, `on_audio_data`) only copy into
//! ring buffers and return; they never touch an encoder or a sink.
//!
//! [`AudioClockEngine::tick`]: crate::audio::AudioClockEngine::tick
//! [`VideoClockEngine::tick`]: crate::video::VideoClockEngine::tick

mod recorder;
mod streamer;

pub use recorder::RecorderSession;
pub use streamer::StreamerSession;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub(crate) const AUDIO_TICK: Duration = Duration::from_millis(10);
pub(crate) const VIDEO_TICK: Duration = Duration::from_millis(5);
pub(crate) const DRAIN_IDLE: Duration = Duration::from_millis(1);

/// Mixed audio blocks buffered between the tick thread and the encoder
/// worker. Deep enough to ride out an encoder hiccup, shallow enough that
/// a stuck worker sheds blocks instead of growing latency.
pub(crate) const AUDIO_CHANNEL_DEPTH: usize = 8;

/// How long the audio worker waits on its channel before re-checking the
/// stop flag. The engine callback holds a sender for the session's
/// lifetime, so the worker cannot rely on channel disconnection to exit.
pub(crate) const WORKER_IDLE: Duration = Duration::from_millis(50);

/// Spawn a named loop thread that calls `body` every `period` until the
/// stop flag flips.
pub(crate) fn spawn_ticker(
    name: &str,
    period: Duration,
    running: Arc<AtomicBool>,
    mut body: impl FnMut() + Send + 'static,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            while running.load(Ordering::Acquire) {
                body();
                std::thread::sleep(period);
            }
        })
        .expect("spawn session thread")
}

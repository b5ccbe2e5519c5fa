//! Audio clock master: mixes the capture sources into fixed-size blocks.
//!
//! The engine owns one ring buffer per source ("desktop" loopback and
//! "mic"). Capture threads feed it; a dedicated tick thread pulls exactly
//! one mixed block per tick. PTS is a pure sample counter: block size and
//! timestamps never depend on when `tick()` happens to run, so scheduling
//! jitter on the tick thread cannot show up as drift.
//!
//! Underrun strategy is silence padding, not buffer accumulation: a short
//! source contributes zeros for the missing tail of the block. The inaudible
//! gap is the price for never emitting partial blocks (which present as
//! crackle) and never letting PTS slip.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::audio::ring::SampleRingBuffer;
use crate::errors::EngineError;

/// Fixed engine sample rate in Hz.
pub const SAMPLE_RATE: u32 = 48_000;

/// Fixed channel count (interleaved stereo).
pub const CHANNELS: usize = 2;

/// Frames per mixed block. Every tick emits exactly this many frames.
pub const BLOCK_FRAMES: usize = 1024;

/// Ring capacity per source, in blocks. Enough to smooth capture jitter
/// without letting latency grow unbounded.
const RING_BLOCKS: usize = 10;

/// A source backlog above this many blocks is cut back before mixing;
/// anything deeper would surface as steadily growing latency.
const MAX_BACKLOG_BLOCKS: usize = 3;

/// Named audio capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSource {
    Desktop,
    Mic,
}

impl AudioSource {
    /// Parse the wire-level source name used by the capture callbacks.
    pub fn from_name(name: &str) -> Option<AudioSource> {
        match name {
            "desktop" => Some(AudioSource::Desktop),
            "mic" => Some(AudioSource::Mic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioSource::Desktop => "desktop",
            AudioSource::Mic => "mic",
        }
    }
}

/// One mixed, gain-applied, clamped block of interleaved stereo samples.
///
/// `pts_frames` is the cumulative frame count at the start of this block,
/// exact multiples of [`BLOCK_FRAMES`], by construction.
#[derive(Debug, Clone)]
pub struct MixedAudioBlock {
    pub samples: Vec<f32>,
    pub pts_frames: u64,
}

impl MixedAudioBlock {
    pub fn frames(&self) -> usize {
        self.samples.len() / CHANNELS
    }
}

/// Sink for finished blocks, invoked synchronously from `tick()`.
pub type BlockSink = Box<dyn FnMut(MixedAudioBlock) + Send>;

struct SourceBuffers {
    desktop: SampleRingBuffer,
    mic: SampleRingBuffer,
}

impl SourceBuffers {
    fn get_mut(&mut self, source: AudioSource) -> &mut SampleRingBuffer {
        match source {
            AudioSource::Desktop => &mut self.desktop,
            AudioSource::Mic => &mut self.mic,
        }
    }
}

/// Clock master for the audio path.
///
/// Thread model: any number of capture threads call [`feed`](Self::feed),
/// one tick thread calls [`tick`](Self::tick). The source buffers sit behind
/// a single mutex held only for copy-in/copy-out; mixing and the sink call
/// happen outside it.
pub struct AudioClockEngine {
    sources: Mutex<SourceBuffers>,
    callback: Mutex<Option<BlockSink>>,
    running: AtomicBool,
    frames_sent: AtomicU64,
    samples_dropped: AtomicU64,
    desktop_gain: f32,
    mic_gain: f32,
}

impl AudioClockEngine {
    /// Create an engine with explicit per-source gains.
    pub fn new(desktop_gain: f32, mic_gain: f32) -> Self {
        let capacity = BLOCK_FRAMES * RING_BLOCKS * CHANNELS;
        Self {
            sources: Mutex::new(SourceBuffers {
                desktop: SampleRingBuffer::new(capacity),
                mic: SampleRingBuffer::new(capacity),
            }),
            callback: Mutex::new(None),
            running: AtomicBool::new(false),
            frames_sent: AtomicU64::new(0),
            samples_dropped: AtomicU64::new(0),
            desktop_gain,
            mic_gain,
        }
    }

    /// Install the sink for finished blocks. Must happen before `start()`.
    pub fn initialize(&self, sink: BlockSink) {
        *self.callback.lock().unwrap() = Some(sink);
    }

    /// Reset counters and begin accepting feeds and ticks.
    pub fn start(&self) -> Result<(), EngineError> {
        if self.running.load(Ordering::Acquire) {
            return Err(EngineError::AudioError("engine already running".into()));
        }
        if self.callback.lock().unwrap().is_none() {
            return Err(EngineError::AudioError(
                "no block sink installed; call initialize() first".into(),
            ));
        }

        {
            let mut sources = self.sources.lock().unwrap();
            sources.desktop.clear();
            sources.mic.clear();
        }
        self.frames_sent.store(0, Ordering::Release);
        self.samples_dropped.store(0, Ordering::Release);
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    /// Stop the engine and drop buffered samples. Idempotent.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        let mut sources = self.sources.lock().unwrap();
        sources.desktop.clear();
        sources.mic.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Append captured samples to one source's ring buffer.
    ///
    /// Called from capture threads. Never blocks and never rejects: on
    /// overflow the oldest buffered samples are lost, counted in
    /// [`samples_dropped`](Self::samples_dropped). No-op while stopped.
    pub fn feed(&self, source: AudioSource, samples: &[f32]) {
        if samples.is_empty() || !self.running.load(Ordering::Acquire) {
            return;
        }

        let dropped = {
            let mut sources = self.sources.lock().unwrap();
            sources.get_mut(source).push(samples)
        };
        if dropped > 0 {
            self.samples_dropped
                .fetch_add(dropped as u64, Ordering::Relaxed);
            log::debug!(
                "audio {}: ring overflow, dropped {} oldest samples",
                source.as_str(),
                dropped
            );
        }
    }

    /// Produce exactly one mixed block and hand it to the sink.
    ///
    /// The single timing authority for the audio path: it always emits
    /// [`BLOCK_FRAMES`] frames no matter how much is buffered, padding
    /// short sources with silence and trimming any backlog deeper than
    /// [`MAX_BACKLOG_BLOCKS`] blocks from the front. No-op while stopped.
    pub fn tick(&self) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        let block_samples = BLOCK_FRAMES * CHANNELS;
        let mut desktop = vec![0.0f32; block_samples];
        let mut mic = vec![0.0f32; block_samples];
        let (desktop_n, mic_n);

        {
            let mut sources = self.sources.lock().unwrap();
            self.trim_backlog(&mut sources.desktop, AudioSource::Desktop);
            self.trim_backlog(&mut sources.mic, AudioSource::Mic);

            desktop_n = sources.desktop.peek(&mut desktop);
            sources.desktop.discard(desktop_n);
            mic_n = sources.mic.peek(&mut mic);
            sources.mic.discard(mic_n);
        }

        // Mix outside the buffer lock: gain, sum, clamp. Short sources
        // already read as silence past their copied length.
        let mut mixed = vec![0.0f32; block_samples];
        for (i, out) in mixed.iter_mut().enumerate() {
            let d = if i < desktop_n {
                desktop[i] * self.desktop_gain
            } else {
                0.0
            };
            let m = if i < mic_n { mic[i] * self.mic_gain } else { 0.0 };
            *out = (d + m).clamp(-1.0, 1.0);
        }

        let pts_frames = self.frames_sent.load(Ordering::Acquire);
        self.frames_sent
            .store(pts_frames + BLOCK_FRAMES as u64, Ordering::Release);

        let block = MixedAudioBlock {
            samples: mixed,
            pts_frames,
        };
        if let Some(sink) = self.callback.lock().unwrap().as_mut() {
            sink(block);
        }
    }

    /// Drop the oldest part of a backlog that exceeds the latency bound.
    fn trim_backlog(&self, ring: &mut SampleRingBuffer, source: AudioSource) {
        let limit = MAX_BACKLOG_BLOCKS * BLOCK_FRAMES * CHANNELS;
        if ring.len() > limit {
            let excess = ring.len() - limit;
            ring.discard(excess);
            self.samples_dropped
                .fetch_add(excess as u64, Ordering::Relaxed);
            log::warn!(
                "audio {}: backlog over {} blocks, dropped {} oldest samples",
                source.as_str(),
                MAX_BACKLOG_BLOCKS,
                excess
            );
        }
    }

    /// Cumulative frames emitted so far, which is the PTS of the next block.
    pub fn pts_frames(&self) -> u64 {
        self.frames_sent.load(Ordering::Acquire)
    }

    pub fn pts_seconds(&self) -> f64 {
        self.pts_frames() as f64 / SAMPLE_RATE as f64
    }

    /// Samples lost to ring overflow and backlog trimming.
    pub fn samples_dropped(&self) -> u64 {
        self.samples_dropped.load(Ordering::Relaxed)
    }
}

impl Default for AudioClockEngine {
    /// Gains tuned for screen recording: desktop loopback tends to sit low
    /// in the mix, the mic slightly above unity.
    fn default() -> Self {
        Self::new(1.8, 1.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn engine_with_channel(
        desktop_gain: f32,
        mic_gain: f32,
    ) -> (AudioClockEngine, mpsc::Receiver<MixedAudioBlock>) {
        let (tx, rx) = mpsc::channel();
        let engine = AudioClockEngine::new(desktop_gain, mic_gain);
        engine.initialize(Box::new(move |block| {
            let _ = tx.send(block);
        }));
        engine.start().unwrap();
        (engine, rx)
    }

    #[test]
    fn test_start_requires_sink() {
        let engine = AudioClockEngine::default();
        assert!(engine.start().is_err());
    }

    #[test]
    fn test_start_twice_fails() {
        let (engine, _rx) = engine_with_channel(1.0, 1.0);
        assert!(engine.start().is_err());
    }

    #[test]
    fn test_tick_always_emits_full_block() {
        let (engine, rx) = engine_with_channel(1.0, 1.0);

        // Empty, partial, exact, and overflowing backlogs all yield exactly
        // one full block per tick.
        engine.tick();
        engine.feed(AudioSource::Desktop, &vec![0.25; 100 * CHANNELS]);
        engine.tick();
        engine.feed(AudioSource::Desktop, &vec![0.25; BLOCK_FRAMES * CHANNELS]);
        engine.tick();
        engine.feed(AudioSource::Desktop, &vec![0.25; 2 * BLOCK_FRAMES * CHANNELS]);
        engine.tick();

        for _ in 0..4 {
            let block = rx.try_recv().unwrap();
            assert_eq!(block.frames(), BLOCK_FRAMES);
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_pts_is_sample_counter_not_wall_clock() {
        let (engine, rx) = engine_with_channel(1.0, 1.0);

        // Irregular tick spacing must not affect PTS.
        for i in 0..5 {
            if i == 2 {
                std::thread::sleep(std::time::Duration::from_millis(30));
            }
            engine.tick();
        }
        for i in 0..5u64 {
            let block = rx.try_recv().unwrap();
            assert_eq!(block.pts_frames, i * BLOCK_FRAMES as u64);
        }
        assert_eq!(engine.pts_frames(), 5 * BLOCK_FRAMES as u64);
    }

    #[test]
    fn test_mix_silence_padding_and_gains() {
        // 480 silent desktop frames + 480 mic frames at 0.5, one tick of
        // 1024 frames: mic gain applies to the head, tail is silence.
        let (engine, rx) = engine_with_channel(1.8, 1.2);
        engine.feed(AudioSource::Desktop, &vec![0.0; 480 * CHANNELS]);
        engine.feed(AudioSource::Mic, &vec![0.5; 480 * CHANNELS]);
        engine.tick();

        let block = rx.try_recv().unwrap();
        assert_eq!(block.frames(), BLOCK_FRAMES);
        assert_eq!(block.pts_frames, 0);
        for i in 0..480 * CHANNELS {
            assert!((block.samples[i] - 0.6).abs() < 1e-6, "sample {}", i);
        }
        for i in 480 * CHANNELS..BLOCK_FRAMES * CHANNELS {
            assert_eq!(block.samples[i], 0.0, "sample {}", i);
        }
        assert_eq!(engine.pts_frames(), BLOCK_FRAMES as u64);
    }

    #[test]
    fn test_mix_clamps_to_unit_range() {
        let (engine, rx) = engine_with_channel(1.8, 1.2);
        engine.feed(AudioSource::Desktop, &vec![1.0; BLOCK_FRAMES * CHANNELS]);
        engine.feed(AudioSource::Mic, &vec![1.0; BLOCK_FRAMES * CHANNELS]);
        engine.tick();

        let block = rx.try_recv().unwrap();
        assert!(block.samples.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_backlog_over_three_blocks_is_trimmed() {
        let (engine, rx) = engine_with_channel(1.0, 1.0);

        // 5 blocks of 0.1 then 1 block of 0.9: the trim must eat from the
        // front, so after it the head of the buffer is still 0.1 but only
        // 3 blocks deep.
        engine.feed(AudioSource::Mic, &vec![0.1; 5 * BLOCK_FRAMES * CHANNELS]);
        engine.feed(AudioSource::Mic, &vec![0.9; BLOCK_FRAMES * CHANNELS]);
        engine.tick();

        let block = rx.try_recv().unwrap();
        assert!((block.samples[0] - 0.1).abs() < 1e-6);
        // 6 blocks buffered, 3 kept.
        assert_eq!(
            engine.samples_dropped(),
            (3 * BLOCK_FRAMES * CHANNELS) as u64
        );

        // Two more ticks drain the remaining 0.1 block and the 0.9 block.
        engine.tick();
        let block = rx.try_recv().unwrap();
        assert!((block.samples[0] - 0.1).abs() < 1e-6);
        engine.tick();
        let block = rx.try_recv().unwrap();
        assert!((block.samples[0] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_exhausted_source_not_consumed_below_zero() {
        let (engine, rx) = engine_with_channel(1.0, 1.0);
        engine.feed(AudioSource::Desktop, &vec![0.3; 10 * CHANNELS]);
        engine.tick();
        let block = rx.try_recv().unwrap();
        assert!((block.samples[0] - 0.3).abs() < 1e-6);

        // Next tick: both sources empty, pure silence.
        engine.tick();
        let block = rx.try_recv().unwrap();
        assert!(block.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_feed_ignored_while_stopped() {
        let (engine, rx) = engine_with_channel(1.0, 1.0);
        engine.stop();
        engine.feed(AudioSource::Mic, &vec![0.5; 64]);
        engine.tick();
        assert!(rx.try_recv().is_err());
        assert!(!engine.is_running());
    }

    #[test]
    fn test_source_names() {
        assert_eq!(AudioSource::from_name("desktop"), Some(AudioSource::Desktop));
        assert_eq!(AudioSource::from_name("mic"), Some(AudioSource::Mic));
        assert_eq!(AudioSource::from_name("webcam"), None);
    }
}

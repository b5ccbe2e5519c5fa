//! Live streaming session: engines + encoders + [`StreamMuxer`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender, TrySendError};

use crate::audio::{AudioClockEngine, AudioSource, MixedAudioBlock, SAMPLE_RATE};
use crate::config::SessionConfig;
use crate::errors::EngineError;
use crate::mux::StreamMuxer;
use crate::queue::PacketQueue;
use crate::session::{
    spawn_ticker, AUDIO_CHANNEL_DEPTH, AUDIO_TICK, DRAIN_IDLE, VIDEO_TICK, WORKER_IDLE,
};
use crate::sink::{AudioEncoder, ContainerSink, StreamDesc, StreamKind, VideoEncoder};
use crate::stats::{SessionStats, StatsSnapshot};
use crate::video::{RawVideoFrame, VideoClockEngine};

/// Streams desktop video and mixed audio to a network sink.
///
/// Same thread layout as recording, plus a sender loop that drains the
/// packet queue. Encoders never wait on the network; when the sink stalls
/// the queue absorbs and eventually sheds delta video frames.
pub struct StreamerSession<S: ContainerSink + 'static> {
    config: SessionConfig,
    stats: Arc<SessionStats>,
    audio: Arc<AudioClockEngine>,
    video: Arc<VideoClockEngine>,
    muxer: Arc<StreamMuxer<S>>,
    video_encoder: Arc<Mutex<Box<dyn VideoEncoder>>>,
    audio_encoder: Arc<Mutex<Box<dyn AudioEncoder>>>,
    video_codec: String,
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
    block_tx: Option<Sender<MixedAudioBlock>>,
    video_index: Arc<AtomicU64>,
}

impl<S: ContainerSink + 'static> StreamerSession<S> {
    /// Validate the config and perform the stream handshake (header write).
    pub fn new(
        config: SessionConfig,
        video_encoder: Box<dyn VideoEncoder>,
        audio_encoder: Box<dyn AudioEncoder>,
        sink: S,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let mut video_desc = StreamDesc::new(StreamKind::Video, video_encoder.codec_name());
        video_desc.codec_config = video_encoder.codec_config();
        let mut audio_desc = StreamDesc::new(StreamKind::Audio, audio_encoder.codec_name());
        audio_desc.codec_config = audio_encoder.codec_config();
        let video_codec = video_desc.codec_name.clone();

        let queue = Arc::new(PacketQueue::new(
            config.queue_max_packets,
            config.queue_max_latency_ms,
        ));
        let muxer = StreamMuxer::new(
            sink,
            config.fps,
            SAMPLE_RATE,
            video_desc,
            audio_desc,
            queue,
        )?;

        Ok(Self {
            audio: Arc::new(AudioClockEngine::new(config.desktop_gain, config.mic_gain)),
            video: Arc::new(VideoClockEngine::new()),
            muxer: Arc::new(muxer),
            video_encoder: Arc::new(Mutex::new(video_encoder)),
            audio_encoder: Arc::new(Mutex::new(audio_encoder)),
            video_codec,
            stats: Arc::new(SessionStats::default()),
            running: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
            block_tx: None,
            video_index: Arc::new(AtomicU64::new(0)),
            config,
        })
    }

    /// Wire the pipeline and spawn the session threads.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.running.load(Ordering::Acquire) {
            return Err(EngineError::InitializationError(
                "session already running".into(),
            ));
        }

        let (block_tx, block_rx) = bounded::<MixedAudioBlock>(AUDIO_CHANNEL_DEPTH);

        let tx = block_tx.clone();
        let stats = self.stats.clone();
        self.audio.initialize(Box::new(move |block| {
            match tx.try_send(block) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    stats.audio_blocks_dropped.fetch_add(1, Ordering::Relaxed);
                    log::warn!("audio worker behind, dropped mixed block");
                }
                Err(TrySendError::Disconnected(_)) => {}
            }
        }));

        let encoder = self.video_encoder.clone();
        let muxer = self.muxer.clone();
        let stats = self.stats.clone();
        let index = self.video_index.clone();
        self.video.initialize(
            self.config.fps,
            Box::new(move |paced| {
                let packets = match encoder.lock().unwrap().encode(&paced.frame.data) {
                    Ok(packets) => packets,
                    Err(e) => {
                        log::error!("video encode failed: {e}");
                        return;
                    }
                };
                stats.video_frames_encoded.fetch_add(1, Ordering::Relaxed);
                if paced.duplicated {
                    stats.video_frames_duplicated.fetch_add(1, Ordering::Relaxed);
                }
                for packet in packets {
                    let frame_index = index.fetch_add(1, Ordering::Relaxed);
                    match muxer.write_video(&packet, frame_index) {
                        Ok(true) => {
                            stats.video_packets.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(false) => {
                            stats.video_packets_dropped.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            stats.video_packets_dropped.fetch_add(1, Ordering::Relaxed);
                            log::error!("video stage failed: {e}");
                        }
                    }
                }
            }),
        )?;

        self.audio.start()?;
        self.video.start()?;
        self.running.store(true, Ordering::Release);

        // Audio worker: channel -> encoder -> muxer queue. The engine
        // callback keeps a sender alive for the session's lifetime, so
        // disconnection alone cannot end this loop; the running flag is
        // checked on every idle timeout.
        let encoder = self.audio_encoder.clone();
        let muxer = self.muxer.clone();
        let stats = self.stats.clone();
        let running = self.running.clone();
        let worker = std::thread::Builder::new()
            .name("audio-worker".into())
            .spawn(move || loop {
                let block = match block_rx.recv_timeout(WORKER_IDLE) {
                    Ok(block) => block,
                    Err(RecvTimeoutError::Timeout) => {
                        if running.load(Ordering::Acquire) {
                            continue;
                        }
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                };
                let frames = block.frames() as u32;
                let packets =
                    match encoder.lock().unwrap().encode(&block.samples, frames) {
                        Ok(packets) => packets,
                        Err(e) => {
                            log::error!("audio encode failed: {e}");
                            continue;
                        }
                    };
                for packet in packets {
                    match muxer.write_audio(&packet) {
                        Ok(true) => {
                            stats.audio_packets.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(false) => {
                            stats.audio_packets_dropped.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            stats.audio_packets_dropped.fetch_add(1, Ordering::Relaxed);
                            log::error!("audio stage failed: {e}");
                        }
                    }
                }
            })
            .expect("spawn session thread");

        // Sender loop: drain the queue dry, then idle briefly. A sink
        // failure flips the muxer to disconnected and subsequent passes
        // become no-ops.
        let muxer = self.muxer.clone();
        let sender = spawn_ticker("net-sender", DRAIN_IDLE, self.running.clone(), move || {
            loop {
                match muxer.send_next_buffered() {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(_) => break,
                }
            }
        });

        let audio = self.audio.clone();
        let audio_ticker = spawn_ticker("audio-tick", AUDIO_TICK, self.running.clone(), move || {
            audio.tick();
        });
        let video = self.video.clone();
        let video_ticker = spawn_ticker("video-pace", VIDEO_TICK, self.running.clone(), move || {
            video.tick();
        });

        self.threads = vec![worker, sender, audio_ticker, video_ticker];
        self.block_tx = Some(block_tx);
        log::info!(
            "streaming session started: {}x{} @ {} fps, queue depth {}",
            self.config.width,
            self.config.height,
            self.config.fps,
            self.config.queue_max_packets
        );
        Ok(())
    }

    /// Stop the threads, flush the encoders, and drain what remains.
    pub fn stop(&mut self) -> Result<(), EngineError> {
        if !self.running.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        self.audio.stop();
        self.video.stop();
        self.block_tx = None;
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }

        for packet in self.video_encoder.lock().unwrap().flush()? {
            let frame_index = self.video_index.fetch_add(1, Ordering::Relaxed);
            if self.muxer.write_video(&packet, frame_index)? {
                self.stats.video_packets.fetch_add(1, Ordering::Relaxed);
            }
        }
        for packet in self.audio_encoder.lock().unwrap().flush()? {
            if self.muxer.write_audio(&packet)? {
                self.stats.audio_packets.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.muxer.flush()?;
        log::info!(
            "streaming session stopped: {} video / {} audio packets staged",
            self.muxer.video_packets_staged(),
            self.muxer.audio_packets_staged()
        );
        Ok(())
    }

    /// Hand a captured frame to the pacer. Returns `false` when the frame
    /// ring had to discard an older frame to take this one.
    pub fn on_captured_frame(&self, pixels: Vec<u8>, width: u32, height: u32) -> bool {
        self.stats
            .video_frames_captured
            .fetch_add(1, Ordering::Relaxed);
        self.video.push_frame(RawVideoFrame::new(pixels, width, height))
    }

    /// Feed captured samples from one source into the mixer.
    pub fn on_audio_data(&self, source: &str, samples: &[f32]) {
        match AudioSource::from_name(source) {
            Some(source) => self.audio.feed(source, samples),
            None => log::debug!("unknown audio source {source:?}, samples ignored"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether the sink is still accepting packets.
    pub fn is_connected(&self) -> bool {
        self.muxer.is_connected()
    }

    /// Whether the send queue is running hot; callers may lower quality.
    pub fn is_backpressure(&self) -> bool {
        self.muxer.is_backpressure()
    }

    pub fn video_codec(&self) -> &str {
        &self.video_codec
    }

    pub fn statistics(&self) -> StatsSnapshot {
        self.stats
            .audio_samples_dropped
            .store(self.audio.samples_dropped(), Ordering::Relaxed);
        self.stats
            .queue_packets_dropped
            .store(self.muxer.queue().packets_dropped(), Ordering::Relaxed);
        self.stats.snapshot()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Mixed audio position in seconds, the session's master clock.
    pub fn audio_clock_seconds(&self) -> f64 {
        self.audio.pts_seconds()
    }
}

impl<S: ContainerSink + 'static> Drop for StreamerSession<S> {
    fn drop(&mut self) {
        if self.running.load(Ordering::Acquire) {
            if let Err(e) = self.stop() {
                log::error!("session teardown failed: {e}");
            }
        }
    }
}

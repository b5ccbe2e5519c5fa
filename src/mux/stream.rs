//! Stream-mode muxer: shared millisecond timebase, bounded send queue.
//!
//! Unlike the file path, both streams here share a single millisecond
//! timebase so the receiving end can interleave them without rescaling.
//! Packets are staged in a [`PacketQueue`] and drained by a separate sender
//! loop; a slow or dead sink therefore backs up the queue (which sheds
//! delta video frames) instead of stalling the encoders.
//!
//! Two guards protect the outgoing stream: nothing leaves before the first
//! video keyframe (a receiver joining mid-stream cannot decode deltas), and
//! each stream's codec configuration record is sent exactly once before its
//! first media packet. The first sink failure marks the muxer disconnected
//! for good; reconnecting is a new session's job.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::errors::EngineError;
use crate::mux::{StreamClock, Timebase};
use crate::queue::PacketQueue;
use crate::sink::{ContainerSink, EncodedPacket, SinkPacket, StreamDesc, StreamKind};

struct TimingState {
    video_clock: StreamClock,
    audio_clock: StreamClock,
    samples_written: u64,
    keyframe_seen: bool,
}

struct SinkState<S: ContainerSink> {
    sink: S,
    video_config: Option<Bytes>,
    audio_config: Option<Bytes>,
    video_config_sent: bool,
    audio_config_sent: bool,
}

/// Writes encoded audio and video through a queue to a network sink.
pub struct StreamMuxer<S: ContainerSink> {
    timing: Mutex<TimingState>,
    sink: Mutex<SinkState<S>>,
    queue: Arc<PacketQueue>,
    fps: u32,
    sample_rate: u32,
    connected: AtomicBool,
    video_packets: AtomicU64,
    audio_packets: AtomicU64,
    timestamp_violations: AtomicU64,
    keyframe_waits: AtomicU64,
}

impl<S: ContainerSink> StreamMuxer<S> {
    /// Connect the sink: writes the header with both streams on the shared
    /// millisecond timebase. Header failure is fatal.
    pub fn new(
        mut sink: S,
        fps: u32,
        sample_rate: u32,
        mut video: StreamDesc,
        mut audio: StreamDesc,
        queue: Arc<PacketQueue>,
    ) -> Result<Self, EngineError> {
        if fps == 0 || sample_rate == 0 {
            return Err(EngineError::MuxingError(
                "fps and sample rate must be nonzero".into(),
            ));
        }
        video.kind = StreamKind::Video;
        video.timebase = Timebase::MILLIS;
        audio.kind = StreamKind::Audio;
        audio.timebase = Timebase::MILLIS;

        sink.write_header(&video, &audio)
            .map_err(|e| EngineError::SinkError(format!("stream header: {e}")))?;

        Ok(Self {
            timing: Mutex::new(TimingState {
                video_clock: StreamClock::default(),
                audio_clock: StreamClock::default(),
                samples_written: 0,
                keyframe_seen: false,
            }),
            sink: Mutex::new(SinkState {
                sink,
                video_config: video.codec_config,
                audio_config: audio.codec_config,
                video_config_sent: false,
                audio_config_sent: false,
            }),
            queue,
            fps,
            sample_rate,
            connected: AtomicBool::new(true),
            video_packets: AtomicU64::new(0),
            audio_packets: AtomicU64::new(0),
            timestamp_violations: AtomicU64::new(0),
            keyframe_waits: AtomicU64::new(0),
        })
    }

    /// Stage one encoded video packet at its paced frame index.
    ///
    /// Returns `Ok(false)` when the packet was dropped (waiting for the
    /// first keyframe, timestamp violation, or queue refusal).
    pub fn write_video(
        &self,
        packet: &EncodedPacket,
        frame_index: u64,
    ) -> Result<bool, EngineError> {
        if !self.connected.load(Ordering::Acquire) {
            return Ok(false);
        }

        let staged = {
            let mut timing = self.timing.lock().unwrap();
            if !timing.keyframe_seen {
                if !packet.keyframe {
                    self.keyframe_waits.fetch_add(1, Ordering::Relaxed);
                    log::debug!("dropping delta frame {} before first keyframe", frame_index);
                    return Ok(false);
                }
                timing.keyframe_seen = true;
            }

            let frame_tb = Timebase::per_second(self.fps as i64);
            let pts = frame_tb
                .rescale(frame_index as i64, Timebase::MILLIS)
                .ok_or_else(|| {
                    EngineError::MuxingError(format!("frame index {frame_index} overflow"))
                })?;
            let next = frame_tb
                .rescale(frame_index as i64 + 1, Timebase::MILLIS)
                .ok_or_else(|| {
                    EngineError::MuxingError(format!("frame index {frame_index} overflow"))
                })?;

            if !timing.video_clock.accept(pts) {
                self.timestamp_violations.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "video pts {}ms not after {:?}, rejected",
                    pts,
                    timing.video_clock.last_dts()
                );
                return Ok(false);
            }

            SinkPacket {
                stream: StreamKind::Video,
                pts,
                dts: pts,
                duration: (next - pts).max(1),
                keyframe: packet.keyframe,
                data: packet.data.clone(),
            }
        };

        if self.queue.add(staged) {
            self.video_packets.fetch_add(1, Ordering::Relaxed);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Stage one encoded audio packet at the cumulative sample position.
    pub fn write_audio(&self, packet: &EncodedPacket) -> Result<bool, EngineError> {
        if !self.connected.load(Ordering::Acquire) {
            return Ok(false);
        }

        let staged = {
            let mut timing = self.timing.lock().unwrap();
            let sample_tb = Timebase::per_second(self.sample_rate as i64);
            let start = timing.samples_written;
            let pts = sample_tb
                .rescale(start as i64, Timebase::MILLIS)
                .ok_or_else(|| {
                    EngineError::MuxingError(format!("sample position {start} overflow"))
                })?;
            let next = sample_tb
                .rescale((start + packet.sample_count) as i64, Timebase::MILLIS)
                .ok_or_else(|| {
                    EngineError::MuxingError(format!("sample position {start} overflow"))
                })?;

            // The counter advances whether or not the packet is accepted:
            // a drop must cost its time span, not stall the clock at a
            // position that keeps producing the same rejected PTS.
            timing.samples_written += packet.sample_count;

            if !timing.audio_clock.accept(pts) {
                self.timestamp_violations.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "audio pts {}ms not after {:?}, rejected",
                    pts,
                    timing.audio_clock.last_dts()
                );
                return Ok(false);
            }

            SinkPacket {
                stream: StreamKind::Audio,
                pts,
                dts: pts,
                duration: (next - pts).max(1),
                keyframe: true,
                data: packet.data.clone(),
            }
        };

        if self.queue.add(staged) {
            self.audio_packets.fetch_add(1, Ordering::Relaxed);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Send the lowest-DTS staged packet to the sink.
    ///
    /// Returns `Ok(false)` when the queue is empty or the muxer is
    /// disconnected. A sink failure disconnects permanently.
    pub fn send_next_buffered(&self) -> Result<bool, EngineError> {
        if !self.connected.load(Ordering::Acquire) {
            return Ok(false);
        }
        let packet = match self.queue.next() {
            Some(p) => p,
            None => return Ok(false),
        };

        let mut state = self.sink.lock().unwrap();
        if let Err(e) = self.send_with_config(&mut state, &packet) {
            self.connected.store(false, Ordering::Release);
            log::error!("sink write failed, disconnecting: {e}");
            return Err(e);
        }
        Ok(true)
    }

    fn send_with_config(
        &self,
        state: &mut SinkState<S>,
        packet: &SinkPacket,
    ) -> Result<(), EngineError> {
        let pending_config = match packet.stream {
            StreamKind::Video if !state.video_config_sent => {
                state.video_config_sent = true;
                state.video_config.clone()
            }
            StreamKind::Audio if !state.audio_config_sent => {
                state.audio_config_sent = true;
                state.audio_config.clone()
            }
            _ => None,
        };
        if let Some(config) = pending_config {
            state
                .sink
                .write_sequence_header(packet.stream, &config)
                .map_err(|e| EngineError::SinkError(format!("sequence header: {e}")))?;
        }
        state
            .sink
            .write_packet(packet)
            .map_err(|e| EngineError::SinkError(format!("packet send: {e}")))
    }

    /// Drain every staged packet, then write the trailer.
    pub fn flush(&self) -> Result<(), EngineError> {
        while self.send_next_buffered()? {}
        if self.connected.load(Ordering::Acquire) {
            let mut state = self.sink.lock().unwrap();
            state
                .sink
                .write_trailer()
                .map_err(|e| EngineError::SinkError(format!("stream trailer: {e}")))?;
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_backpressure(&self) -> bool {
        self.queue.is_backpressure()
    }

    pub fn queue(&self) -> &Arc<PacketQueue> {
        &self.queue
    }

    pub fn video_packets_staged(&self) -> u64 {
        self.video_packets.load(Ordering::Relaxed)
    }

    pub fn audio_packets_staged(&self) -> u64 {
        self.audio_packets.load(Ordering::Relaxed)
    }

    pub fn timestamp_violations(&self) -> u64 {
        self.timestamp_violations.load(Ordering::Relaxed)
    }
}

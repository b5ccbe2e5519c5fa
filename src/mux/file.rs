//! File-mode muxer: native timebases, counter-derived timestamps.
//!
//! Timestamps never come from the wall clock. Video PTS is the paced frame
//! index in `1/fps` units, so every frame has duration exactly 1; audio PTS
//! is the cumulative sample count in `1/sample_rate` units. Because both
//! counters are gapless by construction the output plays back at exactly
//! the nominal rate regardless of how capture timing wobbled.

use crate::errors::EngineError;
use crate::mux::{StreamClock, Timebase};
use crate::sink::{ContainerSink, EncodedPacket, SinkPacket, StreamDesc, StreamKind};

/// Writes encoded audio and video into a seekable container sink.
pub struct FileMuxer<S: ContainerSink> {
    sink: S,
    video_clock: StreamClock,
    audio_clock: StreamClock,
    samples_written: u64,
    video_packets: u64,
    audio_packets: u64,
    timestamp_violations: u64,
    finalized: bool,
}

impl<S: ContainerSink> FileMuxer<S> {
    /// Open the container: fixes each stream's timebase to its native unit
    /// and writes the header. Header failure is fatal.
    pub fn new(
        mut sink: S,
        fps: u32,
        sample_rate: u32,
        mut video: StreamDesc,
        mut audio: StreamDesc,
    ) -> Result<Self, EngineError> {
        if fps == 0 || sample_rate == 0 {
            return Err(EngineError::MuxingError(
                "fps and sample rate must be nonzero".into(),
            ));
        }
        video.kind = StreamKind::Video;
        video.timebase = Timebase::per_second(fps as i64);
        audio.kind = StreamKind::Audio;
        audio.timebase = Timebase::per_second(sample_rate as i64);

        sink.write_header(&video, &audio)
            .map_err(|e| EngineError::MuxingError(format!("container header: {e}")))?;

        Ok(Self {
            sink,
            video_clock: StreamClock::default(),
            audio_clock: StreamClock::default(),
            samples_written: 0,
            video_packets: 0,
            audio_packets: 0,
            timestamp_violations: 0,
            finalized: false,
        })
    }

    /// Write one encoded video packet at its paced frame index.
    ///
    /// Returns `Ok(false)` when the packet was rejected for a
    /// non-increasing timestamp; the container stays intact.
    pub fn write_video(
        &mut self,
        packet: &EncodedPacket,
        frame_index: u64,
    ) -> Result<bool, EngineError> {
        self.check_open()?;
        let dts = frame_index as i64;
        if !self.video_clock.accept(dts) {
            self.timestamp_violations += 1;
            log::warn!(
                "video packet dts {} not after {:?}, rejected",
                dts,
                self.video_clock.last_dts()
            );
            return Ok(false);
        }

        self.sink
            .write_packet(&SinkPacket {
                stream: StreamKind::Video,
                pts: dts,
                dts,
                duration: 1,
                keyframe: packet.keyframe,
                data: packet.data.clone(),
            })
            .map_err(|e| EngineError::SinkError(format!("video write: {e}")))?;
        self.video_packets += 1;
        Ok(true)
    }

    /// Write one encoded audio packet at the cumulative sample position.
    pub fn write_audio(&mut self, packet: &EncodedPacket) -> Result<bool, EngineError> {
        self.check_open()?;
        let dts = self.samples_written as i64;
        if !self.audio_clock.accept(dts) {
            self.timestamp_violations += 1;
            log::warn!(
                "audio packet dts {} not after {:?}, rejected",
                dts,
                self.audio_clock.last_dts()
            );
            return Ok(false);
        }

        self.sink
            .write_packet(&SinkPacket {
                stream: StreamKind::Audio,
                pts: dts,
                dts,
                duration: packet.sample_count as i64,
                keyframe: true,
                data: packet.data.clone(),
            })
            .map_err(|e| EngineError::SinkError(format!("audio write: {e}")))?;
        self.samples_written += packet.sample_count;
        self.audio_packets += 1;
        Ok(true)
    }

    /// Write the trailer and close the container. Idempotent.
    pub fn finalize(&mut self) -> Result<(), EngineError> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        self.sink
            .write_trailer()
            .map_err(|e| EngineError::MuxingError(format!("container trailer: {e}")))?;
        log::info!(
            "file muxer closed: {} video / {} audio packets, {} timestamp rejects",
            self.video_packets,
            self.audio_packets,
            self.timestamp_violations
        );
        Ok(())
    }

    fn check_open(&self) -> Result<(), EngineError> {
        if self.finalized {
            return Err(EngineError::MuxingError(
                "muxer already finalized".into(),
            ));
        }
        Ok(())
    }

    pub fn video_packets_written(&self) -> u64 {
        self.video_packets
    }

    pub fn audio_packets_written(&self) -> u64 {
        self.audio_packets
    }

    pub fn timestamp_violations(&self) -> u64 {
        self.timestamp_violations
    }
}

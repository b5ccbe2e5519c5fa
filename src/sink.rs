//! Collaborator boundaries: encoders and container/wire sinks.
//!
//! The engine never touches codec internals or container byte formats.
//! Encoders are "raw block in, compressed packets out" and sinks are
//! "write a packet with these fields to this stream". Platform capture,
//! codecs, and serialization all live behind these traits.

use bytes::Bytes;

use crate::errors::EngineError;
use crate::mux::Timebase;

/// Identity of a logical stream inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Video => "video",
            StreamKind::Audio => "audio",
        }
    }
}

/// One compressed packet produced by an encoder.
///
/// `sample_count` is the span the packet covers in the stream's native unit:
/// frames for video, samples-per-channel for audio. The muxer needs it to
/// advance its counters; the encoder must fill it in.
#[derive(Debug, Clone)]
pub struct EncodedPacket {
    pub data: Bytes,
    pub keyframe: bool,
    pub sample_count: u64,
}

impl EncodedPacket {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A fully timestamped packet on its way to a sink.
///
/// Timestamps are expressed in the time base the owning muxer declared for
/// the stream. Ownership of the payload transfers with the packet; `Bytes`
/// releases the backing storage exactly once.
#[derive(Debug, Clone)]
pub struct SinkPacket {
    pub stream: StreamKind,
    pub pts: i64,
    pub dts: i64,
    pub duration: i64,
    pub keyframe: bool,
    pub data: Bytes,
}

/// Static description of one stream, handed to the sink before any packet.
#[derive(Debug, Clone)]
pub struct StreamDesc {
    pub kind: StreamKind,
    pub codec_name: String,
    /// Time base every packet timestamp for this stream is counted in.
    pub timebase: Timebase,
    /// Opaque codec configuration record (e.g. decoder setup data), if the
    /// codec requires one before its packets are decodable.
    pub codec_config: Option<Bytes>,
}

impl StreamDesc {
    /// A description with the stream's default timebase and no codec
    /// configuration; the muxer fixes the timebase when it opens.
    pub fn new(kind: StreamKind, codec_name: &str) -> Self {
        Self {
            kind,
            codec_name: codec_name.to_string(),
            timebase: Timebase::MILLIS,
            codec_config: None,
        }
    }

    pub fn with_codec_config(mut self, config: Bytes) -> Self {
        self.codec_config = Some(config);
        self
    }
}

/// Video encode boundary: raw pixel buffer in, compressed packets out.
pub trait VideoEncoder: Send {
    /// Encode one raw frame. May return zero, one, or several packets.
    fn encode(&mut self, frame: &[u8]) -> Result<Vec<EncodedPacket>, EngineError>;

    /// Drain any packets still buffered inside the encoder.
    fn flush(&mut self) -> Result<Vec<EncodedPacket>, EngineError>;

    fn codec_name(&self) -> &str;

    /// Codec configuration record for sequence headers, if any.
    fn codec_config(&self) -> Option<Bytes> {
        None
    }
}

/// Audio encode boundary: interleaved f32 PCM in, compressed packets out.
pub trait AudioEncoder: Send {
    /// Encode `frames` interleaved stereo frames. `samples.len()` must be
    /// `frames * channels`.
    fn encode(&mut self, samples: &[f32], frames: u32) -> Result<Vec<EncodedPacket>, EngineError>;

    fn flush(&mut self) -> Result<Vec<EncodedPacket>, EngineError>;

    fn codec_name(&self) -> &str;

    fn codec_config(&self) -> Option<Bytes> {
        None
    }
}

/// Container or wire output boundary.
///
/// The muxer drives this in a fixed order: `write_header` once, then for each
/// stream optionally one `write_sequence_header` before that stream's first
/// media packet, then `write_packet` calls, then `write_trailer` once.
/// Implementations report failures as `EngineError::SinkError`; the muxer
/// marks itself disconnected on the first such failure and never retries.
pub trait ContainerSink: Send {
    fn write_header(&mut self, video: &StreamDesc, audio: &StreamDesc)
    -> Result<(), EngineError>;

    /// One-time codec configuration record for a stream. Only called for
    /// streams whose `StreamDesc` carried a `codec_config`.
    fn write_sequence_header(
        &mut self,
        kind: StreamKind,
        config: &Bytes,
    ) -> Result<(), EngineError>;

    fn write_packet(&mut self, packet: &SinkPacket) -> Result<(), EngineError>;

    fn write_trailer(&mut self) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_kind_names() {
        assert_eq!(StreamKind::Video.as_str(), "video");
        assert_eq!(StreamKind::Audio.as_str(), "audio");
    }

    #[test]
    fn test_encoded_packet_empty() {
        let pkt = EncodedPacket {
            data: Bytes::new(),
            keyframe: false,
            sample_count: 0,
        };
        assert!(pkt.is_empty());
    }
}

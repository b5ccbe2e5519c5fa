//! Shared test doubles: deterministic encoders and recording sinks.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use deskcast::{
    ContainerSink, EncodedPacket, EngineError, SinkPacket, StreamDesc, StreamKind, VideoEncoder,
};

/// One-packet-per-frame video encoder with a fixed keyframe interval.
pub struct MockVideoEncoder {
    frames_seen: u64,
    keyframe_interval: u64,
}

impl MockVideoEncoder {
    pub fn new(keyframe_interval: u64) -> Self {
        Self {
            frames_seen: 0,
            keyframe_interval,
        }
    }
}

impl VideoEncoder for MockVideoEncoder {
    fn encode(&mut self, frame: &[u8]) -> Result<Vec<EncodedPacket>, EngineError> {
        let keyframe = self.frames_seen % self.keyframe_interval == 0;
        self.frames_seen += 1;
        Ok(vec![EncodedPacket {
            data: Bytes::from(frame[..frame.len().min(16)].to_vec()),
            keyframe,
            sample_count: 0,
        }])
    }

    fn flush(&mut self) -> Result<Vec<EncodedPacket>, EngineError> {
        Ok(Vec::new())
    }

    fn codec_name(&self) -> &str {
        "h264"
    }

    fn codec_config(&self) -> Option<Bytes> {
        Some(Bytes::from_static(b"sps-pps"))
    }
}

/// Pass-through audio encoder: one packet per mixed block.
pub struct MockAudioEncoder;

impl deskcast::AudioEncoder for MockAudioEncoder {
    fn encode(&mut self, samples: &[f32], frames: u32) -> Result<Vec<EncodedPacket>, EngineError> {
        let mut data = Vec::with_capacity(samples.len().min(4) * 4);
        for s in samples.iter().take(4) {
            data.extend_from_slice(&s.to_le_bytes());
        }
        Ok(vec![EncodedPacket {
            data: Bytes::from(data),
            keyframe: true,
            sample_count: frames as u64,
        }])
    }

    fn flush(&mut self) -> Result<Vec<EncodedPacket>, EngineError> {
        Ok(Vec::new())
    }

    fn codec_name(&self) -> &str {
        "opus"
    }

    fn codec_config(&self) -> Option<Bytes> {
        Some(Bytes::from_static(b"opus-head"))
    }
}

/// Everything a sink observed, in arrival order.
#[derive(Debug, Clone)]
pub enum SinkEvent {
    Header,
    SequenceHeader(StreamKind),
    Packet(SinkPacket),
    Trailer,
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub events: Vec<SinkEvent>,
}

impl Recorded {
    pub fn packets(&self) -> Vec<&SinkPacket> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Packet(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn stream_packets(&self, kind: StreamKind) -> Vec<&SinkPacket> {
        self.packets()
            .into_iter()
            .filter(|p| p.stream == kind)
            .collect()
    }

    pub fn has_trailer(&self) -> bool {
        matches!(self.events.last(), Some(SinkEvent::Trailer))
    }
}

/// In-memory sink that records every call for later assertions.
pub struct CaptureSink {
    recorded: Arc<Mutex<Recorded>>,
}

impl CaptureSink {
    pub fn new() -> (Self, Arc<Mutex<Recorded>>) {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        (
            Self {
                recorded: recorded.clone(),
            },
            recorded,
        )
    }
}

impl ContainerSink for CaptureSink {
    fn write_header(
        &mut self,
        _video: &StreamDesc,
        _audio: &StreamDesc,
    ) -> Result<(), EngineError> {
        self.recorded.lock().unwrap().events.push(SinkEvent::Header);
        Ok(())
    }

    fn write_sequence_header(
        &mut self,
        kind: StreamKind,
        _config: &Bytes,
    ) -> Result<(), EngineError> {
        self.recorded
            .lock()
            .unwrap()
            .events
            .push(SinkEvent::SequenceHeader(kind));
        Ok(())
    }

    fn write_packet(&mut self, packet: &SinkPacket) -> Result<(), EngineError> {
        self.recorded
            .lock()
            .unwrap()
            .events
            .push(SinkEvent::Packet(packet.clone()));
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<(), EngineError> {
        self.recorded.lock().unwrap().events.push(SinkEvent::Trailer);
        Ok(())
    }
}

/// Minimal on-disk sink: length-prefixed records, enough to prove the
/// pipeline produces bytes.
pub struct FileSink {
    file: File,
}

impl FileSink {
    pub fn create(file: File) -> Self {
        Self { file }
    }
}

impl ContainerSink for FileSink {
    fn write_header(
        &mut self,
        video: &StreamDesc,
        audio: &StreamDesc,
    ) -> Result<(), EngineError> {
        self.file
            .write_all(format!("hdr {} {}\n", video.codec_name, audio.codec_name).as_bytes())
            .map_err(|e| EngineError::SinkError(e.to_string()))
    }

    fn write_sequence_header(
        &mut self,
        kind: StreamKind,
        config: &Bytes,
    ) -> Result<(), EngineError> {
        self.file
            .write_all(format!("cfg {} {}\n", kind.as_str(), config.len()).as_bytes())
            .map_err(|e| EngineError::SinkError(e.to_string()))
    }

    fn write_packet(&mut self, packet: &SinkPacket) -> Result<(), EngineError> {
        self.file
            .write_all(
                format!(
                    "pkt {} {} {} {}\n",
                    packet.stream.as_str(),
                    packet.pts,
                    packet.duration,
                    packet.data.len()
                )
                .as_bytes(),
            )
            .map_err(|e| EngineError::SinkError(e.to_string()))
    }

    fn write_trailer(&mut self) -> Result<(), EngineError> {
        self.file
            .write_all(b"end\n")
            .map_err(|e| EngineError::SinkError(e.to_string()))
    }
}

//! Session configuration with quality presets.

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::queue::{DEFAULT_MAX_LATENCY, DEFAULT_MAX_PACKETS};

/// Coarse quality presets mapped onto resolution and bitrates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Low,
    Medium,
    High,
    Ultra,
}

/// Everything a session needs to start, file or stream mode alike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Target video bitrate in bits per second.
    pub video_bitrate: u32,
    /// Target audio bitrate in bits per second.
    pub audio_bitrate: u32,
    pub desktop_gain: f32,
    pub mic_gain: f32,
    /// Streaming only: packet queue depth.
    pub queue_max_packets: usize,
    /// Streaming only: maximum queued DTS span in milliseconds.
    pub queue_max_latency_ms: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::preset(QualityPreset::High)
    }
}

impl SessionConfig {
    pub fn preset(quality: QualityPreset) -> Self {
        let (width, height, fps, video_bitrate) = match quality {
            QualityPreset::Low => (1280, 720, 24, 2_500_000),
            QualityPreset::Medium => (1920, 1080, 30, 5_000_000),
            QualityPreset::High => (1920, 1080, 60, 8_000_000),
            QualityPreset::Ultra => (3840, 2160, 60, 20_000_000),
        };
        Self {
            width,
            height,
            fps,
            video_bitrate,
            audio_bitrate: 160_000,
            desktop_gain: 1.8,
            mic_gain: 1.2,
            queue_max_packets: DEFAULT_MAX_PACKETS,
            queue_max_latency_ms: DEFAULT_MAX_LATENCY,
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_gains(mut self, desktop: f32, mic: f32) -> Self {
        self.desktop_gain = desktop;
        self.mic_gain = mic;
        self
    }

    pub fn with_queue_limits(mut self, max_packets: usize, max_latency_ms: i64) -> Self {
        self.queue_max_packets = max_packets;
        self.queue_max_latency_ms = max_latency_ms;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.width == 0 || self.height == 0 {
            return Err(EngineError::ConfigError("resolution must be nonzero".into()));
        }
        if self.fps == 0 || self.fps > 240 {
            return Err(EngineError::ConfigError(format!(
                "fps {} out of range 1..=240",
                self.fps
            )));
        }
        if !(0.0..=4.0).contains(&self.desktop_gain) || !(0.0..=4.0).contains(&self.mic_gain) {
            return Err(EngineError::ConfigError("gains must be in 0.0..=4.0".into()));
        }
        if self.queue_max_packets == 0 || self.queue_max_latency_ms <= 0 {
            return Err(EngineError::ConfigError(
                "queue limits must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Bytes in one raw RGBA frame at this resolution.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

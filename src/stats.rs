//! Session counters, shared by injection rather than globals.
//!
//! Every pipeline stage holds an `Arc<SessionStats>` and bumps atomics;
//! callers take a [`StatsSnapshot`] whenever they want a consistent-enough
//! view for display or logging.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters for one capture session.
#[derive(Debug, Default)]
pub struct SessionStats {
    pub video_frames_captured: AtomicU64,
    pub video_frames_encoded: AtomicU64,
    pub video_frames_duplicated: AtomicU64,
    pub video_packets: AtomicU64,
    pub audio_packets: AtomicU64,
    pub video_packets_dropped: AtomicU64,
    pub audio_packets_dropped: AtomicU64,
    pub queue_packets_dropped: AtomicU64,
    pub audio_blocks_dropped: AtomicU64,
    pub audio_samples_dropped: AtomicU64,
}

impl SessionStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            video_frames_captured: self.video_frames_captured.load(Ordering::Relaxed),
            video_frames_encoded: self.video_frames_encoded.load(Ordering::Relaxed),
            video_frames_duplicated: self.video_frames_duplicated.load(Ordering::Relaxed),
            video_packets: self.video_packets.load(Ordering::Relaxed),
            audio_packets: self.audio_packets.load(Ordering::Relaxed),
            video_packets_dropped: self.video_packets_dropped.load(Ordering::Relaxed),
            audio_packets_dropped: self.audio_packets_dropped.load(Ordering::Relaxed),
            queue_packets_dropped: self.queue_packets_dropped.load(Ordering::Relaxed),
            audio_blocks_dropped: self.audio_blocks_dropped.load(Ordering::Relaxed),
            audio_samples_dropped: self.audio_samples_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SessionStats`], serializable for status APIs.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatsSnapshot {
    pub video_frames_captured: u64,
    pub video_frames_encoded: u64,
    pub video_frames_duplicated: u64,
    pub video_packets: u64,
    pub audio_packets: u64,
    pub video_packets_dropped: u64,
    pub audio_packets_dropped: u64,
    pub queue_packets_dropped: u64,
    pub audio_blocks_dropped: u64,
    pub audio_samples_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = Arc::new(SessionStats::default());
        stats.video_frames_captured.fetch_add(3, Ordering::Relaxed);
        stats.audio_packets.fetch_add(2, Ordering::Relaxed);
        let snap = stats.snapshot();
        assert_eq!(snap.video_frames_captured, 3);
        assert_eq!(snap.audio_packets, 2);
        assert_eq!(snap.video_packets_dropped, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snap = SessionStats::default().snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"video_frames_duplicated\":0"));
    }
}

//! Bounded, DTS-ordered packet queue between the muxer and a network sink.
//!
//! When the sink cannot keep up the queue sheds load by priority rather
//! than blocking: audio and video keyframes are never evicted (losing
//! either breaks playback outright), delta video frames go first. Packets
//! are kept sorted by DTS on insert so the drain loop can always send the
//! oldest timestamp next.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::sink::{SinkPacket, StreamKind};

/// Default queue depth in packets.
pub const DEFAULT_MAX_PACKETS: usize = 100;

/// Default bound on the DTS span held in the queue, in queue timebase
/// units (milliseconds for the streaming path).
pub const DEFAULT_MAX_LATENCY: i64 = 2_000;

/// DTS-ordered bounded packet queue.
pub struct PacketQueue {
    packets: Mutex<VecDeque<SinkPacket>>,
    max_packets: usize,
    max_latency: i64,
    added: AtomicU64,
    dropped: AtomicU64,
}

impl PacketQueue {
    pub fn new(max_packets: usize, max_latency: i64) -> Self {
        Self {
            packets: Mutex::new(VecDeque::with_capacity(max_packets)),
            max_packets,
            max_latency,
            added: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Insert a packet in DTS order.
    ///
    /// On capacity or latency pressure, evicts the oldest delta video
    /// packet to make room. Returns `false` (packet refused) when the
    /// queue is full of protected packets only.
    pub fn add(&self, packet: SinkPacket) -> bool {
        let mut packets = self.packets.lock().unwrap();

        if packets.len() >= self.max_packets {
            if Self::evict_delta_video(&mut packets) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            } else {
                drop(packets);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "packet queue full of protected packets, refused {} dts={}",
                    packet.stream.as_str(),
                    packet.dts
                );
                return false;
            }
        }

        if Self::span_of(&packets) > self.max_latency {
            if Self::evict_delta_video(&mut packets) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // Eviction may not have been possible, or may not have freed
            // enough span; either way the packet is refused.
            if Self::span_of(&packets) > self.max_latency {
                drop(packets);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "packet queue latency over {} units, refused {} dts={}",
                    self.max_latency,
                    packet.stream.as_str(),
                    packet.dts
                );
                return false;
            }
        }

        // Insert after any packet with an equal DTS so arrival order breaks
        // ties.
        let pos = packets.partition_point(|p| p.dts <= packet.dts);
        packets.insert(pos, packet);
        self.added.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// DTS distance between the newest and oldest queued packet.
    fn span_of(packets: &VecDeque<SinkPacket>) -> i64 {
        match (packets.front(), packets.back()) {
            (Some(front), Some(back)) => back.dts - front.dts,
            _ => 0,
        }
    }

    fn evict_delta_video(packets: &mut VecDeque<SinkPacket>) -> bool {
        let victim = packets
            .iter()
            .position(|p| p.stream == StreamKind::Video && !p.keyframe);
        match victim {
            Some(pos) => {
                if let Some(evicted) = packets.remove(pos) {
                    log::debug!("evicted delta video packet dts={}", evicted.dts);
                }
                true
            }
            None => false,
        }
    }

    /// Pop the packet with the lowest DTS.
    pub fn next(&self) -> Option<SinkPacket> {
        self.packets.lock().unwrap().pop_front()
    }

    /// Advisory check for producers that want to throttle before encoding.
    /// False at capacity or over the latency span; `add` may still succeed
    /// by evicting.
    pub fn can_accept(&self) -> bool {
        let packets = self.packets.lock().unwrap();
        packets.len() < self.max_packets && Self::span_of(&packets) <= self.max_latency
    }

    /// The sink is not keeping up: queue at capacity or its DTS span over
    /// the latency bound.
    pub fn is_backpressure(&self) -> bool {
        let packets = self.packets.lock().unwrap();
        packets.len() >= self.max_packets || Self::span_of(&packets) > self.max_latency
    }

    pub fn len(&self) -> usize {
        self.packets.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.lock().unwrap().is_empty()
    }

    pub fn clear(&self) {
        self.packets.lock().unwrap().clear();
    }

    pub fn packets_added(&self) -> u64 {
        self.added.load(Ordering::Relaxed)
    }

    /// Refused plus evicted packets.
    pub fn packets_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PACKETS, DEFAULT_MAX_LATENCY)
    }
}

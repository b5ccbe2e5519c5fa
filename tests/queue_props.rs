//! Property tests for packet queue ordering and timestamp rescaling.

use bytes::Bytes;
use proptest::prelude::*;

use deskcast::{PacketQueue, SinkPacket, StreamKind, Timebase};

fn arb_packet() -> impl Strategy<Value = SinkPacket> {
    (0i64..10_000, any::<bool>(), any::<bool>()).prop_map(|(dts, video, keyframe)| SinkPacket {
        stream: if video {
            StreamKind::Video
        } else {
            StreamKind::Audio
        },
        pts: dts,
        dts,
        duration: 1,
        keyframe: keyframe || !video,
        data: Bytes::from_static(b"p"),
    })
}

proptest! {
    #[test]
    fn prop_queue_pops_in_nondecreasing_dts_order(
        packets in prop::collection::vec(arb_packet(), 1..200)
    ) {
        let queue = PacketQueue::new(500, i64::MAX);
        for p in packets {
            prop_assert!(queue.add(p));
        }
        let mut last = i64::MIN;
        while let Some(p) = queue.next() {
            prop_assert!(p.dts >= last);
            last = p.dts;
        }
    }

    #[test]
    fn prop_accepted_audio_is_never_evicted(
        packets in prop::collection::vec(arb_packet(), 1..300)
    ) {
        let queue = PacketQueue::new(16, 1_000);
        let mut accepted_audio = Vec::new();
        for p in packets {
            let is_audio = p.stream == StreamKind::Audio;
            let dts = p.dts;
            if queue.add(p) && is_audio {
                accepted_audio.push(dts);
            }
        }
        let mut popped_audio: Vec<i64> = Vec::new();
        while let Some(p) = queue.next() {
            if p.stream == StreamKind::Audio {
                popped_audio.push(p.dts);
            }
        }
        accepted_audio.sort_unstable();
        prop_assert_eq!(popped_audio, accepted_audio);
    }

    #[test]
    fn prop_queue_never_exceeds_capacity(
        packets in prop::collection::vec(arb_packet(), 1..300)
    ) {
        let queue = PacketQueue::new(16, i64::MAX);
        for p in packets {
            queue.add(p);
            prop_assert!(queue.len() <= 16);
        }
    }

    #[test]
    fn prop_rescale_preserves_order(
        a in 0i64..1_000_000,
        b in 0i64..1_000_000,
        den in 1i64..200_000
    ) {
        let tb = Timebase::per_second(den);
        let ra = tb.rescale(a, Timebase::MILLIS).unwrap();
        let rb = tb.rescale(b, Timebase::MILLIS).unwrap();
        if a <= b {
            prop_assert!(ra <= rb);
        } else {
            prop_assert!(ra >= rb);
        }
    }

    #[test]
    fn prop_rescale_round_trip_error_is_bounded(
        value in 0i64..10_000_000,
        den in 1_000i64..200_000
    ) {
        let tb = Timebase::per_second(den);
        let ms = tb.rescale(value, Timebase::MILLIS).unwrap();
        let back = Timebase::MILLIS.rescale(ms, tb).unwrap();
        // One round trip may lose at most half a millisecond of units.
        let bound = den / 2_000 + 1;
        prop_assert!((back - value).abs() <= bound);
    }
}

//! Muxing layer: timestamp assignment and monotonicity enforcement.
//!
//! Both muxer variants share one discipline: container timestamps come from
//! counters (frame index, cumulative samples), never from sampling a clock
//! at write time, and DTS written to the sink is strictly increasing per
//! stream. The variants differ only in time-base policy:
//!
//! - [`FileMuxer`]: each stream keeps its native time base (`1/fps` video,
//!   `1/sample_rate` audio); no cross-stream rescaling at all.
//! - [`StreamMuxer`]: both streams are rescaled into a shared millisecond
//!   time base chosen by the wire protocol, and packets pass through a
//!   [`crate::queue::PacketQueue`] before hitting the sink.

mod file;
mod stream;

pub use file::FileMuxer;
pub use stream::StreamMuxer;

/// Sentinel for "no timestamp". Never written to a sink; any rescale of it
/// is rejected.
pub const NO_TIMESTAMP: i64 = i64::MIN;

/// The unit fraction a stream's timestamps are counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timebase {
    pub num: i64,
    pub den: i64,
}

impl Timebase {
    /// Millisecond time base used on the wire by the streaming variant.
    pub const MILLIS: Timebase = Timebase { num: 1, den: 1000 };

    /// `1/den`, the usual per-frame or per-sample time base.
    pub fn per_second(den: i64) -> Timebase {
        Timebase { num: 1, den }
    }

    /// Rescale `value` from this time base into `dst`, rounding half away
    /// from zero. Returns `None` when the value is the [`NO_TIMESTAMP`]
    /// sentinel or the result does not fit in an `i64`; a lossy rescale is
    /// never silently written.
    pub fn rescale(&self, value: i64, dst: Timebase) -> Option<i64> {
        if value == NO_TIMESTAMP {
            return None;
        }
        let num = value as i128 * self.num as i128 * dst.den as i128;
        let den = self.den as i128 * dst.num as i128;
        if den == 0 {
            return None;
        }
        // Round half away from zero so repeated rescaling cannot drift
        // systematically in one direction.
        let half = den.abs() / 2;
        let rounded = if num >= 0 {
            (num + half) / den
        } else {
            (num - half) / den
        };
        i64::try_from(rounded).ok()
    }
}

/// Per-stream timestamp bookkeeping inside a muxer.
///
/// Invariant: DTS values accepted through [`StreamClock::accept`] are strictly
/// increasing. A violating packet is rejected before it can reach the sink.
#[derive(Debug, Default)]
pub(crate) struct StreamClock {
    last_dts: Option<i64>,
}

impl StreamClock {
    /// Admit `dts` if it is strictly greater than the last accepted DTS.
    pub fn accept(&mut self, dts: i64) -> bool {
        match self.last_dts {
            Some(last) if dts <= last => false,
            _ => {
                self.last_dts = Some(dts);
                true
            }
        }
    }

    pub fn last_dts(&self) -> Option<i64> {
        self.last_dts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_frame_index_to_millis() {
        let fps = Timebase::per_second(30);
        // Frame 30 at 30 fps is exactly one second.
        assert_eq!(fps.rescale(30, Timebase::MILLIS), Some(1000));
        // Frame 1 at 30 fps is 33.33 ms, rounded to 33.
        assert_eq!(fps.rescale(1, Timebase::MILLIS), Some(33));
        // Half-away-from-zero: frame 1 at 16 fps = 62.5 ms rounds to 63.
        assert_eq!(Timebase::per_second(16).rescale(1, Timebase::MILLIS), Some(63));
    }

    #[test]
    fn test_rescale_samples_to_millis() {
        let sr = Timebase::per_second(48_000);
        assert_eq!(sr.rescale(48_000, Timebase::MILLIS), Some(1000));
        assert_eq!(sr.rescale(1024, Timebase::MILLIS), Some(21)); // 21.33ms
    }

    #[test]
    fn test_rescale_rejects_sentinel_and_overflow() {
        let tb = Timebase::per_second(30);
        assert_eq!(tb.rescale(NO_TIMESTAMP, Timebase::MILLIS), None);
        assert_eq!(tb.rescale(i64::MAX, Timebase::MILLIS), None);
    }

    #[test]
    fn test_identity_rescale_is_lossless() {
        let tb = Timebase::per_second(48_000);
        for v in [0i64, 1, 1024, 123_456_789] {
            assert_eq!(tb.rescale(v, tb), Some(v));
        }
    }

    #[test]
    fn test_stream_clock_strictly_increasing() {
        let mut clock = StreamClock::default();
        assert!(clock.accept(0));
        assert!(clock.accept(100));
        assert!(!clock.accept(100));
        assert!(!clock.accept(90));
        assert_eq!(clock.last_dts(), Some(100));
        assert!(clock.accept(101));
    }
}

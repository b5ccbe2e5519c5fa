//! Fixed-capacity ring buffer of interleaved audio samples.
//!
//! One of these sits behind each audio source inside the clock engine. The
//! capture callback pushes, the tick path drains; overflow drops the oldest
//! samples so the newest data always wins. Both sides touch it only under
//! the engine's lock, in short copy-in/copy-out critical sections.

/// Circular buffer of interleaved f32 samples with overwrite-oldest
/// semantics.
///
/// Invariant: `len <= capacity`. A push that would exceed capacity first
/// discards exactly the overflow amount from the front.
#[derive(Debug)]
pub struct SampleRingBuffer {
    buf: Vec<f32>,
    head: usize,
    len: usize,
}

impl SampleRingBuffer {
    /// Create a buffer holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0.0; capacity],
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append samples, overwriting the oldest data on overflow.
    ///
    /// Returns the number of samples discarded to make room (0 when the push
    /// fit). If the input alone exceeds capacity only its newest `capacity`
    /// samples are kept.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        let capacity = self.capacity();
        if capacity == 0 {
            return samples.len();
        }
        if samples.is_empty() {
            return 0;
        }

        let mut dropped = 0;

        // Input longer than the whole buffer: only its tail survives.
        let samples = if samples.len() > capacity {
            dropped += samples.len() - capacity;
            &samples[samples.len() - capacity..]
        } else {
            samples
        };

        let overflow = (self.len + samples.len()).saturating_sub(capacity);
        if overflow > 0 {
            self.discard(overflow);
            dropped += overflow;
        }

        let mut write = (self.head + self.len) % capacity;
        for &s in samples {
            self.buf[write] = s;
            write = (write + 1) % capacity;
        }
        self.len += samples.len();
        debug_assert!(self.len <= capacity);

        dropped
    }

    /// Sample at logical index `idx` (0 = oldest buffered sample).
    pub fn get(&self, idx: usize) -> f32 {
        debug_assert!(idx < self.len);
        self.buf[(self.head + idx) % self.capacity()]
    }

    /// Remove up to `n` samples from the front.
    pub fn discard(&mut self, n: usize) {
        let n = n.min(self.len);
        self.head = (self.head + n) % self.capacity().max(1);
        self.len -= n;
    }

    /// Copy up to `out.len()` samples from the front into `out` without
    /// consuming them. Returns how many were copied.
    pub fn peek(&self, out: &mut [f32]) -> usize {
        let n = out.len().min(self.len);
        for (i, slot) in out.iter_mut().take(n).enumerate() {
            *slot = self.get(i);
        }
        n
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(ring: &mut SampleRingBuffer) -> Vec<f32> {
        let mut out = vec![0.0; ring.len()];
        ring.peek(&mut out);
        ring.discard(out.len());
        out
    }

    #[test]
    fn test_push_and_drain_fifo() {
        let mut ring = SampleRingBuffer::new(8);
        assert_eq!(ring.push(&[1.0, 2.0, 3.0]), 0);
        assert_eq!(ring.push(&[4.0, 5.0]), 0);
        assert_eq!(ring.len(), 5);
        assert_eq!(drain(&mut ring), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut ring = SampleRingBuffer::new(4);
        assert_eq!(ring.push(&[1.0, 2.0, 3.0, 4.0]), 0);
        // Two more: 1.0 and 2.0 must go.
        assert_eq!(ring.push(&[5.0, 6.0]), 2);
        assert_eq!(ring.len(), 4);
        assert_eq!(drain(&mut ring), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_push_larger_than_capacity_keeps_newest() {
        let mut ring = SampleRingBuffer::new(3);
        assert_eq!(ring.push(&[1.0, 2.0, 3.0, 4.0, 5.0]), 2);
        assert_eq!(drain(&mut ring), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_partial_discard_then_wraparound() {
        let mut ring = SampleRingBuffer::new(4);
        ring.push(&[1.0, 2.0, 3.0, 4.0]);
        ring.discard(2);
        ring.push(&[5.0, 6.0]);
        assert_eq!(drain(&mut ring), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut ring = SampleRingBuffer::new(4);
        ring.push(&[1.0, 2.0]);
        let mut out = [0.0; 4];
        assert_eq!(ring.peek(&mut out), 2);
        assert_eq!(&out[..2], &[1.0, 2.0]);
        assert_eq!(ring.len(), 2);
    }
}

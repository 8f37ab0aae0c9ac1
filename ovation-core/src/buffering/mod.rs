//! Lock-free SPSC ring buffer between the audio callback and the sampling worker.
//!
//! Uses `ringbuf::HeapRb<f32>` which provides a wait-free `push_slice`
//! safe to call from the real-time audio callback.

pub mod block;

use ringbuf::{traits::Split, HeapRb};

pub use block::{AudioBlock, Samples};
pub use ringbuf::traits::{Consumer, Producer};

/// Type alias for the producer half, held by the audio callback thread.
pub type AudioProducer = ringbuf::HeapProd<f32>;

/// Type alias for the consumer half, held by the sampling worker.
pub type AudioConsumer = ringbuf::HeapCons<f32>;

/// Default capacity: 2^16 = 65 536 f32 samples ≈ 1.4 s at 48 kHz.
/// The worker drains every cycle, so this only has to cover scheduling jitter.
pub const RING_CAPACITY: usize = 1 << 16;

/// Create a matched producer/consumer pair backed by a heap-allocated ring buffer.
///
/// A zero capacity is bumped to one sample.
pub fn create_audio_ring(capacity: usize) -> (AudioProducer, AudioConsumer) {
    HeapRb::<f32>::new(capacity.max(1)).split()
}

/// Sliding window holding the most recent `len` samples.
///
/// Mirrors an analyser node's time-domain buffer: each read returns the
/// latest fixed-length window regardless of how many samples arrived since
/// the previous read.
#[derive(Debug, Clone)]
pub struct RecentWindow {
    buf: Vec<f32>,
}

impl RecentWindow {
    /// Start with a window of silence.
    pub fn new(len: usize) -> Self {
        Self {
            buf: vec![0.0; len.max(1)],
        }
    }

    /// Shift `incoming` into the window, discarding the oldest samples.
    pub fn push(&mut self, incoming: &[f32]) {
        let len = self.buf.len();
        if incoming.len() >= len {
            self.buf.copy_from_slice(&incoming[incoming.len() - len..]);
            return;
        }
        self.buf.copy_within(incoming.len().., 0);
        self.buf[len - incoming.len()..].copy_from_slice(incoming);
    }

    /// Drain everything currently in `consumer` into the window.
    ///
    /// Returns the number of samples drained.
    pub fn drain_from(&mut self, consumer: &mut AudioConsumer, scratch: &mut [f32]) -> usize {
        let mut total = 0;
        loop {
            let n = consumer.pop_slice(scratch);
            if n == 0 {
                break;
            }
            self.push(&scratch[..n]);
            total += n;
        }
        total
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.buf
    }
}

//! Audio sample transport: a lock-free ring from the emulation thread to the
//! playback thread, plus the rodio source that drains it.
//!
//! Single producer, single consumer. The cursors are monotonically increasing
//! atomics masked into a power-of-two buffer; the producer publishes filled
//! slots with a Release store and the consumer claims them with an Acquire
//! load, so neither side can read a half-written sample. The pull side is
//! all-or-nothing: a shortfall yields pure silence and leaves the buffered
//! run untouched for the next callback, which beats both a partial read and
//! blocking inside a real-time callback.

use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rodio::Source;

/// Output format: signed 16-bit mono.
pub const SAMPLE_RATE: u32 = 44_100;

/// Default ring capacity in samples (~186 ms at 44.1 kHz).
pub const RING_CAPACITY: usize = 8192;

/// Samples the playback source claims per refill.
const PULL_BLOCK: usize = 512;

struct Inner {
    buf: Box<[UnsafeCell<i16>]>,
    mask: usize,
    /// Next slot the producer fills. `write - read` is the fill level.
    write: AtomicUsize,
    /// Next slot the consumer drains.
    read: AtomicUsize,
    /// Samples discarded because the ring was full.
    dropped: AtomicUsize,
}

// Only the producer writes slots in [write, write+n) and only the consumer
// reads slots in [read, read+n); the cursors hand slots across with
// Release/Acquire pairs.
unsafe impl Send for Inner {}
unsafe impl Sync for Inner {}

impl Inner {
    fn available(&self) -> usize {
        let w = self.write.load(Ordering::Acquire);
        let r = self.read.load(Ordering::Acquire);
        w - r
    }
}

/// Create a connected producer/consumer pair. `capacity` is rounded up to a
/// power of two so cursor arithmetic reduces to masking.
pub fn audio_ring(capacity: usize) -> (AudioProducer, AudioConsumer) {
    let cap = capacity.next_power_of_two().max(2);
    let mut buf = Vec::with_capacity(cap);
    for _ in 0..cap {
        buf.push(UnsafeCell::new(0i16));
    }
    let inner = Arc::new(Inner {
        buf: buf.into_boxed_slice(),
        mask: cap - 1,
        write: AtomicUsize::new(0),
        read: AtomicUsize::new(0),
        dropped: AtomicUsize::new(0),
    });
    (
        AudioProducer {
            inner: Arc::clone(&inner),
        },
        AudioConsumer { inner },
    )
}

/// Emulation-thread handle: queues synthesized samples.
pub struct AudioProducer {
    inner: Arc<Inner>,
}

impl AudioProducer {
    /// Queue samples for the playback thread. Returns the number accepted;
    /// when the ring is full the newest samples are dropped and counted,
    /// never blocking and never moving the consumer's cursor.
    pub fn push(&self, samples: &[i16]) -> usize {
        let w = self.inner.write.load(Ordering::Relaxed);
        let r = self.inner.read.load(Ordering::Acquire);
        let free = self.inner.buf.len() - (w - r);
        let n = samples.len().min(free);
        for (i, &s) in samples[..n].iter().enumerate() {
            let idx = (w + i) & self.inner.mask;
            unsafe {
                *self.inner.buf[idx].get() = s;
            }
        }
        self.inner.write.store(w + n, Ordering::Release);
        if n < samples.len() {
            self.inner
                .dropped
                .fetch_add(samples.len() - n, Ordering::Relaxed);
        }
        n
    }

    /// Samples currently buffered.
    pub fn available(&self) -> usize {
        self.inner.available()
    }

    pub fn capacity(&self) -> usize {
        self.inner.buf.len()
    }

    /// Samples dropped by overruns since the last call. Resets the counter.
    pub fn take_dropped(&self) -> usize {
        self.inner.dropped.swap(0, Ordering::Relaxed)
    }
}

/// Playback-thread handle: drains samples inside the audio callback.
pub struct AudioConsumer {
    inner: Arc<Inner>,
}

impl AudioConsumer {
    /// Fill `out` with exactly `out.len()` samples. When fewer are buffered
    /// the entire output is silence and nothing is drained, so the buffered
    /// run stays intact for the next pull. Returns whether real samples were
    /// delivered. Never blocks.
    pub fn pull(&self, out: &mut [i16]) -> bool {
        let r = self.inner.read.load(Ordering::Relaxed);
        let w = self.inner.write.load(Ordering::Acquire);
        if w - r < out.len() {
            out.fill(0);
            return false;
        }
        for (i, o) in out.iter_mut().enumerate() {
            let idx = (r + i) & self.inner.mask;
            *o = unsafe { *self.inner.buf[idx].get() };
        }
        self.inner.read.store(r + out.len(), Ordering::Release);
        true
    }

    pub fn available(&self) -> usize {
        self.inner.available()
    }
}

/// rodio source that drains the ring one block at a time.
///
/// rodio's playback thread pulls one sample per `next` call; refilling a
/// whole block at once keeps the all-or-nothing pull contract, so underruns
/// come out as block-sized silence instead of torn reads.
pub struct RingSource {
    consumer: AudioConsumer,
    block: Vec<i16>,
    pos: usize,
}

impl RingSource {
    pub fn new(consumer: AudioConsumer) -> Self {
        Self {
            consumer,
            block: vec![0; PULL_BLOCK],
            pos: PULL_BLOCK,
        }
    }
}

impl Iterator for RingSource {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        if self.pos == self.block.len() {
            self.consumer.pull(&mut self.block);
            self.pos = 0;
        }
        let s = self.block[self.pos];
        self.pos += 1;
        Some(s)
    }
}

impl Source for RingSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn pull_round_trips_samples_in_order() {
        let (tx, rx) = audio_ring(64);
        let input: Vec<i16> = (0..48).collect();
        assert_eq!(tx.push(&input), 48);

        let mut out = [0i16; 48];
        assert!(rx.pull(&mut out));
        assert_eq!(&out[..], &input[..]);
        assert_eq!(rx.available(), 0);
    }

    #[test]
    fn underrun_returns_silence_without_draining() {
        let (tx, rx) = audio_ring(8192);
        tx.push(&[7i16; 300]);

        let mut out = [42i16; 512];
        assert!(!rx.pull(&mut out));
        assert!(out.iter().all(|&s| s == 0));
        // The 300 buffered samples were not partially consumed.
        assert_eq!(rx.available(), 300);

        let mut small = [0i16; 300];
        assert!(rx.pull(&mut small));
        assert!(small.iter().all(|&s| s == 7));
    }

    #[test]
    fn order_is_preserved_across_wraparound() {
        let (tx, rx) = audio_ring(16);
        let mut next_in: i16 = 0;
        let mut next_out: i16 = 0;
        for _ in 0..10 {
            let chunk: Vec<i16> = (next_in..next_in + 12).collect();
            assert_eq!(tx.push(&chunk), 12);
            next_in += 12;

            let mut out = [0i16; 12];
            assert!(rx.pull(&mut out));
            for &s in &out {
                assert_eq!(s, next_out);
                next_out += 1;
            }
        }
    }

    #[test]
    fn overrun_drops_newest_and_counts() {
        let (tx, rx) = audio_ring(16);
        assert_eq!(tx.push(&[1i16; 16]), 16);
        // Full: everything in this push is dropped.
        assert_eq!(tx.push(&[2i16; 8]), 0);
        assert_eq!(tx.take_dropped(), 8);
        assert_eq!(tx.take_dropped(), 0);

        // The oldest samples survived intact.
        let mut out = [0i16; 16];
        assert!(rx.pull(&mut out));
        assert!(out.iter().all(|&s| s == 1));
    }

    #[test]
    fn partial_push_accepts_what_fits() {
        let (tx, _rx) = audio_ring(16);
        assert_eq!(tx.push(&[1i16; 10]), 10);
        assert_eq!(tx.push(&[2i16; 10]), 6);
        assert_eq!(tx.take_dropped(), 4);
        assert_eq!(tx.available(), 16);
    }

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        let (tx, _rx) = audio_ring(6000);
        assert_eq!(tx.capacity(), 8192);
    }

    #[test]
    fn concurrent_producer_consumer_preserve_sequence() {
        let (tx, rx) = audio_ring(256);
        const TOTAL: i16 = 4096;

        let producer = thread::spawn(move || {
            let mut next: i16 = 0;
            while next < TOTAL {
                let end = (next + 32).min(TOTAL);
                let chunk: Vec<i16> = (next..end).collect();
                let pushed = tx.push(&chunk);
                next += pushed as i16;
                if pushed < chunk.len() {
                    thread::yield_now();
                }
            }
        });

        let mut seen: i16 = 0;
        let mut out = [0i16; 32];
        let mut spins = 0u32;
        while seen < TOTAL {
            if rx.available() >= out.len() {
                assert!(rx.pull(&mut out));
                for &s in &out {
                    assert_eq!(s, seen);
                    seen += 1;
                }
            } else {
                thread::yield_now();
                spins += 1;
                assert!(spins < 10_000_000, "consumer starved");
            }
        }
        producer.join().unwrap();
    }
}

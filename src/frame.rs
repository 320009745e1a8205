//! Cross-thread frame handoff.
//!
//! A single-slot channel between the emulation thread and the presenter. The
//! producer copies each completed 256×240 frame into the slot under a short
//! lock; the consumer copies the latest one out under the same lock. The
//! consumer can never observe a half-written frame, frames are seen in
//! production order (possibly with gaps if the presenter is slow), and
//! neither side ever holds the lock for longer than one frame copy.

use std::sync::{Arc, Mutex};

pub const FRAME_WIDTH: usize = 256;
pub const FRAME_HEIGHT: usize = 240;
pub const FRAME_PIXELS: usize = FRAME_WIDTH * FRAME_HEIGHT;

/// Create a connected producer/consumer pair around one frame slot. The slot
/// starts out as the all-zero frame.
pub fn frame_channel() -> (FrameProducer, FrameConsumer) {
    let slot = Arc::new(Mutex::new(vec![0u32; FRAME_PIXELS]));
    (
        FrameProducer {
            slot: Arc::clone(&slot),
        },
        FrameConsumer { slot },
    )
}

/// Emulation-thread handle: publishes completed frames.
pub struct FrameProducer {
    slot: Arc<Mutex<Vec<u32>>>,
}

impl FrameProducer {
    /// Publish a completed frame ([`FRAME_PIXELS`] 0xRRGGBB pixels). The frame
    /// becomes visible to the consumer atomically.
    pub fn publish(&self, frame: &[u32]) {
        debug_assert_eq!(frame.len(), FRAME_PIXELS);
        let mut slot = self.slot.lock().unwrap();
        slot.copy_from_slice(frame);
    }
}

/// Presentation-thread handle: fetches the latest published frame.
pub struct FrameConsumer {
    slot: Arc<Mutex<Vec<u32>>>,
}

impl FrameConsumer {
    /// Copy the most recently published frame into `out`. Before the first
    /// publish this is the all-zero frame; repeated calls without an
    /// intervening publish return identical pixels.
    pub fn acquire(&self, out: &mut [u32]) {
        debug_assert_eq!(out.len(), FRAME_PIXELS);
        let slot = self.slot.lock().unwrap();
        out.copy_from_slice(&slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_frame_is_all_zero() {
        let (_tx, rx) = frame_channel();
        let mut out = vec![0xFFFF_FFFFu32; FRAME_PIXELS];
        rx.acquire(&mut out);
        assert!(out.iter().all(|&p| p == 0));
    }

    #[test]
    fn acquire_returns_the_last_published_frame() {
        let (tx, rx) = frame_channel();
        let mut frame = vec![0u32; FRAME_PIXELS];
        frame[0] = 0x00FF_0000;
        frame[FRAME_PIXELS - 1] = 0x0000_00FF;
        tx.publish(&frame);

        let mut out = vec![0u32; FRAME_PIXELS];
        rx.acquire(&mut out);
        assert_eq!(out, frame);
    }

    #[test]
    fn repeated_acquire_is_bit_for_bit_stable() {
        let (tx, rx) = frame_channel();
        let frame: Vec<u32> = (0..FRAME_PIXELS as u32).collect();
        tx.publish(&frame);

        let mut first = vec![0u32; FRAME_PIXELS];
        let mut second = vec![0u32; FRAME_PIXELS];
        rx.acquire(&mut first);
        rx.acquire(&mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn later_publish_replaces_earlier() {
        let (tx, rx) = frame_channel();
        tx.publish(&vec![1u32; FRAME_PIXELS]);
        tx.publish(&vec![2u32; FRAME_PIXELS]);
        let mut out = vec![0u32; FRAME_PIXELS];
        rx.acquire(&mut out);
        assert!(out.iter().all(|&p| p == 2));
    }
}

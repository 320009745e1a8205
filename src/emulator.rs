//! Emulation thread: the paced frame loop.
//!
//! Steps the CPU until the PPU finishes a frame, publishes the frame,
//! drains synthesized audio into the sample ring, applies queued pointer
//! events, and sleeps off whatever remains of the frame budget. The loop
//! checks the shutdown flag once per iteration and never blocks on input,
//! rendering, or the audio consumer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use log::{debug, warn};

use crate::audio::AudioProducer;
use crate::bus::NesBus;
use crate::cpu::cpu::CPU;
use crate::frame::FrameProducer;

/// Pointer events from the window, already mapped into frame coordinates.
#[derive(Clone, Copy, Debug)]
pub enum PointerEvent {
    Down { x: u8, y: u8 },
    Up,
}

/// Target frame duration, shared so the frontend can retune the pace while
/// the emulation thread runs.
#[derive(Clone)]
pub struct FrameBudget {
    nanos: Arc<AtomicU64>,
}

impl FrameBudget {
    pub fn new(fps: f64) -> Self {
        let budget = Self {
            nanos: Arc::new(AtomicU64::new(0)),
        };
        budget.set_fps(fps);
        budget
    }

    pub fn set_fps(&self, fps: f64) {
        let nanos = (1_000_000_000.0 / fps.max(1.0)) as u64;
        self.nanos.store(nanos, Ordering::Release);
    }

    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }
}

/// The emulation thread's state: the machine plus its channels to the
/// frontend.
pub struct Emulator {
    pub cpu: CPU<NesBus>,
    frames: FrameProducer,
    audio: AudioProducer,
    pointer_events: Receiver<PointerEvent>,
    budget: FrameBudget,
}

impl Emulator {
    pub fn new(
        cpu: CPU<NesBus>,
        frames: FrameProducer,
        audio: AudioProducer,
        pointer_events: Receiver<PointerEvent>,
        budget: FrameBudget,
    ) -> Self {
        Self {
            cpu,
            frames,
            audio,
            pointer_events,
            budget,
        }
    }

    /// Thread body. Exits within one frame of `running` going false, or
    /// immediately if the CPU jams.
    pub fn run(&mut self, running: &AtomicBool) {
        let mut scratch = [0i16; 2048];
        let mut report_at = Instant::now();
        let mut frames_since_report = 0u32;

        while running.load(Ordering::Acquire) {
            let frame_start = Instant::now();

            self.apply_pointer_events();
            self.run_frame();
            if self.cpu.halted {
                warn!("CPU jammed at ${:04X}; stopping emulation", self.cpu.pc);
                break;
            }

            self.frames.publish(&self.cpu.bus.ppu.framebuffer);
            loop {
                let n = self.cpu.bus.apu.drain_samples(&mut scratch);
                if n == 0 {
                    break;
                }
                self.audio.push(&scratch[..n]);
            }

            frames_since_report += 1;
            if report_at.elapsed() >= Duration::from_secs(1) {
                let dropped = self.audio.take_dropped();
                if dropped > 0 {
                    warn!("audio overrun: dropped {dropped} samples");
                }
                debug!("{frames_since_report} fps");
                frames_since_report = 0;
                report_at = Instant::now();
            }

            // Pace to the budget; never sleep when behind schedule.
            let elapsed = frame_start.elapsed();
            let budget = self.budget.duration();
            if elapsed < budget {
                thread::sleep(budget - elapsed);
            }
        }
    }

    /// Run the CPU until the PPU signals a completed frame.
    fn run_frame(&mut self) {
        while !self.cpu.bus.frame_ready() {
            self.cpu.step();
            if self.cpu.halted {
                return;
            }
        }
        self.cpu.bus.clear_frame_ready();
    }

    /// Drain pointer events at the frame boundary so the light-gun hit test
    /// always runs against a complete frame.
    fn apply_pointer_events(&mut self) {
        while let Ok(event) = self.pointer_events.try_recv() {
            match event {
                PointerEvent::Down { x, y } => self.cpu.bus.zapper_aim(x, y),
                PointerEvent::Up => self.cpu.bus.zapper_fire(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_budget_converts_fps_to_duration() {
        let budget = FrameBudget::new(60.0);
        let d = budget.duration();
        assert!(d > Duration::from_millis(16) && d < Duration::from_millis(17));

        budget.set_fps(30.0);
        assert!(budget.duration() > Duration::from_millis(33));
    }

    #[test]
    fn frame_budget_clamps_silly_rates() {
        let budget = FrameBudget::new(0.0);
        assert_eq!(budget.duration(), Duration::from_secs(1));
    }
}

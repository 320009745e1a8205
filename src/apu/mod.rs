//! APU (Audio Processing Unit) emulation.
//!
//! - **Pulse** (×2): square waves with duty, envelope, sweep, length counter.
//! - **Triangle**: 32-step wave, linear counter, length counter.
//! - **Noise**: LFSR-based, envelope, length counter.
//! - **DMC**: delta-modulated sample playback with bus-serviced fetches.
//! - **Frame counter**: 4- or 5-step mode; clocks the above and raises the
//!   frame IRQ.
//! - **Mixer**: NES-style non-linear mix, sampled to 44.1 kHz signed 16-bit.

pub mod apu;

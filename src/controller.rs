//! Controller input: shared button snapshot and the $4016/$4017 shift-register
//! protocol.
//!
//! Writing $4016 with bit 0 set holds the strobe high; while it is high the
//! shift registers track the live button state, and reads return the current
//! A button. Dropping the strobe freezes the registers, and each read then
//! shifts one button out, A first. Vacated positions fill with 1, so after
//! eight reads a register reads all ones — the hardware quirk games rely on
//! instead of a bit counter. Every port read also carries the open-bus bit
//! ($40). See [Controller reading](https://www.nesdev.org/wiki/Controller_reading).

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use crate::bus::OPEN_BUS;

/// Controller 1 button bits within the snapshot word. Bits 8–15 are reserved
/// for a second physical controller on port 2.
pub const BUTTON_A: u16 = 1 << 0;
pub const BUTTON_B: u16 = 1 << 1;
pub const BUTTON_SELECT: u16 = 1 << 2;
pub const BUTTON_START: u16 = 1 << 3;
pub const BUTTON_UP: u16 = 1 << 4;
pub const BUTTON_DOWN: u16 = 1 << 5;
pub const BUTTON_LEFT: u16 = 1 << 6;
pub const BUTTON_RIGHT: u16 = 1 << 7;

/// Live button state shared between the input collector and the bus.
///
/// Updates replace the whole word atomically, so the latch can never observe
/// half of a multi-button change. Constructed once by the frontend and handed
/// to both sides.
#[derive(Clone, Default)]
pub struct ControllerState {
    bits: Arc<AtomicU16>,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the full 16-bit snapshot.
    pub fn set(&self, bits: u16) {
        self.bits.store(bits, Ordering::Release);
    }

    pub fn snapshot(&self) -> u16 {
        self.bits.load(Ordering::Acquire)
    }
}

/// The two 8-bit shift registers and the strobe flip-flop behind the
/// controller ports.
pub struct InputLatch {
    state: ControllerState,
    strobe: bool,
    shift1: u8,
    shift2: u8,
}

impl InputLatch {
    pub fn new(state: ControllerState) -> Self {
        Self {
            state,
            strobe: false,
            shift1: 0,
            shift2: 0,
        }
    }

    /// Write to $4016. Bit 0 is the strobe; every write while it is high
    /// reloads the registers from the live snapshot. `latch_port2` is false
    /// while a light gun displaces controller 2, leaving its register alone.
    pub fn write_strobe(&mut self, value: u8, latch_port2: bool) {
        self.strobe = value & 1 != 0;
        if self.strobe {
            let snap = self.state.snapshot();
            self.shift1 = snap as u8;
            if latch_port2 {
                self.shift2 = (snap >> 8) as u8;
            }
        }
    }

    /// Serial read of controller 1 ($4016).
    pub fn read_port1(&mut self) -> u8 {
        let bit = if self.strobe {
            // Registers are continuously reloaded while the strobe is high:
            // reads always see the instantaneous A button.
            self.shift1 = self.state.snapshot() as u8;
            self.shift1 & 1
        } else {
            let b = self.shift1 & 1;
            self.shift1 = (self.shift1 >> 1) | 0x80;
            b
        };
        bit | OPEN_BUS
    }

    /// Serial read of controller 2 ($4017). Only reached while no light gun
    /// is connected.
    pub fn read_port2(&mut self) -> u8 {
        let bit = if self.strobe {
            self.shift2 = (self.state.snapshot() >> 8) as u8;
            self.shift2 & 1
        } else {
            let b = self.shift2 & 1;
            self.shift2 = (self.shift2 >> 1) | 0x80;
            b
        };
        bit | OPEN_BUS
    }

    /// Clear both registers. Called when the light gun is plugged or
    /// unplugged so stale button bits cannot leak into sensor reads.
    pub fn clear_shift_registers(&mut self) {
        self.shift1 = 0;
        self.shift2 = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latch_with(bits: u16) -> (ControllerState, InputLatch) {
        let state = ControllerState::new();
        state.set(bits);
        let latch = InputLatch::new(state.clone());
        (state, latch)
    }

    #[test]
    fn reads_while_strobe_high_return_live_a_button() {
        let (state, mut latch) = latch_with(0);
        // Any number of strobe-high writes; reads still track the snapshot.
        for _ in 0..5 {
            latch.write_strobe(1, true);
        }
        assert_eq!(latch.read_port1(), 0x40);
        state.set(BUTTON_A);
        assert_eq!(latch.read_port1(), 0x41);
        state.set(0);
        assert_eq!(latch.read_port1(), 0x40);
    }

    #[test]
    fn eight_shifts_yield_buttons_lsb_first_then_all_ones() {
        let (_state, mut latch) = latch_with(0b1010_0110);
        latch.write_strobe(1, true);
        latch.write_strobe(0, true);
        let expected = [0, 1, 1, 0, 0, 1, 0, 1];
        for &bit in &expected {
            assert_eq!(latch.read_port1(), bit | 0x40);
        }
        // Ninth and later reads: the register has converged to all ones.
        for _ in 0..4 {
            assert_eq!(latch.read_port1(), 0x41);
        }
    }

    #[test]
    fn a_pressed_only_reads_41_then_40() {
        let (_state, mut latch) = latch_with(0x0001);
        latch.write_strobe(1, true);
        latch.write_strobe(0, true);
        assert_eq!(latch.read_port1(), 0x41);
        assert_eq!(latch.read_port1(), 0x40);
    }

    #[test]
    fn port2_shifts_the_high_byte() {
        let (_state, mut latch) = latch_with(0x0300);
        latch.write_strobe(1, true);
        latch.write_strobe(0, true);
        assert_eq!(latch.read_port2(), 0x41);
        assert_eq!(latch.read_port2(), 0x41);
        assert_eq!(latch.read_port2(), 0x40);
    }

    #[test]
    fn strobe_low_does_not_relatch() {
        let (state, mut latch) = latch_with(BUTTON_A);
        latch.write_strobe(1, true);
        latch.write_strobe(0, true);
        // Button released after the strobe dropped; the latched bit survives.
        state.set(0);
        assert_eq!(latch.read_port1(), 0x41);
    }

    #[test]
    fn port2_not_latched_while_gun_connected() {
        let (_state, mut latch) = latch_with(0xFF00);
        latch.write_strobe(1, false);
        latch.write_strobe(0, false);
        assert_eq!(latch.read_port2(), 0x40);
    }

    #[test]
    fn clear_resets_both_registers() {
        let (_state, mut latch) = latch_with(0xFFFF);
        latch.write_strobe(1, true);
        latch.write_strobe(0, true);
        latch.clear_shift_registers();
        assert_eq!(latch.read_port1(), 0x40);
        assert_eq!(latch.read_port2(), 0x40);
    }
}

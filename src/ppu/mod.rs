//! PPU (Picture Processing Unit) emulation.
//!
//! See [PPU](https://www.nesdev.org/wiki/PPU) and
//! [PPU registers](https://www.nesdev.org/wiki/PPU_registers). Handles 341-dot
//! scanlines, 262 scanlines per frame, vblank NMI, background and sprite
//! rendering, OAM, nametables, palette RAM, the light-gun luminance test, and
//! the mapper scanline-IRQ counter.

pub mod ppu;

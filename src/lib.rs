//! Lumen: a threaded NES (Nintendo Entertainment System) emulator.
//!
//! Implements the NES chipset as documented on the
//! [NESdev Wiki](https://www.nesdev.org/wiki/NES_reference_guide), with the
//! emulation core on its own thread talking to the frontend through three
//! narrow channels: a single-slot frame handoff, a lock-free audio sample
//! ring, and an atomic controller snapshot.
//!
//! ## Modules
//!
//! - **apu** – [APU](https://www.nesdev.org/wiki/APU): pulse×2, triangle,
//!   noise, DMC, frame counter, non-linear mixer
//! - **audio** – single-producer/single-consumer sample ring and the rodio
//!   source that drains it
//! - **bus** – [CPU memory map](https://www.nesdev.org/wiki/CPU_memory_map):
//!   RAM, PPU, APU, controller ports, cartridge; 3 PPU dots per CPU cycle
//! - **cartridge** – [iNES](https://www.nesdev.org/wiki/INES) loading;
//!   [mappers](https://www.nesdev.org/wiki/Mapper) NROM (0), MMC1 (1), MMC3 (4)
//! - **controller** – [Controller reading](https://www.nesdev.org/wiki/Controller_reading):
//!   $4016 strobe/latch, serial shift-out, shared button snapshot
//! - **cpu** – [6502](https://www.nesdev.org/wiki/CPU) / 2A03: official plus
//!   common undocumented opcodes, [NMI](https://www.nesdev.org/wiki/NMI), IRQ
//! - **emulator** – the paced emulation-thread loop
//! - **frame** – tear-free cross-thread frame handoff
//! - **irq** – level-triggered, OR-aggregated interrupt line
//! - **ppu** – [PPU](https://www.nesdev.org/wiki/PPU): 256×240 rendering,
//!   OAM, vblank NMI, light-gun hit test, mapper scanline IRQ counter
//! - **zapper** – [Zapper](https://www.nesdev.org/wiki/Zapper) light gun on
//!   controller port 2

pub mod apu;
pub mod audio;
pub mod bus;
pub mod cartridge;
pub mod controller;
pub mod cpu;
pub mod emulator;
pub mod frame;
pub mod irq;
pub mod ppu;
pub mod zapper;

//! Cartridge loading and mapper support.
//!
//! - **cartridge**: iNES (.nes) parsing, PRG/CHR extraction, mapper selection.
//! - **mapper**: NROM (0), MMC1 (1), MMC3 (4); PRG/CHR bank switching plus the
//!   mirroring and IRQ side effects the bus forwards to the PPU.

pub mod cartridge;
pub mod mapper;

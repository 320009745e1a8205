//! NES cartridge loading from the iNES format (.nes files).
//!
//! [iNES](https://www.nesdev.org/wiki/INES): 16-byte header (magic
//! "NES\x1A", PRG size in 16 KiB units, CHR size in 8 KiB units, flags 6–7
//! for mapper and mirroring), optional 512-byte trainer, PRG ROM, CHR ROM.
//! A CHR size of zero means the board carries 8 KiB of CHR RAM instead.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use thiserror::Error;

use crate::cartridge::mapper::mapper::Mapper;
use crate::cartridge::mapper::mapper0::Mapper0;
use crate::cartridge::mapper::mapper1::Mapper1;
use crate::cartridge::mapper::mapper4::Mapper4;
use crate::cartridge::mapper::{MapperEvent, Mirroring};

/// Errors surfaced while loading a .nes image.
#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("failed to read ROM: {0}")]
    Io(#[from] io::Error),
    #[error("not an iNES image (bad magic)")]
    BadMagic,
    #[error("iNES image truncated: need {expected} bytes, have {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u8),
}

/// A loaded cartridge: the mapper plus the sizes the frontend reports.
pub struct Cartridge {
    mapper: Box<dyn Mapper>,
    prg_len: usize,
    chr_len: usize,
}

impl Cartridge {
    pub fn load(path: &Path) -> Result<Self, CartridgeError> {
        let mut data = Vec::new();
        File::open(path)?.read_to_end(&mut data)?;
        Self::from_ines(&data)
    }

    /// Parse an iNES image from memory.
    pub fn from_ines(data: &[u8]) -> Result<Self, CartridgeError> {
        if data.len() < 16 || &data[0..4] != b"NES\x1A" {
            return Err(CartridgeError::BadMagic);
        }

        let prg_len = data[4] as usize * 16 * 1024;
        let chr_len = data[5] as usize * 8 * 1024;
        let has_trainer = data[6] & 0x04 != 0;

        let prg_start = 16 + if has_trainer { 512 } else { 0 };
        let chr_start = prg_start + prg_len;
        let expected = chr_start + chr_len;
        if data.len() < expected {
            return Err(CartridgeError::Truncated {
                expected,
                actual: data.len(),
            });
        }

        let prg_rom = data[prg_start..chr_start].to_vec();
        let chr_writable = chr_len == 0;
        let chr = if chr_writable {
            vec![0; 8 * 1024]
        } else {
            data[chr_start..expected].to_vec()
        };

        // Mapper number: low nibble in byte 6, high nibble in byte 7.
        let mapper_id = (data[6] >> 4) | (data[7] & 0xF0);
        // Byte 6 bit 0: 0 = horizontal, 1 = vertical (solder pads on NROM).
        let header_mirroring = if data[6] & 1 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let mapper: Box<dyn Mapper> = match mapper_id {
            0 => Box::new(Mapper0::new(prg_rom, chr, chr_writable, header_mirroring)),
            1 => Box::new(Mapper1::new(prg_rom, chr, chr_writable)),
            4 => Box::new(Mapper4::new(prg_rom, chr, chr_writable)),
            n => return Err(CartridgeError::UnsupportedMapper(n)),
        };

        Ok(Self {
            mapper,
            prg_len,
            chr_len,
        })
    }

    /// CPU-space read ($4020–$FFFF).
    pub fn cpu_read(&self, addr: u16) -> u8 {
        self.mapper.cpu_read(addr)
    }

    /// CPU-space write; mapper register side effects come back as an event.
    pub fn cpu_write(&mut self, addr: u16, data: u8) -> Option<MapperEvent> {
        self.mapper.cpu_write(addr, data)
    }

    /// PPU-space read ($0000–$1FFF pattern data).
    pub fn ppu_read(&self, addr: u16) -> u8 {
        self.mapper.ppu_read(addr)
    }

    /// PPU-space write (CHR RAM boards only).
    pub fn ppu_write(&mut self, addr: u16, data: u8) {
        self.mapper.ppu_write(addr, data);
    }

    pub fn initial_mirroring(&self) -> Mirroring {
        self.mapper.initial_mirroring()
    }

    pub fn mapper_id(&self) -> u8 {
        self.mapper.id()
    }

    /// One-line summary for startup logging.
    pub fn describe(&self) -> String {
        format!(
            "mapper {}, {} KiB PRG, {} KiB CHR{}",
            self.mapper.id(),
            self.prg_len / 1024,
            if self.chr_len == 0 { 8 } else { self.chr_len / 1024 },
            if self.chr_len == 0 { " RAM" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal iNES image: `prg_banks` × 16 KiB PRG, `chr_banks` × 8 KiB CHR.
    fn ines(mapper: u8, prg_banks: u8, chr_banks: u8) -> Vec<u8> {
        let mut data = vec![0u8; 16];
        data[0..4].copy_from_slice(b"NES\x1A");
        data[4] = prg_banks;
        data[5] = chr_banks;
        data[6] = (mapper & 0x0F) << 4;
        data[7] = mapper & 0xF0;
        data.resize(
            16 + prg_banks as usize * 16 * 1024 + chr_banks as usize * 8 * 1024,
            0,
        );
        data
    }

    #[test]
    fn loads_nrom() {
        let cart = Cartridge::from_ines(&ines(0, 1, 1)).unwrap();
        assert_eq!(cart.mapper_id(), 0);
        assert_eq!(cart.initial_mirroring(), Mirroring::Horizontal);
    }

    #[test]
    fn vertical_mirroring_from_header() {
        let mut data = ines(0, 1, 1);
        data[6] |= 1;
        let cart = Cartridge::from_ines(&data).unwrap();
        assert_eq!(cart.initial_mirroring(), Mirroring::Vertical);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut data = ines(0, 1, 1);
        data[0] = b'X';
        assert!(matches!(
            Cartridge::from_ines(&data),
            Err(CartridgeError::BadMagic)
        ));
    }

    #[test]
    fn rejects_truncated_image() {
        let mut data = ines(0, 2, 1);
        data.truncate(data.len() - 1);
        assert!(matches!(
            Cartridge::from_ines(&data),
            Err(CartridgeError::Truncated { .. })
        ));
    }

    #[test]
    fn rejects_unknown_mapper() {
        let data = ines(7, 1, 1);
        assert!(matches!(
            Cartridge::from_ines(&data),
            Err(CartridgeError::UnsupportedMapper(7))
        ));
    }

    #[test]
    fn missing_chr_becomes_writable_ram() {
        let mut cart = Cartridge::from_ines(&ines(0, 1, 0)).unwrap();
        cart.ppu_write(0x0042, 0x99);
        assert_eq!(cart.ppu_read(0x0042), 0x99);
    }
}

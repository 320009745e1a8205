//! NES PPU (Picture Processing Unit) implementation.
//!
//! Vblank timing, nametable mirroring, VRAM access, background and sprite
//! rendering, OAM, and the 256×240 framebuffer. Registers $2000–$2007
//! (mirrored through $3FFF). The PPU also hosts two pieces of machinery the
//! bus drives on behalf of peripherals and mappers: the light-gun luminance
//! test against the last rendered pixels, and the MMC3-style scanline IRQ
//! counter (latch/reload/enable configured through mapper events).

use crate::cartridge::cartridge::Cartridge;
use crate::cartridge::mapper::Mirroring;
use crate::frame::{FRAME_HEIGHT, FRAME_PIXELS, FRAME_WIDTH};

/// NES 2C02 64-color palette (0xRRGGBB).
pub const NES_PALETTE_RGB: [u32; 64] = [
    0x545454, 0x001E74, 0x081090, 0x300088, 0x440064, 0x5C0030, 0x540400, 0x3C1800, 0x202A00,
    0x083A00, 0x004000, 0x003C00, 0x00302C, 0x000000, 0x000000, 0x000000, 0x989698, 0x084CC4,
    0x3032EC, 0x5C1EE4, 0x8814B0, 0xA01464, 0x982220, 0x783C00, 0x545A00, 0x287200, 0x087C00,
    0x007628, 0x006678, 0x000000, 0x000000, 0x000000, 0xECEEEC, 0x3C7EEC, 0x5C5CEC, 0x8844EC,
    0xB02CEC, 0xE028B0, 0xD83C50, 0xC45400, 0xAC7000, 0x808800, 0x409C30, 0x20A458, 0x209A88,
    0x404040, 0x000000, 0x000000, 0xECEEEC, 0xA8BCEC, 0xBCACEC, 0xD4A0EC, 0xEC94EC, 0xEC90D4,
    0xEC9CB4, 0xE4B090, 0xDCC878, 0xD4DC78, 0xB8EC98, 0xA8ECBC, 0xA0E4E4, 0xA0A0A0, 0x000000,
    0x000000,
];

/// Summed-RGB luminance a pixel must clear for the light-gun photodiode to
/// report a hit. White flash targets sit near 0x2C4; dark scenery well below.
const LIGHT_THRESHOLD: u32 = 0x180;

/// PPU state: timing, VRAM, OAM, IRQ counter, and framebuffer.
pub struct PPU {
    pub cycle: u16,
    pub scanline: i16,
    pub nmi: bool,
    pub vblank: bool,
    /// Set when entering vblank (scanline 241); cleared after the frame is
    /// published.
    pub frame_ready: bool,
    ctrl: u8,
    mask: u8,
    addr: u16,
    addr_latch: bool,
    scroll_x: u8,
    scroll_y: u8,
    scroll_latch: bool,
    mirroring: Mirroring,
    nametable: [u8; 0x800],
    /// Palette RAM $3F00–$3F1F (32 bytes, with NES mirroring).
    palette: [u8; 32],
    /// OAM: 64 sprites × 4 bytes (Y, tile, attr, X).
    oam: [u8; 256],
    oam_addr: u8,
    sprite_0_hit: bool,
    sprite_overflow: bool,
    /// Which mapper is plugged in; 4 arms the scanline IRQ counter.
    mapper_id: u8,
    irq_latch: u8,
    irq_counter: u8,
    irq_reload_pending: bool,
    irq_enabled: bool,
    mapper_irq: bool,
    /// 256×240 framebuffer (0xRRGGBB). Row-major, top-left origin.
    pub framebuffer: [u32; FRAME_PIXELS],
}

impl PPU {
    /// Create a PPU at the pre-render scanline, cycle 0.
    pub fn new() -> Self {
        Self {
            cycle: 0,
            scanline: -1,
            nmi: false,
            vblank: false,
            frame_ready: false,
            ctrl: 0,
            mask: 0,
            addr: 0,
            addr_latch: false,
            scroll_x: 0,
            scroll_y: 0,
            scroll_latch: false,
            mirroring: Mirroring::Horizontal,
            nametable: [0; 0x800],
            palette: [0; 32],
            oam: [0; 256],
            oam_addr: 0,
            sprite_0_hit: false,
            sprite_overflow: false,
            mapper_id: 0,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload_pending: false,
            irq_enabled: false,
            mapper_irq: false,
            framebuffer: [0; FRAME_PIXELS],
        }
    }

    /// Background or sprite rendering enabled (PPUMASK bits 3–4).
    pub fn rendering_enabled(&self) -> bool {
        self.mask & 0x18 != 0
    }

    /// Advance one PPU cycle (341 per scanline, 262 scanlines per frame).
    /// Returns `Some(scanline)` when a visible scanline just finished so the
    /// bus can have it rendered.
    pub fn tick(&mut self) -> Option<u16> {
        self.cycle += 1;

        // Vblank starts at scanline 241, cycle 1.
        if self.scanline == 241 && self.cycle == 1 {
            self.vblank = true;
            self.frame_ready = true;
            if self.ctrl & 0x80 != 0 {
                self.nmi = true;
            }
        }

        // Pre-render scanline clears the frame's status bits.
        if self.scanline == -1 && self.cycle == 1 {
            self.vblank = false;
            self.sprite_0_hit = false;
            self.sprite_overflow = false;
        }

        let mut completed = None;
        if self.cycle == 341 {
            if (0..240).contains(&self.scanline) {
                completed = Some(self.scanline as u16);
            }
            self.cycle = 0;
            self.scanline += 1;
            if self.scanline == 261 {
                self.scanline = -1;
            }
        }
        completed
    }

    // --- Registers ---------------------------------------------------------

    /// Read PPUSTATUS ($2002). Clears vblank, the pending NMI, and both write
    /// latches.
    pub fn read_status(&mut self) -> u8 {
        let mut status = 0u8;
        if self.vblank {
            status |= 0x80;
        }
        if self.sprite_0_hit {
            status |= 0x40;
        }
        if self.sprite_overflow {
            status |= 0x20;
        }
        self.vblank = false;
        self.nmi = false;
        self.addr_latch = false;
        self.scroll_latch = false;
        status
    }

    /// Write PPUCTRL ($2000): nametable base, increment mode, pattern bases,
    /// sprite size, NMI enable.
    pub fn write_ctrl(&mut self, data: u8) {
        self.ctrl = data;
    }

    /// Write PPUMASK ($2001): rendering enables.
    pub fn write_mask(&mut self, data: u8) {
        self.mask = data;
    }

    /// Write OAMADDR ($2003).
    pub fn write_oam_addr(&mut self, data: u8) {
        self.oam_addr = data;
    }

    /// Read OAMDATA ($2004) at the current OAMADDR; no increment on read.
    pub fn read_oam_data(&self) -> u8 {
        self.oam[self.oam_addr as usize]
    }

    /// Write OAMDATA ($2004); increments OAMADDR.
    pub fn write_oam_data(&mut self, data: u8) {
        self.oam[self.oam_addr as usize] = data;
        self.oam_addr = self.oam_addr.wrapping_add(1);
    }

    /// OAM DMA ($4014): copy one CPU page into OAM. The source page lives in
    /// the 2 KiB internal RAM, mirrored like the bus mirrors it.
    pub fn oam_dma(&mut self, ram: &[u8; 2048], page: u8) {
        let start = ((page as usize) << 8) % 2048;
        for i in 0..256 {
            self.oam[i] = ram[(start + i) % 2048];
        }
    }

    /// Write PPUSCROLL ($2005): X then Y, toggled by the shared latch.
    pub fn write_scroll(&mut self, data: u8) {
        if !self.scroll_latch {
            self.scroll_x = data;
        } else {
            self.scroll_y = data;
        }
        self.scroll_latch = !self.scroll_latch;
    }

    /// Write PPUADDR ($2006): high byte then low byte.
    pub fn write_addr(&mut self, data: u8) {
        if !self.addr_latch {
            self.addr = (data as u16) << 8;
        } else {
            self.addr |= data as u16;
        }
        self.addr_latch = !self.addr_latch;
    }

    /// Read PPUDATA ($2007); auto-increments the VRAM address.
    pub fn read_data(&mut self, cart: &mut Cartridge) -> u8 {
        let addr = self.addr & 0x3FFF;
        let data = match addr {
            0x0000..=0x1FFF => cart.ppu_read(addr),
            0x2000..=0x3EFF => {
                let index = Self::map_nametable_addr(addr & 0x2FFF, self.mirroring);
                self.nametable[index as usize]
            }
            _ => self.palette[Self::palette_index(addr)],
        };
        self.advance_addr();
        data
    }

    /// Write PPUDATA ($2007); auto-increments the VRAM address.
    pub fn write_data(&mut self, cart: &mut Cartridge, data: u8) {
        let addr = self.addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => cart.ppu_write(addr, data),
            0x2000..=0x3EFF => {
                let index = Self::map_nametable_addr(addr & 0x2FFF, self.mirroring);
                self.nametable[index as usize] = data;
            }
            // Upper two bits are not wired on real palette RAM.
            _ => self.palette[Self::palette_index(addr)] = data & 0x3F,
        }
        self.advance_addr();
    }

    fn advance_addr(&mut self) {
        let inc = if self.ctrl & 0x04 != 0 { 32 } else { 1 };
        self.addr = self.addr.wrapping_add(inc);
    }

    // --- Mapper-facing configuration ---------------------------------------

    /// Arm mapper-specific machinery; mapper 4 enables the scanline counter.
    pub fn set_mapper(&mut self, id: u8) {
        self.mapper_id = id;
    }

    pub fn set_mirroring_mode(&mut self, mirroring: Mirroring) {
        self.mirroring = mirroring;
    }

    /// IRQ latch ($C000): value the counter reloads from.
    pub fn set_irq_latch(&mut self, value: u8) {
        self.irq_latch = value;
    }

    /// IRQ reload ($C001): force a reload on the next clock.
    pub fn set_irq_reload(&mut self) {
        self.irq_reload_pending = true;
        self.irq_counter = 0;
    }

    /// IRQ enable/disable ($E001/$E000). Disabling also drops a pending IRQ.
    pub fn set_irq_enable(&mut self, enabled: bool) {
        self.irq_enabled = enabled;
        if !enabled {
            self.mapper_irq = false;
        }
    }

    /// Pending scanline IRQ; stays raised until the mapper disables it.
    pub fn mapper_irq_pending(&self) -> bool {
        self.mapper_irq
    }

    /// Clock the scanline counter. Called at the end of each visible scanline;
    /// counts only for mapper 4 while rendering is enabled.
    pub fn clock_mapper_irq(&mut self) {
        if self.mapper_id != 4 || !self.rendering_enabled() {
            return;
        }
        if self.irq_counter == 0 || self.irq_reload_pending {
            self.irq_counter = self.irq_latch;
            self.irq_reload_pending = false;
        } else {
            self.irq_counter -= 1;
        }
        if self.irq_counter == 0 && self.irq_enabled {
            self.mapper_irq = true;
        }
    }

    // --- Light gun ---------------------------------------------------------

    /// Luminance test for the light gun: does the last rendered frame carry
    /// enough light around the aim point? Samples a 3×3 patch to be tolerant
    /// of one-pixel aim error.
    pub fn check_target_hit(&self, x: u8, y: u8) -> bool {
        let cx = x as i32;
        let cy = (y as i32).min(FRAME_HEIGHT as i32 - 1);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let px = cx + dx;
                let py = cy + dy;
                if !(0..FRAME_WIDTH as i32).contains(&px) || !(0..FRAME_HEIGHT as i32).contains(&py)
                {
                    continue;
                }
                let rgb = self.framebuffer[py as usize * FRAME_WIDTH + px as usize];
                let lum = (rgb >> 16 & 0xFF) + (rgb >> 8 & 0xFF) + (rgb & 0xFF);
                if lum >= LIGHT_THRESHOLD {
                    return true;
                }
            }
        }
        false
    }

    // --- Rendering ---------------------------------------------------------

    /// Render one visible scanline into the framebuffer (background, then
    /// sprites with priority and sprite-0 hit).
    pub fn render_scanline(&mut self, cart: &mut Cartridge, scanline: u16) {
        let y = scanline as usize;
        let backdrop = NES_PALETTE_RGB[(self.palette[0] & 0x3F) as usize];

        // Background pixel values (0–3) per x, kept for sprite priority and
        // sprite-0 hit. 0 = transparent.
        let mut bg_pixel = [0u8; FRAME_WIDTH];

        if self.mask & 0x08 != 0 {
            self.render_background(cart, y, &mut bg_pixel);
        } else {
            for px in &mut self.framebuffer[y * FRAME_WIDTH..(y + 1) * FRAME_WIDTH] {
                *px = backdrop;
            }
        }

        if self.mask & 0x10 != 0 {
            self.render_sprites(cart, y, &bg_pixel);
        }
    }

    fn render_background(&mut self, cart: &mut Cartridge, y: usize, bg_pixel: &mut [u8]) {
        let base = (self.ctrl & 3) as u32;
        let pattern_base = if self.ctrl & 0x10 != 0 { 0x1000u16 } else { 0 };

        for x in 0..FRAME_WIDTH as u32 {
            let total_x = (x + self.scroll_x as u32 + (base & 1) * 256) % 512;
            let total_y = (y as u32 + self.scroll_y as u32 + (base >> 1) * 240) % 480;

            let logical = (total_y / 240) * 2 + total_x / 256;
            let page = Self::nametable_page(logical as u16, self.mirroring);

            let tile_x = (total_x % 256) / 8;
            let tile_y = (total_y % 240) / 8;
            let nt_index = page as u32 * 0x400 + tile_y * 32 + tile_x;
            let tile_id = self.nametable[nt_index as usize];

            let attr_index = page as u32 * 0x400 + 0x3C0 + (tile_y / 4) * 8 + tile_x / 4;
            let attr = self.nametable[attr_index as usize];
            let shift = ((tile_y >> 1) & 1) * 4 + ((tile_x >> 1) & 1) * 2;
            let palette_bank = (attr >> shift) & 3;

            let row = (total_y % 8) as u16;
            let tile_addr = pattern_base + tile_id as u16 * 16 + row;
            let lo = cart.ppu_read(tile_addr);
            let hi = cart.ppu_read(tile_addr + 8);
            let bit = 7 - (total_x % 8);
            let value = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);

            bg_pixel[x as usize] = value;
            let palette_addr = 0x3F00 + palette_bank as u16 * 4 + value as u16;
            let color = self.palette[Self::palette_index(palette_addr)] as usize;
            self.framebuffer[y * FRAME_WIDTH + x as usize] = NES_PALETTE_RGB[color & 0x3F];
        }
    }

    fn render_sprites(&mut self, cart: &mut Cartridge, y: usize, bg_pixel: &[u8]) {
        let height: usize = if self.ctrl & 0x20 != 0 { 16 } else { 8 };

        // Evaluation: up to 8 sprites on this line, lowest OAM index first.
        let mut slots = [0usize; 8];
        let mut count = 0;
        for i in 0..64 {
            let top = self.oam[i * 4] as usize;
            if y >= top && y < top + height {
                if count < 8 {
                    slots[count] = i;
                    count += 1;
                } else {
                    self.sprite_overflow = true;
                }
            }
        }

        // Draw back-to-front so lower OAM indices win overlaps.
        for s in (0..count).rev() {
            let base = slots[s] * 4;
            let top = self.oam[base] as usize;
            let tile = self.oam[base + 1];
            let attr = self.oam[base + 2];
            let left = self.oam[base + 3] as usize;

            let flip_v = attr & 0x80 != 0;
            let flip_h = attr & 0x40 != 0;
            let behind_bg = attr & 0x20 != 0;
            let palette_base = 0x3F10 + (attr as u16 & 3) * 4;

            let mut row = y - top;
            if flip_v {
                row = height - 1 - row;
            }

            let tile_addr = if height == 8 {
                let pattern_base = if self.ctrl & 0x08 != 0 { 0x1000u16 } else { 0 };
                pattern_base + tile as u16 * 16 + row as u16
            } else {
                // 8×16: pattern table from tile bit 0, two stacked tiles.
                let table = (tile as u16 & 1) * 0x1000;
                let index = (tile & 0xFE) as u16 + (row >= 8) as u16;
                table + index * 16 + (row % 8) as u16
            };
            let lo = cart.ppu_read(tile_addr);
            let hi = cart.ppu_read(tile_addr + 8);

            for px in 0..8usize {
                let col = if flip_h { 7 - px } else { px };
                let bit = 7 - col;
                let value = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
                if value == 0 {
                    continue;
                }

                let screen_x = left + px;
                if screen_x >= FRAME_WIDTH {
                    continue;
                }

                if slots[s] == 0 && bg_pixel[screen_x] != 0 {
                    self.sprite_0_hit = true;
                }
                if behind_bg && bg_pixel[screen_x] != 0 {
                    continue;
                }

                let color = self.palette[Self::palette_index(palette_base + value as u16)];
                self.framebuffer[y * FRAME_WIDTH + screen_x] =
                    NES_PALETTE_RGB[(color & 0x3F) as usize];
            }
        }
    }

    /// Physical nametable page (0 or 1) for a logical 2×2 table index.
    fn nametable_page(logical: u16, mirroring: Mirroring) -> u16 {
        match mirroring {
            Mirroring::Vertical => logical & 1,
            Mirroring::Horizontal => (logical >> 1) & 1,
            Mirroring::OneScreenLower => 0,
            Mirroring::OneScreenUpper => 1,
        }
    }

    /// Map a nametable VRAM address ($2000–$2FFF) to an index into the 2 KiB
    /// internal table under the current mirroring.
    pub fn map_nametable_addr(addr: u16, mirroring: Mirroring) -> u16 {
        let addr = (addr - 0x2000) & 0xFFF;
        let page = Self::nametable_page(addr / 0x400, mirroring);
        page * 0x400 + (addr & 0x3FF)
    }

    /// Resolve a palette address ($3F00–$3FFF) to the 32-byte RAM index.
    /// $3F10/$3F14/$3F18/$3F1C mirror the backdrop entries.
    fn palette_index(addr: u16) -> usize {
        let i = (addr & 0x1F) as usize;
        if i >= 16 && i % 4 == 0 { i - 16 } else { i }
    }
}

impl Default for PPU {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_scanline(ppu: &mut PPU, target: i16) {
        let mut guard = 0u32;
        while ppu.scanline != target || ppu.cycle != 1 {
            ppu.tick();
            guard += 1;
            assert!(guard < 200_000, "scanline {target} never reached");
        }
    }

    #[test]
    fn vblank_begins_at_scanline_241() {
        let mut ppu = PPU::new();
        run_to_scanline(&mut ppu, 241);
        assert!(ppu.vblank);
        assert!(ppu.frame_ready);
    }

    #[test]
    fn nmi_fires_only_when_enabled() {
        let mut ppu = PPU::new();
        run_to_scanline(&mut ppu, 241);
        assert!(!ppu.nmi);

        let mut ppu = PPU::new();
        ppu.write_ctrl(0x80);
        run_to_scanline(&mut ppu, 241);
        assert!(ppu.nmi);
    }

    #[test]
    fn status_read_clears_vblank_and_latches() {
        let mut ppu = PPU::new();
        ppu.write_addr(0x3F); // leave the address latch half-open
        run_to_scanline(&mut ppu, 241);
        let status = ppu.read_status();
        assert_eq!(status & 0x80, 0x80);
        assert_eq!(ppu.read_status() & 0x80, 0);
        // Latch was reset: the next $2006 write is the high byte again.
        ppu.write_addr(0x20);
        ppu.write_addr(0x00);
        assert_eq!(ppu.addr, 0x2000);
    }

    #[test]
    fn palette_mirrors_backdrop_entries() {
        assert_eq!(PPU::palette_index(0x3F10), 0);
        assert_eq!(PPU::palette_index(0x3F14), 4);
        assert_eq!(PPU::palette_index(0x3F18), 8);
        assert_eq!(PPU::palette_index(0x3F1C), 12);
        assert_eq!(PPU::palette_index(0x3F01), 1);
        assert_eq!(PPU::palette_index(0x3F21), 1);
    }

    #[test]
    fn nametable_mapping_follows_mirroring() {
        // Vertical: $2000 and $2800 share a page, $2400 is the other one.
        assert_eq!(
            PPU::map_nametable_addr(0x2000, Mirroring::Vertical),
            PPU::map_nametable_addr(0x2800, Mirroring::Vertical)
        );
        assert_eq!(PPU::map_nametable_addr(0x2400, Mirroring::Vertical), 0x400);
        // Horizontal: $2000 and $2400 share, $2800 is the other.
        assert_eq!(
            PPU::map_nametable_addr(0x2000, Mirroring::Horizontal),
            PPU::map_nametable_addr(0x2400, Mirroring::Horizontal)
        );
        assert_eq!(
            PPU::map_nametable_addr(0x2800, Mirroring::Horizontal),
            0x400
        );
        // One-screen: everything lands on the selected page.
        assert_eq!(
            PPU::map_nametable_addr(0x2C00, Mirroring::OneScreenLower),
            0x000
        );
        assert_eq!(
            PPU::map_nametable_addr(0x2000, Mirroring::OneScreenUpper),
            0x400
        );
    }

    #[test]
    fn hit_test_sees_bright_pixels_only() {
        let mut ppu = PPU::new();
        assert!(!ppu.check_target_hit(100, 50));
        ppu.framebuffer[50 * FRAME_WIDTH + 100] = 0x00FFFFFF;
        assert!(ppu.check_target_hit(100, 50));
        // Neighboring aim still hits through the 3×3 patch.
        assert!(ppu.check_target_hit(101, 51));
        assert!(!ppu.check_target_hit(120, 50));
    }

    #[test]
    fn scanline_counter_raises_irq_after_latch_scanlines() {
        let mut ppu = PPU::new();
        ppu.set_mapper(4);
        ppu.write_mask(0x18);
        ppu.set_irq_latch(3);
        ppu.set_irq_reload();
        ppu.set_irq_enable(true);

        // First clock reloads to 3; three more count down to zero.
        for _ in 0..3 {
            ppu.clock_mapper_irq();
            assert!(!ppu.mapper_irq_pending());
        }
        ppu.clock_mapper_irq();
        assert!(ppu.mapper_irq_pending());

        // Disabling acknowledges.
        ppu.set_irq_enable(false);
        assert!(!ppu.mapper_irq_pending());
    }

    #[test]
    fn scanline_counter_idle_without_mapper_4() {
        let mut ppu = PPU::new();
        ppu.write_mask(0x18);
        ppu.set_irq_latch(0);
        ppu.set_irq_reload();
        ppu.set_irq_enable(true);
        for _ in 0..10 {
            ppu.clock_mapper_irq();
        }
        assert!(!ppu.mapper_irq_pending());
    }
}

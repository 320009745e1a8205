//! Memory bus and address dispatch.
//!
//! Routes every CPU-visible read and write to exactly one subsystem: internal
//! RAM (mirrored ×4), PPU registers (mirrored every 8 bytes through $3FFF),
//! APU and I/O registers, the controller ports, and cartridge space. The
//! address space is total — unmapped holes read $00 and swallow writes. A
//! second, disjoint address space serves PPU-initiated pattern fetches from
//! the cartridge.
//!
//! `tick` fans elapsed CPU cycles out to the PPU (×3) and APU, renders
//! completed scanlines, services DMC sample fetches, clocks the mapper
//! scanline counter, and mirrors the level-triggered IRQ sources onto the
//! shared line.

use crate::{
    apu::apu::APU,
    cartridge::{cartridge::Cartridge, mapper::MapperEvent},
    controller::{ControllerState, InputLatch},
    irq::{IrqLine, IrqSource},
    ppu::ppu::PPU,
    zapper::Zapper,
};

/// Open-bus pattern OR'd into controller port reads: bit 6 floats high on
/// real hardware.
pub const OPEN_BUS: u8 = 0x40;

/// Memory and I/O access the CPU performs, plus interrupt polling. The
/// default tick/poll bodies let test doubles implement just `read`/`write`.
pub trait Bus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, data: u8);

    /// Advance bus-side hardware by `cycles` CPU cycles.
    fn tick(&mut self, _cycles: usize) {}

    /// Edge-triggered NMI request; consumed by the read.
    fn poll_nmi(&mut self) -> bool {
        false
    }

    /// Level-triggered IRQ line state.
    fn poll_irq(&mut self) -> bool {
        false
    }
}

/// The console bus: RAM, PPU, APU, cartridge, controller latch, light gun,
/// and the aggregated IRQ line. Owned by the CPU, so it can never outlive
/// the subsystems it dispatches into.
pub struct NesBus {
    pub ram: [u8; 2048],
    pub cart: Cartridge,
    pub ppu: PPU,
    pub apu: APU,
    pub input: InputLatch,
    pub zapper: Zapper,
    pub irq: IrqLine,
}

impl NesBus {
    /// Wire up a bus around a loaded cartridge. `controllers` is the shared
    /// snapshot the input collector writes; `zapper_connected` plugs the
    /// light gun into port 2.
    pub fn new(cart: Cartridge, controllers: ControllerState, zapper_connected: bool) -> Self {
        let mut ppu = PPU::new();
        ppu.set_mirroring_mode(cart.initial_mirroring());
        ppu.set_mapper(cart.mapper_id());
        Self {
            ram: [0; 2048],
            cart,
            ppu,
            apu: APU::new(),
            input: InputLatch::new(controllers),
            zapper: Zapper::new(zapper_connected),
            irq: IrqLine::new(),
        }
    }

    /// True once the PPU has entered vblank and the framebuffer holds a
    /// complete frame.
    pub fn frame_ready(&self) -> bool {
        self.ppu.frame_ready
    }

    /// Clear the frame flag after publishing.
    pub fn clear_frame_ready(&mut self) {
        self.ppu.frame_ready = false;
    }

    /// Connect or disconnect the light gun. Toggling clears both shift
    /// registers so stale controller-2 bits cannot leak into sensor reads.
    pub fn set_zapper_connected(&mut self, connected: bool) {
        if connected != self.zapper.connected() {
            self.input.clear_shift_registers();
        }
        self.zapper.set_connected(connected);
    }

    /// Pointer down over the viewport, already mapped into frame coordinates.
    pub fn zapper_aim(&mut self, x: u8, y: u8) {
        if self.zapper.connected() {
            self.zapper.aim(x, y);
        }
    }

    /// Pointer up: release the trigger and sense light from the last
    /// rendered frame.
    pub fn zapper_fire(&mut self) {
        if !self.zapper.connected() {
            return;
        }
        let (x, y) = self.zapper.release_trigger();
        let hit = self.ppu.check_target_hit(x, y);
        self.zapper.set_light(hit);
    }

    /// PPU-initiated read: routed to cartridge pattern space only.
    pub fn ppu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.cart.ppu_read(addr),
            _ => 0x00,
        }
    }

    /// PPU-initiated write: cartridge CHR RAM only; elsewhere discarded.
    pub fn ppu_write(&mut self, addr: u16, data: u8) {
        if addr < 0x2000 {
            self.cart.ppu_write(addr, data);
        }
    }

    fn apply_mapper_event(&mut self, event: MapperEvent) {
        match event {
            MapperEvent::SetMirroring(m) => self.ppu.set_mirroring_mode(m),
            MapperEvent::IrqLatch(v) => self.ppu.set_irq_latch(v),
            MapperEvent::IrqReload => self.ppu.set_irq_reload(),
            MapperEvent::IrqEnable(enabled) => {
                self.ppu.set_irq_enable(enabled);
                if !enabled {
                    self.irq.ack(IrqSource::MapperScanline);
                }
            }
        }
    }

    /// Mirror the level-triggered sources onto the line after every tick.
    fn sync_irq_line(&mut self) {
        if self.apu.frame_irq_pending() {
            self.irq.assert(IrqSource::FrameCounter);
        } else {
            self.irq.ack(IrqSource::FrameCounter);
        }
        if self.apu.dmc_irq_pending() {
            self.irq.assert(IrqSource::Dmc);
        } else {
            self.irq.ack(IrqSource::Dmc);
        }
        if self.ppu.mapper_irq_pending() {
            self.irq.assert(IrqSource::MapperScanline);
        }
    }
}

impl Bus for NesBus {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            // Internal RAM, mirrored four times
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize],
            // PPU registers, mirrored every 8 bytes
            0x2000..=0x3FFF => match addr & 0x2007 {
                0x2002 => self.ppu.read_status(),
                0x2004 => self.ppu.read_oam_data(),
                0x2007 => self.ppu.read_data(&mut self.cart),
                // Write-only registers have no defined read value
                _ => 0x00,
            },
            0x4015 => self.apu.read_status(),
            0x4016 => self.input.read_port1(),
            0x4017 => {
                if self.zapper.connected() {
                    self.zapper.port_bits() | OPEN_BUS
                } else {
                    self.input.read_port2()
                }
            }
            // APU registers are write-only; $4018–$401F is unmapped test space
            0x4000..=0x4014 | 0x4018..=0x401F => 0x00,
            // Cartridge: PRG ROM/RAM and mapper ports
            0x4020..=0xFFFF => self.cart.cpu_read(addr),
        }
    }

    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr & 0x07FF) as usize] = data,
            0x2000..=0x3FFF => match addr & 0x2007 {
                0x2000 => self.ppu.write_ctrl(data),
                0x2001 => self.ppu.write_mask(data),
                0x2003 => self.ppu.write_oam_addr(data),
                0x2004 => self.ppu.write_oam_data(data),
                0x2005 => self.ppu.write_scroll(data),
                0x2006 => self.ppu.write_addr(data),
                0x2007 => self.ppu.write_data(&mut self.cart, data),
                _ => {}
            },
            0x4014 => self.ppu.oam_dma(&self.ram, data),
            // Strobe: port 2 is only re-latched while no light gun sits on it
            0x4016 => {
                let latch_port2 = !self.zapper.connected();
                self.input.write_strobe(data, latch_port2);
            }
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.apu.write(addr, data),
            0x4018..=0x401F => {}
            0x4020..=0xFFFF => {
                if let Some(event) = self.cart.cpu_write(addr, data) {
                    self.apply_mapper_event(event);
                }
            }
        }
    }

    fn tick(&mut self, cycles: usize) {
        // 3 PPU dots per CPU cycle; render each scanline as it completes.
        for _ in 0..cycles * 3 {
            if let Some(scanline) = self.ppu.tick() {
                if self.ppu.rendering_enabled() {
                    self.ppu.render_scanline(&mut self.cart, scanline);
                }
                self.ppu.clock_mapper_irq();
            }
        }

        self.apu.tick(cycles);
        if let Some(addr) = self.apu.dmc_fetch_addr() {
            let byte = self.read(addr);
            self.apu.dmc_feed(byte);
        }

        self.sync_irq_line();
    }

    fn poll_nmi(&mut self) -> bool {
        if self.ppu.nmi {
            self.ppu.nmi = false;
            true
        } else {
            false
        }
    }

    fn poll_irq(&mut self) -> bool {
        self.irq.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal NROM image: 16 KiB PRG, 8 KiB CHR RAM.
    fn test_bus(zapper: bool) -> (ControllerState, NesBus) {
        let mut data = vec![0u8; 16];
        data[0..4].copy_from_slice(b"NES\x1A");
        data[4] = 1;
        data.resize(16 + 16 * 1024, 0);
        let cart = Cartridge::from_ines(&data).unwrap();
        let controllers = ControllerState::new();
        let bus = NesBus::new(cart, controllers.clone(), zapper);
        (controllers, bus)
    }

    #[test]
    fn ram_is_mirrored_below_2000() {
        let (_c, mut bus) = test_bus(false);
        bus.write(0x0000, 0xAB);
        assert_eq!(bus.read(0x0800), 0xAB);
        assert_eq!(bus.read(0x1000), 0xAB);
        assert_eq!(bus.read(0x1800), 0xAB);
    }

    #[test]
    fn ppu_registers_mirror_every_eight_bytes() {
        let (_c, mut bus) = test_bus(false);
        // $2006 mirrors at $2006 + 8n; set an address through a mirror, then
        // write data and read it back through another mirror.
        bus.write(0x200E, 0x20);
        bus.write(0x3FFE, 0x10);
        bus.write(0x2007, 0x5A);
        bus.write(0x200E, 0x20);
        bus.write(0x3FFE, 0x10);
        assert_eq!(bus.read(0x3FFF), 0x5A);
    }

    #[test]
    fn unmapped_reads_return_zero() {
        let (_c, mut bus) = test_bus(false);
        assert_eq!(bus.read(0x4018), 0x00);
        assert_eq!(bus.read(0x401F), 0x00);
        assert_eq!(bus.read(0x4000), 0x00);
        // Writes to the same holes are discarded without effect.
        bus.write(0x4018, 0xFF);
        assert_eq!(bus.read(0x4018), 0x00);
    }

    #[test]
    fn controller_port_reads_carry_open_bus() {
        let (controllers, mut bus) = test_bus(false);
        controllers.set(0x0001); // A pressed
        bus.write(0x4016, 1);
        bus.write(0x4016, 0);
        assert_eq!(bus.read(0x4016), 0x41);
        assert_eq!(bus.read(0x4016), 0x40);
    }

    #[test]
    fn strobe_high_reads_track_live_state() {
        let (controllers, mut bus) = test_bus(false);
        bus.write(0x4016, 1);
        assert_eq!(bus.read(0x4016), 0x40);
        controllers.set(0x0001);
        assert_eq!(bus.read(0x4016), 0x41);
    }

    #[test]
    fn zapper_displaces_controller_2() {
        let (controllers, mut bus) = test_bus(true);
        controllers.set(0xFF00); // controller 2 buttons must not show through
        bus.write(0x4016, 1);
        bus.write(0x4016, 0);
        bus.zapper_aim(100, 50);
        let value = bus.read(0x4017);
        assert_eq!(value & 0x10, 0x10, "trigger bit");
        assert_eq!(value & 0x40, 0x40, "open bus bit");
    }

    #[test]
    fn zapper_fire_senses_darkness_as_bit3() {
        let (_c, mut bus) = test_bus(true);
        bus.zapper_aim(100, 50);
        bus.zapper_fire(); // framebuffer is black: no light
        let value = bus.read(0x4017);
        assert_eq!(value & 0x10, 0x00, "trigger released");
        assert_eq!(value & 0x08, 0x08, "no light sensed");
    }

    #[test]
    fn zapper_fire_on_bright_frame_clears_bit3() {
        let (_c, mut bus) = test_bus(true);
        bus.ppu.framebuffer[50 * 256 + 100] = 0x00FFFFFF;
        bus.zapper_aim(100, 50);
        bus.zapper_fire();
        assert_eq!(bus.read(0x4017) & 0x08, 0x00);
    }

    #[test]
    fn toggling_zapper_clears_shift_registers() {
        let (controllers, mut bus) = test_bus(false);
        controllers.set(0xFFFF);
        bus.write(0x4016, 1);
        bus.write(0x4016, 0);
        bus.set_zapper_connected(true);
        bus.set_zapper_connected(false);
        assert_eq!(bus.read(0x4017), 0x40);
        assert_eq!(bus.read(0x4016), 0x40);
    }

    #[test]
    fn ppu_space_routes_pattern_fetches_to_the_cartridge() {
        let (_c, mut bus) = test_bus(false);
        bus.ppu_write(0x0042, 0x99); // CHR RAM board
        assert_eq!(bus.ppu_read(0x0042), 0x99);
        assert_eq!(bus.ppu_read(0x2042), 0x00);
    }

    #[test]
    fn frame_irq_reaches_the_line_and_4015_read_clears_it() {
        let (_c, mut bus) = test_bus(false);
        bus.tick(29830);
        assert!(bus.poll_irq());
        let status = bus.read(0x4015);
        assert_eq!(status & 0x40, 0x40);
        bus.tick(1);
        assert!(!bus.poll_irq());
    }

    #[test]
    fn mapper_irq_ack_leaves_other_sources_asserted() {
        let (_c, mut bus) = test_bus(false);
        bus.tick(29830); // frame IRQ asserted
        bus.irq.assert(IrqSource::MapperScanline);
        bus.irq.ack(IrqSource::MapperScanline);
        assert!(bus.poll_irq(), "frame counter bit must survive");
    }

    #[test]
    fn frame_flag_sets_at_vblank_and_clears_on_demand() {
        let (_c, mut bus) = test_bus(false);
        // A full frame is 262 scanlines of 341 dots: under 30000 CPU cycles.
        bus.tick(30000);
        assert!(bus.frame_ready());
        bus.clear_frame_ready();
        assert!(!bus.frame_ready());
    }
}

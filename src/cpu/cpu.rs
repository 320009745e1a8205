//! 6502 core (Ricoh 2A03 variant: no decimal mode).
//!
//! One `step` executes a whole instruction and then ticks the bus by the
//! instruction's cycle count, including page-cross penalties. NMI is polled
//! edge-style before each instruction; IRQ is level-triggered and gated on
//! the I flag. Jam opcodes halt the core until reset.

use crate::bus::Bus;
use crate::cpu::flags::{
    FLAG_BREAK, FLAG_CARRY, FLAG_DECIMAL, FLAG_INTERRUPT_DISABLE, FLAG_NEGATIVE, FLAG_OVERFLOW,
    FLAG_UNUSED, FLAG_ZERO,
};

const NMI_VECTOR: u16 = 0xFFFA;
const RESET_VECTOR: u16 = 0xFFFC;
const IRQ_VECTOR: u16 = 0xFFFE;

/// Operand addressing mode.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Acc,
    Imm,
    Zp,
    ZpX,
    ZpY,
    Abs,
    AbsX,
    AbsY,
    Ind,
    IndX,
    IndY,
}

fn page_crossed(a: u16, b: u16) -> bool {
    a & 0xFF00 != b & 0xFF00
}

pub struct CPU<B: Bus> {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: u8,
    pub cycles: u64,
    pub bus: B,
    pub halted: bool,
    /// Print a nestest-style line before each instruction.
    pub trace: bool,
    new_instruction: bool,
}

impl<B: Bus> CPU<B> {
    pub fn new(bus: B) -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            pc: 0,
            status: FLAG_INTERRUPT_DISABLE | FLAG_UNUSED,
            cycles: 0,
            bus,
            halted: false,
            trace: false,
            new_instruction: false,
        }
    }

    /// Load the reset vector and restore power-on register state.
    pub fn reset(&mut self) {
        self.pc = self.read_word(RESET_VECTOR);
        self.sp = 0xFD;
        self.status = FLAG_INTERRUPT_DISABLE | FLAG_UNUSED;
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.halted = false;
        self.cycles = 7;
    }

    /// True when the previous `step` completed an instruction (as opposed to
    /// the core sitting jammed or never having run).
    pub fn is_new_instruction(&self) -> bool {
        self.new_instruction
    }

    /// Execute one instruction, servicing a pending NMI or IRQ first, then
    /// tick the bus by the cycles spent.
    pub fn step(&mut self) {
        if self.halted {
            self.new_instruction = false;
            return;
        }

        if self.bus.poll_nmi() {
            self.interrupt(NMI_VECTOR);
            self.bus.tick(7);
        } else if self.status & FLAG_INTERRUPT_DISABLE == 0 && self.bus.poll_irq() {
            self.interrupt(IRQ_VECTOR);
            self.bus.tick(7);
        }

        let pc = self.pc;
        let opcode = self.fetch_byte();
        if self.trace {
            self.trace_line(pc, opcode);
        }

        let before = self.cycles;
        self.execute(opcode);
        self.new_instruction = !self.halted;
        self.bus.tick((self.cycles - before) as usize);
    }

    fn interrupt(&mut self, vector: u16) {
        self.push_word(self.pc);
        self.push((self.status | FLAG_UNUSED) & !FLAG_BREAK);
        self.status |= FLAG_INTERRUPT_DISABLE;
        self.pc = self.read_word(vector);
        self.cycles += 7;
    }

    fn jam(&mut self) {
        self.halted = true;
        self.pc = self.pc.wrapping_sub(1);
    }

    fn trace_line(&self, pc: u16, opcode: u8) {
        println!(
            "{:04X}  {:02X}        A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} CYC:{}",
            pc, opcode, self.a, self.x, self.y, self.status, self.sp, self.cycles
        );
    }

    // --- Memory helpers ----------------------------------------------------

    fn fetch_byte(&mut self) -> u8 {
        let byte = self.bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    fn fetch_word(&mut self) -> u16 {
        let lo = self.fetch_byte() as u16;
        let hi = self.fetch_byte() as u16;
        hi << 8 | lo
    }

    fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.bus.read(addr) as u16;
        let hi = self.bus.read(addr.wrapping_add(1)) as u16;
        hi << 8 | lo
    }

    /// Zero-page pointer read; the second byte wraps within the page.
    fn read_zp_word(&mut self, zp: u8) -> u16 {
        let lo = self.bus.read(zp as u16) as u16;
        let hi = self.bus.read(zp.wrapping_add(1) as u16) as u16;
        hi << 8 | lo
    }

    fn push(&mut self, value: u8) {
        self.bus.write(0x0100 | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop(&mut self) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        self.bus.read(0x0100 | self.sp as u16)
    }

    fn push_word(&mut self, value: u16) {
        self.push((value >> 8) as u8);
        self.push(value as u8);
    }

    fn pop_word(&mut self) -> u16 {
        let lo = self.pop() as u16;
        let hi = self.pop() as u16;
        hi << 8 | lo
    }

    /// Resolve the operand address for memory modes. The bool reports a page
    /// crossing (cycle penalty on indexed reads).
    fn operand_addr(&mut self, mode: Mode) -> (u16, bool) {
        match mode {
            Mode::Zp => (self.fetch_byte() as u16, false),
            Mode::ZpX => (self.fetch_byte().wrapping_add(self.x) as u16, false),
            Mode::ZpY => (self.fetch_byte().wrapping_add(self.y) as u16, false),
            Mode::Abs => (self.fetch_word(), false),
            Mode::AbsX => {
                let base = self.fetch_word();
                let addr = base.wrapping_add(self.x as u16);
                (addr, page_crossed(base, addr))
            }
            Mode::AbsY => {
                let base = self.fetch_word();
                let addr = base.wrapping_add(self.y as u16);
                (addr, page_crossed(base, addr))
            }
            Mode::Ind => {
                // 6502 bug: the pointer's high byte read wraps within the page.
                let ptr = self.fetch_word();
                let lo = self.bus.read(ptr) as u16;
                let hi_addr = (ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF);
                let hi = self.bus.read(hi_addr) as u16;
                (hi << 8 | lo, false)
            }
            Mode::IndX => {
                let zp = self.fetch_byte().wrapping_add(self.x);
                (self.read_zp_word(zp), false)
            }
            Mode::IndY => {
                let zp = self.fetch_byte();
                let base = self.read_zp_word(zp);
                let addr = base.wrapping_add(self.y as u16);
                (addr, page_crossed(base, addr))
            }
            Mode::Acc | Mode::Imm => unreachable!("no address for this mode"),
        }
    }

    fn read_operand(&mut self, mode: Mode) -> (u8, bool) {
        match mode {
            Mode::Imm => (self.fetch_byte(), false),
            Mode::Acc => (self.a, false),
            _ => {
                let (addr, crossed) = self.operand_addr(mode);
                (self.bus.read(addr), crossed)
            }
        }
    }

    // --- Flag helpers ------------------------------------------------------

    fn set_zn(&mut self, value: u8) {
        self.set_flag(FLAG_ZERO, value == 0);
        self.set_flag(FLAG_NEGATIVE, value & 0x80 != 0);
    }

    fn set_flag(&mut self, flag: u8, on: bool) {
        if on {
            self.status |= flag;
        } else {
            self.status &= !flag;
        }
    }

    fn flag(&self, flag: u8) -> bool {
        self.status & flag != 0
    }

    // --- Operations --------------------------------------------------------

    fn lda(&mut self, mode: Mode, cycles: u64) {
        let (v, crossed) = self.read_operand(mode);
        self.a = v;
        self.set_zn(v);
        self.cycles += cycles + crossed as u64;
    }

    fn ldx(&mut self, mode: Mode, cycles: u64) {
        let (v, crossed) = self.read_operand(mode);
        self.x = v;
        self.set_zn(v);
        self.cycles += cycles + crossed as u64;
    }

    fn ldy(&mut self, mode: Mode, cycles: u64) {
        let (v, crossed) = self.read_operand(mode);
        self.y = v;
        self.set_zn(v);
        self.cycles += cycles + crossed as u64;
    }

    fn store(&mut self, mode: Mode, value: u8, cycles: u64) {
        let (addr, _) = self.operand_addr(mode);
        self.bus.write(addr, value);
        self.cycles += cycles;
    }

    fn and(&mut self, mode: Mode, cycles: u64) {
        let (v, crossed) = self.read_operand(mode);
        self.a &= v;
        self.set_zn(self.a);
        self.cycles += cycles + crossed as u64;
    }

    fn ora(&mut self, mode: Mode, cycles: u64) {
        let (v, crossed) = self.read_operand(mode);
        self.a |= v;
        self.set_zn(self.a);
        self.cycles += cycles + crossed as u64;
    }

    fn eor(&mut self, mode: Mode, cycles: u64) {
        let (v, crossed) = self.read_operand(mode);
        self.a ^= v;
        self.set_zn(self.a);
        self.cycles += cycles + crossed as u64;
    }

    fn bit(&mut self, mode: Mode, cycles: u64) {
        let (v, _) = self.read_operand(mode);
        self.set_flag(FLAG_ZERO, self.a & v == 0);
        self.set_flag(FLAG_OVERFLOW, v & 0x40 != 0);
        self.set_flag(FLAG_NEGATIVE, v & 0x80 != 0);
        self.cycles += cycles;
    }

    fn adc_value(&mut self, value: u8) {
        let carry = self.flag(FLAG_CARRY) as u16;
        let sum = self.a as u16 + value as u16 + carry;
        let result = sum as u8;
        self.set_flag(FLAG_CARRY, sum > 0xFF);
        self.set_flag(
            FLAG_OVERFLOW,
            (self.a ^ result) & (value ^ result) & 0x80 != 0,
        );
        self.a = result;
        self.set_zn(result);
    }

    fn adc(&mut self, mode: Mode, cycles: u64) {
        let (v, crossed) = self.read_operand(mode);
        self.adc_value(v);
        self.cycles += cycles + crossed as u64;
    }

    fn sbc(&mut self, mode: Mode, cycles: u64) {
        let (v, crossed) = self.read_operand(mode);
        self.adc_value(!v);
        self.cycles += cycles + crossed as u64;
    }

    fn compare(&mut self, reg: u8, mode: Mode, cycles: u64) {
        let (v, crossed) = self.read_operand(mode);
        self.set_flag(FLAG_CARRY, reg >= v);
        self.set_zn(reg.wrapping_sub(v));
        self.cycles += cycles + crossed as u64;
    }

    fn inc_mem(&mut self, mode: Mode, cycles: u64) {
        let (addr, _) = self.operand_addr(mode);
        let v = self.bus.read(addr).wrapping_add(1);
        self.bus.write(addr, v);
        self.set_zn(v);
        self.cycles += cycles;
    }

    fn dec_mem(&mut self, mode: Mode, cycles: u64) {
        let (addr, _) = self.operand_addr(mode);
        let v = self.bus.read(addr).wrapping_sub(1);
        self.bus.write(addr, v);
        self.set_zn(v);
        self.cycles += cycles;
    }

    fn asl_value(&mut self, value: u8) -> u8 {
        self.set_flag(FLAG_CARRY, value & 0x80 != 0);
        let r = value << 1;
        self.set_zn(r);
        r
    }

    fn lsr_value(&mut self, value: u8) -> u8 {
        self.set_flag(FLAG_CARRY, value & 1 != 0);
        let r = value >> 1;
        self.set_zn(r);
        r
    }

    fn rol_value(&mut self, value: u8) -> u8 {
        let carry_in = self.flag(FLAG_CARRY) as u8;
        self.set_flag(FLAG_CARRY, value & 0x80 != 0);
        let r = value << 1 | carry_in;
        self.set_zn(r);
        r
    }

    fn ror_value(&mut self, value: u8) -> u8 {
        let carry_in = (self.flag(FLAG_CARRY) as u8) << 7;
        self.set_flag(FLAG_CARRY, value & 1 != 0);
        let r = value >> 1 | carry_in;
        self.set_zn(r);
        r
    }

    /// Shift/rotate dispatcher: accumulator or read-modify-write memory.
    fn shift(&mut self, mode: Mode, cycles: u64, op: fn(&mut Self, u8) -> u8) {
        if mode == Mode::Acc {
            let r = op(self, self.a);
            self.a = r;
        } else {
            let (addr, _) = self.operand_addr(mode);
            let v = self.bus.read(addr);
            let r = op(self, v);
            self.bus.write(addr, r);
        }
        self.cycles += cycles;
    }

    fn branch(&mut self, cond: bool) {
        let offset = self.fetch_byte() as i8;
        self.cycles += 2;
        if cond {
            let target = self.pc.wrapping_add(offset as i16 as u16);
            self.cycles += 1 + page_crossed(self.pc, target) as u64;
            self.pc = target;
        }
    }

    // Undocumented combos. See https://www.nesdev.org/wiki/CPU_unofficial_opcodes.

    fn lax(&mut self, mode: Mode, cycles: u64) {
        let (v, crossed) = self.read_operand(mode);
        self.a = v;
        self.x = v;
        self.set_zn(v);
        self.cycles += cycles + crossed as u64;
    }

    fn dcp(&mut self, mode: Mode, cycles: u64) {
        let (addr, _) = self.operand_addr(mode);
        let v = self.bus.read(addr).wrapping_sub(1);
        self.bus.write(addr, v);
        self.set_flag(FLAG_CARRY, self.a >= v);
        self.set_zn(self.a.wrapping_sub(v));
        self.cycles += cycles;
    }

    fn isb(&mut self, mode: Mode, cycles: u64) {
        let (addr, _) = self.operand_addr(mode);
        let v = self.bus.read(addr).wrapping_add(1);
        self.bus.write(addr, v);
        self.adc_value(!v);
        self.cycles += cycles;
    }

    fn slo(&mut self, mode: Mode, cycles: u64) {
        let (addr, _) = self.operand_addr(mode);
        let v = self.bus.read(addr);
        let r = self.asl_value(v);
        self.bus.write(addr, r);
        self.a |= r;
        self.set_zn(self.a);
        self.cycles += cycles;
    }

    fn rla(&mut self, mode: Mode, cycles: u64) {
        let (addr, _) = self.operand_addr(mode);
        let v = self.bus.read(addr);
        let r = self.rol_value(v);
        self.bus.write(addr, r);
        self.a &= r;
        self.set_zn(self.a);
        self.cycles += cycles;
    }

    fn sre(&mut self, mode: Mode, cycles: u64) {
        let (addr, _) = self.operand_addr(mode);
        let v = self.bus.read(addr);
        let r = self.lsr_value(v);
        self.bus.write(addr, r);
        self.a ^= r;
        self.set_zn(self.a);
        self.cycles += cycles;
    }

    fn rra(&mut self, mode: Mode, cycles: u64) {
        let (addr, _) = self.operand_addr(mode);
        let v = self.bus.read(addr);
        let r = self.ror_value(v);
        self.bus.write(addr, r);
        self.adc_value(r);
        self.cycles += cycles;
    }

    /// Multi-byte NOP: consume the operand, pay the read cycles.
    fn nop_read(&mut self, mode: Mode, cycles: u64) {
        let (_, crossed) = self.read_operand(mode);
        self.cycles += cycles + crossed as u64;
    }

    // --- Dispatch ----------------------------------------------------------

    fn execute(&mut self, opcode: u8) {
        use Mode::*;
        match opcode {
            // Jams
            0x02 | 0x12 | 0x22 | 0x32 | 0x42 | 0x52 | 0x62 | 0x72 | 0x92 | 0xB2 | 0xD2 | 0xF2 => {
                self.jam();
            }

            // Loads
            0xA9 => self.lda(Imm, 2),
            0xA5 => self.lda(Zp, 3),
            0xB5 => self.lda(ZpX, 4),
            0xAD => self.lda(Abs, 4),
            0xBD => self.lda(AbsX, 4),
            0xB9 => self.lda(AbsY, 4),
            0xA1 => self.lda(IndX, 6),
            0xB1 => self.lda(IndY, 5),
            0xA2 => self.ldx(Imm, 2),
            0xA6 => self.ldx(Zp, 3),
            0xB6 => self.ldx(ZpY, 4),
            0xAE => self.ldx(Abs, 4),
            0xBE => self.ldx(AbsY, 4),
            0xA0 => self.ldy(Imm, 2),
            0xA4 => self.ldy(Zp, 3),
            0xB4 => self.ldy(ZpX, 4),
            0xAC => self.ldy(Abs, 4),
            0xBC => self.ldy(AbsX, 4),

            // Stores
            0x85 => self.store(Zp, self.a, 3),
            0x95 => self.store(ZpX, self.a, 4),
            0x8D => self.store(Abs, self.a, 4),
            0x9D => self.store(AbsX, self.a, 5),
            0x99 => self.store(AbsY, self.a, 5),
            0x81 => self.store(IndX, self.a, 6),
            0x91 => self.store(IndY, self.a, 6),
            0x86 => self.store(Zp, self.x, 3),
            0x96 => self.store(ZpY, self.x, 4),
            0x8E => self.store(Abs, self.x, 4),
            0x84 => self.store(Zp, self.y, 3),
            0x94 => self.store(ZpX, self.y, 4),
            0x8C => self.store(Abs, self.y, 4),

            // Transfers
            0xAA => {
                self.x = self.a;
                self.set_zn(self.x);
                self.cycles += 2;
            }
            0xA8 => {
                self.y = self.a;
                self.set_zn(self.y);
                self.cycles += 2;
            }
            0x8A => {
                self.a = self.x;
                self.set_zn(self.a);
                self.cycles += 2;
            }
            0x98 => {
                self.a = self.y;
                self.set_zn(self.a);
                self.cycles += 2;
            }
            0xBA => {
                self.x = self.sp;
                self.set_zn(self.x);
                self.cycles += 2;
            }
            0x9A => {
                self.sp = self.x;
                self.cycles += 2;
            }

            // Stack
            0x48 => {
                self.push(self.a);
                self.cycles += 3;
            }
            0x08 => {
                self.push(self.status | FLAG_BREAK | FLAG_UNUSED);
                self.cycles += 3;
            }
            0x68 => {
                self.a = self.pop();
                self.set_zn(self.a);
                self.cycles += 4;
            }
            0x28 => {
                self.status = (self.pop() & !FLAG_BREAK) | FLAG_UNUSED;
                self.cycles += 4;
            }

            // Logic
            0x29 => self.and(Imm, 2),
            0x25 => self.and(Zp, 3),
            0x35 => self.and(ZpX, 4),
            0x2D => self.and(Abs, 4),
            0x3D => self.and(AbsX, 4),
            0x39 => self.and(AbsY, 4),
            0x21 => self.and(IndX, 6),
            0x31 => self.and(IndY, 5),
            0x09 => self.ora(Imm, 2),
            0x05 => self.ora(Zp, 3),
            0x15 => self.ora(ZpX, 4),
            0x0D => self.ora(Abs, 4),
            0x1D => self.ora(AbsX, 4),
            0x19 => self.ora(AbsY, 4),
            0x01 => self.ora(IndX, 6),
            0x11 => self.ora(IndY, 5),
            0x49 => self.eor(Imm, 2),
            0x45 => self.eor(Zp, 3),
            0x55 => self.eor(ZpX, 4),
            0x4D => self.eor(Abs, 4),
            0x5D => self.eor(AbsX, 4),
            0x59 => self.eor(AbsY, 4),
            0x41 => self.eor(IndX, 6),
            0x51 => self.eor(IndY, 5),
            0x24 => self.bit(Zp, 3),
            0x2C => self.bit(Abs, 4),

            // Arithmetic
            0x69 => self.adc(Imm, 2),
            0x65 => self.adc(Zp, 3),
            0x75 => self.adc(ZpX, 4),
            0x6D => self.adc(Abs, 4),
            0x7D => self.adc(AbsX, 4),
            0x79 => self.adc(AbsY, 4),
            0x61 => self.adc(IndX, 6),
            0x71 => self.adc(IndY, 5),
            0xE9 | 0xEB => self.sbc(Imm, 2),
            0xE5 => self.sbc(Zp, 3),
            0xF5 => self.sbc(ZpX, 4),
            0xED => self.sbc(Abs, 4),
            0xFD => self.sbc(AbsX, 4),
            0xF9 => self.sbc(AbsY, 4),
            0xE1 => self.sbc(IndX, 6),
            0xF1 => self.sbc(IndY, 5),
            0xC9 => self.compare(self.a, Imm, 2),
            0xC5 => self.compare(self.a, Zp, 3),
            0xD5 => self.compare(self.a, ZpX, 4),
            0xCD => self.compare(self.a, Abs, 4),
            0xDD => self.compare(self.a, AbsX, 4),
            0xD9 => self.compare(self.a, AbsY, 4),
            0xC1 => self.compare(self.a, IndX, 6),
            0xD1 => self.compare(self.a, IndY, 5),
            0xE0 => self.compare(self.x, Imm, 2),
            0xE4 => self.compare(self.x, Zp, 3),
            0xEC => self.compare(self.x, Abs, 4),
            0xC0 => self.compare(self.y, Imm, 2),
            0xC4 => self.compare(self.y, Zp, 3),
            0xCC => self.compare(self.y, Abs, 4),

            // Increments and decrements
            0xE6 => self.inc_mem(Zp, 5),
            0xF6 => self.inc_mem(ZpX, 6),
            0xEE => self.inc_mem(Abs, 6),
            0xFE => self.inc_mem(AbsX, 7),
            0xC6 => self.dec_mem(Zp, 5),
            0xD6 => self.dec_mem(ZpX, 6),
            0xCE => self.dec_mem(Abs, 6),
            0xDE => self.dec_mem(AbsX, 7),
            0xE8 => {
                self.x = self.x.wrapping_add(1);
                self.set_zn(self.x);
                self.cycles += 2;
            }
            0xC8 => {
                self.y = self.y.wrapping_add(1);
                self.set_zn(self.y);
                self.cycles += 2;
            }
            0xCA => {
                self.x = self.x.wrapping_sub(1);
                self.set_zn(self.x);
                self.cycles += 2;
            }
            0x88 => {
                self.y = self.y.wrapping_sub(1);
                self.set_zn(self.y);
                self.cycles += 2;
            }

            // Shifts and rotates
            0x0A => self.shift(Acc, 2, Self::asl_value),
            0x06 => self.shift(Zp, 5, Self::asl_value),
            0x16 => self.shift(ZpX, 6, Self::asl_value),
            0x0E => self.shift(Abs, 6, Self::asl_value),
            0x1E => self.shift(AbsX, 7, Self::asl_value),
            0x4A => self.shift(Acc, 2, Self::lsr_value),
            0x46 => self.shift(Zp, 5, Self::lsr_value),
            0x56 => self.shift(ZpX, 6, Self::lsr_value),
            0x4E => self.shift(Abs, 6, Self::lsr_value),
            0x5E => self.shift(AbsX, 7, Self::lsr_value),
            0x2A => self.shift(Acc, 2, Self::rol_value),
            0x26 => self.shift(Zp, 5, Self::rol_value),
            0x36 => self.shift(ZpX, 6, Self::rol_value),
            0x2E => self.shift(Abs, 6, Self::rol_value),
            0x3E => self.shift(AbsX, 7, Self::rol_value),
            0x6A => self.shift(Acc, 2, Self::ror_value),
            0x66 => self.shift(Zp, 5, Self::ror_value),
            0x76 => self.shift(ZpX, 6, Self::ror_value),
            0x6E => self.shift(Abs, 6, Self::ror_value),
            0x7E => self.shift(AbsX, 7, Self::ror_value),

            // Jumps and subroutines
            0x4C => {
                let (addr, _) = self.operand_addr(Abs);
                self.pc = addr;
                self.cycles += 3;
            }
            0x6C => {
                let (addr, _) = self.operand_addr(Ind);
                self.pc = addr;
                self.cycles += 5;
            }
            0x20 => {
                let target = self.fetch_word();
                self.push_word(self.pc.wrapping_sub(1));
                self.pc = target;
                self.cycles += 6;
            }
            0x60 => {
                self.pc = self.pop_word().wrapping_add(1);
                self.cycles += 6;
            }
            0x40 => {
                self.status = (self.pop() & !FLAG_BREAK) | FLAG_UNUSED;
                self.pc = self.pop_word();
                self.cycles += 6;
            }
            0x00 => {
                // BRK: the byte after the opcode is padding.
                self.push_word(self.pc.wrapping_add(1));
                self.push(self.status | FLAG_BREAK | FLAG_UNUSED);
                self.status |= FLAG_INTERRUPT_DISABLE;
                self.pc = self.read_word(IRQ_VECTOR);
                self.cycles += 7;
            }

            // Branches
            0x10 => self.branch(!self.flag(FLAG_NEGATIVE)),
            0x30 => self.branch(self.flag(FLAG_NEGATIVE)),
            0x50 => self.branch(!self.flag(FLAG_OVERFLOW)),
            0x70 => self.branch(self.flag(FLAG_OVERFLOW)),
            0x90 => self.branch(!self.flag(FLAG_CARRY)),
            0xB0 => self.branch(self.flag(FLAG_CARRY)),
            0xD0 => self.branch(!self.flag(FLAG_ZERO)),
            0xF0 => self.branch(self.flag(FLAG_ZERO)),

            // Flag operations
            0x18 => {
                self.set_flag(FLAG_CARRY, false);
                self.cycles += 2;
            }
            0x38 => {
                self.set_flag(FLAG_CARRY, true);
                self.cycles += 2;
            }
            0x58 => {
                self.set_flag(FLAG_INTERRUPT_DISABLE, false);
                self.cycles += 2;
            }
            0x78 => {
                self.set_flag(FLAG_INTERRUPT_DISABLE, true);
                self.cycles += 2;
            }
            0xB8 => {
                self.set_flag(FLAG_OVERFLOW, false);
                self.cycles += 2;
            }
            0xD8 | 0xF8 => {
                self.set_flag(FLAG_DECIMAL, opcode == 0xF8);
                self.cycles += 2;
            }

            // NOPs, documented and otherwise
            0xEA | 0x1A | 0x3A | 0x5A | 0x7A | 0xDA | 0xFA => self.cycles += 2,
            0x80 | 0x82 | 0x89 | 0xC2 | 0xE2 => self.nop_read(Imm, 2),
            0x04 | 0x44 | 0x64 => self.nop_read(Zp, 3),
            0x14 | 0x34 | 0x54 | 0x74 | 0xD4 | 0xF4 => self.nop_read(ZpX, 4),
            0x0C => self.nop_read(Abs, 4),
            0x1C | 0x3C | 0x5C | 0x7C | 0xDC | 0xFC => self.nop_read(AbsX, 4),

            // Undocumented combos
            0xA7 => self.lax(Zp, 3),
            0xB7 => self.lax(ZpY, 4),
            0xAF => self.lax(Abs, 4),
            0xBF => self.lax(AbsY, 4),
            0xA3 => self.lax(IndX, 6),
            0xB3 => self.lax(IndY, 5),
            0x87 => self.store(Zp, self.a & self.x, 3),
            0x97 => self.store(ZpY, self.a & self.x, 4),
            0x8F => self.store(Abs, self.a & self.x, 4),
            0x83 => self.store(IndX, self.a & self.x, 6),
            0xC7 => self.dcp(Zp, 5),
            0xD7 => self.dcp(ZpX, 6),
            0xCF => self.dcp(Abs, 6),
            0xDF => self.dcp(AbsX, 7),
            0xDB => self.dcp(AbsY, 7),
            0xC3 => self.dcp(IndX, 8),
            0xD3 => self.dcp(IndY, 8),
            0xE7 => self.isb(Zp, 5),
            0xF7 => self.isb(ZpX, 6),
            0xEF => self.isb(Abs, 6),
            0xFF => self.isb(AbsX, 7),
            0xFB => self.isb(AbsY, 7),
            0xE3 => self.isb(IndX, 8),
            0xF3 => self.isb(IndY, 8),
            0x07 => self.slo(Zp, 5),
            0x17 => self.slo(ZpX, 6),
            0x0F => self.slo(Abs, 6),
            0x1F => self.slo(AbsX, 7),
            0x1B => self.slo(AbsY, 7),
            0x03 => self.slo(IndX, 8),
            0x13 => self.slo(IndY, 8),
            0x27 => self.rla(Zp, 5),
            0x37 => self.rla(ZpX, 6),
            0x2F => self.rla(Abs, 6),
            0x3F => self.rla(AbsX, 7),
            0x3B => self.rla(AbsY, 7),
            0x23 => self.rla(IndX, 8),
            0x33 => self.rla(IndY, 8),
            0x47 => self.sre(Zp, 5),
            0x57 => self.sre(ZpX, 6),
            0x4F => self.sre(Abs, 6),
            0x5F => self.sre(AbsX, 7),
            0x5B => self.sre(AbsY, 7),
            0x43 => self.sre(IndX, 8),
            0x53 => self.sre(IndY, 8),
            0x67 => self.rra(Zp, 5),
            0x77 => self.rra(ZpX, 6),
            0x6F => self.rra(Abs, 6),
            0x7F => self.rra(AbsX, 7),
            0x7B => self.rra(AbsY, 7),
            0x63 => self.rra(IndX, 8),
            0x73 => self.rra(IndY, 8),

            // The rarely seen remainder behaves as a 2-cycle NOP here.
            _ => self.cycles += 2,
        }
    }
}

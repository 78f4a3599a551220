// This file is part of nova64.
// Grounded on binaryfields-zinc64/src/cpu/cpu6510.rs (execute() match over
// Instruction) and zinc64-core/src/cpu/cpu.rs (BCD adc/sbc, flag helpers).
// Unlike the teacher (which ticks one micro-op per bus cycle through a
// tick_fn callback), nova64 executes a whole instruction per call and
// returns its cycle cost, per spec.md §4.1's `execute_next` contract.

use std::fmt;

use super::addressing::AddressingMode;
use super::opcode::{decode, Mnemonic, OpcodeEntry};
use super::registers::{Flag, Registers, Variant};
use super::Addressable;
use crate::util::Shared;

pub struct Cpu6502 {
    mem: Shared<dyn Addressable>,
    variant: Variant,
    regs: Registers,
    pub maskable_interrupt_pending: bool,
    pub non_maskable_interrupt_pending: bool,
    halted: bool,
}

impl Cpu6502 {
    pub fn new(mem: Shared<dyn Addressable>, variant: Variant) -> Self {
        Self {
            mem,
            variant,
            regs: Registers::new(),
            maskable_interrupt_pending: false,
            non_maskable_interrupt_pending: false,
            halted: false,
        }
    }

    /// Initializes registers from the reset vector, or from an explicit
    /// entry point when the caller wants to skip the vector (used by the
    /// CPU functional-test harness).
    pub fn boot(&mut self, entry: Option<u16>) {
        self.regs.reset();
        self.halted = false;
        self.regs.pc = entry.unwrap_or_else(|| self.read_word(0xfffc));
    }

    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    pub fn set_pc(&mut self, value: u16) {
        self.regs.pc = value;
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    fn read(&self, addr: u16) -> u8 {
        self.mem.borrow().read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.mem.borrow_mut().write(addr, value);
    }

    fn read_word(&self, addr: u16) -> u16 {
        let lo = self.read(addr);
        let hi = self.read(addr.wrapping_add(1));
        u16::from(hi) << 8 | u16::from(lo)
    }

    fn read_word_zp(&self, ptr: u8) -> u16 {
        let lo = self.read(u16::from(ptr));
        let hi = self.read(u16::from(ptr.wrapping_add(1)));
        u16::from(hi) << 8 | u16::from(lo)
    }

    /// Effective address and whether indexing crossed a page boundary, for
    /// the instruction whose opcode byte sits at `opcode_addr`. Only reads
    /// code-space / pointer bytes; never the operand's own memory cell, so
    /// it is safe both to peek (cycles_for_next) and to use for real
    /// execution.
    fn effective_address(&self, mode: AddressingMode, opcode_addr: u16) -> (u16, bool) {
        let b1 = self.read(opcode_addr.wrapping_add(1));
        let b2 = self.read(opcode_addr.wrapping_add(2));
        let abs = u16::from(b2) << 8 | u16::from(b1);
        match mode {
            AddressingMode::ZeroPage => (u16::from(b1), false),
            AddressingMode::ZeroPageX => (u16::from(b1.wrapping_add(self.regs.x)), false),
            AddressingMode::ZeroPageY => (u16::from(b1.wrapping_add(self.regs.y)), false),
            AddressingMode::Absolute => (abs, false),
            AddressingMode::AbsoluteX => {
                let result = abs.wrapping_add(u16::from(self.regs.x));
                (result, (abs & 0xff00) != (result & 0xff00))
            }
            AddressingMode::AbsoluteY => {
                let result = abs.wrapping_add(u16::from(self.regs.y));
                (result, (abs & 0xff00) != (result & 0xff00))
            }
            AddressingMode::IndirectX => {
                let ptr = b1.wrapping_add(self.regs.x);
                (self.read_word_zp(ptr), false)
            }
            AddressingMode::IndirectY => {
                let base = self.read_word_zp(b1);
                let result = base.wrapping_add(u16::from(self.regs.y));
                (result, (base & 0xff00) != (result & 0xff00))
            }
            AddressingMode::IndirectAbsoluteX => {
                let ptr = abs.wrapping_add(u16::from(self.regs.x));
                (self.read_word(ptr), false)
            }
            AddressingMode::Indirect => {
                let target = if self.variant == Variant::Nmos && b1 == 0xff {
                    // Classic NMOS indirect-JMP page-wrap bug: the high byte
                    // is fetched from the start of the same page, not the
                    // next page.
                    let lo = self.read(abs);
                    let hi = self.read(abs & 0xff00);
                    u16::from(hi) << 8 | u16::from(lo)
                } else {
                    self.read_word(abs)
                };
                (target, false)
            }
            AddressingMode::Relative => {
                let offset = b1 as i8;
                let base = opcode_addr.wrapping_add(2);
                let target = if offset < 0 {
                    base.wrapping_sub((offset as i16).unsigned_abs())
                } else {
                    base.wrapping_add(offset as u16)
                };
                (target, (base & 0xff00) != (target & 0xff00))
            }
            AddressingMode::ZeroPageBitBranch => {
                let offset = b2 as i8;
                let base = opcode_addr.wrapping_add(3);
                let target = if offset < 0 {
                    base.wrapping_sub((offset as i16).unsigned_abs())
                } else {
                    base.wrapping_add(offset as u16)
                };
                (target, false)
            }
            AddressingMode::Accumulator | AddressingMode::Implied | AddressingMode::Immediate => {
                (0, false)
            }
        }
    }

    fn branch_condition(&self, mnemonic: Mnemonic) -> Option<bool> {
        let p = self.regs.p;
        match mnemonic {
            Mnemonic::BCC => Some(p & Flag::Carry as u8 == 0),
            Mnemonic::BCS => Some(p & Flag::Carry as u8 != 0),
            Mnemonic::BEQ => Some(p & Flag::Zero as u8 != 0),
            Mnemonic::BNE => Some(p & Flag::Zero as u8 == 0),
            Mnemonic::BMI => Some(p & Flag::Negative as u8 != 0),
            Mnemonic::BPL => Some(p & Flag::Negative as u8 == 0),
            Mnemonic::BVC => Some(p & Flag::Overflow as u8 == 0),
            Mnemonic::BVS => Some(p & Flag::Overflow as u8 != 0),
            Mnemonic::BRA => Some(true),
            _ => None,
        }
    }

    /// Peeks the cycle cost of the instruction at the program counter
    /// without mutating CPU or bus state.
    pub fn cycles_for_next(&self) -> u8 {
        if self.non_maskable_interrupt_pending
            || (self.maskable_interrupt_pending && self.regs.p & Flag::IntDisable as u8 == 0)
        {
            return 7;
        }
        let opcode = self.read(self.regs.pc);
        let entry = decode(opcode, self.variant);
        let mut cycles = entry.base_cycles;
        if let Some(taken) = self.branch_condition(entry.mnemonic) {
            if taken {
                let (target, _) = self.effective_address(entry.mode, self.regs.pc);
                cycles += 1;
                let next_pc = self.regs.pc.wrapping_add(u16::from(entry.len()));
                if (next_pc & 0xff00) != (target & 0xff00) {
                    cycles += 1;
                }
            }
        } else if entry.page_cross_check {
            let (_, crossed) = self.effective_address(entry.mode, self.regs.pc);
            if crossed {
                cycles += 1;
            }
        }
        cycles
    }

    /// Fetches, decodes, and executes one instruction (or services a
    /// pending interrupt), mutating CPU and bus state, and returns the
    /// number of cycles every cycle-driven device must be advanced by.
    pub fn execute_next(&mut self) -> u8 {
        if self.non_maskable_interrupt_pending {
            self.service_interrupt(0xfffa, false);
            self.non_maskable_interrupt_pending = false;
            return 7;
        }
        if self.maskable_interrupt_pending && self.regs.p & Flag::IntDisable as u8 == 0 {
            self.service_interrupt(0xfffe, false);
            return 7;
        }

        let opcode_addr = self.regs.pc;
        let opcode = self.read(opcode_addr);
        let entry = decode(opcode, self.variant);
        self.regs.pc = opcode_addr.wrapping_add(u16::from(entry.len()));

        let mut cycles = entry.base_cycles;
        let (address, crossed) = self.effective_address(entry.mode, opcode_addr);
        if let Some(taken) = self.branch_condition(entry.mnemonic) {
            if taken {
                cycles += 1;
                if (self.regs.pc & 0xff00) != (address & 0xff00) {
                    cycles += 1;
                }
                self.regs.pc = address;
            }
        } else if entry.page_cross_check && crossed {
            cycles += 1;
        }

        self.execute(entry, opcode_addr, address);
        cycles
    }

    fn execute(&mut self, entry: OpcodeEntry, opcode_addr: u16, address: u16) {
        use Mnemonic::*;
        let mode = entry.mode;
        match entry.mnemonic {
            JMP => {
                if opcode_addr == self.jmp_self_target(mode, address, opcode_addr) {
                    self.halted = true;
                }
                self.regs.pc = address;
            }
            JSR => {
                let ret = opcode_addr.wrapping_add(2);
                self.push((ret >> 8) as u8);
                self.push(ret as u8);
                self.regs.pc = address;
            }
            RTS => {
                let lo = self.pop();
                let hi = self.pop();
                self.regs.pc = (u16::from(hi) << 8 | u16::from(lo)).wrapping_add(1);
            }
            BRK => {
                let ret = opcode_addr.wrapping_add(2);
                self.push((ret >> 8) as u8);
                self.push(ret as u8);
                self.push(self.regs.p | Flag::Break as u8 | Flag::Reserved as u8);
                self.set_flag(Flag::IntDisable, true);
                self.regs.pc = self.read_word(0xfffe);
            }
            RTI => {
                self.regs.p = (self.pop() & !(Flag::Break as u8)) | Flag::Reserved as u8;
                let lo = self.pop();
                let hi = self.pop();
                self.regs.pc = u16::from(hi) << 8 | u16::from(lo);
            }
            BCC | BCS | BEQ | BNE | BMI | BPL | BVC | BVS | BRA => {
                // already resolved in execute_next
            }
            RMB(bit) => {
                let v = self.read(address) & !(1 << bit);
                self.write(address, v);
            }
            SMB(bit) => {
                let v = self.read(address) | (1 << bit);
                self.write(address, v);
            }
            BBR(bit) => {
                let v = self.read(u16::from(self.read(opcode_addr.wrapping_add(1))));
                if v & (1 << bit) == 0 {
                    self.regs.pc = address;
                }
            }
            BBS(bit) => {
                let v = self.read(u16::from(self.read(opcode_addr.wrapping_add(1))));
                if v & (1 << bit) != 0 {
                    self.regs.pc = address;
                }
            }
            CLC => self.set_flag(Flag::Carry, false),
            CLD => self.set_flag(Flag::Decimal, false),
            CLI => self.set_flag(Flag::IntDisable, false),
            CLV => self.set_flag(Flag::Overflow, false),
            SEC => self.set_flag(Flag::Carry, true),
            SED => self.set_flag(Flag::Decimal, true),
            SEI => self.set_flag(Flag::IntDisable, true),
            NOP | JAM => {}
            LDA => {
                let v = self.load(mode, address, opcode_addr);
                self.regs.a = v;
                self.set_nz(v);
            }
            LDX => {
                let v = self.load(mode, address, opcode_addr);
                self.regs.x = v;
                self.set_nz(v);
            }
            LDY => {
                let v = self.load(mode, address, opcode_addr);
                self.regs.y = v;
                self.set_nz(v);
            }
            LAX => {
                let v = self.load(mode, address, opcode_addr);
                self.regs.a = v;
                self.regs.x = v;
                self.set_nz(v);
            }
            STA => self.write(address, self.regs.a),
            STX => self.write(address, self.regs.x),
            STY => self.write(address, self.regs.y),
            STZ => self.write(address, 0),
            SAX => self.write(address, self.regs.a & self.regs.x),
            TAX => {
                self.regs.x = self.regs.a;
                self.set_nz(self.regs.x);
            }
            TXA => {
                self.regs.a = self.regs.x;
                self.set_nz(self.regs.a);
            }
            TAY => {
                self.regs.y = self.regs.a;
                self.set_nz(self.regs.y);
            }
            TYA => {
                self.regs.a = self.regs.y;
                self.set_nz(self.regs.a);
            }
            TSX => {
                self.regs.x = self.regs.sp;
                self.set_nz(self.regs.x);
            }
            TXS => self.regs.sp = self.regs.x,
            PHA => self.push(self.regs.a),
            PHX => self.push(self.regs.x),
            PHY => self.push(self.regs.y),
            PHP => self.push(self.regs.p | Flag::Break as u8 | Flag::Reserved as u8),
            PLA => {
                let v = self.pop();
                self.regs.a = v;
                self.set_nz(v);
            }
            PLX => {
                let v = self.pop();
                self.regs.x = v;
                self.set_nz(v);
            }
            PLY => {
                let v = self.pop();
                self.regs.y = v;
                self.set_nz(v);
            }
            PLP => self.regs.p = (self.pop() & !(Flag::Break as u8)) | Flag::Reserved as u8,
            AND => {
                let v = self.regs.a & self.load(mode, address, opcode_addr);
                self.regs.a = v;
                self.set_nz(v);
            }
            ORA => {
                let v = self.regs.a | self.load(mode, address, opcode_addr);
                self.regs.a = v;
                self.set_nz(v);
            }
            EOR => {
                let v = self.regs.a ^ self.load(mode, address, opcode_addr);
                self.regs.a = v;
                self.set_nz(v);
            }
            BIT => {
                let v = self.load(mode, address, opcode_addr);
                if mode != AddressingMode::Immediate {
                    self.set_flag(Flag::Negative, v & 0x80 != 0);
                    self.set_flag(Flag::Overflow, v & 0x40 != 0);
                }
                self.set_flag(Flag::Zero, v & self.regs.a == 0);
            }
            TSB => {
                let v = self.load(mode, address, opcode_addr);
                self.set_flag(Flag::Zero, v & self.regs.a == 0);
                self.write(address, v | self.regs.a);
            }
            TRB => {
                let v = self.load(mode, address, opcode_addr);
                self.set_flag(Flag::Zero, v & self.regs.a == 0);
                self.write(address, v & !self.regs.a);
            }
            ADC => self.adc(self.load(mode, address, opcode_addr)),
            SBC => self.sbc(self.load(mode, address, opcode_addr)),
            CMP => self.compare(self.regs.a, self.load(mode, address, opcode_addr)),
            CPX => self.compare(self.regs.x, self.load(mode, address, opcode_addr)),
            CPY => self.compare(self.regs.y, self.load(mode, address, opcode_addr)),
            INC => {
                let v = self.load(mode, address, opcode_addr).wrapping_add(1);
                self.store(mode, address, v);
                self.set_nz(v);
            }
            DEC => {
                let v = self.load(mode, address, opcode_addr).wrapping_sub(1);
                self.store(mode, address, v);
                self.set_nz(v);
            }
            INX => {
                self.regs.x = self.regs.x.wrapping_add(1);
                self.set_nz(self.regs.x);
            }
            INY => {
                self.regs.y = self.regs.y.wrapping_add(1);
                self.set_nz(self.regs.y);
            }
            DEX => {
                self.regs.x = self.regs.x.wrapping_sub(1);
                self.set_nz(self.regs.x);
            }
            DEY => {
                self.regs.y = self.regs.y.wrapping_sub(1);
                self.set_nz(self.regs.y);
            }
            ASL => {
                let v = self.load(mode, address, opcode_addr);
                self.set_flag(Flag::Carry, v & 0x80 != 0);
                let r = v << 1;
                self.store(mode, address, r);
                self.set_nz(r);
            }
            LSR => {
                let v = self.load(mode, address, opcode_addr);
                self.set_flag(Flag::Carry, v & 0x01 != 0);
                let r = v >> 1;
                self.store(mode, address, r);
                self.set_nz(r);
            }
            ROL => {
                let v = self.load(mode, address, opcode_addr);
                let carry_in = (self.regs.p & Flag::Carry as u8) != 0;
                self.set_flag(Flag::Carry, v & 0x80 != 0);
                let r = (v << 1) | (carry_in as u8);
                self.store(mode, address, r);
                self.set_nz(r);
            }
            ROR => {
                let v = self.load(mode, address, opcode_addr);
                let carry_in = (self.regs.p & Flag::Carry as u8) != 0;
                self.set_flag(Flag::Carry, v & 0x01 != 0);
                let r = (v >> 1) | ((carry_in as u8) << 7);
                self.store(mode, address, r);
                self.set_nz(r);
            }
            SLO => {
                let v = self.load(mode, address, opcode_addr);
                self.set_flag(Flag::Carry, v & 0x80 != 0);
                let r = v << 1;
                self.store(mode, address, r);
                self.regs.a |= r;
                self.set_nz(self.regs.a);
            }
            RLA => {
                let v = self.load(mode, address, opcode_addr);
                let carry_in = (self.regs.p & Flag::Carry as u8) != 0;
                self.set_flag(Flag::Carry, v & 0x80 != 0);
                let r = (v << 1) | (carry_in as u8);
                self.store(mode, address, r);
                self.regs.a &= r;
                self.set_nz(self.regs.a);
            }
            SRE => {
                let v = self.load(mode, address, opcode_addr);
                self.set_flag(Flag::Carry, v & 0x01 != 0);
                let r = v >> 1;
                self.store(mode, address, r);
                self.regs.a ^= r;
                self.set_nz(self.regs.a);
            }
            RRA => {
                let v = self.load(mode, address, opcode_addr);
                let carry_in = (self.regs.p & Flag::Carry as u8) != 0;
                self.set_flag(Flag::Carry, v & 0x01 != 0);
                let r = (v >> 1) | ((carry_in as u8) << 7);
                self.store(mode, address, r);
                self.adc(r);
            }
            DCP => {
                let v = self.load(mode, address, opcode_addr).wrapping_sub(1);
                self.store(mode, address, v);
                self.compare(self.regs.a, v);
            }
            ISC => {
                let v = self.load(mode, address, opcode_addr).wrapping_add(1);
                self.store(mode, address, v);
                self.sbc(v);
            }
        }
    }

    /// Detects the "halt by jumping to itself" idiom: a JMP whose target
    /// equals its own opcode address.
    fn jmp_self_target(&self, _mode: AddressingMode, address: u16, _opcode_addr: u16) -> u16 {
        address
    }

    fn load(&self, mode: AddressingMode, address: u16, opcode_addr: u16) -> u8 {
        match mode {
            AddressingMode::Accumulator => self.regs.a,
            AddressingMode::Immediate => self.read(opcode_addr.wrapping_add(1)),
            _ => self.read(address),
        }
    }

    fn store(&mut self, mode: AddressingMode, address: u16, value: u8) {
        match mode {
            AddressingMode::Accumulator => self.regs.a = value,
            _ => self.write(address, value),
        }
    }

    fn push(&mut self, value: u8) {
        let addr = 0x0100 | u16::from(self.regs.sp);
        self.write(addr, value);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
    }

    fn pop(&mut self) -> u8 {
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let addr = 0x0100 | u16::from(self.regs.sp);
        self.read(addr)
    }

    fn service_interrupt(&mut self, vector: u16, _is_brk: bool) {
        let pc = self.regs.pc;
        self.push((pc >> 8) as u8);
        self.push(pc as u8);
        self.push(self.regs.p & !(Flag::Break as u8) | Flag::Reserved as u8);
        self.set_flag(Flag::IntDisable, true);
        if self.variant == Variant::Cmos {
            self.set_flag(Flag::Decimal, false);
        }
        self.regs.pc = self.read_word(vector);
    }

    fn set_flag(&mut self, flag: Flag, value: bool) {
        if value {
            self.regs.p |= flag as u8;
        } else {
            self.regs.p &= !(flag as u8);
        }
    }

    fn set_nz(&mut self, value: u8) {
        self.set_flag(Flag::Negative, value & 0x80 != 0);
        self.set_flag(Flag::Zero, value == 0);
    }

    fn compare(&mut self, reg: u8, value: u8) {
        let result = u16::from(reg).wrapping_sub(u16::from(value));
        self.set_flag(Flag::Carry, reg >= value);
        self.set_nz((result & 0xff) as u8);
    }

    fn adc(&mut self, value: u8) {
        let a = u16::from(self.regs.a);
        let v = u16::from(value);
        let carry = u16::from(self.regs.p & Flag::Carry as u8 != 0);
        let temp = if self.regs.p & Flag::Decimal as u8 == 0 {
            a.wrapping_add(v).wrapping_add(carry)
        } else {
            let mut t = (a & 0x0f) + (v & 0x0f) + carry;
            if t > 0x09 {
                t += 0x06;
            }
            t += (a & 0xf0) + (v & 0xf0);
            if t & 0x01f0 > 0x90 {
                t += 0x60;
            }
            t
        };
        self.set_flag(Flag::Overflow, (a ^ v) & 0x80 == 0 && (a ^ temp) & 0x80 == 0x80);
        self.set_flag(Flag::Carry, temp > 0xff);
        let result = (temp & 0xff) as u8;
        self.regs.a = result;
        self.set_nz(result);
    }

    fn sbc(&mut self, value: u8) {
        let a = u16::from(self.regs.a);
        let v = u16::from(value);
        let carry = u16::from(self.regs.p & Flag::Carry as u8 == 0);
        let temp = if self.regs.p & Flag::Decimal as u8 == 0 {
            a.wrapping_sub(v).wrapping_sub(carry)
        } else {
            let mut t = (a & 0x0f).wrapping_sub(v & 0x0f).wrapping_sub(carry);
            if t & 0x10 != 0 {
                t = (t.wrapping_sub(0x06) & 0x0f) | (a & 0xf0).wrapping_sub(v & 0xf0).wrapping_sub(0x10);
            } else {
                t = (t & 0x0f) | (a & 0xf0).wrapping_sub(v & 0xf0);
            }
            if t & 0x0100 != 0 {
                t = t.wrapping_sub(0x60);
            }
            t
        };
        self.set_flag(Flag::Overflow, (a ^ temp) & 0x80 != 0 && (a ^ v) & 0x80 == 0x80);
        self.set_flag(Flag::Carry, temp < 0x100);
        let result = (temp & 0xff) as u8;
        self.regs.a = result;
        self.set_nz(result);
    }

    /// Renders the instruction at `addr` as text plus its byte length, for
    /// host-side debuggers.
    pub fn disassemble(&self, addr: u16) -> (String, u8) {
        let opcode = self.read(addr);
        let entry = decode(opcode, self.variant);
        let len = entry.len();
        let operand = match entry.mode {
            AddressingMode::Implied | AddressingMode::Accumulator => String::new(),
            AddressingMode::Immediate => format!(" #${:02x}", self.read(addr.wrapping_add(1))),
            AddressingMode::ZeroPage => format!(" ${:02x}", self.read(addr.wrapping_add(1))),
            AddressingMode::ZeroPageX => format!(" ${:02x},x", self.read(addr.wrapping_add(1))),
            AddressingMode::ZeroPageY => format!(" ${:02x},y", self.read(addr.wrapping_add(1))),
            AddressingMode::IndirectX => format!(" (${:02x},x)", self.read(addr.wrapping_add(1))),
            AddressingMode::IndirectY => format!(" (${:02x}),y", self.read(addr.wrapping_add(1))),
            AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::Indirect
            | AddressingMode::IndirectAbsoluteX => {
                let (address, _) = self.effective_address(entry.mode, addr);
                let lo = self.read(addr.wrapping_add(1));
                let hi = self.read(addr.wrapping_add(2));
                let _ = address;
                let suffix = match entry.mode {
                    AddressingMode::AbsoluteX => ",x",
                    AddressingMode::AbsoluteY => ",y",
                    _ => "",
                };
                if entry.mode == AddressingMode::Indirect {
                    format!(" (${:02x}{:02x})", hi, lo)
                } else if entry.mode == AddressingMode::IndirectAbsoluteX {
                    format!(" (${:02x}{:02x},x)", hi, lo)
                } else {
                    format!(" ${:02x}{:02x}{}", hi, lo, suffix)
                }
            }
            AddressingMode::Relative | AddressingMode::ZeroPageBitBranch => {
                let (target, _) = self.effective_address(entry.mode, addr);
                format!(" ${:04x}", target)
            }
        };
        (format!("{:?}{}", entry.mnemonic, operand), len)
    }
}

impl fmt::Display for Cpu6502 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PC={:04x} A={:02x} X={:02x} Y={:02x} SP={:02x} P={:02x}",
            self.regs.pc, self.regs.a, self.regs.x, self.regs.y, self.regs.sp, self.regs.p
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::new_shared;

    struct FlatRam(Vec<u8>);

    impl Addressable for FlatRam {
        fn read(&self, address: u16) -> u8 {
            self.0[address as usize]
        }

        fn write(&mut self, address: u16, value: u8) {
            self.0[address as usize] = value;
        }
    }

    fn new_cpu(variant: Variant) -> (Cpu6502, Shared<FlatRam>) {
        let mem = new_shared(FlatRam(vec![0; 0x10000]));
        let cpu = Cpu6502::new(mem.clone(), variant);
        (cpu, mem)
    }

    fn load(mem: &Shared<FlatRam>, addr: u16, bytes: &[u8]) {
        let mut mem = mem.borrow_mut();
        for (i, b) in bytes.iter().enumerate() {
            mem.write(addr.wrapping_add(i as u16), *b);
        }
    }

    #[test]
    fn boot_reads_reset_vector() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        load(&mem, 0xfffc, &[0x00, 0x80]);
        cpu.boot(None);
        assert_eq!(cpu.pc(), 0x8000);
        assert_eq!(cpu.registers().sp, 0xfd);
        assert!(!cpu.halted());
    }

    #[test]
    fn boot_with_explicit_entry_skips_the_vector() {
        let (mut cpu, _mem) = new_cpu(Variant::Nmos);
        cpu.boot(Some(0x0400));
        assert_eq!(cpu.pc(), 0x0400);
    }

    #[test]
    fn lda_immediate_sets_zero_and_negative_flags() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        load(&mem, 0x0400, &[0xa9, 0x00]); // LDA #$00
        cpu.boot(Some(0x0400));
        let cycles = cpu.execute_next();
        assert_eq!(cycles, 2);
        assert_eq!(cpu.registers().a, 0);
        assert_ne!(cpu.registers().p & Flag::Zero as u8, 0);

        load(&mem, 0x0400, &[0xa9, 0x80]); // LDA #$80
        cpu.boot(Some(0x0400));
        cpu.execute_next();
        assert_eq!(cpu.registers().a, 0x80);
        assert_ne!(cpu.registers().p & Flag::Negative as u8, 0);
    }

    #[test]
    fn absolute_x_page_cross_adds_a_cycle() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        // LDX #$01 ; LDA $40ff,X -> effective address $4100, crossing a
        // page boundary: costs base 4 + 1.
        load(&mem, 0x0400, &[0xa2, 0x01, 0xbd, 0xff, 0x40]);
        load(&mem, 0x4100, &[0x42]);
        cpu.boot(Some(0x0400));
        let ldx_cycles = cpu.execute_next();
        assert_eq!(ldx_cycles, 2);
        assert_eq!(cpu.cycles_for_next(), 5);
        let lda_cycles = cpu.execute_next();
        assert_eq!(lda_cycles, 5);
        assert_eq!(cpu.registers().a, 0x42);
    }

    #[test]
    fn absolute_x_without_page_cross_costs_base_cycles() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        load(&mem, 0x0400, &[0xa2, 0x01, 0xbd, 0x00, 0x40]); // LDX #$01 ; LDA $4000,X
        load(&mem, 0x4001, &[0x7e]);
        cpu.boot(Some(0x0400));
        cpu.execute_next();
        let cycles = cpu.execute_next();
        assert_eq!(cycles, 4);
        assert_eq!(cpu.registers().a, 0x7e);
    }

    #[test]
    fn branch_taken_across_a_page_costs_two_extra_cycles() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        // BEQ +1 at $40fd: base pc = $40ff, target = $4100 - crosses into
        // the next page, so cost is base 2 + taken 1 + page-cross 1 = 4.
        load(&mem, 0x40fd, &[0xf0, 0x01]);
        load(&mem, 0x0400, &[0xa9, 0x00]); // LDA #$00 sets Z
        cpu.boot(Some(0x0400));
        cpu.execute_next();
        cpu.set_pc(0x40fd);
        let cycles = cpu.execute_next();
        assert_eq!(cycles, 4);
        assert_eq!(cpu.pc(), 0x4100);
    }

    #[test]
    fn branch_not_taken_costs_base_cycles_only() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        load(&mem, 0x0400, &[0xa9, 0x01]); // LDA #$01 clears Z
        load(&mem, 0x0402, &[0xf0, 0x10]); // BEQ +16, not taken
        cpu.boot(Some(0x0400));
        cpu.execute_next();
        let cycles = cpu.execute_next();
        assert_eq!(cycles, 2);
        assert_eq!(cpu.pc(), 0x0404);
    }

    #[test]
    fn adc_binary_mode_sets_carry_and_overflow() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        // 0x7f + 0x01 overflows into negative: V set, C clear.
        load(&mem, 0x0400, &[0xa9, 0x7f, 0x69, 0x01]); // LDA #$7f ; ADC #$01
        cpu.boot(Some(0x0400));
        cpu.execute_next();
        cpu.execute_next();
        assert_eq!(cpu.registers().a, 0x80);
        assert_ne!(cpu.registers().p & Flag::Overflow as u8, 0);
        assert_eq!(cpu.registers().p & Flag::Carry as u8, 0);
    }

    #[test]
    fn adc_decimal_mode_produces_bcd_result() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        // SED ; LDA #$09 ; ADC #$01 -> BCD 10 ($10), carry clear.
        load(&mem, 0x0400, &[0xf8, 0xa9, 0x09, 0x69, 0x01]);
        cpu.boot(Some(0x0400));
        cpu.execute_next();
        cpu.execute_next();
        cpu.execute_next();
        assert_eq!(cpu.registers().a, 0x10);
        assert_eq!(cpu.registers().p & Flag::Carry as u8, 0);
    }

    #[test]
    fn stack_push_and_pop_round_trip_through_page_one() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        load(&mem, 0x0400, &[0xa9, 0x55, 0x48, 0xa9, 0x00, 0x68]); // LDA #$55 ; PHA ; LDA #$00 ; PLA
        cpu.boot(Some(0x0400));
        let sp0 = cpu.registers().sp;
        cpu.execute_next(); // LDA #$55
        cpu.execute_next(); // PHA
        assert_eq!(cpu.registers().sp, sp0.wrapping_sub(1));
        cpu.execute_next(); // LDA #$00
        assert_eq!(cpu.registers().a, 0);
        cpu.execute_next(); // PLA
        assert_eq!(cpu.registers().a, 0x55);
        assert_eq!(cpu.registers().sp, sp0);
    }

    #[test]
    fn jsr_rts_round_trips_the_return_address() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        load(&mem, 0x0400, &[0x20, 0x00, 0x05]); // JSR $0500
        load(&mem, 0x0500, &[0x60]); // RTS
        cpu.boot(Some(0x0400));
        cpu.execute_next(); // JSR
        assert_eq!(cpu.pc(), 0x0500);
        cpu.execute_next(); // RTS
        assert_eq!(cpu.pc(), 0x0403);
    }

    #[test]
    fn jmp_to_self_halts_the_cpu() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        load(&mem, 0x0400, &[0x4c, 0x00, 0x04]); // JMP $0400
        cpu.boot(Some(0x0400));
        cpu.execute_next();
        assert!(cpu.halted());
        assert_eq!(cpu.pc(), 0x0400);
    }

    #[test]
    fn brk_pushes_flags_with_break_set_and_loads_irq_vector() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        load(&mem, 0xfffe, &[0x00, 0x06]);
        load(&mem, 0x0400, &[0x00]); // BRK
        cpu.boot(Some(0x0400));
        let sp0 = cpu.registers().sp;
        cpu.execute_next();
        assert_eq!(cpu.pc(), 0x0600);
        assert_ne!(cpu.registers().p & Flag::IntDisable as u8, 0);
        let pushed_flags = mem.borrow().read(0x0100 | u16::from(sp0.wrapping_sub(2)));
        assert_ne!(pushed_flags & Flag::Break as u8, 0);
    }

    #[test]
    fn rti_restores_flags_without_break_and_pops_pc() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        load(&mem, 0xfffe, &[0x00, 0x06]);
        load(&mem, 0x0400, &[0x00]); // BRK
        load(&mem, 0x0600, &[0x40]); // RTI
        cpu.boot(Some(0x0400));
        cpu.execute_next(); // BRK -> 0x0600
        cpu.execute_next(); // RTI
        assert_eq!(cpu.pc(), 0x0402);
        assert_eq!(cpu.registers().p & Flag::Break as u8, 0);
    }

    #[test]
    fn maskable_interrupt_is_ignored_while_interrupt_disable_is_set() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        load(&mem, 0x0400, &[0x78, 0xea]); // SEI ; NOP
        cpu.boot(Some(0x0400));
        cpu.execute_next();
        cpu.maskable_interrupt_pending = true;
        assert_eq!(cpu.cycles_for_next(), 2); // NOP's own cost, not the 7-cycle IRQ entry
    }

    #[test]
    fn non_maskable_interrupt_is_serviced_even_with_interrupts_disabled() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        load(&mem, 0xfffa, &[0x00, 0x07]);
        load(&mem, 0x0400, &[0x78]); // SEI
        cpu.boot(Some(0x0400));
        cpu.execute_next();
        cpu.non_maskable_interrupt_pending = true;
        assert_eq!(cpu.cycles_for_next(), 7);
        let cycles = cpu.execute_next();
        assert_eq!(cycles, 7);
        assert_eq!(cpu.pc(), 0x0700);
        assert!(!cpu.non_maskable_interrupt_pending);
    }

    #[test]
    fn nmos_indirect_jmp_wraps_within_the_page() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        // JMP ($30ff) on NMOS reads the high byte from $3000, not $3100.
        load(&mem, 0x0400, &[0x6c, 0xff, 0x30]);
        load(&mem, 0x30ff, &[0x34]);
        load(&mem, 0x3000, &[0x12]);
        load(&mem, 0x3100, &[0xff]);
        cpu.boot(Some(0x0400));
        cpu.execute_next();
        assert_eq!(cpu.pc(), 0x1234);
    }

    #[test]
    fn cmos_indirect_jmp_does_not_wrap() {
        let (mut cpu, mem) = new_cpu(Variant::Cmos);
        load(&mem, 0x0400, &[0x6c, 0xff, 0x30]);
        load(&mem, 0x30ff, &[0x34]);
        load(&mem, 0x3100, &[0x12]);
        cpu.boot(Some(0x0400));
        cpu.execute_next();
        assert_eq!(cpu.pc(), 0x1234);
    }

    #[test]
    fn cmos_stz_writes_zero_and_is_not_available_on_nmos() {
        let (mut cpu, mem) = new_cpu(Variant::Cmos);
        load(&mem, 0x0400, &[0x64, 0x10]); // STZ $10
        load(&mem, 0x10, &[0xff]);
        cpu.boot(Some(0x0400));
        cpu.execute_next();
        assert_eq!(mem.borrow().read(0x10), 0);
    }

    #[test]
    fn illegal_nmos_opcode_executes_as_a_nop_of_its_documented_length() {
        let (mut cpu, mem) = new_cpu(Variant::Nmos);
        load(&mem, 0x0400, &[0x1a, 0xa9, 0x09]); // NOP* ; LDA #$09
        cpu.boot(Some(0x0400));
        let cycles = cpu.execute_next();
        assert_eq!(cycles, 2);
        assert_eq!(cpu.pc(), 0x0401);
        cpu.execute_next();
        assert_eq!(cpu.registers().a, 0x09);
    }

    #[test]
    fn disassemble_reports_mnemonic_and_instruction_length() {
        let (cpu, mem) = new_cpu(Variant::Nmos);
        load(&mem, 0x0400, &[0xa9, 0x42]);
        let (text, len) = cpu.disassemble(0x0400);
        assert_eq!(text, "LDA #$42");
        assert_eq!(len, 2);
    }
}

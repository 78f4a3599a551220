// This file is part of nova64.
// Grounded on cpu::opcode's decode table (binaryfields-zinc64/src/cpu/
// cpu6510.rs dispatch shape), inverted here to encode machine code bytes
// instead of decoding them, and on spec.md §4.11's code generator note
// that it "emits 6502/65C02 machine code directly; no textual assembly
// stage exists." Targets the NMOS opcode subset only, so generated code
// runs unmodified under either CPU variant (spec.md §4.1's Non-goal list
// excludes a CMOS-specific fast path for compiled programs).

use std::collections::HashMap;

use crate::cpu::{decode, AddressingMode, Mnemonic, Variant};

fn opcode_byte(mnemonic: Mnemonic, mode: AddressingMode) -> u8 {
    (0u16..=255)
        .map(|op| op as u8)
        .find(|&op| {
            let entry = decode(op, Variant::Nmos);
            entry.mnemonic == mnemonic && entry.mode == mode
        })
        .unwrap_or_else(|| panic!("codegen: no NMOS encoding for {:?}/{:?}", mnemonic, mode))
}

#[derive(Clone, Copy)]
enum Patch {
    /// Signed branch displacement, relative to the address of the byte
    /// following the operand.
    Rel8,
    /// Absolute little-endian 16-bit address.
    Abs16,
    /// Low byte of a label's resolved address, for `LDA #<label`-style
    /// immediates building up a pointer a byte at a time.
    Lo8,
    /// High byte of a label's resolved address.
    Hi8,
}

/// Either a literal address or a label resolved once the whole program's
/// labels are known (a forward reference to a branch target, a later
/// function, or the function currently being emitted).
#[derive(Clone)]
pub enum Target {
    Addr(u16),
    Label(String),
}

impl From<u16> for Target {
    fn from(addr: u16) -> Self {
        Target::Addr(addr)
    }
}

impl From<&str> for Target {
    fn from(label: &str) -> Self {
        Target::Label(label.to_string())
    }
}

impl From<String> for Target {
    fn from(label: String) -> Self {
        Target::Label(label)
    }
}

/// Accumulates machine code for the whole compiled program into one
/// contiguous buffer, so calls and branches between functions resolve
/// against the same label table as branches within a function.
pub struct Asm {
    bytes: Vec<u8>,
    labels: HashMap<String, usize>,
    patches: Vec<(usize, Patch, String)>,
    next_anon: u32,
    line_map: Vec<(usize, u32)>,
}

impl Asm {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            labels: HashMap::new(),
            patches: Vec::new(),
            next_anon: 0,
            line_map: Vec::new(),
        }
    }

    pub fn offset(&self) -> usize {
        self.bytes.len()
    }

    pub fn anon_label(&mut self) -> String {
        self.next_anon += 1;
        format!("$L{}", self.next_anon)
    }

    pub fn mark(&mut self, label: &str) {
        self.labels.insert(label.to_string(), self.bytes.len());
    }

    pub fn label_offset(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    /// Records that the next byte emitted corresponds to the given source
    /// line, for the compiled program's address-to-line map.
    pub fn note_line(&mut self, line: u32) {
        if line != 0 {
            self.line_map.push((self.bytes.len(), line));
        }
    }

    fn byte(&mut self, b: u8) {
        self.bytes.push(b);
    }

    fn u16le(&mut self, v: u16) {
        self.bytes.push((v & 0xff) as u8);
        self.bytes.push((v >> 8) as u8);
    }

    pub fn implied(&mut self, m: Mnemonic) {
        self.byte(opcode_byte(m, AddressingMode::Implied));
    }

    pub fn accumulator(&mut self, m: Mnemonic) {
        self.byte(opcode_byte(m, AddressingMode::Accumulator));
    }

    pub fn immediate(&mut self, m: Mnemonic, value: u8) {
        self.byte(opcode_byte(m, AddressingMode::Immediate));
        self.byte(value);
    }

    pub fn zp(&mut self, m: Mnemonic, addr: u8) {
        self.byte(opcode_byte(m, AddressingMode::ZeroPage));
        self.byte(addr);
    }

    pub fn zp_x(&mut self, m: Mnemonic, addr: u8) {
        self.byte(opcode_byte(m, AddressingMode::ZeroPageX));
        self.byte(addr);
    }

    pub fn indirect_y(&mut self, m: Mnemonic, zp_ptr: u8) {
        self.byte(opcode_byte(m, AddressingMode::IndirectY));
        self.byte(zp_ptr);
    }

    pub fn indirect_x(&mut self, m: Mnemonic, zp_ptr: u8) {
        self.byte(opcode_byte(m, AddressingMode::IndirectX));
        self.byte(zp_ptr);
    }

    pub fn absolute(&mut self, m: Mnemonic, target: impl Into<Target>) {
        self.byte(opcode_byte(m, AddressingMode::Absolute));
        self.absolute_operand(target);
    }

    pub fn absolute_x(&mut self, m: Mnemonic, target: impl Into<Target>) {
        self.byte(opcode_byte(m, AddressingMode::AbsoluteX));
        self.absolute_operand(target);
    }

    pub fn absolute_y(&mut self, m: Mnemonic, target: impl Into<Target>) {
        self.byte(opcode_byte(m, AddressingMode::AbsoluteY));
        self.absolute_operand(target);
    }

    fn absolute_operand(&mut self, target: impl Into<Target>) {
        match target.into() {
            Target::Addr(a) => self.u16le(a),
            Target::Label(name) => {
                let at = self.bytes.len();
                self.patches.push((at, Patch::Abs16, name));
                self.u16le(0);
            }
        }
    }

    /// JMP/JSR both use the absolute addressing mode on the 6502; kept as
    /// distinct methods purely for readability at call sites.
    pub fn jmp(&mut self, target: impl Into<Target>) {
        self.absolute(Mnemonic::JMP, target);
    }

    pub fn jsr(&mut self, target: impl Into<Target>) {
        self.absolute(Mnemonic::JSR, target);
    }

    pub fn branch(&mut self, m: Mnemonic, label: impl Into<Target>) {
        self.byte(opcode_byte(m, AddressingMode::Relative));
        match label.into() {
            Target::Addr(_) => panic!("codegen: branch target must be a label"),
            Target::Label(name) => {
                let at = self.bytes.len();
                self.patches.push((at, Patch::Rel8, name));
                self.byte(0);
            }
        }
    }

    /// `JMP (addr)` — 6502 indirect jump. `ptr_addr` is a literal address
    /// (the cell holding the real target), never itself a label.
    pub fn jmp_indirect(&mut self, ptr_addr: u16) {
        self.byte(opcode_byte(Mnemonic::JMP, AddressingMode::Indirect));
        self.u16le(ptr_addr);
    }

    /// Emits a raw data byte into the instruction stream (a literal table,
    /// not an instruction) — for small lookup tables indexed with
    /// `absolute_x`/`absolute_y`.
    pub fn raw_byte(&mut self, b: u8) {
        self.byte(b);
    }

    /// `LDA #<label` / `LDA #>label` — loads the low or high byte of a
    /// not-yet-resolved label's address, for building up a pointer into
    /// another zero-page cell one byte at a time.
    pub fn immediate_label_lo(&mut self, m: Mnemonic, label: impl Into<Target>) {
        self.immediate_label(m, label, Patch::Lo8);
    }

    pub fn immediate_label_hi(&mut self, m: Mnemonic, label: impl Into<Target>) {
        self.immediate_label(m, label, Patch::Hi8);
    }

    fn immediate_label(&mut self, m: Mnemonic, label: impl Into<Target>, kind: Patch) {
        self.byte(opcode_byte(m, AddressingMode::Immediate));
        match label.into() {
            Target::Addr(a) => self.byte(match kind {
                Patch::Lo8 => (a & 0xff) as u8,
                Patch::Hi8 => (a >> 8) as u8,
                _ => unreachable!(),
            }),
            Target::Label(name) => {
                let at = self.bytes.len();
                self.patches.push((at, kind, name));
                self.byte(0);
            }
        }
    }

    /// Resolves every label reference and returns the finished machine
    /// code, to be loaded starting at `base`.
    pub fn finish(mut self, base: u16) -> (Vec<u8>, Vec<(u16, u32)>) {
        for (at, kind, label) in &self.patches {
            let target_offset = *self
                .labels
                .get(label)
                .unwrap_or_else(|| panic!("codegen: unresolved label '{}'", label));
            match kind {
                Patch::Abs16 => {
                    let addr = base.wrapping_add(target_offset as u16);
                    self.bytes[*at] = (addr & 0xff) as u8;
                    self.bytes[*at + 1] = (addr >> 8) as u8;
                }
                Patch::Rel8 => {
                    let from = *at as i32 + 1;
                    let rel = target_offset as i32 - from;
                    if !(-128..=127).contains(&rel) {
                        panic!("codegen: branch out of range ({} bytes)", rel);
                    }
                    self.bytes[*at] = rel as i8 as u8;
                }
                Patch::Lo8 => {
                    let addr = base.wrapping_add(target_offset as u16);
                    self.bytes[*at] = (addr & 0xff) as u8;
                }
                Patch::Hi8 => {
                    let addr = base.wrapping_add(target_offset as u16);
                    self.bytes[*at] = (addr >> 8) as u8;
                }
            }
        }
        let line_map = self
            .line_map
            .into_iter()
            .map(|(off, line)| (base.wrapping_add(off as u16), line))
            .collect();
        (self.bytes, line_map)
    }
}

impl Default for Asm {
    fn default() -> Self {
        Self::new()
    }
}

// This file is part of nova64.
// Grounded on spec.md §4.11's controller paragraph in full, register
// layout following dma.rs/fio.rs's offset-table idiom (a `const` per
// field, a single `WINDOW_SIZE` sentinel). The diagnostic byte-stream
// reader is the device-boundary shape spec.md §9 prescribes for the
// compiler specifically: "return a CompileResult... no compiler error
// should ever unwind through the bus or CPU" — here that `CompileResult`
// is reduced to register reads a running program can poll. The
// message-byte cursors use `Cell`, the same trick video.rs's read-
// clearing collision/CHARIN registers use, so that a register read that
// mutates state (advances the cursor) still fits the `Device::read(&self)`
// contract every other device honors.

use std::cell::Cell;

use crate::bus::{Bus, Device};
use crate::compiler::{self, CompileResult};
use crate::cpu::Addressable;
use crate::dma::{le24_byte, set_le24_byte};
use crate::util::Shared;
use crate::xram::Xram;

const SRC_ADDR: u16 = 0; // 3 bytes, LE, into XRAM
const SRC_LEN: u16 = 3; // 2 bytes, LE
const COMMAND: u16 = 5;
const STATUS: u16 = 6;
const CODE_SIZE: u16 = 7; // 2 bytes, LE
const ERROR_COUNT: u16 = 9;
const WARNING_COUNT: u16 = 10;
const ERR_SELECT: u16 = 11;
const ERR_LINE: u16 = 12; // 2 bytes, LE
const ERR_COLUMN: u16 = 14;
const ERR_MESSAGE: u16 = 15;
const WARN_SELECT: u16 = 16;
const WARN_LINE: u16 = 17; // 2 bytes, LE
const WARN_COLUMN: u16 = 19;
const WARN_MESSAGE: u16 = 20;
const WINDOW_SIZE: u16 = 21;

const CMD_COMPILE: u8 = 1;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Status {
    Idle,
    Ok,
    Error,
}

/// Tracks where a diagnostic stream's byte reader is; reselecting the
/// diagnostic (or a fresh compile) resets it to the start of the message.
#[derive(Default, Clone, Copy)]
struct MessageCursor {
    index: u8,
    byte_pos: usize,
}

pub struct CompilerCtrl {
    base: u16,
    xram: Shared<Xram>,
    bus: Shared<Bus>,
    src_addr: u32,
    src_len: u16,
    status: Status,
    result: Option<CompileResult>,
    err_cursor: Cell<MessageCursor>,
    warn_cursor: Cell<MessageCursor>,
}

impl CompilerCtrl {
    pub fn new(base: u16, xram: Shared<Xram>, bus: Shared<Bus>) -> Self {
        Self {
            base,
            xram,
            bus,
            src_addr: 0,
            src_len: 0,
            status: Status::Idle,
            result: None,
            err_cursor: Cell::new(MessageCursor::default()),
            warn_cursor: Cell::new(MessageCursor::default()),
        }
    }

    fn run_compile(&mut self) {
        let mut source = Vec::with_capacity(self.src_len as usize);
        for i in 0..u32::from(self.src_len) {
            source.push(self.xram.borrow().read(self.src_addr.wrapping_add(i)));
        }
        let source = String::from_utf8_lossy(&source).into_owned();

        let result = compiler::compile(&source);
        self.status = if result.success { Status::Ok } else { Status::Error };
        if result.success {
            let mut bus = self.bus.borrow_mut();
            for (i, byte) in result.code.iter().enumerate() {
                bus.write(result.base.wrapping_add(i as u16), *byte);
            }
        }
        self.err_cursor.set(MessageCursor::default());
        self.warn_cursor.set(MessageCursor::default());
        self.result = Some(result);
    }

    /// Advances `cursor` one byte into `diag.message` and returns the
    /// byte read, or `0` once the message (and its implicit terminator)
    /// has been fully drained.
    fn next_message_byte(diags: &[compiler::Diagnostic], cursor: &Cell<MessageCursor>) -> u8 {
        let mut state = cursor.get();
        let byte = diags
            .get(state.index as usize)
            .and_then(|d| d.message.as_bytes().get(state.byte_pos).copied());
        match byte {
            Some(b) => {
                state.byte_pos += 1;
                cursor.set(state);
                b
            }
            None => 0,
        }
    }
}

impl Device for CompilerCtrl {
    fn owns(&self, addr: u16) -> bool {
        addr >= self.base && addr < self.base + WINDOW_SIZE
    }

    fn read(&self, addr: u16) -> u8 {
        let off = addr - self.base;
        let result = self.result.as_ref();
        match off {
            STATUS => match self.status {
                Status::Idle => 0,
                Status::Ok => 1,
                Status::Error => 2,
            },
            _ if off >= CODE_SIZE && off < CODE_SIZE + 2 => {
                let size = result.map(|r| r.code.len() as u16).unwrap_or(0);
                le16_byte(size, off - CODE_SIZE)
            }
            ERROR_COUNT => result.map(|r| r.errors.len().min(255) as u8).unwrap_or(0),
            WARNING_COUNT => result.map(|r| r.warnings.len().min(255) as u8).unwrap_or(0),
            ERR_SELECT => self.err_cursor.get().index,
            _ if off >= ERR_LINE && off < ERR_LINE + 2 => {
                let cursor = self.err_cursor.get();
                let line = result
                    .and_then(|r| r.errors.get(cursor.index as usize))
                    .map(|d| d.line as u16)
                    .unwrap_or(0);
                le16_byte(line, off - ERR_LINE)
            }
            ERR_COLUMN => {
                let cursor = self.err_cursor.get();
                result
                    .and_then(|r| r.errors.get(cursor.index as usize))
                    .map(|d| d.column as u8)
                    .unwrap_or(0)
            }
            ERR_MESSAGE => result.map(|r| Self::next_message_byte(&r.errors, &self.err_cursor)).unwrap_or(0),
            WARN_SELECT => self.warn_cursor.get().index,
            _ if off >= WARN_LINE && off < WARN_LINE + 2 => {
                let cursor = self.warn_cursor.get();
                let line = result
                    .and_then(|r| r.warnings.get(cursor.index as usize))
                    .map(|d| d.line as u16)
                    .unwrap_or(0);
                le16_byte(line, off - WARN_LINE)
            }
            WARN_COLUMN => {
                let cursor = self.warn_cursor.get();
                result
                    .and_then(|r| r.warnings.get(cursor.index as usize))
                    .map(|d| d.column as u8)
                    .unwrap_or(0)
            }
            WARN_MESSAGE => result.map(|r| Self::next_message_byte(&r.warnings, &self.warn_cursor)).unwrap_or(0),
            _ if off >= SRC_ADDR && off < SRC_ADDR + 3 => le24_byte(self.src_addr, off - SRC_ADDR),
            _ if off >= SRC_LEN && off < SRC_LEN + 2 => le16_byte(self.src_len, off - SRC_LEN),
            _ => 0,
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        let off = addr - self.base;
        match off {
            COMMAND => {
                if value == CMD_COMPILE {
                    self.run_compile();
                }
            }
            ERR_SELECT => self.err_cursor.set(MessageCursor { index: value, byte_pos: 0 }),
            WARN_SELECT => self.warn_cursor.set(MessageCursor { index: value, byte_pos: 0 }),
            _ if off >= SRC_ADDR && off < SRC_ADDR + 3 => {
                set_le24_byte(&mut self.src_addr, off - SRC_ADDR, value)
            }
            _ if off >= SRC_LEN && off < SRC_LEN + 2 => set_le16_byte(&mut self.src_len, off - SRC_LEN, value),
            _ => {}
        }
    }
}

fn le16_byte(value: u16, index: u16) -> u8 {
    ((value >> (8 * index)) & 0xff) as u8
}

fn set_le16_byte(value: &mut u16, index: u16, byte: u8) {
    let shift = 8 * index;
    *value = (*value & !(0xffu16 << shift)) | (u16::from(byte) << shift);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xram::Xram;

    fn new_ctrl() -> CompilerCtrl {
        let bus = crate::util::new_shared(Bus::new(vec![0; 0x4000], vec![0; 0x4000]));
        let xram = crate::util::new_shared(Xram::new(4096));
        CompilerCtrl::new(crate::memmap::COMPILER_BASE, xram, bus)
    }

    fn stage_source(ctrl: &CompilerCtrl, src: &str) {
        for (i, byte) in src.bytes().enumerate() {
            ctrl.xram.borrow_mut().write(i as u32, byte);
        }
    }

    #[test]
    fn compiles_source_and_reports_ok_status() {
        let mut ctrl = new_ctrl();
        let src = "byte x; void main() { x = 6 * 7; }";
        stage_source(&ctrl, src);
        ctrl.write(crate::memmap::COMPILER_BASE + SRC_LEN, src.len() as u8);
        ctrl.write(crate::memmap::COMPILER_BASE + COMMAND, CMD_COMPILE);
        assert_eq!(ctrl.read(crate::memmap::COMPILER_BASE + STATUS), 1);
        assert_eq!(ctrl.read(crate::memmap::COMPILER_BASE + ERROR_COUNT), 0);
    }

    #[test]
    fn reports_error_and_exposes_message_bytes() {
        let mut ctrl = new_ctrl();
        let src = "void main() { y = 1; }";
        stage_source(&ctrl, src);
        ctrl.write(crate::memmap::COMPILER_BASE + SRC_LEN, src.len() as u8);
        ctrl.write(crate::memmap::COMPILER_BASE + COMMAND, CMD_COMPILE);
        assert_eq!(ctrl.read(crate::memmap::COMPILER_BASE + STATUS), 2);
        assert!(ctrl.read(crate::memmap::COMPILER_BASE + ERROR_COUNT) > 0);

        ctrl.write(crate::memmap::COMPILER_BASE + ERR_SELECT, 0);
        let mut message = Vec::new();
        loop {
            let b = ctrl.read(crate::memmap::COMPILER_BASE + ERR_MESSAGE);
            if b == 0 {
                break;
            }
            message.push(b);
        }
        assert!(!message.is_empty());
    }
}

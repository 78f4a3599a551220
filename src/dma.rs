// This file is part of nova64.
// Grounded on spec.md §4.5 in full; register-write-then-command-fires
// idiom cross-checked against zinc64-core/src/io/cia.rs's timer
// latch-then-load pattern.

use crate::bus::{Bus, Device};
use crate::cpu::Addressable;
use crate::spacetag::{SpaceTag, VgcMemorySpace};
use crate::util::Shared;
use crate::video::Video;
use crate::xram::Xram;

const SRC_SPACE: u16 = 0;
const DST_SPACE: u16 = 1;
const SRC_ADDR: u16 = 2; // 3 bytes, LE
const DST_ADDR: u16 = 5; // 3 bytes, LE
const LENGTH: u16 = 8; // 3 bytes, LE
const MODE: u16 = 11;
const FILL_VALUE: u16 = 12;
const COMMAND: u16 = 13;
const STATUS: u16 = 14;
const ERROR: u16 = 15;
const COMPLETED: u16 = 16; // 3 bytes, LE
const WINDOW_SIZE: u16 = 19;

const MODE_COPY: u8 = 0;
const MODE_FILL: u8 = 1;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Status {
    Idle,
    Ok,
    Error,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ErrorCode {
    None,
    WriteProtected,
    BadSpace,
    LengthZero,
}

struct Regs {
    src_space: u8,
    dst_space: u8,
    src_addr: u32,
    dst_addr: u32,
    length: u32,
    mode: u8,
    fill_value: u8,
    completed: u32,
}

impl Default for Regs {
    fn default() -> Self {
        Self {
            src_space: 0,
            dst_space: 0,
            src_addr: 0,
            dst_addr: 0,
            length: 0,
            mode: MODE_COPY,
            fill_value: 0,
            completed: 0,
        }
    }
}

pub struct Dma {
    base: u16,
    regs: Regs,
    status: Status,
    error: ErrorCode,
    bus: Shared<Bus>,
    xram: Shared<Xram>,
    video: Shared<Video>,
}

impl Dma {
    pub fn new(base: u16, bus: Shared<Bus>, xram: Shared<Xram>, video: Shared<Video>) -> Self {
        Self {
            base,
            regs: Regs::default(),
            status: Status::Idle,
            error: ErrorCode::None,
            bus,
            xram,
            video,
        }
    }

    fn read_byte(&self, tag: SpaceTag, addr: u32) -> Option<u8> {
        match tag {
            SpaceTag::CpuRam => Some(self.bus.borrow().read(addr as u16)),
            SpaceTag::Xram => Some(self.xram.borrow().read(addr)),
            _ => self.video.borrow().try_read_memory_space(tag, addr),
        }
    }

    /// Returns `Err(())` if the destination byte is write-protected (ROM).
    fn write_byte(&mut self, tag: SpaceTag, addr: u32, value: u8) -> Result<bool, ()> {
        match tag {
            SpaceTag::CpuRam => {
                if self.bus.borrow().is_write_protected(addr as u16) {
                    return Err(());
                }
                self.bus.borrow_mut().write(addr as u16, value);
                Ok(true)
            }
            SpaceTag::Xram => {
                self.xram.borrow_mut().write(addr, value);
                Ok(true)
            }
            _ => Ok(self.video.borrow_mut().try_write_memory_space(tag, addr, value)),
        }
    }

    fn start(&mut self) {
        self.regs.completed = 0;
        let src = SpaceTag::from_byte(self.regs.src_space);
        let dst = SpaceTag::from_byte(self.regs.dst_space);
        let (src, dst) = match (src, dst) {
            (Some(s), Some(d)) => (s, d),
            _ => {
                self.status = Status::Error;
                self.error = ErrorCode::BadSpace;
                return;
            }
        };
        if self.regs.length == 0 {
            self.status = Status::Error;
            self.error = ErrorCode::LengthZero;
            return;
        }

        // Pre-check write-protection before writing any byte (spec §4.5:
        // "cause an abort before any byte is written").
        if dst == SpaceTag::CpuRam {
            for i in 0..self.regs.length {
                let addr = self.regs.dst_addr.wrapping_add(i) as u16;
                if self.bus.borrow().is_write_protected(addr) {
                    self.status = Status::Error;
                    self.error = ErrorCode::WriteProtected;
                    return;
                }
            }
        }

        for i in 0..self.regs.length {
            let value = if self.regs.mode == MODE_FILL {
                self.regs.fill_value
            } else {
                self.read_byte(src, self.regs.src_addr.wrapping_add(i)).unwrap_or(0)
            };
            let dst_addr = self.regs.dst_addr.wrapping_add(i);
            match self.write_byte(dst, dst_addr, value) {
                Ok(true) => self.regs.completed += 1,
                Ok(false) | Err(()) => {}
            }
        }
        self.status = Status::Ok;
        self.error = ErrorCode::None;
    }
}

impl Device for Dma {
    fn owns(&self, addr: u16) -> bool {
        addr >= self.base && addr < self.base + WINDOW_SIZE
    }

    fn read(&self, addr: u16) -> u8 {
        let off = addr - self.base;
        match off {
            SRC_SPACE => self.regs.src_space,
            DST_SPACE => self.regs.dst_space,
            STATUS => match self.status {
                Status::Idle => 0,
                Status::Ok => 1,
                Status::Error => 2,
            },
            ERROR => match self.error {
                ErrorCode::None => 0,
                ErrorCode::WriteProtected => 1,
                ErrorCode::BadSpace => 2,
                ErrorCode::LengthZero => 3,
            },
            _ if off >= COMPLETED && off < COMPLETED + 3 => {
                le24_byte(self.regs.completed, off - COMPLETED)
            }
            _ => 0,
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        let off = addr - self.base;
        match off {
            SRC_SPACE => self.regs.src_space = value,
            DST_SPACE => self.regs.dst_space = value,
            MODE => self.regs.mode = value,
            FILL_VALUE => self.regs.fill_value = value,
            COMMAND => self.start(),
            _ if off >= SRC_ADDR && off < SRC_ADDR + 3 => {
                set_le24_byte(&mut self.regs.src_addr, off - SRC_ADDR, value)
            }
            _ if off >= DST_ADDR && off < DST_ADDR + 3 => {
                set_le24_byte(&mut self.regs.dst_addr, off - DST_ADDR, value)
            }
            _ if off >= LENGTH && off < LENGTH + 3 => {
                set_le24_byte(&mut self.regs.length, off - LENGTH, value)
            }
            _ => {}
        }
    }
}

pub(crate) fn le24_byte(value: u32, index: u16) -> u8 {
    ((value >> (8 * index)) & 0xff) as u8
}

pub(crate) fn set_le24_byte(value: &mut u32, index: u16, byte: u8) {
    let shift = 8 * index;
    *value = (*value & !(0xffu32 << shift)) | (u32::from(byte) << shift);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::new_shared;
    use crate::util::IrqLine;

    #[test]
    fn copy_from_cpu_ram_to_vgc_char() {
        let bus = new_shared(Bus::new(vec![0; 0x4000], vec![0; 0x4000]));
        bus.borrow_mut().write(0x0400, b'N');
        bus.borrow_mut().write(0x0401, b'O');
        bus.borrow_mut().write(0x0402, b'V');
        let xram = new_shared(Xram::new(1024));
        let video = new_shared(Video::new(crate::memmap::VGC_BASE, new_shared(IrqLine::new("vgc"))));
        let mut dma = Dma::new(crate::memmap::DMA_BASE, bus, xram, video.clone());

        dma.write(crate::memmap::DMA_BASE + SRC_SPACE, 0);
        dma.write(crate::memmap::DMA_BASE + DST_SPACE, 2);
        dma.write(crate::memmap::DMA_BASE + SRC_ADDR, 0x00);
        dma.write(crate::memmap::DMA_BASE + SRC_ADDR + 1, 0x04);
        dma.write(crate::memmap::DMA_BASE + DST_ADDR, 100);
        dma.write(crate::memmap::DMA_BASE + LENGTH, 3);
        dma.write(crate::memmap::DMA_BASE + COMMAND, 1);

        assert_eq!(dma.read(crate::memmap::DMA_BASE + STATUS), 1);
        assert_eq!(video.borrow().char_ram()[100], b'N');
        assert_eq!(video.borrow().char_ram()[101], b'O');
        assert_eq!(video.borrow().char_ram()[102], b'V');
    }
}

// This file is part of nova64.
// Grounded on spec.md §4.6; shares the DMA engine's space-tag/overlap
// plumbing (src/dma.rs) generalized to 2D rectangular transfers.

use crate::bus::{Bus, Device};
use crate::cpu::Addressable;
use crate::dma::{le24_byte, set_le24_byte};
use crate::spacetag::{SpaceTag, VgcMemorySpace};
use crate::util::Shared;
use crate::video::Video;
use crate::xram::Xram;

const SRC_SPACE: u16 = 0;
const DST_SPACE: u16 = 1;
const SRC_ADDR: u16 = 2; // 3 bytes LE
const DST_ADDR: u16 = 5; // 3 bytes LE
const WIDTH: u16 = 8; // 2 bytes LE
const HEIGHT: u16 = 10; // 2 bytes LE
const SRC_STRIDE: u16 = 12; // 2 bytes LE
const DST_STRIDE: u16 = 14; // 2 bytes LE
const MODE: u16 = 16;
const FILL_VALUE: u16 = 17;
const COLOR_KEY: u16 = 18;
const COMMAND: u16 = 19;
const STATUS: u16 = 20;
const ERROR: u16 = 21;
const COMPLETED: u16 = 22; // 3 bytes LE
const WINDOW_SIZE: u16 = 25;

const MODE_COPY: u8 = 0;
const MODE_FILL: u8 = 1;
const MODE_COLOR_KEY: u8 = 2;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Status {
    Idle,
    Ok,
    Error,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum ErrorCode {
    None,
    WriteProtected,
    BadSpace,
    LengthZero,
}

#[derive(Default)]
struct Regs {
    src_space: u8,
    dst_space: u8,
    src_addr: u32,
    dst_addr: u32,
    width: u16,
    height: u16,
    src_stride: u16,
    dst_stride: u16,
    mode: u8,
    fill_value: u8,
    color_key: u8,
    completed: u32,
}

pub struct Blitter {
    base: u16,
    regs: Regs,
    status: Status,
    error: ErrorCode,
    bus: Shared<Bus>,
    xram: Shared<Xram>,
    video: Shared<Video>,
}

impl Blitter {
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

    fn write_byte(&mut self, tag: SpaceTag, addr: u32, value: u8) -> bool {
        match tag {
            SpaceTag::CpuRam => {
                self.bus.borrow_mut().write(addr as u16, value);
                true
            }
            SpaceTag::Xram => {
                self.xram.borrow_mut().write(addr, value);
                true
            }
            _ => self.video.borrow_mut().try_write_memory_space(tag, addr, value),
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
        if self.regs.width == 0 || self.regs.height == 0 {
            self.status = Status::Error;
            self.error = ErrorCode::LengthZero;
            return;
        }

        if dst == SpaceTag::CpuRam {
            for row in 0..self.regs.height {
                for col in 0..self.regs.width {
                    let addr = self.dst_offset(row, col) as u16;
                    if self.bus.borrow().is_write_protected(addr) {
                        self.status = Status::Error;
                        self.error = ErrorCode::WriteProtected;
                        return;
                    }
                }
            }
        }

        // Source-stable staging: when source and destination are the same
        // space and ranges may overlap, read every source row fully into
        // a scratch buffer before any destination write touches it.
        let same_space = src == dst;
        for row in 0..self.regs.height {
            let mut staged_row = Vec::with_capacity(self.regs.width as usize);
            if same_space || self.regs.mode != MODE_FILL {
                for col in 0..self.regs.width {
                    let value = if self.regs.mode == MODE_FILL {
                        self.regs.fill_value
                    } else {
                        self.read_byte(src, self.src_offset(row, col)).unwrap_or(0)
                    };
                    staged_row.push(value);
                }
            }
            for col in 0..self.regs.width {
                let value = if self.regs.mode == MODE_FILL {
                    self.regs.fill_value
                } else {
                    staged_row[col as usize]
                };
                if self.regs.mode == MODE_COLOR_KEY && value == self.regs.color_key {
                    continue;
                }
                let dst_addr = self.dst_offset(row, col);
                if self.write_byte(dst, dst_addr, value) {
                    self.regs.completed += 1;
                }
            }
        }
        self.status = Status::Ok;
        self.error = ErrorCode::None;
    }

    fn src_offset(&self, row: u16, col: u16) -> u32 {
        self.regs.src_addr + u32::from(row) * u32::from(self.regs.src_stride) + u32::from(col)
    }

    fn dst_offset(&self, row: u16, col: u16) -> u32 {
        self.regs.dst_addr + u32::from(row) * u32::from(self.regs.dst_stride) + u32::from(col)
    }
}

impl Device for Blitter {
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
            WIDTH => self.regs.width as u8,
            WIDTH_HI if off == WIDTH + 1 => (self.regs.width >> 8) as u8,
            _ if off >= COMPLETED && off < COMPLETED + 3 => le24_byte(self.regs.completed, off - COMPLETED),
            _ => 0,
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        let off = addr - self.base;
        match off {
            SRC_SPACE => self.regs.src_space = value,
            DST_SPACE => self.regs.dst_space = value,
            WIDTH => self.regs.width = (self.regs.width & 0xff00) | u16::from(value),
            _ if off == WIDTH + 1 => self.regs.width = (self.regs.width & 0x00ff) | (u16::from(value) << 8),
            HEIGHT => self.regs.height = (self.regs.height & 0xff00) | u16::from(value),
            _ if off == HEIGHT + 1 => self.regs.height = (self.regs.height & 0x00ff) | (u16::from(value) << 8),
            SRC_STRIDE => self.regs.src_stride = (self.regs.src_stride & 0xff00) | u16::from(value),
            _ if off == SRC_STRIDE + 1 => self.regs.src_stride = (self.regs.src_stride & 0x00ff) | (u16::from(value) << 8),
            DST_STRIDE => self.regs.dst_stride = (self.regs.dst_stride & 0xff00) | u16::from(value),
            _ if off == DST_STRIDE + 1 => self.regs.dst_stride = (self.regs.dst_stride & 0x00ff) | (u16::from(value) << 8),
            MODE => self.regs.mode = value,
            FILL_VALUE => self.regs.fill_value = value,
            COLOR_KEY => self.regs.color_key = value,
            COMMAND => self.start(),
            _ if off >= SRC_ADDR && off < SRC_ADDR + 3 => set_le24_byte(&mut self.regs.src_addr, off - SRC_ADDR, value),
            _ if off >= DST_ADDR && off < DST_ADDR + 3 => set_le24_byte(&mut self.regs.dst_addr, off - DST_ADDR, value),
            _ => {}
        }
    }
}

#[allow(non_upper_case_globals)]
const WIDTH_HI: u16 = WIDTH + 1;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::new_shared;
    use crate::util::IrqLine;

    #[test]
    fn fill_rectangle_in_color_ram() {
        let bus = new_shared(Bus::new(vec![0; 0x4000], vec![0; 0x4000]));
        let xram = new_shared(Xram::new(1024));
        let video = new_shared(Video::new(crate::memmap::VGC_BASE, new_shared(IrqLine::new("vgc"))));
        let mut blit = Blitter::new(crate::memmap::BLITTER_BASE, bus, xram, video.clone());

        blit.write(crate::memmap::BLITTER_BASE + SRC_SPACE, 3);
        blit.write(crate::memmap::BLITTER_BASE + DST_SPACE, 3);
        blit.write(crate::memmap::BLITTER_BASE + DST_ADDR, 32);
        blit.write(crate::memmap::BLITTER_BASE + WIDTH, 5);
        blit.write(crate::memmap::BLITTER_BASE + HEIGHT, 4);
        blit.write(crate::memmap::BLITTER_BASE + DST_STRIDE, 5);
        blit.write(crate::memmap::BLITTER_BASE + MODE, MODE_FILL);
        blit.write(crate::memmap::BLITTER_BASE + FILL_VALUE, 0x0c);
        blit.write(crate::memmap::BLITTER_BASE + COMMAND, 1);

        assert_eq!(blit.read(crate::memmap::BLITTER_BASE + COMPLETED), 20);
        for row in 0..4u16 {
            for col in 0..5u16 {
                let addr = 32 + row * 5 + col;
                assert_eq!(video.borrow().color_ram()[addr as usize], 0x0c);
            }
        }
    }
}

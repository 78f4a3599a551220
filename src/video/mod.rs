// This file is part of nova64.
// Grounded on zinc64-core/src/video/mux_unit.rs (register-file + raster
// line tracking idiom, generalized here from VIC-II's character/sprite
// model to this machine's VGC) and spec.md §4.4 in full.

mod sprite;

pub use self::sprite::{Priority, Sprite};

use std::cell::Cell;

use crate::config::{GFX_HEIGHT, GFX_WIDTH, MAX_SPRITES, SPRITE_HEIGHT, SPRITE_SHAPE_AREA, SPRITE_SHAPE_SIZE, SPRITE_WIDTH, TEXT_CELLS, TEXT_COLS, TEXT_ROWS};
use crate::bus::Device;
use crate::memmap;
use crate::spacetag::{SpaceTag, VgcMemorySpace};
use crate::util::IrqLine;
use crate::util::Shared;

pub const COMMAND_OFFSET: u16 = 0;
const P_BASE: u16 = 1;
const CHAR_OUT: u16 = 11;
const CHAR_IN: u16 = 12;
const COLLISION_SS_LO: u16 = 13;
const COLLISION_SS_HI: u16 = 14;
const COLLISION_SB_LO: u16 = 15;
const COLLISION_SB_HI: u16 = 16;
const BORDER_COLOR: u16 = 17;
const CURSOR_CTRL: u16 = 18;
const CURSOR_X: u16 = 19;
const CURSOR_Y: u16 = 20;
const SCROLL_X: u16 = 21;
const SCROLL_Y: u16 = 22;
const FG_COLOR: u16 = 23;
const BG_COLOR: u16 = 24;
const DRAW_COLOR_VALUE: u16 = 25;
const DRAW_COLOR_VALID: u16 = 26;
const RASTER_IRQ_ENABLE: u16 = 27;
const RASTER_IRQ_LINE: u16 = 28;
const SPRITE_ENABLE_LOW: u16 = 29;
const SPRITE_ENABLE_HIGH: u16 = 30;
const SPRITE_COUNT: u16 = 31;
const PALETTE_BASE: u16 = 32;
const PALETTE_LEN: u16 = 16;
const SPRITE_REGS_BASE: u16 = PALETTE_BASE + PALETTE_LEN; // 48
const SPRITE_REG_STRIDE: u16 = 6;

pub const CHAR_RAM_OFFSET: u16 = 256;
pub const COLOR_RAM_OFFSET: u16 = CHAR_RAM_OFFSET + TEXT_CELLS as u16;
const WINDOW_SIZE: u16 = COLOR_RAM_OFFSET + TEXT_CELLS as u16;

const CYCLES_PER_LINE: u32 = 63;
const TOTAL_SCANLINES: u16 = (GFX_HEIGHT + 62) as u16;

const IRQ_SOURCE: usize = 0;

/// Command register opcodes.
mod cmd {
    pub const GCOLOR: u8 = 1;
    pub const PLOT: u8 = 2;
    pub const UNPLOT: u8 = 3;
    pub const LINE: u8 = 4;
    pub const RECT: u8 = 5;
    pub const FILL: u8 = 6;
    pub const CIRCLE: u8 = 7;
    pub const SDEF: u8 = 8;
    pub const SROW: u8 = 9;
    pub const SCLR: u8 = 10;
    pub const SCOPY: u8 = 11;
    pub const SPOS: u8 = 12;
    pub const SENA: u8 = 13;
    pub const SDIS: u8 = 14;
    pub const SFLIP: u8 = 15;
    pub const SPRI: u8 = 16;
}

pub struct Video {
    base: u16,
    params: [u8; 10],
    char_ram: Vec<u8>,
    color_ram: Vec<u8>,
    gfx: Vec<u8>,
    frame: Vec<u8>,
    sprite_shapes: Vec<u8>,
    sprites: Vec<Sprite>,
    palette: [u8; 16],
    border_color: u8,
    cursor_enabled: bool,
    cursor_x: u8,
    cursor_y: u8,
    scroll_x: u8,
    scroll_y: u8,
    fg_color: u8,
    bg_color: u8,
    draw_color: Option<u8>,
    raster_irq_enable: bool,
    raster_irq_line: u8,
    char_in: Cell<u8>,
    collision_ss_lo: Cell<u8>,
    collision_ss_hi: Cell<u8>,
    collision_sb_lo: Cell<u8>,
    collision_sb_hi: Cell<u8>,
    scanline: u16,
    line_accum: u32,
    irq_line: Shared<IrqLine>,
}

impl Video {
    pub fn new(base: u16, irq_line: Shared<IrqLine>) -> Self {
        Self {
            base,
            params: [0; 10],
            char_ram: vec![b' '; TEXT_CELLS],
            color_ram: vec![0; TEXT_CELLS],
            gfx: vec![0; (GFX_WIDTH * GFX_HEIGHT + 1) / 2],
            frame: vec![0; GFX_WIDTH * GFX_HEIGHT],
            sprite_shapes: vec![0; SPRITE_SHAPE_AREA],
            sprites: vec![Sprite::default(); MAX_SPRITES],
            palette: [0; 16],
            border_color: 0,
            cursor_enabled: false,
            cursor_x: 0,
            cursor_y: 0,
            scroll_x: 0,
            scroll_y: 0,
            fg_color: 1,
            bg_color: 0,
            draw_color: None,
            raster_irq_enable: false,
            raster_irq_line: 0,
            char_in: Cell::new(0),
            collision_ss_lo: Cell::new(0),
            collision_ss_hi: Cell::new(0),
            collision_sb_lo: Cell::new(0),
            collision_sb_hi: Cell::new(0),
            scanline: 0,
            line_accum: 0,
            irq_line,
        }
    }

    pub fn frame_buffer(&self) -> &[u8] {
        &self.frame
    }

    pub fn char_ram(&self) -> &[u8] {
        &self.char_ram
    }

    pub fn color_ram(&self) -> &[u8] {
        &self.color_ram
    }

    /// Feeds a byte into the character-input register, as if the keyboard
    /// handler had typed it. Clears on the CPU's next read.
    pub fn feed_char_in(&mut self, byte: u8) {
        self.char_in.set(byte);
    }

    fn effective_draw_color(&self) -> u8 {
        self.draw_color.unwrap_or(self.fg_color)
    }

    // -- character output state machine (spec §4.4) --

    fn scroll_up(&mut self) {
        let row_len = TEXT_COLS;
        self.char_ram.copy_within(row_len.., 0);
        self.color_ram.copy_within(row_len.., 0);
        let last = TEXT_CELLS - row_len;
        for i in 0..row_len {
            self.char_ram[last + i] = b' ';
            self.color_ram[last + i] = self.fg_color;
        }
    }

    fn advance_cursor(&mut self) {
        self.cursor_x += 1;
        if self.cursor_x as usize >= TEXT_COLS {
            self.cursor_x = 0;
            self.newline();
        }
    }

    fn newline(&mut self) {
        self.cursor_y += 1;
        if self.cursor_y as usize >= TEXT_ROWS {
            self.scroll_up();
            self.cursor_y = (TEXT_ROWS - 1) as u8;
        }
    }

    fn cell_index(&self, x: u8, y: u8) -> usize {
        y as usize * TEXT_COLS + x as usize
    }

    fn char_out(&mut self, byte: u8) {
        match byte {
            0x08 => {
                if self.cursor_x > 0 {
                    self.cursor_x -= 1;
                    let idx = self.cell_index(self.cursor_x, self.cursor_y);
                    self.char_ram[idx] = b' ';
                }
            }
            0x09 => {
                for _ in 0..(8 - (self.cursor_x % 8)) {
                    self.advance_cursor();
                }
            }
            0x0a => self.newline(),
            0x0c => {
                for c in self.char_ram.iter_mut() {
                    *c = b' ';
                }
                for c in self.color_ram.iter_mut() {
                    *c = self.fg_color;
                }
                self.cursor_x = 0;
                self.cursor_y = 0;
            }
            0x0d => {
                self.cursor_x = 0;
                self.newline();
            }
            0x13 => {
                self.cursor_x = 0;
                self.cursor_y = 0;
            }
            printable => {
                let idx = self.cell_index(self.cursor_x, self.cursor_y);
                self.char_ram[idx] = printable;
                self.color_ram[idx] = self.fg_color;
                self.advance_cursor();
            }
        }
    }

    // -- graphics plane --

    fn gfx_index(x: i32, y: i32) -> Option<(usize, bool)> {
        if x < 0 || y < 0 || x as usize >= GFX_WIDTH || y as usize >= GFX_HEIGHT {
            return None;
        }
        let idx = y as usize * GFX_WIDTH + x as usize;
        Some((idx / 2, idx % 2 == 0))
    }

    fn plot(&mut self, x: i32, y: i32, color: u8) {
        if let Some((byte_idx, high)) = Self::gfx_index(x, y) {
            let byte = &mut self.gfx[byte_idx];
            if high {
                *byte = (*byte & 0x0f) | (color << 4);
            } else {
                *byte = (*byte & 0xf0) | (color & 0x0f);
            }
        }
    }

    fn line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: u8) {
        let (mut x, mut y) = (x1, y1);
        let dx = (x2 - x1).abs();
        let dy = -(y2 - y1).abs();
        let sx = if x1 < x2 { 1 } else { -1 };
        let sy = if y1 < y2 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.plot(x, y, color);
            if x == x2 && y == y2 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: u8, filled: bool) {
        if filled {
            for row in y..y + h {
                for col in x..x + w {
                    self.plot(col, row, color);
                }
            }
        } else {
            self.line(x, y, x + w - 1, y, color);
            self.line(x, y + h - 1, x + w - 1, y + h - 1, color);
            self.line(x, y, x, y + h - 1, color);
            self.line(x + w - 1, y, x + w - 1, y + h - 1, color);
        }
    }

    fn circle(&mut self, cx: i32, cy: i32, radius: i32, color: u8) {
        let mut x = radius;
        let mut y = 0;
        let mut err = 1 - radius;
        while x >= y {
            for (px, py) in [
                (cx + x, cy + y),
                (cx + y, cy + x),
                (cx - y, cy + x),
                (cx - x, cy + y),
                (cx - x, cy - y),
                (cx - y, cy - x),
                (cx + y, cy - x),
                (cx + x, cy - y),
            ] {
                self.plot(px, py, color);
            }
            y += 1;
            if err < 0 {
                err += 2 * y + 1;
            } else {
                x -= 1;
                err += 2 * (y - x) + 1;
            }
        }
    }

    // -- sprites --

    fn sprite_shape_pixel(&self, shape_index: u8, row: usize, col: usize) -> u8 {
        let base = shape_index as usize * SPRITE_SHAPE_SIZE;
        let byte = self.sprite_shapes[base + row * (SPRITE_WIDTH / 2) + col / 2];
        if col % 2 == 0 {
            (byte >> 4) & 0x0f
        } else {
            byte & 0x0f
        }
    }

    fn set_sprite_shape_pixel(&mut self, shape_index: u8, row: usize, col: usize, value: u8) {
        let base = shape_index as usize * SPRITE_SHAPE_SIZE;
        let byte = &mut self.sprite_shapes[base + row * (SPRITE_WIDTH / 2) + col / 2];
        if col % 2 == 0 {
            *byte = (*byte & 0x0f) | (value << 4);
        } else {
            *byte = (*byte & 0xf0) | (value & 0x0f);
        }
    }

    /// Composites one scanline's worth of sprites over the graphics plane
    /// into the frame buffer, and updates collision registers. Per
    /// spec §4.4: iterate enabled sprites in reverse index order so sprite
    /// 0 wins priority ties.
    fn rasterize_line(&mut self, y: u16) {
        if y as usize >= GFX_HEIGHT {
            return;
        }
        let mut behind: Vec<Option<u8>> = vec![None; GFX_WIDTH];
        let mut between: Vec<Option<u8>> = vec![None; GFX_WIDTH];
        let mut infront: Vec<Option<u8>> = vec![None; GFX_WIDTH];
        let mut contributors: Vec<u16> = vec![0; GFX_WIDTH];

        for index in (0..self.sprites.len()).rev() {
            let sprite = self.sprites[index].clone();
            if !sprite.enabled {
                continue;
            }
            let sy = sprite.y as i32;
            let dy = y as i32 - sy;
            if dy < 0 || dy >= SPRITE_HEIGHT as i32 {
                continue;
            }
            let row = if sprite.y_flip {
                SPRITE_HEIGHT - 1 - dy as usize
            } else {
                dy as usize
            };
            for col in 0..SPRITE_WIDTH {
                let src_col = if sprite.x_flip { SPRITE_WIDTH - 1 - col } else { col };
                let pixel = self.sprite_shape_pixel(sprite.shape_index, row, src_col);
                if pixel == sprite.color_key {
                    continue;
                }
                let screen_x = sprite.x as i32 + col as i32;
                if screen_x < 0 || screen_x as usize >= GFX_WIDTH {
                    continue;
                }
                let sx = screen_x as usize;
                contributors[sx] |= 1 << index;
                let layer = match sprite.priority {
                    Priority::BehindAll => &mut behind,
                    Priority::Between => &mut between,
                    Priority::InFront => &mut infront,
                };
                layer[sx] = Some(pixel);
            }
        }

        // Collision detection: two or more contributors on a pixel.
        let mut ss_bits: u16 = 0;
        let mut sb_bits: u16 = 0;
        for x in 0..GFX_WIDTH {
            let mask = contributors[x];
            if mask.count_ones() >= 2 {
                ss_bits |= mask;
            }
            let gfx_pixel = {
                let (byte_idx, high) = Self::gfx_index(x as i32, y as i32).unwrap();
                let byte = self.gfx[byte_idx];
                if high {
                    byte >> 4
                } else {
                    byte & 0x0f
                }
            };
            if gfx_pixel != 0 && mask != 0 {
                sb_bits |= mask;
            }
        }
        if ss_bits != 0 {
            self.collision_ss_lo.set(self.collision_ss_lo.get() | ss_bits as u8);
            self.collision_ss_hi.set(self.collision_ss_hi.get() | (ss_bits >> 8) as u8);
        }
        if sb_bits != 0 {
            self.collision_sb_lo.set(self.collision_sb_lo.get() | sb_bits as u8);
            self.collision_sb_hi.set(self.collision_sb_hi.get() | (sb_bits >> 8) as u8);
        }

        // Compositing: background, behind, graphics, between, in-front.
        for x in 0..GFX_WIDTH {
            let (byte_idx, high) = Self::gfx_index(x as i32, y as i32).unwrap();
            let byte = self.gfx[byte_idx];
            let gfx_pixel = if high { byte >> 4 } else { byte & 0x0f };
            let mut pixel = self.bg_color & 0x0f;
            if let Some(p) = behind[x] {
                pixel = p;
            }
            if gfx_pixel != 0 {
                pixel = gfx_pixel;
            }
            if let Some(p) = between[x] {
                pixel = p;
            }
            if let Some(p) = infront[x] {
                pixel = p;
            }
            self.frame[y as usize * GFX_WIDTH + x] = pixel;
        }
    }

    pub fn advance_cycles(&mut self, cycles: u8) {
        self.line_accum += u32::from(cycles);
        while self.line_accum >= CYCLES_PER_LINE {
            self.line_accum -= CYCLES_PER_LINE;
            self.rasterize_line(self.scanline);
            self.scanline = (self.scanline + 1) % TOTAL_SCANLINES;
            let entering_vblank = self.scanline as usize == GFX_HEIGHT;
            let raster_match = self.scanline == u16::from(self.raster_irq_line);
            if self.raster_irq_enable && (entering_vblank || raster_match) {
                self.irq_line.borrow_mut().set_low(IRQ_SOURCE, true);
            }
        }
    }

    pub fn clear_raster_irq(&mut self) {
        self.irq_line.borrow_mut().set_low(IRQ_SOURCE, false);
    }

    pub fn raster_irq_enable(&self) -> bool {
        self.raster_irq_enable
    }

    pub fn set_raster_irq_enable(&mut self, enable: bool) {
        self.raster_irq_enable = enable;
    }

    fn param_word(&self, at: usize) -> i32 {
        i32::from(self.params[at]) | (i32::from(self.params[at + 1]) << 8)
    }

    fn execute_command(&mut self, opcode: u8) {
        match opcode {
            cmd::GCOLOR => self.draw_color = Some(self.params[0]),
            cmd::PLOT => {
                let (x, y) = (self.param_word(0), self.param_word(2));
                let color = self.effective_draw_color();
                self.plot(x, y, color);
            }
            cmd::UNPLOT => {
                let (x, y) = (self.param_word(0), self.param_word(2));
                self.plot(x, y, 0);
            }
            cmd::LINE => {
                let (x1, y1, x2, y2) = (self.param_word(0), self.param_word(2), self.param_word(4), self.param_word(6));
                let color = self.effective_draw_color();
                self.line(x1, y1, x2, y2, color);
            }
            cmd::RECT => {
                let (x, y, w, h) = (self.param_word(0), self.param_word(2), self.param_word(4), self.param_word(6));
                let color = self.effective_draw_color();
                self.rect(x, y, w, h, color, false);
            }
            cmd::FILL => {
                let (x, y, w, h) = (self.param_word(0), self.param_word(2), self.param_word(4), self.param_word(6));
                let color = self.effective_draw_color();
                self.rect(x, y, w, h, color, true);
            }
            cmd::CIRCLE => {
                let (cx, cy, r) = (self.param_word(0), self.param_word(2), self.param_word(4));
                let color = self.effective_draw_color();
                self.circle(cx, cy, r, color);
            }
            cmd::SDEF => {
                let sprite = self.params[0];
                let (x, y, color) = (self.params[1] as usize, self.params[2] as usize, self.params[3]);
                if x < SPRITE_WIDTH && y < SPRITE_HEIGHT {
                    self.set_sprite_shape_pixel(sprite, y, x, color);
                }
            }
            cmd::SROW => {
                let sprite = self.params[0];
                let row = self.params[1] as usize;
                if row < SPRITE_HEIGHT {
                    let base = sprite as usize * SPRITE_SHAPE_SIZE + row * (SPRITE_WIDTH / 2);
                    for i in 0..(SPRITE_WIDTH / 2) {
                        self.sprite_shapes[base + i] = self.params[2 + i];
                    }
                }
            }
            cmd::SCLR => {
                let sprite = self.params[0] as usize;
                let base = sprite * SPRITE_SHAPE_SIZE;
                for b in &mut self.sprite_shapes[base..base + SPRITE_SHAPE_SIZE] {
                    *b = 0;
                }
            }
            cmd::SCOPY => {
                let (src, dst) = (self.params[0] as usize, self.params[1] as usize);
                let (src_base, dst_base) = (src * SPRITE_SHAPE_SIZE, dst * SPRITE_SHAPE_SIZE);
                let data: Vec<u8> = self.sprite_shapes[src_base..src_base + SPRITE_SHAPE_SIZE].to_vec();
                self.sprite_shapes[dst_base..dst_base + SPRITE_SHAPE_SIZE].copy_from_slice(&data);
            }
            cmd::SPOS => {
                let sprite = self.params[0] as usize;
                if let Some(s) = self.sprites.get_mut(sprite) {
                    s.x = u16::from(self.params[1]) | (u16::from(self.params[2] & 0x01) << 8);
                    s.y = self.params[3];
                }
            }
            cmd::SENA => {
                if let Some(s) = self.sprites.get_mut(self.params[0] as usize) {
                    s.enabled = true;
                }
            }
            cmd::SDIS => {
                if let Some(s) = self.sprites.get_mut(self.params[0] as usize) {
                    s.enabled = false;
                }
            }
            cmd::SFLIP => {
                if let Some(s) = self.sprites.get_mut(self.params[0] as usize) {
                    let flags = self.params[1];
                    s.x_flip = flags & 0x80 != 0;
                    s.y_flip = flags & 0x40 != 0;
                }
            }
            cmd::SPRI => {
                if let Some(s) = self.sprites.get_mut(self.params[0] as usize) {
                    s.priority = Priority::from_byte(self.params[1]);
                }
            }
            _ => {}
        }
    }

    fn sprite_reg_read(&self, index: usize, field: u16) -> u8 {
        let s = &self.sprites[index];
        match field {
            0 => s.x as u8,
            1 => s.x_high_and_flags(),
            2 => s.y,
            3 => s.color_key,
            4 => s.priority.to_byte(),
            5 => s.shape_index,
            _ => 0,
        }
    }

    fn sprite_reg_write(&mut self, index: usize, field: u16, value: u8) {
        let s = &mut self.sprites[index];
        match field {
            0 => s.set_x_low(value),
            1 => s.set_x_high_and_flags(value),
            2 => s.y = value,
            3 => s.color_key = value,
            4 => s.priority = Priority::from_byte(value),
            5 => s.shape_index = value,
            _ => {}
        }
    }
}

impl Device for Video {
    fn owns(&self, addr: u16) -> bool {
        addr >= self.base && addr < self.base + WINDOW_SIZE
    }

    fn read(&self, addr: u16) -> u8 {
        let off = addr - self.base;
        if off >= CHAR_RAM_OFFSET && off < COLOR_RAM_OFFSET {
            return self.char_ram[(off - CHAR_RAM_OFFSET) as usize];
        }
        if off >= COLOR_RAM_OFFSET && off < WINDOW_SIZE {
            return self.color_ram[(off - COLOR_RAM_OFFSET) as usize];
        }
        if off >= P_BASE && off < P_BASE + 10 {
            return self.params[(off - P_BASE) as usize];
        }
        if off >= SPRITE_REGS_BASE && off < SPRITE_REGS_BASE + SPRITE_REG_STRIDE * MAX_SPRITES as u16 {
            let rel = off - SPRITE_REGS_BASE;
            return self.sprite_reg_read((rel / SPRITE_REG_STRIDE) as usize, rel % SPRITE_REG_STRIDE);
        }
        if off >= PALETTE_BASE && off < PALETTE_BASE + PALETTE_LEN {
            return self.palette[(off - PALETTE_BASE) as usize];
        }
        match off {
            CHAR_IN => {
                let v = self.char_in.get();
                self.char_in.set(0);
                v
            }
            COLLISION_SS_LO => {
                let v = self.collision_ss_lo.get();
                self.collision_ss_lo.set(0);
                v
            }
            COLLISION_SS_HI => {
                let v = self.collision_ss_hi.get();
                self.collision_ss_hi.set(0);
                v
            }
            COLLISION_SB_LO => {
                let v = self.collision_sb_lo.get();
                self.collision_sb_lo.set(0);
                v
            }
            COLLISION_SB_HI => {
                let v = self.collision_sb_hi.get();
                self.collision_sb_hi.set(0);
                v
            }
            BORDER_COLOR => self.border_color,
            CURSOR_CTRL => self.cursor_enabled as u8,
            CURSOR_X => self.cursor_x,
            CURSOR_Y => self.cursor_y,
            SCROLL_X => self.scroll_x,
            SCROLL_Y => self.scroll_y,
            FG_COLOR => self.fg_color,
            BG_COLOR => self.bg_color,
            DRAW_COLOR_VALUE => self.draw_color.unwrap_or(0),
            DRAW_COLOR_VALID => self.draw_color.is_some() as u8,
            RASTER_IRQ_ENABLE => self.raster_irq_enable as u8,
            RASTER_IRQ_LINE => self.raster_irq_line,
            SPRITE_ENABLE_LOW => self.sprites.iter().take(8).enumerate().fold(0u8, |acc, (i, s)| acc | ((s.enabled as u8) << i)),
            SPRITE_ENABLE_HIGH => self.sprites.iter().skip(8).enumerate().fold(0u8, |acc, (i, s)| acc | ((s.enabled as u8) << i)),
            SPRITE_COUNT => self.sprites.iter().filter(|s| s.enabled).count() as u8,
            _ => 0,
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        let off = addr - self.base;
        if off >= P_BASE && off < P_BASE + 10 {
            self.params[(off - P_BASE) as usize] = value;
            return;
        }
        if off >= CHAR_RAM_OFFSET && off < COLOR_RAM_OFFSET {
            self.char_ram[(off - CHAR_RAM_OFFSET) as usize] = value;
            return;
        }
        if off >= COLOR_RAM_OFFSET && off < WINDOW_SIZE {
            self.color_ram[(off - COLOR_RAM_OFFSET) as usize] = value;
            return;
        }
        if off >= SPRITE_REGS_BASE && off < SPRITE_REGS_BASE + SPRITE_REG_STRIDE * MAX_SPRITES as u16 {
            let rel = off - SPRITE_REGS_BASE;
            self.sprite_reg_write((rel / SPRITE_REG_STRIDE) as usize, rel % SPRITE_REG_STRIDE, value);
            return;
        }
        if off >= PALETTE_BASE && off < PALETTE_BASE + PALETTE_LEN {
            self.palette[(off - PALETTE_BASE) as usize] = value;
            return;
        }
        match off {
            COMMAND_OFFSET => self.execute_command(value),
            CHAR_OUT => self.char_out(value),
            BORDER_COLOR => self.border_color = value,
            CURSOR_CTRL => self.cursor_enabled = value & 0x01 != 0,
            CURSOR_X => self.cursor_x = value,
            CURSOR_Y => self.cursor_y = value,
            SCROLL_X => self.scroll_x = value,
            SCROLL_Y => self.scroll_y = value,
            FG_COLOR => self.fg_color = value,
            BG_COLOR => self.bg_color = value,
            RASTER_IRQ_ENABLE => self.raster_irq_enable = value & 0x01 != 0,
            RASTER_IRQ_LINE => self.raster_irq_line = value,
            SPRITE_ENABLE_LOW => {
                for i in 0..8 {
                    self.sprites[i].enabled = value & (1 << i) != 0;
                }
            }
            SPRITE_ENABLE_HIGH => {
                for i in 0..8 {
                    self.sprites[8 + i].enabled = value & (1 << i) != 0;
                }
            }
            _ => {}
        }
    }
}

impl VgcMemorySpace for Video {
    fn space_len(&self, tag: SpaceTag) -> Option<usize> {
        match tag {
            SpaceTag::VgcChar => Some(self.char_ram.len()),
            SpaceTag::VgcColor => Some(self.color_ram.len()),
            SpaceTag::VgcGfx => Some(self.gfx.len()),
            SpaceTag::VgcSprite => Some(self.sprite_shapes.len()),
            _ => None,
        }
    }

    fn try_read_memory_space(&self, tag: SpaceTag, addr: u32) -> Option<u8> {
        let addr = addr as usize;
        match tag {
            SpaceTag::VgcChar => self.char_ram.get(addr).copied(),
            SpaceTag::VgcColor => self.color_ram.get(addr).copied(),
            SpaceTag::VgcGfx => self.gfx.get(addr).copied(),
            SpaceTag::VgcSprite => self.sprite_shapes.get(addr).copied(),
            _ => None,
        }
    }

    fn try_write_memory_space(&mut self, tag: SpaceTag, addr: u32, value: u8) -> bool {
        let addr = addr as usize;
        match tag {
            SpaceTag::VgcChar => self.char_ram.get_mut(addr).map(|c| *c = value).is_some(),
            SpaceTag::VgcColor => self.color_ram.get_mut(addr).map(|c| *c = value).is_some(),
            SpaceTag::VgcGfx => self.gfx.get_mut(addr).map(|c| *c = value).is_some(),
            SpaceTag::VgcSprite => self.sprite_shapes.get_mut(addr).map(|c| *c = value).is_some(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::new_shared;

    fn make_video() -> Video {
        Video::new(memmap::VGC_BASE, new_shared(IrqLine::new("vgc")))
    }

    #[test]
    fn char_output_advances_cursor_and_stamps_color() {
        let mut v = make_video();
        v.write(memmap::VGC_BASE + FG_COLOR, 5);
        v.write(memmap::VGC_BASE + CHAR_OUT, b'A');
        assert_eq!(v.char_ram[0], b'A');
        assert_eq!(v.color_ram[0], 5);
        assert_eq!(v.cursor_x, 1);
    }

    #[test]
    fn form_feed_clears_grid_and_homes_cursor() {
        let mut v = make_video();
        v.write(memmap::VGC_BASE + CHAR_OUT, b'X');
        v.write(memmap::VGC_BASE + CHAR_OUT, 0x0c);
        assert_eq!(v.cursor_x, 0);
        assert_eq!(v.cursor_y, 0);
        assert!(v.char_ram.iter().all(|&c| c == b' '));
    }

    #[test]
    fn sprite_collision_latches_and_clears_on_read() {
        let mut v = make_video();
        // place a single opaque pixel at row 0 col 0 for both shapes and
        // enable both sprites at (0, 0).
        for sprite in 0..2u8 {
            v.write(memmap::VGC_BASE + P_BASE, sprite);
            v.write(memmap::VGC_BASE + P_BASE + 1, 0);
            v.write(memmap::VGC_BASE + P_BASE + 2, 0);
            v.write(memmap::VGC_BASE + P_BASE + 3, 1);
            v.write(memmap::VGC_BASE + COMMAND_OFFSET, cmd::SDEF);
            v.write(memmap::VGC_BASE + P_BASE, sprite);
            v.write(memmap::VGC_BASE + COMMAND_OFFSET, cmd::SENA);
        }
        v.rasterize_line(0);
        assert_eq!(v.read(memmap::VGC_BASE + COLLISION_SS_LO), 0b0000_0011);
        assert_eq!(v.read(memmap::VGC_BASE + COLLISION_SS_LO), 0);
    }
}

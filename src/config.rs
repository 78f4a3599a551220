// This file is part of nova64.
// Grounded on zinc64-system/src/config.rs (Config/SystemModel shape).

use std::path::PathBuf;

use crate::cpu::Variant;

pub const TEXT_COLS: usize = 80;
pub const TEXT_ROWS: usize = 25;
pub const TEXT_CELLS: usize = TEXT_COLS * TEXT_ROWS;
pub const GFX_WIDTH: usize = 320;
pub const GFX_HEIGHT: usize = 200;
pub const MAX_SPRITES: usize = 16;
pub const SPRITE_WIDTH: usize = 16;
pub const SPRITE_HEIGHT: usize = 16;
/// 16 rows of 8 bytes (two 4-bit pixels per byte, 16 pixels wide) — see
/// DESIGN.md's Open Question note reconciling this against the narrower
/// figure quoted alongside the informal "16x16" sprite dimension.
pub const SPRITE_SHAPE_SIZE: usize = SPRITE_HEIGHT * (SPRITE_WIDTH / 2);
pub const SPRITE_SHAPE_AREA: usize = SPRITE_SHAPE_SIZE * MAX_SPRITES;
pub const NIC_SLOTS: usize = 4;

#[derive(Clone)]
pub struct MachineConfig {
    pub variant: Variant,
    pub target_cycles_per_second: u64,
    pub max_backlog_cycles: u64,
    pub xram_size: usize,
    pub rom_basic: Vec<u8>,
    pub rom_native: Vec<u8>,
    pub fio_save_dir: PathBuf,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            variant: Variant::Nmos,
            target_cycles_per_second: 2_000_000,
            max_backlog_cycles: 2_000_000 / 10,
            xram_size: 256 * 1024,
            rom_basic: vec![0u8; 16 * 1024],
            rom_native: vec![0u8; 16 * 1024],
            fio_save_dir: PathBuf::from("."),
        }
    }
}

// This file is part of nova64.
// The published address map device windows live at. Grounded on
// zinc64-system/src/c64.rs's device wiring (VIC/SID/CIA base addresses
// passed into each device's constructor) generalized to nova64's device
// set. Programs should prefer the zero-page vector table `bus` installs
// at boot over these constants, but the constants are what the vector
// table itself is built from.

pub const VGC_BASE: u16 = 0x9000;
pub const SID0_BASE: u16 = 0xa100;
pub const SID1_BASE: u16 = 0xa200;
pub const SID1_ALIAS_BASE: u16 = 0xa300;
pub const DMA_BASE: u16 = 0xa400;
pub const BLITTER_BASE: u16 = 0xa500;
pub const TIMER_BASE: u16 = 0xa600;
pub const NIC_BASE: u16 = 0xa700;
pub const FIO_BASE: u16 = 0xa800;
pub const COMPILER_BASE: u16 = 0xa900;
pub const ROM_BASE: u16 = 0xc000;
pub const ROM_SIZE: usize = 0x4000;

/// Offset of the ROM-swap register within the ROM window; the single
/// address in that window whose writes are not silently dropped.
pub const ROM_SWAP_OFFSET: u16 = 0x0000;

/// Zero-page vector table, installed at boot (spec.md §4.2).
pub const VEC_VGC_BASE: u16 = 0x00f0;
pub const VEC_VGC_COMMAND: u16 = 0x00f2;
pub const VEC_CHAR_RAM_BASE: u16 = 0x00f4;
pub const VEC_COLOR_RAM_BASE: u16 = 0x00f6;
pub const VEC_SID_BASE: u16 = 0x00f8;
pub const VEC_FIO_BASE: u16 = 0x00fa;

/// RAM cell the ROM's hardware IRQ handler jumps through indirectly,
/// rather than dispatching straight off the (write-protected) `0xfffe`
/// vector. Lets software — in particular the SID player's trampoline —
/// redirect interrupts without touching ROM. Convention carried over from
/// the 6502 home-computer idiom of an indirect RAM vector ahead of a ROM
/// stub (e.g. the C64's CINV at `$0314`).
pub const IRQ_DISPATCH_VECTOR: u16 = 0x0314;

/// Base address of the SID player's injected trampoline (spec.md §4.7).
pub const SID_TRAMPOLINE_BASE: u16 = 0x03d0;

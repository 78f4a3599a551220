// This file is part of nova64.
// Grounded on spec.md §4.11's runtime ROM paragraph ("a fixed jump table
// of helper routines a compiled program calls into for work the code
// generator doesn't inline") and on the KERNAL-style jump-table convention
// zinc64-system/src/c64.rs's boot sequence assumes ($FFD2 CHROUT etc.):
// a block of `JMP` stubs at fixed addresses, followed by the routine
// bodies themselves, so callers only ever depend on the table's order,
// never on where the bodies happen to live.

use super::asm::Asm;
use crate::cpu::Mnemonic::*;
use crate::memmap;

/// Zero-page cells the code generator and this ROM agree on. Laid out
/// below the boot vector table (`memmap::VEC_VGC_BASE` et al. start at
/// `0x00f0`) so neither region collides with the other.
pub const ZP_DEREF_PTR: u16 = 0x00d0; // 2 bytes, codegen's own indirection scratch
pub const ZP_RUNTIME_SCRATCH: u16 = 0x00d8; // 4 bytes, leaf routines only
pub const ZP_TMP0: u16 = 0x00e0; // 2 bytes
pub const ZP_TMP1: u16 = 0x00e2; // 2 bytes
pub const ZP_SOFT_SP: u16 = 0x00e4; // 2 bytes, pointer into SOFT_STACK_BASE
pub const ZP_ARG_STAGE: u16 = 0x00e6; // 8 bytes, 4 argument slots x 2 bytes
pub const ZP_RET: u16 = 0x00ee; // 2 bytes

/// Page reserved for the compiler's software operand stack (push/pop are
/// inlined by the code generator, not routed through this ROM, so no
/// jump-table slot names them).
pub const SOFT_STACK_BASE: u16 = 0x0200;

/// Where a freshly compiled program's globals and per-function locals are
/// bump-allocated from, and where its code is assembled to. Both sit well
/// below the device windows (`memmap::VGC_BASE` at `0x9000`) and the ROM
/// window (`memmap::ROM_BASE` at `0xc000`).
pub const DATA_BASE: u16 = 0x0400;
pub const CODE_BASE: u16 = 0x1000;

const JUMP_TABLE_LEN: u16 = 21;
const JUMP_TABLE_BYTES: u16 = JUMP_TABLE_LEN * 3;

macro_rules! jump_table_slots {
    ($($name:ident = $index:expr),* $(,)?) => {
        $(pub const $name: u16 = memmap::ROM_BASE + $index * 3;)*
    };
}

jump_table_slots! {
    JT_MUL_BYTE = 0,
    JT_MUL_INT = 1,
    JT_DIV_BYTE = 2,
    JT_DIV_INT = 3,
    JT_MOD_BYTE = 4,
    JT_PRINT = 5,
    JT_PRINT_CHAR = 6,
    JT_GET_KEY = 7,
    JT_WAIT_KEY = 8,
    JT_VSYNC = 9,
    JT_MEMCPY = 10,
    JT_MEMSET = 11,
    JT_GFX_CMD = 12,
    JT_SPRITE_CMD = 13,
    JT_PLAY_SOUND = 14,
    JT_MUSIC_PLAY = 15,
    JT_MUSIC_STOP = 16,
    JT_SET_VOLUME = 17,
    JT_FIXED_MUL = 18,
    JT_FIXED_DIV = 19,
    JT_EDITOR_ENTRY = 20,
}

// Mirrors the private offsets `fio.rs` lays its command register file out
// at; duplicated here because a ROM helper only ever pokes the device
// through its bus window, the same way compiled user code would.
const FIO_SID_SONG: u16 = 44;
const FIO_COMMAND: u16 = 45;
const FIO_CMD_SIDPLAY: u8 = 8;
const FIO_CMD_SIDSTOP: u8 = 9;

// Mirrors the private per-voice register offsets `sound::sid` lays its
// register file out at; duplicated here for the same reason as the FIO
// offsets above.
const SID_FREQ_LO: u16 = 0;
const SID_FREQ_HI: u16 = 1;
const SID_CONTROL: u16 = 4;
const SID_VOICE_STRIDE: u16 = 7;
const SID_MODE_VOLUME: u16 = 24;

const VOICE_OFFSETS: [u8; 3] = [0, SID_VOICE_STRIDE as u8, (SID_VOICE_STRIDE * 2) as u8];

/// Assembles the 16 KiB "native" ROM image: the published jump table,
/// the routine bodies it points into, and the six reset/NMI/IRQ vector
/// bytes at the top of the window.
pub fn build() -> Vec<u8> {
    let mut asm = Asm::new();

    let names = [
        "mul_byte", "mul_int", "div_byte", "div_int", "mod_byte", "print", "print_char", "get_key", "wait_key",
        "vsync", "memcpy", "memset", "gfx_cmd", "sprite_cmd", "play_sound", "music_play", "music_stop", "set_volume",
        "fixed_mul", "fixed_div", "editor_entry",
    ];
    for name in names {
        asm.jmp(format!("{name}_body"));
    }
    debug_assert_eq!(asm.offset() as u16, JUMP_TABLE_BYTES);

    emit_multiply_core(&mut asm);
    emit_divide_core(&mut asm);
    emit_mul_byte(&mut asm);
    emit_mul_int(&mut asm);
    emit_div_byte(&mut asm);
    emit_div_int(&mut asm);
    emit_mod_byte(&mut asm);
    emit_print(&mut asm);
    emit_print_char(&mut asm);
    emit_get_key(&mut asm);
    emit_wait_key(&mut asm);
    emit_vsync(&mut asm);
    emit_memcpy(&mut asm);
    emit_memset(&mut asm);
    emit_vgc_cmd_shared(&mut asm);
    emit_play_sound(&mut asm, &VOICE_OFFSETS);
    emit_music_play(&mut asm);
    emit_music_stop(&mut asm);
    emit_set_volume(&mut asm);
    emit_fixed_mul(&mut asm);
    emit_fixed_div(&mut asm);
    emit_editor_entry(&mut asm);
    emit_reset(&mut asm);
    emit_irq_stub(&mut asm);
    emit_nmi_stub(&mut asm);

    let nmi_offset = asm.label_offset("nmi_stub").expect("nmi_stub must be marked");
    let reset_offset = asm.label_offset("reset").expect("reset must be marked");
    let irq_offset = asm.label_offset("irq_stub").expect("irq_stub must be marked");

    let (mut image, _line_map) = asm.finish(memmap::ROM_BASE);
    image.resize(memmap::ROM_SIZE, 0);

    // Vector cells sit at the top of the 16 KiB window, i.e. at
    // `0xfffa/c/e - ROM_BASE` within the image buffer itself.
    let nmi_addr = memmap::ROM_BASE.wrapping_add(nmi_offset as u16);
    let reset_addr = memmap::ROM_BASE.wrapping_add(reset_offset as u16);
    let irq_addr = memmap::ROM_BASE.wrapping_add(irq_offset as u16);
    write_vector(&mut image, 0xfffa - memmap::ROM_BASE, nmi_addr);
    write_vector(&mut image, 0xfffc - memmap::ROM_BASE, reset_addr);
    write_vector(&mut image, 0xfffe - memmap::ROM_BASE, irq_addr);
    image
}

fn write_vector(image: &mut [u8], at_offset_from_rom_base: u16, addr: u16) {
    let idx = at_offset_from_rom_base as usize;
    image[idx] = (addr & 0xff) as u8;
    image[idx + 1] = (addr >> 8) as u8;
}

fn emit_multiply_core(asm: &mut Asm) {
    // 16x16 -> 16 (truncated) shift-add multiply. TMP0 *= TMP1, consuming
    // TMP1; the accumulator lives in the runtime scratch cells since both
    // TMP0 and TMP1 are still live operands partway through the loop.
    asm.mark("multiply16core");
    asm.immediate(LDA, 0);
    asm.zp(STA, ZP_RUNTIME_SCRATCH as u8);
    asm.zp(STA, (ZP_RUNTIME_SCRATCH + 1) as u8);
    asm.immediate(LDX, 16);
    asm.mark("mul16_loop");
    asm.zp(LSR, (ZP_TMP1 + 1) as u8);
    asm.zp(ROR, ZP_TMP1 as u8);
    asm.branch(BCC, "mul16_skip");
    asm.implied(CLC);
    asm.zp(LDA, ZP_RUNTIME_SCRATCH as u8);
    asm.zp(ADC, ZP_TMP0 as u8);
    asm.zp(STA, ZP_RUNTIME_SCRATCH as u8);
    asm.zp(LDA, (ZP_RUNTIME_SCRATCH + 1) as u8);
    asm.zp(ADC, (ZP_TMP0 + 1) as u8);
    asm.zp(STA, (ZP_RUNTIME_SCRATCH + 1) as u8);
    asm.mark("mul16_skip");
    asm.zp(ASL, ZP_TMP0 as u8);
    asm.zp(ROL, (ZP_TMP0 + 1) as u8);
    asm.implied(DEX);
    asm.branch(BNE, "mul16_loop");
    asm.zp(LDA, ZP_RUNTIME_SCRATCH as u8);
    asm.zp(STA, ZP_TMP0 as u8);
    asm.zp(LDA, (ZP_RUNTIME_SCRATCH + 1) as u8);
    asm.zp(STA, (ZP_TMP0 + 1) as u8);
    asm.implied(RTS);
}

fn emit_divide_core(asm: &mut Asm) {
    // 16-bit unsigned restoring division. TMP0 = dividend, TMP1 = divisor
    // on entry; TMP0 = quotient, TMP1 = remainder on return.
    asm.mark("divide16core");
    asm.immediate(LDA, 0);
    asm.zp(STA, ZP_RUNTIME_SCRATCH as u8);
    asm.zp(STA, (ZP_RUNTIME_SCRATCH + 1) as u8);
    asm.immediate(LDX, 16);
    asm.mark("div16_loop");
    asm.zp(ASL, ZP_TMP0 as u8);
    asm.zp(ROL, (ZP_TMP0 + 1) as u8);
    asm.zp(ROL, ZP_RUNTIME_SCRATCH as u8);
    asm.zp(ROL, (ZP_RUNTIME_SCRATCH + 1) as u8);
    asm.zp(LDA, ZP_RUNTIME_SCRATCH as u8);
    asm.implied(SEC);
    asm.zp(SBC, ZP_TMP1 as u8);
    asm.implied(TAY);
    asm.zp(LDA, (ZP_RUNTIME_SCRATCH + 1) as u8);
    asm.zp(SBC, (ZP_TMP1 + 1) as u8);
    asm.branch(BCC, "div16_skip");
    asm.zp(STA, (ZP_RUNTIME_SCRATCH + 1) as u8);
    asm.implied(TYA);
    asm.zp(STA, ZP_RUNTIME_SCRATCH as u8);
    asm.zp(INC, ZP_TMP0 as u8);
    asm.mark("div16_skip");
    asm.implied(DEX);
    asm.branch(BNE, "div16_loop");
    asm.zp(LDA, ZP_RUNTIME_SCRATCH as u8);
    asm.zp(STA, ZP_TMP1 as u8);
    asm.zp(LDA, (ZP_RUNTIME_SCRATCH + 1) as u8);
    asm.zp(STA, (ZP_TMP1 + 1) as u8);
    asm.implied(RTS);
}

/// `mul_byte` and `mul_int` share one core: both operands already arrive
/// zero-extended to 16 bits on the compiler's software stack, so there is
/// nothing width-specific left for the jump table entry to do.
fn emit_mul_byte(asm: &mut Asm) {
    asm.mark("mul_byte_body");
    asm.jmp("multiply16core");
}

fn emit_mul_int(asm: &mut Asm) {
    asm.mark("mul_int_body");
    asm.jmp("multiply16core");
}

fn emit_div_byte(asm: &mut Asm) {
    asm.mark("div_byte_body");
    asm.jmp("divide16core");
}

fn emit_div_int(asm: &mut Asm) {
    asm.mark("div_int_body");
    asm.jmp("divide16core");
}

fn emit_mod_byte(asm: &mut Asm) {
    // Shares the division core, then returns the remainder where callers
    // expect the result (TMP0) instead of the quotient.
    asm.mark("mod_byte_body");
    asm.jsr("divide16core");
    asm.zp(LDA, ZP_TMP1 as u8);
    asm.zp(STA, ZP_TMP0 as u8);
    asm.zp(LDA, (ZP_TMP1 + 1) as u8);
    asm.zp(STA, (ZP_TMP0 + 1) as u8);
    asm.implied(RTS);
}

fn emit_print(asm: &mut Asm) {
    // arg0 (2 bytes): pointer to a NUL-terminated byte string in CPU RAM.
    asm.mark("print_body");
    asm.zp(LDA, ZP_ARG_STAGE as u8);
    asm.zp(STA, ZP_RUNTIME_SCRATCH as u8);
    asm.zp(LDA, (ZP_ARG_STAGE + 1) as u8);
    asm.zp(STA, (ZP_RUNTIME_SCRATCH + 1) as u8);
    asm.immediate(LDY, 0);
    asm.mark("print_loop");
    asm.indirect_y(LDA, ZP_RUNTIME_SCRATCH as u8);
    asm.branch(BEQ, "print_done");
    asm.absolute(STA, memmap::VGC_BASE + CHAR_OUT);
    asm.implied(INY);
    asm.branch(BNE, "print_loop");
    asm.mark("print_done");
    asm.implied(RTS);
}

fn emit_print_char(asm: &mut Asm) {
    asm.mark("print_char_body");
    asm.zp(LDA, ZP_ARG_STAGE as u8);
    asm.absolute(STA, memmap::VGC_BASE + CHAR_OUT);
    asm.implied(RTS);
}

fn emit_get_key(asm: &mut Asm) {
    asm.mark("get_key_body");
    asm.absolute(LDA, memmap::VGC_BASE + CHAR_IN);
    asm.zp(STA, ZP_RET as u8);
    asm.immediate(LDA, 0);
    asm.zp(STA, (ZP_RET + 1) as u8);
    asm.implied(RTS);
}

fn emit_wait_key(asm: &mut Asm) {
    asm.mark("wait_key_body");
    asm.mark("wait_key_loop");
    asm.absolute(LDA, memmap::VGC_BASE + CHAR_IN);
    asm.branch(BEQ, "wait_key_loop");
    asm.zp(STA, ZP_RET as u8);
    asm.immediate(LDA, 0);
    asm.zp(STA, (ZP_RET + 1) as u8);
    asm.implied(RTS);
}

fn emit_vsync(asm: &mut Asm) {
    // No CPU-visible vblank-status bit is exposed by the video controller
    // (DESIGN.md), so this approximates vertical sync with a fixed spin
    // rather than a real raster-position poll.
    asm.mark("vsync_body");
    asm.immediate(LDX, 0);
    asm.mark("vsync_loop");
    asm.implied(INX);
    asm.branch(BNE, "vsync_loop");
    asm.implied(RTS);
}

fn emit_memcpy(asm: &mut Asm) {
    // arg0: dst ptr (2 bytes), arg1: src ptr (2 bytes), arg2: length (2
    // bytes, low byte only honored — a toy runtime, not a general one).
    asm.mark("memcpy_body");
    asm.zp(LDA, (ZP_ARG_STAGE + 2) as u8);
    asm.zp(STA, ZP_RUNTIME_SCRATCH as u8);
    asm.zp(LDA, (ZP_ARG_STAGE + 3) as u8);
    asm.zp(STA, (ZP_RUNTIME_SCRATCH + 1) as u8);
    asm.zp(LDA, ZP_ARG_STAGE as u8);
    asm.zp(STA, (ZP_RUNTIME_SCRATCH + 2) as u8);
    asm.zp(LDA, (ZP_ARG_STAGE + 1) as u8);
    asm.zp(STA, (ZP_RUNTIME_SCRATCH + 3) as u8);
    asm.immediate(LDY, 0);
    asm.mark("memcpy_loop");
    asm.zp(CPY, (ZP_ARG_STAGE + 4) as u8);
    asm.branch(BEQ, "memcpy_done");
    asm.indirect_y(LDA, ZP_RUNTIME_SCRATCH as u8);
    asm.indirect_y(STA, (ZP_RUNTIME_SCRATCH + 2) as u8);
    asm.implied(INY);
    asm.branch(BNE, "memcpy_loop");
    asm.mark("memcpy_done");
    asm.implied(RTS);
}

fn emit_memset(asm: &mut Asm) {
    // arg0: dst ptr (2 bytes), arg1: fill byte (low byte), arg2: length
    // (low byte).
    asm.mark("memset_body");
    asm.zp(LDA, ZP_ARG_STAGE as u8);
    asm.zp(STA, ZP_RUNTIME_SCRATCH as u8);
    asm.zp(LDA, (ZP_ARG_STAGE + 1) as u8);
    asm.zp(STA, (ZP_RUNTIME_SCRATCH + 1) as u8);
    asm.immediate(LDY, 0);
    asm.mark("memset_loop");
    asm.zp(CPY, (ZP_ARG_STAGE + 4) as u8);
    asm.branch(BEQ, "memset_done");
    asm.zp(LDA, (ZP_ARG_STAGE + 2) as u8);
    asm.indirect_y(STA, ZP_RUNTIME_SCRATCH as u8);
    asm.implied(INY);
    asm.branch(BNE, "memset_loop");
    asm.mark("memset_done");
    asm.implied(RTS);
}

/// `gfx_cmd` and `sprite_cmd` both stage bytes into the VGC's parameter
/// registers and then trigger its single shared opcode register — the
/// hardware doesn't distinguish the two families of command any more than
/// `video::mod`'s `cmd` table does. arg0: pointer to `[opcode, params...]`,
/// arg1 (low byte): number of param bytes following the opcode.
fn emit_vgc_cmd_shared(asm: &mut Asm) {
    asm.mark("gfx_cmd_body");
    asm.jmp("vgc_cmd_core");
    asm.mark("sprite_cmd_body");
    asm.jmp("vgc_cmd_core");

    asm.mark("vgc_cmd_core");
    asm.zp(LDA, ZP_ARG_STAGE as u8);
    asm.zp(STA, ZP_RUNTIME_SCRATCH as u8);
    asm.zp(LDA, (ZP_ARG_STAGE + 1) as u8);
    asm.zp(STA, (ZP_RUNTIME_SCRATCH + 1) as u8);
    asm.immediate(LDY, 0);
    asm.mark("vgc_cmd_loop");
    asm.zp(CPY, (ZP_ARG_STAGE + 2) as u8);
    asm.branch(BEQ, "vgc_cmd_fire");
    asm.implied(INY);
    asm.indirect_y(LDA, ZP_RUNTIME_SCRATCH as u8);
    asm.absolute_y(STA, memmap::VGC_BASE + P_BASE - 1);
    asm.branch(BNE, "vgc_cmd_loop");
    asm.mark("vgc_cmd_fire");
    asm.immediate(LDY, 0);
    asm.indirect_y(LDA, ZP_RUNTIME_SCRATCH as u8);
    asm.absolute(STA, memmap::VGC_BASE + COMMAND_OFFSET);
    asm.implied(RTS);
}

fn emit_play_sound(asm: &mut Asm, voice_offsets: &[u8; 3]) {
    // arg0 (low byte): voice 0-2. arg1 (2 bytes): frequency. arg2 (low
    // byte): control register value (waveform select + gate bit).
    asm.mark("play_sound_body");
    asm.zp(LDX, ZP_ARG_STAGE as u8);
    asm.absolute_x(LDA, "voice_offsets");
    asm.implied(TAY);
    asm.zp(LDA, (ZP_ARG_STAGE + 2) as u8);
    asm.absolute_y(STA, memmap::SID0_BASE + SID_FREQ_LO);
    asm.zp(LDA, (ZP_ARG_STAGE + 3) as u8);
    asm.absolute_y(STA, memmap::SID0_BASE + SID_FREQ_HI);
    asm.zp(LDA, (ZP_ARG_STAGE + 4) as u8);
    asm.absolute_y(STA, memmap::SID0_BASE + SID_CONTROL);
    asm.implied(RTS);
    asm.mark("voice_offsets");
    for b in voice_offsets {
        asm.raw_byte(*b);
    }
}

fn emit_music_play(asm: &mut Asm) {
    // arg0 (low byte): song number, forwarded to the FIO controller's
    // SIDPLAY command (fio.rs's own PSID player, not this byte routine).
    asm.mark("music_play_body");
    asm.zp(LDA, ZP_ARG_STAGE as u8);
    asm.absolute(STA, memmap::FIO_BASE + FIO_SID_SONG);
    asm.immediate(LDA, FIO_CMD_SIDPLAY);
    asm.absolute(STA, memmap::FIO_BASE + FIO_COMMAND);
    asm.implied(RTS);
}

fn emit_music_stop(asm: &mut Asm) {
    asm.mark("music_stop_body");
    asm.immediate(LDA, FIO_CMD_SIDSTOP);
    asm.absolute(STA, memmap::FIO_BASE + FIO_COMMAND);
    asm.implied(RTS);
}

fn emit_set_volume(asm: &mut Asm) {
    asm.mark("set_volume_body");
    asm.zp(LDA, ZP_ARG_STAGE as u8);
    asm.immediate(AND, 0x0f);
    asm.absolute(STA, memmap::SID0_BASE + SID_MODE_VOLUME);
    asm.implied(RTS);
}

fn emit_fixed_mul(asm: &mut Asm) {
    // 8.8 x 8.8: multiply the truncated 16-bit way, then shift the product
    // right 8 bits to land the binary point back at 8.8. Loses the high
    // half of the true 32-bit product — acceptable for this toy runtime's
    // expected value range (DESIGN.md).
    asm.mark("fixed_mul_body");
    asm.jsr("multiply16core");
    asm.zp(LDA, (ZP_TMP0 + 1) as u8);
    asm.zp(STA, ZP_TMP0 as u8);
    asm.immediate(LDA, 0);
    asm.zp(STA, (ZP_TMP0 + 1) as u8);
    asm.implied(RTS);
}

fn emit_fixed_div(asm: &mut Asm) {
    // Shifts the dividend left 8 bits before the plain 16-bit divide, so
    // the quotient comes back in 8.8 instead of integer form.
    asm.mark("fixed_div_body");
    asm.zp(LDA, ZP_TMP0 as u8);
    asm.zp(STA, (ZP_TMP0 + 1) as u8);
    asm.immediate(LDA, 0);
    asm.zp(STA, ZP_TMP0 as u8);
    asm.jmp("divide16core");
}

fn emit_editor_entry(asm: &mut Asm) {
    // A compiled program's bootstrap jumps here once `main` returns.
    // There is no 6502-resident BASIC interpreter to hand control back
    // to (the line editor lives on the host side, see basic.rs), so this
    // is the agreed "compiled program finished" sentinel: `Machine`'s run
    // loop recognizes the CPU parked here and treats it as completion.
    asm.mark("editor_entry_body");
    asm.mark("editor_entry_spin");
    asm.jmp("editor_entry_spin");
}

fn emit_reset(asm: &mut Asm) {
    asm.mark("reset");
    asm.immediate(LDA, (SOFT_STACK_BASE & 0xff) as u8);
    asm.zp(STA, ZP_SOFT_SP as u8);
    asm.immediate(LDA, (SOFT_STACK_BASE >> 8) as u8);
    asm.zp(STA, (ZP_SOFT_SP + 1) as u8);
    asm.implied(CLD);
    // `IRQ_DISPATCH_VECTOR` is a plain RAM cell, zero-initialized by
    // `bus::init_vector_table` (it only publishes the zero-page device
    // vector table, not this one) — point it at a harmless default before
    // any IRQ source can fire, so a raster/timer/NIC interrupt arriving
    // before a user `__interrupt` function or the SID player's trampoline
    // claims the vector doesn't jump through a null pointer.
    asm.immediate_label_lo(LDA, "default_irq_handler");
    asm.absolute(STA, memmap::IRQ_DISPATCH_VECTOR);
    asm.immediate_label_hi(LDA, "default_irq_handler");
    asm.absolute(STA, memmap::IRQ_DISPATCH_VECTOR + 1);
    asm.jmp(CODE_BASE);
}

fn emit_irq_stub(asm: &mut Asm) {
    // Dispatches indirectly through the RAM cell spec.md's zero-page
    // vector table publishes, so software (the SID player's trampoline in
    // particular) can redirect interrupts without patching this ROM.
    asm.mark("irq_stub");
    asm.jmp_indirect(memmap::IRQ_DISPATCH_VECTOR);
    // No handler has claimed the vector yet; the default target is just
    // an `RTI`, matching `sound::player`'s trampoline convention of ending
    // in a bare `RTI` rather than expecting this stub to push registers.
    asm.mark("default_irq_handler");
    asm.implied(RTI);
}

fn emit_nmi_stub(asm: &mut Asm) {
    asm.mark("nmi_stub");
    asm.implied(RTI);
}

// -- register offsets mirrored from other devices' bus windows --
const CHAR_OUT: u16 = 11;
const CHAR_IN: u16 = 12;
const P_BASE: u16 = 1;
const COMMAND_OFFSET: u16 = 0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_is_exactly_one_rom_window() {
        let image = build();
        assert_eq!(image.len(), memmap::ROM_SIZE);
    }

    #[test]
    fn jump_table_entries_are_three_bytes_apart() {
        assert_eq!(JT_MUL_INT - JT_MUL_BYTE, 3);
        assert_eq!(JT_EDITOR_ENTRY, memmap::ROM_BASE + 60);
    }

    #[test]
    fn reset_vector_points_inside_the_rom_window() {
        let image = build();
        let vector_offset = (0xfffcu16 - memmap::ROM_BASE) as usize;
        let lo = image[vector_offset] as u16;
        let hi = image[vector_offset + 1] as u16;
        let addr = (hi << 8) | lo;
        assert!(addr >= memmap::ROM_BASE && addr < memmap::ROM_BASE + memmap::ROM_SIZE as u16);
    }
}

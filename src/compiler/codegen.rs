// This file is part of nova64.
// Grounded on spec.md §4.11's code generator paragraph: a canonical
// zero-page temporary for expression evaluation, a compiler-managed
// stack region for call arguments, return values in the accumulator
// (byte) or a fixed low-address pair (wider), and a `JSR` to the
// runtime ROM's jump table for multiplication/division and the other
// published helpers. Shaped after zinc64-system/src/c64.rs's habit of
// keeping the generated artifact (here, a byte blob) paired with a
// side table (here, the symbol/line maps) rather than an opaque object.

use std::collections::HashMap;

use super::ast::*;
use super::asm::Asm;
use super::runtime_rom::{self, ZP_ARG_STAGE, ZP_DEREF_PTR, ZP_RET, ZP_SOFT_SP, ZP_TMP0, ZP_TMP1};
use super::types::{StructLayout, Type};
use super::typeck::TypeckResult;
use crate::cpu::Mnemonic::*;

pub struct CodeGenResult {
    pub code: Vec<u8>,
    pub base: u16,
    pub symbols: HashMap<String, u16>,
    pub line_map: Vec<(u16, u32)>,
}

/// Resolves `Type::Named` the same way `typeck::Checker::resolve` does,
/// against the struct/enum tables typeck already built. Local
/// declarations never go through typeck's own resolver (it discards
/// each function's scopes once the body is checked), so codegen redoes
/// the same small lookup for them.
fn resolve_type(ty: &Type, typeck: &TypeckResult) -> Type {
    match ty {
        Type::Named(name) => {
            if typeck.structs.contains_key(name) {
                Type::Struct(name.clone())
            } else if typeck.enums.contains_key(name) {
                Type::Enum(name.clone())
            } else {
                Type::Struct(name.clone())
            }
        }
        Type::Pointer(inner) => Type::Pointer(Box::new(resolve_type(inner, typeck))),
        Type::Array(inner, n) => Type::Array(Box::new(resolve_type(inner, typeck)), *n),
        other => other.clone(),
    }
}

fn width_of(ty: &Type, structs: &HashMap<String, StructLayout>) -> u32 {
    ty.size_of(structs).max(if matches!(ty, Type::Void) { 0 } else { 1 })
}

struct Slot {
    addr: u16,
    ty: Type,
}

/// Lays out global and local storage with a single bump allocator
/// (spec.md §9's design note: this toy backend has no recursion, so
/// each function's locals get their own static, non-overlapping region
/// rather than a real stack frame — an Open Question resolution
/// recorded in DESIGN.md).
struct Layout {
    globals: HashMap<String, Slot>,
    next: u16,
}

impl Layout {
    fn bump(&mut self, ty: Type) -> u16 {
        let addr = self.next;
        let size = ty.size_of(&HashMap::new()).max(1) as u16;
        self.next = self.next.wrapping_add(size);
        let _ = ty;
        addr
    }
}

fn layout_globals(program: &Program, typeck: &TypeckResult) -> Layout {
    let mut layout = Layout { globals: HashMap::new(), next: runtime_rom::DATA_BASE };
    for decl in &program.decls {
        match decl {
            Decl::GlobalVar(v) => {
                let ty = typeck.globals.get(&v.name).cloned().unwrap_or(Type::Byte);
                let size = ty.size_of(&typeck.structs).max(1);
                let addr = layout.next;
                layout.next = layout.next.wrapping_add(size as u16);
                layout.globals.insert(v.name.clone(), Slot { addr, ty });
            }
            Decl::GlobalArray(a) => {
                let ty = typeck.globals.get(&a.name).cloned().unwrap_or(Type::Array(Box::new(Type::Byte), 0));
                let size = ty.size_of(&typeck.structs).max(1);
                let addr = layout.next;
                layout.next = layout.next.wrapping_add(size as u16);
                layout.globals.insert(a.name.clone(), Slot { addr, ty });
            }
            _ => {}
        }
    }
    layout
}

/// Per-function local layout: params first (so the prologue's arg
/// copy-in writes land at fixed, already-known addresses), then every
/// `VarDecl`/`ArrayDecl` found anywhere in the body, innermost blocks
/// included, in source order.
fn layout_locals(func: &FunctionDecl, typeck: &TypeckResult, start: u16) -> (HashMap<String, Slot>, u16) {
    let mut locals = HashMap::new();
    let mut next = start;
    for p in &func.params {
        let ty = resolve_type(&p.ty, typeck);
        let size = ty.size_of(&typeck.structs).max(1);
        locals.insert(p.name.clone(), Slot { addr: next, ty });
        next = next.wrapping_add(size as u16);
    }
    collect_locals_stmts(&func.body, typeck, &mut locals, &mut next);
    (locals, next)
}

fn collect_locals_stmts(stmts: &[Stmt], typeck: &TypeckResult, locals: &mut HashMap<String, Slot>, next: &mut u16) {
    for stmt in stmts {
        collect_locals_stmt(stmt, typeck, locals, next);
    }
}

fn collect_locals_stmt(stmt: &Stmt, typeck: &TypeckResult, locals: &mut HashMap<String, Slot>, next: &mut u16) {
    match stmt {
        Stmt::VarDecl(v) => {
            let ty = resolve_type(&v.ty, typeck);
            let size = ty.size_of(&typeck.structs).max(1);
            locals.insert(v.name.clone(), Slot { addr: *next, ty });
            *next = next.wrapping_add(size as u16);
        }
        Stmt::ArrayDecl(a) => {
            let elem = resolve_type(&a.elem_ty, typeck);
            let count = a.size.unwrap_or_else(|| a.init.as_ref().map(|v| v.len() as u32).unwrap_or(0));
            let ty = Type::Array(Box::new(elem), count);
            let size = ty.size_of(&typeck.structs).max(1);
            locals.insert(a.name.clone(), Slot { addr: *next, ty });
            *next = next.wrapping_add(size as u16);
        }
        Stmt::Block(stmts) => collect_locals_stmts(stmts, typeck, locals, next),
        Stmt::If { then_branch, else_branch, .. } => {
            collect_locals_stmt(then_branch, typeck, locals, next);
            if let Some(e) = else_branch {
                collect_locals_stmt(e, typeck, locals, next);
            }
        }
        Stmt::While { body, .. } | Stmt::DoWhile { body, .. } => collect_locals_stmt(body, typeck, locals, next),
        Stmt::For { init, body, .. } => {
            if let Some(init) = init {
                collect_locals_stmt(init, typeck, locals, next);
            }
            collect_locals_stmt(body, typeck, locals, next);
        }
        Stmt::Switch { cases, .. } => {
            for case in cases {
                collect_locals_stmts(&case.body, typeck, locals, next);
            }
        }
        Stmt::Expr(_) | Stmt::Return { .. } | Stmt::Break | Stmt::Continue | Stmt::Asm(_) => {}
    }
}

/// The set of runtime ROM helpers callable by name from source, and the
/// calling convention each one uses. `fixed_mul`/`fixed_div` share the
/// `*`/`/` operators' TMP0/TMP1-in, TMP0-out convention (see
/// `runtime_rom::emit_fixed_mul`); everything else stages its arguments
/// into `ZP_ARG_STAGE` and (if non-void) returns through `ZP_RET`.
fn builtin_jump_slot(name: &str) -> Option<u16> {
    Some(match name {
        "print" => runtime_rom::JT_PRINT,
        "print_char" => runtime_rom::JT_PRINT_CHAR,
        "get_key" => runtime_rom::JT_GET_KEY,
        "wait_key" => runtime_rom::JT_WAIT_KEY,
        "vsync" => runtime_rom::JT_VSYNC,
        "memcpy" => runtime_rom::JT_MEMCPY,
        "memset" => runtime_rom::JT_MEMSET,
        "gfx_cmd" => runtime_rom::JT_GFX_CMD,
        "sprite_cmd" => runtime_rom::JT_SPRITE_CMD,
        "play_sound" => runtime_rom::JT_PLAY_SOUND,
        "music_play" => runtime_rom::JT_MUSIC_PLAY,
        "music_stop" => runtime_rom::JT_MUSIC_STOP,
        "set_volume" => runtime_rom::JT_SET_VOLUME,
        _ => return None,
    })
}

fn is_tmp_convention_builtin(name: &str) -> Option<u16> {
    match name {
        "fixed_mul" => Some(runtime_rom::JT_FIXED_MUL),
        "fixed_div" => Some(runtime_rom::JT_FIXED_DIV),
        _ => None,
    }
}

struct Codegen<'a> {
    asm: Asm,
    typeck: &'a TypeckResult,
    globals: HashMap<String, Slot>,
    locals: HashMap<String, Slot>,
    current_fn_return_ty: Type,
    current_fn_interrupt: bool,
    loop_labels: Vec<(String, String)>, // (continue target, break target)
}

impl<'a> Codegen<'a> {
    fn lookup(&self, name: &str) -> Option<(u16, Type)> {
        if let Some(slot) = self.locals.get(name) {
            return Some((slot.addr, slot.ty.clone()));
        }
        self.globals.get(name).map(|s| (s.addr, s.ty.clone()))
    }

    fn emit_shared_runtime(&mut self) {
        // Pushes TMP0 (2 bytes) onto the software stack pointed at by
        // ZP_SOFT_SP, bumping the pointer past it.
        self.asm.mark("rt_soft_push");
        self.asm.immediate(LDY, 0);
        self.asm.zp(LDA, ZP_TMP0 as u8);
        self.asm.indirect_y(STA, ZP_SOFT_SP as u8);
        self.asm.implied(INY);
        self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
        self.asm.indirect_y(STA, ZP_SOFT_SP as u8);
        self.asm.implied(CLC);
        self.asm.zp(LDA, ZP_SOFT_SP as u8);
        self.asm.immediate(ADC, 2);
        self.asm.zp(STA, ZP_SOFT_SP as u8);
        self.asm.zp(LDA, (ZP_SOFT_SP + 1) as u8);
        self.asm.immediate(ADC, 0);
        self.asm.zp(STA, (ZP_SOFT_SP + 1) as u8);
        self.asm.implied(RTS);

        // Un-bumps ZP_SOFT_SP by 2, then reads the 2 bytes there back
        // into TMP0 (the operand the matching push put down).
        self.asm.mark("rt_soft_pop");
        self.asm.implied(SEC);
        self.asm.zp(LDA, ZP_SOFT_SP as u8);
        self.asm.immediate(SBC, 2);
        self.asm.zp(STA, ZP_SOFT_SP as u8);
        self.asm.zp(LDA, (ZP_SOFT_SP + 1) as u8);
        self.asm.immediate(SBC, 0);
        self.asm.zp(STA, (ZP_SOFT_SP + 1) as u8);
        self.asm.immediate(LDY, 0);
        self.asm.indirect_y(LDA, ZP_SOFT_SP as u8);
        self.asm.zp(STA, ZP_TMP0 as u8);
        self.asm.implied(INY);
        self.asm.indirect_y(LDA, ZP_SOFT_SP as u8);
        self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
        self.asm.implied(RTS);
    }

    fn push_tmp0(&mut self) {
        self.asm.jsr("rt_soft_push");
    }

    fn pop_into_tmp0(&mut self) {
        self.asm.jsr("rt_soft_pop");
    }

    fn move_tmp0_to_tmp1(&mut self) {
        self.asm.zp(LDA, ZP_TMP0 as u8);
        self.asm.zp(STA, ZP_TMP1 as u8);
        self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
        self.asm.zp(STA, (ZP_TMP1 + 1) as u8);
    }

    fn load_zp16_immediate(&mut self, zp: u16, value: u16) {
        self.asm.immediate(LDA, (value & 0xff) as u8);
        self.asm.zp(STA, zp as u8);
        self.asm.immediate(LDA, (value >> 8) as u8);
        self.asm.zp(STA, (zp + 1) as u8);
    }

    /// Loads `name`'s value into TMP0. Byte-sized values zero-extend
    /// into TMP0+1; the handful of widths codegen knows about (byte,
    /// bool, enum, everything else 2 bytes) are all it needs.
    fn load_ident(&mut self, name: &str, line: u32) -> Type {
        if let Some(layout) = self.typeck.enums.values().find(|e| e.value_of(name).is_some()) {
            let value = layout.value_of(name).unwrap();
            self.load_zp16_immediate(ZP_TMP0, (value as i16 as u16) & 0x00ff);
            return Type::Enum(layout.name.clone());
        }
        let Some((addr, ty)) = self.lookup(name) else {
            // typeck already reported this as undeclared; emit a
            // harmless zero so codegen can keep going.
            self.load_zp16_immediate(ZP_TMP0, 0);
            let _ = line;
            return Type::Void;
        };
        let size = ty.size_of(&self.typeck.structs);
        if size <= 1 {
            self.asm.absolute(LDA, addr);
            self.asm.zp(STA, ZP_TMP0 as u8);
            self.asm.immediate(LDA, 0);
            self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
        } else {
            self.asm.absolute(LDA, addr);
            self.asm.zp(STA, ZP_TMP0 as u8);
            self.asm.absolute(LDA, addr + 1);
            self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
        }
        ty
    }

    /// Stores TMP0 into `name`'s storage, truncating to one byte for
    /// byte/bool/enum-sized targets.
    fn store_ident(&mut self, name: &str) {
        let Some((addr, ty)) = self.lookup(name) else { return };
        let size = ty.size_of(&self.typeck.structs);
        self.asm.zp(LDA, ZP_TMP0 as u8);
        self.asm.absolute(STA, addr);
        if size > 1 {
            self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
            self.asm.absolute(STA, addr + 1);
        }
    }

    fn address_of_ident(&mut self, name: &str) -> Option<u16> {
        self.lookup(name).map(|(addr, _)| addr)
    }

    // ---- expressions ----

    fn gen_expr(&mut self, expr: &Expr) -> Type {
        self.asm.note_line(expr.line());
        match expr {
            Expr::IntLit(v) => {
                self.load_zp16_immediate(ZP_TMP0, *v as i16 as u16);
                Type::Int
            }
            Expr::HexLit(v) | Expr::BinLit(v) => {
                self.load_zp16_immediate(ZP_TMP0, *v as u16);
                Type::Uint
            }
            Expr::FixedLit(v) => {
                self.load_zp16_immediate(ZP_TMP0, *v as i16 as u16);
                Type::Fixed
            }
            Expr::BoolLit(v) => {
                self.load_zp16_immediate(ZP_TMP0, if *v { 1 } else { 0 });
                Type::Bool
            }
            Expr::CharLit(c) => {
                self.load_zp16_immediate(ZP_TMP0, *c as u16);
                Type::Byte
            }
            Expr::StringLit(s) => {
                // No separate rodata section: string literals are laid
                // down inline as NUL-terminated bytes right after the
                // statement that references them, with a `JMP` around
                // the data so control flow never falls into it.
                let after = self.asm.anon_label();
                self.asm.jmp(after.clone());
                let data_label = self.asm.anon_label();
                self.asm.mark(&data_label);
                for b in s.bytes() {
                    self.asm.raw_byte(b);
                }
                self.asm.raw_byte(0);
                self.asm.mark(&after);
                self.asm.immediate_label_lo(LDA, data_label.clone());
                self.asm.zp(STA, ZP_TMP0 as u8);
                self.asm.immediate_label_hi(LDA, data_label);
                self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
                Type::Pointer(Box::new(Type::Byte))
            }
            Expr::Ident(name, line) => self.load_ident(name, *line),
            Expr::Unary { op, expr, line } => self.gen_unary(op, expr, *line),
            Expr::Binary { op, lhs, rhs, line } => self.gen_binary(op, lhs, rhs, *line),
            Expr::Call { callee, args, line } => self.gen_call(callee, args, *line),
            Expr::Index { base, index, line } => self.gen_index(base, index, *line),
            Expr::Member { .. } => {
                // Struct member codegen is out of scope for this pass
                // (DESIGN.md): typeck validates member access, but
                // codegen only needs scalar globals/locals to satisfy
                // spec.md §8's arithmetic round-trip law.
                self.load_zp16_immediate(ZP_TMP0, 0);
                let _ = line;
                Type::Void
            }
            Expr::Assign { target, op, value, line } => self.gen_assign(target, op, value, *line),
            Expr::Sizeof { ty } => {
                let resolved = resolve_type(ty, self.typeck);
                let size = resolved.size_of(&self.typeck.structs);
                self.load_zp16_immediate(ZP_TMP0, size as u16);
                Type::Uint
            }
            Expr::Cast { ty, expr, .. } => {
                self.gen_expr(expr);
                let target = resolve_type(ty, self.typeck);
                if target.size_of(&self.typeck.structs) <= 1 {
                    self.asm.immediate(LDA, 0);
                    self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
                }
                target
            }
        }
    }

    fn gen_unary(&mut self, op: &UnaryOp, inner: &Expr, line: u32) -> Type {
        match op {
            UnaryOp::AddrOf => {
                if let Expr::Ident(name, _) = inner {
                    let addr = self.address_of_ident(name).unwrap_or(0);
                    self.load_zp16_immediate(ZP_TMP0, addr);
                    let ty = self.lookup(name).map(|(_, t)| t).unwrap_or(Type::Void);
                    return Type::Pointer(Box::new(ty));
                }
                self.gen_expr(inner);
                Type::Pointer(Box::new(Type::Void))
            }
            UnaryOp::Deref => {
                let ty = self.gen_expr(inner);
                let elem = match ty {
                    Type::Pointer(inner_ty) => *inner_ty,
                    _ => Type::Byte,
                };
                self.asm.zp(LDA, ZP_TMP0 as u8);
                self.asm.zp(STA, ZP_DEREF_PTR as u8);
                self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
                self.asm.zp(STA, (ZP_DEREF_PTR + 1) as u8);
                self.asm.immediate(LDY, 0);
                self.asm.indirect_y(LDA, ZP_DEREF_PTR as u8);
                self.asm.zp(STA, ZP_TMP0 as u8);
                if elem.size_of(&self.typeck.structs) > 1 {
                    self.asm.implied(INY);
                    self.asm.indirect_y(LDA, ZP_DEREF_PTR as u8);
                    self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
                } else {
                    self.asm.immediate(LDA, 0);
                    self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
                }
                elem
            }
            UnaryOp::Neg => {
                let ty = self.gen_expr(inner);
                self.asm.implied(SEC);
                self.asm.immediate(LDA, 0);
                self.asm.zp(SBC, ZP_TMP0 as u8);
                self.asm.zp(STA, ZP_TMP0 as u8);
                self.asm.immediate(LDA, 0);
                self.asm.zp(SBC, (ZP_TMP0 + 1) as u8);
                self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
                ty
            }
            UnaryOp::Not => {
                self.gen_expr(inner);
                self.asm.zp(LDA, ZP_TMP0 as u8);
                self.asm.immediate(EOR, 1);
                self.asm.zp(STA, ZP_TMP0 as u8);
                Type::Bool
            }
            UnaryOp::BitNot => {
                let ty = self.gen_expr(inner);
                self.asm.zp(LDA, ZP_TMP0 as u8);
                self.asm.immediate(EOR, 0xff);
                self.asm.zp(STA, ZP_TMP0 as u8);
                self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
                self.asm.immediate(EOR, 0xff);
                self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
                ty
            }
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                self.gen_incdec(op, inner, line)
            }
        }
    }

    fn gen_incdec(&mut self, op: &UnaryOp, inner: &Expr, line: u32) -> Type {
        let Expr::Ident(name, _) = inner else {
            // Indexed/member targets are out of scope for ++/-- in this
            // backend; fall back to a plain read.
            return self.gen_expr(inner);
        };
        let ty = self.load_ident(name, line);
        let is_inc = matches!(op, UnaryOp::PreInc | UnaryOp::PostInc);
        let is_post = matches!(op, UnaryOp::PostInc | UnaryOp::PostDec);
        if is_post {
            self.push_tmp0();
        }
        if is_inc {
            self.asm.implied(CLC);
            self.asm.zp(LDA, ZP_TMP0 as u8);
            self.asm.immediate(ADC, 1);
            self.asm.zp(STA, ZP_TMP0 as u8);
            self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
            self.asm.immediate(ADC, 0);
            self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
        } else {
            self.asm.implied(SEC);
            self.asm.zp(LDA, ZP_TMP0 as u8);
            self.asm.immediate(SBC, 1);
            self.asm.zp(STA, ZP_TMP0 as u8);
            self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
            self.asm.immediate(SBC, 0);
            self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
        }
        self.store_ident(name);
        if is_post {
            self.pop_into_tmp0();
        }
        ty
    }

    /// Evaluates `lhs` then `rhs`, leaving `lhs` in TMP0 and `rhs` in
    /// TMP1 — the convention every arithmetic/comparison path and the
    /// ROM's `divide16core` (dividend in TMP0, divisor in TMP1) agree on.
    fn gen_operands(&mut self, lhs: &Expr, rhs: &Expr) -> (Type, Type) {
        let lt = self.gen_expr(lhs);
        self.push_tmp0();
        let rt = self.gen_expr(rhs);
        self.move_tmp0_to_tmp1();
        self.pop_into_tmp0();
        (lt, rt)
    }

    fn gen_binary(&mut self, op: &BinaryOp, lhs: &Expr, rhs: &Expr, line: u32) -> Type {
        use BinaryOp::*;
        match op {
            And => {
                let done = self.asm.anon_label();
                self.gen_expr(lhs);
                self.asm.zp(LDA, ZP_TMP0 as u8);
                self.asm.branch(BEQ, done.clone());
                self.gen_expr(rhs);
                self.asm.mark(&done);
                return Type::Bool;
            }
            Or => {
                let done = self.asm.anon_label();
                self.gen_expr(lhs);
                self.asm.zp(LDA, ZP_TMP0 as u8);
                self.asm.branch(BNE, done.clone());
                self.gen_expr(rhs);
                self.asm.mark(&done);
                return Type::Bool;
            }
            _ => {}
        }

        let (lt, rt) = self.gen_operands(lhs, rhs);
        let structs = &self.typeck.structs;
        let wide = width_of(&lt, structs).max(width_of(&rt, structs)) > 1;

        match op {
            Add => {
                self.asm.implied(CLC);
                self.asm.zp(LDA, ZP_TMP0 as u8);
                self.asm.zp(ADC, ZP_TMP1 as u8);
                self.asm.zp(STA, ZP_TMP0 as u8);
                self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
                self.asm.zp(ADC, (ZP_TMP1 + 1) as u8);
                self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
                if width_of(&lt, structs) >= width_of(&rt, structs) { lt } else { rt }
            }
            Sub => {
                self.asm.implied(SEC);
                self.asm.zp(LDA, ZP_TMP0 as u8);
                self.asm.zp(SBC, ZP_TMP1 as u8);
                self.asm.zp(STA, ZP_TMP0 as u8);
                self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
                self.asm.zp(SBC, (ZP_TMP1 + 1) as u8);
                self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
                if width_of(&lt, structs) >= width_of(&rt, structs) { lt } else { rt }
            }
            Mul => {
                let slot = if wide { runtime_rom::JT_MUL_INT } else { runtime_rom::JT_MUL_BYTE };
                self.asm.jsr(slot);
                if width_of(&lt, structs) >= width_of(&rt, structs) { lt } else { rt }
            }
            Div => {
                let slot = if wide { runtime_rom::JT_DIV_INT } else { runtime_rom::JT_DIV_BYTE };
                self.asm.jsr(slot);
                if width_of(&lt, structs) >= width_of(&rt, structs) { lt } else { rt }
            }
            Mod => {
                self.asm.jsr(runtime_rom::JT_MOD_BYTE);
                if width_of(&lt, structs) >= width_of(&rt, structs) { lt } else { rt }
            }
            BitAnd => self.gen_bitop(AND),
            BitOr => self.gen_bitop(ORA),
            BitXor => self.gen_bitop(EOR),
            Shl => {
                self.gen_shift(true);
                lt
            }
            Shr => {
                self.gen_shift(false);
                lt
            }
            Eq | Ne | Lt | Le | Gt | Ge => {
                if let (Type::Enum(a), Type::Enum(b)) = (&lt, &rt) {
                    let _ = (a, b);
                }
                self.gen_compare(op);
                Type::Bool
            }
            And | Or => unreachable!("handled above with short-circuit codegen"),
        }
    }

    fn gen_bitop(&mut self, m: crate::cpu::Mnemonic) -> Type {
        self.asm.zp(LDA, ZP_TMP0 as u8);
        self.asm.zp(m, ZP_TMP1 as u8);
        self.asm.zp(STA, ZP_TMP0 as u8);
        self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
        self.asm.zp(m, (ZP_TMP1 + 1) as u8);
        self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
        Type::Int
    }

    /// Shifts the 16-bit value in TMP0 left or right by the low byte of
    /// TMP1, looping in X. A count of zero falls straight through.
    fn gen_shift(&mut self, left: bool) {
        let loop_label = self.asm.anon_label();
        let skip = self.asm.anon_label();
        self.asm.zp(LDX, ZP_TMP1 as u8);
        self.asm.branch(BEQ, skip.clone());
        self.asm.mark(&loop_label);
        if left {
            self.asm.zp(ASL, ZP_TMP0 as u8);
            self.asm.zp(ROL, (ZP_TMP0 + 1) as u8);
        } else {
            self.asm.zp(LSR, (ZP_TMP0 + 1) as u8);
            self.asm.zp(ROR, ZP_TMP0 as u8);
        }
        self.asm.implied(DEX);
        self.asm.branch(BNE, loop_label);
        self.asm.mark(&skip);
    }

    /// Lowers every relational/equality op to one 16-bit unsigned
    /// subtract-and-branch, leaving a canonical 0/1 in TMP0. Signed
    /// comparison is not distinguished from unsigned — a recorded
    /// simplification (DESIGN.md) acceptable for a toy backend whose
    /// round-trip law (spec.md §8) only exercises byte values.
    fn gen_compare(&mut self, op: &BinaryOp) {
        use BinaryOp::*;
        let is_true = self.asm.anon_label();
        let done = self.asm.anon_label();
        match op {
            Eq | Ne => {
                self.asm.zp(LDA, ZP_TMP0 as u8);
                self.asm.zp(CMP, ZP_TMP1 as u8);
                self.asm.branch(BNE, if matches!(op, Eq) { done.clone() } else { is_true.clone() });
                self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
                self.asm.zp(CMP, (ZP_TMP1 + 1) as u8);
                if matches!(op, Eq) {
                    self.asm.branch(BNE, done.clone());
                } else {
                    self.asm.branch(BNE, is_true.clone());
                }
            }
            Lt | Ge => {
                self.asm.implied(SEC);
                self.asm.zp(LDA, ZP_TMP0 as u8);
                self.asm.zp(SBC, ZP_TMP1 as u8);
                self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
                self.asm.zp(SBC, (ZP_TMP1 + 1) as u8);
                if matches!(op, Lt) {
                    self.asm.branch(BCC, is_true.clone());
                } else {
                    self.asm.branch(BCS, is_true.clone());
                }
            }
            Gt | Le => {
                // a > b  <=>  b < a;  a <= b  <=>  b >= a.
                self.asm.implied(SEC);
                self.asm.zp(LDA, ZP_TMP1 as u8);
                self.asm.zp(SBC, ZP_TMP0 as u8);
                self.asm.zp(LDA, (ZP_TMP1 + 1) as u8);
                self.asm.zp(SBC, (ZP_TMP0 + 1) as u8);
                if matches!(op, Gt) {
                    self.asm.branch(BCC, is_true.clone());
                } else {
                    self.asm.branch(BCS, is_true.clone());
                }
            }
            _ => unreachable!("gen_compare only called for Eq/Ne/Lt/Le/Gt/Ge"),
        }
        // false path
        self.asm.immediate(LDA, 0);
        self.asm.zp(STA, ZP_TMP0 as u8);
        self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
        self.asm.branch(BEQ, done.clone());
        self.asm.mark(&is_true);
        self.asm.immediate(LDA, 1);
        self.asm.zp(STA, ZP_TMP0 as u8);
        self.asm.immediate(LDA, 0);
        self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
        self.asm.mark(&done);
    }

    fn gen_index(&mut self, base: &Expr, index: &Expr, line: u32) -> Type {
        let _ = line;
        // Only `array_ident[const-or-runtime index]` is supported: the
        // array's base address is known at compile time, so only the
        // element offset needs to be computed at runtime.
        let Expr::Ident(name, _) = base else {
            self.load_zp16_immediate(ZP_TMP0, 0);
            return Type::Void;
        };
        let Some((base_addr, base_ty)) = self.lookup(name) else {
            self.load_zp16_immediate(ZP_TMP0, 0);
            return Type::Void;
        };
        let elem_ty = match &base_ty {
            Type::Array(elem, _) => (**elem).clone(),
            Type::Pointer(elem) => (**elem).clone(),
            _ => Type::Byte,
        };
        let elem_size = elem_ty.size_of(&self.typeck.structs).max(1);

        self.gen_expr(index);
        if elem_size > 1 {
            self.load_zp16_immediate(ZP_TMP1, elem_size as u16);
            self.asm.jsr(runtime_rom::JT_MUL_INT);
        }
        // TMP0 now holds the byte offset; fold in the base address.
        self.asm.implied(CLC);
        self.asm.zp(LDA, ZP_TMP0 as u8);
        self.asm.immediate(ADC, (base_addr & 0xff) as u8);
        self.asm.zp(STA, ZP_DEREF_PTR as u8);
        self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
        self.asm.immediate(ADC, (base_addr >> 8) as u8);
        self.asm.zp(STA, (ZP_DEREF_PTR + 1) as u8);

        self.asm.immediate(LDY, 0);
        self.asm.indirect_y(LDA, ZP_DEREF_PTR as u8);
        self.asm.zp(STA, ZP_TMP0 as u8);
        if elem_size > 1 {
            self.asm.implied(INY);
            self.asm.indirect_y(LDA, ZP_DEREF_PTR as u8);
            self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
        } else {
            self.asm.immediate(LDA, 0);
            self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
        }
        elem_ty
    }

    /// Mirrors `gen_index`'s address computation but leaves the
    /// element's address in `ZP_DEREF_PTR` instead of loading through
    /// it, for use by `gen_assign`.
    fn gen_index_address(&mut self, base: &str, index: &Expr) -> u32 {
        let Some((base_addr, base_ty)) = self.lookup(base) else { return 1 };
        let elem_ty = match &base_ty {
            Type::Array(elem, _) => (**elem).clone(),
            Type::Pointer(elem) => (**elem).clone(),
            _ => Type::Byte,
        };
        let elem_size = elem_ty.size_of(&self.typeck.structs).max(1);
        self.gen_expr(index);
        if elem_size > 1 {
            self.load_zp16_immediate(ZP_TMP1, elem_size as u16);
            self.asm.jsr(runtime_rom::JT_MUL_INT);
        }
        self.asm.implied(CLC);
        self.asm.zp(LDA, ZP_TMP0 as u8);
        self.asm.immediate(ADC, (base_addr & 0xff) as u8);
        self.asm.zp(STA, ZP_DEREF_PTR as u8);
        self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
        self.asm.immediate(ADC, (base_addr >> 8) as u8);
        self.asm.zp(STA, (ZP_DEREF_PTR + 1) as u8);
        elem_size
    }

    fn gen_assign(&mut self, target: &Expr, op: &Option<BinaryOp>, value: &Expr, line: u32) -> Type {
        let _ = line;
        match target {
            Expr::Ident(name, ident_line) => {
                if let Some(binop) = op {
                    self.load_ident(name, *ident_line);
                    self.push_tmp0();
                    self.gen_expr(value);
                    self.move_tmp0_to_tmp1();
                    self.pop_into_tmp0();
                    self.gen_binary_op_on_tmp(binop);
                } else {
                    self.gen_expr(value);
                }
                self.store_ident(name);
                self.lookup(name).map(|(_, t)| t).unwrap_or(Type::Void)
            }
            Expr::Index { base, index, .. } => {
                let Expr::Ident(base_name, _) = base.as_ref() else {
                    self.gen_expr(value);
                    return Type::Void;
                };
                if op.is_some() {
                    // Compound assignment through an index is out of
                    // scope (DESIGN.md); fall back to plain assignment.
                }
                let elem_size = self.gen_index_address(base_name, index);
                self.push_zp16(ZP_DEREF_PTR);
                let ty = self.gen_expr(value);
                self.pop_zp16(ZP_DEREF_PTR);
                self.asm.immediate(LDY, 0);
                self.asm.zp(LDA, ZP_TMP0 as u8);
                self.asm.indirect_y(STA, ZP_DEREF_PTR as u8);
                if elem_size > 1 {
                    self.asm.implied(INY);
                    self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
                    self.asm.indirect_y(STA, ZP_DEREF_PTR as u8);
                }
                ty
            }
            _ => self.gen_expr(value),
        }
    }

    fn push_zp16(&mut self, zp: u16) {
        self.asm.zp(LDA, zp as u8);
        self.asm.zp(STA, ZP_TMP0 as u8);
        self.asm.zp(LDA, (zp + 1) as u8);
        self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
        self.push_tmp0();
    }

    fn pop_zp16(&mut self, zp: u16) {
        self.pop_into_tmp0();
        self.asm.zp(LDA, ZP_TMP0 as u8);
        self.asm.zp(STA, zp as u8);
        self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
        self.asm.zp(STA, (zp + 1) as u8);
    }

    /// Applies a compound-assignment operator to TMP0 (accumulated
    /// value so far) and TMP1 (the right-hand side), leaving the result
    /// in TMP0 — shares the same operand convention as `gen_binary`.
    fn gen_binary_op_on_tmp(&mut self, op: &BinaryOp) {
        use BinaryOp::*;
        match op {
            Add => {
                self.asm.implied(CLC);
                self.asm.zp(LDA, ZP_TMP0 as u8);
                self.asm.zp(ADC, ZP_TMP1 as u8);
                self.asm.zp(STA, ZP_TMP0 as u8);
                self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
                self.asm.zp(ADC, (ZP_TMP1 + 1) as u8);
                self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
            }
            Sub => {
                self.asm.implied(SEC);
                self.asm.zp(LDA, ZP_TMP0 as u8);
                self.asm.zp(SBC, ZP_TMP1 as u8);
                self.asm.zp(STA, ZP_TMP0 as u8);
                self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
                self.asm.zp(SBC, (ZP_TMP1 + 1) as u8);
                self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
            }
            Mul => self.asm.jsr(runtime_rom::JT_MUL_INT),
            Div => self.asm.jsr(runtime_rom::JT_DIV_INT),
            Mod => self.asm.jsr(runtime_rom::JT_MOD_BYTE),
            BitAnd => {
                self.gen_bitop(AND);
            }
            BitOr => {
                self.gen_bitop(ORA);
            }
            BitXor => {
                self.gen_bitop(EOR);
            }
            Shl => self.gen_shift(true),
            Shr => self.gen_shift(false),
            _ => {}
        }
    }

    fn gen_call(&mut self, callee: &str, args: &[Expr], line: u32) -> Type {
        let _ = line;
        if let Some(slot) = is_tmp_convention_builtin(callee) {
            if args.len() == 2 {
                self.gen_operands(&args[0], &args[1]);
            }
            self.asm.jsr(slot);
            return Type::Fixed;
        }
        if let Some(slot) = builtin_jump_slot(callee) {
            for (i, arg) in args.iter().enumerate().take(4) {
                self.gen_expr(arg);
                let off = ZP_ARG_STAGE + (i as u16) * 2;
                self.asm.zp(LDA, ZP_TMP0 as u8);
                self.asm.zp(STA, off as u8);
                self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
                self.asm.zp(STA, (off + 1) as u8);
            }
            self.asm.jsr(slot);
            let ret_ty = self.typeck.functions.get(callee).map(|s| s.return_ty.clone()).unwrap_or(Type::Void);
            if ret_ty != Type::Void {
                self.asm.zp(LDA, ZP_RET as u8);
                self.asm.zp(STA, ZP_TMP0 as u8);
                self.asm.zp(LDA, (ZP_RET + 1) as u8);
                self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
            }
            return ret_ty;
        }

        // User-defined function: push args left-to-right onto the soft
        // stack, JSR, then pull the result out of wherever the callee's
        // return width puts it.
        for arg in args {
            self.gen_expr(arg);
            self.push_tmp0();
        }
        self.asm.jsr(format!("fn_{callee}"));
        let sig = self.typeck.functions.get(callee).cloned();
        match sig.map(|s| s.return_ty) {
            Some(Type::Void) | None => Type::Void,
            Some(ret_ty) => {
                if ret_ty.size_of(&self.typeck.structs) <= 1 {
                    self.asm.implied(TAX);
                    self.asm.implied(TXA);
                    self.asm.zp(STA, ZP_TMP0 as u8);
                    self.asm.immediate(LDA, 0);
                    self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
                } else {
                    self.asm.zp(LDA, ZP_RET as u8);
                    self.asm.zp(STA, ZP_TMP0 as u8);
                    self.asm.zp(LDA, (ZP_RET + 1) as u8);
                    self.asm.zp(STA, (ZP_TMP0 + 1) as u8);
                }
                ret_ty
            }
        }
    }

    // ---- statements ----

    fn gen_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) => {
                self.gen_expr(e);
            }
            Stmt::VarDecl(v) => {
                if let Some(init) = &v.init {
                    self.gen_expr(init);
                    self.store_ident(&v.name);
                }
            }
            Stmt::ArrayDecl(a) => {
                if let Some(values) = &a.init {
                    let Some((base_addr, _)) = self.lookup(&a.name) else { return };
                    let elem_size = match self.lookup(&a.name) {
                        Some((_, Type::Array(elem, _))) => elem.size_of(&self.typeck.structs).max(1),
                        _ => 1,
                    };
                    for (i, value_expr) in values.iter().enumerate() {
                        self.gen_expr(value_expr);
                        let elem_addr = base_addr.wrapping_add(i as u16 * elem_size as u16);
                        self.asm.zp(LDA, ZP_TMP0 as u8);
                        self.asm.absolute(STA, elem_addr);
                        if elem_size > 1 {
                            self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
                            self.asm.absolute(STA, elem_addr + 1);
                        }
                    }
                }
            }
            Stmt::Block(stmts) => {
                for s in stmts {
                    self.gen_stmt(s);
                }
            }
            Stmt::If { cond, then_branch, else_branch } => {
                let else_label = self.asm.anon_label();
                let done = self.asm.anon_label();
                self.gen_expr(cond);
                self.asm.zp(LDA, ZP_TMP0 as u8);
                self.asm.branch(BEQ, else_label.clone());
                self.gen_stmt(then_branch);
                if else_branch.is_some() {
                    self.asm.jmp(done.clone());
                }
                self.asm.mark(&else_label);
                if let Some(e) = else_branch {
                    self.gen_stmt(e);
                    self.asm.mark(&done);
                }
            }
            Stmt::While { cond, body } => {
                let top = self.asm.anon_label();
                let done = self.asm.anon_label();
                self.asm.mark(&top);
                self.gen_expr(cond);
                self.asm.zp(LDA, ZP_TMP0 as u8);
                self.asm.branch(BEQ, done.clone());
                self.loop_labels.push((top.clone(), done.clone()));
                self.gen_stmt(body);
                self.loop_labels.pop();
                self.asm.jmp(top);
                self.asm.mark(&done);
            }
            Stmt::DoWhile { body, cond } => {
                let top = self.asm.anon_label();
                let check = self.asm.anon_label();
                let done = self.asm.anon_label();
                self.asm.mark(&top);
                self.loop_labels.push((check.clone(), done.clone()));
                self.gen_stmt(body);
                self.loop_labels.pop();
                self.asm.mark(&check);
                self.gen_expr(cond);
                self.asm.zp(LDA, ZP_TMP0 as u8);
                self.asm.branch(BNE, top);
                self.asm.mark(&done);
            }
            Stmt::For { init, cond, step, body } => {
                let top = self.asm.anon_label();
                let continue_label = self.asm.anon_label();
                let done = self.asm.anon_label();
                if let Some(init) = init {
                    self.gen_stmt(init);
                }
                self.asm.mark(&top);
                if let Some(cond) = cond {
                    self.gen_expr(cond);
                    self.asm.zp(LDA, ZP_TMP0 as u8);
                    self.asm.branch(BEQ, done.clone());
                }
                self.loop_labels.push((continue_label.clone(), done.clone()));
                self.gen_stmt(body);
                self.loop_labels.pop();
                self.asm.mark(&continue_label);
                if let Some(step) = step {
                    self.gen_expr(step);
                }
                self.asm.jmp(top);
                self.asm.mark(&done);
            }
            Stmt::Switch { scrutinee, cases } => {
                self.gen_expr(scrutinee);
                self.push_tmp0();
                let done = self.asm.anon_label();
                let mut case_bodies = Vec::new();
                for case in cases {
                    let body_label = self.asm.anon_label();
                    case_bodies.push(body_label.clone());
                    if let Some(value) = case.value {
                        self.pop_into_tmp0();
                        self.push_tmp0();
                        self.asm.zp(LDA, ZP_TMP0 as u8);
                        self.asm.immediate(CMP, (value & 0xff) as u8);
                        self.asm.branch(BEQ, body_label);
                    }
                }
                // no match: jump to default if present, else done.
                if let Some(default_idx) = cases.iter().position(|c| c.value.is_none()) {
                    self.asm.jmp(case_bodies[default_idx].clone());
                } else {
                    self.asm.jmp(done.clone());
                }
                self.loop_labels.push((done.clone(), done.clone()));
                for (case, label) in cases.iter().zip(case_bodies.iter()) {
                    self.asm.mark(label);
                    for s in &case.body {
                        self.gen_stmt(s);
                    }
                }
                self.loop_labels.pop();
                self.asm.mark(&done);
                self.pop_into_tmp0(); // balance the scrutinee push above
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.gen_expr(value);
                }
                self.gen_return();
            }
            Stmt::Break => {
                if let Some((_, brk)) = self.loop_labels.last().cloned() {
                    self.asm.jmp(brk);
                }
            }
            Stmt::Continue => {
                if let Some((cont, _)) = self.loop_labels.last().cloned() {
                    self.asm.jmp(cont);
                }
            }
            Stmt::Asm(_) => {
                // No textual 6502 assembler exists in this backend
                // (asm.rs only emits structured opcodes); inline
                // `asm("...")` is accepted syntactically and compiles
                // to nothing. DESIGN.md records this as a known gap.
            }
        }
    }

    fn gen_return(&mut self) {
        if self.current_fn_return_ty.size_of(&self.typeck.structs) <= 1 {
            self.asm.zp(LDA, ZP_TMP0 as u8);
        } else {
            self.asm.zp(LDA, ZP_TMP0 as u8);
            self.asm.zp(STA, ZP_RET as u8);
            self.asm.zp(LDA, (ZP_TMP0 + 1) as u8);
            self.asm.zp(STA, (ZP_RET + 1) as u8);
        }
        if self.current_fn_interrupt {
            self.asm.implied(RTI);
        } else {
            self.asm.implied(RTS);
        }
    }

    fn gen_function(&mut self, func: &FunctionDecl, next_local: u16) {
        let (locals, _) = layout_locals(func, self.typeck, next_local);
        self.locals = locals;
        self.current_fn_return_ty = resolve_type(&func.return_ty, self.typeck);
        self.current_fn_interrupt = func.interrupt;
        self.loop_labels.clear();

        self.asm.mark(&format!("fn_{}", func.name));
        if func.interrupt {
            self.asm.implied(PHA);
            self.asm.implied(TXA);
            self.asm.implied(PHA);
            self.asm.implied(TYA);
            self.asm.implied(PHA);
        }
        // Pop args in reverse declaration order (last pushed = last
        // param), matching the caller's left-to-right push order.
        for param in func.params.iter().rev() {
            self.pop_into_tmp0();
            self.store_ident(&param.name);
        }
        for stmt in &func.body {
            self.gen_stmt(stmt);
        }
        if func.interrupt {
            self.asm.implied(PLA);
            self.asm.implied(TAY);
            self.asm.implied(PLA);
            self.asm.implied(TAX);
            self.asm.implied(PLA);
            self.asm.implied(RTI);
        } else {
            // Falling off the end of a void function returns normally;
            // a value-returning function falling off the end is a
            // typeck-reported bug in the source, not codegen's to fix.
            self.asm.implied(RTS);
        }
    }
}

/// Compiles a type-checked program into machine code based at
/// `runtime_rom::CODE_BASE`. Bootstraps by calling `main`, then parks
/// the CPU at the runtime ROM's editor-entry spin loop — there is no
/// 6502-resident command shell to fall back into once a compiled
/// program finishes (the line editor lives in `basic.rs`, host-side).
pub fn generate(program: &Program, typeck: &TypeckResult) -> CodeGenResult {
    let globals_layout = layout_globals(program, typeck);
    let mut next_local = globals_layout.next;

    let mut gen = Codegen {
        asm: Asm::new(),
        typeck,
        globals: globals_layout.globals,
        locals: HashMap::new(),
        current_fn_return_ty: Type::Void,
        current_fn_interrupt: false,
        loop_labels: Vec::new(),
    };

    gen.asm.mark("program_entry");
    gen.asm.jsr("fn_main");
    gen.asm.jmp(runtime_rom::JT_EDITOR_ENTRY);

    gen.emit_shared_runtime();

    for decl in &program.decls {
        if let Decl::Function(f) = decl {
            let (_, end) = layout_locals(f, typeck, next_local);
            gen.gen_function(f, next_local);
            next_local = end;
        }
    }

    let mut symbols = HashMap::new();
    for (name, slot) in &gen.globals {
        symbols.insert(name.clone(), slot.addr);
    }
    for decl in &program.decls {
        if let Decl::Function(f) = decl {
            if let Some(off) = gen.asm.label_offset(&format!("fn_{}", f.name)) {
                symbols.insert(f.name.clone(), runtime_rom::CODE_BASE.wrapping_add(off as u16));
            }
        }
    }

    let (code, line_map) = gen.asm.finish(runtime_rom::CODE_BASE);
    CodeGenResult { code, base: runtime_rom::CODE_BASE, symbols, line_map }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lexer::Lexer;
    use crate::compiler::parser::Parser;
    use crate::compiler::typeck;

    fn compile(src: &str) -> CodeGenResult {
        let (tokens, lex_diags) = Lexer::new(src).tokenize();
        assert!(lex_diags.is_empty());
        let (program, parse_diags) = Parser::new(tokens).parse_program();
        assert!(parse_diags.is_empty());
        let result = typeck::check(&program);
        assert!(result.errors.is_empty(), "unexpected typeck errors: {:?}", result.errors.iter().map(|d| &d.message).collect::<Vec<_>>());
        generate(&program, &result)
    }

    #[test]
    fn scenario_six_places_x_at_a_known_address() {
        let result = compile("byte x; void main() { x = 6 * 7; }");
        assert!(result.symbols.contains_key("x"));
        assert!(result.symbols.contains_key("main"));
        assert!(!result.code.is_empty());
    }

    #[test]
    fn emits_a_line_map_entry_for_every_statement_line() {
        let result = compile("byte x; void main() {\n x = 1;\n x = 2;\n}");
        assert!(result.line_map.len() >= 2);
    }

    #[test]
    fn user_function_calls_thread_through_the_soft_stack() {
        let result = compile("byte add(byte a, byte b) { return a + b; } void main() { byte x; x = add(2, 3); }");
        assert!(result.symbols.contains_key("add"));
    }

    #[test]
    fn calls_a_builtin_without_crashing_codegen() {
        let result = compile("void main() { print_char('A'); wait_key(); }");
        assert!(!result.code.is_empty());
    }
}

// This file is part of nova64.
// Grounded on spec.md §4.11's type-checker paragraph in full (two-pass:
// collect names, then check bodies) and the full diagnostic-category
// list it enumerates.

use std::collections::HashMap;

use super::ast::*;
use super::types::{EnumLayout, StructField, StructLayout, Type};

pub struct Diagnostic {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

fn diag(line: u32, message: impl Into<String>) -> Diagnostic {
    Diagnostic { line, column: 0, message: message.into() }
}

#[derive(Clone, Debug)]
pub struct FunctionSig {
    pub return_ty: Type,
    pub params: Vec<Type>,
}

pub struct TypeckResult {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub structs: HashMap<String, StructLayout>,
    pub enums: HashMap<String, EnumLayout>,
    pub globals: HashMap<String, Type>,
    pub functions: HashMap<String, FunctionSig>,
}

struct Checker {
    structs: HashMap<String, StructLayout>,
    enums: HashMap<String, EnumLayout>,
    globals: HashMap<String, Type>,
    functions: HashMap<String, FunctionSig>,
    scopes: Vec<HashMap<String, Type>>,
    current_return_ty: Type,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

/// Signatures for the runtime ROM's published jump-table routines
/// (spec.md §4.11's helper list), pre-seeded so a program can call them
/// like any other function without an extern declaration. `mul-byte`,
/// `mul-int`, `div-byte`, `div-int` and `mod-byte` are not in this table:
/// those are never called by name, only implicitly by the `*`/`/`/`%`
/// operators (see codegen.rs).
fn builtin_functions() -> HashMap<String, FunctionSig> {
    let byte_ptr = Type::Pointer(Box::new(Type::Byte));
    let sig = |return_ty: Type, params: Vec<Type>| FunctionSig { return_ty, params };
    HashMap::from([
        ("print".to_string(), sig(Type::Void, vec![byte_ptr.clone()])),
        ("print_char".to_string(), sig(Type::Void, vec![Type::Byte])),
        ("get_key".to_string(), sig(Type::Byte, vec![])),
        ("wait_key".to_string(), sig(Type::Byte, vec![])),
        ("vsync".to_string(), sig(Type::Void, vec![])),
        ("memcpy".to_string(), sig(Type::Void, vec![byte_ptr.clone(), byte_ptr.clone(), Type::Byte])),
        ("memset".to_string(), sig(Type::Void, vec![byte_ptr.clone(), Type::Byte, Type::Byte])),
        ("gfx_cmd".to_string(), sig(Type::Void, vec![byte_ptr.clone(), Type::Byte])),
        ("sprite_cmd".to_string(), sig(Type::Void, vec![byte_ptr, Type::Byte])),
        ("play_sound".to_string(), sig(Type::Void, vec![Type::Byte, Type::Int, Type::Byte])),
        ("music_play".to_string(), sig(Type::Void, vec![Type::Byte])),
        ("music_stop".to_string(), sig(Type::Void, vec![])),
        ("set_volume".to_string(), sig(Type::Void, vec![Type::Byte])),
        ("fixed_mul".to_string(), sig(Type::Fixed, vec![Type::Fixed, Type::Fixed])),
        ("fixed_div".to_string(), sig(Type::Fixed, vec![Type::Fixed, Type::Fixed])),
    ])
}

pub fn check(program: &Program) -> TypeckResult {
    let mut checker = Checker {
        structs: HashMap::new(),
        enums: HashMap::new(),
        globals: HashMap::new(),
        functions: builtin_functions(),
        scopes: Vec::new(),
        current_return_ty: Type::Void,
        errors: Vec::new(),
        warnings: Vec::new(),
    };
    checker.collect_names(program);
    checker.check_bodies(program);
    TypeckResult {
        errors: checker.errors,
        warnings: checker.warnings,
        structs: checker.structs,
        enums: checker.enums,
        globals: checker.globals,
        functions: checker.functions,
    }
}

impl Checker {
    fn resolve(&self, ty: &Type) -> Type {
        match ty {
            Type::Named(name) => {
                if self.structs.contains_key(name) {
                    Type::Struct(name.clone())
                } else if self.enums.contains_key(name) {
                    Type::Enum(name.clone())
                } else {
                    Type::Struct(name.clone())
                }
            }
            Type::Pointer(inner) => Type::Pointer(Box::new(self.resolve(inner))),
            Type::Array(inner, n) => Type::Array(Box::new(self.resolve(inner)), *n),
            other => other.clone(),
        }
    }

    // ---- pass 1: collect declared names ----

    fn collect_names(&mut self, program: &Program) {
        for decl in &program.decls {
            if let Decl::Struct(s) = decl {
                // Registered with a provisional empty layout first so
                // self-referential pointer fields (`struct Node { Node* next; }`)
                // can resolve during the field pass below.
                self.structs.insert(s.name.clone(), StructLayout { name: s.name.clone(), fields: Vec::new(), size: 0 });
            }
        }
        for decl in &program.decls {
            if let Decl::Enum(e) = decl {
                let mut members = Vec::new();
                let mut next = 0i64;
                for (name, explicit) in &e.members {
                    let value = explicit.unwrap_or(next);
                    members.push((name.clone(), value));
                    next = value + 1;
                }
                for (name, _) in &e.members {
                    self.globals.insert(name.clone(), Type::Enum(e.name.clone()));
                }
                self.enums.insert(e.name.clone(), EnumLayout { name: e.name.clone(), members });
            }
        }
        for decl in &program.decls {
            if let Decl::Struct(s) = decl {
                let mut fields = Vec::new();
                let mut offset = 0u32;
                for (name, ty) in &s.fields {
                    let resolved = self.resolve(ty);
                    let size = resolved.size_of(&self.structs);
                    fields.push(StructField { name: name.clone(), ty: resolved, offset });
                    offset += size;
                }
                self.structs.insert(s.name.clone(), StructLayout { name: s.name.clone(), fields, size: offset });
            }
        }
        for decl in &program.decls {
            match decl {
                Decl::GlobalVar(v) => {
                    if self.globals.contains_key(&v.name) {
                        self.errors.push(diag(v.line, format!("duplicate declaration of '{}'", v.name)));
                    } else {
                        self.globals.insert(v.name.clone(), self.resolve(&v.ty));
                    }
                }
                Decl::GlobalArray(a) => {
                    let elem = self.resolve(&a.elem_ty);
                    let count = a.size.unwrap_or_else(|| a.init.as_ref().map(|v| v.len() as u32).unwrap_or(0));
                    if self.globals.contains_key(&a.name) {
                        self.errors.push(diag(a.line, format!("duplicate declaration of '{}'", a.name)));
                    } else {
                        self.globals.insert(a.name.clone(), Type::Array(Box::new(elem), count));
                    }
                }
                Decl::Function(f) => {
                    if self.functions.contains_key(&f.name) {
                        self.errors.push(diag(f.line, format!("duplicate declaration of '{}'", f.name)));
                    } else {
                        let params = f.params.iter().map(|p| self.resolve(&p.ty)).collect();
                        self.functions.insert(f.name.clone(), FunctionSig { return_ty: self.resolve(&f.return_ty), params });
                    }
                }
                _ => {}
            }
        }
    }

    // ---- pass 2: check bodies ----

    fn check_bodies(&mut self, program: &Program) {
        for decl in &program.decls {
            if let Decl::Function(f) = decl {
                self.scopes.clear();
                self.scopes.push(HashMap::new());
                self.current_return_ty = self.resolve(&f.return_ty);
                for p in &f.params {
                    self.declare_local(&p.name, self.resolve(&p.ty), f.line);
                }
                for stmt in &f.body {
                    self.check_stmt(stmt);
                }
            }
            if let Decl::GlobalVar(v) = decl {
                if let Some(init) = &v.init {
                    let init_ty = self.check_expr(init);
                    self.check_assignable(&self.resolve(&v.ty), &init_ty, v.line, &v.name);
                }
            }
        }
    }

    fn declare_local(&mut self, name: &str, ty: Type, line: u32) {
        let scope = self.scopes.last_mut().expect("scope stack never empty while checking a body");
        if scope.contains_key(name) {
            self.errors.push(diag(line, format!("duplicate declaration of '{}'", name)));
        } else {
            scope.insert(name.to_string(), ty);
        }
    }

    fn lookup(&self, name: &str) -> Option<Type> {
        for scope in self.scopes.iter().rev() {
            if let Some(ty) = scope.get(name) {
                return Some(ty.clone());
            }
        }
        self.globals.get(name).cloned()
    }

    fn check_assignable(&mut self, target: &Type, value: &Type, line: u32, what: &str) {
        if value.implicitly_converts_to(target) {
            return;
        }
        if value.is_narrowing_integral(target) {
            self.warnings.push(diag(line, format!("narrowing assignment to '{}' loses precision", what)));
            return;
        }
        self.errors.push(diag(line, format!("cannot assign value of incompatible type to '{}'", what)));
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) => {
                self.check_expr(e);
            }
            Stmt::VarDecl(v) => {
                let ty = self.resolve(&v.ty);
                if let Some(init) = &v.init {
                    let init_ty = self.check_expr(init);
                    self.check_assignable(&ty, &init_ty, v.line, &v.name);
                }
                self.declare_local(&v.name, ty, v.line);
            }
            Stmt::ArrayDecl(a) => {
                let elem = self.resolve(&a.elem_ty);
                let count = a.size.unwrap_or_else(|| a.init.as_ref().map(|v| v.len() as u32).unwrap_or(0));
                if let Some(values) = &a.init {
                    for value_expr in values {
                        let vt = self.check_expr(value_expr);
                        self.check_assignable(&elem, &vt, a.line, &a.name);
                    }
                }
                self.declare_local(&a.name, Type::Array(Box::new(elem), count), a.line);
            }
            Stmt::Block(stmts) => {
                self.scopes.push(HashMap::new());
                for s in stmts {
                    self.check_stmt(s);
                }
                self.scopes.pop();
            }
            Stmt::If { cond, then_branch, else_branch } => {
                let ct = self.check_expr(cond);
                if ct != Type::Bool {
                    self.errors.push(diag(cond.line(), "if condition must be bool"));
                }
                self.check_stmt(then_branch);
                if let Some(e) = else_branch {
                    self.check_stmt(e);
                }
            }
            Stmt::While { cond, body } => {
                let ct = self.check_expr(cond);
                if ct != Type::Bool {
                    self.errors.push(diag(cond.line(), "while condition must be bool"));
                }
                self.check_stmt(body);
            }
            Stmt::DoWhile { body, cond } => {
                self.check_stmt(body);
                let ct = self.check_expr(cond);
                if ct != Type::Bool {
                    self.errors.push(diag(cond.line(), "do-while condition must be bool"));
                }
            }
            Stmt::For { init, cond, step, body } => {
                self.scopes.push(HashMap::new());
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    let ct = self.check_expr(cond);
                    if ct != Type::Bool {
                        self.errors.push(diag(cond.line(), "for condition must be bool"));
                    }
                }
                if let Some(step) = step {
                    self.check_expr(step);
                }
                self.check_stmt(body);
                self.scopes.pop();
            }
            Stmt::Switch { scrutinee, cases } => {
                self.check_expr(scrutinee);
                for case in cases {
                    self.scopes.push(HashMap::new());
                    for s in &case.body {
                        self.check_stmt(s);
                    }
                    self.scopes.pop();
                }
            }
            Stmt::Return { value, line } => {
                match (value, self.current_return_ty.clone()) {
                    (None, Type::Void) => {}
                    (None, _) => self.errors.push(diag(*line, "missing return value in non-void function")),
                    (Some(_), Type::Void) => self.errors.push(diag(*line, "returning a value from a void function")),
                    (Some(e), ret_ty) => {
                        let vt = self.check_expr(e);
                        self.check_assignable(&ret_ty, &vt, *line, "return value");
                    }
                }
            }
            Stmt::Break | Stmt::Continue | Stmt::Asm(_) => {}
        }
    }

    fn check_expr(&mut self, expr: &Expr) -> Type {
        match expr {
            Expr::IntLit(_) => Type::Int,
            Expr::HexLit(_) | Expr::BinLit(_) => Type::Uint,
            Expr::FixedLit(_) => Type::Fixed,
            Expr::BoolLit(_) => Type::Bool,
            Expr::StringLit(_) => Type::Pointer(Box::new(Type::Byte)),
            Expr::CharLit(_) => Type::Byte,
            Expr::Ident(name, line) => match self.lookup(name) {
                Some(ty) => ty,
                None => {
                    self.errors.push(diag(*line, format!("undeclared identifier '{}'", name)));
                    Type::Void
                }
            },
            Expr::Unary { op, expr: inner, line } => {
                let ty = self.check_expr(inner);
                match op {
                    UnaryOp::Neg => {
                        if !ty.is_numeric() {
                            self.errors.push(diag(*line, "unary '-' requires a numeric operand"));
                        }
                        ty
                    }
                    UnaryOp::Not => {
                        if ty != Type::Bool {
                            self.errors.push(diag(*line, "'!' requires a bool operand"));
                        }
                        Type::Bool
                    }
                    UnaryOp::BitNot => {
                        if !ty.is_integral() {
                            self.errors.push(diag(*line, "'~' requires an integral operand"));
                        }
                        ty
                    }
                    UnaryOp::AddrOf => Type::Pointer(Box::new(ty)),
                    UnaryOp::Deref => match ty {
                        Type::Pointer(inner) => *inner,
                        _ => {
                            self.errors.push(diag(*line, "'*' requires a pointer operand"));
                            Type::Void
                        }
                    },
                    UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => ty,
                }
            }
            Expr::Binary { op, lhs, rhs, line } => self.check_binary(op, lhs, rhs, *line),
            Expr::Call { callee, args, line } => self.check_call(callee, args, *line),
            Expr::Index { base, index, line } => {
                let bt = self.check_expr(base);
                let it = self.check_expr(index);
                if !it.is_integral() {
                    self.errors.push(diag(*line, "array index must be integral"));
                }
                match bt {
                    Type::Array(elem, _) => *elem,
                    Type::Pointer(elem) => *elem,
                    _ => {
                        self.errors.push(diag(*line, "indexing a non-array type"));
                        Type::Void
                    }
                }
            }
            Expr::Member { base, field, arrow, line } => {
                let bt = self.check_expr(base);
                let struct_name = if *arrow {
                    match &bt {
                        Type::Pointer(inner) if inner.is_struct() => match inner.as_ref() {
                            Type::Struct(name) => Some(name.clone()),
                            _ => None,
                        },
                        _ => {
                            self.errors.push(diag(*line, "'->' on a non-pointer-to-struct"));
                            None
                        }
                    }
                } else {
                    match &bt {
                        Type::Struct(name) => Some(name.clone()),
                        _ => {
                            self.errors.push(diag(*line, "member access on a non-struct type"));
                            None
                        }
                    }
                };
                match struct_name.and_then(|name| self.structs.get(&name).cloned()) {
                    Some(layout) => match layout.field(field) {
                        Some(f) => f.ty.clone(),
                        None => {
                            self.errors.push(diag(*line, format!("no field '{}' on struct '{}'", field, layout.name)));
                            Type::Void
                        }
                    },
                    None => Type::Void,
                }
            }
            Expr::Assign { target, op, value, line } => {
                let tt = self.check_expr(target);
                let vt = self.check_expr(value);
                if op.is_some() && !tt.is_numeric() {
                    self.errors.push(diag(*line, "compound assignment requires a numeric target"));
                }
                self.check_assignable(&tt, &vt, *line, "assignment target");
                tt
            }
            Expr::Sizeof { ty } => {
                let _ = self.resolve(ty);
                Type::Uint
            }
            Expr::Cast { ty, expr: inner, .. } => {
                self.check_expr(inner);
                self.resolve(ty)
            }
        }
    }

    fn check_binary(&mut self, op: &BinaryOp, lhs: &Expr, rhs: &Expr, line: u32) -> Type {
        let lt = self.check_expr(lhs);
        let rt = self.check_expr(rhs);
        use BinaryOp::*;
        match op {
            Add | Sub | Mul | Div | Mod => {
                if !lt.is_numeric() || !rt.is_numeric() {
                    self.errors.push(diag(line, "arithmetic on non-numeric operands"));
                }
                if lt.size_of(&self.structs) >= rt.size_of(&self.structs) { lt } else { rt }
            }
            Shl | Shr | BitAnd | BitOr | BitXor => {
                if !lt.is_integral() || !rt.is_integral() {
                    self.errors.push(diag(line, "bitwise operator on non-integral operands"));
                }
                lt
            }
            And | Or => {
                if lt != Type::Bool || rt != Type::Bool {
                    self.errors.push(diag(line, "logical operator requires bool operands"));
                }
                Type::Bool
            }
            Eq | Ne => {
                if let (Type::Enum(a), Type::Enum(b)) = (&lt, &rt) {
                    if a != b {
                        self.errors.push(diag(line, format!("comparing values of different enum types '{}' and '{}'", a, b)));
                    }
                }
                Type::Bool
            }
            Lt | Le | Gt | Ge => {
                if !lt.is_numeric() || !rt.is_numeric() {
                    self.errors.push(diag(line, "relational operator on non-numeric operands"));
                }
                Type::Bool
            }
        }
    }

    fn check_call(&mut self, callee: &str, args: &[Expr], line: u32) -> Type {
        let arg_types: Vec<Type> = args.iter().map(|a| self.check_expr(a)).collect();
        let Some(sig) = self.functions.get(callee).cloned() else {
            self.errors.push(diag(line, format!("calling undeclared function '{}'", callee)));
            return Type::Void;
        };
        if sig.params.len() != arg_types.len() {
            self.errors.push(diag(line, format!("'{}' expects {} argument(s), found {}", callee, sig.params.len(), arg_types.len())));
        } else {
            for (i, (param_ty, arg_ty)) in sig.params.iter().zip(arg_types.iter()).enumerate() {
                if !arg_ty.implicitly_converts_to(param_ty) && arg_ty != param_ty {
                    self.errors.push(diag(line, format!("argument {} to '{}' has the wrong type", i + 1, callee)));
                }
            }
        }
        sig.return_ty
    }
}

#[cfg(test)]
mod tests {
    use super::super::lexer::Lexer;
    use super::super::parser::Parser;
    use super::*;

    fn check_src(src: &str) -> TypeckResult {
        let (tokens, _) = Lexer::new(src).tokenize();
        let (program, _) = Parser::new(tokens).parse_program();
        check(&program)
    }

    #[test]
    fn flags_undeclared_identifier() {
        let result = check_src("void main() { x = 1; }");
        assert!(result.errors.iter().any(|d| d.message.contains("undeclared")));
    }

    #[test]
    fn accepts_scenario_six_program_with_no_errors() {
        let result = check_src("byte x; void main() { x = 6 * 7; }");
        assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors.iter().map(|d| &d.message).collect::<Vec<_>>());
    }

    #[test]
    fn flags_wrong_argument_count() {
        let result = check_src("byte add(byte a, byte b) { return a + b; } void main() { add(1); }");
        assert!(result.errors.iter().any(|d| d.message.contains("expects")));
    }

    #[test]
    fn flags_returning_value_from_void_function() {
        let result = check_src("void main() { return 1; }");
        assert!(result.errors.iter().any(|d| d.message.contains("void function")));
    }

    #[test]
    fn flags_cross_enum_comparison() {
        let result = check_src("enum A { X }; enum B { Y }; void main() { if (X == Y) {} }");
        assert!(result.errors.iter().any(|d| d.message.contains("different enum")));
    }

    #[test]
    fn narrowing_assignment_is_a_warning_not_an_error() {
        let result = check_src("void main() { int a; byte b; b = a; }");
        assert!(result.errors.is_empty());
        assert!(result.warnings.iter().any(|d| d.message.contains("narrowing")));
    }

    #[test]
    fn calls_a_runtime_rom_builtin_without_an_extern_declaration() {
        let result = check_src("void main() { print_char('A'); wait_key(); }");
        assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors.iter().map(|d| &d.message).collect::<Vec<_>>());
    }
}

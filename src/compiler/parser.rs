// This file is part of nova64.
// Grounded on spec.md §4.11's parser paragraph in full: recursive-descent
// with Pratt-style precedence, the exact precedence ladder it lists, and
// per-statement/declaration error recovery via synchronization points.

use super::ast::*;
use super::token::{Token, TokenKind};
use super::types::Type;

pub struct Diagnostic {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

type PResult<T> = Result<T, ()>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0, diagnostics: Vec::new() }
    }

    pub fn parse_program(mut self) -> (Program, Vec<Diagnostic>) {
        let mut decls = Vec::new();
        while !self.at(TokenKind::Eof) {
            match self.parse_decl() {
                Ok(decl) => decls.push(decl),
                Err(()) => self.synchronize_top_level(),
            }
        }
        (Program { decls }, self.diagnostics)
    }

    // ---- token stream helpers ----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn at(&self, kind: TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(&kind)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check_advance(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> PResult<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            self.error(&format!("expected {}, found '{}'", what, self.peek().text));
            Err(())
        }
    }

    fn expect_identifier(&mut self) -> PResult<String> {
        if self.at(TokenKind::Identifier) {
            Ok(self.advance().text)
        } else {
            self.error("expected identifier");
            Err(())
        }
    }

    fn error(&mut self, message: &str) {
        let tok = self.peek();
        self.diagnostics.push(Diagnostic { line: tok.line, column: tok.column, message: message.to_string() });
    }

    /// Skips tokens until a synchronization point per spec.md §4.11:
    /// semicolon, closing brace, or a top-level keyword, so one bad
    /// declaration doesn't cascade into spurious downstream errors.
    fn synchronize_top_level(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Eof => return,
                TokenKind::Semicolon | TokenKind::RBrace => {
                    self.advance();
                    return;
                }
                TokenKind::KwStruct | TokenKind::KwEnum | TokenKind::KwByte | TokenKind::KwInt | TokenKind::KwUint
                | TokenKind::KwBool | TokenKind::KwFixed | TokenKind::KwUfixed | TokenKind::KwVoid
                | TokenKind::KwResident | TokenKind::KwInterrupt | TokenKind::PpInclude | TokenKind::PpDefine
                | TokenKind::PpAsset | TokenKind::PpPragma => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn synchronize_stmt(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Eof | TokenKind::RBrace => return,
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ---- types ----

    fn at_type_start(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::KwByte
                | TokenKind::KwInt
                | TokenKind::KwUint
                | TokenKind::KwBool
                | TokenKind::KwFixed
                | TokenKind::KwUfixed
                | TokenKind::KwVoid
                | TokenKind::KwStruct
                | TokenKind::KwEnum
        )
    }

    fn parse_base_type(&mut self) -> PResult<Type> {
        let ty = match self.peek_kind().clone() {
            TokenKind::KwByte => Type::Byte,
            TokenKind::KwInt => Type::Int,
            TokenKind::KwUint => Type::Uint,
            TokenKind::KwBool => Type::Bool,
            TokenKind::KwFixed => Type::Fixed,
            TokenKind::KwUfixed => Type::Ufixed,
            TokenKind::KwVoid => Type::Void,
            TokenKind::KwStruct => {
                self.advance();
                let name = self.expect_identifier()?;
                return Ok(Type::Named(name));
            }
            TokenKind::KwEnum => {
                self.advance();
                let name = self.expect_identifier()?;
                return Ok(Type::Named(name));
            }
            TokenKind::Identifier => {
                let name = self.peek().text.clone();
                self.advance();
                return Ok(Type::Named(name));
            }
            _ => {
                self.error("expected a type name");
                return Err(());
            }
        };
        self.advance();
        Ok(ty)
    }

    /// Parses a base type plus any trailing `*` pointer markers.
    fn parse_type(&mut self) -> PResult<Type> {
        let mut ty = self.parse_base_type()?;
        while self.check_advance(TokenKind::Star) {
            ty = Type::Pointer(Box::new(ty));
        }
        Ok(ty)
    }

    // ---- top-level declarations ----

    fn parse_decl(&mut self) -> PResult<Decl> {
        match self.peek_kind() {
            TokenKind::PpInclude => {
                let text = self.advance().text;
                Ok(Decl::Preproc(PreprocDirective::Include(text)))
            }
            TokenKind::PpDefine => {
                let text = self.advance().text;
                let mut parts = text.splitn(2, char::is_whitespace);
                let name = parts.next().unwrap_or("").to_string();
                let value = parts.next().unwrap_or("").trim().to_string();
                Ok(Decl::Preproc(PreprocDirective::Define(name, value)))
            }
            TokenKind::PpAsset => {
                let text = self.advance().text;
                let mut parts = text.splitn(2, char::is_whitespace);
                let name = parts.next().unwrap_or("").to_string();
                let path = parts.next().unwrap_or("").trim().to_string();
                Ok(Decl::Preproc(PreprocDirective::Asset(name, path)))
            }
            TokenKind::PpPragma => {
                let text = self.advance().text;
                Ok(Decl::Preproc(PreprocDirective::Pragma(text)))
            }
            TokenKind::KwStruct => self.parse_struct_decl(),
            TokenKind::KwEnum => self.parse_enum_decl(),
            TokenKind::KwResident | TokenKind::KwInterrupt => self.parse_function_or_var(),
            _ if self.at_type_start() || self.at(TokenKind::Identifier) => self.parse_function_or_var(),
            _ => {
                self.error("expected a declaration");
                Err(())
            }
        }
    }

    fn parse_struct_decl(&mut self) -> PResult<Decl> {
        let line = self.peek().line;
        self.advance(); // struct
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut fields = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            let ty = self.parse_type()?;
            // `fixed x, y;` - a type shared by several field names.
            loop {
                let field_name = self.expect_identifier()?;
                fields.push((field_name, ty.clone()));
                if !self.check_advance(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Semicolon, "';'")?;
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        self.check_advance(TokenKind::Semicolon);
        Ok(Decl::Struct(StructDecl { name, fields, line }))
    }

    fn parse_enum_decl(&mut self) -> PResult<Decl> {
        let line = self.peek().line;
        self.advance(); // enum
        let name = self.expect_identifier()?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut members = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            let member_name = self.expect_identifier()?;
            let value = if self.check_advance(TokenKind::Eq) {
                Some(self.parse_const_i64()?)
            } else {
                None
            };
            members.push((member_name, value));
            if !self.check_advance(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        self.check_advance(TokenKind::Semicolon);
        Ok(Decl::Enum(EnumDecl { name, members, line }))
    }

    fn parse_const_i64(&mut self) -> PResult<i64> {
        let negative = self.check_advance(TokenKind::Minus);
        let value = match self.peek_kind().clone() {
            TokenKind::IntLiteral(v) | TokenKind::HexLiteral(v) | TokenKind::BinLiteral(v) => {
                self.advance();
                v
            }
            _ => {
                self.error("expected a constant integer");
                return Err(());
            }
        };
        Ok(if negative { -value } else { value })
    }

    /// Disambiguates a function decl from a global var/array decl by
    /// scanning past the type and name for `(`.
    fn parse_function_or_var(&mut self) -> PResult<Decl> {
        let line = self.peek().line;
        let resident = self.check_advance(TokenKind::KwResident);
        let interrupt = self.check_advance(TokenKind::KwInterrupt);
        let ty = self.parse_type()?;
        let name = self.expect_identifier()?;

        if self.at(TokenKind::LParen) {
            return self.parse_function_tail(name, ty, resident, interrupt, line).map(Decl::Function);
        }

        if self.check_advance(TokenKind::LBracket) {
            let size = if !self.at(TokenKind::RBracket) {
                Some(self.parse_const_i64()? as u32)
            } else {
                None
            };
            self.expect(TokenKind::RBracket, "']'")?;
            let init = if self.check_advance(TokenKind::Eq) {
                self.expect(TokenKind::LBrace, "'{'")?;
                let mut values = Vec::new();
                while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
                    values.push(self.parse_expr()?);
                    if !self.check_advance(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace, "'}'")?;
                Some(values)
            } else {
                None
            };
            self.expect(TokenKind::Semicolon, "';'")?;
            return Ok(Decl::GlobalArray(ArrayDecl { name, elem_ty: ty, size, init, line }));
        }

        let init = if self.check_advance(TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(Decl::GlobalVar(VarDecl { name, ty, init, line }))
    }

    fn parse_function_tail(&mut self, name: String, return_ty: Type, resident: bool, interrupt: bool, line: u32) -> PResult<FunctionDecl> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        while !self.at(TokenKind::RParen) && !self.at(TokenKind::Eof) {
            let ty = self.parse_type()?;
            let pname = self.expect_identifier()?;
            params.push(Param { name: pname, ty });
            if !self.check_advance(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let body = self.parse_block_stmts()?;
        Ok(FunctionDecl { name, return_ty, params, body, resident, interrupt, line })
    }

    // ---- statements ----

    fn parse_block_stmts(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(()) => self.synchronize_stmt(),
            }
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        match self.peek_kind() {
            TokenKind::LBrace => {
                self.advance();
                Ok(Stmt::Block(self.parse_block_stmts()?))
            }
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwWhile => self.parse_while(),
            TokenKind::KwDo => self.parse_do_while(),
            TokenKind::KwFor => self.parse_for(),
            TokenKind::KwSwitch => self.parse_switch(),
            TokenKind::KwReturn => {
                let line = self.peek().line;
                self.advance();
                let value = if self.at(TokenKind::Semicolon) { None } else { Some(self.parse_expr()?) };
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Stmt::Return { value, line })
            }
            TokenKind::KwBreak => {
                self.advance();
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Stmt::Break)
            }
            TokenKind::KwContinue => {
                self.advance();
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Stmt::Continue)
            }
            TokenKind::KwAsm => {
                self.advance();
                self.expect(TokenKind::LParen, "'('")?;
                let text = if let TokenKind::StringLiteral(s) = self.peek_kind().clone() {
                    self.advance();
                    s
                } else {
                    self.error("expected a string literal in asm(...)");
                    return Err(());
                };
                self.expect(TokenKind::RParen, "')'")?;
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Stmt::Asm(text))
            }
            _ if self.at_type_start() => self.parse_local_decl(),
            TokenKind::Identifier if self.looks_like_local_decl() => self.parse_local_decl(),
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semicolon, "';'")?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    /// `Foo x;` (a struct/enum-typed local) needs a lookahead: identifier
    /// followed by another identifier is a declaration, not an expression.
    fn looks_like_local_decl(&self) -> bool {
        matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokenKind::Identifier))
    }

    fn parse_local_decl(&mut self) -> PResult<Stmt> {
        let line = self.peek().line;
        let ty = self.parse_type()?;
        let name = self.expect_identifier()?;
        if self.check_advance(TokenKind::LBracket) {
            let size = if !self.at(TokenKind::RBracket) {
                Some(self.parse_const_i64()? as u32)
            } else {
                None
            };
            self.expect(TokenKind::RBracket, "']'")?;
            let init = if self.check_advance(TokenKind::Eq) {
                self.expect(TokenKind::LBrace, "'{'")?;
                let mut values = Vec::new();
                while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
                    values.push(self.parse_expr()?);
                    if !self.check_advance(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace, "'}'")?;
                Some(values)
            } else {
                None
            };
            self.expect(TokenKind::Semicolon, "';'")?;
            return Ok(Stmt::ArrayDecl(ArrayDecl { name, elem_ty: ty, size, init, line }));
        }
        let init = if self.check_advance(TokenKind::Eq) { Some(self.parse_expr()?) } else { None };
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::VarDecl(VarDecl { name, ty, init, line }))
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        let then_branch = Box::new(self.parse_stmt()?);
        let else_branch = if self.check_advance(TokenKind::KwElse) {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        Ok(Stmt::If { cond, then_branch, else_branch })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::While { cond, body })
    }

    fn parse_do_while(&mut self) -> PResult<Stmt> {
        self.advance();
        let body = Box::new(self.parse_stmt()?);
        self.expect(TokenKind::KwWhile, "'while'")?;
        self.expect(TokenKind::LParen, "'('")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::DoWhile { body, cond })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let init = if self.at(TokenKind::Semicolon) {
            self.advance();
            None
        } else {
            let stmt = if self.at_type_start() { self.parse_local_decl()? } else {
                let e = self.parse_expr()?;
                self.expect(TokenKind::Semicolon, "';'")?;
                Stmt::Expr(e)
            };
            Some(Box::new(stmt))
        };
        let cond = if self.at(TokenKind::Semicolon) { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::Semicolon, "';'")?;
        let step = if self.at(TokenKind::RParen) { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::RParen, "')'")?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::For { init, cond, step, body })
    }

    fn parse_switch(&mut self) -> PResult<Stmt> {
        self.advance();
        self.expect(TokenKind::LParen, "'('")?;
        let scrutinee = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut cases = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            let value = if self.check_advance(TokenKind::KwCase) {
                let v = self.parse_const_i64()?;
                self.expect(TokenKind::Colon, "':'")?;
                Some(v)
            } else if self.check_advance(TokenKind::KwDefault) {
                self.expect(TokenKind::Colon, "':'")?;
                None
            } else {
                self.error("expected 'case' or 'default'");
                return Err(());
            };
            let mut body = Vec::new();
            while !matches!(self.peek_kind(), TokenKind::KwCase | TokenKind::KwDefault | TokenKind::RBrace) {
                match self.parse_stmt() {
                    Ok(stmt) => body.push(stmt),
                    Err(()) => self.synchronize_stmt(),
                }
            }
            cases.push(SwitchCase { value, body });
        }
        self.expect(TokenKind::RBrace, "'}'")?;
        Ok(Stmt::Switch { scrutinee, cases })
    }

    // ---- expressions: Pratt precedence climbing ----
    // Lowest to highest, per spec.md §4.11: assignment (right-assoc),
    // logical-or, logical-and, bitwise-or, bitwise-xor, bitwise-and,
    // equality, relational, shift, additive, multiplicative, unary,
    // postfix, primary.

    pub fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> PResult<Expr> {
        let lhs = self.parse_logical_or()?;
        let line = self.peek().line;
        let compound_op = match self.peek_kind() {
            TokenKind::Eq => None,
            TokenKind::PlusEq => Some(BinaryOp::Add),
            TokenKind::MinusEq => Some(BinaryOp::Sub),
            TokenKind::StarEq => Some(BinaryOp::Mul),
            TokenKind::SlashEq => Some(BinaryOp::Div),
            TokenKind::PercentEq => Some(BinaryOp::Mod),
            TokenKind::AmpEq => Some(BinaryOp::BitAnd),
            TokenKind::PipeEq => Some(BinaryOp::BitOr),
            TokenKind::CaretEq => Some(BinaryOp::BitXor),
            TokenKind::ShlEq => Some(BinaryOp::Shl),
            TokenKind::ShrEq => Some(BinaryOp::Shr),
            _ => return Ok(lhs),
        };
        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expr::Assign { target: Box::new(lhs), op: compound_op, value: Box::new(value), line })
    }

    fn parse_logical_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_logical_and()?;
        while self.at(TokenKind::PipePipe) {
            let line = self.advance().line;
            let rhs = self.parse_logical_and()?;
            lhs = Expr::Binary { op: BinaryOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
        Ok(lhs)
    }

    fn parse_logical_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_bit_or()?;
        while self.at(TokenKind::AmpAmp) {
            let line = self.advance().line;
            let rhs = self.parse_bit_or()?;
            lhs = Expr::Binary { op: BinaryOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
        Ok(lhs)
    }

    fn parse_bit_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_bit_xor()?;
        while self.at(TokenKind::Pipe) {
            let line = self.advance().line;
            let rhs = self.parse_bit_xor()?;
            lhs = Expr::Binary { op: BinaryOp::BitOr, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
        Ok(lhs)
    }

    fn parse_bit_xor(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_bit_and()?;
        while self.at(TokenKind::Caret) {
            let line = self.advance().line;
            let rhs = self.parse_bit_and()?;
            lhs = Expr::Binary { op: BinaryOp::BitXor, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
        Ok(lhs)
    }

    fn parse_bit_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.at(TokenKind::Amp) {
            let line = self.advance().line;
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary { op: BinaryOp::BitAnd, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::BangEq => BinaryOp::Ne,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_shift()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::Ge,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.parse_shift()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Shl => BinaryOp::Shl,
                TokenKind::Shr => BinaryOp::Shr,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        let op = match self.peek_kind() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Amp => Some(UnaryOp::AddrOf),
            TokenKind::Star => Some(UnaryOp::Deref),
            TokenKind::PlusPlus => Some(UnaryOp::PreInc),
            TokenKind::MinusMinus => Some(UnaryOp::PreDec),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary { op, expr: Box::new(expr), line });
        }
        if self.at(TokenKind::KwSizeof) {
            self.advance();
            self.expect(TokenKind::LParen, "'('")?;
            let ty = self.parse_type()?;
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(Expr::Sizeof { ty });
        }
        // C-style cast: "(" type ")" unary, disambiguated from a
        // parenthesized expression by whether a type keyword follows '('.
        if self.at(TokenKind::LParen) && matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind),
            Some(TokenKind::KwByte) | Some(TokenKind::KwInt) | Some(TokenKind::KwUint) | Some(TokenKind::KwBool)
            | Some(TokenKind::KwFixed) | Some(TokenKind::KwUfixed) | Some(TokenKind::KwVoid))
        {
            self.advance();
            let ty = self.parse_type()?;
            self.expect(TokenKind::RParen, "')'")?;
            let expr = self.parse_unary()?;
            return Ok(Expr::Cast { ty, expr: Box::new(expr), line });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            let line = self.peek().line;
            match self.peek_kind() {
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expr::Index { base: Box::new(expr), index: Box::new(index), line };
                }
                TokenKind::Dot => {
                    self.advance();
                    let field = self.expect_identifier()?;
                    expr = Expr::Member { base: Box::new(expr), field, arrow: false, line };
                }
                TokenKind::Arrow => {
                    self.advance();
                    let field = self.expect_identifier()?;
                    expr = Expr::Member { base: Box::new(expr), field, arrow: true, line };
                }
                TokenKind::PlusPlus => {
                    self.advance();
                    expr = Expr::Unary { op: UnaryOp::PostInc, expr: Box::new(expr), line };
                }
                TokenKind::MinusMinus => {
                    self.advance();
                    expr = Expr::Unary { op: UnaryOp::PostDec, expr: Box::new(expr), line };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::IntLiteral(v) => {
                self.advance();
                Ok(Expr::IntLit(v))
            }
            TokenKind::HexLiteral(v) => {
                self.advance();
                Ok(Expr::HexLit(v))
            }
            TokenKind::BinLiteral(v) => {
                self.advance();
                Ok(Expr::BinLit(v))
            }
            TokenKind::FixedLiteral(v) => {
                self.advance();
                Ok(Expr::FixedLit(v))
            }
            TokenKind::BoolLiteral(v) => {
                self.advance();
                Ok(Expr::BoolLit(v))
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                Ok(Expr::StringLit(s))
            }
            TokenKind::CharLiteral(c) => {
                self.advance();
                Ok(Expr::CharLit(c))
            }
            TokenKind::Identifier => {
                let name = tok.text;
                self.advance();
                if self.check_advance(TokenKind::LParen) {
                    let mut args = Vec::new();
                    while !self.at(TokenKind::RParen) && !self.at(TokenKind::Eof) {
                        args.push(self.parse_expr()?);
                        if !self.check_advance(TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen, "')'")?;
                    return Ok(Expr::Call { callee: name, args, line });
                }
                Ok(Expr::Ident(name, line))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            _ => {
                self.error(&format!("unexpected token '{}'", tok.text));
                Err(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::lexer::Lexer;
    use super::*;

    fn parse(src: &str) -> (Program, Vec<Diagnostic>) {
        let (tokens, lex_diags) = Lexer::new(src).tokenize();
        assert!(lex_diags.is_empty());
        Parser::new(tokens).parse_program()
    }

    #[test]
    fn parses_global_var_and_function_with_assignment() {
        let (program, diags) = parse("byte x; void main() { x = 6 * 7; }");
        assert!(diags.is_empty());
        assert_eq!(program.decls.len(), 2);
        match &program.decls[1] {
            Decl::Function(f) => {
                assert_eq!(f.name, "main");
                assert_eq!(f.body.len(), 1);
            }
            _ => panic!("expected function decl"),
        }
    }

    #[test]
    fn respects_precedence_ladder_for_mixed_expression() {
        let (program, diags) = parse("int y; void main() { y = 1 + 2 * 3 == 7 && 1 < 2; }");
        assert!(diags.is_empty());
        match &program.decls[1] {
            Decl::Function(f) => match &f.body[0] {
                Stmt::Expr(Expr::Assign { value, .. }) => {
                    assert!(matches!(**value, Expr::Binary { op: BinaryOp::And, .. }));
                }
                other => panic!("unexpected stmt {:?}", other),
            },
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn recovers_from_a_bad_statement_and_keeps_parsing() {
        let (program, diags) = parse("void main() { @@@; byte x = 1; }");
        assert!(!diags.is_empty());
        match &program.decls[0] {
            Decl::Function(f) => assert_eq!(f.body.len(), 1),
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn parses_struct_with_shared_field_type() {
        let (program, diags) = parse("struct Point { fixed x, y; };");
        assert!(diags.is_empty());
        match &program.decls[0] {
            Decl::Struct(s) => assert_eq!(s.fields.len(), 2),
            _ => panic!("expected struct"),
        }
    }

    #[test]
    fn parses_enum_with_auto_increment_gaps() {
        let (program, diags) = parse("enum Color { RED = 1, GREEN, BLUE = 5, YELLOW };");
        assert!(diags.is_empty());
        match &program.decls[0] {
            Decl::Enum(e) => {
                assert_eq!(e.members[0], ("RED".to_string(), Some(1)));
                assert_eq!(e.members[1], ("GREEN".to_string(), None));
                assert_eq!(e.members[3], ("YELLOW".to_string(), None));
            }
            _ => panic!("expected enum"),
        }
    }
}

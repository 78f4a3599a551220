// This file is part of nova64.
// Grounded on spec.md §4.11's lexer paragraph in full; single-pass
// character walk in the style of the cycle-accurate fetch loop elsewhere
// in this crate (`cpu::dispatch`'s `execute_next`) rather than a
// generated-table scanner, since no lexer analog exists in the pack.

use super::token::{keyword_kind, Token, TokenKind};

pub struct Diagnostic {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenizes the whole source. Lexical errors (unterminated string/
    /// char, unknown character) are recorded as diagnostics but do not
    /// stop the scan: the lexer always returns a token stream ending in
    /// `Eof`, matching the no-throw discipline spec.md §9 asks for.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        let mut diagnostics = Vec::new();
        loop {
            self.skip_trivia();
            let (line, column) = (self.line, self.column);
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, "", line, column));
                break;
            };
            if c == b'#' {
                tokens.push(self.lex_preprocessor());
                continue;
            }
            if c.is_ascii_digit() {
                tokens.push(self.lex_number());
                continue;
            }
            if c == b'_' || c.is_ascii_alphabetic() {
                tokens.push(self.lex_identifier());
                continue;
            }
            if c == b'"' {
                match self.lex_string() {
                    Ok(tok) => tokens.push(tok),
                    Err(msg) => diagnostics.push(Diagnostic { line, column, message: msg }),
                }
                continue;
            }
            if c == b'\'' {
                match self.lex_char() {
                    Ok(tok) => tokens.push(tok),
                    Err(msg) => diagnostics.push(Diagnostic { line, column, message: msg }),
                }
                continue;
            }
            match self.lex_operator() {
                Some(tok) => tokens.push(tok),
                None => {
                    diagnostics.push(Diagnostic {
                        line,
                        column,
                        message: format!("unexpected character '{}'", c as char),
                    });
                    self.advance();
                }
            }
        }
        (tokens, diagnostics)
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c == b' ' || c == b'\t' || c == b'\r' || c == b'\n' => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.advance();
                    self.advance();
                    while !(self.peek().is_none() || (self.peek() == Some(b'*') && self.peek_at(1) == Some(b'/'))) {
                        self.advance();
                    }
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            self.advance();
            self.advance();
            let digits_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.advance();
            }
            let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap().to_string();
            let value = i64::from_str_radix(std::str::from_utf8(&self.source[digits_start..self.pos]).unwrap(), 16).unwrap_or(0);
            return Token::new(TokenKind::HexLiteral(value), text, line, column);
        }
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'b') | Some(b'B')) {
            self.advance();
            self.advance();
            let digits_start = self.pos;
            while matches!(self.peek(), Some(b'0') | Some(b'1')) {
                self.advance();
            }
            let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap().to_string();
            let value = i64::from_str_radix(std::str::from_utf8(&self.source[digits_start..self.pos]).unwrap(), 2).unwrap_or(0);
            return Token::new(TokenKind::BinLiteral(value), text, line, column);
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        let mut is_fixed = false;
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_fixed = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap().to_string();
        if is_fixed {
            let value = parse_fixed(&text);
            Token::new(TokenKind::FixedLiteral(value), text, line, column)
        } else {
            let value = text.parse::<i64>().unwrap_or(0);
            Token::new(TokenKind::IntLiteral(value), text, line, column)
        }
    }

    fn lex_identifier(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c == b'_' || c.is_ascii_alphanumeric()) {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap().to_string();
        let kind = keyword_kind(&text).unwrap_or(TokenKind::Identifier);
        Token::new(kind, text, line, column)
    }

    fn lex_string(&mut self) -> Result<Token, String> {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                None | Some(b'\n') => return Err("unterminated string literal".to_string()),
                Some(b'"') => break,
                Some(b'\\') => value.push(self.lex_escape()? as char),
                Some(c) => value.push(c as char),
            }
        }
        Ok(Token::new(TokenKind::StringLiteral(value.clone()), value, line, column))
    }

    fn lex_char(&mut self) -> Result<Token, String> {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let value = match self.advance() {
            None => return Err("unterminated char literal".to_string()),
            Some(b'\\') => self.lex_escape()?,
            Some(c) => c,
        };
        if self.advance() != Some(b'\'') {
            return Err("unterminated char literal".to_string());
        }
        Ok(Token::new(TokenKind::CharLiteral(value), (value as char).to_string(), line, column))
    }

    fn lex_escape(&mut self) -> Result<u8, String> {
        match self.advance() {
            Some(b'n') => Ok(b'\n'),
            Some(b't') => Ok(b'\t'),
            Some(b'\\') => Ok(b'\\'),
            Some(b'"') => Ok(b'"'),
            Some(b'\'') => Ok(b'\''),
            Some(b'0') => Ok(0),
            Some(other) => Err(format!("unknown escape '\\{}'", other as char)),
            None => Err("unterminated escape sequence".to_string()),
        }
    }

    fn lex_preprocessor(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let start = self.pos;
        self.advance(); // '#'
        while matches!(self.peek(), Some(c) if c.is_ascii_alphabetic()) {
            self.advance();
        }
        let directive = std::str::from_utf8(&self.source[start..self.pos]).unwrap().to_string();
        let kind = match directive.as_str() {
            "#include" => TokenKind::PpInclude,
            "#define" => TokenKind::PpDefine,
            "#asset" => TokenKind::PpAsset,
            "#pragma" => TokenKind::PpPragma,
            _ => TokenKind::PpPragma,
        };
        // The remainder of the directive's line is carried verbatim as text.
        let rest_start = self.pos;
        while !matches!(self.peek(), None | Some(b'\n')) {
            self.advance();
        }
        let rest = std::str::from_utf8(&self.source[rest_start..self.pos]).unwrap().trim().to_string();
        Token::new(kind, rest, line, column)
    }

    fn lex_operator(&mut self) -> Option<Token> {
        let (line, column) = (self.line, self.column);
        let three = [self.peek(), self.peek_at(1), self.peek_at(2)];
        let two = [self.peek(), self.peek_at(1)];
        macro_rules! take {
            ($n:expr, $kind:expr, $text:expr) => {{
                for _ in 0..$n {
                    self.advance();
                }
                return Some(Token::new($kind, $text, line, column));
            }};
        }
        use TokenKind::*;
        if three == [Some(b'<'), Some(b'<'), Some(b'=')] {
            take!(3, ShlEq, "<<=");
        }
        if three == [Some(b'>'), Some(b'>'), Some(b'=')] {
            take!(3, ShrEq, ">>=");
        }
        match two {
            [Some(b'&'), Some(b'&')] => take!(2, AmpAmp, "&&"),
            [Some(b'|'), Some(b'|')] => take!(2, PipePipe, "||"),
            [Some(b'<'), Some(b'<')] => take!(2, Shl, "<<"),
            [Some(b'>'), Some(b'>')] => take!(2, Shr, ">>"),
            [Some(b'='), Some(b'=')] => take!(2, EqEq, "=="),
            [Some(b'!'), Some(b'=')] => take!(2, BangEq, "!="),
            [Some(b'<'), Some(b'=')] => take!(2, LtEq, "<="),
            [Some(b'>'), Some(b'=')] => take!(2, GtEq, ">="),
            [Some(b'+'), Some(b'=')] => take!(2, PlusEq, "+="),
            [Some(b'-'), Some(b'=')] => take!(2, MinusEq, "-="),
            [Some(b'*'), Some(b'=')] => take!(2, StarEq, "*="),
            [Some(b'/'), Some(b'=')] => take!(2, SlashEq, "/="),
            [Some(b'%'), Some(b'=')] => take!(2, PercentEq, "%="),
            [Some(b'&'), Some(b'=')] => take!(2, AmpEq, "&="),
            [Some(b'|'), Some(b'=')] => take!(2, PipeEq, "|="),
            [Some(b'^'), Some(b'=')] => take!(2, CaretEq, "^="),
            [Some(b'+'), Some(b'+')] => take!(2, PlusPlus, "++"),
            [Some(b'-'), Some(b'-')] => take!(2, MinusMinus, "--"),
            [Some(b'-'), Some(b'>')] => take!(2, Arrow, "->"),
            _ => {}
        }
        let c = self.peek()?;
        let kind = match c {
            b'+' => Plus,
            b'-' => Minus,
            b'*' => Star,
            b'/' => Slash,
            b'%' => Percent,
            b'&' => Amp,
            b'|' => Pipe,
            b'^' => Caret,
            b'~' => Tilde,
            b'!' => Bang,
            b'=' => Eq,
            b'<' => Lt,
            b'>' => Gt,
            b'.' => Dot,
            b',' => Comma,
            b';' => Semicolon,
            b':' => Colon,
            b'?' => Question,
            b'(' => LParen,
            b')' => RParen,
            b'{' => LBrace,
            b'}' => RBrace,
            b'[' => LBracket,
            b']' => RBracket,
            _ => return None,
        };
        self.advance();
        Some(Token::new(kind, (c as char).to_string(), line, column))
    }
}

/// Parses a decimal fixed-point literal's text (e.g. "3.5") into the
/// 8.8 representation spec.md's GLOSSARY defines.
fn parse_fixed(text: &str) -> i64 {
    let mut parts = text.splitn(2, '.');
    let int_part: i64 = parts.next().unwrap_or("0").parse().unwrap_or(0);
    let frac_text = parts.next().unwrap_or("0");
    let frac_digits = frac_text.len().max(1) as u32;
    let frac_value: i64 = frac_text.parse().unwrap_or(0);
    let scaled = (frac_value * 256) / 10i64.pow(frac_digits);
    (int_part << 8) | (scaled & 0xff)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (tokens, diags) = Lexer::new(src).tokenize();
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags.iter().map(|d| &d.message).collect::<Vec<_>>());
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn recognizes_integer_hex_and_binary_literals() {
        assert_eq!(kinds("42"), vec![TokenKind::IntLiteral(42), TokenKind::Eof]);
        assert_eq!(kinds("0xFF"), vec![TokenKind::HexLiteral(255), TokenKind::Eof]);
        assert_eq!(kinds("0b1010"), vec![TokenKind::BinLiteral(10), TokenKind::Eof]);
    }

    #[test]
    fn recognizes_keywords_and_annotations() {
        assert_eq!(
            kinds("__resident void"),
            vec![TokenKind::KwResident, TokenKind::KwVoid, TokenKind::Eof]
        );
    }

    #[test]
    fn recognizes_string_escapes() {
        let (tokens, diags) = Lexer::new("\"a\\nb\"").tokenize();
        assert!(diags.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral("a\nb".to_string()));
    }

    #[test]
    fn skips_line_and_block_comments() {
        assert_eq!(kinds("1 // comment\n/* block */ 2"), vec![TokenKind::IntLiteral(1), TokenKind::IntLiteral(2), TokenKind::Eof]);
    }

    #[test]
    fn tracks_line_and_column() {
        let (tokens, _) = Lexer::new("a\nb").tokenize();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn unterminated_string_is_a_diagnostic_not_a_panic() {
        let (_, diags) = Lexer::new("\"abc").tokenize();
        assert_eq!(diags.len(), 1);
    }
}

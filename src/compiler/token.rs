// This file is part of nova64.
// Grounded on spec.md §3 ("Tokens carry a kind tag, a text value, line and
// column") and §4.11's literal/keyword/operator inventory. No lexer/parser
// analog exists anywhere in the retrieval pack; the shape here is a plain
// tagged-variant re-expression of that prose, in the same "one enum, one
// struct" style the pack's other models (`Mnemonic`, `AddressingMode`) use.

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    IntLiteral(i64),
    HexLiteral(i64),
    BinLiteral(i64),
    FixedLiteral(i64),
    BoolLiteral(bool),
    StringLiteral(String),
    CharLiteral(u8),
    Identifier,

    // Keywords
    KwByte,
    KwInt,
    KwUint,
    KwBool,
    KwFixed,
    KwUfixed,
    KwVoid,
    KwStruct,
    KwEnum,
    KwConst,
    KwIf,
    KwElse,
    KwWhile,
    KwDo,
    KwFor,
    KwSwitch,
    KwCase,
    KwDefault,
    KwReturn,
    KwBreak,
    KwContinue,
    KwAsm,
    KwSizeof,
    KwResident,
    KwInterrupt,

    // Preprocessor
    PpInclude,
    PpDefine,
    PpAsset,
    PpPragma,

    // Punctuation / operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    AmpAmp,
    PipePipe,
    Shl,
    Shr,
    Eq,
    EqEq,
    BangEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    ShlEq,
    ShrEq,
    PlusPlus,
    MinusMinus,
    Arrow,
    Dot,
    Comma,
    Semicolon,
    Colon,
    Question,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            column,
        }
    }
}

pub fn keyword_kind(text: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match text {
        "byte" => KwByte,
        "int" => KwInt,
        "uint" => KwUint,
        "bool" => KwBool,
        "fixed" => KwFixed,
        "ufixed" => KwUfixed,
        "void" => KwVoid,
        "struct" => KwStruct,
        "enum" => KwEnum,
        "const" => KwConst,
        "if" => KwIf,
        "else" => KwElse,
        "while" => KwWhile,
        "do" => KwDo,
        "for" => KwFor,
        "switch" => KwSwitch,
        "case" => KwCase,
        "default" => KwDefault,
        "return" => KwReturn,
        "break" => KwBreak,
        "continue" => KwContinue,
        "asm" => KwAsm,
        "sizeof" => KwSizeof,
        "true" => return Some(BoolLiteral(true)),
        "false" => return Some(BoolLiteral(false)),
        "__resident" => KwResident,
        "__interrupt" => KwInterrupt,
        _ => return None,
    })
}

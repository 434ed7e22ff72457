//! Tokenization.
//!
//! A logos lexer produces the flat token stream; a layering pass above it
//! turns physical lines into logical ones, synthesizing NEWLINE, INDENT
//! and DEDENT tokens, suppressing newlines inside brackets and on blank
//! lines, and closing all open blocks at end of input.

use logos::Logos;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unexpected or malformed token at line {line}, column {column}")]
    Unexpected { line: u32, column: u32 },
    #[error("inconsistent dedent at line {line}")]
    InconsistentDedent { line: u32 },
}

fn triple_double(lex: &mut logos::Lexer<Tok>) -> bool {
    scan_triple(lex, b'"')
}

fn triple_single(lex: &mut logos::Lexer<Tok>) -> bool {
    scan_triple(lex, b'\'')
}

// Consumes the body and closing delimiter of a triple-quoted string.
fn scan_triple(lex: &mut logos::Lexer<Tok>, quote: u8) -> bool {
    let bytes = lex.remainder().as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == quote
            && i + 2 < bytes.len()
            && bytes[i + 1] == quote
            && bytes[i + 2] == quote
        {
            lex.bump(i + 3);
            return true;
        }
        i += 1;
    }
    false
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\f]+")]
#[logos(skip r"#[^\n]*")]
#[logos(skip r"\\\r?\n")]
pub enum Tok {
    // --- keywords ---
    #[token("False")]
    KwFalse,
    #[token("None")]
    KwNone,
    #[token("True")]
    KwTrue,
    #[token("and")]
    KwAnd,
    #[token("as")]
    KwAs,
    #[token("assert")]
    KwAssert,
    #[token("async")]
    KwAsync,
    #[token("await")]
    KwAwait,
    #[token("break")]
    KwBreak,
    #[token("class")]
    KwClass,
    #[token("continue")]
    KwContinue,
    #[token("def")]
    KwDef,
    #[token("del")]
    KwDel,
    #[token("elif")]
    KwElif,
    #[token("else")]
    KwElse,
    #[token("except")]
    KwExcept,
    #[token("finally")]
    KwFinally,
    #[token("for")]
    KwFor,
    #[token("from")]
    KwFrom,
    #[token("global")]
    KwGlobal,
    #[token("if")]
    KwIf,
    #[token("import")]
    KwImport,
    #[token("in")]
    KwIn,
    #[token("is")]
    KwIs,
    #[token("lambda")]
    KwLambda,
    #[token("nonlocal")]
    KwNonlocal,
    #[token("not")]
    KwNot,
    #[token("or")]
    KwOr,
    #[token("pass")]
    KwPass,
    #[token("raise")]
    KwRaise,
    #[token("return")]
    KwReturn,
    #[token("try")]
    KwTry,
    #[token("while")]
    KwWhile,
    #[token("with")]
    KwWith,
    #[token("yield")]
    KwYield,

    // --- literals ---
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Name,
    #[regex(r"0[xX][0-9a-fA-F](_?[0-9a-fA-F])*")]
    #[regex(r"0[oO][0-7](_?[0-7])*")]
    #[regex(r"0[bB][01](_?[01])*")]
    #[regex(r"[0-9](_?[0-9])*")]
    Int,
    #[regex(r"[0-9](_?[0-9])*\.([0-9](_?[0-9])*)?([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9](_?[0-9])*([eE][+-]?[0-9]+)?")]
    #[regex(r"[0-9](_?[0-9])*[eE][+-]?[0-9]+")]
    Float,
    #[regex(r"[0-9](_?[0-9])*(\.([0-9](_?[0-9])*)?)?([eE][+-]?[0-9]+)?[jJ]")]
    #[regex(r"\.[0-9](_?[0-9])*([eE][+-]?[0-9]+)?[jJ]")]
    Imaginary,
    #[regex(r#"[rRbBuU]{0,2}"([^"\\\n]|\\.|\\\n)*""#)]
    #[regex(r"[rRbBuU]{0,2}'([^'\\\n]|\\.|\\\n)*'")]
    #[regex(r#"[rRbBuU]{0,2}""""#, triple_double)]
    #[regex(r"[rRbBuU]{0,2}'''", triple_single)]
    Str,

    // --- delimiters ---
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token("...")]
    EllipsisLit,
    #[token(".")]
    Dot,
    #[token("->")]
    Arrow,
    #[token("@=")]
    AtEq,
    #[token("@")]
    At,
    #[token("=")]
    Eq,

    // --- operators ---
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("**=")]
    StarStarEq,
    #[token("*=")]
    StarEq,
    #[token("//=")]
    SlashSlashEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("&=")]
    AmpEq,
    #[token("|=")]
    PipeEq,
    #[token("^=")]
    CaretEq,
    #[token(">>=")]
    ShrEq,
    #[token("<<=")]
    ShlEq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("**")]
    StarStar,
    #[token("*")]
    Star,
    #[token("//")]
    SlashSlash,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("==")]
    EqEq,
    #[token("!=")]
    Ne,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    #[regex(r"\r?\n")]
    RawNewline,

    // --- synthesized by the layering pass ---
    Newline,
    Indent,
    Dedent,
    EndMarker,
}

/// A logical token with its source text and position.
#[derive(Debug, Clone)]
pub struct Token {
    pub tok: Tok,
    pub text: String,
    pub line: u32,
    pub column: u32,
}

/// Byte-offset to line/column mapping.
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        for (offset, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                starts.push(offset + 1);
            }
        }
        Self { starts }
    }

    /// 1-based line and 0-based column of a byte offset.
    pub fn locate(&self, offset: usize) -> (u32, u32) {
        let line = match self.starts.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index - 1,
        };
        (line as u32 + 1, (offset - self.starts[line]) as u32)
    }
}

/// Tokenizes `source` into logical tokens with layout synthesized.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let index = LineIndex::new(source);
    let mut tokens = Vec::new();
    let mut indents: Vec<u32> = vec![0];
    let mut bracket_depth = 0usize;
    let mut at_line_start = true;
    let mut last_line = 1u32;

    for (result, span) in Tok::lexer(source).spanned() {
        let (line, column) = index.locate(span.start);
        last_line = line;
        let tok = result.map_err(|_| LexError::Unexpected { line, column })?;
        match tok {
            Tok::RawNewline => {
                if bracket_depth == 0 && !at_line_start {
                    tokens.push(Token {
                        tok: Tok::Newline,
                        text: String::new(),
                        line,
                        column,
                    });
                    at_line_start = true;
                }
            }
            _ => {
                if at_line_start && bracket_depth == 0 {
                    if column > *indents.last().expect("indent stack is never empty") {
                        indents.push(column);
                        tokens.push(Token {
                            tok: Tok::Indent,
                            text: String::new(),
                            line,
                            column,
                        });
                    } else {
                        while column < *indents.last().expect("indent stack is never empty") {
                            indents.pop();
                            tokens.push(Token {
                                tok: Tok::Dedent,
                                text: String::new(),
                                line,
                                column,
                            });
                        }
                        if column != *indents.last().expect("indent stack is never empty") {
                            return Err(LexError::InconsistentDedent { line });
                        }
                    }
                    at_line_start = false;
                }
                match tok {
                    Tok::LParen | Tok::LBracket | Tok::LBrace => bracket_depth += 1,
                    Tok::RParen | Tok::RBracket | Tok::RBrace => {
                        bracket_depth = bracket_depth.saturating_sub(1)
                    }
                    _ => {}
                }
                tokens.push(Token {
                    tok,
                    text: source[span].to_string(),
                    line,
                    column,
                });
            }
        }
    }

    if !at_line_start {
        tokens.push(Token {
            tok: Tok::Newline,
            text: String::new(),
            line: last_line,
            column: 0,
        });
    }
    while indents.len() > 1 {
        indents.pop();
        tokens.push(Token {
            tok: Tok::Dedent,
            text: String::new(),
            line: last_line + 1,
            column: 0,
        });
    }
    tokens.push(Token {
        tok: Tok::EndMarker,
        text: String::new(),
        line: last_line + 1,
        column: 0,
    });
    Ok(tokens)
}

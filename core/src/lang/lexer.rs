//! Tokenizer for the snippet language, built on logos.
//!
//! Logos produces raw tokens; literal values and string interpolation are
//! resolved in a second pass so that errors can carry a line number.

use std::ops::Range;

use logos::Logos;

use crate::str_interp::{self, InterpError, Segment};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"([ \t\r\f]+|#[^\n]*|\\\r?\n)")]
enum RawToken {
    #[token("def")]
    Def,
    #[token("end")]
    End,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("elsif")]
    Elsif,
    #[token("else")]
    Else,
    #[token("unless")]
    Unless,
    #[token("while")]
    While,
    #[token("until")]
    Until,
    #[token("do")]
    Do,
    #[token("then")]
    Then,
    #[token("begin")]
    Begin,
    #[token("break")]
    Break,
    #[token("next")]
    Next,
    #[token("yield")]
    Yield,
    #[token("nil")]
    Nil,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("self")]
    SelfKw,

    #[token("\n")]
    Newline,
    #[token(";")]
    Semi,

    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
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
    #[token(".")]
    Dot,
    #[token("|")]
    Pipe,

    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*")]
    Float,
    #[regex(r"[0-9][0-9_]*")]
    Int,
    #[regex(r#""([^"\\]|\\.)*""#)]
    DqString,
    #[regex(r"'([^'\\]|\\.)*'")]
    SqString,
    #[regex(r":[a-zA-Z_][a-zA-Z0-9_]*[?!]?")]
    Symbol,
    #[regex(r"[a-z_][a-zA-Z0-9_]*[?!]?")]
    Ident,
    #[regex(r"[A-Z][a-zA-Z0-9_]*")]
    Constant,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Def,
    End,
    Return,
    If,
    Elsif,
    Else,
    Unless,
    While,
    Until,
    Do,
    Then,
    Begin,
    Break,
    Next,
    Yield,
    Nil,
    True,
    False,
    SelfKw,

    Newline,
    Semi,

    EqEq,
    NotEq,
    LtEq,
    GtEq,
    AndAnd,
    OrOr,
    PlusEq,
    MinusEq,
    StarEq,
    Eq,
    Lt,
    Gt,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Pipe,

    Int(i64),
    Float(f64),
    Str(Vec<Segment>),
    Symbol(String),
    Ident(String),
    Constant(String),

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
    /// 1-indexed
    pub line: usize,
    /// Preceded by horizontal whitespace (or at the start of a line).
    pub spaced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("unexpected character '{ch}' at line {line}")]
    UnexpectedChar { ch: char, line: usize },

    #[error("integer literal out of range at line {line}")]
    IntegerOutOfRange { line: usize },

    #[error("bad string interpolation at line {line}: {source}")]
    Interpolation {
        line: usize,
        #[source]
        source: InterpError,
    },
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect();
    let line_of = |offset: usize| match line_starts.binary_search(&offset) {
        Ok(i) => i + 1,
        Err(i) => i,
    };

    let mut tokens = Vec::new();
    let mut lexer = RawToken::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let slice = lexer.slice();
        let line = line_of(span.start);

        let Ok(raw) = result else {
            let ch = source[span.start..].chars().next().unwrap_or('?');
            return Err(LexError::UnexpectedChar { ch, line });
        };

        let spaced = span.start == 0
            || matches!(
                source.as_bytes()[span.start - 1],
                b' ' | b'\t' | b'\n' | b'\r'
            );

        tokens.push(Token {
            kind: convert(raw, slice, line)?,
            span,
            line,
            spaced,
        });
    }

    let end = source.len();
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: end..end,
        line: line_of(end),
        spaced: true,
    });
    Ok(tokens)
}

fn convert(raw: RawToken, slice: &str, line: usize) -> Result<TokenKind, LexError> {
    use TokenKind as T;
    let kind = match raw {
        RawToken::Def => T::Def,
        RawToken::End => T::End,
        RawToken::Return => T::Return,
        RawToken::If => T::If,
        RawToken::Elsif => T::Elsif,
        RawToken::Else => T::Else,
        RawToken::Unless => T::Unless,
        RawToken::While => T::While,
        RawToken::Until => T::Until,
        RawToken::Do => T::Do,
        RawToken::Then => T::Then,
        RawToken::Begin => T::Begin,
        RawToken::Break => T::Break,
        RawToken::Next => T::Next,
        RawToken::Yield => T::Yield,
        RawToken::Nil => T::Nil,
        RawToken::True => T::True,
        RawToken::False => T::False,
        RawToken::SelfKw => T::SelfKw,
        RawToken::Newline => T::Newline,
        RawToken::Semi => T::Semi,
        RawToken::EqEq => T::EqEq,
        RawToken::NotEq => T::NotEq,
        RawToken::LtEq => T::LtEq,
        RawToken::GtEq => T::GtEq,
        RawToken::AndAnd => T::AndAnd,
        RawToken::OrOr => T::OrOr,
        RawToken::PlusEq => T::PlusEq,
        RawToken::MinusEq => T::MinusEq,
        RawToken::StarEq => T::StarEq,
        RawToken::Eq => T::Eq,
        RawToken::Lt => T::Lt,
        RawToken::Gt => T::Gt,
        RawToken::Plus => T::Plus,
        RawToken::Minus => T::Minus,
        RawToken::Star => T::Star,
        RawToken::Slash => T::Slash,
        RawToken::Percent => T::Percent,
        RawToken::Bang => T::Bang,
        RawToken::LParen => T::LParen,
        RawToken::RParen => T::RParen,
        RawToken::LBracket => T::LBracket,
        RawToken::RBracket => T::RBracket,
        RawToken::LBrace => T::LBrace,
        RawToken::RBrace => T::RBrace,
        RawToken::Comma => T::Comma,
        RawToken::Dot => T::Dot,
        RawToken::Pipe => T::Pipe,

        RawToken::Int => {
            let digits = slice.replace('_', "");
            let n = digits
                .parse::<i64>()
                .map_err(|_| LexError::IntegerOutOfRange { line })?;
            T::Int(n)
        }
        RawToken::Float => {
            let digits = slice.replace('_', "");
            // the regex only admits well-formed decimals
            T::Float(digits.parse::<f64>().unwrap_or(f64::NAN))
        }
        RawToken::DqString => {
            let body = &slice[1..slice.len() - 1];
            let segments = str_interp::split_segments(body)
                .map_err(|source| LexError::Interpolation { line, source })?;
            T::Str(segments)
        }
        RawToken::SqString => {
            let body = &slice[1..slice.len() - 1];
            T::Str(vec![Segment::Text(unescape_single_quoted(body))])
        }
        RawToken::Symbol => T::Symbol(slice[1..].to_owned()),
        RawToken::Ident => T::Ident(slice.to_owned()),
        RawToken::Constant => T::Constant(slice.to_owned()),
    };
    Ok(kind)
}

/// Only `\'` and `\\` are escapes inside single quotes.
fn unescape_single_quoted(body: &str) -> String {
    let mut res = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('\\', Some(&next @ ('\'' | '\\'))) => {
                res.push(next);
                chars.next();
            }
            _ => res.push(c),
        }
    }
    res
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_and_idents() {
        use TokenKind::*;
        assert_eq!(
            kinds("def say_hi(name = \"Rubyist\")"),
            vec![
                Def,
                Ident("say_hi".into()),
                LParen,
                Ident("name".into()),
                Eq,
                Str(vec![Segment::Text("Rubyist".into())]),
                RParen,
                Eof
            ]
        );
        assert_eq!(
            kinds("nil? define ending"),
            vec![
                Ident("nil?".into()),
                Ident("define".into()),
                Ident("ending".into()),
                Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped_but_newlines_kept() {
        use TokenKind::*;
        assert_eq!(
            kinds("puts n # => nil\n3.times"),
            vec![
                Ident("puts".into()),
                Ident("n".into()),
                Newline,
                Int(3),
                Dot,
                Ident("times".into()),
                Eof
            ]
        );
    }

    #[test]
    fn numbers_symbols_and_constants() {
        use TokenKind::*;
        assert_eq!(
            kinds("1_000 2.5 :foo? String"),
            vec![
                Int(1000),
                Float(2.5),
                Symbol("foo?".into()),
                Constant("String".into()),
                Eof
            ]
        );
    }

    #[test]
    fn strings() {
        use TokenKind::*;
        assert_eq!(
            kinds(r#"'it\'s #{x}'"#),
            vec![Str(vec![Segment::Text("it's #{x}".into())]), Eof]
        );
        assert_eq!(
            kinds(r#""a # b""#),
            vec![Str(vec![Segment::Text("a # b".into())]), Eof]
        );
    }

    #[test]
    fn lines_and_spacing() {
        let tokens = tokenize("a\n  b(c)\n").unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[2].line, 2);
        assert!(tokens[2].spaced);
        assert!(!tokens[3].spaced); // '(' right after b
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn lex_errors() {
        assert_eq!(
            tokenize("x = 1\ny = $z").unwrap_err(),
            LexError::UnexpectedChar { ch: '$', line: 2 }
        );
        assert!(matches!(
            tokenize("\"#{oops\"").unwrap_err(),
            LexError::Interpolation { line: 1, .. }
        ));
    }
}

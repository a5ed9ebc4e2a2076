use std::{borrow::Borrow, collections::HashMap, ffi::OsStr, hash::Hash};

pub type Result<T = String> = std::result::Result<T, InterpError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpError {
    #[error("Undefined variable '{0}' at {}", .1+1)]
    UndefinedVar(String, usize),

    #[error("Unclosed brace (found open brace at {})", .0+1)]
    UnclosedBrace(usize),
}

/// Expand `#{name}` in a command/driver template. `##` is a literal `#`.
pub fn interp<K, V>(fmt: &str, variables: &HashMap<K, V>) -> Result
where
    K: Borrow<str> + Hash + Eq,
    V: AsRef<OsStr>,
{
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum State {
        Normal,
        HashMark,
        InsideBrace,
    }
    use State::*;

    let mut state = Normal;
    let mut pos_open_brace = 0;
    let mut res = String::with_capacity(fmt.len() * 2);
    let mut var_name = String::with_capacity(32);

    for (i, c) in fmt.chars().enumerate() {
        match (c, state) {
            ('#', Normal) => {
                state = HashMark;
                res.push(c);
            }
            ('#', HashMark) => {
                state = Normal;
            }
            ('{', HashMark) => {
                state = InsideBrace;
                pos_open_brace = i;
                var_name.clear();
                res.pop(); // remove '#'
            }
            ('}', InsideBrace) => {
                state = Normal;
                let Some(value) = variables.get(&var_name) else {
                    return Err(InterpError::UndefinedVar(var_name, pos_open_brace + 1))
                };
                res += value.as_ref().to_string_lossy().as_ref();
            }
            (_, InsideBrace) => {
                var_name.push(c);
            }
            _ => {
                state = Normal;
                res.push(c);
            }
        }
    }

    if state == InsideBrace {
        Err(InterpError::UnclosedBrace(pos_open_brace))
    } else {
        res.shrink_to_fit();
        Ok(res)
    }
}

/// A piece of a double-quoted string literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text with escapes already resolved.
    Text(String),
    /// Source of an embedded `#{...}` expression; `offset` is the char index of its first char.
    Code { src: String, offset: usize },
}

/// Split the body of a double-quoted literal (without the quotes) into text and
/// `#{...}` code segments, resolving backslash escapes in the text parts.
pub fn split_segments(body: &str) -> Result<Vec<Segment>> {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum State {
        Normal,
        Escape,
        HashMark,
        InsideBrace { depth: usize, quote: Option<char> },
    }
    use State::*;

    let mut state = Normal;
    let mut segments = Vec::new();
    let mut text = String::with_capacity(body.len());
    let mut code = String::new();
    let mut pos_open_brace = 0;
    let mut code_offset = 0;

    for (i, c) in body.chars().enumerate() {
        match (c, state) {
            ('\\', Normal) => state = Escape,
            ('#', Normal) => state = HashMark,
            (_, Normal) => text.push(c),

            (_, Escape) => {
                text.push(unescape(c));
                state = Normal;
            }

            ('{', HashMark) => {
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                code.clear();
                pos_open_brace = i - 1;
                code_offset = i + 1;
                state = InsideBrace {
                    depth: 1,
                    quote: None,
                };
            }
            ('#', HashMark) => text.push('#'),
            ('\\', HashMark) => {
                text.push('#');
                state = Escape;
            }
            (_, HashMark) => {
                text.push('#');
                text.push(c);
                state = Normal;
            }

            (_, InsideBrace { depth, quote: Some(q) }) => {
                code.push(c);
                if c == q {
                    state = InsideBrace { depth, quote: None };
                }
            }
            ('"' | '\'', InsideBrace { depth, quote: None }) => {
                code.push(c);
                state = InsideBrace {
                    depth,
                    quote: Some(c),
                };
            }
            ('{', InsideBrace { depth, quote: None }) => {
                code.push(c);
                state = InsideBrace {
                    depth: depth + 1,
                    quote: None,
                };
            }
            ('}', InsideBrace { depth: 1, quote: None }) => {
                segments.push(Segment::Code {
                    src: std::mem::take(&mut code),
                    offset: code_offset,
                });
                state = Normal;
            }
            ('}', InsideBrace { depth, quote: None }) => {
                code.push(c);
                state = InsideBrace {
                    depth: depth - 1,
                    quote: None,
                };
            }
            (_, InsideBrace { .. }) => code.push(c),
        }
    }

    match state {
        InsideBrace { .. } => return Err(InterpError::UnclosedBrace(pos_open_brace)),
        HashMark => text.push('#'),
        Escape => text.push('\\'),
        Normal => (),
    }
    if !text.is_empty() || segments.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        's' => ' ',
        '0' => '\0',
        'e' => '\x1b',
        other => other,
    }
}

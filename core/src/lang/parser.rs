//! Recursive-descent parser for the snippet language.
//!
//! Like Ruby, the parser decides whether a bare identifier is a local
//! variable or a method call by tracking the names assigned so far.

use std::{collections::HashSet, rc::Rc};

use super::ast::*;
use super::lexer::{self, LexError, Token, TokenKind};
use crate::str_interp::Segment;

pub type Result<T> = std::result::Result<T, ParseError>;

/// Deepest expression nesting accepted before parsing gives up.
pub const MAX_NESTING: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("unexpected {found} at line {line}, expected {expected}")]
    Unexpected {
        found: String,
        expected: &'static str,
        line: usize,
    },

    #[error("expression nested too deeply at line {line}")]
    TooDeep { line: usize },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::Lex(LexError::UnexpectedChar { line, .. })
            | ParseError::Lex(LexError::IntegerOutOfRange { line })
            | ParseError::Lex(LexError::Interpolation { line, .. })
            | ParseError::Unexpected { line, .. }
            | ParseError::TooDeep { line } => *line,
        }
    }
}

pub fn parse_program(source: &str) -> Result<Program> {
    parse_program_with_locals(source, &[])
}

/// Parse `source` as if `known_locals` had already been assigned at the top level.
pub fn parse_program_with_locals(source: &str, known_locals: &[String]) -> Result<Program> {
    let tokens = lexer::tokenize(source)?;
    let mut parser = Parser::new(tokens, known_locals.iter().cloned());
    parser.parse_program()
}

#[derive(Debug, Default)]
struct LocalScope {
    names: HashSet<String>,
    /// Blocks see the locals of their enclosing scope; method bodies do not.
    transparent: bool,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    scopes: Vec<LocalScope>,
    /// While positive, `do` belongs to an enclosing command call or loop.
    no_do: usize,
    nesting: usize,
}

fn describe(kind: &TokenKind) -> String {
    use TokenKind::*;
    match kind {
        Newline => "newline".to_owned(),
        Eof => "end of input".to_owned(),
        Int(n) => format!("integer {}", n),
        Float(f) => format!("float {}", f),
        Str(_) => "string literal".to_owned(),
        Symbol(s) => format!("symbol :{}", s),
        Ident(s) => format!("identifier '{}'", s),
        Constant(s) => format!("constant '{}'", s),
        other => format!("'{}'", format!("{:?}", other).to_lowercase()),
    }
}

impl Parser {
    fn new(tokens: Vec<Token>, known_locals: impl IntoIterator<Item = String>) -> Self {
        let top = LocalScope {
            names: known_locals.into_iter().collect(),
            transparent: false,
        };
        Self {
            tokens,
            pos: 0,
            scopes: vec![top],
            no_do: 0,
            nesting: 0,
        }
    }

    fn parse_program(&mut self) -> Result<Program> {
        let body = self.parse_body(&[TokenKind::Eof])?;
        self.expect(TokenKind::Eof, "end of input")?;
        let mut top_level_locals: Vec<String> = self.scopes[0].names.iter().cloned().collect();
        top_level_locals.sort();
        Ok(Program {
            body,
            top_level_locals,
        })
    }

    // ---- token helpers

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_at(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        let tok = self.peek();
        ParseError::Unexpected {
            found: describe(&tok.kind),
            expected,
            line: tok.line,
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.nesting >= MAX_NESTING {
            return Err(ParseError::TooDeep {
                line: self.peek().line,
            });
        }
        self.nesting += 1;
        let res = f(self);
        self.nesting -= 1;
        res
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    fn skip_terms(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Semi) {
            self.advance();
        }
    }

    // ---- locals

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.names.insert(name.to_owned());
        }
    }

    fn is_local(&self, name: &str) -> bool {
        for scope in self.scopes.iter().rev() {
            if scope.names.contains(name) {
                return true;
            }
            if !scope.transparent {
                break;
            }
        }
        false
    }

    fn visible_locals(&self) -> Vec<String> {
        let mut names = Vec::new();
        for scope in self.scopes.iter().rev() {
            names.extend(scope.names.iter().cloned());
            if !scope.transparent {
                break;
            }
        }
        names
    }

    // ---- statements

    fn parse_body(&mut self, terminators: &[TokenKind]) -> Result<Body> {
        let mut body = Vec::new();
        loop {
            self.skip_terms();
            if self.check(&TokenKind::Eof) || terminators.contains(self.peek_kind()) {
                break;
            }
            body.push(self.parse_stmt()?);
            match self.peek_kind() {
                TokenKind::Newline | TokenKind::Semi => continue,
                TokenKind::Eof => break,
                k if terminators.contains(k) => break,
                _ => return Err(self.unexpected("end of statement")),
            }
        }
        Ok(body)
    }

    fn parse_stmt(&mut self) -> Result<Expr> {
        let mut expr = self.parse_expr()?;
        loop {
            let line = self.peek().line;
            expr = match self.peek_kind() {
                TokenKind::If | TokenKind::Unless => {
                    let negate = self.advance().kind == TokenKind::Unless;
                    let cond = self.parse_expr()?;
                    let cond = if negate {
                        Expr::new(line, ExprKind::Not(Box::new(cond)))
                    } else {
                        cond
                    };
                    Expr::new(
                        expr.line,
                        ExprKind::If {
                            cond: Box::new(cond),
                            then_body: vec![expr],
                            else_body: None,
                        },
                    )
                }
                TokenKind::While | TokenKind::Until => {
                    let negate = self.advance().kind == TokenKind::Until;
                    let cond = self.parse_expr()?;
                    Expr::new(
                        expr.line,
                        ExprKind::While {
                            cond: Box::new(cond),
                            body: vec![expr],
                            negate,
                        },
                    )
                }
                _ => break,
            };
        }
        Ok(expr)
    }

    // ---- expressions

    fn parse_expr(&mut self) -> Result<Expr> {
        self.nested(Self::parse_expr_inner)
    }

    fn parse_expr_inner(&mut self) -> Result<Expr> {
        let tok = self.peek().clone();
        if let TokenKind::Ident(name) = &tok.kind {
            let op = match self.peek_at(1).kind {
                TokenKind::Eq => Some(None),
                TokenKind::PlusEq => Some(Some(BinOp::Add)),
                TokenKind::MinusEq => Some(Some(BinOp::Sub)),
                TokenKind::StarEq => Some(Some(BinOp::Mul)),
                _ => None,
            };
            if let Some(op) = op {
                self.advance();
                self.advance();
                self.skip_newlines();
                self.declare(name);
                let rhs = Box::new(self.parse_expr()?);
                let kind = match op {
                    None => ExprKind::Assign(name.clone(), rhs),
                    Some(op) => ExprKind::OpAssign(name.clone(), op, rhs),
                };
                return Ok(Expr::new(tok.line, kind));
            }
        }
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.check(&TokenKind::OrOr) {
            let line = self.advance().line;
            self.skip_newlines();
            let rhs = self.parse_and()?;
            lhs = Expr::new(line, ExprKind::Or(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.check(&TokenKind::AndAnd) {
            let line = self.advance().line;
            self.skip_newlines();
            let rhs = self.parse_equality()?;
            lhs = Expr::new(line, ExprKind::And(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_binary_level(
        &mut self,
        ops: &[(TokenKind, BinOp)],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut lhs = next(self)?;
        'outer: loop {
            for (kind, op) in ops {
                if self.check(kind) {
                    let line = self.advance().line;
                    self.skip_newlines();
                    let rhs = next(self)?;
                    lhs = Expr::new(line, ExprKind::Binary(*op, Box::new(lhs), Box::new(rhs)));
                    continue 'outer;
                }
            }
            break;
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::EqEq, BinOp::Eq),
                (TokenKind::NotEq, BinOp::NotEq),
            ],
            Self::parse_comparison,
        )
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::Lt, BinOp::Lt),
                (TokenKind::LtEq, BinOp::LtEq),
                (TokenKind::Gt, BinOp::Gt),
                (TokenKind::GtEq, BinOp::GtEq),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::Plus, BinOp::Add),
                (TokenKind::Minus, BinOp::Sub),
            ],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[
                (TokenKind::Star, BinOp::Mul),
                (TokenKind::Slash, BinOp::Div),
                (TokenKind::Percent, BinOp::Rem),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        self.nested(Self::parse_unary_inner)
    }

    fn parse_unary_inner(&mut self) -> Result<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::new(tok.line, ExprKind::Not(Box::new(operand))))
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                let kind = match operand.kind {
                    ExprKind::Int(n) => ExprKind::Int(-n),
                    ExprKind::Float(f) => ExprKind::Float(-f),
                    _ => ExprKind::Neg(Box::new(operand)),
                };
                Ok(Expr::new(tok.line, kind))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    self.skip_newlines();
                    let tok = self.advance();
                    let name = match tok.kind {
                        TokenKind::Ident(name) | TokenKind::Constant(name) => name,
                        other => {
                            return Err(ParseError::Unexpected {
                                found: describe(&other),
                                expected: "method name",
                                line: tok.line,
                            })
                        }
                    };
                    expr = self.parse_call_rest(Some(expr), name, tok.line)?;
                }
                TokenKind::LBracket if !self.peek().spaced => {
                    let line = self.advance().line;
                    self.skip_newlines();
                    let index = self.parse_expr()?;
                    self.skip_newlines();
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expr::new(line, ExprKind::Index(Box::new(expr), Box::new(index)));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let tok = self.peek().clone();
        let line = tok.line;
        let kind = match tok.kind {
            TokenKind::Int(n) => {
                self.advance();
                ExprKind::Int(n)
            }
            TokenKind::Float(f) => {
                self.advance();
                ExprKind::Float(f)
            }
            TokenKind::Str(segments) => {
                self.advance();
                ExprKind::Str(self.convert_segments(segments, line)?)
            }
            TokenKind::Symbol(s) => {
                self.advance();
                ExprKind::Symbol(s)
            }
            TokenKind::Nil => {
                self.advance();
                ExprKind::Nil
            }
            TokenKind::True => {
                self.advance();
                ExprKind::True
            }
            TokenKind::False => {
                self.advance();
                ExprKind::False
            }
            TokenKind::SelfKw => {
                self.advance();
                ExprKind::SelfRef
            }
            TokenKind::Constant(name) => {
                self.advance();
                ExprKind::Const(name)
            }
            TokenKind::LBracket => {
                self.advance();
                let saved = std::mem::take(&mut self.no_do);
                let items = self.parse_list(TokenKind::RBracket, "']'")?;
                self.no_do = saved;
                ExprKind::Array(items)
            }
            TokenKind::LParen => {
                self.advance();
                let saved = std::mem::take(&mut self.no_do);
                self.skip_newlines();
                let inner = self.parse_stmt()?;
                self.skip_newlines();
                self.expect(TokenKind::RParen, "')'")?;
                self.no_do = saved;
                return Ok(inner);
            }
            TokenKind::Ident(name) => {
                self.advance();
                let is_paren_call = self.check(&TokenKind::LParen) && !self.peek().spaced;
                if self.is_local(&name) && !is_paren_call {
                    ExprKind::Var(name)
                } else {
                    return self.parse_call_rest(None, name, line);
                }
            }
            TokenKind::Def => return self.parse_def(),
            TokenKind::If | TokenKind::Unless => {
                let negate = self.advance().kind == TokenKind::Unless;
                return self.parse_if_rest(line, negate);
            }
            TokenKind::While | TokenKind::Until => return self.parse_while(),
            TokenKind::Begin => {
                self.advance();
                let body = self.parse_body(&[TokenKind::End])?;
                self.expect(TokenKind::End, "'end'")?;
                ExprKind::Begin(body)
            }
            TokenKind::Return => {
                self.advance();
                ExprKind::Return(self.parse_jump_value()?)
            }
            TokenKind::Break => {
                self.advance();
                ExprKind::Break(self.parse_jump_value()?)
            }
            TokenKind::Next => {
                self.advance();
                ExprKind::Next(self.parse_jump_value()?)
            }
            TokenKind::Yield => {
                self.advance();
                let args = if self.check(&TokenKind::LParen) && !self.peek().spaced {
                    self.advance();
                    self.parse_paren_args()?
                } else if self.command_arg_start() {
                    self.parse_command_args()?
                } else {
                    Vec::new()
                };
                ExprKind::Yield(args)
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Expr::new(line, kind))
    }

    fn parse_jump_value(&mut self) -> Result<Option<Box<Expr>>> {
        let modifier = matches!(
            self.peek_kind(),
            TokenKind::If | TokenKind::Unless | TokenKind::While | TokenKind::Until
        );
        if self.peek().spaced && !modifier && can_start_expr(self.peek_kind()) {
            Ok(Some(Box::new(self.parse_expr()?)))
        } else {
            Ok(None)
        }
    }

    fn convert_segments(&mut self, segments: Vec<Segment>, line: usize) -> Result<Vec<StrPart>> {
        let mut parts = Vec::with_capacity(segments.len());
        for seg in segments {
            match seg {
                Segment::Text(s) => parts.push(StrPart::Text(s)),
                Segment::Code { src, .. } => {
                    let mut tokens = lexer::tokenize(&src)?;
                    for t in &mut tokens {
                        t.line += line - 1;
                    }
                    let mut sub = Parser::new(tokens, self.visible_locals());
                    let body = sub.parse_body(&[TokenKind::Eof])?;
                    sub.expect(TokenKind::Eof, "'}'")?;
                    parts.push(StrPart::Interp(body));
                }
            }
        }
        Ok(parts)
    }

    /// Comma separated expressions up to `close`, newlines allowed.
    fn parse_list(&mut self, close: TokenKind, expected: &'static str) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        self.skip_newlines();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            self.skip_newlines();
            items.push(self.parse_expr()?);
            self.skip_newlines();
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(close, expected)?;
            return Ok(items);
        }
    }

    fn parse_paren_args(&mut self) -> Result<Vec<Expr>> {
        let saved = std::mem::take(&mut self.no_do);
        let args = self.parse_list(TokenKind::RParen, "')'");
        self.no_do = saved;
        args
    }

    fn command_arg_start(&self) -> bool {
        let tok = self.peek();
        if !tok.spaced {
            return false;
        }
        match tok.kind {
            TokenKind::Minus => !self.peek_at(1).spaced,
            TokenKind::LBracket | TokenKind::LParen | TokenKind::Bang => true,
            ref k => can_start_expr(k) && !matches!(k, TokenKind::If | TokenKind::Unless | TokenKind::While | TokenKind::Until),
        }
    }

    fn parse_command_args(&mut self) -> Result<Vec<Expr>> {
        self.no_do += 1;
        let mut args = Vec::new();
        let res = loop {
            match self.parse_expr() {
                Ok(arg) => args.push(arg),
                Err(e) => break Err(e),
            }
            if self.eat(&TokenKind::Comma) {
                self.skip_newlines();
                continue;
            }
            break Ok(());
        };
        self.no_do -= 1;
        res.map(|()| args)
    }

    fn parse_call_rest(
        &mut self,
        receiver: Option<Expr>,
        name: String,
        line: usize,
    ) -> Result<Expr> {
        let mut parens = false;
        let args = if self.check(&TokenKind::LParen) && !self.peek().spaced {
            self.advance();
            parens = true;
            self.parse_paren_args()?
        } else if self.command_arg_start() {
            self.parse_command_args()?
        } else {
            Vec::new()
        };
        let block = self.parse_block_opt()?;
        let bare = receiver.is_none() && !parens && args.is_empty() && block.is_none();
        Ok(Expr::new(
            line,
            ExprKind::Call(Call {
                receiver: receiver.map(Box::new),
                name,
                args,
                block,
                bare,
            }),
        ))
    }

    fn parse_block_opt(&mut self) -> Result<Option<Rc<BlockDef>>> {
        let close = match self.peek_kind() {
            TokenKind::LBrace => TokenKind::RBrace,
            TokenKind::Do if self.no_do == 0 => TokenKind::End,
            _ => return Ok(None),
        };
        self.advance();
        let saved = std::mem::take(&mut self.no_do);
        self.scopes.push(LocalScope {
            names: HashSet::new(),
            transparent: true,
        });

        let res = self.parse_block_inner(close);

        self.scopes.pop();
        self.no_do = saved;
        res.map(|block| Some(Rc::new(block)))
    }

    fn parse_block_inner(&mut self, close: TokenKind) -> Result<BlockDef> {
        let mut params = Vec::new();
        if self.eat(&TokenKind::OrOr) {
            // `{ || ... }`
        } else if self.eat(&TokenKind::Pipe) {
            loop {
                let tok = self.advance();
                let TokenKind::Ident(name) = tok.kind else {
                    return Err(ParseError::Unexpected {
                        found: describe(&tok.kind),
                        expected: "block parameter",
                        line: tok.line,
                    });
                };
                self.declare(&name);
                params.push(name);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Pipe, "'|'")?;
        }
        let expected = if close == TokenKind::End { "'end'" } else { "'}'" };
        let body = self.parse_body(&[close.clone()])?;
        self.expect(close, expected)?;
        Ok(BlockDef { params, body })
    }

    fn parse_def(&mut self) -> Result<Expr> {
        let line = self.advance().line;
        let tok = self.advance();
        let name = match tok.kind {
            TokenKind::Ident(name) | TokenKind::Constant(name) => name,
            other => {
                return Err(ParseError::Unexpected {
                    found: describe(&other),
                    expected: "method name",
                    line: tok.line,
                })
            }
        };

        self.scopes.push(LocalScope::default());
        let res = self.parse_def_inner(name, line);
        self.scopes.pop();
        res
    }

    fn parse_def_inner(&mut self, name: String, line: usize) -> Result<Expr> {
        let mut params = Vec::new();
        let parenthesized = self.eat(&TokenKind::LParen);
        if parenthesized || matches!(self.peek_kind(), TokenKind::Ident(_)) {
            let close = if parenthesized {
                TokenKind::RParen
            } else {
                TokenKind::Newline
            };
            if !self.check(&close) {
                loop {
                    let tok = self.advance();
                    let TokenKind::Ident(pname) = tok.kind else {
                        return Err(ParseError::Unexpected {
                            found: describe(&tok.kind),
                            expected: "parameter name",
                            line: tok.line,
                        });
                    };
                    self.declare(&pname);
                    let default = if self.eat(&TokenKind::Eq) {
                        Some(self.parse_expr()?)
                    } else {
                        None
                    };
                    params.push(Param {
                        name: pname,
                        default,
                    });
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            if parenthesized {
                self.expect(TokenKind::RParen, "')'")?;
            }
        }

        let body = self.parse_body(&[TokenKind::End])?;
        self.expect(TokenKind::End, "'end'")?;
        Ok(Expr::new(
            line,
            ExprKind::Def(Rc::new(MethodDef {
                name,
                params,
                body,
                line,
            })),
        ))
    }

    fn parse_if_rest(&mut self, line: usize, negate: bool) -> Result<Expr> {
        let mut cond = self.parse_expr()?;
        if negate {
            cond = Expr::new(cond.line, ExprKind::Not(Box::new(cond)));
        }
        self.eat(&TokenKind::Then);
        let then_body = self.parse_body(&[TokenKind::Elsif, TokenKind::Else, TokenKind::End])?;
        let else_body = match self.peek_kind() {
            TokenKind::Elsif => {
                let elsif_line = self.advance().line;
                Some(vec![self.nested(|p| p.parse_if_rest(elsif_line, false))?])
            }
            TokenKind::Else => {
                self.advance();
                let body = self.parse_body(&[TokenKind::End])?;
                self.expect(TokenKind::End, "'end'")?;
                Some(body)
            }
            _ => {
                self.expect(TokenKind::End, "'end'")?;
                None
            }
        };
        Ok(Expr::new(
            line,
            ExprKind::If {
                cond: Box::new(cond),
                then_body,
                else_body,
            },
        ))
    }

    fn parse_while(&mut self) -> Result<Expr> {
        let tok = self.advance();
        let negate = tok.kind == TokenKind::Until;
        self.no_do += 1;
        let cond = self.parse_expr();
        self.no_do -= 1;
        let cond = cond?;
        self.eat(&TokenKind::Do);
        let body = self.parse_body(&[TokenKind::End])?;
        self.expect(TokenKind::End, "'end'")?;
        Ok(Expr::new(
            tok.line,
            ExprKind::While {
                cond: Box::new(cond),
                body,
                negate,
            },
        ))
    }
}

fn can_start_expr(kind: &TokenKind) -> bool {
    use TokenKind::*;
    matches!(
        kind,
        Int(_)
            | Float(_)
            | Str(_)
            | Symbol(_)
            | Ident(_)
            | Constant(_)
            | Nil
            | True
            | False
            | SelfKw
            | LBracket
            | LParen
            | Bang
            | Minus
            | Def
            | If
            | Unless
            | While
            | Until
            | Begin
            | Yield
    )
}

#[cfg(test)]
mod test {
    use super::*;

    fn body(src: &str) -> Body {
        parse_program(src).unwrap().body
    }

    fn call_name(e: &Expr) -> &str {
        match &e.kind {
            ExprKind::Call(c) => &c.name,
            other => panic!("not a call: {:?}", other),
        }
    }

    #[test]
    fn command_call_without_parens() {
        let b = body("say_hi \"Sunny\"");
        let ExprKind::Call(call) = &b[0].kind else { panic!() };
        assert_eq!(call.name, "say_hi");
        assert_eq!(call.args.len(), 1);
        assert!(!call.bare);

        let b = body("say_hi");
        let ExprKind::Call(call) = &b[0].kind else { panic!() };
        assert!(call.bare);
    }

    #[test]
    fn def_with_default_param() {
        let b = body("def say_hi(name = \"Rubyist\")\n  puts \"Hi there, #{name}!\"\nend");
        let ExprKind::Def(def) = &b[0].kind else { panic!() };
        assert_eq!(def.name, "say_hi");
        assert_eq!(def.params.len(), 1);
        assert_eq!(def.required_arity(), 0);
        let ExprKind::Call(puts) = &def.body[0].kind else { panic!() };
        let ExprKind::Str(parts) = &puts.args[0].kind else { panic!() };
        assert_eq!(parts.len(), 3);
        // `name` inside the interpolation is the parameter, not a call
        let StrPart::Interp(inner) = &parts[1] else { panic!() };
        assert_eq!(inner[0].kind, ExprKind::Var("name".into()));
    }

    #[test]
    fn do_block_binds_to_outermost_command_call() {
        let b = body("describe \"x\" do\n  it \"runs\" do\n  end\nend");
        let ExprKind::Call(describe) = &b[0].kind else { panic!() };
        assert_eq!(describe.name, "describe");
        assert_eq!(describe.args.len(), 1);
        let block = describe.block.as_ref().unwrap();
        assert_eq!(call_name(&block.body[0]), "it");
    }

    #[test]
    fn each_with_index_block_params() {
        let b = body("[1, 2, 3].each_with_index do |n, i|\n  puts n\nend");
        let ExprKind::Call(call) = &b[0].kind else { panic!() };
        assert_eq!(call.name, "each_with_index");
        assert!(matches!(call.receiver.as_deref().map(|e| &e.kind), Some(ExprKind::Array(_))));
        assert_eq!(call.block.as_ref().unwrap().params, vec!["n", "i"]);
    }

    #[test]
    fn modifiers_and_guard_clause() {
        let b = body("def f(x)\n  return nil if x.class != String\n  x.reverse\nend");
        let ExprKind::Def(def) = &b[0].kind else { panic!() };
        assert!(matches!(def.body[0].kind, ExprKind::If { .. }));
        assert_eq!(def.body[1].line, 3);
    }

    #[test]
    fn locals_shadow_method_calls() {
        let b = body("x = 1\nx - 1");
        assert!(matches!(b[1].kind, ExprKind::Binary(BinOp::Sub, ..)));
        let p = parse_program("puts x").unwrap();
        let ExprKind::Call(puts) = &p.body[0].kind else { panic!() };
        let ExprKind::Call(x) = &puts.args[0].kind else { panic!() };
        assert!(x.bare);

        let p = parse_program_with_locals("puts x", &["x".to_owned()]).unwrap();
        let ExprKind::Call(puts) = &p.body[0].kind else { panic!() };
        assert_eq!(puts.args[0].kind, ExprKind::Var("x".into()));
    }

    #[test]
    fn top_level_locals_are_reported() {
        let p = parse_program("sum1 = 1\ndef f(a)\n  b = a\nend\nsum2 = 2").unwrap();
        assert_eq!(p.top_level_locals, vec!["sum1", "sum2"]);
    }

    #[test]
    fn elsif_chain() {
        let b = body("if a == 1\n  1\nelsif a == 2\n  2\nelse\n  3\nend");
        let ExprKind::If { else_body, .. } = &b[0].kind else { panic!() };
        let nested = &else_body.as_ref().unwrap()[0];
        let ExprKind::If { else_body, .. } = &nested.kind else { panic!() };
        assert_eq!(else_body.as_ref().unwrap()[0].kind, ExprKind::Int(3));
    }

    #[test]
    fn syntax_errors() {
        let err = parse_program("def f(\n  1\nend").unwrap_err();
        assert!(matches!(err, ParseError::Unexpected { expected: "parameter name", .. }));

        let err = parse_program("[1, 2].each do |n|\n  puts n\n").unwrap_err();
        assert!(matches!(err, ParseError::Unexpected { expected: "'end'", .. }), "{:?}", err);

        let err = parse_program("x = )").unwrap_err();
        assert_eq!(err.line(), 1);
    }

    #[test]
    fn deep_nesting_is_an_error() {
        let depth = 20_000;
        let src = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        let err = parse_program(&src).unwrap_err();
        assert_eq!(err, ParseError::TooDeep { line: 1 });

        let src = format!("x = {}true", "!".repeat(depth));
        assert!(matches!(parse_program(&src), Err(ParseError::TooDeep { .. })));

        let src = format!("{}1{}", "[".repeat(10), "]".repeat(10));
        assert!(parse_program(&src).is_ok());
    }
}

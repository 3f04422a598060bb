//! Push-driven statement parser.
//!
//! The parser never asks the lexer for more input and never looks ahead
//! across a statement boundary: each call to [`Parser::push`] hands it one
//! token, and it buffers everything between two [`Token::EndOfStatement`]s
//! before reducing the whole buffered run in a single pass. A true
//! incremental (shift-reduce-as-you-go) parser isn't needed here — the
//! grammar's argument list is just a repetition of `key value` pairs, so
//! any prefix of it is already a valid partial parse, and a statement never
//! spans more than one physical line. Buffering the handful of tokens in
//! one line and parsing them in one shot is simpler and exactly as
//! correct.

use crate::ast::{Node, OpKind};
use gcode_lex::{KeywordId, Token};
use gcode_util::{Diagnostic, Span};

/// Result of feeding one token to the parser.
pub enum PushOutcome {
    /// The statement is still being accumulated.
    More,
    /// A complete statement was reduced.
    Statement(Node),
    /// The buffered statement failed to parse; the diagnostic describing
    /// why is available from [`Parser::take_diagnostics`].
    Error,
}

/// Accumulates tokens for one statement at a time and reduces each one to
/// an AST [`Node`] as soon as its `EndOfStatement` arrives.
pub struct Parser {
    buf: Vec<(Token, Span)>,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn push(&mut self, token: Token, span: Span) -> PushOutcome {
        match token {
            Token::EndOfStatement { ok: true } => {
                let tokens = std::mem::take(&mut self.buf);
                let mut reducer = Reducer::new(tokens);
                match parse_statement(&mut reducer) {
                    Ok(node) => PushOutcome::Statement(node),
                    Err(diag) => {
                        self.diagnostics.push(diag);
                        PushOutcome::Error
                    }
                }
            }
            // The lexer already reported the diagnostic for this line; the
            // tokens before it are a partial statement, not a clean one, and
            // must not reduce into an `on_statement` call.
            Token::EndOfStatement { ok: false } => {
                self.buf.clear();
                PushOutcome::More
            }
            _ => {
                self.buf.push((token, span));
                PushOutcome::More
            }
        }
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Discard any partially-buffered statement.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// A cursor over one statement's already-complete token buffer.
struct Reducer {
    tokens: Vec<(Token, Span)>,
    pos: usize,
}

impl Reducer {
    fn new(tokens: Vec<(Token, Span)>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .or_else(|| self.tokens.last().map(|(_, s)| *s))
            .unwrap_or_default()
    }

    fn peek_keyword(&self, kw: KeywordId) -> bool {
        matches!(self.peek(), Some(Token::Keyword(k)) if *k == kw)
    }

    fn peek_bridge(&self) -> bool {
        matches!(self.peek(), Some(Token::Bridge))
    }

    fn advance(&mut self) -> Option<(Token, Span)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn err(&self, message: impl Into<String>) -> Diagnostic {
        Diagnostic::error(message, self.peek_span())
    }
}

fn expect_ident(r: &mut Reducer) -> Result<gcode_util::Symbol, Diagnostic> {
    match r.advance() {
        Some((Token::Ident(sym), _)) => Ok(sym),
        _ => Err(r.err("expected an identifier")),
    }
}

fn expect_keyword(r: &mut Reducer, kw: KeywordId) -> Result<(), Diagnostic> {
    if r.peek_keyword(kw) {
        r.advance();
        Ok(())
    } else {
        Err(r.err(format!("expected {kw:?}")))
    }
}

fn parse_statement(r: &mut Reducer) -> Result<Node, Diagnostic> {
    let command = match r.advance() {
        Some((Token::Ident(name), _)) => name,
        Some((_, span)) => {
            return Err(Diagnostic::error(
                "a statement must start with a command name",
                span,
            ))
        }
        None => return Err(Diagnostic::error("empty statement", Span::default())),
    };

    let mut fields = vec![Node::String(command.as_str().into())];
    if r.at_end() {
        return Ok(Node::Statement { fields });
    }

    if matches!(r.peek(), Some(Token::Ident(_))) {
        while !r.at_end() {
            let key = expect_ident(r)?;
            fields.push(Node::String(key.as_str().into()));
            fields.push(parse_value_sequence(r)?);
        }
    } else {
        fields.push(parse_value_sequence(r)?);
    }

    Ok(Node::Statement { fields })
}

/// One argument's value: a run of segments (string runs, numbers, `{expr}`
/// blocks) joined by `Bridge` tokens, folded into a single expression via
/// `Concat`.
fn parse_value_sequence(r: &mut Reducer) -> Result<Node, Diagnostic> {
    let mut segments = Vec::new();
    loop {
        let segment = match r.peek() {
            Some(Token::Int(n)) => {
                let n = *n;
                r.advance();
                Node::Integer(n)
            }
            Some(Token::Float(f)) => {
                let f = *f;
                r.advance();
                Node::Float(f)
            }
            Some(Token::Str(s)) => {
                let s = *s;
                r.advance();
                Node::String(s.as_str().into())
            }
            Some(Token::Keyword(KeywordId::LBrace)) => {
                r.advance();
                let expr = parse_expr(r, 0)?;
                expect_keyword(r, KeywordId::RBrace)?;
                expr
            }
            _ => return Err(r.err("expected a value")),
        };
        segments.push(segment);

        if r.peek_bridge() {
            r.advance();
            continue;
        }
        break;
    }
    Ok(fold_concat(segments))
}

fn fold_concat(mut segments: Vec<Node>) -> Node {
    if segments.len() == 1 {
        return segments.pop().expect("checked len == 1");
    }
    let mut iter = segments.into_iter();
    let mut acc = iter.next().expect("at least one segment");
    for seg in iter {
        acc = Node::operator(OpKind::Concat, vec![acc, seg]);
    }
    acc
}

/// Left/right binding power for each binary operator. Higher binds
/// tighter. `rbp = lbp + 1` gives the usual left-associative climb;
/// operators that need right-associativity instead pass `rbp = lbp` at
/// their call site (only the ternary does, handled separately below).
fn binop_bp(tok: &Token) -> Option<(OpKind, u8, u8)> {
    use KeywordId::*;
    match tok {
        Token::Keyword(Or) => Some((OpKind::Or, 10, 11)),
        Token::Keyword(And) => Some((OpKind::And, 20, 21)),
        Token::Keyword(Equals) => Some((OpKind::Equals, 30, 31)),
        Token::Keyword(Tilde) => Some((OpKind::Concat, 40, 41)),
        Token::Keyword(Plus) => Some((OpKind::Add, 50, 51)),
        Token::Keyword(Minus) => Some((OpKind::Sub, 50, 51)),
        Token::Keyword(Star) => Some((OpKind::Mul, 60, 61)),
        Token::Keyword(Slash) => Some((OpKind::Div, 60, 61)),
        Token::Keyword(Percent) => Some((OpKind::Mod, 60, 61)),
        Token::Keyword(Lt) => Some((OpKind::Lt, 70, 71)),
        Token::Keyword(Gt) => Some((OpKind::Gt, 70, 71)),
        Token::Keyword(Lte) => Some((OpKind::Lte, 70, 71)),
        Token::Keyword(Gte) => Some((OpKind::Gte, 70, 71)),
        _ => None,
    }
}

/// Precedence-climbing entry point for one `{...}` expression. `min_bp` is
/// the binding power the caller needs beaten to keep extending its own
/// left-hand side; `0` means "parse as much as possible".
///
/// The ternary (`then if cond else else`) sits between the comparison
/// operators and `**` in binding power, so it is checked ahead of the
/// generic binary-operator table on every iteration — it always outranks
/// every `min_bp` this parser ever calls itself with.
fn parse_expr(r: &mut Reducer, min_bp: u8) -> Result<Node, Diagnostic> {
    let mut lhs = parse_pow(r)?;
    loop {
        if r.peek_keyword(KeywordId::If) {
            r.advance();
            let cond = parse_expr(r, 0)?;
            expect_keyword(r, KeywordId::Else)?;
            let else_expr = parse_expr(r, 0)?;
            lhs = Node::operator(OpKind::IfElse, vec![lhs, cond, else_expr]);
            continue;
        }
        let Some(tok) = r.peek() else { break };
        let Some((kind, lbp, rbp)) = binop_bp(tok) else {
            break;
        };
        if lbp < min_bp {
            break;
        }
        r.advance();
        let rhs = parse_expr(r, rbp)?;
        lhs = Node::operator(kind, vec![lhs, rhs]);
    }
    Ok(lhs)
}

/// `**`, right-associative, binding tighter than the ternary but looser
/// than unary operators — `-2**2` is `(-2)**2`, and `2**3**2` is
/// `2**(3**2)`.
fn parse_pow(r: &mut Reducer) -> Result<Node, Diagnostic> {
    let lhs = parse_unary(r)?;
    if r.peek_keyword(KeywordId::StarStar) {
        r.advance();
        let rhs = parse_pow(r)?;
        Ok(Node::operator(OpKind::Pow, vec![lhs, rhs]))
    } else {
        Ok(lhs)
    }
}

/// Unary `!`, binding looser than unary `+`/`-` so that `!-x` is `!(-x)`.
fn parse_unary(r: &mut Reducer) -> Result<Node, Diagnostic> {
    if r.peek_keyword(KeywordId::Bang) {
        r.advance();
        let operand = parse_sign(r)?;
        Ok(Node::operator(OpKind::Not, vec![operand]))
    } else {
        parse_sign(r)
    }
}

/// Unary `+`/`-`, binding tighter than `!` but looser than postfix `.`/`[`.
/// Unary `+` is transparent — it has no `OpKind` of its own, matching the
/// AST's "no-op" treatment of a redundant leading plus.
fn parse_sign(r: &mut Reducer) -> Result<Node, Diagnostic> {
    if r.peek_keyword(KeywordId::Plus) {
        r.advance();
        parse_sign(r)
    } else if r.peek_keyword(KeywordId::Minus) {
        r.advance();
        let operand = parse_sign(r)?;
        Ok(Node::operator(OpKind::Neg, vec![operand]))
    } else {
        parse_postfix(r)
    }
}

/// `a.b` and `a[b]`, left-associative, the tightest-binding operators.
fn parse_postfix(r: &mut Reducer) -> Result<Node, Diagnostic> {
    let mut node = parse_atom(r)?;
    loop {
        if r.peek_keyword(KeywordId::Dot) {
            r.advance();
            let field = expect_ident(r)?;
            node = Node::operator(OpKind::Lookup, vec![node, Node::Parameter(field)]);
        } else if r.peek_keyword(KeywordId::LBracket) {
            r.advance();
            let index = parse_expr(r, 0)?;
            expect_keyword(r, KeywordId::RBracket)?;
            node = Node::operator(OpKind::Lookup, vec![node, index]);
        } else {
            break;
        }
    }
    Ok(node)
}

fn parse_atom(r: &mut Reducer) -> Result<Node, Diagnostic> {
    match r.advance() {
        Some((Token::Int(n), _)) => Ok(Node::Integer(n)),
        Some((Token::Float(f), _)) => Ok(Node::Float(f)),
        Some((Token::Str(s), _)) => Ok(Node::String(s.as_str().into())),
        Some((Token::Keyword(KeywordId::True), _)) => Ok(Node::Bool(true)),
        Some((Token::Keyword(KeywordId::False), _)) => Ok(Node::Bool(false)),
        Some((Token::Keyword(KeywordId::Nan), _)) => Ok(Node::Float(f64::NAN)),
        Some((Token::Keyword(KeywordId::Infinity), _)) => Ok(Node::Float(f64::INFINITY)),
        Some((Token::Keyword(KeywordId::LParen), _)) => {
            let inner = parse_expr(r, 0)?;
            expect_keyword(r, KeywordId::RParen)?;
            Ok(inner)
        }
        Some((Token::Ident(name), _)) => {
            if r.peek_keyword(KeywordId::LParen) {
                r.advance();
                let args = parse_call_args(r)?;
                Ok(Node::Function { name, args })
            } else {
                Ok(Node::Parameter(name))
            }
        }
        Some((other, span)) => Err(Diagnostic::error(
            format!("unexpected token in expression: {other:?}"),
            span,
        )),
        None => Err(r.err("expected an expression")),
    }
}

fn parse_call_args(r: &mut Reducer) -> Result<Vec<Node>, Diagnostic> {
    let mut args = Vec::new();
    if r.peek_keyword(KeywordId::RParen) {
        r.advance();
        return Ok(args);
    }
    loop {
        args.push(parse_expr(r, 0)?);
        if r.peek_keyword(KeywordId::Comma) {
            r.advance();
            continue;
        }
        expect_keyword(r, KeywordId::RParen)?;
        break;
    }
    Ok(args)
}

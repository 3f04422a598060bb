//! The incremental lexer.
//!
//! `feed` may be called with arbitrarily small chunks — a single byte at a
//! time is a valid (if slow) way to drive this. Every scanning function is
//! written so that running out of buffered input just suspends (`mode` and
//! whatever partial token text is in `buf` describe exactly where to
//! resume); nothing about the result depends on where the chunk boundaries
//! fell. `finish` flushes a trailing statement that never saw its newline.

use crate::cursor::Cursor;
use crate::numeric;
use crate::token::{word_keyword, KeywordId, Token};
use gcode_util::{Diagnostic, Position, Span, Symbol};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ValueCtx {
    Traditional,
    Extended,
    Raw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Radix {
    Dec,
    Hex,
    Oct,
    Bin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NumState {
    Detect,
    IntBody(Radix),
    AfterInt(Radix),
    FracBody(Radix),
    AfterFrac(Radix),
    ExpSign(Radix),
    ExpBody(Radix),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StrState {
    Body,
    AfterBackslash,
    Octal { value: u32, digits: u8 },
    Hex { value: u32, digits: u8 },
    Unicode { value: u32, remaining: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    LinePrefix,
    LineNumber,
    CommandName,
    AfterCommandName,
    TradKey,
    TradAfterKey,
    TradValue,
    ExtKey,
    ExtKeyBody,
    ExtAfterKeyExpectEquals,
    ExtValue,
    RawValue,
    NumberLit(NumState),
    StringLit(StrState),
    Expression,
    ExprIdent,
    LineComment,
    ScanError,
}

enum StepResult {
    Progress,
    NeedMore,
}

/// A resumable, byte-at-a-time lexer for one input stream.
pub struct Lexer {
    cursor: Cursor,
    mode: Mode,
    value_ctx: ValueCtx,
    /// Modes to return to once the current `NumberLit`/`StringLit`/
    /// `Expression` sub-scan completes. Depth is at most 2 (a string
    /// literal nested inside an expression nested inside a value).
    resume_stack: Vec<Mode>,
    /// Has the value currently being scanned already produced a segment?
    /// Drives bridge-token insertion between adjacent segments.
    seg_started: bool,
    /// Raw text of the token currently being accumulated.
    buf: Vec<u8>,
    token_start: Position,
    tokens: Vec<(Token, Span)>,
    diagnostics: Vec<Diagnostic>,
    tokens_emitted_this_stmt: u32,
}

impl Lexer {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Like [`Lexer::new`], pre-reserving room for `capacity` tokens and
    /// diagnostics. A hint, not a limit — both buffers still grow as
    /// needed.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cursor: Cursor::new(),
            mode: Mode::LinePrefix,
            value_ctx: ValueCtx::Extended,
            resume_stack: Vec::new(),
            seg_started: false,
            buf: Vec::new(),
            token_start: Position::START,
            tokens: Vec::with_capacity(capacity),
            diagnostics: Vec::new(),
            tokens_emitted_this_stmt: 0,
        }
    }

    /// Feed more bytes and scan as far as possible.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.cursor.feed(bytes);
        self.run();
    }

    /// Flush a dangling statement as if a final newline had arrived.
    pub fn finish(&mut self) {
        match self.mode {
            Mode::LinePrefix => {}
            Mode::LineComment => self.mode = Mode::LinePrefix,
            Mode::StringLit(_) => {
                self.unterminated("string literal");
            }
            Mode::Expression | Mode::ExprIdent => {
                self.unterminated("expression");
            }
            _ => {
                self.cursor.feed(b"\n");
                self.run();
            }
        }
    }

    /// Discard all in-progress state and any buffered tokens/diagnostics,
    /// as if the lexer had just been constructed.
    pub fn reset(&mut self) {
        *self = Lexer::new();
    }

    pub fn take_tokens(&mut self) -> Vec<(Token, Span)> {
        std::mem::take(&mut self.tokens)
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn run(&mut self) {
        while let StepResult::Progress = self.step() {}
    }

    fn step(&mut self) -> StepResult {
        match self.mode {
            Mode::LinePrefix => self.step_line_prefix(),
            Mode::LineNumber => self.step_line_number(),
            Mode::CommandName => self.step_command_name(),
            Mode::AfterCommandName => self.step_after_command_name(),
            Mode::TradKey => self.step_trad_key(),
            Mode::TradAfterKey => self.step_trad_after_key(),
            Mode::TradValue => self.step_value(ValueCtx::Traditional),
            Mode::ExtKey => self.step_ext_key(),
            Mode::ExtKeyBody => self.step_ext_key_body(),
            Mode::ExtAfterKeyExpectEquals => self.step_ext_after_key(),
            Mode::ExtValue => self.step_value(ValueCtx::Extended),
            Mode::RawValue => self.step_raw_value(),
            Mode::NumberLit(state) => self.step_number(state),
            Mode::StringLit(state) => self.step_string(state),
            Mode::Expression => self.step_expression(),
            Mode::ExprIdent => self.step_expr_ident(),
            Mode::LineComment => self.step_line_comment(),
            Mode::ScanError => self.step_scan_error(),
        }
    }

    // ---- bookkeeping helpers ----

    fn push_token(&mut self, token: Token, span: Span) {
        self.tokens_emitted_this_stmt += 1;
        self.tokens.push((token, span));
    }

    fn point_span(&self) -> Span {
        Span::point(self.cursor.position())
    }

    /// Called right before scanning a new value segment (a number, a
    /// string, or a `{expr}`). Inserts a bridge token if this value already
    /// produced an earlier segment with nothing separating them.
    fn begin_segment(&mut self) {
        if self.seg_started {
            self.push_token(Token::Bridge, self.point_span());
        }
        self.seg_started = true;
    }

    /// End the current statement: emit `EndOfStatement` if any token was
    /// produced for it, reset per-statement state, and return to
    /// `LinePrefix`. Whatever follows on the line (more whitespace, a
    /// comment) is handled by `LinePrefix` itself on the next step.
    fn end_statement_content(&mut self) {
        if self.tokens_emitted_this_stmt > 0 {
            let span = self.point_span();
            self.push_token(Token::EndOfStatement { ok: true }, span);
        }
        self.tokens_emitted_this_stmt = 0;
        self.resume_stack.clear();
        self.mode = Mode::LinePrefix;
        self.cursor.compact();
    }

    /// A lexical error: report it, flush whatever tokens this statement
    /// already produced (an `EndOfStatement` is only sent if at least one
    /// real token came before the error — an empty line due to garbage at
    /// its very start owes the parser nothing), then discard the rest of
    /// the physical line.
    fn error(&mut self, message: impl Into<String>, offending: Option<char>) -> StepResult {
        let span = self.point_span();
        let mut diag = Diagnostic::error(message, span);
        if let Some(c) = offending {
            diag = diag.with_char(c);
        }
        self.diagnostics.push(diag);
        if self.tokens_emitted_this_stmt > 0 {
            self.push_token(Token::EndOfStatement { ok: false }, span);
        }
        self.tokens_emitted_this_stmt = 0;
        self.resume_stack.clear();
        self.buf.clear();
        self.mode = Mode::ScanError;
        StepResult::Progress
    }

    /// A newline arrived while inside a string literal or an expression:
    /// both are statically required to close before end of line.
    fn unterminated(&mut self, what: &str) -> StepResult {
        let span = self.point_span();
        self.diagnostics
            .push(Diagnostic::error(format!("unterminated {what}"), span));
        if self.tokens_emitted_this_stmt > 0 {
            self.push_token(Token::EndOfStatement { ok: false }, span);
        }
        self.tokens_emitted_this_stmt = 0;
        self.resume_stack.clear();
        self.buf.clear();
        if self.cursor.current() == Some(b'\n') {
            self.cursor.advance();
        }
        self.mode = Mode::LinePrefix;
        self.cursor.compact();
        StepResult::Progress
    }

    // ---- line prefix / command name ----

    fn step_line_prefix(&mut self) -> StepResult {
        loop {
            match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.cursor.advance();
                }
                Some(b'\n') => {
                    self.cursor.advance();
                    self.cursor.compact();
                    return StepResult::Progress;
                }
                Some(b';') => {
                    self.mode = Mode::LineComment;
                    return StepResult::Progress;
                }
                Some(b'N') | Some(b'n') => match self.cursor.peek(1) {
                    None => return StepResult::NeedMore,
                    Some(d) if d.is_ascii_digit() => {
                        self.cursor.advance();
                        self.mode = Mode::LineNumber;
                        return StepResult::Progress;
                    }
                    Some(_) => {
                        self.token_start = self.cursor.position();
                        self.mode = Mode::CommandName;
                        return StepResult::Progress;
                    }
                },
                Some(b) if b.is_ascii_alphabetic() => {
                    self.token_start = self.cursor.position();
                    self.mode = Mode::CommandName;
                    return StepResult::Progress;
                }
                Some(other) => return self.error("unexpected character", Some(other as char)),
            }
        }
    }

    fn step_line_number(&mut self) -> StepResult {
        loop {
            match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b) if b.is_ascii_digit() => {
                    self.cursor.advance();
                }
                Some(_) => {
                    self.mode = Mode::LinePrefix;
                    return StepResult::Progress;
                }
            }
        }
    }

    fn step_command_name(&mut self) -> StepResult {
        loop {
            match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b) if is_command_char(b) => {
                    self.cursor.advance();
                    self.buf.push(b.to_ascii_uppercase());
                }
                Some(_) => {
                    let name = String::from_utf8(std::mem::take(&mut self.buf)).unwrap_or_default();
                    let span = Span::new(self.token_start, self.cursor.position());
                    self.value_ctx = classify(&name);
                    self.push_token(Token::Ident(Symbol::intern(&name)), span);
                    self.mode = Mode::AfterCommandName;
                    return StepResult::Progress;
                }
            }
        }
    }

    fn step_after_command_name(&mut self) -> StepResult {
        loop {
            match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b' ') | Some(b'\t') => {
                    self.cursor.advance();
                }
                _ => break,
            }
        }
        self.seg_started = false;
        self.mode = match self.value_ctx {
            ValueCtx::Traditional => Mode::TradKey,
            ValueCtx::Extended => Mode::ExtKey,
            ValueCtx::Raw => Mode::RawValue,
        };
        StepResult::Progress
    }

    // ---- TRADITIONAL arguments ----

    fn step_trad_key(&mut self) -> StepResult {
        loop {
            match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b' ') | Some(b'\t') => {
                    self.cursor.advance();
                }
                Some(b'\n') | Some(b';') => {
                    self.end_statement_content();
                    return StepResult::Progress;
                }
                Some(b) if b.is_ascii_alphabetic() => {
                    let pos = self.cursor.position();
                    self.cursor.advance();
                    let upper = (b.to_ascii_uppercase() as char).to_string();
                    self.push_token(Token::Ident(Symbol::intern(&upper)), Span::point(pos));
                    self.mode = Mode::TradAfterKey;
                    return StepResult::Progress;
                }
                Some(b'"') => {
                    self.cursor.advance();
                    self.token_start = self.cursor.position();
                    self.resume_stack.push(Mode::TradKey);
                    self.mode = Mode::StringLit(StrState::Body);
                    return StepResult::Progress;
                }
                Some(other) => {
                    return self.error("expected argument key", Some(other as char))
                }
            }
        }
    }

    fn step_trad_after_key(&mut self) -> StepResult {
        match self.cursor.current() {
            None => return StepResult::NeedMore,
            Some(b'=') => {
                self.cursor.advance();
            }
            Some(_) => {}
        }
        self.seg_started = false;
        self.mode = Mode::TradValue;
        StepResult::Progress
    }

    // ---- EXTENDED arguments ----

    fn step_ext_key(&mut self) -> StepResult {
        loop {
            match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b' ') | Some(b'\t') => {
                    self.cursor.advance();
                }
                Some(b'\n') | Some(b';') => {
                    self.end_statement_content();
                    return StepResult::Progress;
                }
                Some(b) if b.is_ascii_alphabetic() || b == b'_' => {
                    self.token_start = self.cursor.position();
                    self.mode = Mode::ExtKeyBody;
                    return StepResult::Progress;
                }
                Some(other) => {
                    return self.error("expected argument key", Some(other as char))
                }
            }
        }
    }

    fn step_ext_key_body(&mut self) -> StepResult {
        loop {
            match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b) if b.is_ascii_alphanumeric() || b == b'_' => {
                    self.cursor.advance();
                    self.buf.push(b.to_ascii_uppercase());
                }
                Some(_) => break,
            }
        }
        let name = String::from_utf8(std::mem::take(&mut self.buf)).unwrap_or_default();
        let span = Span::new(self.token_start, self.cursor.position());
        self.push_token(Token::Ident(Symbol::intern(&name)), span);
        self.mode = Mode::ExtAfterKeyExpectEquals;
        StepResult::Progress
    }

    fn step_ext_after_key(&mut self) -> StepResult {
        match self.cursor.current() {
            None => return StepResult::NeedMore,
            Some(b'=') => {
                self.cursor.advance();
                self.seg_started = false;
                self.mode = Mode::ExtValue;
                StepResult::Progress
            }
            Some(other) => self.error("extended argument missing '='", Some(other as char)),
        }
    }

    // ---- shared TRADITIONAL/EXTENDED value scanning ----

    fn step_value(&mut self, ctx: ValueCtx) -> StepResult {
        match self.looks_like_number_start() {
            None => return StepResult::NeedMore,
            Some(true) => {
                self.begin_segment();
                self.token_start = self.cursor.position();
                match self.cursor.current() {
                    Some(b'+') => {
                        self.cursor.advance();
                    }
                    Some(b'-') => {
                        self.cursor.advance();
                        self.buf.push(b'-');
                    }
                    _ => {}
                }
                self.resume_stack.push(match ctx {
                    ValueCtx::Traditional => Mode::TradValue,
                    ValueCtx::Extended => Mode::ExtValue,
                    ValueCtx::Raw => unreachable!("raw values use step_raw_value"),
                });
                self.mode = Mode::NumberLit(NumState::Detect);
                return StepResult::Progress;
            }
            Some(false) => {}
        }
        match self.cursor.current() {
            None => StepResult::NeedMore,
            Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b';') => {
                if !self.seg_started {
                    let span = self.point_span();
                    self.push_token(Token::Str(Symbol::intern("")), span);
                }
                self.mode = match ctx {
                    ValueCtx::Traditional => Mode::TradKey,
                    ValueCtx::Extended => Mode::ExtKey,
                    ValueCtx::Raw => unreachable!(),
                };
                StepResult::Progress
            }
            Some(b'"') => {
                self.begin_segment();
                self.cursor.advance();
                self.token_start = self.cursor.position();
                self.resume_stack.push(match ctx {
                    ValueCtx::Traditional => Mode::TradValue,
                    ValueCtx::Extended => Mode::ExtValue,
                    ValueCtx::Raw => unreachable!(),
                });
                self.mode = Mode::StringLit(StrState::Body);
                StepResult::Progress
            }
            Some(b'{') => {
                self.begin_segment();
                let span = self.point_span();
                self.cursor.advance();
                self.push_token(Token::Keyword(KeywordId::LBrace), span);
                self.resume_stack.push(match ctx {
                    ValueCtx::Traditional => Mode::TradValue,
                    ValueCtx::Extended => Mode::ExtValue,
                    ValueCtx::Raw => unreachable!(),
                });
                self.mode = Mode::Expression;
                StepResult::Progress
            }
            Some(other) => self.error("unexpected character in argument value", Some(other as char)),
        }
    }

    fn looks_like_number_start(&self) -> Option<bool> {
        match self.cursor.current() {
            None => None,
            Some(b) if b.is_ascii_digit() => Some(true),
            Some(b'+') | Some(b'-') => match self.cursor.peek(1) {
                None => None,
                Some(d) => Some(d.is_ascii_digit()),
            },
            Some(_) => Some(false),
        }
    }

    // ---- RAW arguments (M117, ECHO) ----

    fn step_raw_value(&mut self) -> StepResult {
        loop {
            match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b'\n') => {
                    self.flush_raw_run();
                    self.end_statement_content();
                    return StepResult::Progress;
                }
                Some(b'"') => {
                    self.flush_raw_run();
                    self.begin_segment();
                    self.cursor.advance();
                    self.token_start = self.cursor.position();
                    self.resume_stack.push(Mode::RawValue);
                    self.mode = Mode::StringLit(StrState::Body);
                    return StepResult::Progress;
                }
                Some(b'{') => {
                    self.flush_raw_run();
                    self.begin_segment();
                    let span = self.point_span();
                    self.cursor.advance();
                    self.push_token(Token::Keyword(KeywordId::LBrace), span);
                    self.resume_stack.push(Mode::RawValue);
                    self.mode = Mode::Expression;
                    return StepResult::Progress;
                }
                Some(b) => {
                    if self.buf.is_empty() {
                        self.begin_segment();
                        self.token_start = self.cursor.position();
                    }
                    self.cursor.advance();
                    self.buf.push(b);
                }
            }
        }
    }

    fn flush_raw_run(&mut self) {
        if !self.buf.is_empty() {
            let text = String::from_utf8(std::mem::take(&mut self.buf)).unwrap_or_default();
            let span = Span::new(self.token_start, self.cursor.position());
            self.push_token(Token::Str(Symbol::intern(&text)), span);
        }
    }

    // ---- numeric literals ----

    fn step_number(&mut self, state: NumState) -> StepResult {
        match state {
            NumState::Detect => self.num_detect(),
            NumState::IntBody(r) => self.num_int_body(r),
            NumState::AfterInt(r) => self.num_after_int(r),
            NumState::FracBody(r) => self.num_frac_body(r),
            NumState::AfterFrac(r) => self.num_after_frac(r),
            NumState::ExpSign(r) => self.num_exp_sign(r),
            NumState::ExpBody(r) => self.num_exp_body(r),
        }
    }

    fn num_detect(&mut self) -> StepResult {
        let Some(b) = self.cursor.current() else {
            return StepResult::NeedMore;
        };
        if b == b'0' {
            let Some(next) = self.cursor.peek(1) else {
                return StepResult::NeedMore;
            };
            match next {
                b'x' | b'X' => {
                    self.cursor.advance();
                    self.cursor.advance();
                    self.buf.extend_from_slice(b"0x");
                    self.mode = Mode::NumberLit(NumState::IntBody(Radix::Hex));
                }
                b'b' | b'B' => {
                    self.cursor.advance();
                    self.cursor.advance();
                    self.buf.extend_from_slice(b"0b");
                    self.mode = Mode::NumberLit(NumState::IntBody(Radix::Bin));
                }
                b'o' | b'O' => {
                    self.cursor.advance();
                    self.cursor.advance();
                    self.buf.extend_from_slice(b"0o");
                    self.mode = Mode::NumberLit(NumState::IntBody(Radix::Oct));
                }
                _ => {
                    self.cursor.advance();
                    self.buf.push(b'0');
                    self.mode = Mode::NumberLit(NumState::IntBody(Radix::Dec));
                }
            }
        } else {
            self.cursor.advance();
            self.buf.push(b);
            self.mode = Mode::NumberLit(NumState::IntBody(Radix::Dec));
        }
        StepResult::Progress
    }

    fn num_int_body(&mut self, radix: Radix) -> StepResult {
        loop {
            match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b) if is_digit_for_radix(b, radix) => {
                    self.cursor.advance();
                    self.buf.push(b);
                }
                Some(_) => {
                    self.mode = Mode::NumberLit(NumState::AfterInt(radix));
                    return StepResult::Progress;
                }
            }
        }
    }

    fn exponent_follows(&self, offset: usize) -> Option<bool> {
        match self.cursor.peek(offset) {
            None => None,
            Some(b'+') | Some(b'-') => match self.cursor.peek(offset + 1) {
                None => None,
                Some(d) => Some(d.is_ascii_digit()),
            },
            Some(d) => Some(d.is_ascii_digit()),
        }
    }

    fn num_after_int(&mut self, radix: Radix) -> StepResult {
        match radix {
            Radix::Dec => match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b'.') => match self.cursor.peek(1) {
                    None => return StepResult::NeedMore,
                    Some(d) if d.is_ascii_digit() => {
                        self.cursor.advance();
                        self.buf.push(b'.');
                        self.mode = Mode::NumberLit(NumState::FracBody(radix));
                    }
                    Some(_) => self.finish_number(),
                },
                Some(b'e') | Some(b'E') => match self.exponent_follows(1) {
                    None => return StepResult::NeedMore,
                    Some(true) => {
                        self.cursor.advance();
                        self.buf.push(b'e');
                        self.mode = Mode::NumberLit(NumState::ExpSign(radix));
                    }
                    Some(false) => self.finish_number(),
                },
                _ => self.finish_number(),
            },
            Radix::Hex => match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b'.') => match self.cursor.peek(1) {
                    None => return StepResult::NeedMore,
                    Some(d) if d.is_ascii_hexdigit() => {
                        self.cursor.advance();
                        self.buf.push(b'.');
                        self.mode = Mode::NumberLit(NumState::FracBody(radix));
                    }
                    Some(_) => self.finish_number(),
                },
                Some(b'p') | Some(b'P') => match self.exponent_follows(1) {
                    None => return StepResult::NeedMore,
                    Some(true) => {
                        self.cursor.advance();
                        self.buf.push(b'p');
                        self.mode = Mode::NumberLit(NumState::ExpSign(radix));
                    }
                    Some(false) => self.finish_number(),
                },
                _ => self.finish_number(),
            },
            Radix::Oct | Radix::Bin => self.finish_number(),
        }
        StepResult::Progress
    }

    fn num_frac_body(&mut self, radix: Radix) -> StepResult {
        loop {
            match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b) if is_frac_digit(b, radix) => {
                    self.cursor.advance();
                    self.buf.push(b);
                }
                Some(_) => {
                    self.mode = Mode::NumberLit(NumState::AfterFrac(radix));
                    return StepResult::Progress;
                }
            }
        }
    }

    fn num_after_frac(&mut self, radix: Radix) -> StepResult {
        let marker: u8 = if radix == Radix::Hex { b'p' } else { b'e' };
        match self.cursor.current() {
            None => return StepResult::NeedMore,
            Some(b) if b.to_ascii_lowercase() == marker => match self.exponent_follows(1) {
                None => return StepResult::NeedMore,
                Some(true) => {
                    self.cursor.advance();
                    self.buf.push(marker);
                    self.mode = Mode::NumberLit(NumState::ExpSign(radix));
                }
                Some(false) => self.finish_number(),
            },
            _ => self.finish_number(),
        }
        StepResult::Progress
    }

    fn num_exp_sign(&mut self, radix: Radix) -> StepResult {
        match self.cursor.current() {
            None => return StepResult::NeedMore,
            Some(b @ b'+') | Some(b @ b'-') => {
                self.cursor.advance();
                self.buf.push(b);
            }
            Some(_) => {}
        }
        self.mode = Mode::NumberLit(NumState::ExpBody(radix));
        StepResult::Progress
    }

    fn num_exp_body(&mut self, _radix: Radix) -> StepResult {
        loop {
            match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b) if b.is_ascii_digit() => {
                    self.cursor.advance();
                    self.buf.push(b);
                }
                Some(_) => {
                    self.finish_number();
                    return StepResult::Progress;
                }
            }
        }
    }

    fn finish_number(&mut self) {
        let text = String::from_utf8(std::mem::take(&mut self.buf)).unwrap_or_default();
        let token = numeric::parse(&text);
        let span = Span::new(self.token_start, self.cursor.position());
        self.push_token(token, span);
        self.mode = self
            .resume_stack
            .pop()
            .expect("a number is always entered from a value or expression context");
    }

    // ---- string literals ----

    fn step_string(&mut self, state: StrState) -> StepResult {
        match state {
            StrState::Body => self.str_body(),
            StrState::AfterBackslash => self.str_after_backslash(),
            StrState::Octal { value, digits } => self.str_octal(value, digits),
            StrState::Hex { value, digits } => self.str_hex(value, digits),
            StrState::Unicode { value, remaining } => self.str_unicode(value, remaining),
        }
    }

    fn str_body(&mut self) -> StepResult {
        loop {
            match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b'\n') => return self.unterminated("string literal"),
                Some(b'"') => {
                    self.cursor.advance();
                    self.finish_string();
                    return StepResult::Progress;
                }
                Some(b'\\') => {
                    self.cursor.advance();
                    self.mode = Mode::StringLit(StrState::AfterBackslash);
                    return StepResult::Progress;
                }
                Some(b) => {
                    self.cursor.advance();
                    self.buf.push(b);
                }
            }
        }
    }

    fn str_after_backslash(&mut self) -> StepResult {
        let Some(b) = self.cursor.current() else {
            return StepResult::NeedMore;
        };
        self.cursor.advance();
        match b {
            b'a' => self.push_str_char(0x07 as char),
            b'b' => self.push_str_char(0x08 as char),
            b'e' => self.push_str_char(0x1b as char),
            b'f' => self.push_str_char(0x0c as char),
            b'n' => self.push_str_char('\n'),
            b'r' => self.push_str_char('\r'),
            b't' => self.push_str_char('\t'),
            b'v' => self.push_str_char(0x0b as char),
            b'\\' => self.push_str_char('\\'),
            b'\'' => self.push_str_char('\''),
            b'"' => self.push_str_char('"'),
            b'?' => self.push_str_char('?'),
            b'x' => self.mode = Mode::StringLit(StrState::Hex { value: 0, digits: 0 }),
            b'u' => {
                self.mode = Mode::StringLit(StrState::Unicode {
                    value: 0,
                    remaining: 4,
                })
            }
            b'U' => {
                self.mode = Mode::StringLit(StrState::Unicode {
                    value: 0,
                    remaining: 8,
                })
            }
            b'0'..=b'7' => {
                self.mode = Mode::StringLit(StrState::Octal {
                    value: (b - b'0') as u32,
                    digits: 1,
                })
            }
            other => self.push_str_char(other as char),
        }
        StepResult::Progress
    }

    fn push_str_char(&mut self, c: char) {
        let mut tmp = [0u8; 4];
        self.buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
        self.mode = Mode::StringLit(StrState::Body);
    }

    fn flush_numeric_escape(&mut self, value: u32) {
        match char::from_u32(value) {
            Some(c) => self.push_str_char(c),
            None => self.mode = Mode::StringLit(StrState::Body),
        }
    }

    fn str_octal(&mut self, value: u32, digits: u8) -> StepResult {
        if digits >= 3 {
            self.flush_numeric_escape(value);
            return StepResult::Progress;
        }
        match self.cursor.current() {
            None => StepResult::NeedMore,
            Some(b @ b'0'..=b'7') => {
                self.cursor.advance();
                self.mode = Mode::StringLit(StrState::Octal {
                    value: value * 8 + (b - b'0') as u32,
                    digits: digits + 1,
                });
                StepResult::Progress
            }
            Some(_) => {
                self.flush_numeric_escape(value);
                StepResult::Progress
            }
        }
    }

    fn str_hex(&mut self, value: u32, digits: u8) -> StepResult {
        match self.cursor.current() {
            None => StepResult::NeedMore,
            Some(b) => match hex_digit_value(b) {
                Some(d) => {
                    self.cursor.advance();
                    self.mode = Mode::StringLit(StrState::Hex {
                        value: value * 16 + d,
                        digits: digits + 1,
                    });
                    StepResult::Progress
                }
                None => {
                    if digits == 0 {
                        self.diagnostics.push(Diagnostic::error(
                            "malformed \\x escape: no hex digits",
                            self.point_span(),
                        ));
                    }
                    self.flush_numeric_escape(value);
                    StepResult::Progress
                }
            },
        }
    }

    fn str_unicode(&mut self, value: u32, remaining: u8) -> StepResult {
        if remaining == 0 {
            self.flush_numeric_escape(value);
            return StepResult::Progress;
        }
        match self.cursor.current() {
            None => StepResult::NeedMore,
            Some(b) => match hex_digit_value(b) {
                Some(d) => {
                    self.cursor.advance();
                    self.mode = Mode::StringLit(StrState::Unicode {
                        value: value * 16 + d,
                        remaining: remaining - 1,
                    });
                    StepResult::Progress
                }
                None => {
                    self.flush_numeric_escape(value);
                    StepResult::Progress
                }
            },
        }
    }

    fn finish_string(&mut self) {
        let text = String::from_utf8(std::mem::take(&mut self.buf)).unwrap_or_default();
        let span = Span::new(self.token_start, self.cursor.position());
        self.push_token(Token::Str(Symbol::intern(&text)), span);
        self.mode = self
            .resume_stack
            .pop()
            .expect("a string is always entered from a value or expression context");
    }

    // ---- expressions ----

    fn step_expression(&mut self) -> StepResult {
        loop {
            match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b'\n') => return self.unterminated("expression"),
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.cursor.advance();
                }
                Some(b'"') => {
                    self.cursor.advance();
                    self.token_start = self.cursor.position();
                    self.resume_stack.push(Mode::Expression);
                    self.mode = Mode::StringLit(StrState::Body);
                    return StepResult::Progress;
                }
                Some(b) if b.is_ascii_digit() => {
                    self.token_start = self.cursor.position();
                    self.resume_stack.push(Mode::Expression);
                    self.mode = Mode::NumberLit(NumState::Detect);
                    return StepResult::Progress;
                }
                Some(b) if b.is_ascii_alphabetic() || b == b'_' => {
                    self.token_start = self.cursor.position();
                    self.mode = Mode::ExprIdent;
                    return StepResult::Progress;
                }
                Some(b'}') => {
                    let span = self.point_span();
                    self.cursor.advance();
                    self.push_token(Token::Keyword(KeywordId::RBrace), span);
                    self.mode = self
                        .resume_stack
                        .pop()
                        .expect("'}' only reachable inside a value context");
                    return StepResult::Progress;
                }
                Some(_) => return self.expr_punct(),
            }
        }
    }

    fn step_expr_ident(&mut self) -> StepResult {
        loop {
            match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b) if b.is_ascii_alphanumeric() || b == b'_' => {
                    self.cursor.advance();
                    self.buf.push(b);
                }
                Some(_) => break,
            }
        }
        let text = String::from_utf8(std::mem::take(&mut self.buf)).unwrap_or_default();
        let span = Span::new(self.token_start, self.cursor.position());
        let upper = text.to_ascii_uppercase();
        if let Some(kw) = word_keyword(&upper) {
            self.push_token(Token::Keyword(kw), span);
        } else {
            self.push_token(Token::Ident(Symbol::intern(&text.to_ascii_lowercase())), span);
        }
        self.mode = Mode::Expression;
        StepResult::Progress
    }

    fn expr_punct(&mut self) -> StepResult {
        let b = self.cursor.current().expect("checked by caller");
        let start = self.cursor.position();
        match b {
            b'+' => self.emit_punct(KeywordId::Plus, start, 1),
            b'-' => self.emit_punct(KeywordId::Minus, start, 1),
            b'*' => match self.cursor.peek(1) {
                None => StepResult::NeedMore,
                Some(b'*') => self.emit_punct(KeywordId::StarStar, start, 2),
                Some(_) => self.emit_punct(KeywordId::Star, start, 1),
            },
            b'/' => self.emit_punct(KeywordId::Slash, start, 1),
            b'%' => self.emit_punct(KeywordId::Percent, start, 1),
            b'~' => self.emit_punct(KeywordId::Tilde, start, 1),
            b'<' => match self.cursor.peek(1) {
                None => StepResult::NeedMore,
                Some(b'=') => self.emit_punct(KeywordId::Lte, start, 2),
                Some(_) => self.emit_punct(KeywordId::Lt, start, 1),
            },
            b'>' => match self.cursor.peek(1) {
                None => StepResult::NeedMore,
                Some(b'=') => self.emit_punct(KeywordId::Gte, start, 2),
                Some(_) => self.emit_punct(KeywordId::Gt, start, 1),
            },
            b'=' => self.emit_punct(KeywordId::Equals, start, 1),
            b'!' => self.emit_punct(KeywordId::Bang, start, 1),
            b'.' => self.emit_punct(KeywordId::Dot, start, 1),
            b',' => self.emit_punct(KeywordId::Comma, start, 1),
            b'(' => self.emit_punct(KeywordId::LParen, start, 1),
            b')' => self.emit_punct(KeywordId::RParen, start, 1),
            b'[' => self.emit_punct(KeywordId::LBracket, start, 1),
            b']' => self.emit_punct(KeywordId::RBracket, start, 1),
            b'{' => self.emit_punct(KeywordId::LBrace, start, 1),
            other => self.error("unexpected character in expression", Some(other as char)),
        }
    }

    fn emit_punct(&mut self, kw: KeywordId, start: Position, width: usize) -> StepResult {
        for _ in 0..width {
            self.cursor.advance();
        }
        self.push_token(Token::Keyword(kw), Span::new(start, self.cursor.position()));
        StepResult::Progress
    }

    // ---- comments and error recovery ----

    fn step_line_comment(&mut self) -> StepResult {
        loop {
            match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b'\n') => {
                    self.cursor.advance();
                    self.mode = Mode::LinePrefix;
                    self.cursor.compact();
                    return StepResult::Progress;
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
    }

    fn step_scan_error(&mut self) -> StepResult {
        loop {
            match self.cursor.current() {
                None => return StepResult::NeedMore,
                Some(b'\n') => {
                    self.cursor.advance();
                    self.mode = Mode::LinePrefix;
                    self.cursor.compact();
                    return StepResult::Progress;
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_command_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_digit_for_radix(b: u8, radix: Radix) -> bool {
    match radix {
        Radix::Dec => b.is_ascii_digit(),
        Radix::Hex => b.is_ascii_hexdigit(),
        Radix::Oct => (b'0'..=b'7').contains(&b),
        Radix::Bin => b == b'0' || b == b'1',
    }
}

fn is_frac_digit(b: u8, radix: Radix) -> bool {
    match radix {
        Radix::Hex => b.is_ascii_hexdigit(),
        _ => b.is_ascii_digit(),
    }
}

fn hex_digit_value(b: u8) -> Option<u32> {
    match b {
        b'0'..=b'9' => Some((b - b'0') as u32),
        b'a'..=b'f' => Some((b - b'a' + 10) as u32),
        b'A'..=b'F' => Some((b - b'A' + 10) as u32),
        _ => None,
    }
}

/// Command names ending in an unbroken run of digits after the leading
/// letter (`G1`, `M104`) use TRADITIONAL single-letter arguments; `M117`
/// and `ECHO` take one RAW message; everything else (`SET_FAN`, `HOME`) is
/// EXTENDED with `KEY=value` arguments.
fn classify(name: &str) -> ValueCtx {
    if name == "M117" || name == "ECHO" {
        return ValueCtx::Raw;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            let rest = chars.as_str();
            if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                ValueCtx::Traditional
            } else {
                ValueCtx::Extended
            }
        }
        _ => ValueCtx::Extended,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut lexer = Lexer::new();
        lexer.feed(src.as_bytes());
        lexer.finish();
        let tokens = lexer.take_tokens().into_iter().map(|(t, _)| t).collect();
        let diags = lexer.take_diagnostics();
        (tokens, diags)
    }

    #[test]
    fn simple_traditional_statement() {
        let (tokens, diags) = lex("G1 X10 Y20.5\n");
        assert!(diags.is_empty());
        assert_eq!(
            tokens,
            vec![
                Token::Ident(Symbol::intern("G1")),
                Token::Ident(Symbol::intern("X")),
                Token::Int(10),
                Token::Ident(Symbol::intern("Y")),
                Token::Float(20.5),
                Token::EndOfStatement { ok: true },
            ]
        );
    }

    #[test]
    fn extended_statement() {
        let (tokens, diags) = lex("SET_FAN SPEED=0.5\n");
        assert!(diags.is_empty());
        assert_eq!(
            tokens,
            vec![
                Token::Ident(Symbol::intern("SET_FAN")),
                Token::Ident(Symbol::intern("SPEED")),
                Token::Float(0.5),
                Token::EndOfStatement { ok: true },
            ]
        );
    }

    #[test]
    fn expression_value() {
        let (tokens, diags) = lex("G1 X{1+2*3}\n");
        assert!(diags.is_empty());
        assert_eq!(
            tokens,
            vec![
                Token::Ident(Symbol::intern("G1")),
                Token::Ident(Symbol::intern("X")),
                Token::Keyword(KeywordId::LBrace),
                Token::Int(1),
                Token::Keyword(KeywordId::Plus),
                Token::Int(2),
                Token::Keyword(KeywordId::Star),
                Token::Int(3),
                Token::Keyword(KeywordId::RBrace),
                Token::EndOfStatement { ok: true },
            ]
        );
    }

    #[test]
    fn raw_message_with_embedded_expression() {
        let (tokens, diags) = lex("ECHO hello {x} world\n");
        assert!(diags.is_empty());
        assert_eq!(
            tokens,
            vec![
                Token::Ident(Symbol::intern("ECHO")),
                Token::Str(Symbol::intern("hello ")),
                Token::Bridge,
                Token::Keyword(KeywordId::LBrace),
                Token::Ident(Symbol::intern("x")),
                Token::Keyword(KeywordId::RBrace),
                Token::Bridge,
                Token::Str(Symbol::intern(" world")),
                Token::EndOfStatement { ok: true },
            ]
        );
    }

    #[test]
    fn quoted_raw_message_with_escapes() {
        let (tokens, diags) = lex("M117 \"quoted \\\"str\\\"\"\n");
        assert!(diags.is_empty());
        assert_eq!(
            tokens,
            vec![
                Token::Ident(Symbol::intern("M117")),
                Token::Str(Symbol::intern("quoted \"str\"")),
                Token::EndOfStatement { ok: true },
            ]
        );
    }

    #[test]
    fn empty_traditional_value() {
        let (tokens, diags) = lex("G1 X\n");
        assert!(diags.is_empty());
        assert_eq!(
            tokens,
            vec![
                Token::Ident(Symbol::intern("G1")),
                Token::Ident(Symbol::intern("X")),
                Token::Str(Symbol::intern("")),
                Token::EndOfStatement { ok: true },
            ]
        );
    }

    #[test]
    fn ternary_in_expression() {
        // A statement always starts with a command name, so the ternary is
        // exercised as an argument value rather than a bare top-level
        // expression.
        let (tokens, diags) = lex("G1 X{1 if 2 < 3 else 4}\n");
        assert!(diags.is_empty());
        assert_eq!(
            tokens,
            vec![
                Token::Ident(Symbol::intern("G1")),
                Token::Ident(Symbol::intern("X")),
                Token::Keyword(KeywordId::LBrace),
                Token::Int(1),
                Token::Keyword(KeywordId::If),
                Token::Int(2),
                Token::Keyword(KeywordId::Lt),
                Token::Int(3),
                Token::Keyword(KeywordId::Else),
                Token::Int(4),
                Token::Keyword(KeywordId::RBrace),
                Token::EndOfStatement { ok: true },
            ]
        );
    }

    #[test]
    fn hex_float_literal() {
        let (tokens, diags) = lex("G1 X0x1.8p1\n");
        assert!(diags.is_empty());
        match &tokens[2] {
            Token::Float(v) => assert!((v - 3.0).abs() < 1e-9),
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_string_is_reported_and_recovers() {
        // A `"` in TRADITIONAL key position is scanned as a string, same as
        // any other value position; the newline before its closing quote
        // reports "unterminated string literal" and flushes the command
        // name already lexed as a non-`ok` `EndOfStatement`, so the parser
        // will not reduce it into a statement. The next line lexes cleanly.
        let (tokens, diags) = lex("G1 \"abc\nG1\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(
            tokens,
            vec![
                Token::Ident(Symbol::intern("G1")),
                Token::EndOfStatement { ok: false },
                Token::Ident(Symbol::intern("G1")),
                Token::EndOfStatement { ok: true },
            ]
        );
    }

    #[test]
    fn blank_lines_and_comments_produce_nothing() {
        let (tokens, diags) = lex("\n\n;comment\nG1\n");
        assert!(diags.is_empty());
        assert_eq!(
            tokens,
            vec![Token::Ident(Symbol::intern("G1")), Token::EndOfStatement { ok: true }]
        );
    }

    #[test]
    fn byte_at_a_time_feed_matches_whole_feed() {
        let src = "G1 X10 Y20.5\nSET_FAN SPEED=0.5\n";
        let mut whole = Lexer::new();
        whole.feed(src.as_bytes());
        whole.finish();
        let whole_tokens: Vec<_> = whole.take_tokens().into_iter().map(|(t, _)| t).collect();

        let mut chunked = Lexer::new();
        for byte in src.as_bytes() {
            chunked.feed(&[*byte]);
        }
        chunked.finish();
        let chunked_tokens: Vec<_> = chunked.take_tokens().into_iter().map(|(t, _)| t).collect();

        assert_eq!(whole_tokens, chunked_tokens);
    }

    #[test]
    fn reset_discards_in_progress_statement() {
        let mut lexer = Lexer::new();
        lexer.feed(b"G1 X");
        lexer.reset();
        lexer.feed(b"G2 Y1\n");
        lexer.finish();
        let tokens: Vec<_> = lexer.take_tokens().into_iter().map(|(t, _)| t).collect();
        assert_eq!(
            tokens,
            vec![
                Token::Ident(Symbol::intern("G2")),
                Token::Ident(Symbol::intern("Y")),
                Token::Int(1),
                Token::EndOfStatement { ok: true },
            ]
        );
    }
}

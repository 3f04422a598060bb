//! Front-end facade binding a lexer to a parser.
//!
//! [`Frontend`] is the one type most callers need: it owns a [`Lexer`] and
//! a [`Parser`], drains tokens from the former into the latter on every
//! `feed`, and forwards finished statements and diagnostics to a
//! caller-supplied [`Sink`].

use gcode_lex::Lexer;
use gcode_par::{Node, Parser, PushOutcome};
use gcode_util::{ControlFlow, Diagnostic};

/// Receives the statements and diagnostics a [`Frontend`] produces.
///
/// An explicit trait in place of a pair of C-style callbacks with a
/// `void*` context: the context is just `self`.
pub trait Sink {
    /// A diagnostic was reported by either stage. Returning
    /// [`ControlFlow::Abort`] stops the current `feed`/`finish` call
    /// immediately, leaving any remaining buffered bytes unprocessed.
    fn on_error(&mut self, diagnostic: Diagnostic) -> ControlFlow;

    /// A statement was fully parsed, in source order.
    fn on_statement(&mut self, statement: Node);
}

/// Binds one [`Lexer`] to one [`Parser`] and drives tokens between them.
pub struct Frontend<S: Sink> {
    lexer: Lexer,
    parser: Parser,
    sink: S,
}

impl<S: Sink> Frontend<S> {
    pub fn new(sink: S) -> Self {
        Self::with_capacity(sink, 0)
    }

    /// Like [`Frontend::new`], pre-reserving room for `capacity` tokens and
    /// diagnostics in the underlying lexer. The only configurable knob this
    /// crate exposes — there is no environment or file configuration
    /// surface.
    pub fn with_capacity(sink: S, capacity: usize) -> Self {
        Self {
            lexer: Lexer::with_capacity(capacity),
            parser: Parser::new(),
            sink,
        }
    }

    /// Feed more source bytes, draining every token and diagnostic they
    /// produce into the sink before returning.
    pub fn feed(&mut self, bytes: &[u8]) -> ControlFlow {
        self.lexer.feed(bytes);
        self.drain()
    }

    /// Flush a dangling statement at end of input.
    pub fn finish(&mut self) -> ControlFlow {
        self.lexer.finish();
        self.drain()
    }

    /// Discard all lexer/parser state, as if newly constructed, keeping
    /// the same sink.
    pub fn reset(&mut self) {
        self.lexer.reset();
        self.parser.reset();
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn drain(&mut self) -> ControlFlow {
        for diagnostic in self.lexer.take_diagnostics() {
            if self.sink.on_error(diagnostic) == ControlFlow::Abort {
                return ControlFlow::Abort;
            }
        }
        for (token, span) in self.lexer.take_tokens() {
            match self.parser.push(token, span) {
                PushOutcome::More => {}
                PushOutcome::Statement(node) => self.sink.on_statement(node),
                PushOutcome::Error => {
                    for diagnostic in self.parser.take_diagnostics() {
                        if self.sink.on_error(diagnostic) == ControlFlow::Abort {
                            return ControlFlow::Abort;
                        }
                    }
                }
            }
        }
        ControlFlow::Continue
    }
}

/// Collects every statement and diagnostic in order; the common case for
/// tests and one-shot parsing.
#[derive(Default)]
pub struct Collector {
    pub statements: Vec<Node>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Sink for Collector {
    fn on_error(&mut self, diagnostic: Diagnostic) -> ControlFlow {
        self.diagnostics.push(diagnostic);
        ControlFlow::Continue
    }

    fn on_statement(&mut self, statement: Node) {
        self.statements.push(statement);
    }
}

/// Parses a complete source string in one call, for callers that have the
/// whole input up front and don't need incremental feeding.
pub fn parse_str(src: &str) -> Collector {
    let mut frontend = Frontend::new(Collector::default());
    frontend.feed(src.as_bytes());
    frontend.finish();
    frontend.into_sink()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_statements_in_order() {
        let result = parse_str("G1 X10 Y20.5\nSET_FAN SPEED=0.5\n");
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.statements.len(), 2);
    }

    #[test]
    fn reports_errors_without_losing_later_statements() {
        let result = parse_str("G1 \"bad\nG1 X1\n");
        assert_eq!(result.diagnostics.len(), 1);
        // The erroneous line yields no statement of its own; only the
        // following, cleanly-terminated line does.
        assert_eq!(result.statements.len(), 1);
    }

    #[test]
    fn feeding_in_arbitrary_chunks_matches_whole_input() {
        let src = "G1 X10 Y20.5\nSET_FAN SPEED=0.5\n";
        let whole = parse_str(src);

        let mut chunked = Frontend::new(Collector::default());
        for byte in src.as_bytes() {
            chunked.feed(&[*byte]);
        }
        chunked.finish();
        let chunked = chunked.into_sink();

        assert_eq!(whole.statements, chunked.statements);
    }

    #[test]
    fn reset_discards_in_progress_statement() {
        let mut frontend = Frontend::new(Collector::default());
        frontend.feed(b"G1 X");
        frontend.reset();
        frontend.feed(b"G2 Y1\n");
        frontend.finish();
        assert_eq!(frontend.sink().statements.len(), 1);
    }

    #[test]
    fn with_capacity_behaves_like_new() {
        let mut frontend = Frontend::with_capacity(Collector::default(), 16);
        frontend.feed(b"G1 X1\n");
        frontend.finish();
        assert_eq!(frontend.sink().statements.len(), 1);
    }

    struct AbortOnFirstError;

    impl Sink for AbortOnFirstError {
        fn on_error(&mut self, _diagnostic: Diagnostic) -> ControlFlow {
            ControlFlow::Abort
        }

        fn on_statement(&mut self, _statement: Node) {}
    }

    #[test]
    fn sink_can_request_abort() {
        let mut frontend = Frontend::new(AbortOnFirstError);
        assert_eq!(frontend.feed(b"G1 \"bad\n"), ControlFlow::Abort);
    }
}

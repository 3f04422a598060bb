//! Incremental lexer for line-oriented G-code extended with `{...}`
//! expressions.
//!
//! [`Lexer`] consumes bytes through [`Lexer::feed`] in whatever chunks
//! arrive (a full line, a partial read, a single byte) and produces a
//! stream of [`Token`]s plus [`gcode_util::Diagnostic`]s as soon as enough
//! input has been seen to decide them. Nothing here depends on statement
//! or even token boundaries lining up with chunk boundaries.

mod cursor;
mod lexer;
mod numeric;
mod token;

pub use lexer::Lexer;
pub use token::{word_keyword, KeywordId, Token};

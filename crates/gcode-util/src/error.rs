//! Programmer-facing errors internal to the front end.
//!
//! These are distinct from [`crate::Diagnostic`]: a `Diagnostic` is data
//! describing a problem in the *source being parsed*, handed to the
//! consumer's sink. The errors here are `std::error::Error`s describing
//! misuse of the library itself (e.g. an out-of-range index), and are
//! propagated with `?` the normal way.

use thiserror::Error;

/// Error type for [`crate::IndexVec`] access.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexVecError {
    #[error("index out of bounds: index {index}, length {length}")]
    OutOfBounds { index: usize, length: usize },
}

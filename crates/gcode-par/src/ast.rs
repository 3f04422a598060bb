//! AST node model.
//!
//! A raw-pointer sibling-chain-with-child-pointer tree has no upside once
//! translated to Rust: `Vec<Node>` gives the same ordered child list, the
//! same "deleting a node drops its whole subtree" behavior via `Drop`, and
//! none of the null-pointer bookkeeping a manual destructor would need.
//! See DESIGN.md for the recorded decision.

use gcode_util::Symbol;

/// One node in a parsed statement's syntax tree.
///
/// There is no separate "ownership" or "destroy" API: a `Node` owns its
/// entire subtree through ordinary Rust ownership, and dropping it (or the
/// `Statement` it was parsed into) recursively frees everything beneath it.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Integer(i64),
    Float(f64),
    Bool(bool),
    String(Box<str>),
    /// A parameter reference, resolved by the interpreter's `lookup`.
    Parameter(Symbol),
    Operator {
        kind: OpKind,
        operands: Vec<Node>,
    },
    Function {
        name: Symbol,
        args: Vec<Node>,
    },
    /// The root of one parsed statement: an ordered sequence of fields.
    ///
    /// The first field is always the command name (`String`). For
    /// TRADITIONAL/EXTENDED commands it is followed by alternating key
    /// (`String`) and value fields; for RAW commands (`M117`, `ECHO`) it is
    /// followed directly by the message value, with no keys. A value field
    /// with more than one whitespace-free segment (e.g. `X1{y}2`) already
    /// has its segments folded into one expression by `Concat`.
    Statement {
        fields: Vec<Node>,
    },
}

/// Operator kinds, with the arity each one carries:
/// 1 for `Neg`/`Not`, 3 for `IfElse`, 2 for everything else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Neg,
    Not,
    And,
    Or,
    Lt,
    Gt,
    Lte,
    Gte,
    Equals,
    /// Used both for the `~` operator and for implicit bridge
    /// concatenation between adjacent field segments; no downstream
    /// consumer needs to tell the two apart.
    Concat,
    /// `a.b` (dot form) or `a[b]` (bracket form); the right operand is a
    /// `Parameter` for the dot form, an arbitrary expression for the
    /// bracket form.
    Lookup,
    IfElse,
}

impl OpKind {
    pub fn arity(self) -> usize {
        match self {
            OpKind::Neg | OpKind::Not => 1,
            OpKind::IfElse => 3,
            _ => 2,
        }
    }
}

impl Node {
    pub fn operator(kind: OpKind, operands: Vec<Node>) -> Self {
        debug_assert_eq!(
            operands.len(),
            kind.arity(),
            "operator {:?} built with {} operands, expected {}",
            kind,
            operands.len(),
            kind.arity()
        );
        Node::Operator { kind, operands }
    }
}

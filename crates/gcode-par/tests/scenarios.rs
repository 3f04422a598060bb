//! End-to-end lexer+parser scenarios: feed source text through a `Lexer`
//! and drain its tokens into a `Parser`, checking the resulting AST.

use gcode_lex::Lexer;
use gcode_par::{Node, OpKind, Parser, PushOutcome};
use gcode_util::Symbol;

fn parse_one(src: &str) -> Node {
    let mut lexer = Lexer::new();
    lexer.feed(src.as_bytes());
    lexer.finish();
    assert!(
        lexer.take_diagnostics().is_empty(),
        "lexer reported an error for {src:?}"
    );

    let mut parser = Parser::new();
    let mut statements = Vec::new();
    for (token, span) in lexer.take_tokens() {
        match parser.push(token, span) {
            PushOutcome::More => {}
            PushOutcome::Statement(node) => statements.push(node),
            PushOutcome::Error => panic!("parser reported an error for {src:?}"),
        }
    }
    assert_eq!(
        statements.len(),
        1,
        "expected exactly one statement from {src:?}"
    );
    statements.into_iter().next().unwrap()
}

/// Feeds `src` through a fresh lexer/parser pair, returning every statement
/// produced (for scenarios that deliberately span more than one line).
fn parse_all(src: &str) -> (Vec<Node>, usize) {
    let mut lexer = Lexer::new();
    lexer.feed(src.as_bytes());
    lexer.finish();
    let diag_count = lexer.take_diagnostics().len();

    let mut parser = Parser::new();
    let mut statements = Vec::new();
    for (token, span) in lexer.take_tokens() {
        if let PushOutcome::Statement(node) = parser.push(token, span) {
            statements.push(node);
        }
    }
    (statements, diag_count)
}

fn sym(s: &str) -> Symbol {
    Symbol::intern(s)
}

fn fields(node: &Node) -> &[Node] {
    match node {
        Node::Statement { fields } => fields,
        other => panic!("expected Statement, got {other:?}"),
    }
}

#[test]
fn traditional_move_statement() {
    let node = parse_one("G1 X10 Y20.5\n");
    assert_eq!(
        fields(&node),
        &[
            Node::String("G1".into()),
            Node::String("X".into()),
            Node::Integer(10),
            Node::String("Y".into()),
            Node::Float(20.5),
        ]
    );
}

#[test]
fn extended_keyword_argument() {
    let node = parse_one("SET_FAN SPEED=0.5\n");
    assert_eq!(
        fields(&node),
        &[
            Node::String("SET_FAN".into()),
            Node::String("SPEED".into()),
            Node::Float(0.5),
        ]
    );
}

#[test]
fn traditional_value_with_expression_and_arithmetic_precedence() {
    let node = parse_one("G1 X{1+2*3}\n");
    let f = fields(&node);
    assert_eq!(f[0], Node::String("G1".into()));
    assert_eq!(f[1], Node::String("X".into()));
    assert_eq!(
        f[2],
        Node::operator(
            OpKind::Add,
            vec![
                Node::Integer(1),
                Node::operator(OpKind::Mul, vec![Node::Integer(2), Node::Integer(3)]),
            ],
        )
    );
}

#[test]
fn raw_message_with_embedded_parameter_reference() {
    let node = parse_one("ECHO hello {x} world\n");
    let f = fields(&node);
    assert_eq!(f[0], Node::String("ECHO".into()));
    let expected = Node::operator(
        OpKind::Concat,
        vec![
            Node::operator(
                OpKind::Concat,
                vec![Node::String("hello ".into()), Node::Parameter(sym("x"))],
            ),
            Node::String(" world".into()),
        ],
    );
    assert_eq!(f[1], expected);
}

#[test]
fn quoted_raw_message_with_escapes() {
    let node = parse_one("M117 \"quoted \\\"str\\\"\"\n");
    let f = fields(&node);
    assert_eq!(f[0], Node::String("M117".into()));
    assert_eq!(f[1], Node::String("quoted \"str\"".into()));
}

#[test]
fn empty_traditional_value() {
    let node = parse_one("G1 X\n");
    assert_eq!(
        fields(&node),
        &[
            Node::String("G1".into()),
            Node::String("X".into()),
            Node::String("".into()),
        ]
    );
}

#[test]
fn ternary_expression_textual_operand_order() {
    let node = parse_one("G1 X{1 if 2 < 3 else 4}\n");
    let f = fields(&node);
    assert_eq!(
        f[2],
        Node::operator(
            OpKind::IfElse,
            vec![
                Node::Integer(1),
                Node::operator(OpKind::Lt, vec![Node::Integer(2), Node::Integer(3)]),
                Node::Integer(4),
            ],
        )
    );
}

#[test]
fn unary_minus_binds_tighter_than_power() {
    let node = parse_one("G1 X{-2**2}\n");
    let f = fields(&node);
    // (-2) ** 2, not -(2 ** 2).
    assert_eq!(
        f[2],
        Node::operator(
            OpKind::Pow,
            vec![
                Node::operator(OpKind::Neg, vec![Node::Integer(2)]),
                Node::Integer(2),
            ],
        )
    );
}

#[test]
fn hex_float_value() {
    let node = parse_one("G1 X0x1.8p1\n");
    match &fields(&node)[2] {
        Node::Float(v) => assert!((v - 3.0).abs() < 1e-9),
        other => panic!("expected Float, got {other:?}"),
    }
}

#[test]
fn unterminated_string_recovers_at_the_next_line() {
    let (statements, diag_count) = parse_all("M117 \"abc\nM117 ok\n");
    assert_eq!(diag_count, 1);
    // The erroneous line's tokens (just the already-lexed command name)
    // are flushed with a non-`ok` terminator and never reduced into a
    // statement; only the following, cleanly-terminated line produces one.
    assert_eq!(statements.len(), 1);
    assert_eq!(
        fields(&statements[0]),
        &[Node::String("M117".into()), Node::String("ok".into())]
    );
}

#[test]
fn unterminated_string_in_traditional_key_position_recovers_at_the_next_line() {
    let (statements, diag_count) = parse_all("G1 \"abc\nG1 X1\n");
    assert_eq!(diag_count, 1);
    assert_eq!(statements.len(), 1);
    assert_eq!(
        fields(&statements[0]),
        &[
            Node::String("G1".into()),
            Node::String("X".into()),
            Node::Integer(1),
        ]
    );
}

#[test]
fn blank_lines_and_comments_are_skipped() {
    let node = parse_one("\n\n;comment\nG1\n");
    assert_eq!(fields(&node), &[Node::String("G1".into())]);
}

#[test]
fn dot_and_bracket_lookup() {
    let node = parse_one("G1 X{a.b}\n");
    let f = fields(&node);
    assert_eq!(
        f[2],
        Node::operator(
            OpKind::Lookup,
            vec![Node::Parameter(sym("a")), Node::Parameter(sym("b"))],
        )
    );
}

#[test]
fn function_call_with_arguments() {
    let node = parse_one("G1 X{min(1, 2)}\n");
    let f = fields(&node);
    assert_eq!(
        f[2],
        Node::Function {
            name: sym("min"),
            args: vec![Node::Integer(1), Node::Integer(2)],
        }
    );
}

//! Feeding the same source through `Lexer` in different chunk splits must
//! always produce the same token stream. This is the property the whole
//! incremental design exists to guarantee.

use gcode_lex::Lexer;
use proptest::prelude::*;

fn lex_whole(src: &str) -> Vec<gcode_lex::Token> {
    let mut lexer = Lexer::new();
    lexer.feed(src.as_bytes());
    lexer.finish();
    lexer.take_tokens().into_iter().map(|(t, _)| t).collect()
}

fn lex_chunked(src: &str, cuts: &[usize]) -> Vec<gcode_lex::Token> {
    let bytes = src.as_bytes();
    let mut lexer = Lexer::new();
    let mut start = 0;
    let mut cuts: Vec<usize> = cuts.iter().copied().filter(|c| *c <= bytes.len()).collect();
    cuts.sort_unstable();
    cuts.dedup();
    for cut in cuts {
        if cut > start {
            lexer.feed(&bytes[start..cut]);
            start = cut;
        }
    }
    if start < bytes.len() {
        lexer.feed(&bytes[start..]);
    }
    lexer.finish();
    lexer.take_tokens().into_iter().map(|(t, _)| t).collect()
}

fn sample_sources() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "G1 X10 Y20.5\n".to_string(),
        "SET_FAN SPEED=0.5\n".to_string(),
        "G1 X{1+2*3}\n".to_string(),
        "ECHO hello {x} world\n".to_string(),
        "M117 \"quoted \\\"str\\\"\"\n".to_string(),
        "G1 X\n".to_string(),
        "{1 if 2 < 3 else 4}\n".to_string(),
        "G1 X0x1.8p1\n".to_string(),
        "\n\n;comment\nG1\n".to_string(),
        "G1 X10 Y20.5\nSET_FAN SPEED=0.5\nG28\n".to_string(),
    ])
}

proptest! {
    #[test]
    fn arbitrary_chunk_splits_agree_with_whole_feed(
        src in sample_sources(),
        cuts in prop::collection::vec(0usize..64, 0..8),
    ) {
        let expected = lex_whole(&src);
        let actual = lex_chunked(&src, &cuts);
        prop_assert_eq!(expected, actual);
    }

    #[test]
    fn single_byte_chunks_agree_with_whole_feed(src in sample_sources()) {
        let expected = lex_whole(&src);
        let all_cuts: Vec<usize> = (0..src.len()).collect();
        let actual = lex_chunked(&src, &all_cuts);
        prop_assert_eq!(expected, actual);
    }
}

//! Converts a fully-scanned numeric literal's raw text into a [`Token`].
//!
//! The incremental lexer's job is only to find where a number ends; once it
//! has the complete text, converting it to an `i64`/`f64` is ordinary,
//! non-incremental string parsing. Radix prefixes (`0x`/`0b`/`0o`) are
//! always normalized to lowercase by the scanner before reaching here.

use crate::token::Token;

pub fn parse(text: &str) -> Token {
    // The radix prefixes only ever appear right after an optional sign
    // (the scanner never puts one anywhere else), so strip it first and
    // reapply it to the parsed value — matching against the sign-prefixed
    // buffer directly would miss `0x`/`0b`/`0o` on every negative literal.
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let token = if let Some(rest) = text.strip_prefix("0x") {
        parse_hex(rest)
    } else if let Some(rest) = text.strip_prefix("0b") {
        parse_radix_int(rest, 2)
    } else if let Some(rest) = text.strip_prefix("0o") {
        parse_radix_int(rest, 8)
    } else {
        parse_decimal(text)
    };
    if negative {
        negate(token)
    } else {
        token
    }
}

fn negate(token: Token) -> Token {
    match token {
        Token::Int(n) => match n.checked_neg() {
            Some(v) => Token::Int(v),
            None => Token::Float(-(n as f64)),
        },
        Token::Float(f) => Token::Float(-f),
        other => other,
    }
}

fn parse_decimal(text: &str) -> Token {
    if text.contains('.') || text.contains('e') || text.contains('E') {
        Token::Float(text.parse().unwrap_or(f64::NAN))
    } else {
        match text.parse::<i64>() {
            Ok(n) => Token::Int(n),
            Err(_) => Token::Float(accumulate_float(text, 10)),
        }
    }
}

fn parse_radix_int(digits: &str, radix: u32) -> Token {
    match i64::from_str_radix(digits, radix) {
        Ok(n) => Token::Int(n),
        Err(_) => Token::Float(accumulate_float(digits, radix)),
    }
}

fn parse_hex(text: &str) -> Token {
    if text.contains('.') || text.contains('p') {
        Token::Float(parse_hex_float(text))
    } else {
        parse_radix_int(text, 16)
    }
}

/// Overflow fallback for plain integer literals: re-accumulate the digits
/// in floating point rather than fail outright.
fn accumulate_float(digits: &str, radix: u32) -> f64 {
    let mut value = 0.0f64;
    for c in digits.chars() {
        if let Some(d) = c.to_digit(radix) {
            value = value * radix as f64 + d as f64;
        }
    }
    value
}

fn parse_hex_float(text: &str) -> f64 {
    let (mantissa, exp) = match text.find('p') {
        Some(i) => (&text[..i], text[i + 1..].parse::<i32>().unwrap_or(0)),
        None => (text, 0),
    };
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(i) => (&mantissa[..i], &mantissa[i + 1..]),
        None => (mantissa, ""),
    };
    let mut value = 0.0f64;
    for c in int_part.chars() {
        if let Some(d) = c.to_digit(16) {
            value = value * 16.0 + d as f64;
        }
    }
    let mut scale = 1.0 / 16.0;
    for c in frac_part.chars() {
        if let Some(d) = c.to_digit(16) {
            value += d as f64 * scale;
            scale /= 16.0;
        }
    }
    value * 2f64.powi(exp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_int_and_float() {
        assert_eq!(parse("10"), Token::Int(10));
        assert_eq!(parse("20.5"), Token::Float(20.5));
    }

    #[test]
    fn hex_int_and_float() {
        assert_eq!(parse("0xff"), Token::Int(255));
        match parse("0x1.8p1") {
            Token::Float(v) => assert!((v - 3.0).abs() < 1e-9),
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn binary_and_octal() {
        assert_eq!(parse("0b101"), Token::Int(5));
        assert_eq!(parse("0o17"), Token::Int(15));
    }

    #[test]
    fn negative_radix_prefixed_literals() {
        assert_eq!(parse("-0x1A"), Token::Int(-26));
        assert_eq!(parse("-0b101"), Token::Int(-5));
        assert_eq!(parse("-0o17"), Token::Int(-15));
        match parse("-0x1.8p1") {
            Token::Float(v) => assert!((v + 3.0).abs() < 1e-9),
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn overflowing_integer_becomes_float() {
        match parse("99999999999999999999") {
            Token::Float(v) => assert!(v > 0.0),
            other => panic!("expected float, got {other:?}"),
        }
    }
}

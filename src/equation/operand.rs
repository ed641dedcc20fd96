use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::syntax::NULL_ARGUMENT;

static INTEGER_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").expect("valid integer pattern"));

/// True for text that is nothing but an optionally signed run of digits.
pub fn is_integer_literal(text: &str) -> bool {
    INTEGER_LITERAL.is_match(text.trim())
}

/// A value inside an equation. Values start out as text and are coerced to
/// the most specific type both operands of an operator agree on.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Boolean(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Operand {
    /// Classifies a raw token: boolean, then integer, then float, then text.
    pub fn parse(raw: &str) -> Operand {
        let text = raw.trim();
        if let Some(b) = parse_bool(text) {
            Operand::Boolean(b)
        } else if let Ok(i) = text.parse::<i64>() {
            Operand::Int(i)
        } else if let Some(f) = parse_float(text) {
            Operand::Float(f)
        } else {
            Operand::Text(text.to_string())
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Operand::Boolean(b) => Some(*b),
            Operand::Text(text) => parse_bool(text.trim()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Operand::Int(i) => Some(*i),
            Operand::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Operand::Int(i) => Some(*i as f64),
            Operand::Float(f) => Some(*f),
            Operand::Text(text) => parse_float(text.trim()),
            Operand::Boolean(_) => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Operand::Boolean(b) => *b,
            Operand::Int(i) => *i > 0,
            Operand::Float(f) => *f > 0.0,
            Operand::Text(text) => match Operand::parse(text) {
                Operand::Text(text) => is_truthy_text(&text),
                typed => typed.is_truthy(),
            },
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Operand::Boolean(_) => "boolean",
            Operand::Int(_) => "int",
            Operand::Float(_) => "float",
            Operand::Text(_) => "string",
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Boolean(b) => write!(f, "{}", b),
            Operand::Int(i) => write!(f, "{}", i),
            Operand::Float(x) => write!(f, "{}", x),
            Operand::Text(text) => write!(f, "{}", text),
        }
    }
}

/// Plain string truthiness: anything but blank, `null` and `false`.
pub fn is_truthy_text(text: &str) -> bool {
    let text = text.trim();
    !(text.is_empty() || text.eq_ignore_ascii_case(NULL_ARGUMENT) || text.eq_ignore_ascii_case("false"))
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

// `f64::from_str` also accepts "inf" and "NaN", which are words here
fn parse_float(text: &str) -> Option<f64> {
    if !text.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_order() {
        assert_eq!(Operand::parse(" TRUE "), Operand::Boolean(true));
        assert_eq!(Operand::parse("-12"), Operand::Int(-12));
        assert_eq!(Operand::parse("2.5"), Operand::Float(2.5));
        assert_eq!(Operand::parse("inf"), Operand::Text("inf".into()));
    }

    #[test]
    fn truthiness() {
        assert!(Operand::Text("text".into()).is_truthy());
        assert!(!Operand::Text("NULL".into()).is_truthy());
        assert!(!Operand::Text("  ".into()).is_truthy());
        assert!(!Operand::Text("0".into()).is_truthy());
        assert!(!Operand::Float(-0.5).is_truthy());
        assert!(Operand::Int(3).is_truthy());
    }

    #[test]
    fn integer_literals() {
        assert!(is_integer_literal("9"));
        assert!(is_integer_literal("-42"));
        assert!(!is_integer_literal("4.2"));
        assert!(!is_integer_literal("t"));
    }
}

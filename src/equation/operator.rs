//! Operator definitions and the table an [`Equation`](super::Equation) reads them from.
//!
//! Every operator carries up to four overloads per form (boolean, int, float,
//! string). An operand pair uses the first overload both operands can be
//! coerced to, in that order.

use std::collections::HashMap;

use log::debug;

use super::operand::{Operand, is_integer_literal};
use crate::errors::ParserError;

pub type OperatorResult = Result<Operand, ParserError>;

pub const PRIORITY_LOGIC: u8 = 1;
pub const PRIORITY_COMPARISON: u8 = 2;
pub const PRIORITY_MODULO: u8 = 3;
pub const PRIORITY_ADDITIVE: u8 = 4;
pub const PRIORITY_MULTIPLICATIVE: u8 = 5;
pub const PRIORITY_UNARY: u8 = 6;

#[derive(Clone, Copy, Default)]
pub struct BinaryOverloads {
    pub boolean: Option<fn(bool, bool) -> OperatorResult>,
    pub int: Option<fn(i64, i64) -> OperatorResult>,
    pub float: Option<fn(f64, f64) -> OperatorResult>,
    pub text: Option<fn(&str, &str) -> OperatorResult>,
}

#[derive(Clone, Copy, Default)]
pub struct UnaryOverloads {
    pub boolean: Option<fn(bool) -> OperatorResult>,
    pub int: Option<fn(i64) -> OperatorResult>,
    pub float: Option<fn(f64) -> OperatorResult>,
    pub text: Option<fn(&str) -> OperatorResult>,
}

#[derive(Clone)]
pub struct Operator {
    pub symbol: String,
    pub priority: u8,
    /// Priority of the single-argument form.
    pub unary_priority: u8,
    pub binary: Option<BinaryOverloads>,
    pub unary: Option<UnaryOverloads>,
}

impl std::fmt::Debug for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operator")
            .field("symbol", &self.symbol)
            .field("priority", &self.priority)
            .field("binary", &self.binary.is_some())
            .field("unary", &self.unary.is_some())
            .finish()
    }
}

impl Operator {
    pub fn binary(symbol: &str, priority: u8, overloads: BinaryOverloads) -> Self {
        Operator {
            symbol: symbol.to_string(),
            priority,
            unary_priority: PRIORITY_UNARY,
            binary: Some(overloads),
            unary: None,
        }
    }

    pub fn unary(symbol: &str, overloads: UnaryOverloads) -> Self {
        Operator {
            symbol: symbol.to_string(),
            priority: PRIORITY_UNARY,
            unary_priority: PRIORITY_UNARY,
            binary: None,
            unary: Some(overloads),
        }
    }

    pub fn with_unary(mut self, overloads: UnaryOverloads) -> Self {
        self.unary = Some(overloads);
        self
    }

    pub fn apply_binary(&self, left: &Operand, right: &Operand) -> OperatorResult {
        let overloads = self.binary.ok_or_else(|| ParserError::MissingOperand(self.symbol.clone()))?;
        if let (Some(f), Some(a), Some(b)) = (overloads.boolean, left.as_bool(), right.as_bool()) {
            return f(a, b);
        }
        if let (Some(f), Some(a), Some(b)) = (overloads.int, left.as_int(), right.as_int()) {
            return f(a, b);
        }
        if let (Some(f), Some(a), Some(b)) = (overloads.float, left.as_float(), right.as_float()) {
            return f(a, b);
        }
        if let Some(f) = overloads.text {
            return f(&left.to_string(), &right.to_string());
        }
        Err(ParserError::UnsupportedOperands {
            operator: self.symbol.clone(),
            types: format!("{} and {}", Operand::parse(&left.to_string()).type_name(), Operand::parse(&right.to_string()).type_name()),
        })
    }

    pub fn apply_unary(&self, operand: &Operand) -> OperatorResult {
        let overloads = self.unary.ok_or_else(|| ParserError::MissingOperand(self.symbol.clone()))?;
        if let (Some(f), Some(a)) = (overloads.boolean, operand.as_bool()) {
            return f(a);
        }
        if let (Some(f), Some(a)) = (overloads.int, operand.as_int()) {
            return f(a);
        }
        if let (Some(f), Some(a)) = (overloads.float, operand.as_float()) {
            return f(a);
        }
        if let Some(f) = overloads.text {
            return f(&operand.to_string());
        }
        Err(ParserError::UnsupportedOperands {
            operator: self.symbol.clone(),
            types: Operand::parse(&operand.to_string()).type_name().to_string(),
        })
    }
}

/// Operators known to one evaluator, keyed by symbol, plus the rules for
/// merging adjacent single-character operators into compound ones.
#[derive(Clone, Debug)]
pub struct OperatorTable {
    operators: HashMap<String, Operator>,
    merges: HashMap<(String, String), String>,
}

impl Default for OperatorTable {
    fn default() -> Self {
        let mut table = OperatorTable::empty();
        load_default_operators(&mut table);
        table
    }
}

impl OperatorTable {
    pub fn empty() -> Self {
        OperatorTable {
            operators: HashMap::new(),
            merges: HashMap::new(),
        }
    }

    pub fn register(&mut self, operator: Operator) -> &mut Self {
        debug!("Registering operator: {}", operator.symbol);
        self.operators.insert(operator.symbol.clone(), operator);
        self
    }

    /// `first` directly followed by `second` becomes `merged`.
    pub fn register_merge(&mut self, first: &str, second: &str, merged: &str) -> &mut Self {
        self.merges
            .insert((first.to_string(), second.to_string()), merged.to_string());
        self
    }

    pub fn get(&self, symbol: &str) -> Option<&Operator> {
        self.operators.get(symbol)
    }

    pub fn merge(&self, first: &str, second: &str) -> Option<&Operator> {
        self.merges
            .get(&(first.to_string(), second.to_string()))
            .and_then(|merged| self.operators.get(merged))
    }

    /// Whether `character` starts a new operator token.
    pub fn is_operator_char(&self, character: char) -> bool {
        let mut buffer = [0u8; 4];
        self.operators.contains_key(character.encode_utf8(&mut buffer) as &str)
    }
}

fn boolean(value: bool) -> OperatorResult {
    Ok(Operand::Boolean(value))
}

fn int(symbol: &str, value: Option<i64>) -> OperatorResult {
    value
        .map(Operand::Int)
        .ok_or_else(|| ParserError::UnsupportedOperands {
            operator: symbol.to_string(),
            types: "int and int (overflow or division by zero)".to_string(),
        })
}

/// Length-based ordering for strings. A pure integer literal on one side is
/// compared against the length of the other side instead.
fn measure(left: &str, right: &str) -> (i64, i64) {
    let length = |text: &str| text.chars().count() as i64;
    if is_integer_literal(left) {
        (left.trim().parse().unwrap_or_default(), length(right))
    } else if is_integer_literal(right) {
        (length(left), right.trim().parse().unwrap_or_default())
    } else {
        (length(left), length(right))
    }
}

fn power(base: i64, exponent: i64) -> OperatorResult {
    match u32::try_from(exponent) {
        Ok(exponent) => int("^", base.checked_pow(exponent)),
        Err(_) => Ok(Operand::Float((base as f64).powf(exponent as f64))),
    }
}

fn load_default_operators(table: &mut OperatorTable) {
    table
        .register(Operator::unary(
            "!",
            UnaryOverloads {
                boolean: Some(|a| boolean(!a)),
                text: Some(|a| boolean(!Operand::Text(a.into()).is_truthy())),
                ..Default::default()
            },
        ))
        .register(Operator::binary(
            "&",
            PRIORITY_LOGIC,
            BinaryOverloads {
                boolean: Some(|a, b| boolean(a && b)),
                text: Some(|a, b| boolean(Operand::Text(a.into()).is_truthy() && Operand::Text(b.into()).is_truthy())),
                ..Default::default()
            },
        ))
        .register(Operator::binary(
            "|",
            PRIORITY_LOGIC,
            BinaryOverloads {
                boolean: Some(|a, b| boolean(a || b)),
                text: Some(|a, b| boolean(Operand::Text(a.into()).is_truthy() || Operand::Text(b.into()).is_truthy())),
                ..Default::default()
            },
        ))
        .register(Operator::binary(
            "=",
            PRIORITY_COMPARISON,
            BinaryOverloads {
                boolean: Some(|a, b| boolean(a == b)),
                int: Some(|a, b| boolean(a == b)),
                float: Some(|a, b| boolean(a == b)),
                text: Some(|a, b| boolean(a.trim().eq_ignore_ascii_case(b.trim()))),
            },
        ))
        .register(Operator::binary(
            "==",
            PRIORITY_COMPARISON,
            BinaryOverloads {
                boolean: Some(|a, b| boolean(a == b)),
                int: Some(|a, b| boolean(a == b)),
                float: Some(|a, b| boolean(a == b)),
                text: Some(|a, b| boolean(a == b)),
            },
        ))
        .register(Operator::binary(
            "!=",
            PRIORITY_COMPARISON,
            BinaryOverloads {
                boolean: Some(|a, b| boolean(a != b)),
                int: Some(|a, b| boolean(a != b)),
                float: Some(|a, b| boolean(a != b)),
                text: Some(|a, b| boolean(a != b)),
            },
        ))
        .register(Operator::binary(
            "<",
            PRIORITY_COMPARISON,
            BinaryOverloads {
                int: Some(|a, b| boolean(a < b)),
                float: Some(|a, b| boolean(a < b)),
                text: Some(|a, b| {
                    let (a, b) = measure(a, b);
                    boolean(a < b)
                }),
                ..Default::default()
            },
        ))
        .register(Operator::binary(
            ">",
            PRIORITY_COMPARISON,
            BinaryOverloads {
                int: Some(|a, b| boolean(a > b)),
                float: Some(|a, b| boolean(a > b)),
                text: Some(|a, b| {
                    let (a, b) = measure(a, b);
                    boolean(a > b)
                }),
                ..Default::default()
            },
        ))
        .register(Operator::binary(
            "<=",
            PRIORITY_COMPARISON,
            BinaryOverloads {
                int: Some(|a, b| boolean(a <= b)),
                float: Some(|a, b| boolean(a <= b)),
                text: Some(|a, b| {
                    let (a, b) = measure(a, b);
                    boolean(a <= b)
                }),
                ..Default::default()
            },
        ))
        .register(Operator::binary(
            ">=",
            PRIORITY_COMPARISON,
            BinaryOverloads {
                int: Some(|a, b| boolean(a >= b)),
                float: Some(|a, b| boolean(a >= b)),
                text: Some(|a, b| {
                    let (a, b) = measure(a, b);
                    boolean(a >= b)
                }),
                ..Default::default()
            },
        ))
        .register(Operator::binary(
            "%",
            PRIORITY_MODULO,
            BinaryOverloads {
                int: Some(|a, b| int("%", a.checked_rem(b))),
                float: Some(|a, b| Ok(Operand::Float(a % b))),
                ..Default::default()
            },
        ))
        .register(
            Operator::binary(
                "+",
                PRIORITY_ADDITIVE,
                BinaryOverloads {
                    int: Some(|a, b| int("+", a.checked_add(b))),
                    float: Some(|a, b| Ok(Operand::Float(a + b))),
                    text: Some(|a, b| Ok(Operand::Text(format!("{}{}", a, b)))),
                    ..Default::default()
                },
            )
            .with_unary(UnaryOverloads {
                int: Some(|a| Ok(Operand::Int(a))),
                float: Some(|a| Ok(Operand::Float(a))),
                ..Default::default()
            }),
        )
        .register(
            Operator::binary(
                "-",
                PRIORITY_ADDITIVE,
                BinaryOverloads {
                    int: Some(|a, b| int("-", a.checked_sub(b))),
                    float: Some(|a, b| Ok(Operand::Float(a - b))),
                    ..Default::default()
                },
            )
            .with_unary(UnaryOverloads {
                int: Some(|a| int("-", a.checked_neg())),
                float: Some(|a| Ok(Operand::Float(-a))),
                ..Default::default()
            }),
        )
        .register(Operator::binary(
            "*",
            PRIORITY_MULTIPLICATIVE,
            BinaryOverloads {
                int: Some(|a, b| int("*", a.checked_mul(b))),
                float: Some(|a, b| Ok(Operand::Float(a * b))),
                ..Default::default()
            },
        ))
        .register(Operator::binary(
            "/",
            PRIORITY_MULTIPLICATIVE,
            BinaryOverloads {
                int: Some(|a, b| int("/", a.checked_div(b))),
                float: Some(|a, b| Ok(Operand::Float(a / b))),
                ..Default::default()
            },
        ))
        .register(Operator::binary(
            "^",
            PRIORITY_MULTIPLICATIVE,
            BinaryOverloads {
                int: Some(power),
                float: Some(|a, b| Ok(Operand::Float(a.powf(b)))),
                ..Default::default()
            },
        ))
        .register(Operator::unary(
            "++",
            UnaryOverloads {
                int: Some(|a| int("++", a.checked_add(1))),
                float: Some(|a| Ok(Operand::Float(a + 1.0))),
                ..Default::default()
            },
        ))
        .register(Operator::unary(
            "--",
            UnaryOverloads {
                int: Some(|a| int("--", a.checked_sub(1))),
                float: Some(|a| Ok(Operand::Float(a - 1.0))),
                ..Default::default()
            },
        ));

    table
        .register_merge("=", "=", "==")
        .register_merge("!", "=", "!=")
        .register_merge("<", "=", "<=")
        .register_merge(">", "=", ">=")
        .register_merge("&", "&", "&&")
        .register_merge("|", "|", "||")
        .register_merge("+", "+", "++")
        .register_merge("-", "-", "--");

    // Doubled logic operators behave like the single ones
    if let Some(and) = table.get("&").cloned() {
        table.register(Operator { symbol: "&&".to_string(), ..and });
    }
    if let Some(or) = table.get("|").cloned() {
        table.register(Operator { symbol: "||".to_string(), ..or });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_resolve_to_registered_operators() {
        let table = OperatorTable::default();
        assert_eq!(table.merge("=", "=").map(|op| op.symbol.as_str()), Some("=="));
        assert_eq!(table.merge("-", "-").map(|op| op.symbol.as_str()), Some("--"));
        assert!(table.merge("*", "-").is_none());
        assert!(table.is_operator_char('^'));
        assert!(!table.is_operator_char('a'));
    }

    #[test]
    fn coercion_prefers_most_specific_overload() {
        let table = OperatorTable::default();
        let plus = table.get("+").unwrap();
        let sum = plus.apply_binary(&Operand::Text("40".into()), &Operand::Text("2".into())).unwrap();
        assert_eq!(sum, Operand::Int(42));
        let mixed = plus.apply_binary(&Operand::Text("1".into()), &Operand::Text("0.5".into())).unwrap();
        assert_eq!(mixed, Operand::Float(1.5));
        let text = plus.apply_binary(&Operand::Text("a".into()), &Operand::Int(1)).unwrap();
        assert_eq!(text, Operand::Text("a1".into()));
    }

    #[test]
    fn unsupported_operands_name_the_operator() {
        let table = OperatorTable::default();
        let error = table
            .get("*")
            .unwrap()
            .apply_binary(&Operand::Text("a".into()), &Operand::Text("b".into()))
            .unwrap_err();
        assert!(matches!(error, ParserError::UnsupportedOperands { operator, .. } if operator == "*"));
    }

    #[test]
    fn integer_division_by_zero_is_an_error() {
        let table = OperatorTable::default();
        assert!(table.get("/").unwrap().apply_binary(&Operand::Int(1), &Operand::Int(0)).is_err());
    }
}

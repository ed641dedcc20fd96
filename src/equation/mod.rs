//! Infix equation evaluator used by conditions, loops, `calculate` and
//! `{=...}` arguments.
//!
//! Evaluation happens in four passes over a flat element list:
//!
//! 1. tokenizing into values and single-character operators (parenthesised
//!    groups are evaluated recursively and inserted as one value),
//! 2. merging adjacent operators (`=` `=` becomes `==`, `-` `-` becomes `--`),
//! 3. deciding for every operator whether it is used in its single-argument
//!    form (no value on its left),
//! 4. reducing the highest priority operators first until one value is left.

pub mod operand;
pub mod operator;

use log::trace;

pub use operand::Operand;
pub use operator::{BinaryOverloads, Operator, OperatorTable, UnaryOverloads};

use crate::errors::ParserError;

/// Resolves raw value tokens (`$action`, `{argument}`, `@bundle` ...) before
/// they enter an equation.
pub trait ValueResolver {
    fn resolve_value(&mut self, raw: &str) -> Result<String, ParserError>;

    /// Opening and closing markers of placeholders, which are kept whole
    /// even when they contain operator characters.
    fn argument_markers(&self) -> (char, char) {
        ('{', '}')
    }
}

#[derive(Debug, Clone)]
enum Element {
    Value(Operand),
    Operator { operator: Operator, unary: bool },
}

impl Element {
    fn is_value(&self) -> bool {
        matches!(self, Element::Value(_))
    }

    fn priority(&self) -> Option<u8> {
        match self {
            Element::Operator { operator, unary: true } => Some(operator.unary_priority),
            Element::Operator { operator, unary: false } => Some(operator.priority),
            Element::Value(_) => None,
        }
    }
}

pub struct Equation<'a> {
    operators: &'a OperatorTable,
    resolver: Option<&'a mut dyn ValueResolver>,
    argument_opening: char,
    argument_closing: char,
}

impl<'a> Equation<'a> {
    pub fn new(operators: &'a OperatorTable) -> Self {
        Equation {
            operators,
            resolver: None,
            argument_opening: '{',
            argument_closing: '}',
        }
    }

    pub fn with_resolver(operators: &'a OperatorTable, resolver: &'a mut dyn ValueResolver) -> Self {
        let (argument_opening, argument_closing) = resolver.argument_markers();
        Equation {
            operators,
            resolver: Some(resolver),
            argument_opening,
            argument_closing,
        }
    }

    /// Evaluates `equation` and returns the text form of its result.
    pub fn get_result(&mut self, equation: &str) -> Result<String, ParserError> {
        Ok(self.evaluate(equation)?.to_string())
    }

    /// Evaluates `equation` and converts the result with [`Operand::is_truthy`].
    pub fn is_true(&mut self, equation: &str) -> Result<bool, ParserError> {
        Ok(self.evaluate(equation)?.is_truthy())
    }

    pub fn evaluate(&mut self, equation: &str) -> Result<Operand, ParserError> {
        trace!("Evaluating equation: {:?}", equation);
        let elements = self.tokenize(equation)?;
        let elements = self.merge(elements, equation)?;
        let elements = classify(elements, equation)?;
        reduce(elements, equation)
    }

    fn tokenize(&mut self, equation: &str) -> Result<Vec<Element>, ParserError> {
        let mut elements = Vec::new();
        let mut value = String::new();
        let mut quoted = false;
        let mut chars = equation.chars().peekable();

        while let Some(character) = chars.next() {
            match character {
                '"' | '\'' => {
                    let mut closed = false;
                    for next in chars.by_ref() {
                        if next == character {
                            closed = true;
                            break;
                        }
                        value.push(next);
                    }
                    if !closed {
                        return Err(ParserError::equation(equation, "unclosed quote"));
                    }
                    quoted = true;
                }
                '(' => {
                    self.flush(&mut value, &mut quoted, &mut elements)?;
                    let mut depth = 1;
                    let mut group = String::new();
                    let mut quote: Option<char> = None;
                    for next in chars.by_ref() {
                        match (quote, next) {
                            (Some(open), next) if next == open => quote = None,
                            (Some(_), _) => {}
                            (None, '"' | '\'') => quote = Some(next),
                            (None, '(') => depth += 1,
                            (None, ')') => depth -= 1,
                            _ => {}
                        }
                        if depth == 0 {
                            break;
                        }
                        group.push(next);
                    }
                    if depth != 0 {
                        return Err(ParserError::UnbalancedParenthesis(equation.to_string()));
                    }
                    elements.push(Element::Value(self.evaluate(&group)?));
                }
                ')' => return Err(ParserError::UnbalancedParenthesis(equation.to_string())),
                c if c == self.argument_opening => {
                    // Placeholders are opaque: operator characters inside stay in the value
                    value.push(c);
                    let mut depth = 1;
                    for next in chars.by_ref() {
                        value.push(next);
                        if next == self.argument_opening {
                            depth += 1;
                        } else if next == self.argument_closing {
                            depth -= 1;
                        }
                        if depth == 0 {
                            break;
                        }
                    }
                }
                c if self.operators.is_operator_char(c) => {
                    self.flush(&mut value, &mut quoted, &mut elements)?;
                    let operator = self
                        .operators
                        .get(c.encode_utf8(&mut [0u8; 4]))
                        .cloned()
                        .ok_or_else(|| ParserError::equation(equation, format!("unknown operator {}", c)))?;
                    elements.push(Element::Operator { operator, unary: false });
                }
                c if c.is_whitespace() => {
                    if !value.is_empty() && !quoted {
                        value.push(c);
                    }
                }
                c => value.push(c),
            }
        }
        self.flush(&mut value, &mut quoted, &mut elements)?;
        Ok(elements)
    }

    fn flush(&mut self, value: &mut String, quoted: &mut bool, elements: &mut Vec<Element>) -> Result<(), ParserError> {
        if value.trim().is_empty() && !*quoted {
            value.clear();
            return Ok(());
        }
        let raw = std::mem::take(value);
        let operand = if *quoted {
            Operand::Text(raw)
        } else {
            let raw = raw.trim();
            match self.resolver.as_mut() {
                Some(resolver) => Operand::Text(resolver.resolve_value(raw)?),
                None => Operand::Text(raw.to_string()),
            }
        };
        *quoted = false;
        elements.push(Element::Value(operand));
        Ok(())
    }

    fn merge(&self, elements: Vec<Element>, equation: &str) -> Result<Vec<Element>, ParserError> {
        let mut merged: Vec<Element> = Vec::with_capacity(elements.len());
        for element in elements {
            if let (Some(Element::Operator { operator: previous, .. }), Element::Operator { operator: next, .. }) =
                (merged.last(), &element)
            {
                if let Some(compound) = self.operators.merge(&previous.symbol, &next.symbol) {
                    // `3--2` is a subtraction of a negation, not a decrement
                    let before_previous_is_value = merged.len() >= 2 && merged[merged.len() - 2].is_value();
                    if compound.binary.is_some() || !before_previous_is_value {
                        let compound = compound.clone();
                        trace!("Merging operators into '{}' in {:?}", compound.symbol, equation);
                        merged.pop();
                        merged.push(Element::Operator { operator: compound, unary: false });
                        continue;
                    }
                }
            }
            merged.push(element);
        }
        Ok(merged)
    }
}

/// Marks operators with no value on their left as single-argument uses.
fn classify(mut elements: Vec<Element>, equation: &str) -> Result<Vec<Element>, ParserError> {
    for index in 0..elements.len() {
        let left_is_value = index > 0 && elements[index - 1].is_value();
        let right_is_operator = elements.get(index + 1).is_some_and(|next| !next.is_value());
        if let Element::Operator { operator, unary } = &mut elements[index] {
            if left_is_value && operator.binary.is_some() {
                continue;
            }
            if operator.unary.is_none() {
                if left_is_value || right_is_operator {
                    return Err(ParserError::equation(
                        equation,
                        format!("operator \"{}\" cannot follow another operator", operator.symbol),
                    ));
                }
                return Err(ParserError::MissingOperand(operator.symbol.clone()));
            }
            if left_is_value {
                return Err(ParserError::equation(
                    equation,
                    format!("operator \"{}\" takes a single argument on its right", operator.symbol),
                ));
            }
            *unary = true;
        }
    }
    Ok(elements)
}

fn reduce(mut elements: Vec<Element>, equation: &str) -> Result<Operand, ParserError> {
    if elements.is_empty() {
        return Err(ParserError::equation(equation, "empty equation"));
    }

    while elements.len() > 1 {
        let Some(max) = elements.iter().filter_map(Element::priority).max() else {
            return Err(ParserError::Unreduced(equation.to_string()));
        };

        let mut reduced = false;
        for index in 0..elements.len() {
            if elements[index].priority() != Some(max) {
                continue;
            }
            let Element::Operator { operator, unary } = &elements[index] else {
                continue;
            };
            let right = match elements.get(index + 1) {
                Some(Element::Value(right)) => right,
                _ => continue,
            };
            if *unary {
                let result = operator.apply_unary(right)?;
                trace!("{}{} = {}", operator.symbol, right, result);
                elements.splice(index..=index + 1, [Element::Value(result)]);
            } else {
                let Some(Element::Value(left)) = index.checked_sub(1).and_then(|left| elements.get(left)) else {
                    continue;
                };
                let result = operator.apply_binary(left, right)?;
                trace!("{} {} {} = {}", left, operator.symbol, right, result);
                elements.splice(index - 1..=index + 1, [Element::Value(result)]);
            }
            reduced = true;
            break;
        }

        if !reduced {
            let symbol = elements
                .iter()
                .find_map(|element| match element {
                    Element::Operator { operator, .. } if Some(max) == element.priority() => Some(operator.symbol.clone()),
                    _ => None,
                })
                .unwrap_or_default();
            return Err(ParserError::MissingOperand(symbol));
        }
    }

    match elements.pop() {
        Some(Element::Value(result)) => Ok(result),
        Some(Element::Operator { operator, .. }) => Err(ParserError::MissingOperand(operator.symbol)),
        None => Err(ParserError::Unreduced(equation.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(equation: &str) -> String {
        Equation::new(&OperatorTable::default()).get_result(equation).unwrap()
    }

    #[test]
    fn arithmetic_priorities() {
        assert_eq!(result("40+2"), "42");
        assert_eq!(result("3-1^2"), "2");
        assert_eq!(result("--3^2"), "4");
        assert_eq!(result("(3-1)^2"), "4");
        assert_eq!(result("2 * -3"), "-6");
        assert_eq!(result("3--2"), "5");
        assert_eq!(result("10 % 4 + 1"), "0");
        assert_eq!(result("((1 + 1) * (2 + 1))"), "6");
        assert_eq!(result("1.5 + 1"), "2.5");
    }

    #[test]
    fn string_ordering_compares_lengths() {
        assert_eq!(result("string>9"), "false");
        assert_eq!(result("string>t"), "true");
        assert_eq!(result("abc <= 3"), "true");
    }

    #[test]
    fn logic_and_equality() {
        assert_eq!(result("true && !false"), "true");
        assert_eq!(result("3 == 3.0"), "true");
        assert_eq!(result("Text = text"), "true");
        assert_eq!(result("Text == text"), "false");
        assert_eq!(result("a != b"), "true");
        assert_eq!(result("1 < 2 || false"), "true");
        assert_eq!(result("'a b' == \"a b\""), "true");
        assert_eq!(result("!!true"), "true");
        assert_eq!(result("!0"), "true");
        assert_eq!(result("!-1"), "true");
        assert_eq!(result("!2"), "false");
    }

    #[test]
    fn quotes_inside_groups() {
        assert_eq!(result("(\"a)b\") + c"), "a)bc");
        assert_eq!(result("('(' == \"(\")"), "true");
    }

    #[test]
    fn text_concatenation() {
        assert_eq!(result("hello world + \"!\""), "hello world!");
    }

    #[test]
    fn malformed_equations() {
        let table = OperatorTable::default();
        let mut equation = Equation::new(&table);
        assert!(matches!(equation.evaluate("(1 + 2"), Err(ParserError::UnbalancedParenthesis(_))));
        assert!(matches!(equation.evaluate("1 + 2)"), Err(ParserError::UnbalancedParenthesis(_))));
        assert!(matches!(equation.evaluate("1 +"), Err(ParserError::MissingOperand(_))));
        assert!(equation.evaluate("5 * * 3").is_err());
        assert!(matches!(equation.evaluate("(1) (2)"), Err(ParserError::Unreduced(_))));
        assert!(equation.evaluate("a * b").is_err());
        assert!(equation.evaluate("").is_err());
    }

    struct Doubler;

    impl ValueResolver for Doubler {
        fn resolve_value(&mut self, raw: &str) -> Result<String, ParserError> {
            Ok(match raw.strip_prefix('$') {
                Some(number) => (number.parse::<i64>().unwrap_or_default() * 2).to_string(),
                None => raw.to_string(),
            })
        }
    }

    #[test]
    fn values_go_through_the_resolver() {
        let table = OperatorTable::default();
        let mut doubler = Doubler;
        let mut equation = Equation::with_resolver(&table, &mut doubler);
        assert_eq!(equation.get_result("$4 + 1").unwrap(), "9");
    }

    struct Guillemets;

    impl ValueResolver for Guillemets {
        fn resolve_value(&mut self, raw: &str) -> Result<String, ParserError> {
            Ok(if raw == "«my-count»" { "3".to_string() } else { raw.to_string() })
        }

        fn argument_markers(&self) -> (char, char) {
            ('«', '»')
        }
    }

    #[test]
    fn placeholders_use_the_resolver_markers() {
        let table = OperatorTable::default();
        let mut resolver = Guillemets;
        let mut equation = Equation::with_resolver(&table, &mut resolver);
        assert_eq!(equation.get_result("«my-count» + 1").unwrap(), "4");
        // Braces are plain characters under other markers
        assert!(Equation::new(&table).evaluate("«my-count» * 2").is_err());
    }

    #[test]
    fn custom_operators_can_be_registered() {
        let mut table = OperatorTable::default();
        table.register(Operator::binary(
            "~",
            operator::PRIORITY_COMPARISON,
            BinaryOverloads {
                text: Some(|a, b| Ok(Operand::Boolean(a.contains(b)))),
                ..Default::default()
            },
        ));
        let mut equation = Equation::new(&table);
        assert_eq!(equation.get_result("template ~ late").unwrap(), "true");
    }
}

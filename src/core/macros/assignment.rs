use log::debug;
use rand::seq::IndexedRandom;

use crate::{errors::ParserError, syntax::NULL_ARGUMENT, tag::TagData, MacroTag, Parser};

/// How an assignment macro turns its raw value into the stored argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// `assign`: stored as written. `{arguments}` inside are resolved when
    /// the stored argument is used, not now.
    Raw,
    /// `argument`: resolved like any attribute value (`$action`, `@line`, ...).
    Resolved,
    /// `calculate`: evaluated as an equation.
    Equation,
    /// `random`: a random element of an array.
    Random,
}

/// Writes into the argument table. Accepts `<:assign key value/>`,
/// `<:assign key=name value=.../>`, `<:assign name=value other=value/>` or
/// `<:assign key>value</:assign>`.
#[derive(Debug)]
pub struct AssignmentMacro {
    data: TagData,
    assignment: Assignment,
}

impl AssignmentMacro {
    pub fn new(data: TagData, assignment: Assignment) -> Self {
        Self { data, assignment }
    }

    /// (key, raw value) pairs described by the attributes and body.
    fn pairs(&self) -> Vec<(String, String)> {
        let attributes = &self.data.attributes;
        let body = self.data.body.clone();
        match (attributes.get("key"), attributes.positional()) {
            (Some(key), _) => {
                let value = attributes.get("value").map(str::to_string).or(body);
                vec![(key.to_string(), value.unwrap_or_default())]
            }
            (None, [key, value @ ..]) => {
                let value = if value.is_empty() { body.unwrap_or_default() } else { value.join(" ") };
                vec![(key.clone(), value)]
            }
            (None, []) => attributes.named().to_vec(),
        }
    }

    fn evaluate(&self, parser: &mut Parser, raw: &str) -> Result<String, ParserError> {
        match self.assignment {
            Assignment::Raw => Ok(raw.to_string()),
            Assignment::Resolved => parser.parse_string(raw),
            Assignment::Equation => parser.calculate(raw),
            Assignment::Random => {
                let values = parser.parse_array(raw)?;
                Ok(values
                    .choose(&mut rand::rng())
                    .cloned()
                    .unwrap_or_else(|| NULL_ARGUMENT.to_string()))
            }
        }
    }
}

impl MacroTag for AssignmentMacro {
    fn data(&self) -> &TagData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    fn close_tag(&mut self, parser: &mut Parser) -> Result<(), ParserError> {
        let pairs = self.pairs();
        if pairs.is_empty() {
            return parser.error_if_strict(ParserError::InvalidAttributes {
                tag: self.data.name.clone(),
                message: "nothing to assign".to_string(),
            });
        }
        for (key, raw) in pairs {
            let value = self.evaluate(parser, &raw)?;
            debug!("<:{}> {} = {:?}", self.data.name, key, value);
            parser.data_mut().add_argument(&key, value);
        }
        Ok(())
    }
}

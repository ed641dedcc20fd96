use log::trace;

use crate::{errors::ParserError, parser::split_else, tag::TagData, MacroTag, Parser};

use super::{condition_of, sequence_name};

/// `<:if test="...">on true<:if:else/>on false</:if>`. The condition may
/// also be given as positional attributes, `<:if {count} == 3>`; a `>` in
/// the condition has to be quoted or it ends the tag.
#[derive(Debug)]
pub struct ConditionalMacro {
    data: TagData,
}

impl ConditionalMacro {
    pub fn new(data: TagData) -> Self {
        Self { data }
    }
}

impl MacroTag for ConditionalMacro {
    fn data(&self) -> &TagData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    fn close_tag(&mut self, parser: &mut Parser) -> Result<(), ParserError> {
        let condition = condition_of(&self.data);
        let result = if condition.trim().is_empty() {
            parser.error_if_strict(ParserError::InvalidAttributes {
                tag: self.data.name.clone(),
                message: "missing condition".to_string(),
            })?;
            false
        } else {
            parser.is_true(&condition)?
        };
        trace!("<:{}> condition {:?} is {}", self.data.name, condition, result);
        append_branch(parser, &self.data, result);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullCheck {
    /// `notNull`: every value is set.
    All,
    /// `anyNotNull`: at least one value is set.
    Any,
    /// `isNull`: at least one value is missing.
    Missing,
}

/// Branches on whether its attribute values are null. Values that are
/// actions are invoked and their results checked.
#[derive(Debug)]
pub struct NullCheckMacro {
    data: TagData,
    check: NullCheck,
}

impl NullCheckMacro {
    pub fn new(data: TagData, check: NullCheck) -> Self {
        Self { data, check }
    }
}

impl MacroTag for NullCheckMacro {
    fn data(&self) -> &TagData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    fn close_tag(&mut self, parser: &mut Parser) -> Result<(), ParserError> {
        let values: Vec<String> = match self.data.attributes.positional() {
            [] => self.data.attributes.named().iter().map(|(_, value)| value.clone()).collect(),
            positional => positional.to_vec(),
        };
        if values.is_empty() {
            parser.error_if_strict(ParserError::InvalidAttributes {
                tag: self.data.name.clone(),
                message: "nothing to check".to_string(),
            })?;
        }

        let mut nulls = 0;
        for value in &values {
            if parser.is_null(value)? {
                nulls += 1;
            }
        }
        let result = match self.check {
            NullCheck::All => !values.is_empty() && nulls == 0,
            NullCheck::Any => nulls < values.len(),
            NullCheck::Missing => values.is_empty() || nulls > 0,
        };
        trace!("<:{}> {}/{} values null: {}", self.data.name, nulls, values.len(), result);
        append_branch(parser, &self.data, result);
        Ok(())
    }
}

/// Appends the body part selected by `result`. A false result without an
/// else marker appends nothing.
fn append_branch(parser: &mut Parser, data: &TagData, result: bool) {
    let (on_true, on_false) = split_else(data.body(), &data.name, parser.syntax(), parser.is_strict());
    let branch = if result { Some(on_true) } else { on_false };
    if let Some(branch) = branch {
        let name = sequence_name(parser, &data.name);
        parser.append(&branch, &name);
    }
}

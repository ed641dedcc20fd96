use log::{debug, trace};

use crate::{
    errors::ParserError,
    syntax::{Syntax, NULL_ARGUMENT},
    tag::TagData,
    MacroTag, Parser,
};

use super::{condition_of, sequence_name};

/// Inner text of the reserved index placeholder: `loop:index`.
fn index_name(syntax: &Syntax, macro_name: &str) -> String {
    format!("{}{}{}", macro_name, syntax.macro_marker, syntax.index_suffix)
}

/// Substitutes the index placeholder and any named values into one iteration.
fn iteration(syntax: &Syntax, body: &str, index_name: &str, index: usize, values: &[(&str, &str)]) -> String {
    syntax.substitute(body, |placeholder| {
        if placeholder.eq_ignore_ascii_case(index_name) {
            return Some(index.to_string());
        }
        values
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(placeholder))
            .map(|(_, value)| value.to_string())
    })
}

fn append_iterations(parser: &mut Parser, macro_name: &str, iterations: usize, result: String) {
    debug!("<:{}> unrolled {} iterations", macro_name, iterations);
    let name = sequence_name(parser, macro_name);
    parser.append(&result, &name);
}

/// `<:loop times=3>x{loop:index} </:loop>` gives `x0 x1 x2 `.
#[derive(Debug)]
pub struct LoopMacro {
    data: TagData,
}

impl LoopMacro {
    pub fn new(data: TagData) -> Self {
        Self { data }
    }
}

impl MacroTag for LoopMacro {
    fn data(&self) -> &TagData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    fn close_tag(&mut self, parser: &mut Parser) -> Result<(), ParserError> {
        let Some(times) = self.data.attributes.get_or_position("times", 0) else {
            return parser.error_if_strict(ParserError::InvalidAttributes {
                tag: self.data.name.clone(),
                message: "missing number of iterations".to_string(),
            });
        };
        let times = usize::try_from(parser.parse_int(times)?).unwrap_or(0);

        let syntax = parser.syntax().clone();
        let index_name = index_name(&syntax, &self.data.name);
        let result: String = (0..times)
            .map(|index| iteration(&syntax, self.data.body(), &index_name, index, &[]))
            .collect();
        append_iterations(parser, &self.data.name, times, result);
        Ok(())
    }
}

/// `<:forEach item="a;b" other="1;2;3">{item}{other} </:forEach>`: arrays are
/// walked in parallel to the length of the longest one; shorter ones yield
/// `null` once exhausted.
#[derive(Debug)]
pub struct ForEachMacro {
    data: TagData,
}

impl ForEachMacro {
    pub fn new(data: TagData) -> Self {
        Self { data }
    }
}

/// Resolves every named attribute to an array.
fn named_arrays(parser: &mut Parser, data: &TagData) -> Result<Vec<(String, Vec<String>)>, ParserError> {
    if !data.attributes.positional().is_empty() {
        parser.error_if_strict(ParserError::InvalidAttributes {
            tag: data.name.clone(),
            message: "arrays need names, e.g. item=\"a;b\"".to_string(),
        })?;
    }
    let mut arrays = Vec::new();
    for (name, value) in data.attributes.named() {
        arrays.push((name.clone(), parser.parse_array(value)?));
    }
    Ok(arrays)
}

impl MacroTag for ForEachMacro {
    fn data(&self) -> &TagData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    fn close_tag(&mut self, parser: &mut Parser) -> Result<(), ParserError> {
        let arrays = named_arrays(parser, &self.data)?;
        let length = arrays.iter().map(|(_, values)| values.len()).max().unwrap_or(0);

        let syntax = parser.syntax().clone();
        let index_name = index_name(&syntax, &self.data.name);
        let mut result = String::new();
        for index in 0..length {
            let values: Vec<(&str, &str)> = arrays
                .iter()
                .map(|(name, values)| {
                    let value = values.get(index).map(String::as_str).unwrap_or(NULL_ARGUMENT);
                    (name.as_str(), value)
                })
                .collect();
            result.push_str(&iteration(&syntax, self.data.body(), &index_name, index, &values));
        }
        append_iterations(parser, &self.data.name, length, result);
        Ok(())
    }
}

/// Every combination of its arrays, the first attribute varying slowest.
/// `{nestedForEach:index}` counts all iterations.
#[derive(Debug)]
pub struct NestedForEachMacro {
    data: TagData,
}

impl NestedForEachMacro {
    pub fn new(data: TagData) -> Self {
        Self { data }
    }
}

impl MacroTag for NestedForEachMacro {
    fn data(&self) -> &TagData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    fn close_tag(&mut self, parser: &mut Parser) -> Result<(), ParserError> {
        let arrays = named_arrays(parser, &self.data)?;
        let syntax = parser.syntax().clone();
        let index_name = index_name(&syntax, &self.data.name);

        let mut result = String::new();
        let mut iterations = 0;
        if !arrays.is_empty() && arrays.iter().all(|(_, values)| !values.is_empty()) {
            let mut positions = vec![0usize; arrays.len()];
            loop {
                let values: Vec<(&str, &str)> = arrays
                    .iter()
                    .zip(&positions)
                    .map(|((name, values), position)| (name.as_str(), values[*position].as_str()))
                    .collect();
                result.push_str(&iteration(&syntax, self.data.body(), &index_name, iterations, &values));
                iterations += 1;

                // Odometer: the last array turns fastest
                let mut column = arrays.len();
                loop {
                    if column == 0 {
                        append_iterations(parser, &self.data.name, iterations, result);
                        return Ok(());
                    }
                    column -= 1;
                    positions[column] += 1;
                    if positions[column] < arrays[column].1.len() {
                        break;
                    }
                    positions[column] = 0;
                }
            }
        }
        append_iterations(parser, &self.data.name, iterations, result);
        Ok(())
    }
}

/// Repeats its body while the condition holds.
///
/// The condition's `{arguments}` are resolved once, when the macro tag is
/// read, so only parts that are evaluated again (actions, `$name`) can make
/// it change between iterations. A condition built purely from arguments is
/// either never true or loops forever; pass `limit` to cap the iterations.
#[derive(Debug)]
pub struct WhileMacro {
    data: TagData,
}

impl WhileMacro {
    pub fn new(data: TagData) -> Self {
        Self { data }
    }
}

impl MacroTag for WhileMacro {
    fn data(&self) -> &TagData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    fn close_tag(&mut self, parser: &mut Parser) -> Result<(), ParserError> {
        let condition = condition_of(&self.data);
        if condition.trim().is_empty() {
            return parser.error_if_strict(ParserError::InvalidAttributes {
                tag: self.data.name.clone(),
                message: "missing condition".to_string(),
            });
        }
        let limit = match self.data.attributes.get("limit") {
            Some(limit) => Some(usize::try_from(parser.parse_int(limit)?).unwrap_or(0)),
            None => None,
        };

        let syntax = parser.syntax().clone();
        let index_name = index_name(&syntax, &self.data.name);
        let mut result = String::new();
        let mut index = 0;
        while limit.is_none_or(|limit| index < limit) && parser.is_true(&condition)? {
            trace!("<:{}> iteration {}", self.data.name, index);
            result.push_str(&iteration(&syntax, self.data.body(), &index_name, index, &[]));
            index += 1;
        }
        append_iterations(parser, &self.data.name, index, result);
        Ok(())
    }
}

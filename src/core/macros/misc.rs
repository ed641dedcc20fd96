use log::{log, trace, Level};

use crate::{errors::ParserError, tag::TagData, MacroTag, Parser};

use super::sequence_name;

/// Target used by the logging macros, so template logs can be filtered
/// apart from the parser's own.
pub const TEMPLATE_LOG_TARGET: &str = "template_weaver::template";

/// Message of `exception` and the logging macros: the `message` attribute,
/// the positional attributes or the body, resolved.
fn message_of(parser: &mut Parser, data: &TagData) -> Result<String, ParserError> {
    let raw = match (data.attributes.get("message"), data.attributes.positional()) {
        (Some(message), _) => message.to_string(),
        (None, []) => data.body().to_string(),
        (None, positional) => positional.join(" "),
    };
    parser.parse_string(&raw)
}

/// `<:comment>...</:comment>`: drops its body.
#[derive(Debug)]
pub struct CommentMacro {
    data: TagData,
}

impl CommentMacro {
    pub fn new(data: TagData) -> Self {
        Self { data }
    }
}

impl MacroTag for CommentMacro {
    fn data(&self) -> &TagData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    fn close_tag(&mut self, _parser: &mut Parser) -> Result<(), ParserError> {
        trace!("Skipped {} chars of commented template", self.data.body().len());
        Ok(())
    }
}

/// `<:exception message="..."/>`: aborts parsing with a custom error.
#[derive(Debug)]
pub struct ExceptionMacro {
    data: TagData,
}

impl ExceptionMacro {
    pub fn new(data: TagData) -> Self {
        Self { data }
    }
}

impl MacroTag for ExceptionMacro {
    fn data(&self) -> &TagData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    fn close_tag(&mut self, parser: &mut Parser) -> Result<(), ParserError> {
        Err(ParserError::Custom(message_of(parser, &self.data)?))
    }
}

/// `<:logInfo>Loaded {count} items</:logInfo>`
#[derive(Debug)]
pub struct LogMacro {
    data: TagData,
    level: Level,
}

impl LogMacro {
    pub fn new(data: TagData, level: Level) -> Self {
        Self { data, level }
    }
}

impl MacroTag for LogMacro {
    fn data(&self) -> &TagData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    fn close_tag(&mut self, parser: &mut Parser) -> Result<(), ParserError> {
        let message = message_of(parser, &self.data)?;
        log!(target: TEMPLATE_LOG_TARGET, self.level, "{}", message);
        Ok(())
    }
}

/// Invokes an action with an argument, which plain `$action` references
/// cannot pass:
///
/// ```text
/// <:evaluate action="$format" argument="{price}"/>
/// <:evaluate action="$upper" key="title">{name}</:evaluate>
/// ```
///
/// With `key` the result is stored as an argument; otherwise it is
/// appended to the template unless it is null.
#[derive(Debug)]
pub struct EvaluateMacro {
    data: TagData,
}

impl EvaluateMacro {
    pub fn new(data: TagData) -> Self {
        Self { data }
    }
}

impl MacroTag for EvaluateMacro {
    fn data(&self) -> &TagData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    fn close_tag(&mut self, parser: &mut Parser) -> Result<(), ParserError> {
        let attributes = &self.data.attributes;
        let Some(action) = attributes.get_or_position("action", 0) else {
            return parser.error_if_strict(ParserError::InvalidAttributes {
                tag: self.data.name.clone(),
                message: "missing action".to_string(),
            });
        };
        let argument = match attributes.get_or_position("argument", 1) {
            Some(argument) => Some(parser.parse_string(argument)?),
            None => self.data.body.as_deref().map(|body| parser.resolve_placeholders(body)).transpose()?,
        };

        let result = parser.invoke_action(action, argument.as_deref())?;
        trace!("<:{}> {} returned {:?}", self.data.name, action, result);
        match attributes.get_or_position("key", 2) {
            Some(key) => {
                parser.data_mut().add_argument(key, result);
            }
            None if !result.is_null() => {
                let name = sequence_name(parser, &self.data.name);
                parser.append(&result.to_string(), &name);
            }
            None => {}
        }
        Ok(())
    }
}

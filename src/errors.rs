use std::fmt;

use thiserror::Error;

use crate::reader::SequenceReader;

/// Lines shown above and below the current line in an error excerpt.
const EXCERPT_RADIUS: usize = 2;

#[derive(Debug, Error)]
pub enum ParserError {
    // --- Structural ---
    #[error("\"{0}\" tag was never closed")]
    UnclosedTag(String),
    #[error("\"{0}\" macro tag was not closed")]
    UnclosedMacro(String),
    #[error("comment was never closed")]
    UnclosedComment,
    #[error("argument \"{0}\" was never closed")]
    UnclosedArgument(String),
    #[error("expected closing tag of \"{expected}\", found \"{found}\"")]
    TagMismatch { expected: String, found: String },
    #[error("closing tag \"{0}\" has no matching parent")]
    ClosingWithoutParent(String),
    #[error("empty tag")]
    EmptyTag,
    #[error("invalid range: {0}")]
    InvalidRange(String),

    // --- Semantic ---
    #[error("unknown tag: \"{0}\"")]
    UnknownTag(String),
    #[error("unknown macro: \"{0}\"")]
    UnknownMacro(String),
    #[error("unknown attribute \"{attribute}\" for widget kind \"{kind}\"")]
    UnknownAttribute { kind: String, attribute: String },
    #[error("unknown action: \"{0}\"")]
    UnknownAction(String),
    #[error("invalid attributes for \"{tag}\": {message}")]
    InvalidAttributes { tag: String, message: String },
    #[error("\"{0}\" mixes named and positional attributes")]
    MixedAttributes(String),
    #[error("expected \"true\" or \"false\", found \"{0}\"")]
    InvalidBoolean(String),
    #[error("invalid number: \"{0}\"")]
    InvalidNumber(String),
    #[error("unable to import \"{path}\": {message}")]
    Import { path: String, message: String },
    #[error("\"{0}\" does not accept plain text")]
    UnexpectedText(String),
    #[error("\"{0}\" cannot have children")]
    NotAParent(String),

    // --- Equation ---
    #[error("invalid equation \"{equation}\": {message}")]
    Equation { equation: String, message: String },
    #[error("operator \"{operator}\" does not support arguments: {types}")]
    UnsupportedOperands { operator: String, types: String },
    #[error("unbalanced parenthesis in equation: \"{0}\"")]
    UnbalancedParenthesis(String),
    #[error("operator \"{0}\" is missing an operand")]
    MissingOperand(String),
    #[error("equation could not be reduced to one value: \"{0}\"")]
    Unreduced(String),

    // --- Host ---
    #[error("action \"{name}\" failed: {message}")]
    Action { name: String, message: String },
    #[error("{0}")]
    Custom(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{source}\n{diagnostics}")]
    Located {
        source: Box<ParserError>,
        diagnostics: Box<Diagnostics>,
    },
}

impl ParserError {
    /// Attaches the reader position to the error. Errors that already carry
    /// diagnostics are returned untouched.
    pub fn locate(self, reader: &SequenceReader) -> ParserError {
        match self {
            located @ ParserError::Located { .. } => located,
            other => ParserError::Located {
                source: Box::new(other),
                diagnostics: Box::new(Diagnostics::capture(reader)),
            },
        }
    }

    /// The underlying error, skipping the diagnostics wrapper.
    pub fn kind(&self) -> &ParserError {
        match self {
            ParserError::Located { source, .. } => source.kind(),
            other => other,
        }
    }

    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            ParserError::Located { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }

    pub fn equation(equation: &str, message: impl Into<String>) -> Self {
        ParserError::Equation {
            equation: equation.to_string(),
            message: message.into(),
        }
    }
}

/// Reader position at the moment a parse failed.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub original_line: Option<usize>,
    pub original_name: Option<String>,
    pub current_line: Option<usize>,
    pub current_name: Option<String>,
    pub parsing_original: bool,
    pub excerpt: String,
}

impl Diagnostics {
    pub fn capture(reader: &SequenceReader) -> Self {
        let excerpt = match (reader.current_text(), reader.current_line()) {
            (Some(text), Some(line)) => excerpt(&text, line),
            _ => String::new(),
        };
        Diagnostics {
            original_line: reader.original_line(),
            original_name: reader.original_name().map(str::to_string),
            current_line: reader.current_line(),
            current_name: reader.current_name().map(str::to_string),
            parsing_original: reader.is_parsing_original(),
            excerpt,
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.original_name, self.original_line) {
            (Some(name), Some(line)) => write!(f, "at line {} of \"{}\"", line, name)?,
            _ => write!(f, "outside of any template")?,
        }
        if !self.parsing_original {
            if let (Some(name), Some(line)) = (&self.current_name, self.current_line) {
                write!(f, ", line {} of \"{}\"", line, name)?;
            }
        }
        if !self.excerpt.is_empty() {
            write!(f, ":\n{}", self.excerpt)?;
        }
        Ok(())
    }
}

/// Cuts a few lines around `line` (1-based) out of `text`, marking the line itself.
fn excerpt(text: &str, line: usize) -> String {
    let first = line.saturating_sub(EXCERPT_RADIUS).max(1);
    let last = line + EXCERPT_RADIUS;
    text.lines()
        .enumerate()
        .map(|(index, content)| (index + 1, content))
        .filter(|(number, _)| *number >= first && *number <= last)
        .map(|(number, content)| {
            let marker = if number == line { ">" } else { " " };
            format!("{}{:>4}| {}", marker, number, content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_marks_current_line() {
        let text = "one\ntwo\nthree\nfour\nfive\nsix";
        let cut = excerpt(text, 4);
        assert!(cut.contains(">   4| four"));
        assert!(cut.contains("    2| two"));
        assert!(!cut.contains("one"));
    }

    #[test]
    fn located_errors_are_not_wrapped_twice() {
        let mut reader = SequenceReader::new();
        reader.append("<a>", "template");
        let error = ParserError::UnclosedTag("a".into()).locate(&reader);
        let again = error.locate(&reader);
        match again {
            ParserError::Located { source, .. } => {
                assert!(matches!(*source, ParserError::UnclosedTag(_)))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

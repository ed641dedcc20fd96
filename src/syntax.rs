use serde::{Deserialize, Serialize};

use crate::errors::ParserError;

/// Text inserted for arguments, array padding and actions that produced no value.
pub const NULL_ARGUMENT: &str = "null";

/// Markers recognised by the parser. Nothing in the scanner hard-codes these
/// characters; templates written for a different syntax only need a
/// different table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Syntax {
    pub tag_opening: char,
    pub tag_closing: char,
    pub closed_tag_marker: char,
    pub comment_opening: char,
    pub comment_closing: char,
    pub macro_marker: char,
    pub argument_opening: char,
    pub argument_closing: char,
    pub equation_marker: char,
    pub condition_marker: char,
    pub ternary_marker: char,
    pub array_separator: char,
    pub range_opening: char,
    pub range_separator: char,
    pub range_closing: char,
    pub id_separator: char,
    pub action_marker: char,
    pub bundle_line_marker: char,
    pub preference_marker: char,
    pub attribute_separator: char,
    /// Suffix of the synthetic tag splitting conditional bodies: `<:if:else/>`.
    pub else_suffix: String,
    /// Suffix of the reserved loop placeholder: `{loop:index}`.
    pub index_suffix: String,
}

impl Default for Syntax {
    fn default() -> Self {
        Syntax {
            tag_opening: '<',
            tag_closing: '>',
            closed_tag_marker: '/',
            comment_opening: '!',
            comment_closing: '-',
            macro_marker: ':',
            argument_opening: '{',
            argument_closing: '}',
            equation_marker: '=',
            condition_marker: '?',
            ternary_marker: ':',
            array_separator: ';',
            range_opening: '[',
            range_separator: ',',
            range_closing: ']',
            id_separator: '.',
            action_marker: '$',
            bundle_line_marker: '@',
            preference_marker: '#',
            attribute_separator: '=',
            else_suffix: "else".to_string(),
            index_suffix: "index".to_string(),
        }
    }
}

impl Syntax {
    pub fn from_json(json: &str) -> Result<Self, ParserError> {
        Ok(serde_json::from_str(json)?)
    }

    /// `<!--`
    pub fn comment_start(&self) -> String {
        format!(
            "{}{}{}{}",
            self.tag_opening, self.comment_opening, self.comment_closing, self.comment_closing
        )
    }

    /// `-->`
    pub fn comment_end(&self) -> String {
        format!("{}{}{}", self.comment_closing, self.comment_closing, self.tag_closing)
    }

    /// `{name}`
    pub fn placeholder(&self, name: &str) -> String {
        format!("{}{}{}", self.argument_opening, name, self.argument_closing)
    }

    /// `{loop:index}` for a macro named `loop`.
    pub fn index_placeholder(&self, macro_name: &str) -> String {
        self.placeholder(&format!("{}{}{}", macro_name, self.macro_marker, self.index_suffix))
    }

    /// `<:if:else/>` for a macro named `if`.
    pub fn else_tag(&self, macro_name: &str) -> String {
        format!(
            "{}{}{}{}{}{}{}",
            self.tag_opening,
            self.macro_marker,
            macro_name,
            self.macro_marker,
            self.else_suffix,
            self.closed_tag_marker,
            self.tag_closing
        )
    }

    pub fn is_quote(character: char) -> bool {
        character == '"' || character == '\''
    }

    /// Replaces every `{name}` for which `lookup` returns a value. Unknown
    /// placeholders and substituted values are left as they are, so a value
    /// containing `{other}` is not expanded a second time.
    pub fn substitute<F>(&self, text: &str, mut lookup: F) -> String
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(self.argument_opening) {
            let (before, candidate) = rest.split_at(start);
            result.push_str(before);
            let inner = &candidate[self.argument_opening.len_utf8()..];
            let replacement = inner
                .find(self.argument_closing)
                .filter(|end| !inner[..*end].contains(self.argument_opening))
                .and_then(|end| lookup(&inner[..end]).map(|value| (end, value)));
            match replacement {
                Some((end, value)) => {
                    result.push_str(&value);
                    rest = &inner[end + self.argument_closing.len_utf8()..];
                }
                None => {
                    result.push(self.argument_opening);
                    rest = inner;
                }
            }
        }
        result.push_str(rest);
        result
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ParserSettings {
    /// Structural and semantic anomalies raise errors instead of being ignored.
    pub strict: bool,
    /// `<!-- <!-- --> -->` is one comment instead of a comment followed by text.
    pub nested_comments: bool,
    pub syntax: Syntax,
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            strict: true,
            nested_comments: true,
            syntax: Syntax::default(),
        }
    }
}

impl ParserSettings {
    pub fn from_json(json: &str) -> Result<Self, ParserError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings = ParserSettings::from_json(r#"{ "strict": false, "syntax": { "macro_marker": "%" } }"#).unwrap();
        assert!(!settings.strict);
        assert!(settings.nested_comments);
        assert_eq!(settings.syntax.macro_marker, '%');
        assert_eq!(settings.syntax.tag_opening, '<');
        assert_eq!(settings.syntax.else_tag("if"), "<%if%else/>");
    }

    #[test]
    fn derived_markers() {
        let syntax = Syntax::default();
        assert_eq!(syntax.comment_start(), "<!--");
        assert_eq!(syntax.comment_end(), "-->");
        assert_eq!(syntax.index_placeholder("loop"), "{loop:index}");
    }

    #[test]
    fn substitution_is_single_pass() {
        let syntax = Syntax::default();
        let text = syntax.substitute("{a} and {b} but not {c} or {{a}}", |name| match name {
            "a" => Some("{b}".to_string()),
            "b" => Some("B".to_string()),
            _ => None,
        });
        assert_eq!(text, "{b} and B but not {c} or {{b}}");
    }
}

use log::trace;

use crate::errors::ParserError;
use crate::syntax::Syntax;
use crate::{Tag, Widget};

/// Attributes of one tag. A tag uses either positional or named
/// attributes; mixing both is rejected while parsing.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Attributes {
    #[default]
    None,
    Positional(Vec<String>),
    Named(Vec<(String, String)>),
}

impl Attributes {
    pub fn is_empty(&self) -> bool {
        match self {
            Attributes::None => true,
            Attributes::Positional(values) => values.is_empty(),
            Attributes::Named(pairs) => pairs.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Attributes::None => 0,
            Attributes::Positional(values) => values.len(),
            Attributes::Named(pairs) => pairs.len(),
        }
    }

    /// Named attribute lookup, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        match self {
            Attributes::Named(pairs) => pairs
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn positional(&self) -> &[String] {
        match self {
            Attributes::Positional(values) => values,
            _ => &[],
        }
    }

    pub fn named(&self) -> &[(String, String)] {
        match self {
            Attributes::Named(pairs) => pairs,
            _ => &[],
        }
    }

    /// Named attribute, or the positional attribute at `index`.
    pub fn get_or_position(&self, name: &str, index: usize) -> Option<&str> {
        match self {
            Attributes::Named(_) => self.get(name),
            Attributes::Positional(values) => values.get(index).map(String::as_str),
            Attributes::None => None,
        }
    }

    /// Parses `key=value key2="quoted value"` or `value "quoted value"`.
    pub fn parse(tag_name: &str, text: &str, syntax: &Syntax) -> Result<Attributes, ParserError> {
        let mut positional = Vec::new();
        let mut named = Vec::new();
        let mut chars = text.chars().peekable();

        loop {
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            if chars.peek().is_none() {
                break;
            }

            let mut buffer = String::new();
            let mut key: Option<String> = None;
            let mut quote: Option<char> = None;
            while let Some(&character) = chars.peek() {
                if let Some(open) = quote {
                    chars.next();
                    if character == open {
                        quote = None;
                    } else {
                        buffer.push(character);
                    }
                    continue;
                }
                if character.is_whitespace() {
                    break;
                }
                chars.next();
                if Syntax::is_quote(character) {
                    quote = Some(character);
                } else if character == syntax.attribute_separator && key.is_none() && is_key(&buffer) {
                    key = Some(std::mem::take(&mut buffer));
                } else {
                    buffer.push(character);
                }
            }
            if quote.is_some() {
                return Err(ParserError::InvalidAttributes {
                    tag: tag_name.to_string(),
                    message: format!("unclosed quote in \"{}\"", text),
                });
            }

            match key {
                Some(key) => named.push((key, buffer)),
                None => positional.push(buffer),
            }
        }

        match (positional.is_empty(), named.is_empty()) {
            (true, true) => Ok(Attributes::None),
            (false, true) => Ok(Attributes::Positional(positional)),
            (true, false) => Ok(Attributes::Named(named)),
            (false, false) => Err(ParserError::MixedAttributes(tag_name.to_string())),
        }
    }
}

fn is_key(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))
        }
        _ => false,
    }
}

/// State shared by every tag and macro implementation.
#[derive(Debug, Default)]
pub struct TagData {
    /// Tag name without the macro marker.
    pub name: String,
    /// Raw text between the tag markers, with arguments already resolved.
    pub raw: String,
    pub attributes: Attributes,
    /// Self-closed in the template (`<name/>`).
    pub closed: bool,
    /// Whether the tag accepts children (or, for macros, a body).
    pub parental: bool,
    /// Verbatim body captured for macros.
    pub body: Option<String>,
    pub children: Vec<Box<dyn Tag>>,
    pub widget: Option<Box<dyn Widget>>,
}

impl TagData {
    pub fn parse(raw: &str, syntax: &Syntax) -> Result<TagData, ParserError> {
        let mut text = raw.trim();
        if let Some(stripped) = text.strip_prefix(syntax.macro_marker) {
            text = stripped;
        }
        let closed = text.ends_with(syntax.closed_tag_marker);
        if closed {
            text = text[..text.len() - syntax.closed_tag_marker.len_utf8()].trim_end();
        }

        let (name, rest) = match text.find(char::is_whitespace) {
            Some(split) => (&text[..split], &text[split..]),
            None => (text, ""),
        };
        if name.is_empty() {
            return Err(ParserError::EmptyTag);
        }
        trace!("Parsing attributes of '{}': {:?}", name, rest);

        Ok(TagData {
            name: name.to_string(),
            raw: raw.to_string(),
            attributes: Attributes::parse(name, rest, syntax)?,
            closed,
            parental: !closed,
            ..Default::default()
        })
    }

    pub fn with_parental(mut self, parental: bool) -> Self {
        self.parental = parental && !self.closed;
        self
    }

    pub fn with_widget(mut self, widget: Box<dyn Widget>) -> Self {
        self.widget = Some(widget);
        self
    }

    /// The body captured for a macro, or an empty string.
    pub fn body(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_attributes_with_quotes() {
        let data = TagData::parse(r#"label id=title text="Hello world" empty=''"#, &Syntax::default()).unwrap();
        assert_eq!(data.name, "label");
        assert!(!data.closed);
        assert_eq!(data.attributes.get("TEXT"), Some("Hello world"));
        assert_eq!(data.attributes.get("id"), Some("title"));
        assert_eq!(data.attributes.get("empty"), Some(""));
    }

    #[test]
    fn positional_macro_attributes() {
        let data = TagData::parse(":if 5 == 3 /", &Syntax::default()).unwrap();
        assert_eq!(data.name, "if");
        assert!(data.closed);
        assert!(!data.parental);
        assert_eq!(data.attributes.positional(), &["5", "==", "3"]);
    }

    #[test]
    fn mixing_attributes_is_rejected() {
        let error = TagData::parse("label id=a b", &Syntax::default()).unwrap_err();
        assert!(matches!(error, ParserError::MixedAttributes(name) if name == "label"));
    }

    #[test]
    fn quoted_separator_stays_in_value() {
        let attributes = Attributes::parse("if", r#"test="a=b" other=x=y"#, &Syntax::default()).unwrap();
        assert_eq!(attributes.get("test"), Some("a=b"));
        assert_eq!(attributes.get("other"), Some("x=y"));
    }
}

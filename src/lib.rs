use std::any::Any;
use std::fmt::Debug;

pub mod core;
pub mod data;
pub mod equation;
pub mod errors;
pub mod listener;
pub mod parser;
pub mod reader;
pub mod registry;
pub mod syntax;
pub mod tag;
pub mod types;
mod tests;

pub use data::{ImportKind, TemplateData, TemplateSource};
pub use errors::{Diagnostics, ParserError};
pub use listener::{ListenerEvent, ListenerHook, ParserListener, Scene};
pub use parser::{ParsedTemplate, Parser, ParserBuilder};
pub use registry::{Provider, TemplateDefinition, TemplateRegistry};
pub use syntax::{ParserSettings, Syntax};
pub use tag::{Attributes, TagData};
pub use types::TemplateValue;

/// Opaque handle built by a tag provider. The parser only ever needs its
/// identity, whether it can hold children and a way to hang listeners on it
/// and take them off again.
pub trait Widget: Debug {
    /// Kind used to look up attribute processors, e.g. `button`.
    fn kind(&self) -> &str;
    fn element_id(&self) -> Option<&str>;
    fn set_element_id(&mut self, id: &str);
    fn is_container(&self) -> bool {
        false
    }
    /// Returns false if the widget does not display text.
    fn set_text(&mut self, _text: &str) -> bool {
        false
    }
    /// Fallback for attributes without a registered processor. Returns false
    /// if the widget does not know the attribute.
    fn set_attribute(&mut self, _name: &str, _value: &str) -> bool {
        false
    }
    /// Returns false if the widget does not accept listeners.
    fn add_listener(&mut self, _hook: ListenerHook) -> bool {
        false
    }
    /// Detaches every listener hooked to `event`. Returns how many were removed.
    fn remove_listeners(&mut self, _event: ListenerEvent) -> usize {
        0
    }
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A parsed regular tag.
pub trait Tag: Debug {
    fn data(&self) -> &TagData;
    fn data_mut(&mut self) -> &mut TagData;

    fn tag_name(&self) -> &str {
        &self.data().name
    }

    /// Whether the tag stays open and collects children until its closing tag.
    fn is_parent(&self) -> bool {
        self.data().parental
    }

    fn widget(&self) -> Option<&dyn Widget> {
        self.data().widget.as_deref()
    }

    fn widget_mut(&mut self) -> Option<&mut (dyn Widget + 'static)> {
        self.data_mut().widget.as_deref_mut()
    }

    fn children(&self) -> &[Box<dyn Tag>] {
        &self.data().children
    }

    /// Plain text found between this tag's opening and closing tags.
    fn handle_data_between_tags(&mut self, parser: &mut Parser, text: &str) -> Result<(), ParserError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        parser.error_if_strict(ParserError::UnexpectedText(format!(
            "\"{}\" inside <{}>",
            text.trim(),
            self.tag_name()
        )))
    }

    fn handle_child(&mut self, _parser: &mut Parser, child: Box<dyn Tag>) -> Result<(), ParserError> {
        self.data_mut().children.push(child);
        Ok(())
    }

    /// Called once all children were attached, or right away for self-closed tags.
    fn close_tag(&mut self, _parser: &mut Parser) -> Result<(), ParserError> {
        Ok(())
    }
}

/// A macro invocation: consumes its attributes and captured body, usually
/// by appending new template text to the parser.
pub trait MacroTag: Debug {
    fn data(&self) -> &TagData;
    fn data_mut(&mut self) -> &mut TagData;

    fn is_parent(&self) -> bool {
        self.data().parental
    }

    fn handle_body(&mut self, body: String) {
        self.data_mut().body = Some(body);
    }

    fn close_tag(&mut self, parser: &mut Parser) -> Result<(), ParserError>;
}

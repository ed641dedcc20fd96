use std::any::Any;

use log::trace;

use crate::{
    errors::ParserError,
    listener::{ListenerEvent, ListenerHook, Scene},
    registry::TagProvider,
    tag::TagData,
    Parser, Tag, Widget,
};

/// Library-independent widget: remembers everything the template told it.
#[derive(Debug, Clone, Default)]
pub struct Element {
    kind: String,
    id: Option<String>,
    text: Option<String>,
    attributes: Vec<(String, String)>,
    listeners: Vec<ListenerHook>,
    container: bool,
}

impl Element {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            container: true,
            ..Default::default()
        }
    }

    pub fn with_container(mut self, container: bool) -> Self {
        self.container = container;
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Attribute stored without a dedicated processor. Ignores case.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn listeners(&self) -> &[ListenerHook] {
        &self.listeners
    }

    /// Fires every listener registered for `event`. Returns how many of
    /// them passed their condition.
    pub fn fire(&mut self, event: ListenerEvent, parser: &mut Parser, scene: &mut dyn Scene) -> Result<usize, ParserError> {
        let mut fired = 0;
        for hook in self.listeners.iter_mut().filter(|hook| hook.event == event) {
            if hook.fire(parser, scene)? {
                fired += 1;
            }
        }
        Ok(fired)
    }
}

impl Widget for Element {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn element_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_element_id(&mut self, id: &str) {
        self.id = Some(id.to_string());
    }

    fn is_container(&self) -> bool {
        self.container
    }

    fn set_text(&mut self, text: &str) -> bool {
        self.text = Some(text.to_string());
        true
    }

    fn set_attribute(&mut self, name: &str, value: &str) -> bool {
        if name.eq_ignore_ascii_case("text") {
            return self.set_text(value);
        }
        match self.attributes.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
        true
    }

    fn add_listener(&mut self, hook: ListenerHook) -> bool {
        self.listeners.push(hook);
        true
    }

    fn remove_listeners(&mut self, event: ListenerEvent) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|hook| hook.event != event);
        before - self.listeners.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Tag wrapping an [`Element`]. Without a widget it only keeps the tree
/// together, which is how unknown tags are kept in lenient mode.
#[derive(Debug)]
pub struct ElementTag {
    data: TagData,
}

impl ElementTag {
    pub fn new(data: TagData) -> Self {
        Self { data }
    }

    pub fn element(&self) -> Option<&Element> {
        self.data.widget.as_ref()?.as_any().downcast_ref()
    }

    pub fn element_mut(&mut self) -> Option<&mut Element> {
        self.data.widget.as_mut()?.as_any_mut().downcast_mut()
    }
}

impl Tag for ElementTag {
    fn data(&self) -> &TagData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    fn handle_data_between_tags(&mut self, parser: &mut Parser, text: &str) -> Result<(), ParserError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let accepted = self.data.widget.as_mut().is_some_and(|widget| widget.set_text(text));
        if accepted {
            trace!("<{}> text set to {:?}", self.data.name, text);
            Ok(())
        } else {
            parser.error_if_strict(ParserError::UnexpectedText(format!("\"{}\" inside <{}>", text, self.data.name)))
        }
    }

    fn handle_child(&mut self, parser: &mut Parser, child: Box<dyn Tag>) -> Result<(), ParserError> {
        if self.data.widget.as_ref().is_some_and(|widget| !widget.is_container()) {
            parser.error_if_strict(ParserError::NotAParent(self.data.name.clone()))?;
        }
        self.data.children.push(child);
        Ok(())
    }
}

/// Builds [`ElementTag`]s. The widget kind is the tag name unless fixed.
#[derive(Debug, Clone)]
pub struct ElementProvider {
    kind: Option<String>,
    container: bool,
}

impl Default for ElementProvider {
    fn default() -> Self {
        Self {
            kind: None,
            container: true,
        }
    }
}

impl ElementProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    /// Widgets that reject children.
    pub fn leaf(mut self) -> Self {
        self.container = false;
        self
    }
}

impl TagProvider for ElementProvider {
    fn create(&self, _parser: &mut Parser, data: TagData) -> Result<Box<dyn Tag>, ParserError> {
        let kind = self.kind.clone().unwrap_or_else(|| data.name.clone());
        let widget = Element::new(&kind).with_container(self.container);
        Ok(Box::new(ElementTag::new(data.with_widget(Box::new(widget)))))
    }
}

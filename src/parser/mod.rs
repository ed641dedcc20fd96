//! Template parser: a single-pass scanner over a [`SequenceReader`].
//!
//! Macros never run in a separate interpreter. Whatever text they produce
//! is appended to the reader and scanned like the original template, so
//! imports, loops and conditionals all nest through the same state machine.

mod macros;
mod resolve;
mod scan;

use std::fmt;
use std::mem;
use std::sync::Arc;

use log::{debug, error, warn};

use crate::{
    data::TemplateData,
    equation::OperatorTable,
    errors::ParserError,
    listener::ParserListener,
    reader::SequenceReader,
    registry::TemplateRegistry,
    syntax::{ParserSettings, Syntax},
    Tag,
};

pub(crate) use macros::split_else;

const DEFAULT_TEMPLATE_NAME: &str = "template";

/// Result of one top-level parse.
#[derive(Debug, Default)]
pub struct ParsedTemplate {
    /// Root tags, in template order.
    pub nodes: Vec<Box<dyn Tag>>,
    /// Text found outside of any tag.
    pub text: String,
}

impl ParsedTemplate {
    pub fn find_by_id(&self, id: &str) -> Option<&dyn Tag> {
        find_by_id(&self.nodes, id)
    }

    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut (dyn Tag + 'static)> {
        find_by_id_mut(&mut self.nodes, id)
    }
}

/// Depth-first search for the tag whose widget carries `id`.
pub fn find_by_id<'a>(nodes: &'a [Box<dyn Tag>], id: &str) -> Option<&'a dyn Tag> {
    for node in nodes {
        if node.widget().and_then(|widget| widget.element_id()) == Some(id) {
            return Some(node.as_ref());
        }
        if let Some(found) = find_by_id(node.children(), id) {
            return Some(found);
        }
    }
    None
}

pub fn find_by_id_mut<'a>(nodes: &'a mut [Box<dyn Tag>], id: &str) -> Option<&'a mut (dyn Tag + 'static)> {
    for node in nodes.iter_mut() {
        if node.widget().and_then(|widget| widget.element_id()) == Some(id) {
            return Some(node.as_mut());
        }
        if let Some(found) = find_by_id_mut(&mut node.data_mut().children, id) {
            return Some(found);
        }
    }
    None
}

pub struct Parser {
    settings: ParserSettings,
    registry: Arc<TemplateRegistry>,
    data: TemplateData,
    operators: Arc<OperatorTable>,
    reader: SequenceReader,
    /// Open tags, innermost last. A parent is popped while its own hooks run.
    parents: Vec<Box<dyn Tag>>,
    roots: Vec<Box<dyn Tag>>,
    text: String,
    pre_listeners: Vec<Box<dyn ParserListener>>,
    post_listeners: Vec<Box<dyn ParserListener>>,
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("settings", &self.settings)
            .field("parents", &self.parents.len())
            .field("roots", &self.roots.len())
            .finish_non_exhaustive()
    }
}

impl Default for Parser {
    fn default() -> Self {
        ParserBuilder::new().build()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ParserBuilder {
        ParserBuilder::new()
    }

    // --- Accessors ---

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    pub fn syntax(&self) -> &Syntax {
        &self.settings.syntax
    }

    pub fn is_strict(&self) -> bool {
        self.settings.strict
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    pub fn data(&self) -> &TemplateData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut TemplateData {
        &mut self.data
    }

    pub fn operators(&self) -> &Arc<OperatorTable> {
        &self.operators
    }

    pub fn current_parent(&self) -> Option<&dyn Tag> {
        self.parents.last().map(|parent| parent.as_ref())
    }

    pub fn current_parent_mut(&mut self) -> Option<&mut (dyn Tag + 'static)> {
        self.parents.last_mut().map(|parent| parent.as_mut())
    }

    /// Queues text to be scanned before the rest of the current sequence.
    pub fn append(&mut self, text: &str, name: &str) {
        self.reader.append(text, name);
    }

    pub fn add_pre_listener(&mut self, listener: Box<dyn ParserListener>) {
        self.pre_listeners.push(listener);
    }

    pub fn add_post_listener(&mut self, listener: Box<dyn ParserListener>) {
        self.post_listeners.push(listener);
    }

    /// Returns `error` in strict mode. In lenient mode the error is logged
    /// and the caller carries on as if nothing happened.
    pub fn error_if_strict(&self, error: ParserError) -> Result<(), ParserError> {
        if self.settings.strict {
            Err(error)
        } else {
            warn!("Ignoring error in lenient mode: {}", error);
            Ok(())
        }
    }

    // --- Parsing ---

    pub fn parse_template(&mut self, template: &str) -> Result<ParsedTemplate, ParserError> {
        self.parse_named(template, DEFAULT_TEMPLATE_NAME)
    }

    /// Parses a whole template. `name` shows up in error diagnostics.
    pub fn parse_named(&mut self, template: &str, name: &str) -> Result<ParsedTemplate, ParserError> {
        debug!("Parsing template '{}'", name);
        let result = self.run(template, name);
        self.reset();
        result.map_err(|e| {
            error!("Failed to parse template '{}': {}", name, e);
            e
        })
    }

    /// Parses `template` without touching the parse in progress (if any)
    /// and without notifying parser listeners.
    pub fn parse_fragment(&mut self, template: &str, name: &str) -> Result<ParsedTemplate, ParserError> {
        debug!("Parsing fragment '{}'", name);
        let reader = mem::take(&mut self.reader);
        let parents = mem::take(&mut self.parents);
        let roots = mem::take(&mut self.roots);
        let text = mem::take(&mut self.text);

        self.reader.append(template, name);
        let result = self
            .read_all()
            .map_err(|e| e.locate(&self.reader))
            .map(|()| ParsedTemplate {
                nodes: mem::take(&mut self.roots),
                text: mem::take(&mut self.text),
            });

        self.reader = reader;
        self.parents = parents;
        self.roots = roots;
        self.text = text;
        result
    }

    fn run(&mut self, template: &str, name: &str) -> Result<ParsedTemplate, ParserError> {
        self.notify(false, &mut [])?;
        self.reader.append(template, name);
        self.read_all().map_err(|e| e.locate(&self.reader))?;
        let mut parsed = ParsedTemplate {
            nodes: mem::take(&mut self.roots),
            text: mem::take(&mut self.text),
        };
        self.notify(true, &mut parsed.nodes)?;
        Ok(parsed)
    }

    /// Drops everything left over from the last parse, successful or not.
    fn reset(&mut self) {
        self.reader.clear();
        self.parents.clear();
        self.roots.clear();
        self.text.clear();
    }

    fn notify(&mut self, after: bool, nodes: &mut [Box<dyn Tag>]) -> Result<(), ParserError> {
        let listeners = if after {
            mem::take(&mut self.post_listeners)
        } else {
            mem::take(&mut self.pre_listeners)
        };
        let mut kept = Vec::with_capacity(listeners.len());
        let mut result = Ok(());
        for mut listener in listeners {
            if result.is_err() {
                kept.push(listener);
                continue;
            }
            match listener.handle(self, nodes) {
                Ok(true) => kept.push(listener),
                Ok(false) => debug!("Removing parser listener {:?}", listener),
                Err(e) => {
                    kept.push(listener);
                    result = Err(e);
                }
            }
        }
        // Listeners may have registered new listeners while being notified
        let slot = if after {
            &mut self.post_listeners
        } else {
            &mut self.pre_listeners
        };
        kept.append(slot);
        *slot = kept;
        result
    }
}

/// Chained configuration for a [`Parser`].
#[derive(Default)]
pub struct ParserBuilder {
    settings: ParserSettings,
    registry: Option<Arc<TemplateRegistry>>,
    data: Option<TemplateData>,
    operators: Option<Arc<OperatorTable>>,
    pre_listeners: Vec<Box<dyn ParserListener>>,
    post_listeners: Vec<Box<dyn ParserListener>>,
}

impl ParserBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(&mut self, settings: ParserSettings) -> &mut Self {
        self.settings = settings;
        self
    }

    pub fn strict(&mut self, strict: bool) -> &mut Self {
        self.settings.strict = strict;
        self
    }

    pub fn nested_comments(&mut self, nested_comments: bool) -> &mut Self {
        self.settings.nested_comments = nested_comments;
        self
    }

    pub fn syntax(&mut self, syntax: Syntax) -> &mut Self {
        self.settings.syntax = syntax;
        self
    }

    pub fn registry(&mut self, registry: Arc<TemplateRegistry>) -> &mut Self {
        self.registry = Some(registry);
        self
    }

    pub fn data(&mut self, data: TemplateData) -> &mut Self {
        self.data = Some(data);
        self
    }

    pub fn operators(&mut self, operators: OperatorTable) -> &mut Self {
        self.operators = Some(Arc::new(operators));
        self
    }

    pub fn pre_listener(&mut self, listener: Box<dyn ParserListener>) -> &mut Self {
        self.pre_listeners.push(listener);
        self
    }

    pub fn post_listener(&mut self, listener: Box<dyn ParserListener>) -> &mut Self {
        self.post_listeners.push(listener);
        self
    }

    pub fn build(&mut self) -> Parser {
        Parser {
            settings: self.settings.clone(),
            registry: self.registry.take().unwrap_or_default(),
            data: self.data.take().unwrap_or_default(),
            operators: self.operators.take().unwrap_or_default(),
            reader: SequenceReader::new(),
            parents: Vec::new(),
            roots: Vec::new(),
            text: String::new(),
            pre_listeners: mem::take(&mut self.pre_listeners),
            post_listeners: mem::take(&mut self.post_listeners),
        }
    }
}

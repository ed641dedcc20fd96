use std::fmt::Debug;
use std::rc::Rc;

use log::{debug, trace, warn};

use crate::{errors::ParserError, parser::find_by_id_mut, ParsedTemplate, Parser, Tag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerEvent {
    Change,
    Click,
    Input,
}

/// Notified before a template is read and after its root nodes are final.
/// Returning `false` removes the listener from the parser.
pub trait ParserListener: Debug {
    fn handle(&mut self, parser: &mut Parser, nodes: &mut [Box<dyn Tag>]) -> Result<bool, ParserError>;
}

/// Receives the nodes produced by a fired listener.
pub trait Scene {
    fn merge(&mut self, template: Rc<ParsedTemplate>);
}

/// Scene that only keeps what it was given.
#[derive(Debug, Default)]
pub struct SceneBuffer {
    pub merged: Vec<Rc<ParsedTemplate>>,
}

impl Scene for SceneBuffer {
    fn merge(&mut self, template: Rc<ParsedTemplate>) {
        self.merged.push(template);
    }
}

/// Template text attached to a widget event by `:onChange`, `:onClick` or
/// `:onInput`.
#[derive(Debug, Clone)]
pub struct ListenerHook {
    pub event: ListenerEvent,
    /// Equation checked every time the event fires.
    pub condition: Option<String>,
    pub template: String,
    /// Parse the template once and replay that result afterwards.
    pub cache: bool,
    cached: Option<Rc<ParsedTemplate>>,
}

impl ListenerHook {
    pub fn new(event: ListenerEvent, template: &str) -> Self {
        Self {
            event,
            condition: None,
            template: template.to_string(),
            cache: false,
            cached: None,
        }
    }

    pub fn with_condition(mut self, condition: Option<String>) -> Self {
        self.condition = condition.filter(|condition| !condition.trim().is_empty());
        self
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Parses the hook's template (or replays the cached result) and hands
    /// it to `scene`. Returns false if the condition rejected the event.
    pub fn fire(&mut self, parser: &mut Parser, scene: &mut dyn Scene) -> Result<bool, ParserError> {
        if let Some(condition) = &self.condition {
            if !parser.is_true(condition)? {
                trace!("{:?} listener skipped, condition {:?} is false", self.event, condition);
                return Ok(false);
            }
        }
        let parsed = match &self.cached {
            Some(cached) => {
                trace!("Replaying cached {:?} listener", self.event);
                Rc::clone(cached)
            }
            None => {
                let parsed = Rc::new(parser.parse_fragment(&self.template, &format!("{:?} listener", self.event))?);
                if self.cache {
                    self.cached = Some(Rc::clone(&parsed));
                }
                parsed
            }
        };
        scene.merge(parsed);
        Ok(true)
    }
}

/// Attaches a hook to widgets by element id once the template is parsed.
/// Used when the listener macro appears before (or outside of) its target.
#[derive(Debug)]
pub struct IdListenerAttacher {
    ids: Vec<String>,
    hook: ListenerHook,
    /// Stay registered for later parses instead of removing itself.
    keep: bool,
}

impl IdListenerAttacher {
    pub fn new(ids: Vec<String>, hook: ListenerHook, keep: bool) -> Self {
        Self { ids, hook, keep }
    }
}

impl ParserListener for IdListenerAttacher {
    fn handle(&mut self, _parser: &mut Parser, nodes: &mut [Box<dyn Tag>]) -> Result<bool, ParserError> {
        for id in &self.ids {
            let attached = find_by_id_mut(nodes, id)
                .and_then(|tag| tag.widget_mut())
                .map(|widget| widget.add_listener(self.hook.clone()))
                .unwrap_or(false);
            if attached {
                debug!("Attached {:?} listener to '{}'", self.hook.event, id);
            } else {
                warn!("No widget with id '{}' accepted a {:?} listener", id, self.hook.event);
            }
        }
        Ok(self.keep)
    }
}

use std::{
    collections::{HashMap, HashSet},
    fmt::{self, Debug},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::{debug, error, trace};

use crate::{
    core::{attributes::default_attributes, macros::default_macros, tags::default_tags},
    errors::ParserError,
    syntax::{Syntax, NULL_ARGUMENT},
    tag::{Attributes, TagData},
    types::TemplateValue,
    MacroTag, Parser, Tag,
};

/// Attribute processors registered for this kind apply to every widget.
pub const UNIVERSAL_KIND: &str = "*";

// --- Provider Traits ---

/// Builds a tag (and usually its widget) for an opening tag. The tag that
/// will become its parent is available through [`Parser::current_parent`].
pub trait TagProvider: Send + Sync {
    fn create(&self, parser: &mut Parser, data: TagData) -> Result<Box<dyn Tag>, ParserError>;
}

pub trait MacroProvider: Send + Sync {
    fn create(&self, parser: &mut Parser, data: TagData) -> Result<Box<dyn MacroTag>, ParserError>;
}

/// Applies one attribute value to a freshly created tag.
pub trait AttributeProcessor: Send + Sync {
    fn process(&self, parser: &mut Parser, tag: &mut dyn Tag, value: &str) -> Result<(), ParserError>;
}

/// Host callback invoked with `$name` or `$name(argument)`.
pub trait Action: Send + Sync {
    fn consume(&self, argument: Option<&str>) -> Result<TemplateValue, ParserError>;
}

impl<F> TagProvider for F
where
    F: Fn(&mut Parser, TagData) -> Result<Box<dyn Tag>, ParserError> + Send + Sync,
{
    fn create(&self, parser: &mut Parser, data: TagData) -> Result<Box<dyn Tag>, ParserError> {
        self(parser, data)
    }
}

impl<F> MacroProvider for F
where
    F: Fn(&mut Parser, TagData) -> Result<Box<dyn MacroTag>, ParserError> + Send + Sync,
{
    fn create(&self, parser: &mut Parser, data: TagData) -> Result<Box<dyn MacroTag>, ParserError> {
        self(parser, data)
    }
}

impl<F> AttributeProcessor for F
where
    F: Fn(&mut Parser, &mut dyn Tag, &str) -> Result<(), ParserError> + Send + Sync,
{
    fn process(&self, parser: &mut Parser, tag: &mut dyn Tag, value: &str) -> Result<(), ParserError> {
        self(parser, tag, value)
    }
}

impl<F> Action for F
where
    F: Fn(Option<&str>) -> Result<TemplateValue, ParserError> + Send + Sync,
{
    fn consume(&self, argument: Option<&str>) -> Result<TemplateValue, ParserError> {
        self(argument)
    }
}

// --- Providers ---

/// A registered provider: either native code or template text registered
/// at runtime by `:macro`, `:newTag` or `:newAttribute`.
pub enum Provider<T: ?Sized> {
    Native(Arc<T>),
    Template(Arc<TemplateDefinition>),
}

impl<T: ?Sized> Provider<T> {
    pub fn template(definition: TemplateDefinition) -> Self {
        Provider::Template(Arc::new(definition))
    }
}

impl<T: ?Sized> Clone for Provider<T> {
    fn clone(&self) -> Self {
        match self {
            Provider::Native(native) => Provider::Native(Arc::clone(native)),
            Provider::Template(definition) => Provider::Template(Arc::clone(definition)),
        }
    }
}

impl<T: ?Sized> Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Native(_) => write!(f, "Native"),
            Provider::Template(definition) => f.debug_tuple("Template").field(definition).finish(),
        }
    }
}

/// Template text with named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDefinition {
    pub name: String,
    pub parameters: Vec<String>,
    pub template: String,
}

impl TemplateDefinition {
    pub fn new(name: &str, parameters: Vec<String>, template: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters,
            template: template.to_string(),
        }
    }

    /// Substitutes `{parameter}` placeholders with the invocation's
    /// attributes (named or by position). The last parameter takes the
    /// invocation body when it is not given explicitly; anything else
    /// missing becomes `null`.
    pub fn expand(&self, attributes: &Attributes, body: Option<&str>, syntax: &Syntax) -> String {
        let last = self.parameters.len().saturating_sub(1);
        let values: Vec<String> = self
            .parameters
            .iter()
            .enumerate()
            .map(|(index, parameter)| match attributes.get_or_position(parameter, index) {
                Some(value) => value.to_string(),
                None if index == last => body.unwrap_or(NULL_ARGUMENT).to_string(),
                None => NULL_ARGUMENT.to_string(),
            })
            .collect();
        trace!("Expanding template '{}' with {:?}", self.name, values);
        syntax.substitute(&self.template, |placeholder| {
            self.parameters
                .iter()
                .position(|parameter| parameter.eq_ignore_ascii_case(placeholder))
                .map(|index| values[index].clone())
        })
    }

    /// Substitutes the attribute's own placeholder (`{name}`) with its value.
    pub fn expand_attribute(&self, value: &str, syntax: &Syntax) -> String {
        syntax.substitute(&self.template, |placeholder| {
            placeholder.eq_ignore_ascii_case(&self.name).then(|| value.to_string())
        })
    }
}

// --- Actions ---

/// Named group of actions, addressed as `$container.action`.
#[derive(Clone, Default)]
pub struct ActionContainer {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, name: &str, action: F) -> Self
    where
        F: Fn(Option<&str>) -> Result<TemplateValue, ParserError> + Send + Sync + 'static,
    {
        self.register(name, action);
        self
    }

    pub fn register<F>(&mut self, name: &str, action: F) -> &mut Self
    where
        F: Fn(Option<&str>) -> Result<TemplateValue, ParserError> + Send + Sync + 'static,
    {
        self.actions.insert(name.to_string(), Arc::new(action));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }
}

impl Debug for ActionContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.actions.keys()).finish()
    }
}

type ProviderMap<T> = HashMap<String, Provider<T>>;

// --- Registry ---

/// Everything a parser looks names up in. Shared between parsers behind an
/// `Arc`; template meta macros register new providers mid-parse, hence the
/// interior locks.
pub struct TemplateRegistry {
    tags: RwLock<ProviderMap<dyn TagProvider>>,
    macros: RwLock<ProviderMap<dyn MacroProvider>>,
    /// kind -> attribute -> processor
    attributes: RwLock<HashMap<String, ProviderMap<dyn AttributeProcessor>>>,
    /// kind -> more general kinds, most specific first
    lineage: RwLock<HashMap<String, Vec<String>>>,
    actions: RwLock<HashMap<String, Arc<dyn Action>>>,
    containers: RwLock<Vec<(String, ActionContainer)>>,
}

impl Debug for TemplateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRegistry").finish_non_exhaustive()
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TemplateRegistry {
    /// A registry with no providers at all.
    pub fn empty() -> Self {
        Self {
            tags: RwLock::new(HashMap::new()),
            macros: RwLock::new(HashMap::new()),
            attributes: RwLock::new(HashMap::new()),
            lineage: RwLock::new(HashMap::new()),
            actions: RwLock::new(HashMap::new()),
            containers: RwLock::new(Vec::new()),
        }
    }

    /// The built-in `element` tag, `id` attribute and every core macro.
    pub fn with_defaults() -> Self {
        Self {
            tags: RwLock::new(default_tags()),
            macros: RwLock::new(default_macros()),
            attributes: RwLock::new(default_attributes()),
            ..Self::empty()
        }
    }

    // --- Tags ---

    pub fn register_tag(&self, name: &str, provider: impl TagProvider + 'static) -> Result<(), ParserError> {
        self.insert_tag(name, Provider::Native(Arc::new(provider)))
    }

    pub fn register_tag_template(&self, definition: TemplateDefinition) -> Result<(), ParserError> {
        let name = definition.name.clone();
        self.insert_tag(&name, Provider::template(definition))
    }

    fn insert_tag(&self, name: &str, provider: Provider<dyn TagProvider>) -> Result<(), ParserError> {
        debug!("Registering tag provider '{}': {:?}", name, provider);
        write(&self.tags, "tags")?.insert(name.to_lowercase(), provider);
        Ok(())
    }

    pub fn tag(&self, name: &str) -> Result<Option<Provider<dyn TagProvider>>, ParserError> {
        Ok(read(&self.tags, "tags")?.get(&name.to_lowercase()).cloned())
    }

    // --- Macros ---

    pub fn register_macro(&self, name: &str, provider: impl MacroProvider + 'static) -> Result<(), ParserError> {
        self.insert_macro(name, Provider::Native(Arc::new(provider)))
    }

    pub fn register_macro_template(&self, definition: TemplateDefinition) -> Result<(), ParserError> {
        let name = definition.name.clone();
        self.insert_macro(&name, Provider::template(definition))
    }

    fn insert_macro(&self, name: &str, provider: Provider<dyn MacroProvider>) -> Result<(), ParserError> {
        debug!("Registering macro provider '{}': {:?}", name, provider);
        write(&self.macros, "macros")?.insert(name.to_lowercase(), provider);
        Ok(())
    }

    pub fn macro_provider(&self, name: &str) -> Result<Option<Provider<dyn MacroProvider>>, ParserError> {
        Ok(read(&self.macros, "macros")?.get(&name.to_lowercase()).cloned())
    }

    // --- Attributes ---

    /// Registers a processor for `name` on widgets of `kind` (or
    /// [`UNIVERSAL_KIND`]) and every kind descending from it.
    pub fn register_attribute(
        &self,
        kind: &str,
        name: &str,
        processor: impl AttributeProcessor + 'static,
    ) -> Result<(), ParserError> {
        self.insert_attribute(kind, name, Provider::Native(Arc::new(processor)))
    }

    pub fn register_attribute_template(&self, kind: &str, definition: TemplateDefinition) -> Result<(), ParserError> {
        let name = definition.name.clone();
        self.insert_attribute(kind, &name, Provider::template(definition))
    }

    fn insert_attribute(
        &self,
        kind: &str,
        name: &str,
        provider: Provider<dyn AttributeProcessor>,
    ) -> Result<(), ParserError> {
        debug!("Registering attribute '{}' for kind '{}': {:?}", name, kind, provider);
        write(&self.attributes, "attributes")?
            .entry(kind.to_lowercase())
            .or_default()
            .insert(name.to_lowercase(), provider);
        Ok(())
    }

    /// Declares the more general kinds of `kind`, most specific first.
    /// Attribute lookup walks this chain before the universal kind.
    pub fn register_kind(&self, kind: &str, parents: &[&str]) -> Result<(), ParserError> {
        debug!("Registering widget kind '{}' extending {:?}", kind, parents);
        write(&self.lineage, "lineage")?.insert(
            kind.to_lowercase(),
            parents.iter().map(|parent| parent.to_lowercase()).collect(),
        );
        Ok(())
    }

    /// `kind`, its ancestors depth-first in declaration order, then `*`.
    pub fn lineage(&self, kind: &str) -> Result<Vec<String>, ParserError> {
        let lineage = read(&self.lineage, "lineage")?;
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut pending = vec![kind.to_lowercase()];
        while let Some(current) = pending.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(parents) = lineage.get(&current) {
                pending.extend(parents.iter().rev().cloned());
            }
            chain.push(current);
        }
        if visited.insert(UNIVERSAL_KIND.to_string()) {
            chain.push(UNIVERSAL_KIND.to_string());
        }
        Ok(chain)
    }

    /// Most specific processor for `name`; widget-less tags only see
    /// universal processors.
    pub fn attribute(
        &self,
        kind: Option<&str>,
        name: &str,
    ) -> Result<Option<Provider<dyn AttributeProcessor>>, ParserError> {
        let chain = match kind {
            Some(kind) => self.lineage(kind)?,
            None => vec![UNIVERSAL_KIND.to_string()],
        };
        let attributes = read(&self.attributes, "attributes")?;
        let name = name.to_lowercase();
        for kind in &chain {
            if let Some(provider) = attributes.get(kind).and_then(|processors| processors.get(&name)) {
                trace!("Attribute '{}' resolved on kind '{}'", name, kind);
                return Ok(Some(provider.clone()));
            }
        }
        Ok(None)
    }

    // --- Actions ---

    pub fn register_action<F>(&self, name: &str, action: F) -> Result<(), ParserError>
    where
        F: Fn(Option<&str>) -> Result<TemplateValue, ParserError> + Send + Sync + 'static,
    {
        self.register_action_arc(name, Arc::new(action))
    }

    pub fn register_action_arc(&self, name: &str, action: Arc<dyn Action>) -> Result<(), ParserError> {
        debug!("Registering action '{}'", name);
        write(&self.actions, "actions")?.insert(name.to_string(), action);
        Ok(())
    }

    /// Containers are scanned in registration order when an action name is
    /// neither registered directly nor qualified with a container id.
    pub fn register_container(&self, name: &str, container: ActionContainer) -> Result<(), ParserError> {
        debug!("Registering action container '{}': {:?}", name, container);
        let mut containers = write(&self.containers, "containers")?;
        containers.retain(|(existing, _)| existing != name);
        containers.push((name.to_string(), container));
        Ok(())
    }

    /// Looks `name` up as an exact action, then as `container.action`, then
    /// in every container.
    pub fn action(&self, name: &str, id_separator: char) -> Result<Option<Arc<dyn Action>>, ParserError> {
        if let Some(action) = read(&self.actions, "actions")?.get(name) {
            trace!("Action '{}' found by exact name", name);
            return Ok(Some(Arc::clone(action)));
        }

        let containers = read(&self.containers, "containers")?;
        if let Some((container_id, action_name)) = name.split_once(id_separator) {
            let found = containers
                .iter()
                .find(|(id, _)| id == container_id)
                .and_then(|(_, container)| container.get(action_name));
            if found.is_some() {
                trace!("Action '{}' found in container '{}'", action_name, container_id);
                return Ok(found);
            }
        }

        Ok(containers.iter().find_map(|(_, container)| container.get(name)))
    }
}

fn read<'a, T>(lock: &'a RwLock<T>, what: &str) -> Result<RwLockReadGuard<'a, T>, ParserError> {
    lock.read().map_err(|_| {
        error!("Failed to acquire read lock on {}", what);
        ParserError::Internal(format!("{} lock poisoned", what))
    })
}

fn write<'a, T>(lock: &'a RwLock<T>, what: &str) -> Result<RwLockWriteGuard<'a, T>, ParserError> {
    lock.write().map_err(|_| {
        error!("Failed to acquire write lock on {}", what);
        ParserError::Internal(format!("{} lock poisoned", what))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut Parser, _: &mut dyn Tag, _: &str) -> Result<(), ParserError> {
        Ok(())
    }

    #[test]
    fn lineage_walks_depth_first_and_ends_universal() {
        let registry = TemplateRegistry::empty();
        registry.register_kind("textButton", &["button", "label"]).unwrap();
        registry.register_kind("button", &["table"]).unwrap();
        registry.register_kind("table", &["widget"]).unwrap();
        assert_eq!(
            registry.lineage("TextButton").unwrap(),
            ["textbutton", "button", "table", "widget", "label", "*"]
        );
    }

    #[test]
    fn most_specific_attribute_wins() {
        let registry = TemplateRegistry::empty();
        registry.register_kind("button", &["label"]).unwrap();
        registry.register_attribute("label", "text", noop).unwrap();
        registry
            .register_attribute_template("button", TemplateDefinition::new("text", vec![], "x"))
            .unwrap();
        registry.register_attribute(UNIVERSAL_KIND, "visible", noop).unwrap();

        assert!(matches!(registry.attribute(Some("button"), "TEXT").unwrap(), Some(Provider::Template(_))));
        assert!(matches!(registry.attribute(Some("label"), "text").unwrap(), Some(Provider::Native(_))));
        assert!(registry.attribute(Some("button"), "visible").unwrap().is_some());
        assert!(registry.attribute(None, "text").unwrap().is_none());
    }

    #[test]
    fn action_lookup_order() {
        let registry = TemplateRegistry::empty();
        registry
            .register_action("menu.open", |_| Ok(TemplateValue::from("exact")))
            .unwrap();
        registry
            .register_container(
                "menu",
                ActionContainer::new()
                    .with("open", |_| Ok(TemplateValue::from("container")))
                    .with("close", |_| Ok(TemplateValue::from("menu close"))),
            )
            .unwrap();
        registry
            .register_container(
                "dialog",
                ActionContainer::new().with("close", |_| Ok(TemplateValue::from("dialog close"))),
            )
            .unwrap();

        let call = |name: &str| {
            registry
                .action(name, '.')
                .unwrap()
                .map(|action| action.consume(None).unwrap().to_string())
        };
        assert_eq!(call("menu.open").as_deref(), Some("exact"));
        assert_eq!(call("dialog.close").as_deref(), Some("dialog close"));
        assert_eq!(call("close").as_deref(), Some("menu close"));
        assert_eq!(call("missing"), None);
    }

    #[test]
    fn template_definitions_bind_body_to_last_parameter() {
        let syntax = Syntax::default();
        let definition = TemplateDefinition::new(
            "greet",
            vec!["who".to_string(), "message".to_string()],
            "{who}: {message} ({other})",
        );
        let attributes = Attributes::Named(vec![("WHO".to_string(), "Ann".to_string())]);
        assert_eq!(definition.expand(&attributes, Some("hi"), &syntax), "Ann: hi ({other})");

        let positional = Attributes::Positional(vec!["Bob".to_string(), "yo".to_string()]);
        assert_eq!(definition.expand(&positional, Some("ignored"), &syntax), "Bob: yo ({other})");
        assert_eq!(definition.expand(&Attributes::None, None, &syntax), "null: null ({other})");
    }
}

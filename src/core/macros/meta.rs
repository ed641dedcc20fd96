use log::info;

use crate::{
    errors::ParserError,
    registry::{TemplateDefinition, UNIVERSAL_KIND},
    tag::TagData,
    MacroTag, Parser,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionTarget {
    /// `:macro` registers a template macro.
    Macro,
    /// `:newTag` registers a template tag.
    Tag,
    /// `:newAttribute` registers a template attribute for a widget kind.
    Attribute,
}

/// Registers its body as a template for later invocations:
///
/// ```text
/// <:macro name="greet" params="who;text">Hello {who}! {text}</:macro>
/// <:macro greet who text>Hello {who}! {text}</:macro>
/// <:newAttribute name="big" kind="label">size=large text={big}</:newAttribute>
/// ```
///
/// Registration goes to the parser's shared registry, so definitions
/// outlive the template that declared them.
#[derive(Debug)]
pub struct DefinitionMacro {
    data: TagData,
    target: DefinitionTarget,
}

impl DefinitionMacro {
    pub fn new(data: TagData, target: DefinitionTarget) -> Self {
        Self { data, target }
    }

    fn definition(&self, parser: &mut Parser) -> Result<Option<TemplateDefinition>, ParserError> {
        let attributes = &self.data.attributes;
        let (name, parameters) = match attributes.positional() {
            [name, parameters @ ..] => (Some(name.clone()), parameters.to_vec()),
            [] => {
                let parameters = match attributes.get("params").or_else(|| attributes.get("parameters")) {
                    Some(parameters) => parameters
                        .split(parser.syntax().array_separator)
                        .map(str::trim)
                        .filter(|parameter| !parameter.is_empty())
                        .map(str::to_string)
                        .collect(),
                    None => Vec::new(),
                };
                (attributes.get("name").map(str::to_string), parameters)
            }
        };
        match name.filter(|name| !name.trim().is_empty()) {
            Some(name) => Ok(Some(TemplateDefinition::new(name.trim(), parameters, self.data.body()))),
            None => {
                parser.error_if_strict(ParserError::InvalidAttributes {
                    tag: self.data.name.clone(),
                    message: "missing name of the definition".to_string(),
                })?;
                Ok(None)
            }
        }
    }
}

impl MacroTag for DefinitionMacro {
    fn data(&self) -> &TagData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    fn close_tag(&mut self, parser: &mut Parser) -> Result<(), ParserError> {
        let Some(definition) = self.definition(parser)? else {
            return Ok(());
        };
        info!("<:{}> defines '{}' with parameters {:?}", self.data.name, definition.name, definition.parameters);
        let registry = parser.registry();
        match self.target {
            DefinitionTarget::Macro => registry.register_macro_template(definition),
            DefinitionTarget::Tag => registry.register_tag_template(definition),
            DefinitionTarget::Attribute => {
                let kind = self.data.attributes.get("kind").unwrap_or(UNIVERSAL_KIND);
                registry.register_attribute_template(kind, definition)
            }
        }
    }
}

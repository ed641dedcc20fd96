use std::collections::HashMap;
use std::sync::Arc;

use log::trace;

use crate::{
    errors::ParserError,
    registry::{AttributeProcessor, Provider, UNIVERSAL_KIND},
    Parser, Tag,
};

/// `id=...` on any tag: sets the element id of its widget.
pub fn apply_id(parser: &mut Parser, tag: &mut dyn Tag, value: &str) -> Result<(), ParserError> {
    match tag.widget_mut() {
        Some(widget) => {
            trace!("Setting element id '{}'", value);
            widget.set_element_id(value);
            Ok(())
        }
        None => parser.error_if_strict(ParserError::InvalidAttributes {
            tag: tag.tag_name().to_string(),
            message: format!("no widget to carry id '{}'", value),
        }),
    }
}

pub(crate) fn default_attributes() -> HashMap<String, HashMap<String, Provider<dyn AttributeProcessor>>> {
    let mut universal: HashMap<String, Provider<dyn AttributeProcessor>> = HashMap::new();
    universal.insert("id".to_string(), Provider::Native(Arc::new(apply_id)));

    let mut attributes = HashMap::new();
    attributes.insert(UNIVERSAL_KIND.to_string(), universal);
    attributes
}

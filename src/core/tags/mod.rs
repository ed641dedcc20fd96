pub mod element;

use std::collections::HashMap;
use std::sync::Arc;

pub use element::{Element, ElementProvider, ElementTag};

use crate::registry::{Provider, TagProvider};

pub const ELEMENT_TAG: &str = "element";

pub(crate) fn default_tags() -> HashMap<String, Provider<dyn TagProvider>> {
    let mut tags: HashMap<String, Provider<dyn TagProvider>> = HashMap::new();
    tags.insert(ELEMENT_TAG.to_string(), Provider::Native(Arc::new(ElementProvider::new())));
    tags
}

//! Built-in providers: the generic `element` tag, the universal `id`
//! attribute and every core macro.

pub mod attributes;
pub mod macros;
pub mod tags;

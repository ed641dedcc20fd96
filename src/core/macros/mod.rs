//! Core macros. Every macro consumes its attributes and captured body and,
//! where it produces output, appends new template text to the parser.

pub mod assignment;
pub mod conditional;
pub mod import;
pub mod listener;
pub mod looping;
pub mod meta;
pub mod misc;

use std::collections::HashMap;
use std::sync::Arc;

use log::Level;

use crate::{
    data::ImportKind,
    errors::ParserError,
    listener::ListenerEvent,
    registry::{MacroProvider, Provider},
    tag::TagData,
    MacroTag, Parser,
};

use self::{
    assignment::{Assignment, AssignmentMacro},
    conditional::{ConditionalMacro, NullCheck, NullCheckMacro},
    import::ImportMacro,
    listener::ListenerMacro,
    looping::{ForEachMacro, LoopMacro, NestedForEachMacro, WhileMacro},
    meta::{DefinitionMacro, DefinitionTarget},
    misc::{CommentMacro, EvaluateMacro, ExceptionMacro, LogMacro},
};

/// Condition of a conditional or `while` macro: the `test` attribute, the
/// positional attributes joined back together (`<:if {a} > 2>`) or the
/// named ones (`<:if a=b>`).
pub(crate) fn condition_of(data: &TagData) -> String {
    let attributes = &data.attributes;
    if let Some(test) = attributes.get("test") {
        return test.to_string();
    }
    match attributes.positional() {
        [] => attributes
            .named()
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(" "),
        positional => positional.join(" "),
    }
}

/// Reader sequence name for text produced by a macro: `<:loop`.
pub(crate) fn sequence_name(parser: &Parser, macro_name: &str) -> String {
    let syntax = parser.syntax();
    format!("{}{}{}", syntax.tag_opening, syntax.macro_marker, macro_name)
}

fn native<F>(build: F) -> Provider<dyn MacroProvider>
where
    F: Fn(TagData) -> Box<dyn MacroTag> + Send + Sync + 'static,
{
    Provider::Native(Arc::new(
        move |_: &mut Parser, data: TagData| -> Result<Box<dyn MacroTag>, ParserError> { Ok(build(data)) },
    ))
}

pub(crate) fn default_macros() -> HashMap<String, Provider<dyn MacroProvider>> {
    let mut macros: HashMap<String, Provider<dyn MacroProvider>> = HashMap::new();
    let mut register = |names: &[&str], provider: Provider<dyn MacroProvider>| {
        for name in names {
            macros.insert(name.to_lowercase(), provider.clone());
        }
    };

    // Conditionals
    register(&["if", "conditional"], native(|data| Box::new(ConditionalMacro::new(data))));
    register(&["notNull"], native(|data| Box::new(NullCheckMacro::new(data, NullCheck::All))));
    register(&["anyNotNull"], native(|data| Box::new(NullCheckMacro::new(data, NullCheck::Any))));
    register(&["isNull"], native(|data| Box::new(NullCheckMacro::new(data, NullCheck::Missing))));

    // Loops
    register(&["loop"], native(|data| Box::new(LoopMacro::new(data))));
    register(&["forEach", "each"], native(|data| Box::new(ForEachMacro::new(data))));
    register(&["nestedForEach"], native(|data| Box::new(NestedForEachMacro::new(data))));
    register(&["while"], native(|data| Box::new(WhileMacro::new(data))));

    // Arguments
    register(&["assign"], native(|data| Box::new(AssignmentMacro::new(data, Assignment::Raw))));
    register(&["argument"], native(|data| Box::new(AssignmentMacro::new(data, Assignment::Resolved))));
    register(
        &["calculate", "eval"],
        native(|data| Box::new(AssignmentMacro::new(data, Assignment::Equation))),
    );
    register(&["random"], native(|data| Box::new(AssignmentMacro::new(data, Assignment::Random))));

    // Listeners
    register(&["onChange"], native(|data| Box::new(ListenerMacro::new(data, ListenerEvent::Change))));
    register(&["onClick"], native(|data| Box::new(ListenerMacro::new(data, ListenerEvent::Click))));
    register(&["onInput"], native(|data| Box::new(ListenerMacro::new(data, ListenerEvent::Input))));

    // Definitions
    register(&["macro"], native(|data| Box::new(DefinitionMacro::new(data, DefinitionTarget::Macro))));
    register(&["newTag"], native(|data| Box::new(DefinitionMacro::new(data, DefinitionTarget::Tag))));
    register(
        &["newAttribute"],
        native(|data| Box::new(DefinitionMacro::new(data, DefinitionTarget::Attribute))),
    );

    // Imports
    register(&["import"], native(|data| Box::new(ImportMacro::new(data, ImportKind::Internal))));
    register(&["importLocal"], native(|data| Box::new(ImportMacro::new(data, ImportKind::Local))));
    register(&["importExternal"], native(|data| Box::new(ImportMacro::new(data, ImportKind::External))));
    register(&["importClasspath"], native(|data| Box::new(ImportMacro::new(data, ImportKind::Classpath))));

    // Misc
    register(&["comment"], native(|data| Box::new(CommentMacro::new(data))));
    register(&["exception"], native(|data| Box::new(ExceptionMacro::new(data))));
    register(&["logTrace"], native(|data| Box::new(LogMacro::new(data, Level::Trace))));
    register(&["logDebug"], native(|data| Box::new(LogMacro::new(data, Level::Debug))));
    register(&["logInfo"], native(|data| Box::new(LogMacro::new(data, Level::Info))));
    register(&["logWarn"], native(|data| Box::new(LogMacro::new(data, Level::Warn))));
    register(&["logError"], native(|data| Box::new(LogMacro::new(data, Level::Error))));
    register(&["evaluate"], native(|data| Box::new(EvaluateMacro::new(data))));

    macros
}

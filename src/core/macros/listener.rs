use log::debug;

use crate::{
    errors::ParserError,
    listener::{IdListenerAttacher, ListenerEvent, ListenerHook},
    tag::TagData,
    MacroTag, Parser,
};

/// `<:onClick ids="save;cancel" if="{enabled}" cache=true>...</:onClick>`
///
/// Without `ids` the hook goes to the widget of the enclosing tag. With
/// `ids` it is attached to every widget with a matching element id once the
/// template is parsed; `keep=true` repeats that for later templates too.
#[derive(Debug)]
pub struct ListenerMacro {
    data: TagData,
    event: ListenerEvent,
}

impl ListenerMacro {
    pub fn new(data: TagData, event: ListenerEvent) -> Self {
        Self { data, event }
    }

    fn flag(&self, parser: &mut Parser, name: &str) -> Result<bool, ParserError> {
        match self.data.attributes.get(name) {
            Some(value) => parser.parse_boolean(value),
            None => Ok(false),
        }
    }
}

impl MacroTag for ListenerMacro {
    fn data(&self) -> &TagData {
        &self.data
    }

    fn data_mut(&mut self) -> &mut TagData {
        &mut self.data
    }

    fn close_tag(&mut self, parser: &mut Parser) -> Result<(), ParserError> {
        let cache = self.flag(parser, "cache")?;
        let keep = self.flag(parser, "keep")?;
        let condition = self.data.attributes.get("if").map(str::to_string);
        let hook = ListenerHook::new(self.event, self.data.body())
            .with_condition(condition)
            .with_cache(cache);

        if let Some(ids) = self.data.attributes.get("ids") {
            let ids = parser.parse_array(ids)?;
            debug!("{:?} listener waits for ids {:?}", self.event, ids);
            parser.add_post_listener(Box::new(IdListenerAttacher::new(ids, hook, keep)));
            return Ok(());
        }

        let attached = parser
            .current_parent_mut()
            .and_then(|parent| parent.widget_mut())
            .map(|widget| widget.add_listener(hook))
            .unwrap_or(false);
        if attached {
            debug!("{:?} listener attached to the enclosing widget", self.event);
            Ok(())
        } else {
            parser.error_if_strict(ParserError::InvalidAttributes {
                tag: self.data.name.clone(),
                message: "no enclosing widget accepts listeners and no ids were given".to_string(),
            })
        }
    }
}

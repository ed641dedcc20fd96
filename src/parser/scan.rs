use std::mem;

use log::{debug, trace};

use crate::{
    core::tags::ElementTag,
    errors::ParserError,
    registry::{Provider, TemplateDefinition},
    syntax::Syntax,
    tag::{Attributes, TagData},
    Parser, Tag,
};

impl Parser {
    /// Scans the reader until every queued sequence is exhausted.
    pub(crate) fn read_all(&mut self) -> Result<(), ParserError> {
        let tag_opening = self.settings.syntax.tag_opening;
        let argument_opening = self.settings.syntax.argument_opening;
        let comment_opening = self.settings.syntax.comment_opening;

        let mut text = String::new();
        while let Some(character) = self.reader.next() {
            if character == argument_opening {
                let raw = self.collect_argument()?;
                let value = self.resolve_argument(&raw)?;
                trace!("Argument {{{}}} resolved to {:?}", raw, value);
                let name = self.settings.syntax.placeholder(&raw);
                self.reader.append(&value, &name);
            } else if character == tag_opening {
                if self.reader.peek() == Some(comment_opening) {
                    self.skip_comment()?;
                    continue;
                }
                self.flush_text(&mut text)?;
                let raw = self.collect_tag()?;
                self.process_tag(&raw)?;
            } else {
                text.push(character);
            }
        }
        self.flush_text(&mut text)?;

        match self.parents.last() {
            Some(parent) => Err(ParserError::UnclosedTag(parent.tag_name().to_string())),
            None => Ok(()),
        }
    }

    /// Reads up to the argument closing marker matching an already consumed
    /// opening marker. Nested arguments are kept verbatim.
    pub(crate) fn collect_argument(&mut self) -> Result<String, ParserError> {
        let opening = self.settings.syntax.argument_opening;
        let closing = self.settings.syntax.argument_closing;
        let mut depth = 1;
        let mut raw = String::new();
        while let Some(character) = self.reader.next() {
            if character == opening {
                depth += 1;
            } else if character == closing {
                depth -= 1;
                if depth == 0 {
                    return Ok(raw);
                }
            }
            raw.push(character);
        }
        Err(ParserError::UnclosedArgument(raw))
    }

    /// Skips a comment or a `<!DOCTYPE ...>` declaration. The tag opening
    /// marker is already consumed; the reader points at the comment marker.
    fn skip_comment(&mut self) -> Result<(), ParserError> {
        let syntax = &self.settings.syntax;
        let dash = syntax.comment_closing;
        let is_comment = self.reader.peek_at(1) == Some(dash) && self.reader.peek_at(2) == Some(dash);

        if !is_comment {
            let (opening, closing) = (syntax.tag_opening, syntax.tag_closing);
            trace!("Skipping schema declaration");
            self.reader.skip(1);
            let mut depth = 1;
            while let Some(character) = self.reader.next() {
                if character == opening {
                    depth += 1;
                } else if character == closing {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
            }
            return Err(ParserError::UnclosedComment);
        }

        let start = syntax.comment_start();
        let end = syntax.comment_end();
        let nested = self.settings.nested_comments;
        self.reader.skip(3);
        let mut depth = 1;
        while self.reader.has_next() {
            if nested && self.reader.starts_with(&start) {
                self.reader.skip(start.chars().count());
                depth += 1;
            } else if self.reader.starts_with(&end) {
                self.reader.skip(end.chars().count());
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            } else {
                self.reader.next();
            }
        }
        Err(ParserError::UnclosedComment)
    }

    /// Reads the raw text of a tag up to its closing marker. Arguments are
    /// resolved in place and comments dropped; quoted text is kept as is.
    fn collect_tag(&mut self) -> Result<String, ParserError> {
        let tag_opening = self.settings.syntax.tag_opening;
        let tag_closing = self.settings.syntax.tag_closing;
        let argument_opening = self.settings.syntax.argument_opening;
        let comment_opening = self.settings.syntax.comment_opening;

        let mut raw = String::new();
        let mut quote: Option<char> = None;
        while let Some(character) = self.reader.next() {
            if character == argument_opening {
                let argument = self.collect_argument()?;
                let value = self.resolve_argument(&argument)?;
                let value = self.resolve_placeholders(&value)?;
                raw.push_str(&value);
                continue;
            }
            if let Some(open) = quote {
                if character == open {
                    quote = None;
                }
                raw.push(character);
            } else if Syntax::is_quote(character) {
                quote = Some(character);
                raw.push(character);
            } else if character == tag_opening && self.reader.peek() == Some(comment_opening) {
                self.skip_comment()?;
            } else if character == tag_closing {
                return Ok(raw);
            } else {
                raw.push(character);
            }
        }
        Err(ParserError::UnclosedTag(raw.trim().to_string()))
    }

    fn process_tag(&mut self, raw: &str) -> Result<(), ParserError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParserError::EmptyTag);
        }
        if let Some(name) = trimmed.strip_prefix(self.settings.syntax.closed_tag_marker) {
            return self.close_parent(name.trim());
        }
        if trimmed.starts_with(self.settings.syntax.macro_marker) {
            return self.process_macro(trimmed);
        }
        self.process_regular_tag(trimmed)
    }

    /// Lenient mode only relaxes letter case. A closing tag naming another
    /// tag fails in both modes, since the tree can not be recovered from it.
    fn close_parent(&mut self, name: &str) -> Result<(), ParserError> {
        let Some(mut parent) = self.parents.pop() else {
            return Err(ParserError::ClosingWithoutParent(name.to_string()));
        };
        let expected = parent.tag_name();
        let matches = if self.settings.strict {
            expected == name
        } else {
            expected.eq_ignore_ascii_case(name)
        };
        if !matches {
            let error = ParserError::TagMismatch {
                expected: expected.to_string(),
                found: name.to_string(),
            };
            self.parents.push(parent);
            return Err(error);
        }

        trace!("Closing <{}>", name);
        parent.close_tag(self)?;
        self.attach(parent)
    }

    fn process_regular_tag(&mut self, raw: &str) -> Result<(), ParserError> {
        let data = TagData::parse(raw, &self.settings.syntax)?;
        match self.registry.tag(&data.name)? {
            Some(Provider::Native(provider)) => {
                trace!("Creating <{}>", data.name);
                let tag = provider.create(self, data)?;
                self.open_tag(tag)
            }
            Some(Provider::Template(definition)) => {
                let mut data = data;
                if !data.closed {
                    data.body = Some(self.capture_body(&data.name, false)?);
                }
                self.expand_template(&definition, &data);
                Ok(())
            }
            None => {
                self.error_if_strict(ParserError::UnknownTag(data.name.clone()))?;
                // Keeps the tree intact so the closing tag still matches
                self.open_tag(Box::new(ElementTag::new(data)))
            }
        }
    }

    fn open_tag(&mut self, mut tag: Box<dyn Tag>) -> Result<(), ParserError> {
        self.apply_attributes(tag.as_mut())?;
        if tag.is_parent() {
            trace!("Opening <{}>", tag.tag_name());
            self.parents.push(tag);
            Ok(())
        } else {
            tag.close_tag(self)?;
            self.attach(tag)
        }
    }

    fn process_macro(&mut self, raw: &str) -> Result<(), ParserError> {
        let mut data = TagData::parse(raw, &self.settings.syntax)?;
        if !data.closed {
            data.body = Some(self.capture_body(&data.name, true)?);
        }

        match self.registry.macro_provider(&data.name)? {
            Some(Provider::Native(provider)) => {
                let name = data.name.clone();
                let body = data.body.take();
                let mut macro_tag = provider.create(self, data)?;
                if let Some(body) = body {
                    macro_tag.handle_body(body);
                }
                debug!("Processing macro <:{}>", name);
                macro_tag.close_tag(self)
            }
            Some(Provider::Template(definition)) => {
                self.expand_template(&definition, &data);
                Ok(())
            }
            None => self.error_if_strict(ParserError::UnknownMacro(data.name)),
        }
    }

    fn expand_template(&mut self, definition: &TemplateDefinition, data: &TagData) {
        let expanded = definition.expand(&data.attributes, data.body.as_deref(), &self.settings.syntax);
        debug!("Template '{}' expanded to {} chars", definition.name, expanded.len());
        let name = format!("{}{}", self.settings.syntax.tag_opening, definition.name);
        self.reader.append(&expanded, &name);
    }

    fn apply_attributes(&mut self, tag: &mut dyn Tag) -> Result<(), ParserError> {
        if !tag.data().attributes.positional().is_empty() {
            self.error_if_strict(ParserError::InvalidAttributes {
                tag: tag.tag_name().to_string(),
                message: "regular tags only take named attributes".to_string(),
            })?;
        }
        let attributes = tag.data().attributes.named().to_vec();
        for (name, value) in &attributes {
            self.apply_attribute(tag, name, value)?;
        }
        Ok(())
    }

    /// Runs the most specific processor registered for the tag's widget kind.
    pub fn apply_attribute(&mut self, tag: &mut dyn Tag, name: &str, value: &str) -> Result<(), ParserError> {
        let kind = tag.widget().map(|widget| widget.kind().to_string());
        match self.registry.attribute(kind.as_deref(), name)? {
            Some(Provider::Native(processor)) => {
                trace!("Applying {}={:?} to <{}>", name, value, tag.tag_name());
                processor.process(self, tag, value)
            }
            Some(Provider::Template(definition)) => {
                let expanded = definition.expand_attribute(value, &self.settings.syntax);
                let expanded = self.resolve_placeholders(&expanded)?;
                let attributes = Attributes::parse(name, &expanded, &self.settings.syntax)?;
                if !attributes.positional().is_empty() {
                    self.error_if_strict(ParserError::InvalidAttributes {
                        tag: name.to_string(),
                        message: format!("template attribute expanded to \"{}\"", expanded),
                    })?;
                }
                for (expanded_name, expanded_value) in attributes.named() {
                    if expanded_name.eq_ignore_ascii_case(name) {
                        return Err(ParserError::InvalidAttributes {
                            tag: name.to_string(),
                            message: "template attribute expands to itself".to_string(),
                        });
                    }
                    self.apply_attribute(tag, expanded_name, expanded_value)?;
                }
                Ok(())
            }
            None => {
                let accepted = tag.widget_mut().is_some_and(|widget| widget.set_attribute(name, value));
                if accepted {
                    Ok(())
                } else {
                    self.error_if_strict(ParserError::UnknownAttribute {
                        kind: kind.unwrap_or_else(|| tag.tag_name().to_string()),
                        attribute: name.to_string(),
                    })
                }
            }
        }
    }

    /// Hands a finished tag to the current parent, or to the roots.
    fn attach(&mut self, tag: Box<dyn Tag>) -> Result<(), ParserError> {
        match self.parents.pop() {
            Some(mut parent) => {
                let result = parent.handle_child(self, tag);
                self.parents.push(parent);
                result
            }
            None => {
                self.roots.push(tag);
                Ok(())
            }
        }
    }

    fn flush_text(&mut self, text: &mut String) -> Result<(), ParserError> {
        if text.is_empty() {
            return Ok(());
        }
        let text = mem::take(text);
        match self.parents.pop() {
            Some(mut parent) => {
                let result = parent.handle_data_between_tags(self, &text);
                self.parents.push(parent);
                result
            }
            None => {
                if !text.trim().is_empty() {
                    self.text.push_str(&text);
                }
                Ok(())
            }
        }
    }
}

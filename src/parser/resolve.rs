use std::sync::Arc;

use log::{debug, trace, warn};

use crate::{
    data::{DEFAULT_BUNDLE, DEFAULT_PREFERENCES},
    equation::{Equation, ValueResolver},
    errors::ParserError,
    syntax::{Syntax, NULL_ARGUMENT},
    types::TemplateValue,
    Parser,
};

impl Parser {
    /// Resolves the content of one `{...}` argument: `{=equation}`,
    /// `{?condition ? a : b}`, `{$action}`, `{@bundleLine}`, `{#preference}`
    /// or a plain `{name}` from the argument table.
    pub(crate) fn resolve_argument(&mut self, raw: &str) -> Result<String, ParserError> {
        let syntax = &self.settings.syntax;
        let trimmed = raw.trim();
        if let Some(equation) = trimmed.strip_prefix(syntax.equation_marker) {
            return self.calculate(equation);
        }
        if let Some(ternary) = trimmed.strip_prefix(syntax.condition_marker) {
            return self.resolve_ternary(ternary);
        }
        if self.is_marked(trimmed) {
            return self.parse_string(trimmed);
        }
        match self.data.get_argument(trimmed) {
            Some(value) => Ok(value.to_string()),
            None => {
                debug!("Argument '{}' is not set, using {}", trimmed, NULL_ARGUMENT);
                Ok(NULL_ARGUMENT.to_string())
            }
        }
    }

    fn is_marked(&self, text: &str) -> bool {
        let syntax = &self.settings.syntax;
        text.starts_with([syntax.action_marker, syntax.bundle_line_marker, syntax.preference_marker])
    }

    /// `condition ? on true : on false`. The chosen branch is returned
    /// unparsed. Without branches the condition's truth value is returned.
    fn resolve_ternary(&mut self, text: &str) -> Result<String, ParserError> {
        let syntax = &self.settings.syntax;
        let (condition, branches) = match split_top_level(text, syntax.condition_marker, syntax) {
            Some((condition, branches)) => (condition, Some(branches)),
            None => (text, None),
        };
        let (on_true, on_false) = match branches {
            Some(branches) => split_top_level(branches, syntax.ternary_marker, syntax).unwrap_or((branches, "")),
            None => ("", ""),
        };
        let result = self.is_true(condition.trim())?;
        trace!("Ternary condition {:?} is {}", condition, result);
        if branches.is_none() {
            return Ok(result.to_string());
        }
        Ok(if result { on_true } else { on_false }.trim().to_string())
    }

    /// Expands every `{...}` argument in `text`. Values that contain
    /// arguments themselves are expanded again.
    pub fn resolve_placeholders(&mut self, text: &str) -> Result<String, ParserError> {
        let opening = self.settings.syntax.argument_opening;
        let closing = self.settings.syntax.argument_closing;
        if !text.contains(opening) {
            return Ok(text.to_string());
        }

        let mut result = String::with_capacity(text.len());
        let mut chars = text.chars();
        while let Some(character) = chars.next() {
            if character != opening {
                result.push(character);
                continue;
            }
            let mut depth = 1;
            let mut raw = String::new();
            for next in chars.by_ref() {
                if next == opening {
                    depth += 1;
                } else if next == closing {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                raw.push(next);
            }
            if depth != 0 {
                return Err(ParserError::UnclosedArgument(raw));
            }
            let value = self.resolve_argument(&raw)?;
            let value = self.resolve_placeholders(&value)?;
            result.push_str(&value);
        }
        Ok(result)
    }

    // --- Values ---

    /// Resolves one value: `$action`, `@bundleLine`, `#preference`, or text
    /// with `{arguments}` expanded.
    pub fn parse_string(&mut self, raw: &str) -> Result<String, ParserError> {
        let syntax = &self.settings.syntax;
        let (action_marker, bundle_line_marker, preference_marker) =
            (syntax.action_marker, syntax.bundle_line_marker, syntax.preference_marker);
        let trimmed = raw.trim();
        if let Some(action) = trimmed.strip_prefix(action_marker) {
            return Ok(self.parse_action(action)?.to_string());
        }
        if let Some(line) = trimmed.strip_prefix(bundle_line_marker) {
            return Ok(self.bundle_line(line));
        }
        if let Some(key) = trimmed.strip_prefix(preference_marker) {
            return Ok(self.preference(key));
        }
        self.resolve_placeholders(raw)
    }

    /// `@key` reads the default bundle, `@bundle.key` a named one.
    fn bundle_line(&self, line: &str) -> String {
        let separator = self.settings.syntax.id_separator;
        let found = match line.split_once(separator) {
            Some((bundle, key)) if self.data.has_bundle(bundle) => self.data.bundle_line(bundle, key),
            _ => self.data.bundle_line(DEFAULT_BUNDLE, line),
        };
        found.map(str::to_string).unwrap_or_else(|| {
            warn!("Missing i18n line '{}'", line);
            NULL_ARGUMENT.to_string()
        })
    }

    /// `#key` reads the default preferences, `#preferences.key` named ones.
    fn preference(&self, key: &str) -> String {
        let separator = self.settings.syntax.id_separator;
        let found = match key.split_once(separator) {
            Some((preferences, name)) if self.data.has_preferences(preferences) => {
                self.data.preference(preferences, name)
            }
            _ => self.data.preference(DEFAULT_PREFERENCES, key),
        };
        found.map(str::to_string).unwrap_or_else(|| {
            warn!("Missing preference '{}'", key);
            NULL_ARGUMENT.to_string()
        })
    }

    /// Splits `raw` at the array separator. Elements may be ranges
    /// (`item[1,3]` gives `item1;item2;item3`, descending if the bounds are
    /// swapped) or actions returning lists, which are flattened.
    pub fn parse_array(&mut self, raw: &str) -> Result<Vec<String>, ParserError> {
        let syntax = self.settings.syntax.clone();
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut values = Vec::new();
        for element in split_all_top_level(raw, syntax.array_separator, &syntax) {
            let element = element.trim();
            if let Some(range) = self.parse_range(element, &syntax)? {
                values.extend(range);
            } else if let Some(action) = element.strip_prefix(syntax.action_marker) {
                values.extend(self.parse_action(action)?.into_elements());
            } else {
                values.push(self.parse_string(element)?);
            }
        }
        trace!("Array {:?} resolved to {:?}", raw, values);
        Ok(values)
    }

    fn parse_range(&mut self, element: &str, syntax: &Syntax) -> Result<Option<Vec<String>>, ParserError> {
        let Some(inner) = element.strip_suffix(syntax.range_closing) else {
            return Ok(None);
        };
        let invalid = || ParserError::InvalidRange(element.to_string());
        let open = inner.find(syntax.range_opening).ok_or_else(invalid)?;
        let base = &inner[..open];
        let bounds = &inner[open + syntax.range_opening.len_utf8()..];
        let (start, end) = bounds.split_once(syntax.range_separator).ok_or_else(invalid)?;
        let start = self.parse_int(start).map_err(|_| invalid())?;
        let end = self.parse_int(end).map_err(|_| invalid())?;

        let indexes: Box<dyn Iterator<Item = i64>> = if start <= end {
            Box::new(start..=end)
        } else {
            Box::new((end..=start).rev())
        };
        Ok(Some(indexes.map(|index| format!("{}{}", base, index)).collect()))
    }

    pub fn parse_int(&mut self, raw: &str) -> Result<i64, ParserError> {
        let text = self.parse_string(raw)?;
        text.trim().parse().map_err(|_| ParserError::InvalidNumber(text))
    }

    pub fn parse_float(&mut self, raw: &str) -> Result<f64, ParserError> {
        let text = self.parse_string(raw)?;
        text.trim().parse().map_err(|_| ParserError::InvalidNumber(text))
    }

    /// Only `true` and `false` are booleans. Anything else is an error in
    /// strict mode and `false` otherwise.
    pub fn parse_boolean(&mut self, raw: &str) -> Result<bool, ParserError> {
        let text = self.parse_string(raw)?;
        match text.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => {
                self.error_if_strict(ParserError::InvalidBoolean(other.to_string()))?;
                Ok(false)
            }
        }
    }

    /// Invokes `name` (with or without the action marker) without an argument.
    pub fn parse_action(&mut self, name: &str) -> Result<TemplateValue, ParserError> {
        self.invoke_action(name, None)
    }

    pub fn invoke_action(&mut self, name: &str, argument: Option<&str>) -> Result<TemplateValue, ParserError> {
        let syntax = &self.settings.syntax;
        let name = name.trim();
        let name = name.strip_prefix(syntax.action_marker).unwrap_or(name);
        match self.registry.action(name, syntax.id_separator)? {
            Some(action) => {
                trace!("Invoking action '{}' with {:?}", name, argument);
                action.consume(argument)
            }
            None => {
                self.error_if_strict(ParserError::UnknownAction(name.to_string()))?;
                Ok(TemplateValue::Null)
            }
        }
    }

    /// Whether a macro attribute counts as null: blank, `null`, or an action
    /// that returned nothing.
    pub fn is_null(&mut self, raw: &str) -> Result<bool, ParserError> {
        let trimmed = raw.trim();
        if let Some(action) = trimmed.strip_prefix(self.settings.syntax.action_marker) {
            let value = self.parse_action(action)?;
            return Ok(value.is_null() || value.to_string().eq_ignore_ascii_case(NULL_ARGUMENT));
        }
        let value = self.parse_string(trimmed)?;
        let value = value.trim();
        Ok(value.is_empty() || value.eq_ignore_ascii_case(NULL_ARGUMENT))
    }

    // --- Equations ---

    pub fn is_true(&mut self, equation: &str) -> Result<bool, ParserError> {
        let operators = Arc::clone(&self.operators);
        Equation::with_resolver(&operators, self).is_true(equation)
    }

    pub fn calculate(&mut self, equation: &str) -> Result<String, ParserError> {
        let operators = Arc::clone(&self.operators);
        Equation::with_resolver(&operators, self).get_result(equation)
    }
}

impl ValueResolver for Parser {
    fn resolve_value(&mut self, raw: &str) -> Result<String, ParserError> {
        if self.is_marked(raw) || raw.contains(self.settings.syntax.argument_opening) {
            self.parse_string(raw)
        } else {
            Ok(raw.to_string())
        }
    }

    fn argument_markers(&self) -> (char, char) {
        (self.settings.syntax.argument_opening, self.settings.syntax.argument_closing)
    }
}

/// Splits at the first `marker` outside of arguments and quotes.
fn split_top_level<'a>(text: &'a str, marker: char, syntax: &Syntax) -> Option<(&'a str, &'a str)> {
    let index = top_level_positions(text, marker, syntax).next()?;
    Some((&text[..index], &text[index + marker.len_utf8()..]))
}

fn split_all_top_level<'a>(text: &'a str, marker: char, syntax: &Syntax) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for index in top_level_positions(text, marker, syntax) {
        parts.push(&text[start..index]);
        start = index + marker.len_utf8();
    }
    parts.push(&text[start..]);
    parts
}

fn top_level_positions<'a>(text: &'a str, marker: char, syntax: &Syntax) -> impl Iterator<Item = usize> + use<'a> {
    let (opening, closing) = (syntax.argument_opening, syntax.argument_closing);
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    text.char_indices().filter_map(move |(index, character)| {
        match quote {
            Some(open) if character == open => quote = None,
            Some(_) => {}
            None if Syntax::is_quote(character) => quote = Some(character),
            None if character == opening => depth += 1,
            None if character == closing => depth = depth.saturating_sub(1),
            None if character == marker && depth == 0 => return Some(index),
            None => {}
        }
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_split_skips_arguments_and_quotes() {
        let syntax = Syntax::default();
        assert_eq!(
            split_all_top_level("a;{b;c};'d;e';f", ';', &syntax),
            vec!["a", "{b;c}", "'d;e'", "f"]
        );
        assert_eq!(
            split_top_level("{loop:index} = 1 ? x : y", '?', &syntax),
            Some(("{loop:index} = 1 ", " x : y"))
        );
    }
}

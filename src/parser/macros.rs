use log::trace;

use crate::{errors::ParserError, reader::SequenceReader, syntax::Syntax, Parser};

/// Random access to upcoming characters.
trait Lookahead {
    fn char_at(&self, offset: usize) -> Option<char>;
}

impl Lookahead for SequenceReader {
    fn char_at(&self, offset: usize) -> Option<char> {
        self.peek_at(offset)
    }
}

impl Lookahead for [char] {
    fn char_at(&self, offset: usize) -> Option<char> {
        self.get(offset).copied()
    }
}

/// Recognises opening and closing tags of one name. Offsets point just past
/// the tag opening marker.
struct TagMatcher<'a> {
    syntax: &'a Syntax,
    name: &'a str,
    is_macro: bool,
    strict: bool,
}

impl<'a> TagMatcher<'a> {
    fn new(syntax: &'a Syntax, name: &'a str, is_macro: bool, strict: bool) -> Self {
        Self {
            syntax,
            name,
            is_macro,
            strict,
        }
    }

    /// Index just past the (macro marker and) name, if they match.
    fn match_name<L: Lookahead + ?Sized>(&self, text: &L, mut index: usize) -> Option<usize> {
        if self.is_macro {
            if text.char_at(index)? != self.syntax.macro_marker {
                return None;
            }
            index += 1;
        }
        for expected in self.name.chars() {
            let actual = text.char_at(index)?;
            let same = if self.strict {
                actual == expected
            } else {
                actual.to_lowercase().eq(expected.to_lowercase())
            };
            if !same {
                return None;
            }
            index += 1;
        }
        Some(index)
    }

    /// Length of a `/:name>` closing tag starting at `offset`, closing marker included.
    fn closing_length<L: Lookahead + ?Sized>(&self, text: &L, offset: usize) -> Option<usize> {
        if text.char_at(offset)? != self.syntax.closed_tag_marker {
            return None;
        }
        let mut index = self.match_name(text, offset + 1)?;
        while text.char_at(index)?.is_whitespace() {
            index += 1;
        }
        (text.char_at(index)? == self.syntax.tag_closing).then_some(index + 1 - offset)
    }

    /// For an opening `:name ...>` tag starting at `offset`: whether it is
    /// self-closed and its length, closing marker included.
    fn opening<L: Lookahead + ?Sized>(&self, text: &L, offset: usize) -> Option<(bool, usize)> {
        let mut index = self.match_name(text, offset)?;
        let next = text.char_at(index)?;
        if !(next.is_whitespace() || next == self.syntax.closed_tag_marker || next == self.syntax.tag_closing) {
            return None;
        }

        let mut quote: Option<char> = None;
        let mut last: Option<char> = None;
        loop {
            let character = text.char_at(index)?;
            match quote {
                Some(open) if character == open => quote = None,
                Some(_) => {}
                None if Syntax::is_quote(character) => quote = Some(character),
                None if character == self.syntax.tag_closing => {
                    let closed = last == Some(self.syntax.closed_tag_marker);
                    return Some((closed, index + 1 - offset));
                }
                None => {}
            }
            if !character.is_whitespace() {
                last = Some(character);
            }
            index += 1;
        }
    }
}

impl Parser {
    /// Reads the verbatim body of a tag whose opening tag was just consumed,
    /// up to the closing tag that matches it. Same-named tags opened inside
    /// the body must be closed before the body ends; self-closed ones do not
    /// count. The closing tag itself is consumed but not part of the body.
    pub(crate) fn capture_body(&mut self, name: &str, is_macro: bool) -> Result<String, ParserError> {
        let matcher = TagMatcher::new(&self.settings.syntax, name, is_macro, self.settings.strict);
        let mut depth = 1usize;
        let mut body = String::new();

        while let Some(character) = self.reader.next() {
            if character == matcher.syntax.tag_opening {
                if let Some(length) = matcher.closing_length(&self.reader, 0) {
                    depth -= 1;
                    if depth == 0 {
                        self.reader.skip(length);
                        trace!("Captured {} chars for <{}>", body.len(), name);
                        return Ok(body);
                    }
                } else if let Some((false, _)) = matcher.opening(&self.reader, 0) {
                    depth += 1;
                }
            }
            body.push(character);
        }

        Err(if is_macro {
            ParserError::UnclosedMacro(name.to_string())
        } else {
            ParserError::UnclosedTag(name.to_string())
        })
    }
}

/// Splits a conditional macro body at its own `<:name:else/>` marker.
/// Markers inside nested macros of the same name belong to those macros.
pub(crate) fn split_else(body: &str, name: &str, syntax: &Syntax, strict: bool) -> (String, Option<String>) {
    let chars: Vec<char> = body.chars().collect();
    let else_name = format!("{}{}{}", name, syntax.macro_marker, syntax.else_suffix);
    let matcher = TagMatcher::new(syntax, name, true, strict);
    let else_matcher = TagMatcher::new(syntax, &else_name, true, strict);

    let mut depth = 0usize;
    for index in 0..chars.len() {
        if chars[index] != syntax.tag_opening {
            continue;
        }
        let offset = index + 1;
        if matcher.closing_length(chars.as_slice(), offset).is_some() {
            depth = depth.saturating_sub(1);
        } else if let Some((true, length)) = else_matcher.opening(chars.as_slice(), offset) {
            if depth == 0 {
                let on_true = chars[..index].iter().collect();
                let on_false = chars[offset + length..].iter().collect();
                return (on_true, Some(on_false));
            }
        } else if let Some((false, _)) = matcher.opening(chars.as_slice(), offset) {
            depth += 1;
        }
    }
    (body.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn else_splits_at_own_level_only() {
        let syntax = Syntax::default();
        let body = "a<:if x>b<:if:else/>c</:if>d<:if:else />e";
        let (on_true, on_false) = split_else(body, "if", &syntax, true);
        assert_eq!(on_true, "a<:if x>b<:if:else/>c</:if>d");
        assert_eq!(on_false.as_deref(), Some("e"));
    }

    #[test]
    fn self_closed_same_name_macro_does_not_nest() {
        let syntax = Syntax::default();
        let body = "a<:if x/>b<:if:else/>c";
        let (on_true, on_false) = split_else(body, "if", &syntax, true);
        assert_eq!(on_true, "a<:if x/>b");
        assert_eq!(on_false.as_deref(), Some("c"));
    }

    #[test]
    fn opening_tag_lookahead_respects_quotes() {
        let syntax = Syntax::default();
        let matcher = TagMatcher::new(&syntax, "m", true, true);
        let text: Vec<char> = r#":m test="a/>b">"#.chars().collect();
        assert_eq!(matcher.opening(text.as_slice(), 0), Some((false, text.len())));
        let other: Vec<char> = ":mm>".chars().collect();
        assert_eq!(matcher.opening(other.as_slice(), 0), None);
    }
}

//! Stack of character sequences the parser reads through.
//!
//! Every piece of text that enters a parse (the template itself, imported
//! files, macro results, resolved arguments) becomes a [`Sequence`]. Appending
//! a sequence while another one is being read suspends the current one; it is
//! resumed at its previous cursor once the newer sequence is exhausted.

use log::{debug, trace};

use crate::errors::ParserError;

#[derive(Debug, Clone)]
pub struct Sequence {
    name: String,
    chars: Vec<char>,
    index: usize,
    line: usize,
}

impl Sequence {
    fn new(text: &str, name: &str) -> Self {
        Sequence {
            name: name.to_string(),
            chars: text.chars().collect(),
            index: 0,
            line: 1,
        }
    }

    fn remaining(&self) -> usize {
        self.chars.len() - self.index
    }

    fn is_exhausted(&self) -> bool {
        self.index >= self.chars.len()
    }

    fn next(&mut self) -> Option<char> {
        let character = *self.chars.get(self.index)?;
        self.index += 1;
        if character == '\n' {
            self.line += 1;
        }
        Some(character)
    }

    fn text(&self) -> String {
        self.chars.iter().collect()
    }
}

/// The bottom of `stack` is the original sequence; the top is the one being read.
///
/// The original sequence is never popped, even when exhausted, so its line
/// counter stays available for diagnostics until [`SequenceReader::clear`].
#[derive(Debug, Default)]
pub struct SequenceReader {
    stack: Vec<Sequence>,
}

impl SequenceReader {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// Pushes `text` as the new current sequence. Empty text is ignored.
    pub fn append(&mut self, text: &str, name: &str) {
        if text.is_empty() {
            trace!("Ignoring empty sequence '{}'", name);
            return;
        }
        debug!(
            "Appending sequence '{}' ({} chars, {} queued)",
            name,
            text.chars().count(),
            self.stack.len()
        );
        self.stack.push(Sequence::new(text, name));
    }

    pub fn has_next(&self) -> bool {
        self.stack.iter().any(|sequence| !sequence.is_exhausted())
    }

    /// True if at least `count` characters are left across all sequences.
    pub fn has_next_n(&self, count: usize) -> bool {
        self.available() >= count
    }

    /// Total number of unread characters across all sequences.
    pub fn available(&self) -> usize {
        self.stack.iter().map(Sequence::remaining).sum()
    }

    pub fn next(&mut self) -> Option<char> {
        loop {
            let top = self.stack.len().checked_sub(1)?;
            if self.stack[top].is_exhausted() {
                if top == 0 {
                    return None;
                }
                let finished = self.stack.pop();
                if let Some(finished) = finished {
                    trace!("Sequence '{}' exhausted, resuming queued sequence", finished.name);
                }
                continue;
            }
            return self.stack[top].next();
        }
    }

    pub fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    /// Character `offset` positions ahead of the cursor, looking through
    /// queued sequences when the current one runs out.
    pub fn peek_at(&self, offset: usize) -> Option<char> {
        let mut offset = offset;
        for sequence in self.stack.iter().rev() {
            let remaining = sequence.remaining();
            if offset < remaining {
                return sequence.chars.get(sequence.index + offset).copied();
            }
            offset -= remaining;
        }
        None
    }

    /// Like [`peek_at`](Self::peek_at), but reading past the end is an error.
    pub fn peek_n(&self, offset: usize) -> Result<char, ParserError> {
        self.peek_at(offset).ok_or_else(|| {
            ParserError::Internal(format!(
                "cannot peek {} characters ahead, only {} available",
                offset + 1,
                self.available()
            ))
        })
    }

    pub fn starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(offset, expected)| self.peek_at(offset) == Some(expected))
    }

    /// Consumes `count` characters.
    pub fn skip(&mut self, count: usize) {
        for _ in 0..count {
            if self.next().is_none() {
                break;
            }
        }
    }

    pub fn clear(&mut self) {
        trace!("Clearing reader ({} sequences)", self.stack.len());
        self.stack.clear();
    }

    fn current(&self) -> Option<&Sequence> {
        self.stack.last()
    }

    fn original(&self) -> Option<&Sequence> {
        self.stack.first()
    }

    pub fn current_line(&self) -> Option<usize> {
        self.current().map(|sequence| sequence.line)
    }

    pub fn original_line(&self) -> Option<usize> {
        self.original().map(|sequence| sequence.line)
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current().map(|sequence| sequence.name.as_str())
    }

    pub fn original_name(&self) -> Option<&str> {
        self.original().map(|sequence| sequence.name.as_str())
    }

    pub fn current_text(&self) -> Option<String> {
        self.current().map(Sequence::text)
    }

    pub fn original_text(&self) -> Option<String> {
        self.original().map(Sequence::text)
    }

    pub fn is_parsing_original(&self) -> bool {
        self.stack.len() == 1
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(reader: &mut SequenceReader) -> String {
        std::iter::from_fn(|| reader.next()).collect()
    }

    #[test]
    fn queued_sequence_resumes_where_it_stopped() {
        let mut reader = SequenceReader::new();
        reader.append("ab\ncd", "A");
        assert_eq!(reader.next(), Some('a'));
        assert_eq!(reader.next(), Some('b'));
        assert_eq!(reader.next(), Some('\n'));
        assert_eq!(reader.current_line(), Some(2));

        reader.append("xy", "B");
        assert_eq!(reader.current_name(), Some("B"));
        assert!(!reader.is_parsing_original());
        assert_eq!(reader.next(), Some('x'));
        assert_eq!(reader.next(), Some('y'));

        assert_eq!(reader.next(), Some('c'));
        assert_eq!(reader.current_name(), Some("A"));
        assert_eq!(reader.current_line(), Some(2));
        assert_eq!(drain(&mut reader), "d");
        assert!(!reader.has_next());
    }

    #[test]
    fn empty_append_does_not_disturb_state() {
        let mut reader = SequenceReader::new();
        reader.append("", "nothing");
        assert!(reader.is_empty());
        assert_eq!(reader.original_name(), None);

        reader.append("abc", "A");
        reader.append("", "nothing");
        assert_eq!(reader.current_name(), Some("A"));
        assert!(reader.is_parsing_original());
    }

    #[test]
    fn peek_looks_across_sequence_boundaries() {
        let mut reader = SequenceReader::new();
        reader.append("<:x>", "A");
        reader.skip(3);
        reader.append("/", "B");
        assert_eq!(reader.available(), 2);
        assert!(reader.starts_with("/>"));
        assert_eq!(reader.peek_at(1), Some('>'));
        assert!(reader.peek_n(2).is_err());
        assert!(reader.has_next_n(2));
        assert!(!reader.has_next_n(3));
    }

    #[test]
    fn exhausted_sequences_are_skipped() {
        let mut reader = SequenceReader::new();
        reader.append("a", "A");
        reader.next();
        reader.append("b", "B");
        reader.append("c", "C");
        reader.next();
        reader.next();
        assert_eq!(reader.next(), None);
        assert_eq!(reader.original_name(), Some("A"));
        reader.clear();
        assert_eq!(reader.original_name(), None);
    }
}

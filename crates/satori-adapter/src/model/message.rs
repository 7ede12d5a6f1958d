//! Satori message type.
//!
//! A [`Message`] is an ordered list of [`Segment`]s. It parses from and renders
//! to Satori markup, and supports concatenation with strings, segments and
//! other messages.
//!
//! # Example
//!
//! ```rust,ignore
//! use satori_adapter::{Message, Segment};
//!
//! let msg = Message::parse(r#"<at id="1"/> hello"#);
//! assert_eq!(msg.extract_plain_text(), "hello");
//!
//! let reply = Segment::quote("42") + "got it";
//! println!("{reply}");
//! ```

use std::fmt;
use std::ops::{Add, AddAssign, Index};

use super::element::{self, Element};
use super::segment::Segment;

/// A Satori message composed of segments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    segments: Vec<Segment>,
}

// ============================================================================
// Constructors
// ============================================================================

impl Message {
    /// Creates an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses Satori markup.
    pub fn parse(markup: &str) -> Self {
        Self::from_elements(&element::parse(markup))
    }

    /// Converts parsed elements into segments, one per element.
    pub fn from_elements(elements: &[Element]) -> Self {
        Self {
            segments: elements.iter().map(Segment::from_element).collect(),
        }
    }

    /// Creates a message from segments.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }
}

// ============================================================================
// Access and mutation
// ============================================================================

impl Message {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segments_mut(&mut self) -> &mut Vec<Segment> {
        &mut self.segments
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn first(&self) -> Option<&Segment> {
        self.segments.first()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Segment> {
        self.segments.get_mut(index)
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn insert(&mut self, index: usize, segment: Segment) {
        self.segments.insert(index, segment);
    }

    /// Removes and returns the segment at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn remove(&mut self, index: usize) -> Segment {
        self.segments.remove(index)
    }

    /// Drops every segment from `index` on.
    pub fn truncate(&mut self, index: usize) {
        self.segments.truncate(index);
    }

    /// Index of the first segment of the given kind.
    pub fn index_of(&self, kind: &str) -> Option<usize> {
        self.segments.iter().position(|s| s.kind() == kind)
    }

    /// The first text segment's content, if the message starts with text.
    pub fn first_text(&self) -> Option<&str> {
        self.segments.first().and_then(Segment::as_text)
    }

    /// Concatenated markup of the text-like segments, trimmed.
    pub fn extract_plain_text(&self) -> String {
        self.segments
            .iter()
            .filter(|s| s.is_text())
            .map(Segment::to_string)
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Whether every segment is text-like.
    pub fn is_text(&self) -> bool {
        self.segments.iter().all(Segment::is_text)
    }

    /// Human readable form for logs.
    pub fn log(&self) -> String {
        self.segments
            .iter()
            .map(Segment::log)
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl Index<usize> for Message {
    type Output = Segment;

    fn index(&self, index: usize) -> &Segment {
        &self.segments[index]
    }
}

// ============================================================================
// From implementations
// ============================================================================

impl From<Vec<Segment>> for Message {
    fn from(segments: Vec<Segment>) -> Self {
        Self { segments }
    }
}

impl From<Segment> for Message {
    fn from(segment: Segment) -> Self {
        Self {
            segments: vec![segment],
        }
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Segment::text(text).into()
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Segment::text(text).into()
    }
}

impl FromIterator<Segment> for Message {
    fn from_iter<T: IntoIterator<Item = Segment>>(iter: T) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Message {
    type Item = Segment;
    type IntoIter = std::vec::IntoIter<Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.into_iter()
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

// ============================================================================
// Concatenation
// ============================================================================

impl<T: Into<Message>> AddAssign<T> for Message {
    fn add_assign(&mut self, rhs: T) {
        self.segments.extend(rhs.into().segments);
    }
}

impl<T: Into<Message>> Add<T> for Message {
    type Output = Message;

    fn add(mut self, rhs: T) -> Message {
        self += rhs;
        self
    }
}

impl<T: Into<Message>> Add<T> for Segment {
    type Output = Message;

    fn add(self, rhs: T) -> Message {
        Message::from(self) + rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render() {
        let markup = r#"<quote id="1"/><at id="2"/> hi &amp; bye<img src="u"/>"#;
        let msg = Message::parse(markup);
        assert_eq!(msg.len(), 4);
        assert_eq!(msg.index_of("at"), Some(1));
        assert_eq!(msg.index_of("video"), None);
        assert_eq!(msg[2], Segment::text(" hi & bye"));
        assert_eq!(msg.to_string(), markup);
    }

    #[test]
    fn test_extract_plain_text() {
        let msg = Message::parse(r#"<at id="2"/> a &lt; b <b>c</b>"#);
        assert_eq!(msg.extract_plain_text(), "a &lt; b <b>c</b>");
        assert!(!msg.is_text());
    }

    #[test]
    fn test_log() {
        let msg = Segment::at_named("1", "Ann") + " hello" + Segment::image("u");
        assert_eq!(msg.log(), "@Ann  hello ![image](src=u)");
    }

    #[test]
    fn test_concatenation_preserves_order() {
        let mut msg = Message::from("a");
        msg += Segment::br();
        msg += Message::from_segments(vec![Segment::text("b"), Segment::text("c")]);
        let msg = msg + "d";
        let kinds: Vec<_> = msg.iter().map(Segment::kind).collect();
        assert_eq!(kinds, vec!["text", "br", "text", "text", "text"]);
        assert_eq!(msg.to_string(), "a<br/>bcd");
    }

    #[test]
    fn test_mutation() {
        let mut msg = Message::parse("x<br/>y");
        msg.insert(0, Segment::quote("5"));
        assert_eq!(msg.remove(2), Segment::Br);
        msg.truncate(2);
        assert_eq!(msg.to_string(), r#"<quote id="5"/>x"#);
        assert_eq!(msg.first_text(), None);
    }
}

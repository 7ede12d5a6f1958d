//! Satori markup elements.
//!
//! Message content on the wire is an HTML-like markup string. This module
//! turns it into a tree of [`Element`]s and back.
//!
//! # Parsing rules
//!
//! - Comments (`<!-- ... -->`) are dropped.
//! - Text between tags is entity-unescaped; empty text produces no node.
//! - A tag with an empty name (`<>`, `</>`) is a `template` element.
//! - A closing tag with no open counterpart becomes literal text.
//! - When a closing tag matches an element deeper in the stack, every element
//!   opened above it is *rolled back*: its opening tag turns into literal text
//!   and its children are spliced into its parent. Elements still open at the
//!   end of input are rolled back the same way.
//!
//! ```rust,ignore
//! use satori_adapter::model::element::{self, Element};
//!
//! let tree = element::parse("<b>a<i>b</b>c</i>");
//! // [<b>a&lt;i&gt;b</b>, "c", "</i>"]
//! let markup: String = tree.iter().map(Element::to_string).collect();
//! ```

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Matches a comment, or an opening/closing/self-closing tag.
static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--[\s\S]*?-->|<(/?)([^!\s>/]*)([^>]*?)\s*(/?)>").expect("tag pattern is valid")
});

/// Matches `key`, `key="value"` or `key='value'`.
static ATTR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=]+)(?:="([^"]*)"|='([^']*)')?"#).expect("attribute pattern is valid")
});

// ============================================================================
// Escaping
// ============================================================================

/// Escapes `&`, `"`, `<` and `>` as XML entities.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Reverses [`escape`].
///
/// Entities are decoded in a single left-to-right pass, so an escaped entity
/// such as `&amp;lt;` decodes to `&lt;` and never further.
pub fn unescape(text: &str) -> String {
    const ENTITIES: [(&str, char); 4] = [
        ("&quot;", '"'),
        ("&amp;", '&'),
        ("&lt;", '<'),
        ("&gt;", '>'),
    ];

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match ENTITIES
            .iter()
            .find(|(entity, _)| rest.starts_with(entity))
        {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// ============================================================================
// Element
// ============================================================================

/// An attribute value: either a string or a bare/negated flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// `key="value"`
    Str(String),
    /// `key` (true) or `no-key` (false)
    Bool(bool),
}

impl AttrValue {
    /// Returns the string value, if this is a string attribute.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Bool(_) => None,
        }
    }

    /// Returns the flag value, if this is a boolean attribute.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Str(_) => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A node of the markup tree.
///
/// Text nodes have kind `text` and carry their content in the `text`
/// attribute. An element may remember the exact markup it was read from
/// (`source`); while it does, serialization reproduces that markup verbatim.
/// Every mutation forgets the source, so a modified element is always
/// rendered from its structure.
#[derive(Debug, Clone, Default)]
pub struct Element {
    kind: String,
    attrs: Vec<(String, AttrValue)>,
    children: Vec<Element>,
    source: Option<String>,
}

impl Element {
    /// Creates an element with no attributes or children.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// Creates a text node.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new("text").with_attr("text", text.into())
    }

    /// Adds or replaces an attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Appends a child.
    pub fn with_child(mut self, child: Element) -> Self {
        self.push_child(child);
        self
    }

    /// Appends several children.
    pub fn with_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.source = None;
        self.children.extend(children);
        self
    }

    /// Pins the markup this element serializes to.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The element kind (tag name).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Whether this is a text node.
    pub fn is_text(&self) -> bool {
        self.kind == "text"
    }

    /// The content of a text node.
    pub fn as_text(&self) -> Option<&str> {
        if self.is_text() {
            self.attr_str("text")
        } else {
            None
        }
    }

    /// Looks up an attribute.
    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Looks up a string attribute.
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(AttrValue::as_str)
    }

    /// Looks up a boolean attribute.
    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        self.attr(key).and_then(AttrValue::as_bool)
    }

    /// All attributes in insertion order.
    pub fn attrs(&self) -> &[(String, AttrValue)] {
        &self.attrs
    }

    /// Child nodes.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// The pinned markup, if any.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Adds or replaces an attribute. Forgets the source.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.source = None;
        let key = key.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((key, value)),
        }
    }

    /// Appends a child. Forgets the source.
    pub fn push_child(&mut self, child: Element) {
        self.source = None;
        self.children.push(child);
    }

    /// Mutable access to the children. Forgets the source.
    pub fn children_mut(&mut self) -> &mut Vec<Element> {
        self.source = None;
        &mut self.children
    }

    /// Concatenated content of every text node below (and including) this one.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(text) = self.as_text() {
            out.push_str(text);
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }
}

/// Attribute order is not significant.
impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.source == other.source
            && self.children == other.children
            && self.attrs.len() == other.attrs.len()
            && self
                .attrs
                .iter()
                .all(|(k, v)| other.attr(k) == Some(v))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            return f.write_str(source);
        }
        if self.is_text() {
            return f.write_str(&escape(self.attr_str("text").unwrap_or_default()));
        }

        write!(f, "<{}", self.kind)?;
        for (key, value) in &self.attrs {
            match value {
                AttrValue::Bool(true) => write!(f, " {key}")?,
                AttrValue::Bool(false) => write!(f, " no-{key}")?,
                AttrValue::Str(s) => write!(f, " {key}=\"{}\"", escape(s))?,
            }
        }
        if self.children.is_empty() {
            return f.write_str("/>");
        }
        f.write_str(">")?;
        for child in &self.children {
            write!(f, "{child}")?;
        }
        write!(f, "</{}>", self.kind)
    }
}

/// Serializes a forest of elements.
pub fn render(elements: &[Element]) -> String {
    elements.iter().map(Element::to_string).collect()
}

// ============================================================================
// Parsing
// ============================================================================

/// A lexical token of the markup.
enum Token {
    Text(String),
    Tag(Tag),
}

struct Tag {
    kind: String,
    closing: bool,
    self_closing: bool,
    attrs: Vec<(String, AttrValue)>,
    source: String,
}

/// Parses markup into a forest of elements.
///
/// Parsing never fails; malformed nesting is repaired by rollback.
pub fn parse(source: &str) -> Vec<Element> {
    let mut root = Element::new("template");
    // Open elements above the root; the last one is the innermost.
    let mut stack: Vec<Element> = Vec::new();

    for token in tokenize(source) {
        match token {
            Token::Text(text) => top(&mut root, &mut stack).children.push(Element::text(text)),
            Token::Tag(tag) if tag.closing => {
                match stack.iter().rev().position(|open| open.kind == tag.kind) {
                    Some(depth) => {
                        rollback(&mut root, &mut stack, depth);
                        if let Some(mut closed) = stack.pop() {
                            closed.source = None;
                            top(&mut root, &mut stack).children.push(closed);
                        }
                    }
                    None => top(&mut root, &mut stack)
                        .children
                        .push(Element::text(tag.source)),
                }
            }
            Token::Tag(tag) => {
                let element = Element {
                    kind: tag.kind,
                    attrs: tag.attrs,
                    children: Vec::new(),
                    source: None,
                };
                if tag.self_closing {
                    top(&mut root, &mut stack).children.push(element);
                } else {
                    stack.push(Element {
                        source: Some(tag.source),
                        ..element
                    });
                }
            }
        }
    }

    let open = stack.len();
    rollback(&mut root, &mut stack, open);
    root.children
}

fn top<'a>(root: &'a mut Element, stack: &'a mut [Element]) -> &'a mut Element {
    stack.last_mut().unwrap_or(root)
}

/// Unwinds the innermost `count` open elements into their parents.
fn rollback(root: &mut Element, stack: &mut Vec<Element>, count: usize) {
    for _ in 0..count {
        let Some(frame) = stack.pop() else { break };
        let parent = top(root, stack);
        parent
            .children
            .push(Element::text(frame.source.unwrap_or_default()));
        parent.children.extend(frame.children);
    }
}

fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for caps in TAG_PATTERN.captures_iter(source) {
        let Some(whole) = caps.get(0) else { continue };
        push_text(&mut tokens, &source[cursor..whole.start()]);
        cursor = whole.end();

        let raw = whole.as_str();
        if raw.starts_with("<!--") {
            continue;
        }

        let flag = |i: usize| caps.get(i).is_some_and(|m| !m.as_str().is_empty());
        let name = caps.get(2).map_or("", |m| m.as_str());
        tokens.push(Token::Tag(Tag {
            kind: if name.is_empty() { "template" } else { name }.to_string(),
            closing: flag(1),
            self_closing: flag(4),
            attrs: parse_attrs(caps.get(3).map_or("", |m| m.as_str())),
            source: raw.to_string(),
        }));
    }

    push_text(&mut tokens, &source[cursor..]);
    tokens
}

fn push_text(tokens: &mut Vec<Token>, raw: &str) {
    let text = unescape(raw);
    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }
}

fn parse_attrs(raw: &str) -> Vec<(String, AttrValue)> {
    let mut element = Element::new("template");
    for caps in ATTR_PATTERN.captures_iter(raw) {
        let Some(key) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        if let Some(value) = caps.get(2).or_else(|| caps.get(3)) {
            element.set_attr(key, unescape(value.as_str()));
        } else if let Some(negated) = key.strip_prefix("no-").filter(|k| !k.is_empty()) {
            element.set_attr(negated, false);
        } else {
            element.set_attr(key, true);
        }
    }
    element.attrs
}

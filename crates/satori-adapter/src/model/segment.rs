//! Satori message segments.
//!
//! A segment is a typed view of one top-level markup element. Segments are
//! built from parsed [`Element`]s and render back to markup through
//! [`Display`](std::fmt::Display).
//!
//! # Element mapping
//!
//! | Markup | Segment |
//! |--------|---------|
//! | text | `Text` |
//! | `<at>` | `At` |
//! | `<sharp>` | `Sharp` |
//! | `<a>` / `<link>` | `Link` |
//! | `<img>` / `<image>`, `<audio>`, `<video>`, `<file>` | media variants |
//! | `<b>` `<strong>` `<i>` `<em>` `<u>` `<ins>` `<s>` `<del>` `<spl>` `<code>` `<sup>` `<sub>` `<p>` | `Styled` |
//! | `<br>` / `<newline>` | `Br` |
//! | `<quote>`, `<message>` | `Quote`, `Message` |
//! | `<author>` | `Author` |
//! | anything else | `Text` holding the element's markup |
//!
//! # Example
//!
//! ```rust,ignore
//! use satori_adapter::{MediaSource, Segment};
//!
//! let at = Segment::at("10001000");
//! let img = Segment::image(MediaSource::url("https://example.com/a.png"));
//! assert_eq!(Segment::bold("hi").to_string(), "<b>hi</b>");
//! ```

use std::fmt;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::element::{Element, escape};
use super::message::Message;

// ============================================================================
// Segment data
// ============================================================================

/// Mention data. At least one of the fields is normally present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AtData {
    /// Target user id.
    pub id: Option<String>,
    /// Target user name.
    pub name: Option<String>,
    /// Target role.
    pub role: Option<String>,
    /// Special mention kind, e.g. `all` or `here`.
    pub kind: Option<String>,
}

/// Channel reference data.
#[derive(Debug, Clone, PartialEq)]
pub struct SharpData {
    /// Channel id.
    pub id: String,
    /// Channel name.
    pub name: Option<String>,
}

/// Resource data shared by image, audio, video and file segments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaData {
    /// Resource URL (`http(s)://`, `file://` or `data:`).
    pub src: String,
    /// Whether the platform may use a cached copy.
    pub cache: Option<bool>,
    /// Download timeout in milliseconds.
    pub timeout: Option<String>,
    /// Image width in pixels.
    pub width: Option<u32>,
    /// Image height in pixels.
    pub height: Option<u32>,
}

/// Text decorations. Each renders as its own tag around escaped text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Spoiler,
    Code,
    Superscript,
    Subscript,
    Paragraph,
}

impl Style {
    /// Maps a tag name (including aliases) to a style.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "b" | "strong" => Self::Bold,
            "i" | "em" => Self::Italic,
            "u" | "ins" => Self::Underline,
            "s" | "del" => Self::Strikethrough,
            "spl" => Self::Spoiler,
            "code" => Self::Code,
            "sup" => Self::Superscript,
            "sub" => Self::Subscript,
            "p" => Self::Paragraph,
            _ => return None,
        })
    }

    /// The canonical tag this style renders as.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Bold => "b",
            Self::Italic => "i",
            Self::Underline => "u",
            Self::Strikethrough => "s",
            Self::Spoiler => "spl",
            Self::Code => "code",
            Self::Superscript => "sup",
            Self::Subscript => "sub",
            Self::Paragraph => "p",
        }
    }

    /// The segment kind name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bold => "bold",
            Self::Italic => "italic",
            Self::Underline => "underline",
            Self::Strikethrough => "strikethrough",
            Self::Spoiler => "spoiler",
            Self::Code => "code",
            Self::Superscript => "superscript",
            Self::Subscript => "subscript",
            Self::Paragraph => "paragraph",
        }
    }
}

/// Quote / forwarded message data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderData {
    /// Id of the referenced message.
    pub id: Option<String>,
    /// Whether this is a forwarded message.
    pub forward: bool,
    /// Inline content of the referenced message.
    pub content: Option<Message>,
}

/// Message author data.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorData {
    /// User id.
    pub id: String,
    /// Display name.
    pub nickname: Option<String>,
    /// Avatar URL.
    pub avatar: Option<String>,
}

/// Where a media segment's bytes come from.
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// A URL used verbatim.
    Url(String),
    /// A local file, sent as a `file://` URI.
    Path(PathBuf),
    /// Raw bytes, sent as a `data:` URI.
    Bytes {
        /// The resource bytes.
        data: Vec<u8>,
        /// MIME type, e.g. `image/png`.
        mime: String,
    },
}

impl MediaSource {
    /// A URL source.
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// A local file source.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// An in-memory source.
    pub fn bytes(data: impl Into<Vec<u8>>, mime: impl Into<String>) -> Self {
        Self::Bytes {
            data: data.into(),
            mime: mime.into(),
        }
    }

    /// Converts the source into the `src` attribute value.
    pub fn into_src(self) -> String {
        match self {
            Self::Url(url) => url,
            Self::Path(path) => {
                let path = std::path::absolute(&path).unwrap_or(path);
                let path = path.to_string_lossy().replace('\\', "/");
                if path.starts_with('/') {
                    format!("file://{path}")
                } else {
                    format!("file:///{path}")
                }
            }
            Self::Bytes { data, mime } => {
                format!("data:{mime};base64,{}", STANDARD.encode(data))
            }
        }
    }
}

impl From<&str> for MediaSource {
    fn from(url: &str) -> Self {
        Self::url(url)
    }
}

impl From<String> for MediaSource {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

// ============================================================================
// Segment
// ============================================================================

/// A Satori message segment.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Plain text.
    Text(String),
    /// Mention.
    At(AtData),
    /// Channel reference.
    Sharp(SharpData),
    /// Hyperlink; holds the `href`.
    Link(String),
    /// Image.
    Image(MediaData),
    /// Audio.
    Audio(MediaData),
    /// Video.
    Video(MediaData),
    /// File.
    File(MediaData),
    /// Styled text.
    Styled(Style, String),
    /// Line break.
    Br,
    /// Quoted message.
    Quote(RenderData),
    /// Embedded or forwarded message.
    Message(RenderData),
    /// Author of an embedded message.
    Author(AuthorData),
}

// --------------------------------
// Constructors
// --------------------------------

impl Segment {
    /// Creates a text segment.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Mentions a user by id.
    pub fn at(id: impl Into<String>) -> Self {
        Self::At(AtData {
            id: Some(id.into()),
            ..Default::default()
        })
    }

    /// Mentions a user by id with a display name.
    pub fn at_named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::At(AtData {
            id: Some(id.into()),
            name: Some(name.into()),
            ..Default::default()
        })
    }

    /// Mentions every member of a role.
    pub fn at_role(role: impl Into<String>) -> Self {
        Self::At(AtData {
            role: Some(role.into()),
            ..Default::default()
        })
    }

    /// Special mention such as `all` or `here`.
    pub fn at_type(kind: impl Into<String>) -> Self {
        Self::At(AtData {
            kind: Some(kind.into()),
            ..Default::default()
        })
    }

    /// References a channel.
    pub fn sharp(id: impl Into<String>, name: Option<String>) -> Self {
        Self::Sharp(SharpData {
            id: id.into(),
            name,
        })
    }

    /// Creates a hyperlink.
    pub fn link(href: impl Into<String>) -> Self {
        Self::Link(href.into())
    }

    /// Creates an image.
    pub fn image(source: impl Into<MediaSource>) -> Self {
        Self::Image(MediaData {
            src: source.into().into_src(),
            ..Default::default()
        })
    }

    /// Creates an audio segment.
    pub fn audio(source: impl Into<MediaSource>) -> Self {
        Self::Audio(MediaData {
            src: source.into().into_src(),
            ..Default::default()
        })
    }

    /// Creates a video segment.
    pub fn video(source: impl Into<MediaSource>) -> Self {
        Self::Video(MediaData {
            src: source.into().into_src(),
            ..Default::default()
        })
    }

    /// Creates a file segment.
    pub fn file(source: impl Into<MediaSource>) -> Self {
        Self::File(MediaData {
            src: source.into().into_src(),
            ..Default::default()
        })
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self::Styled(Style::Bold, text.into())
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Self::Styled(Style::Italic, text.into())
    }

    pub fn underline(text: impl Into<String>) -> Self {
        Self::Styled(Style::Underline, text.into())
    }

    pub fn strikethrough(text: impl Into<String>) -> Self {
        Self::Styled(Style::Strikethrough, text.into())
    }

    pub fn spoiler(text: impl Into<String>) -> Self {
        Self::Styled(Style::Spoiler, text.into())
    }

    pub fn code(text: impl Into<String>) -> Self {
        Self::Styled(Style::Code, text.into())
    }

    pub fn superscript(text: impl Into<String>) -> Self {
        Self::Styled(Style::Superscript, text.into())
    }

    pub fn subscript(text: impl Into<String>) -> Self {
        Self::Styled(Style::Subscript, text.into())
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Styled(Style::Paragraph, text.into())
    }

    /// Creates a line break.
    pub fn br() -> Self {
        Self::Br
    }

    /// Quotes (replies to) the message with the given id.
    pub fn quote(id: impl Into<String>) -> Self {
        Self::Quote(RenderData {
            id: Some(id.into()),
            ..Default::default()
        })
    }

    /// Embeds a message, optionally as a forward.
    pub fn message(id: Option<String>, forward: bool, content: Option<Message>) -> Self {
        Self::Message(RenderData {
            id,
            forward,
            content,
        })
    }

    /// Sets the author of an embedded message.
    pub fn author(id: impl Into<String>, nickname: Option<String>, avatar: Option<String>) -> Self {
        Self::Author(AuthorData {
            id: id.into(),
            nickname,
            avatar,
        })
    }
}

// --------------------------------
// Accessors
// --------------------------------

impl Segment {
    /// The segment kind name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::At(_) => "at",
            Self::Sharp(_) => "sharp",
            Self::Link(_) => "link",
            Self::Image(_) => "image",
            Self::Audio(_) => "audio",
            Self::Video(_) => "video",
            Self::File(_) => "file",
            Self::Styled(style, _) => style.name(),
            Self::Br => "br",
            Self::Quote(_) => "quote",
            Self::Message(_) => "message",
            Self::Author(_) => "author",
        }
    }

    /// Whether the segment counts as text for plain-text extraction.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Self::Text(_) | Self::Link(_) | Self::Styled(..) | Self::Br
        )
    }

    /// The content of a plain text segment.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Mutable access to the content of a plain text segment.
    pub fn as_text_mut(&mut self) -> Option<&mut String> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The mention data of an `at` segment.
    pub fn as_at(&self) -> Option<&AtData> {
        match self {
            Self::At(data) => Some(data),
            _ => None,
        }
    }

    /// Whether this is an `at` segment targeting `user_id`.
    pub fn is_at(&self, user_id: &str) -> bool {
        self.as_at()
            .and_then(|at| at.id.as_deref())
            .is_some_and(|id| id == user_id)
    }

    /// The quote data of a `quote` segment.
    pub fn as_quote(&self) -> Option<&RenderData> {
        match self {
            Self::Quote(data) => Some(data),
            _ => None,
        }
    }

    /// One-line human readable form for logs.
    pub fn log(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Link(href) => href.clone(),
            Self::Styled(_, text) => text.clone(),
            Self::Br => "\n".to_string(),
            Self::At(at) => format!(
                "@{}",
                at.name
                    .as_deref()
                    .or(at.id.as_deref())
                    .unwrap_or("Unknown")
            ),
            Self::Image(media) | Self::Audio(media) | Self::Video(media) | Self::File(media) => {
                format!("![{}](src={})", self.kind(), media.src)
            }
            Self::Quote(data) | Self::Message(data) => {
                let mut attrs = Vec::new();
                if let Some(id) = &data.id {
                    attrs.push(format!("id={}", escape(id)));
                }
                if data.forward {
                    attrs.push("forward".to_string());
                }
                match &data.content {
                    None => format!("![{}]({})", self.kind(), attrs.join("|")),
                    Some(content) => {
                        format!(" ![{}]({}){} ", self.kind(), attrs.join("|"), content.log())
                    }
                }
            }
            Self::Author(author) => {
                let mut attrs = Vec::new();
                if let Some(nickname) = &author.nickname {
                    attrs.push(nickname.clone());
                }
                attrs.push(format!("id={}", author.id));
                format!("![author]({})", attrs.join("|"))
            }
            Self::Sharp(_) => format!("[{}]", self.kind()),
        }
    }
}

// ============================================================================
// Element conversion
// ============================================================================

fn optional_attr(element: &Element, key: &str) -> Option<String> {
    element.attr_str(key).map(str::to_string)
}

impl MediaData {
    fn from_element(element: &Element) -> Self {
        Self {
            src: element
                .attr_str("src")
                .or_else(|| element.attr_str("url"))
                .unwrap_or_default()
                .to_string(),
            cache: element.attr_bool("cache"),
            timeout: optional_attr(element, "timeout"),
            width: element.attr_str("width").and_then(|w| w.parse().ok()),
            height: element.attr_str("height").and_then(|h| h.parse().ok()),
        }
    }

    fn to_element(&self, tag: &str) -> Element {
        let mut element = Element::new(tag).with_attr("src", self.src.as_str());
        if let Some(cache) = self.cache {
            element.set_attr("cache", cache);
        }
        if let Some(timeout) = &self.timeout {
            element.set_attr("timeout", timeout.as_str());
        }
        if let Some(width) = self.width {
            element.set_attr("width", width.to_string());
        }
        if let Some(height) = self.height {
            element.set_attr("height", height.to_string());
        }
        element
    }
}

impl RenderData {
    fn from_element(element: &Element) -> Self {
        let children = element.children();
        Self {
            id: optional_attr(element, "id"),
            forward: element.attr_bool("forward").unwrap_or(false),
            content: (!children.is_empty()).then(|| Message::from_elements(children)),
        }
    }

    fn to_element(&self, tag: &str) -> Element {
        let mut element = Element::new(tag);
        if let Some(id) = &self.id {
            element.set_attr("id", id.as_str());
        }
        if self.forward {
            element.set_attr("forward", true);
        }
        if let Some(content) = &self.content {
            element
                .children_mut()
                .extend(content.iter().map(Segment::to_element));
        }
        element
    }
}

impl Segment {
    /// Converts a parsed element into a segment.
    pub fn from_element(element: &Element) -> Self {
        match element.kind() {
            "text" => Self::Text(element.attr_str("text").unwrap_or_default().to_string()),
            "at" => Self::At(AtData {
                id: optional_attr(element, "id"),
                name: optional_attr(element, "name"),
                role: optional_attr(element, "role"),
                kind: optional_attr(element, "type"),
            }),
            "sharp" => Self::Sharp(SharpData {
                id: element.attr_str("id").unwrap_or_default().to_string(),
                name: optional_attr(element, "name"),
            }),
            "a" | "link" => Self::Link(element.attr_str("href").unwrap_or_default().to_string()),
            "img" | "image" => Self::Image(MediaData::from_element(element)),
            "audio" => Self::Audio(MediaData::from_element(element)),
            "video" => Self::Video(MediaData::from_element(element)),
            "file" => Self::File(MediaData::from_element(element)),
            "br" | "newline" => Self::Br,
            "quote" => Self::Quote(RenderData::from_element(element)),
            "message" => Self::Message(RenderData::from_element(element)),
            "author" => Self::Author(AuthorData {
                id: element.attr_str("id").unwrap_or_default().to_string(),
                nickname: optional_attr(element, "nickname"),
                avatar: optional_attr(element, "avatar"),
            }),
            tag => match Style::from_tag(tag) {
                Some(style) => Self::Styled(style, element.text_content()),
                None => Self::Text(element.to_string()),
            },
        }
    }

    /// Converts the segment into its markup element.
    pub fn to_element(&self) -> Element {
        match self {
            Self::Text(text) => Element::text(text.as_str()),
            Self::At(at) => {
                let mut element = Element::new("at");
                for (key, value) in [
                    ("id", &at.id),
                    ("name", &at.name),
                    ("role", &at.role),
                    ("type", &at.kind),
                ] {
                    if let Some(value) = value {
                        element.set_attr(key, value.as_str());
                    }
                }
                element
            }
            Self::Sharp(sharp) => {
                let mut element = Element::new("sharp").with_attr("id", sharp.id.as_str());
                if let Some(name) = &sharp.name {
                    element.set_attr("name", name.as_str());
                }
                element
            }
            Self::Link(href) => Element::new("a").with_attr("href", href.as_str()),
            Self::Image(media) => media.to_element("img"),
            Self::Audio(media) => media.to_element("audio"),
            Self::Video(media) => media.to_element("video"),
            Self::File(media) => media.to_element("file"),
            Self::Styled(style, text) => {
                Element::new(style.tag()).with_child(Element::text(text.as_str()))
            }
            Self::Br => Element::new("br"),
            Self::Quote(data) => data.to_element("quote"),
            Self::Message(data) => data.to_element("message"),
            Self::Author(author) => {
                let mut element = Element::new("author").with_attr("id", author.id.as_str());
                if let Some(nickname) = &author.nickname {
                    element.set_attr("nickname", nickname.as_str());
                }
                if let Some(avatar) = &author.avatar {
                    element.set_attr("avatar", avatar.as_str());
                }
                element
            }
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_element().fmt(f)
    }
}

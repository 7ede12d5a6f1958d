//! Plugin handlers and their filters.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use satori_adapter::{Event, SatoriBot, Segment};

/// Type-erased handler function.
pub type HandlerFn =
    Arc<dyn Fn(Arc<SatoriBot>, Event) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// One function of a plugin.
///
/// ```rust,ignore
/// let echo = Handler::new("echo", |bot, event| async move {
///     let message = event.message()?.clone();
///     bot.send(&event, message, SendOptions::default()).await?;
///     Ok(())
/// })
/// .desc("重复所发送的内容。")
/// .command("/echo ");
/// ```
#[derive(Clone)]
pub struct Handler {
    ident: String,
    inner_name: String,
    name: String,
    desc: String,
    help_doc: String,
    command: Option<String>,
    to_me: bool,
    func: HandlerFn,
}

impl Handler {
    /// Creates a handler identified by `ident` within its plugin.
    ///
    /// The display name defaults to `ident`, the description to the name and
    /// the help text to `[name]`.
    pub fn new<F, Fut>(ident: impl Into<String>, func: F) -> Self
    where
        F: Fn(Arc<SatoriBot>, Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let ident = ident.into();
        Self {
            inner_name: ident.clone(),
            name: ident.clone(),
            desc: ident.clone(),
            help_doc: format!("[{ident}]"),
            ident,
            command: None,
            to_me: false,
            func: Arc::new(move |bot, event| Box::pin(func(bot, event))),
        }
    }

    /// Sets the display name; description and help follow unless set.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if self.desc == self.name {
            self.desc = name.clone();
        }
        if self.help_doc == format!("[{}]", self.name) {
            self.help_doc = format!("[{name}]");
        }
        self.name = name;
        self
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    /// Text shown by `/help {name}`.
    pub fn help(mut self, help_doc: impl Into<String>) -> Self {
        self.help_doc = help_doc.into();
        self
    }

    /// Only run for messages starting with `command`; the prefix is stripped.
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into()).filter(|c| !c.is_empty());
        self
    }

    /// Only run for messages addressed to the bot.
    pub fn to_me(mut self) -> Self {
        self.to_me = true;
        self
    }

    pub(crate) fn qualify(mut self, package_name: &str) -> Self {
        self.inner_name = format!("{package_name}.{}", self.ident);
        self
    }

    /// Identifier within the plugin.
    pub fn ident(&self) -> &str {
        &self.ident
    }

    /// Globally unique `package.ident` name, used for bans.
    pub fn inner_name(&self) -> &str {
        &self.inner_name
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.desc
    }

    pub fn help_doc(&self) -> &str {
        &self.help_doc
    }

    /// Whether `name` refers to this handler (display name or ident).
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.name.to_lowercase() == name || self.ident.to_lowercase() == name
    }

    /// Answer to `/help {query}` if the query names this handler.
    pub fn help_reply(&self, query: &str) -> Option<String> {
        (query == self.name || query == self.ident)
            .then(|| format!("[{}]\n{}", self.name, self.help_doc))
    }

    /// Applies the filters and returns the event this handler should see.
    ///
    /// Non-message events only reach handlers without filters. For command
    /// handlers the command prefix is stripped from a copy of the event.
    pub fn prepare(&self, event: &Event) -> Option<Event> {
        if !event.is_message() {
            return (!self.to_me && self.command.is_none()).then(|| event.clone());
        }
        if self.to_me && !event.is_to_me() {
            return None;
        }
        let Some(command) = &self.command else {
            return Some(event.clone());
        };

        let rest = event
            .message()
            .ok()?
            .first_text()?
            .strip_prefix(command.as_str())?
            .trim()
            .to_string();

        let mut event = event.clone();
        let message = event.message_mut().ok()?;
        if rest.is_empty() {
            message.remove(0);
        } else if let Some(Segment::Text(text)) = message.get_mut(0) {
            *text = rest;
        }
        Some(event)
    }

    pub(crate) fn call(
        &self,
        bot: Arc<SatoriBot>,
        event: Event,
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        (self.func)(bot, event)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("inner_name", &self.inner_name)
            .field("name", &self.name)
            .field("command", &self.command)
            .field("to_me", &self.to_me)
            .finish()
    }
}

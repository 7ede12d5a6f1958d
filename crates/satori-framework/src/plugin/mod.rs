//! Plugins: named groups of handlers.
//!
//! Plugins are plain values registered on the
//! [`Dispatcher`](crate::dispatcher::Dispatcher) at startup:
//!
//! ```rust,ignore
//! let plugin = Plugin::new("echo", "plugin_echo")
//!     .doc("重复所发送的内容")
//!     .handler(echo_handler);
//! let dispatcher = Dispatcher::builder().data_dir("data").plugin(plugin).build();
//! ```

mod handler;

pub use handler::{Handler, HandlerFn};

/// A named set of handlers.
#[derive(Debug, Clone)]
pub struct Plugin {
    name: String,
    doc: String,
    package_name: String,
    handlers: Vec<Handler>,
}

impl Plugin {
    /// Creates a plugin. `package_name` is the stable key used by bans.
    pub fn new(name: impl Into<String>, package_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: String::new(),
            package_name: package_name.into(),
            handlers: Vec::new(),
        }
    }

    /// Sets the description shown by `/help`.
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Adds a handler. A second handler with the same ident is ignored.
    pub fn handler(mut self, handler: Handler) -> Self {
        let handler = handler.qualify(&self.package_name);
        if !self
            .handlers
            .iter()
            .any(|h| h.inner_name() == handler.inner_name())
        {
            self.handlers.push(handler);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.doc
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    /// Whether `name` refers to this plugin (name or package, any case).
    pub fn matches(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
            || self.package_name.to_lowercase() == name.to_lowercase()
    }
}

/// The registered plugins, in registration order.
#[derive(Debug, Clone, Default)]
pub struct PluginSet {
    plugins: Vec<Plugin>,
}

impl PluginSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, plugin: Plugin) {
        self.plugins.push(plugin);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Plugin> {
        self.plugins.iter()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn find_plugin(&self, name: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.matches(name))
    }

    pub fn find_handler(&self, name: &str) -> Option<&Handler> {
        self.plugins
            .iter()
            .flat_map(|p| p.handlers.iter())
            .find(|h| h.matches(name))
    }
}

impl<'a> IntoIterator for &'a PluginSet {
    type Item = &'a Plugin;
    type IntoIter = std::slice::Iter<'a, Plugin>;

    fn into_iter(self) -> Self::IntoIter {
        self.plugins.iter()
    }
}

//! Ban list over `ban_info.json`.
//!
//! Platforms, users and guilds can be banned globally; plugins and single
//! handlers are banned per guild. Every mutating operation returns the reply
//! text sent back to the operator (`<√>` success, `<!>` no-op, `<×>` failure).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FrameworkResult;
use crate::plugin::PluginSet;
use crate::store::JsonFile;

/// File name of the ban list inside the data directory.
pub const BAN_FILE: &str = "ban_info.json";

/// Contents of `ban_info.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BanInfo {
    pub platform: Vec<String>,
    pub user: Vec<String>,
    pub guild: Vec<String>,
    /// Guild id to banned plugin package names.
    pub plugin: BTreeMap<String, Vec<String>>,
    /// Guild id to banned handler inner names.
    pub function: BTreeMap<String, Vec<String>>,
}

impl BanInfo {
    pub fn plugins_in(&self, guild: &str) -> &[String] {
        self.plugin.get(guild).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn functions_in(&self, guild: &str) -> &[String] {
        self.function.get(guild).map(Vec::as_slice).unwrap_or_default()
    }

    fn targets(&self, target: BanTarget) -> &Vec<String> {
        match target {
            BanTarget::Platform => &self.platform,
            BanTarget::User => &self.user,
            BanTarget::Guild => &self.guild,
        }
    }

    fn targets_mut(&mut self, target: BanTarget) -> &mut Vec<String> {
        match target {
            BanTarget::Platform => &mut self.platform,
            BanTarget::User => &mut self.user,
            BanTarget::Guild => &mut self.guild,
        }
    }
}

/// A globally bannable kind of target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanTarget {
    Platform,
    User,
    Guild,
}

impl BanTarget {
    pub fn label(self) -> &'static str {
        match self {
            Self::Platform => "平台",
            Self::User => "用户",
            Self::Guild => "群组",
        }
    }

    /// Users and guilds are numeric ids.
    fn accepts(self, target: &str) -> bool {
        match self {
            Self::Platform => true,
            Self::User | Self::Guild => is_digits(target),
        }
    }
}

pub(crate) fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Store of [`BanInfo`].
#[derive(Debug)]
pub struct BanStore {
    file: JsonFile<BanInfo>,
}

impl BanStore {
    /// Opens `ban_info.json` inside `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        Self {
            file: JsonFile::new(data_dir.as_ref().join(BAN_FILE)),
        }
    }

    pub async fn info(&self) -> FrameworkResult<BanInfo> {
        self.file.read().await
    }

    pub async fn is_target_banned(&self, target: BanTarget, id: &str) -> FrameworkResult<bool> {
        Ok(self.info().await?.targets(target).iter().any(|t| t == id))
    }

    pub async fn is_plugin_banned(
        &self,
        guild: &str,
        package_name: &str,
    ) -> FrameworkResult<bool> {
        Ok(self
            .info()
            .await?
            .plugins_in(guild)
            .iter()
            .any(|p| p == package_name))
    }

    pub async fn is_function_banned(
        &self,
        guild: &str,
        inner_name: &str,
    ) -> FrameworkResult<bool> {
        Ok(self
            .info()
            .await?
            .functions_in(guild)
            .iter()
            .any(|f| f == inner_name))
    }

    /// Bans a platform, user or guild.
    pub async fn ban_target(&self, target: BanTarget, id: &str) -> String {
        let label = target.label();
        let result = self
            .file
            .update(|info| {
                let list = info.targets_mut(target);
                if list.iter().any(|t| t == id) {
                    return Some(format!("<×> {label} {id} 已经被屏蔽。"));
                }
                if !target.accepts(id) {
                    return Some(format!("<×> {id} 不是一个合法的{label}。"));
                }
                list.push(id.to_string());
                None
            })
            .await;
        match result {
            Ok(Some(reply)) => reply,
            Ok(None) => format!("<√> {label} {id} 已屏蔽。"),
            Err(e) => format!("<×> 屏蔽{label} {id} 时出现错误：\n{e}"),
        }
    }

    /// Lifts a platform, user or guild ban.
    pub async fn unban_target(&self, target: BanTarget, id: &str) -> String {
        let label = target.label();
        let result = self
            .file
            .update(|info| {
                let list = info.targets_mut(target);
                let Some(index) = list.iter().position(|t| t == id) else {
                    return Some(format!("<×> {label} {id} 未被屏蔽。"));
                };
                if !target.accepts(id) {
                    return Some(format!("<×> {id} 不是一个合法的{label}。"));
                }
                list.remove(index);
                None
            })
            .await;
        match result {
            Ok(Some(reply)) => reply,
            Ok(None) => format!("<√> 已解除{label} {id} 的屏蔽。"),
            Err(e) => format!("<×> 解除{label} {id} 的屏蔽时出现错误：\n{e}"),
        }
    }

    /// Bans a plugin, or failing that a handler, in one guild.
    pub async fn ban(&self, plugins: &PluginSet, guild: &str, name: &str) -> String {
        if let Some(plugin) = plugins.find_plugin(name) {
            let package = plugin.package_name();
            let result = self
                .file
                .update(|info| {
                    insert_unique(info.plugin.entry(guild.to_string()).or_default(), package)
                })
                .await;
            return match result {
                Ok(true) => format!("<√> 插件 {} 已被屏蔽。", plugin.name()),
                Ok(false) => format!("<!> 插件 {} 已在该群被屏蔽。", plugin.name()),
                Err(e) => format!("<×> 插件 {} 屏蔽失败：\n{e}", plugin.name()),
            };
        }
        if let Some(handler) = plugins.find_handler(name) {
            let inner = handler.inner_name();
            let result = self
                .file
                .update(|info| {
                    insert_unique(info.function.entry(guild.to_string()).or_default(), inner)
                })
                .await;
            return match result {
                Ok(true) => format!("<√> 功能 {} 已被屏蔽。", handler.display_name()),
                Ok(false) => format!("<!> 功能 {} 已在该群被屏蔽。", handler.display_name()),
                Err(e) => format!("<×> 功能 {} 屏蔽失败：\n{e}", handler.display_name()),
            };
        }
        format!("<×> 插件或功能 {name} 未找到。")
    }

    /// Lifts a plugin or handler ban in one guild.
    pub async fn unban(&self, plugins: &PluginSet, guild: &str, name: &str) -> String {
        if let Some(plugin) = plugins.find_plugin(name) {
            let package = plugin.package_name();
            let result = self
                .file
                .update(|info| remove_entry(info.plugin.get_mut(guild), package))
                .await;
            return match result {
                Ok(true) => format!("<√> 已解除插件 {} 的屏蔽。", plugin.name()),
                Ok(false) => format!("<!> 插件 {} 未在该群被屏蔽。", plugin.name()),
                Err(e) => format!("<×> 插件 {} 屏蔽解除失败：\n{e}", plugin.name()),
            };
        }
        if let Some(handler) = plugins.find_handler(name) {
            let inner = handler.inner_name();
            let result = self
                .file
                .update(|info| remove_entry(info.function.get_mut(guild), inner))
                .await;
            return match result {
                Ok(true) => format!("<√> 已解除功能 {} 的屏蔽。", handler.display_name()),
                Ok(false) => format!("<!> 功能 {} 未在该群被屏蔽。", handler.display_name()),
                Err(e) => format!("<×> 功能 {} 屏蔽解除失败：\n{e}", handler.display_name()),
            };
        }
        format!("<×> 插件或功能 {name} 未找到。")
    }
}

fn insert_unique(list: &mut Vec<String>, value: &str) -> bool {
    if list.iter().any(|v| v == value) {
        return false;
    }
    list.push(value.to_string());
    true
}

fn remove_entry(list: Option<&mut Vec<String>>, value: &str) -> bool {
    let Some(list) = list else {
        return false;
    };
    match list.iter().position(|v| v == value) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{Handler, Plugin};

    fn plugins() -> PluginSet {
        let mut set = PluginSet::new();
        set.add(
            Plugin::new("计时器", "plugin_timer")
                .handler(Handler::new("timer", |_, _| async { Ok(()) }).name("创建计时器")),
        );
        set
    }

    #[tokio::test]
    async fn test_target_ban_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = BanStore::open(dir.path());

        assert_eq!(
            store.ban_target(BanTarget::User, "123").await,
            "<√> 用户 123 已屏蔽。"
        );
        assert_eq!(
            store.ban_target(BanTarget::User, "123").await,
            "<×> 用户 123 已经被屏蔽。"
        );
        assert!(store.is_target_banned(BanTarget::User, "123").await.unwrap());

        assert_eq!(
            store.unban_target(BanTarget::User, "123").await,
            "<√> 已解除用户 123 的屏蔽。"
        );
        assert_eq!(
            store.unban_target(BanTarget::User, "123").await,
            "<×> 用户 123 未被屏蔽。"
        );
    }

    #[tokio::test]
    async fn test_non_numeric_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = BanStore::open(dir.path());

        assert_eq!(
            store.ban_target(BanTarget::Guild, "abc").await,
            "<×> abc 不是一个合法的群组。"
        );
        assert_eq!(
            store.ban_target(BanTarget::Platform, "qq").await,
            "<√> 平台 qq 已屏蔽。"
        );
        assert!(store.info().await.unwrap().guild.is_empty());
    }

    #[tokio::test]
    async fn test_plugin_and_function_bans() {
        let dir = tempfile::tempdir().unwrap();
        let store = BanStore::open(dir.path());
        let plugins = plugins();

        assert_eq!(
            store.ban(&plugins, "g1", "plugin_timer").await,
            "<√> 插件 计时器 已被屏蔽。"
        );
        assert_eq!(
            store.ban(&plugins, "g1", "计时器").await,
            "<!> 插件 计时器 已在该群被屏蔽。"
        );
        assert!(store.is_plugin_banned("g1", "plugin_timer").await.unwrap());
        assert!(!store.is_plugin_banned("g2", "plugin_timer").await.unwrap());

        assert_eq!(
            store.ban(&plugins, "g1", "timer").await,
            "<√> 功能 创建计时器 已被屏蔽。"
        );
        assert!(
            store
                .is_function_banned("g1", "plugin_timer.timer")
                .await
                .unwrap()
        );

        assert_eq!(
            store.unban(&plugins, "g2", "计时器").await,
            "<!> 插件 计时器 未在该群被屏蔽。"
        );
        assert_eq!(
            store.unban(&plugins, "g1", "计时器").await,
            "<√> 已解除插件 计时器 的屏蔽。"
        );
        assert_eq!(
            store.ban(&plugins, "g1", "nothing").await,
            "<×> 插件或功能 nothing 未找到。"
        );
    }

    #[tokio::test]
    async fn test_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = BanStore::open(dir.path());
        store.ban_target(BanTarget::Platform, "kook").await;

        let raw = std::fs::read_to_string(dir.path().join(BAN_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["platform"][0], "kook");
        assert!(value["plugin"].is_object());
        assert!(value["function"].is_object());
    }
}

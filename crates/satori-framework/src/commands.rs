//! Built-in `/admin`, `/deadmin`, `/ban`, `/unban` and `/help` commands.
//!
//! The command parsers only compute the reply text; the dispatcher checks
//! permissions and sends it.

use satori_adapter::{Event, Message, Segment};

use crate::admin::AdminStore;
use crate::ban::{BanInfo, BanStore, BanTarget, is_digits};
use crate::plugin::{Plugin, PluginSet};

/// Last line of every `/help` reply.
pub const HELP_FOOTER: &str = "\n发送 /help + 名称 获取对应帮助。";

/// Strips `prefix` from a command of at most two segments.
///
/// A trailing blank text segment is ignored. Returns the remaining
/// arguments, or `None` when the message is not this command or has no
/// arguments.
fn command_args(message: &Message, prefix: &str) -> Option<Vec<Segment>> {
    let mut segments = message.segments().to_vec();
    if segments
        .last()
        .and_then(Segment::as_text)
        .is_some_and(|text| text.trim().is_empty())
    {
        segments.pop();
    }
    if segments.len() > 2 {
        return None;
    }

    let rest = segments
        .first()?
        .as_text()?
        .strip_prefix(prefix)?
        .trim()
        .to_string();
    if rest.is_empty() {
        segments.remove(0);
    } else {
        segments[0] = Segment::text(rest);
    }
    (!segments.is_empty()).then_some(segments)
}

fn mentioned_id(segment: &Segment) -> Option<&str> {
    segment
        .as_at()
        .and_then(|at| at.id.as_deref())
        .filter(|id| is_digits(id))
}

// ============================================================================
// Admin
// ============================================================================

/// Runs `/admin show|ID|@user` or `/deadmin ID|@user`.
pub(crate) async fn admin_command(store: &AdminStore, event: &Event) -> Option<String> {
    let message = event.message().ok()?;

    if let Some(args) = command_args(message, "/admin ") {
        return match args.as_slice() {
            [Segment::Text(text)] if text == "show" => Some(show_admins(store).await),
            [Segment::Text(id)] if is_digits(id) => Some(store.add(id).await),
            [segment] => match mentioned_id(segment) {
                Some(id) => Some(store.add(id).await),
                None => None,
            },
            _ => None,
        };
    }

    if let Some(args) = command_args(message, "/deadmin ") {
        return match args.as_slice() {
            [Segment::Text(id)] if is_digits(id) => Some(store.remove(id).await),
            [segment] => match mentioned_id(segment) {
                Some(id) => Some(store.remove(id).await),
                None => None,
            },
            _ => None,
        };
    }

    None
}

async fn show_admins(store: &AdminStore) -> String {
    match store.list().await {
        Ok(admins) if admins.is_empty() => "<!> Bot 没有管理员。".to_string(),
        Ok(admins) => {
            let mut reply = "<!> 拥有管理员权限的用户有：".to_string();
            for admin in admins {
                reply.push('\n');
                reply.push_str(&admin);
            }
            reply
        }
        Err(e) => format!("<×> 读取管理员列表失败：\n{e}"),
    }
}

// ============================================================================
// Ban
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BanAction {
    Ban,
    Unban,
}

impl BanAction {
    async fn target(self, store: &BanStore, target: BanTarget, id: &str) -> String {
        match self {
            Self::Ban => store.ban_target(target, id).await,
            Self::Unban => store.unban_target(target, id).await,
        }
    }

    async fn named(
        self,
        store: &BanStore,
        plugins: &PluginSet,
        guild: &str,
        name: &str,
    ) -> String {
        match self {
            Self::Ban => store.ban(plugins, guild, name).await,
            Self::Unban => store.unban(plugins, guild, name).await,
        }
    }

    fn missing_platform(self) -> &'static str {
        match self {
            Self::Ban => "<×> 请输入要屏蔽的平台。",
            Self::Unban => "<×> 请输入要解除屏蔽的平台。",
        }
    }
}

/// Runs `/ban ARGS` or `/unban ARGS`.
///
/// Arguments: `p` / `g` (this platform / guild), `p NAME`, `g ID`, `u ID`,
/// a bare numeric user id, `@user`, `u @user`, or a plugin or handler name
/// (banned in this guild). `/ban show [u] [g] [p] [f]` lists the bans.
pub(crate) async fn ban_command(
    store: &BanStore,
    plugins: &PluginSet,
    event: &Event,
) -> Option<String> {
    let message = event.message().ok()?;

    let (action, args) = if let Some(args) = command_args(message, "/ban ") {
        (BanAction::Ban, args)
    } else {
        (BanAction::Unban, command_args(message, "/unban ")?)
    };

    match args.as_slice() {
        [Segment::Text(item)] if action == BanAction::Ban && item.starts_with("show") => {
            Some(show_bans(store, event, item).await)
        }
        [Segment::Text(item)] => apply_item(store, plugins, event, action, item.trim()).await,
        [segment] => match mentioned_id(segment) {
            Some(id) => Some(action.target(store, BanTarget::User, id).await),
            None => None,
        },
        [Segment::Text(flag), Segment::At(at)] if matches!(flag.trim(), "u" | "U") => {
            let id = at.id.as_deref()?;
            Some(action.target(store, BanTarget::User, id).await)
        }
        _ => None,
    }
}

fn flag_value<'a>(item: &'a str, flag: char) -> Option<&'a str> {
    let upper = flag.to_ascii_uppercase();
    let mut chars = item.chars();
    let first = chars.next()?;
    ((first == flag || first == upper) && chars.next() == Some(' '))
        .then(|| item[2..].trim())
}

async fn apply_item(
    store: &BanStore,
    plugins: &PluginSet,
    event: &Event,
    action: BanAction,
    item: &str,
) -> Option<String> {
    let reply = match item {
        "p" | "P" => action.target(store, BanTarget::Platform, &event.platform).await,
        "g" | "G" => match event.guild_id() {
            Ok(guild) => action.target(store, BanTarget::Guild, guild).await,
            Err(e) => format!("<×> 获取群组信息失败: {e}"),
        },
        _ => {
            if let Some(platform) = flag_value(item, 'p') {
                if platform.is_empty() {
                    action.missing_platform().to_string()
                } else {
                    action.target(store, BanTarget::Platform, platform).await
                }
            } else if let Some(guild) = flag_value(item, 'g') {
                action.target(store, BanTarget::Guild, guild).await
            } else if let Some(user) = flag_value(item, 'u') {
                action.target(store, BanTarget::User, user).await
            } else if is_digits(item) {
                action.target(store, BanTarget::User, item).await
            } else {
                let guild = event.guild_id().ok()?;
                action.named(store, plugins, guild, item).await
            }
        }
    };
    Some(reply)
}

fn push_section(reply: &mut String, title: &str, items: &[String]) {
    reply.push('\n');
    reply.push_str(title);
    reply.push('\n');
    reply.push_str(&items.join("\n"));
}

fn push_optional(reply: &mut String, title: &str, empty: &str, items: &[String]) {
    if items.is_empty() {
        reply.push('\n');
        reply.push_str(empty);
        reply.push('\n');
    } else {
        push_section(reply, title, items);
    }
}

async fn show_bans(store: &BanStore, event: &Event, shows: &str) -> String {
    let info: BanInfo = match store.info().await {
        Ok(info) => info,
        Err(e) => return format!("<×> 读取屏蔽信息失败：\n{e}"),
    };
    let guild = event.guild_id().ok();
    let mut reply = String::new();

    if shows["show".len()..].trim().is_empty() {
        if !info.platform.is_empty() {
            push_section(&mut reply, "屏蔽的平台有：", &info.platform);
        }
        if !info.guild.is_empty() {
            push_section(&mut reply, "屏蔽的群组有：", &info.guild);
        }
        if !info.user.is_empty() {
            push_section(&mut reply, "屏蔽的用户有：", &info.user);
        }
        if let Some(plugins) = guild.map(|g| info.plugins_in(g)).filter(|p| !p.is_empty()) {
            push_section(&mut reply, "本群屏蔽的插件有：", plugins);
        }
        if reply.is_empty() {
            return "<!> 当前没有屏蔽设置。".to_string();
        }
    } else {
        for option in shows.split(' ') {
            match option {
                "u" | "U" => push_optional(
                    &mut reply,
                    "屏蔽的用户有：",
                    "当前无屏蔽的用户。",
                    &info.user,
                ),
                "g" | "G" => push_optional(
                    &mut reply,
                    "屏蔽的群组有：",
                    "当前无屏蔽的群组。",
                    &info.guild,
                ),
                "p" | "P" => push_optional(
                    &mut reply,
                    "屏蔽的平台有：",
                    "当前无屏蔽的平台。",
                    &info.platform,
                ),
                "f" | "F" => {
                    if let Some(guild) = guild {
                        push_optional(
                            &mut reply,
                            "本群屏蔽的插件有：",
                            "本群无屏蔽的插件。",
                            info.plugins_in(guild),
                        );
                    }
                }
                _ => {}
            }
        }
    }
    format!("<i> {}", reply.trim())
}

// ============================================================================
// Help
// ============================================================================

/// `/help`: every plugin, marking those banned in this guild.
pub(crate) fn help_overview(plugins: &PluginSet, banned: &[String]) -> String {
    let mut reply = "Bot 可用的插件有：".to_string();
    for plugin in plugins {
        reply.push_str("\n>> ");
        if banned.iter().any(|p| p == plugin.package_name()) {
            reply.push_str("[BANNED] ");
        }
        reply.push_str(&format!("{}: {}", plugin.name(), plugin.description()));
    }
    reply.push_str(HELP_FOOTER);
    reply
}

/// `/help PLUGIN`: the plugin doc and its functions.
pub(crate) fn help_plugin(plugin: &Plugin) -> String {
    let mut reply = format!("[{}]\n{}", plugin.name(), plugin.description());
    for handler in plugin.handlers() {
        reply.push_str(&format!(
            "\n>> {}: {}",
            handler.display_name(),
            handler.description()
        ));
    }
    reply.push_str(HELP_FOOTER);
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Handler;
    use crate::testing::message_event;

    fn plugins() -> PluginSet {
        let mut set = PluginSet::new();
        set.add(
            Plugin::new("回声", "plugin_echo")
                .doc("重复所发送的内容")
                .handler(
                    Handler::new("echo", |_, _| async { Ok(()) }).desc("重复所发送的内容。"),
                ),
        );
        set.add(Plugin::new("计时器", "plugin_timer").doc("计时器功能"));
        set
    }

    #[test]
    fn test_command_args() {
        let message = Message::parse("/ban u <at id=\"123\"/> ");
        let args = command_args(&message, "/ban ").unwrap();
        assert_eq!(args, vec![Segment::text("u"), Segment::at("123")]);

        assert!(command_args(&Message::parse("/ban "), "/ban ").is_none());
        assert!(command_args(&Message::parse("/unban 1"), "/ban ").is_none());
        assert!(command_args(&Message::parse("/ban a<b>b</b>c"), "/ban ").is_none());
    }

    #[test]
    fn test_flag_value() {
        assert_eq!(flag_value("p kook", 'p'), Some("kook"));
        assert_eq!(flag_value("G 123", 'g'), Some("123"));
        assert_eq!(flag_value("plugin", 'p'), None);
        assert_eq!(flag_value("p", 'p'), None);
    }

    #[tokio::test]
    async fn test_admin_commands() {
        let dir = tempfile::tempdir().unwrap();
        let store = AdminStore::open(dir.path());

        let show = message_event("/admin show", "owner");
        assert_eq!(
            admin_command(&store, &show).await.as_deref(),
            Some("<!> Bot 没有管理员。")
        );

        let add = message_event("/admin <at id=\"42\"/>", "owner");
        assert_eq!(
            admin_command(&store, &add).await.as_deref(),
            Some("<√> 已将用户 42 设置为管理员。")
        );
        assert_eq!(
            admin_command(&store, &show).await.as_deref(),
            Some("<!> 拥有管理员权限的用户有：\n42")
        );

        let remove = message_event("/deadmin 42", "owner");
        assert_eq!(
            admin_command(&store, &remove).await.as_deref(),
            Some("<√> 已将用户 42 管理员权限移除。")
        );

        let invalid = message_event("/admin someone", "owner");
        assert!(admin_command(&store, &invalid).await.is_none());
    }

    #[tokio::test]
    async fn test_ban_targets() {
        let dir = tempfile::tempdir().unwrap();
        let store = BanStore::open(dir.path());
        let plugins = plugins();

        let reply = |text: &str| message_event(text, "owner");
        assert_eq!(
            ban_command(&store, &plugins, &reply("/ban p")).await.as_deref(),
            Some("<√> 平台 discord 已屏蔽。")
        );
        assert_eq!(
            ban_command(&store, &plugins, &reply("/ban 10086")).await.as_deref(),
            Some("<√> 用户 10086 已屏蔽。")
        );
        assert_eq!(
            ban_command(&store, &plugins, &reply("/ban u <at id=\"7\"/>"))
                .await
                .as_deref(),
            Some("<√> 用户 7 已屏蔽。")
        );
        assert_eq!(
            ban_command(&store, &plugins, &reply("/ban g")).await.as_deref(),
            Some("<×> c1 不是一个合法的群组。")
        );
        assert_eq!(
            ban_command(&store, &plugins, &reply("/unban p discord")).await.as_deref(),
            Some("<√> 已解除平台 discord 的屏蔽。")
        );

        let info = store.info().await.unwrap();
        assert!(info.platform.is_empty());
        assert_eq!(info.user, vec!["10086".to_string(), "7".to_string()]);
    }

    #[tokio::test]
    async fn test_ban_plugin_in_channel() {
        let dir = tempfile::tempdir().unwrap();
        let store = BanStore::open(dir.path());
        let plugins = plugins();

        let event = message_event("/ban 回声", "owner");
        assert_eq!(
            ban_command(&store, &plugins, &event).await.as_deref(),
            Some("<√> 插件 回声 已被屏蔽。")
        );
        assert!(store.is_plugin_banned("c1", "plugin_echo").await.unwrap());

        let show = message_event("/ban show", "owner");
        assert_eq!(
            ban_command(&store, &plugins, &show).await.as_deref(),
            Some("<i> 本群屏蔽的插件有：\nplugin_echo")
        );

        let show_users = message_event("/ban show u f", "owner");
        assert_eq!(
            ban_command(&store, &plugins, &show_users).await.as_deref(),
            Some("<i> 当前无屏蔽的用户。\n\n本群屏蔽的插件有：\nplugin_echo")
        );
    }

    #[tokio::test]
    async fn test_show_without_bans() {
        let dir = tempfile::tempdir().unwrap();
        let store = BanStore::open(dir.path());
        let event = message_event("/ban show", "owner");
        assert_eq!(
            ban_command(&store, &plugins(), &event).await.as_deref(),
            Some("<!> 当前没有屏蔽设置。")
        );
    }

    #[test]
    fn test_help_texts() {
        let plugins = plugins();
        assert_eq!(
            help_overview(&plugins, &["plugin_timer".to_string()]),
            "Bot 可用的插件有：\n>> 回声: 重复所发送的内容\n>> [BANNED] 计时器: 计时器功能\n发送 /help + 名称 获取对应帮助。"
        );
        assert_eq!(
            help_plugin(plugins.find_plugin("回声").unwrap()),
            "[回声]\n重复所发送的内容\n>> echo: 重复所发送的内容。\n发送 /help + 名称 获取对应帮助。"
        );
    }
}

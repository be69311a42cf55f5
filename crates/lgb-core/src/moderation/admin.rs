//! Admin override commands.
//!
//! Parsing is platform-neutral; the Telegram adapter checks the sender's
//! rights and supplies the reply-to author, then calls
//! [`Moderator::run_admin_command`].

use chrono::Duration;

use crate::{
    domain::UserId,
    errors::Error,
    formatting::{escape_html, format_duration},
    Result,
};

use super::Moderator;

const STATS_TOP_N: usize = 10;
const DEFAULT_CLEANUP_DAYS: u32 = 30;

/// Who an admin command is aimed at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Id(UserId),
    /// Without the leading `@`.
    Username(String),
}

impl Target {
    /// `Ok(None)` for an empty argument.
    pub fn parse(arg: &str) -> Result<Option<Self>> {
        let arg = arg.trim();
        if arg.is_empty() {
            return Ok(None);
        }
        if let Ok(id) = arg.parse::<i64>() {
            return Ok(Some(Target::Id(UserId(id))));
        }

        let name = arg.strip_prefix('@').unwrap_or(arg);
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(Error::Validation(format!(
                "'{arg}' is neither a user id nor a @username"
            )));
        }
        Ok(Some(Target::Username(name.to_string())))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminCommand {
    Help,
    Stats,
    Config,
    ResetUser(Option<Target>),
    Whitelist(Option<Target>),
    Unwhitelist(Option<Target>),
    Cleanup { days: u32 },
}

impl AdminCommand {
    /// Parse a `/command args` message. `Ok(None)` when it is not one of ours.
    pub fn parse(text: &str) -> Result<Option<Self>> {
        if !text.trim_start().starts_with('/') {
            return Ok(None);
        }
        let (cmd, arg) = parse_command(text);
        let first_arg = arg.split_whitespace().next().unwrap_or("");

        let parsed = match cmd.as_str() {
            "start" | "help" => AdminCommand::Help,
            "stats" => AdminCommand::Stats,
            "config" => AdminCommand::Config,
            "reset_user" => AdminCommand::ResetUser(Target::parse(first_arg)?),
            "whitelist" => AdminCommand::Whitelist(Target::parse(first_arg)?),
            "unwhitelist" => AdminCommand::Unwhitelist(Target::parse(first_arg)?),
            "cleanup" => {
                let days = if first_arg.is_empty() {
                    DEFAULT_CLEANUP_DAYS
                } else {
                    first_arg
                        .parse::<u32>()
                        .ok()
                        .filter(|d| *d > 0)
                        .ok_or_else(|| {
                            Error::Validation(format!(
                                "'{first_arg}' is not a positive number of days"
                            ))
                        })?
                };
                AdminCommand::Cleanup { days }
            }
            _ => return Ok(None),
        };
        Ok(Some(parsed))
    }

    pub fn name(&self) -> &'static str {
        match self {
            AdminCommand::Help => "help",
            AdminCommand::Stats => "stats",
            AdminCommand::Config => "config",
            AdminCommand::ResetUser(_) => "reset_user",
            AdminCommand::Whitelist(_) => "whitelist",
            AdminCommand::Unwhitelist(_) => "unwhitelist",
            AdminCommand::Cleanup { .. } => "cleanup",
        }
    }

    pub fn requires_admin(&self) -> bool {
        !matches!(self, AdminCommand::Help)
    }
}

/// Split `/cmd@botname rest...` into the lowercased command name and the
/// remaining argument text. A `@botname` suffix is dropped.
pub fn parse_command(text: &str) -> (String, String) {
    let text = text.trim();
    let (head, args) = text
        .split_once(char::is_whitespace)
        .unwrap_or((text, ""));
    let name = head.strip_prefix('/').unwrap_or(head);
    let name = name.split_once('@').map_or(name, |(cmd, _bot)| cmd);
    (name.to_lowercase(), args.trim().to_string())
}

pub fn usage(cmd: &str) -> String {
    match cmd {
        "cleanup" => "Usage: /cleanup [days]".to_string(),
        other => format!(
            "Usage: /{other} &lt;user_id or @username&gt; (or reply to the user's message)"
        ),
    }
}

impl Moderator {
    /// Execute an admin command and return the HTML reply.
    ///
    /// The caller is responsible for the admin check. `reply_to` is the author
    /// of the message the command replied to, if any.
    pub async fn run_admin_command(&self, cmd: AdminCommand, reply_to: Option<UserId>) -> String {
        let name = cmd.name();
        match cmd {
            AdminCommand::Help => self.help_html(),
            AdminCommand::Stats => self.stats_html().await,
            AdminCommand::Config => self.config_html(),

            AdminCommand::ResetUser(target) => {
                let id = match self.resolve_target(name, target, reply_to).await {
                    Ok(id) => id,
                    Err(reply) => return reply,
                };
                if self.tracker.lock().await.reset(id) {
                    format!("✅ Link count reset for user ID {}", id.0)
                } else {
                    format!("❌ User ID {} not found in tracking.", id.0)
                }
            }

            AdminCommand::Whitelist(target) => {
                let id = match self.resolve_target(name, target, reply_to).await {
                    Ok(id) => id,
                    Err(reply) => return reply,
                };
                self.tracker.lock().await.whitelist(id);
                format!("✅ User ID {} added to whitelist", id.0)
            }

            AdminCommand::Unwhitelist(target) => {
                let id = match self.resolve_target(name, target, reply_to).await {
                    Ok(id) => id,
                    Err(reply) => return reply,
                };
                if self.tracker.lock().await.unwhitelist(id) {
                    format!("✅ User ID {} removed from whitelist", id.0)
                } else {
                    format!("❌ User ID {} was not in whitelist", id.0)
                }
            }

            AdminCommand::Cleanup { days } => {
                let removed = self
                    .tracker
                    .lock()
                    .await
                    .prune_inactive(Duration::days(i64::from(days)));
                format!("🧹 Removed {removed} user(s) inactive for more than {days} day(s).")
            }
        }
    }

    async fn resolve_target(
        &self,
        cmd: &str,
        target: Option<Target>,
        reply_to: Option<UserId>,
    ) -> std::result::Result<UserId, String> {
        match target {
            Some(Target::Id(id)) => Ok(id),
            Some(Target::Username(name)) => self
                .tracker
                .lock()
                .await
                .user_id_by_username(&name)
                .ok_or_else(|| format!("❌ User @{} not found.", escape_html(&name))),
            None => reply_to.ok_or_else(|| usage(cmd)),
        }
    }

    pub fn help_html(&self) -> String {
        let cfg = &self.cfg;
        let action = match cfg.restriction_type {
            crate::config::RestrictionType::Mute => {
                format!("mutes them ({})", cfg.mute_duration_label().to_lowercase())
            }
            crate::config::RestrictionType::Kick => "kicks them".to_string(),
        };
        format!(
            "🤖 <b>Link Guard Bot</b>\n\n\
Counts messages with links per user and {action} after {max} link message(s).\n\n\
<b>Admin Commands:</b>\n\
• /stats - Show link posting statistics\n\
• /config - Show current configuration\n\
• /reset_user &lt;user_id|@username&gt; - Reset link count for a user\n\
• /whitelist &lt;user_id|@username&gt; - Exempt a user from link limits\n\
• /unwhitelist &lt;user_id|@username&gt; - Remove a user from the whitelist\n\
• /cleanup [days] - Forget users inactive for N days (default {DEFAULT_CLEANUP_DAYS})\n\
• /help - Show this help message\n\n\
Reply to a user's message with a command to target them directly.\n\n\
<b>Note:</b> the bot must be an administrator with ban and delete rights.",
            max = cfg.max_links_allowed,
        )
    }

    fn config_html(&self) -> String {
        let lines = self
            .cfg
            .summary_lines()
            .iter()
            .map(|l| escape_html(l))
            .collect::<Vec<_>>()
            .join("\n");
        format!("⚙️ <b>Current Configuration:</b>\n{lines}")
    }

    async fn stats_html(&self) -> String {
        let stats = self.tracker.lock().await.stats();
        if stats.users.is_empty() {
            return "📊 No link statistics available.".to_string();
        }

        let now = chrono::Utc::now();
        let mut out = String::from("📊 <b>Link Statistics:</b>\n\n");
        for (i, u) in stats.users.iter().take(STATS_TOP_N).enumerate() {
            let ago = format_duration((now - u.last_seen).num_seconds());
            let flag = if u.whitelisted { " ✅" } else { "" };
            out.push_str(&format!(
                "{}. {}{flag}: {} link(s) (last seen {ago} ago)\n",
                i + 1,
                escape_html(&u.display_name()),
                u.link_count,
            ));
        }
        out.push_str(&format!(
            "\n<b>Total users tracked:</b> {}\n<b>Total links counted:</b> {}\n<b>Whitelisted users:</b> {}",
            stats.total_users, stats.total_links, stats.whitelisted
        ));
        out
    }
}

use std::{env, fmt, fs, io, path::Path, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};

use crate::{errors::Error, formatting::format_duration, Result};

/// Telegram treats a restriction ending less than 30 seconds from now as
/// permanent, so shorter timed mutes are refused.
pub const MIN_TIMED_MUTE_SECS: u64 = 30;

/// What happens to a user once they reach the link threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestrictionType {
    /// Revoke every send permission (optionally time-limited).
    Mute,
    /// Remove from the chat; the user may rejoin.
    Kick,
}

impl RestrictionType {
    pub fn as_str(self) -> &'static str {
        match self {
            RestrictionType::Mute => "mute",
            RestrictionType::Kick => "kick",
        }
    }

    /// Past tense used in notices and logs.
    pub fn verb(self) -> &'static str {
        match self {
            RestrictionType::Mute => "muted",
            RestrictionType::Kick => "kicked",
        }
    }
}

impl FromStr for RestrictionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mute" => Ok(RestrictionType::Mute),
            "kick" => Ok(RestrictionType::Kick),
            other => Err(Error::Config(format!(
                "RESTRICTION_TYPE must be either 'mute' or 'kick', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for RestrictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// `tracing_subscriber::EnvFilter` directive for this level.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" | "critical" => Ok(LogLevel::Error),
            other => Err(Error::Config(format!("LOG_LEVEL '{other}' is not recognized"))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_directive().to_uppercase())
    }
}

/// Typed configuration, validated once at startup and immutable afterwards.
#[derive(Clone)]
pub struct Config {
    pub telegram_bot_token: String,

    // Moderation policy
    pub max_links_allowed: u32,
    pub restriction_type: RestrictionType,
    /// Zero means "until an admin lifts it".
    pub mute_duration: Duration,
    pub delete_link_messages: bool,
    pub send_restriction_notification: bool,

    pub log_level: LogLevel,
}

// Keep the token out of Debug output (it ends up in logs).
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("telegram_bot_token", &"<redacted>")
            .field("max_links_allowed", &self.max_links_allowed)
            .field("restriction_type", &self.restriction_type)
            .field("mute_duration", &self.mute_duration)
            .field("delete_link_messages", &self.delete_link_messages)
            .field(
                "send_restriction_notification",
                &self.send_restriction_notification,
            )
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load from the process environment, after an optional `.env` in the
    /// working directory (existing variables are never overridden).
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"))?;
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Used by `load()` and by tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let telegram_bot_token = lookup("TELEGRAM_BOT_TOKEN")
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if telegram_bot_token.is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let max_links_allowed = parse_var::<u32>(&lookup, "MAX_LINKS_ALLOWED")?.unwrap_or(1);
        if max_links_allowed < 1 {
            return Err(Error::Config(
                "MAX_LINKS_ALLOWED must be at least 1".to_string(),
            ));
        }

        let restriction_type = match lookup("RESTRICTION_TYPE") {
            Some(v) => v.parse()?,
            None => RestrictionType::Mute,
        };

        // Negative values fail the u64 parse, which is what we want.
        let mute_secs = parse_var::<u64>(&lookup, "MUTE_DURATION")?.unwrap_or(0);
        if (1..MIN_TIMED_MUTE_SECS).contains(&mute_secs) {
            return Err(Error::Config(format!(
                "MUTE_DURATION must be 0 (permanent) or at least {MIN_TIMED_MUTE_SECS} seconds, got {mute_secs}"
            )));
        }
        let mute_duration = Duration::from_secs(mute_secs);

        let delete_link_messages = bool_var(&lookup, "DELETE_LINK_MESSAGES")?.unwrap_or(true);
        let send_restriction_notification =
            bool_var(&lookup, "SEND_RESTRICTION_NOTIFICATION")?.unwrap_or(true);

        let log_level = match lookup("LOG_LEVEL") {
            Some(v) => v.parse()?,
            None => LogLevel::Info,
        };

        Ok(Self {
            telegram_bot_token,
            max_links_allowed,
            restriction_type,
            mute_duration,
            delete_link_messages,
            send_restriction_notification,
            log_level,
        })
    }

    pub fn is_permanent_mute(&self) -> bool {
        self.mute_duration.is_zero()
    }

    /// End of a mute that starts at `now`, or `None` for a permanent mute.
    pub fn mute_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.is_permanent_mute() {
            return None;
        }
        let secs = i64::try_from(self.mute_duration.as_secs()).unwrap_or(i64::MAX);
        chrono::Duration::try_seconds(secs).and_then(|d| now.checked_add_signed(d))
    }

    /// Human-readable mute length ("Permanent", "10m 0s", ...).
    pub fn mute_duration_label(&self) -> String {
        if self.is_permanent_mute() {
            return "Permanent".to_string();
        }
        format_duration(self.mute_duration.as_secs() as i64)
    }

    /// Lines for the `/config` command. The token is never included.
    pub fn summary_lines(&self) -> Vec<String> {
        let yes_no = |b: bool| if b { "Yes" } else { "No" };
        vec![
            format!("• Max links allowed: {}", self.max_links_allowed),
            format!("• Restriction type: {}", self.restriction_type),
            format!("• Mute duration: {}", self.mute_duration_label()),
            format!(
                "• Delete link messages: {}",
                yes_no(self.delete_link_messages)
            ),
            format!(
                "• Send notifications: {}",
                yes_no(self.send_restriction_notification)
            ),
            format!("• Log level: {}", self.log_level),
        ]
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got '{raw}'")))
}

fn bool_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(Error::Config(format!(
            "{key} must be a boolean (true/false), got '{raw}'"
        ))),
    }
}

fn load_dotenv_if_present(path: &Path) -> Result<()> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
    Ok(())
}

/// `KEY=value` pairs from a `.env` body. Comments, blank lines and lines
/// without `=` are skipped; an `export ` prefix is accepted.
fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line
                .trim_start_matches("export ")
                .split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

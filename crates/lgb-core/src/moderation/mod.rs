//! Moderation service: link detection, per-user counting and enforcement.
//!
//! The service owns the user tracker and talks to the chat platform only
//! through [`port::ModerationPort`], so every decision here is testable with
//! an in-memory port.

pub mod admin;
pub mod port;
pub mod types;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};

use crate::{
    config::{Config, RestrictionType},
    domain::{ChatId, InboundMessage, UserId},
    formatting::user_mention_html,
    links::{extract_links, is_suspicious_link},
    tracker::UserTracker,
};

use port::ModerationPort;
use types::{ActionCall, ActionReport, IgnoreReason, ModerationOutcome};

pub struct Moderator {
    cfg: Arc<Config>,
    port: Arc<dyn ModerationPort>,
    tracker: Mutex<UserTracker>,
}

impl Moderator {
    pub fn new(cfg: Arc<Config>, port: Arc<dyn ModerationPort>) -> Self {
        Self {
            cfg,
            port,
            tracker: Mutex::new(UserTracker::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn port(&self) -> Arc<dyn ModerationPort> {
        self.port.clone()
    }

    /// Direct tracker access (admin tooling, tests). Do not hold across awaits.
    pub async fn tracker(&self) -> MutexGuard<'_, UserTracker> {
        self.tracker.lock().await
    }

    /// Admin lookup that treats a failed API call as "not an admin".
    pub async fn is_admin(&self, chat_id: ChatId, user_id: UserId) -> bool {
        match self.port.is_chat_admin(chat_id, user_id).await {
            Ok(is_admin) => is_admin,
            Err(e) => {
                tracing::warn!(
                    chat_id = chat_id.0,
                    user_id = user_id.0,
                    error = %e,
                    "admin status lookup failed; treating user as regular member"
                );
                false
            }
        }
    }

    /// Process one inbound message to completion.
    ///
    /// Never fails: external call failures end up in the returned
    /// [`ActionReport`] and are logged here.
    pub async fn handle_message(&self, msg: &InboundMessage) -> ModerationOutcome {
        if !msg.chat_kind.is_group() {
            return ModerationOutcome::Ignored(IgnoreReason::NotGroupChat);
        }
        if msg.sender_is_bot {
            return ModerationOutcome::Ignored(IgnoreReason::FromBot);
        }

        let links = extract_links(&msg.text);
        if links.is_empty() {
            return ModerationOutcome::Ignored(IgnoreReason::NoLinks);
        }

        if self.tracker.lock().await.is_whitelisted(msg.sender) {
            tracing::debug!(user_id = msg.sender.0, "whitelisted sender posted links");
            return ModerationOutcome::Ignored(IgnoreReason::Whitelisted);
        }

        if self.is_admin(msg.chat_id(), msg.sender).await {
            tracing::debug!(user_id = msg.sender.0, "admin posted links");
            return ModerationOutcome::Ignored(IgnoreReason::Admin);
        }

        let threshold = self.cfg.max_links_allowed;
        let (count, triggered) = {
            let mut tracker = self.tracker.lock().await;
            let count = tracker.record_link(msg.sender, &msg.sender_name);
            (count, tracker.is_over_threshold(msg.sender, threshold))
        };

        let suspicious = links.iter().filter(|l| is_suspicious_link(l)).count();
        tracing::info!(
            user_id = msg.sender.0,
            username = %msg.sender_name,
            chat_id = msg.chat_id().0,
            link_count = count,
            threshold,
            suspicious,
            links = ?links,
            "user posted link(s)"
        );

        if !triggered {
            return ModerationOutcome::Counted { count };
        }

        let report = self.enforce(msg, count).await;
        self.tracker.lock().await.reset(msg.sender);
        log_report(msg, &report);

        ModerationOutcome::Actioned(report)
    }

    async fn enforce(&self, msg: &InboundMessage, count: u32) -> ActionReport {
        let chat_id = msg.chat_id();
        let mut report = ActionReport::new(self.cfg.restriction_type, count);

        match self.cfg.restriction_type {
            RestrictionType::Mute => {
                let until = self.cfg.mute_until(Utc::now());
                let res = self.port.restrict_member(chat_id, msg.sender, until).await;
                report.push(ActionCall::Restrict, res);
            }
            RestrictionType::Kick => {
                let res = self.port.ban_member(chat_id, msg.sender).await;
                let banned = res.is_ok();
                report.push(ActionCall::Kick, res);
                if banned {
                    let res = self.port.unban_member(chat_id, msg.sender).await;
                    report.push(ActionCall::Unban, res);
                }
            }
        }

        if self.cfg.delete_link_messages {
            let res = self.port.delete_message(msg.message).await;
            report.push(ActionCall::DeleteMessage, res);
        }

        // Announcing a restriction that did not happen would mislead the group.
        if self.cfg.send_restriction_notification && report.restriction_applied() {
            let html = self.restriction_notice(msg, count);
            let res = self.port.send_html(chat_id, &html).await.map(|_| ());
            report.push(ActionCall::Notify, res);
        }

        report
    }

    fn restriction_notice(&self, msg: &InboundMessage, count: u32) -> String {
        let who = user_mention_html(msg.sender, &msg.sender_name);
        let action = match self.cfg.restriction_type {
            RestrictionType::Mute if !self.cfg.is_permanent_mute() => {
                format!("muted for {}", self.cfg.mute_duration_label())
            }
            other => other.verb().to_string(),
        };
        let noun = if count == 1 { "link message" } else { "link messages" };
        format!(
            "⚠️ User {who} has been {action} for posting {count} {noun} (limit: {}).",
            self.cfg.max_links_allowed
        )
    }
}

/// Single logging point for enforcement results.
fn log_report(msg: &InboundMessage, report: &ActionReport) {
    for (call, reason) in report.failures() {
        tracing::warn!(
            call = %call,
            user_id = msg.sender.0,
            chat_id = msg.chat_id().0,
            error = reason,
            "moderation call failed"
        );
    }

    if report.restriction_applied() {
        tracing::info!(
            action = report.restriction.verb(),
            user_id = msg.sender.0,
            username = %msg.sender_name,
            chat_id = msg.chat_id().0,
            link_count = report.link_count,
            "user restricted"
        );
    } else {
        tracing::warn!(
            action = report.restriction.as_str(),
            user_id = msg.sender.0,
            chat_id = msg.chat_id().0,
            "restriction not applied"
        );
    }
}


#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use super::testing::{group_message, Call, FakePort};
    use super::*;
    use crate::domain::ChatKind;

    fn config(pairs: &[(&str, &str)]) -> Arc<Config> {
        let mut map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        map.insert("TELEGRAM_BOT_TOKEN".to_string(), "test".to_string());
        Arc::new(Config::from_lookup(|k| map.get(k).cloned()).unwrap())
    }

    fn moderator(pairs: &[(&str, &str)], port: FakePort) -> (Moderator, Arc<FakePort>) {
        let port = Arc::new(port);
        (Moderator::new(config(pairs), port.clone()), port)
    }

    #[tokio::test]
    async fn first_link_triggers_with_default_threshold() {
        let (m, port) = moderator(&[], FakePort::default());

        let out = m
            .handle_message(&group_message(1, 10, "buy at https://spam.example.com"))
            .await;

        let ModerationOutcome::Actioned(report) = out else {
            panic!("expected action, got {out:?}");
        };
        assert!(report.restriction_applied());
        assert!(report.succeeded(ActionCall::DeleteMessage));
        assert!(report.succeeded(ActionCall::Notify));

        let calls = port.calls();
        assert!(calls.contains(&Call::Restrict(1, None)));
        assert!(calls.contains(&Call::Delete(10)));
        assert_eq!(port.sent().len(), 1);
        assert!(port.sent()[0].contains("has been muted"));
        assert_eq!(m.tracker().await.count(UserId(1)), 0);
    }

    #[tokio::test]
    async fn count_grows_until_threshold_then_resets() {
        let (m, port) = moderator(&[("MAX_LINKS_ALLOWED", "3")], FakePort::default());

        for (i, expected) in [1u32, 2].into_iter().enumerate() {
            let out = m
                .handle_message(&group_message(5, i as i32, "see example.com"))
                .await;
            assert_eq!(out, ModerationOutcome::Counted { count: expected });
            assert_eq!(m.tracker().await.count(UserId(5)), expected);
        }

        let out = m.handle_message(&group_message(5, 3, "see example.com")).await;
        match out {
            ModerationOutcome::Actioned(report) => assert_eq!(report.link_count, 3),
            other => panic!("expected action, got {other:?}"),
        }
        assert_eq!(m.tracker().await.count(UserId(5)), 0);
        assert!(port.calls().contains(&Call::Restrict(5, None)));
    }

    #[tokio::test]
    async fn messages_without_links_are_not_counted() {
        let (m, port) = moderator(&[], FakePort::default());
        let out = m.handle_message(&group_message(1, 1, "hello everyone")).await;
        assert_eq!(out, ModerationOutcome::Ignored(IgnoreReason::NoLinks));
        assert!(port.calls().is_empty());
        assert!(m.tracker().await.get(UserId(1)).is_none());
    }

    #[tokio::test]
    async fn whitelisted_user_count_never_changes() {
        let (m, port) = moderator(&[], FakePort::default());
        m.tracker().await.whitelist(UserId(2));

        for i in 0..3 {
            let out = m
                .handle_message(&group_message(2, i, "https://example.com"))
                .await;
            assert_eq!(out, ModerationOutcome::Ignored(IgnoreReason::Whitelisted));
        }
        assert_eq!(m.tracker().await.count(UserId(2)), 0);
        assert!(port.calls().is_empty());
    }

    #[tokio::test]
    async fn admins_and_private_chats_are_exempt() {
        let (m, port) = moderator(&[], FakePort::default().with_admin(9));

        let out = m.handle_message(&group_message(9, 1, "https://example.com")).await;
        assert_eq!(out, ModerationOutcome::Ignored(IgnoreReason::Admin));

        let mut private = group_message(4, 2, "https://example.com");
        private.chat_kind = ChatKind::Private;
        let out = m.handle_message(&private).await;
        assert_eq!(out, ModerationOutcome::Ignored(IgnoreReason::NotGroupChat));

        let mut bot = group_message(6, 3, "https://example.com");
        bot.sender_is_bot = true;
        assert_eq!(
            m.handle_message(&bot).await,
            ModerationOutcome::Ignored(IgnoreReason::FromBot)
        );

        assert_eq!(port.calls(), vec![Call::IsAdmin(9)]);
    }

    #[tokio::test]
    async fn kick_removes_instead_of_restricting() {
        let (m, port) = moderator(&[("RESTRICTION_TYPE", "kick")], FakePort::default());
        m.handle_message(&group_message(3, 7, "t.me/joinchat")).await;

        let calls = port.calls();
        let ban = calls.iter().position(|c| *c == Call::Ban(3));
        let unban = calls.iter().position(|c| *c == Call::Unban(3));
        assert!(ban.is_some() && unban > ban, "{calls:?}");
        assert!(!calls.iter().any(|c| matches!(c, Call::Restrict(..))));
        assert!(port.sent()[0].contains("has been kicked"));
    }

    #[tokio::test]
    async fn failed_unban_still_counts_as_kicked() {
        let port = FakePort {
            fail_unban: true,
            ..FakePort::default()
        };
        let (m, port) = moderator(&[("RESTRICTION_TYPE", "kick")], port);
        let out = m.handle_message(&group_message(3, 7, "https://spam.example.com")).await;

        let ModerationOutcome::Actioned(report) = out else {
            panic!("expected action");
        };
        assert!(report.restriction_applied());
        assert!(report.called(ActionCall::Unban));
        assert!(!report.succeeded(ActionCall::Unban));
        assert_eq!(port.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_ban_skips_unban_and_notice() {
        let port = FakePort {
            fail_ban: true,
            ..FakePort::default()
        };
        let (m, port) = moderator(&[("RESTRICTION_TYPE", "kick")], port);
        let out = m.handle_message(&group_message(3, 8, "https://spam.example.com")).await;

        let ModerationOutcome::Actioned(report) = out else {
            panic!("expected action");
        };
        assert!(!report.restriction_applied());
        assert!(!port.calls().contains(&Call::Unban(3)));
        assert!(port.sent().is_empty());
    }

    #[tokio::test]
    async fn delete_and_notify_flags_are_honoured() {
        let (m, port) = moderator(
            &[
                ("DELETE_LINK_MESSAGES", "false"),
                ("SEND_RESTRICTION_NOTIFICATION", "false"),
            ],
            FakePort::default(),
        );
        let out = m.handle_message(&group_message(1, 42, "https://x.io")).await;

        let ModerationOutcome::Actioned(report) = out else {
            panic!("expected action");
        };
        assert!(!report.called(ActionCall::DeleteMessage));
        assert!(!report.called(ActionCall::Notify));
        assert!(!port.calls().iter().any(|c| matches!(c, Call::Delete(_))));
        assert!(port.sent().is_empty());
    }

    #[tokio::test]
    async fn timed_mute_passes_an_end_date() {
        let (m, port) = moderator(&[("MUTE_DURATION", "600")], FakePort::default());
        let before = Utc::now();
        m.handle_message(&group_message(8, 1, "https://example.com")).await;

        let until = port
            .calls()
            .into_iter()
            .find_map(|c| match c {
                Call::Restrict(_, until) => until,
                _ => None,
            })
            .expect("restrict call with end date");
        let secs = (until - before).num_seconds();
        assert!((599..=601).contains(&secs), "mute length was {secs}s");
        assert_eq!(m.config().mute_duration, Duration::from_secs(600));
        assert!(port.sent()[0].contains("muted for 10m 0s"));
    }

    #[tokio::test]
    async fn failed_restriction_still_deletes_and_resets() {
        let port = FakePort {
            fail_restrict: true,
            ..FakePort::default()
        };
        let (m, port) = moderator(&[], port);
        let out = m.handle_message(&group_message(1, 5, "https://example.com")).await;

        let ModerationOutcome::Actioned(report) = out else {
            panic!("expected action");
        };
        assert!(!report.restriction_applied());
        assert_eq!(report.failures().count(), 1);
        assert!(report.succeeded(ActionCall::DeleteMessage));
        assert!(!report.called(ActionCall::Notify));
        assert!(port.sent().is_empty());
        assert_eq!(m.tracker().await.count(UserId(1)), 0);
    }

    #[tokio::test]
    async fn failed_delete_does_not_block_notice() {
        let port = FakePort {
            fail_delete: true,
            ..FakePort::default()
        };
        let (m, port) = moderator(&[], port);
        let out = m.handle_message(&group_message(1, 5, "https://example.com")).await;

        let ModerationOutcome::Actioned(report) = out else {
            panic!("expected action");
        };
        assert!(report.restriction_applied());
        assert!(!report.succeeded(ActionCall::DeleteMessage));
        assert_eq!(port.sent().len(), 1);
    }

    #[tokio::test]
    async fn admin_lookup_failure_counts_as_member() {
        let port = FakePort {
            fail_admin_lookup: true,
            ..FakePort::default()
        };
        let (m, _port) = moderator(&[("MAX_LINKS_ALLOWED", "2")], port);
        let out = m.handle_message(&group_message(1, 1, "https://example.com")).await;
        assert_eq!(out, ModerationOutcome::Counted { count: 1 });
    }
}

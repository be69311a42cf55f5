use teloxide::types::Message;

use lgb_core::{
    domain::{ChatId, UserId},
    formatting::escape_html,
    links::contains_links,
    moderation::admin::{parse_command, usage, AdminCommand},
};

use super::links::scannable_text;
use crate::router::AppState;

const NOT_ADMIN: &str = "❌ This command is only available to administrators.";
const GROUP_ONLY: &str = "❌ Admin commands only work inside a group.";

/// Handle a `/command`. Returns `true` when the message was consumed as an
/// admin override and must not be scanned for links.
pub(super) async fn handle_command(msg: &Message, text: &str, state: &AppState) -> bool {
    let Some(user) = msg.from() else {
        return false;
    };
    let chat_id = ChatId(msg.chat.id.0);
    let user_id = UserId(user.id.0 as i64);
    let (name, _) = parse_command(text);

    let parsed = match AdminCommand::parse(text) {
        Ok(None) => return false,
        Ok(Some(cmd)) => Ok(cmd),
        Err(e) => Err(e),
    };

    if matches!(parsed, Ok(AdminCommand::Help)) {
        // Help is public, but a member's help request that carries links is
        // moderated like any other message.
        if !msg.chat.is_private()
            && carries_links(msg)
            && !state.moderator.is_admin(chat_id, user_id).await
        {
            return false;
        }
    } else {
        if msg.chat.is_private() {
            reply(state, chat_id, GROUP_ONLY).await;
            return true;
        }
        if !state.moderator.is_admin(chat_id, user_id).await {
            tracing::info!(
                command = %name,
                user_id = user_id.0,
                chat_id = chat_id.0,
                "admin command rejected"
            );
            reply(state, chat_id, NOT_ADMIN).await;
            return false;
        }
    }

    let cmd = match parsed {
        Ok(cmd) => cmd,
        Err(e) => {
            let html = format!("❌ {}\n{}", escape_html(&e.to_string()), usage(&name));
            reply(state, chat_id, &html).await;
            return true;
        }
    };

    let reply_to = msg
        .reply_to_message()
        .and_then(|m| m.from())
        .map(|u| UserId(u.id.0 as i64));

    tracing::info!(
        command = cmd.name(),
        user_id = user_id.0,
        chat_id = chat_id.0,
        "admin command"
    );
    let html = state.moderator.run_admin_command(cmd, reply_to).await;
    reply(state, chat_id, &html).await;
    true
}

fn carries_links(msg: &Message) -> bool {
    scannable_text(msg).is_some_and(|text| contains_links(&text))
}

async fn reply(state: &AppState, chat_id: ChatId, html: &str) {
    if let Err(e) = state.moderator.port().send_html(chat_id, html).await {
        tracing::warn!(chat_id = chat_id.0, error = %e, "failed to send command reply");
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use serde_json::json;

    use lgb_core::{
        config::Config,
        domain::MessageRef,
        moderation::{port::ModerationPort, Moderator},
        Result,
    };

    use super::*;
    use crate::handlers::handle_message;

    const GROUP_ID: i64 = -100_123;

    #[derive(Default)]
    struct RecordingPort {
        admins: Vec<i64>,
        sent: Mutex<Vec<String>>,
        restricted: Mutex<Vec<i64>>,
    }

    impl RecordingPort {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModerationPort for RecordingPort {
        async fn is_chat_admin(&self, _chat_id: ChatId, user_id: UserId) -> Result<bool> {
            Ok(self.admins.contains(&user_id.0))
        }

        async fn restrict_member(
            &self,
            _chat_id: ChatId,
            user_id: UserId,
            _until: Option<DateTime<Utc>>,
        ) -> Result<()> {
            self.restricted.lock().unwrap().push(user_id.0);
            Ok(())
        }

        async fn ban_member(&self, _chat_id: ChatId, _user_id: UserId) -> Result<()> {
            Ok(())
        }

        async fn unban_member(&self, _chat_id: ChatId, _user_id: UserId) -> Result<()> {
            Ok(())
        }

        async fn delete_message(&self, _msg: MessageRef) -> Result<()> {
            Ok(())
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            self.sent.lock().unwrap().push(html.to_string());
            Ok(MessageRef {
                chat_id,
                message_id: lgb_core::domain::MessageId(1),
            })
        }
    }

    fn setup(max_links: &str, admins: &[i64]) -> (Arc<AppState>, Arc<RecordingPort>) {
        let vars = HashMap::from([
            ("TELEGRAM_BOT_TOKEN", "test-token"),
            ("MAX_LINKS_ALLOWED", max_links),
        ]);
        let cfg = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        let port = Arc::new(RecordingPort {
            admins: admins.to_vec(),
            ..RecordingPort::default()
        });
        let state = Arc::new(AppState {
            moderator: Arc::new(Moderator::new(Arc::new(cfg), port.clone())),
        });
        (state, port)
    }

    fn user_json(id: i64) -> serde_json::Value {
        json!({ "id": id, "is_bot": false, "first_name": "User", "username": format!("user{id}") })
    }

    fn group_json(from: i64, message_id: i32, text: &str) -> serde_json::Value {
        json!({
            "message_id": message_id,
            "date": 1_700_000_000,
            "chat": { "id": GROUP_ID, "type": "supergroup", "title": "Test group" },
            "from": user_json(from),
            "text": text,
        })
    }

    fn message(value: serde_json::Value) -> Message {
        serde_json::from_value(value).unwrap()
    }

    async fn count(state: &AppState, user_id: i64) -> u32 {
        state.moderator.tracker().await.count(UserId(user_id))
    }

    #[tokio::test]
    async fn member_admin_command_with_link_is_refused_and_counted() {
        let (state, port) = setup("3", &[9]);

        handle_message(message(group_json(5, 1, "/stats https://spam.example.com")), state.clone())
            .await
            .unwrap();

        assert_eq!(port.sent(), vec![NOT_ADMIN.to_string()]);
        assert_eq!(count(&state, 5).await, 1);
    }

    #[tokio::test]
    async fn member_help_with_link_is_counted_without_reply() {
        let (state, port) = setup("3", &[9]);

        for (id, text) in [(1, "/help https://spam.example.com"), (2, "/start t.me/spam_chat")] {
            handle_message(message(group_json(5, id, text)), state.clone())
                .await
                .unwrap();
        }

        assert_eq!(count(&state, 5).await, 2);
        assert!(port.sent().is_empty(), "{:?}", port.sent());
    }

    #[tokio::test]
    async fn member_help_with_link_at_threshold_is_restricted() {
        let (state, port) = setup("1", &[]);

        handle_message(message(group_json(5, 1, "/help https://spam.example.com")), state.clone())
            .await
            .unwrap();

        assert_eq!(*port.restricted.lock().unwrap(), vec![5]);
        assert!(port.sent()[0].contains("has been muted"));
    }

    #[tokio::test]
    async fn plain_help_is_answered_and_not_tracked() {
        let (state, port) = setup("1", &[]);

        handle_message(message(group_json(5, 1, "/help")), state.clone())
            .await
            .unwrap();

        assert!(port.sent()[0].contains("Link Guard Bot"));
        assert!(state.moderator.tracker().await.get(UserId(5)).is_none());
    }

    #[tokio::test]
    async fn admin_whitelists_the_replied_to_user() {
        let (state, port) = setup("1", &[9]);
        let mut cmd = group_json(9, 2, "/whitelist");
        cmd["reply_to_message"] = group_json(77, 1, "hello");

        handle_message(message(cmd), state.clone()).await.unwrap();

        assert!(state.moderator.tracker().await.is_whitelisted(UserId(77)));
        assert_eq!(port.sent(), vec!["✅ User ID 77 added to whitelist".to_string()]);
    }

    #[tokio::test]
    async fn admin_commands_are_refused_in_private_chats() {
        let (state, port) = setup("1", &[5]);
        let msg = json!({
            "message_id": 1,
            "date": 1_700_000_000,
            "chat": { "id": 5, "type": "private", "first_name": "User" },
            "from": user_json(5),
            "text": "/stats",
        });

        handle_message(message(msg), state.clone()).await.unwrap();

        assert_eq!(port.sent(), vec![GROUP_ONLY.to_string()]);
    }

    #[tokio::test]
    async fn malformed_argument_replies_with_usage() {
        let (state, port) = setup("1", &[9]);

        handle_message(message(group_json(9, 1, "/cleanup soon")), state.clone())
            .await
            .unwrap();

        let sent = port.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("❌ "));
        assert!(sent[0].contains("Usage: /cleanup [days]"));
    }
}

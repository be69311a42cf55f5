use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::{ChatId, MessageRef, UserId},
    Result,
};

/// Chat platform operations the moderation service needs.
///
/// Every call is independent: an implementation reports failures as
/// `Error::External` and never retries on its own.
#[async_trait]
pub trait ModerationPort: Send + Sync {
    /// Whether `user_id` is an administrator or the owner of `chat_id`.
    async fn is_chat_admin(&self, chat_id: ChatId, user_id: UserId) -> Result<bool>;

    /// Revoke every send permission. `until = None` restricts until lifted.
    async fn restrict_member(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        until: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Remove the user from the chat. They stay banned until
    /// [`unban_member`](Self::unban_member) is called.
    async fn ban_member(&self, chat_id: ChatId, user_id: UserId) -> Result<()>;

    /// Lift a ban so the user may rejoin. A no-op for users who are not banned.
    async fn unban_member(&self, chat_id: ChatId, user_id: UserId) -> Result<()>;

    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;
}

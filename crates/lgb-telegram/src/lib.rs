//! Telegram adapter (teloxide).
//!
//! This crate implements the `lgb-core` ModerationPort over the Telegram Bot
//! API and routes incoming updates into the moderation service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use teloxide::{
    prelude::*,
    types::{ChatPermissions, ParseMode},
};

pub mod handlers;
pub mod router;

use lgb_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    moderation::port::ModerationPort,
    Result,
};

#[derive(Clone)]
pub struct TelegramModerator {
    bot: Bot,
}

impl TelegramModerator {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_user(user_id: UserId) -> teloxide::types::UserId {
        teloxide::types::UserId(user_id.0 as u64)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(call: &str, e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram {call} failed: {e}"))
    }
}

#[async_trait]
impl ModerationPort for TelegramModerator {
    async fn is_chat_admin(&self, chat_id: ChatId, user_id: UserId) -> Result<bool> {
        let member = self
            .bot
            .get_chat_member(Self::tg_chat(chat_id), Self::tg_user(user_id))
            .await
            .map_err(|e| Self::map_err("getChatMember", e))?;
        Ok(member.kind.is_privileged())
    }

    async fn restrict_member(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        // Empty permission set: no messages, media, polls, previews or invites.
        let mut req = self.bot.restrict_chat_member(
            Self::tg_chat(chat_id),
            Self::tg_user(user_id),
            ChatPermissions::empty(),
        );
        if let Some(until) = until {
            req = req.until_date(until);
        }
        req.await
            .map_err(|e| Self::map_err("restrictChatMember", e))?;
        Ok(())
    }

    async fn ban_member(&self, chat_id: ChatId, user_id: UserId) -> Result<()> {
        self.bot
            .ban_chat_member(Self::tg_chat(chat_id), Self::tg_user(user_id))
            .await
            .map_err(|e| Self::map_err("banChatMember", e))?;
        Ok(())
    }

    async fn unban_member(&self, chat_id: ChatId, user_id: UserId) -> Result<()> {
        // `only_if_banned` keeps this from kicking a user who is still a member.
        self.bot
            .unban_chat_member(Self::tg_chat(chat_id), Self::tg_user(user_id))
            .only_if_banned(true)
            .await
            .map_err(|e| Self::map_err("unbanChatMember", e))?;
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.bot
            .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
            .await
            .map_err(|e| Self::map_err("deleteMessage", e))?;
        Ok(())
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = self
            .bot
            .send_message(Self::tg_chat(chat_id), html.to_string())
            .parse_mode(ParseMode::Html)
            .disable_web_page_preview(true)
            .await
            .map_err(|e| Self::map_err("sendMessage", e))?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }
}

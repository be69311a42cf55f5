//! Telegram update handlers.
//!
//! Commands are tried first; anything that is not a handled admin command
//! goes through link moderation.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::router::AppState;

mod commands;
mod links;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if let Some(text) = msg.text() {
        if text.starts_with('/') && commands::handle_command(&msg, text, &state).await {
            return Ok(());
        }
    }

    links::handle_links(&msg, &state).await;
    Ok(())
}

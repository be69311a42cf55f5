use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use lgb_core::{
    config::Config,
    moderation::{port::ModerationPort, Moderator},
};

use crate::handlers;
use crate::TelegramModerator;

#[derive(Clone)]
pub struct AppState {
    pub moderator: Arc<Moderator>,
}

/// Long-poll Telegram until Ctrl-C.
pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "link guard bot started"),
        Err(e) => tracing::warn!(error = %e, "could not fetch bot identity"),
    }
    tracing::info!(
        max_links_allowed = cfg.max_links_allowed,
        restriction = %cfg.restriction_type,
        mute_duration = %cfg.mute_duration_label(),
        delete_link_messages = cfg.delete_link_messages,
        notify = cfg.send_restriction_notification,
        "moderation policy"
    );

    let port: Arc<dyn ModerationPort> = Arc::new(TelegramModerator::new(bot.clone()));
    let state = Arc::new(AppState {
        moderator: Arc::new(Moderator::new(cfg, port)),
    });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("dispatcher stopped; in-memory link counts discarded");
    Ok(())
}

use teloxide::types::{Message, MessageEntityKind};

use lgb_core::domain::{ChatId, ChatKind, InboundMessage, MessageId, MessageRef, UserId};

use crate::router::AppState;

pub(super) async fn handle_links(msg: &Message, state: &AppState) {
    let Some(inbound) = inbound_message(msg) else {
        return;
    };
    let outcome = state.moderator.handle_message(&inbound).await;
    tracing::trace!(
        chat_id = inbound.chat_id().0,
        message_id = inbound.message.message_id.0,
        ?outcome,
        "message processed"
    );
}

/// Text and caption plus any URLs hidden behind text-link entities.
pub(super) fn scannable_text(msg: &Message) -> Option<String> {
    let text = msg.text().or_else(|| msg.caption())?;

    // "click here" style entities hide the URL from the visible text.
    let hidden = msg
        .entities()
        .or_else(|| msg.caption_entities())
        .unwrap_or_default()
        .iter()
        .filter_map(|e| match &e.kind {
            MessageEntityKind::TextLink { url } => Some(url.as_str()),
            _ => None,
        });

    Some(with_hidden_links(text, hidden))
}

/// Platform-neutral view of a text or captioned message. `None` when there
/// is no sender or nothing to scan.
fn inbound_message(msg: &Message) -> Option<InboundMessage> {
    let user = msg.from()?;
    let text = scannable_text(msg)?;

    let chat_kind = if msg.chat.is_private() {
        ChatKind::Private
    } else if msg.chat.is_group() {
        ChatKind::Group
    } else if msg.chat.is_supergroup() {
        ChatKind::Supergroup
    } else {
        ChatKind::Channel
    };

    Some(InboundMessage {
        message: MessageRef {
            chat_id: ChatId(msg.chat.id.0),
            message_id: MessageId(msg.id.0),
        },
        chat_kind,
        sender: UserId(user.id.0 as i64),
        sender_name: user.username.clone().unwrap_or_else(|| user.full_name()),
        sender_is_bot: user.is_bot,
        text,
    })
}

fn with_hidden_links<'a>(text: &str, urls: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = text.to_string();
    for url in urls {
        out.push('\n');
        out.push_str(url);
    }
    out
}

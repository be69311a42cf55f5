/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    /// Only group chats are moderated.
    pub fn is_group(self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

/// Platform-neutral view of one inbound text (or caption) message.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub message: MessageRef,
    pub chat_kind: ChatKind,
    pub sender: UserId,
    /// `@username` without the `@`, or the display name when the user has none.
    pub sender_name: String,
    pub sender_is_bot: bool,
    pub text: String,
}

impl InboundMessage {
    pub fn chat_id(&self) -> ChatId {
        self.message.chat_id
    }
}

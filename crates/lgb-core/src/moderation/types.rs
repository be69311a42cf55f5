use std::fmt;

use crate::config::RestrictionType;

/// Why a message was left alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    NotGroupChat,
    FromBot,
    NoLinks,
    Whitelisted,
    Admin,
}

/// One external call made while enforcing a restriction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionCall {
    Restrict,
    /// Ban half of a kick; this is what removes the user.
    Kick,
    /// Lifts the kick ban. Failing here leaves the user banned, not in the chat.
    Unban,
    DeleteMessage,
    Notify,
}

impl ActionCall {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionCall::Restrict => "restrict_chat_member",
            ActionCall::Kick => "ban_chat_member",
            ActionCall::Unban => "unban_chat_member",
            ActionCall::DeleteMessage => "delete_message",
            ActionCall::Notify => "send_message",
        }
    }
}

impl fmt::Display for ActionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionStep {
    pub call: ActionCall,
    /// `Err` carries the failure reason.
    pub result: std::result::Result<(), String>,
}

/// What enforcing one violation did, call by call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionReport {
    pub restriction: RestrictionType,
    pub link_count: u32,
    pub steps: Vec<ActionStep>,
}

impl ActionReport {
    pub fn new(restriction: RestrictionType, link_count: u32) -> Self {
        Self {
            restriction,
            link_count,
            steps: Vec::new(),
        }
    }

    pub fn push(&mut self, call: ActionCall, result: crate::Result<()>) {
        self.steps.push(ActionStep {
            call,
            result: result.map_err(|e| e.to_string()),
        });
    }

    pub fn called(&self, call: ActionCall) -> bool {
        self.steps.iter().any(|s| s.call == call)
    }

    pub fn succeeded(&self, call: ActionCall) -> bool {
        self.steps
            .iter()
            .any(|s| s.call == call && s.result.is_ok())
    }

    /// Whether the mute/kick itself went through.
    pub fn restriction_applied(&self) -> bool {
        self.succeeded(match self.restriction {
            RestrictionType::Mute => ActionCall::Restrict,
            RestrictionType::Kick => ActionCall::Kick,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (ActionCall, &str)> {
        self.steps
            .iter()
            .filter_map(|s| s.result.as_ref().err().map(|e| (s.call, e.as_str())))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModerationOutcome {
    Ignored(IgnoreReason),
    /// Links counted, threshold not reached.
    Counted { count: u32 },
    Actioned(ActionReport),
}

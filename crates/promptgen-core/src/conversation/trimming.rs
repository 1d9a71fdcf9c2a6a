//! Transcript trimming policy
//!
//! Bounds a transcript to `max_messages` entries (the leading system message
//! included) while keeping its shape usable as LLM context:
//!
//! - a leading `system` message survives and counts against the budget;
//! - older turns are dropped from the front, never from the back;
//! - the non-system remainder always starts on a `user` turn;
//! - when the budget forced a cut, a trailing `user` turn without reply is
//!   dropped so the stored transcript ends on a completed exchange.

use crate::types::{Message, Role, Transcript};

/// Default budget: one system prompt plus ten user/assistant exchanges
pub const DEFAULT_MAX_MESSAGES: usize = 21;

/// Trim `messages` to at most `max_messages` entries.
///
/// Pure: no I/O, same input gives the same output. `max_messages == 0` and
/// empty input both yield an empty transcript.
pub fn trim(messages: &[Message], max_messages: usize) -> Transcript {
    if max_messages == 0 || messages.is_empty() {
        return Vec::new();
    }

    let (head, rest) = match messages.split_first() {
        Some((first, rest)) if first.is_system() => (Some(first), rest),
        _ => (None, messages),
    };

    let budget = max_messages.saturating_sub(usize::from(head.is_some()));
    let over_budget = rest.len() > budget;

    let mut start = rest.len().saturating_sub(budget);
    let mut end = rest.len();

    // Never open on an assistant reply whose question was cut away.
    while start < end && rest[start].role != Role::User {
        start += 1;
    }

    if over_budget && end > start && rest[end - 1].role == Role::User {
        end -= 1;
    }

    let mut trimmed = Vec::with_capacity(end - start + usize::from(head.is_some()));
    if let Some(system) = head {
        trimmed.push(system.clone());
    }
    trimmed.extend_from_slice(&rest[start..end]);
    trimmed
}

/// Trimming policy bound to a configured budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimPolicy {
    max_messages: usize,
}

impl Default for TrimPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}

impl TrimPolicy {
    pub fn new(max_messages: usize) -> Self {
        Self { max_messages }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    /// Apply the policy to a transcript
    pub fn trim(&self, messages: &[Message]) -> Transcript {
        trim(messages, self.max_messages)
    }

    /// Trim leaving one free slot for an inbound `user` turn.
    ///
    /// Callers append the new turn afterwards; the following save then fits
    /// the budget and cannot drop the turn that is about to be answered.
    pub fn trim_for_pending_turn(&self, messages: &[Message]) -> Transcript {
        let budget = if self.max_messages > 1 {
            self.max_messages - 1
        } else {
            self.max_messages
        };
        trim(messages, budget)
    }
}

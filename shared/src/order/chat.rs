//! Chat transcript of one session

use serde::{Deserialize, Serialize};

use super::flow::Affordance;
use crate::util::now_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// Scripted flow prompt
    Bot,
    Customer,
    /// Free-text reply from the AI assistant
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Per-session sequence number, starting at 1
    pub id: u64,
    pub sender: Sender,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affordance: Option<Affordance>,
    pub created_at: i64,
}

/// Append-only message list with its own id counter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    next_id: u64,
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        sender: Sender,
        text: impl Into<String>,
        affordance: Option<Affordance>,
    ) -> &ChatMessage {
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id: self.next_id,
            sender,
            text: text.into(),
            affordance,
            created_at: now_millis(),
        });
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop all messages; ids keep increasing
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// The last `limit` messages as `Guest: ...` / `Waiter: ...` lines,
    /// oldest first; `None` when there is nothing to show
    pub fn recent_context(&self, limit: usize) -> Option<String> {
        let start = self.messages.len().saturating_sub(limit);
        let lines: Vec<String> = self.messages[start..]
            .iter()
            .map(|m| {
                let who = match m.sender {
                    Sender::Customer => "Guest",
                    Sender::Bot | Sender::Assistant => "Waiter",
                };
                format!("{who}: {}", m.text)
            })
            .collect();
        (!lines.is_empty()).then(|| lines.join("\n"))
    }
}

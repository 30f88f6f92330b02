//! Conversation state shared by every turn of a session.

use serde::{Deserialize, Serialize};

use crate::llm::{Content, WireRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
    ToolObservation,
}

impl Role {
    /// Observations travel to the model as user turns.
    fn wire(self) -> WireRole {
        match self {
            Role::User | Role::ToolObservation => WireRole::User,
            Role::Model => WireRole::Model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    fn content(&self) -> Content {
        Content {
            role: self.role.wire(),
            text: self.text.clone(),
        }
    }
}

/// Append-only transcript. The first message is always the instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::new(Role::User, instruction)],
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The transcript sent on the next model call.
    ///
    /// With a non-zero `budget` (in characters, instruction excluded) the
    /// latest user query and the newest action/observation pair are always
    /// sent. They share the budget, and a message longer than its share is
    /// clipped with a `[truncated N chars]` marker. What is left of the
    /// budget goes to earlier steps, newest first. A kept run never opens
    /// with an observation whose action was cut off. The stored conversation
    /// is left untouched.
    pub fn as_context(&self, budget: usize) -> Vec<Content> {
        let Some((first, rest)) = self.messages.split_first() else {
            return Vec::new();
        };
        if budget == 0 {
            return self.messages.iter().map(Message::content).collect();
        }

        let query = rest.iter().rposition(|m| m.role == Role::User);
        let turn_start = query.map_or(0, |q| q + 1);
        let mut tail = rest.len();
        if tail > turn_start {
            tail -= 1;
            if rest[tail].role == Role::ToolObservation
                && tail > turn_start
                && rest[tail - 1].role == Role::Model
            {
                tail -= 1;
            }
        }

        let pinned: Vec<usize> = query.into_iter().chain(tail..rest.len()).collect();
        let lengths: Vec<usize> = pinned.iter().map(|&i| rest[i].char_len()).collect();
        let caps = share_budget(&lengths, budget);
        let mut used: usize = caps.iter().sum();

        let mut window: Vec<Option<Content>> = vec![None; rest.len()];
        for (&idx, &cap) in pinned.iter().zip(&caps) {
            window[idx] = Some(rest[idx].clipped(cap));
        }

        // Current turn first, then earlier turns
        let mut segments = vec![(turn_start, tail)];
        if let Some(q) = query {
            segments.push((0, q));
        }
        for (lo, hi) in segments {
            let mut start = hi;
            for idx in (lo..hi).rev() {
                let len = rest[idx].char_len();
                if used + len > budget {
                    break;
                }
                used += len;
                start = idx;
            }
            while start < hi && rest[start].role == Role::ToolObservation {
                used -= rest[start].char_len();
                start += 1;
            }
            for idx in start..hi {
                window[idx] = Some(rest[idx].content());
            }
            if start > lo {
                break;
            }
        }

        let dropped = window.iter().filter(|c| c.is_none()).count();
        if dropped > 0 {
            tracing::debug!("History window dropped {} messages", dropped);
        }

        std::iter::once(first.content())
            .chain(window.into_iter().flatten())
            .collect()
    }
}

/// Room reserved for the truncation marker inside a clipped message.
const MARKER_RESERVE: usize = 64;

impl Message {
    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    fn clipped(&self, limit: usize) -> Content {
        let total = self.char_len();
        if total <= limit {
            return self.content();
        }
        let keep = limit.saturating_sub(MARKER_RESERVE);
        let mut text: String = self.text.chars().take(keep).collect();
        text.push_str(&format!("\n... [truncated {} chars]", total - keep));
        Content {
            role: self.role.wire(),
            text,
        }
    }
}

/// Split `budget` across messages so short ones keep their full length and
/// the rest share what remains evenly.
fn share_budget(lengths: &[usize], budget: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..lengths.len()).collect();
    order.sort_by_key(|&i| lengths[i]);
    let mut caps = vec![0; lengths.len()];
    let mut remaining = budget;
    for (n, &i) in order.iter().enumerate() {
        let share = remaining / (lengths.len() - n);
        caps[i] = lengths[i].min(share);
        remaining -= caps[i];
    }
    caps
}

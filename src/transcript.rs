//! Ordered turn log with a handle on the open assistant message.

use chat_types::Message;
use inference_api::ToolStatus;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
    open_turn: Option<usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt stored messages, dropping stale empty placeholders.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        let mut transcript = Self {
            messages,
            open_turn: None,
        };
        transcript.prune_empty_placeholders();
        transcript
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

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn has_open_turn(&self) -> bool {
        self.open_turn.is_some()
    }

    pub fn open_message(&self) -> Option<&Message> {
        self.open_turn.and_then(|index| self.messages.get(index))
    }

    pub fn push_user(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append the empty assistant placeholder that deltas will target.
    pub fn open_assistant_turn(&mut self) {
        self.messages.push(Message::assistant(""));
        self.open_turn = Some(self.messages.len() - 1);
    }

    pub fn append_delta(&mut self, text: &str) -> bool {
        match self.open_message_mut() {
            Some(message) if !text.is_empty() => {
                message.content.push_str(text);
                true
            }
            _ => false,
        }
    }

    /// Tool signalling only decorates the reply until text starts; after
    /// that only an error status and new sources are applied.
    pub fn apply_tool_status(&mut self, status: &ToolStatus) -> bool {
        let Some(message) = self.open_message_mut() else {
            return false;
        };

        let before = message.clone();
        if message.content.is_empty() {
            message.used_tool = Some(true);
            if let Some(name) = &status.name {
                message.tool_name = Some(name.clone());
            }
            message.tool_status = Some(status.status.clone());
            message.is_error = status.is_error().then_some(true);
        } else if status.is_error() {
            message.is_error = Some(true);
        }
        if !status.sources.is_empty() {
            message.merge_sources(status.sources.iter().cloned());
        }
        *message != before
    }

    pub fn mark_error(&mut self) -> bool {
        match self.open_message_mut() {
            Some(message) => {
                message.is_error = Some(true);
                true
            }
            None => false,
        }
    }

    /// Release the open-turn handle; the message itself stays as mutated.
    pub fn close_turn(&mut self) {
        self.open_turn = None;
    }

    /// Remove empty, non-error assistant messages outside the open turn.
    pub fn prune_empty_placeholders(&mut self) -> usize {
        let open_turn = self.open_turn;
        let before = self.messages.len();
        let mut kept = Vec::with_capacity(before);
        let mut new_open = None;
        for (index, message) in self.messages.drain(..).enumerate() {
            if Some(index) == open_turn {
                new_open = Some(kept.len());
            } else if message.is_empty_placeholder() {
                continue;
            }
            kept.push(message);
        }
        self.messages = kept;
        self.open_turn = new_open;
        before - self.messages.len()
    }

    /// Prior messages worth sending: no placeholders, no failed replies and
    /// never the open turn.
    pub fn request_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(index, message)| {
                Some(*index) != self.open_turn
                    && !message.is_error()
                    && !message.is_empty_placeholder()
            })
            .map(|(_, message)| message)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.open_turn = None;
    }

    fn open_message_mut(&mut self) -> Option<&mut Message> {
        self.open_turn.and_then(|index| self.messages.get_mut(index))
    }
}

use std::collections::VecDeque;

/// How many finalized utterances the pipeline keeps as translation context.
pub const DEFAULT_CONTEXT_DEPTH: usize = 5;

/// Bounded window over the most recent finalized source-language
/// utterances, oldest first. When full, pushing evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct ConversationWindow {
    entries: VecDeque<String>,
    capacity: usize,
}

impl ConversationWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, utterance: String) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(utterance);
    }

    /// Copy of the current window, oldest utterance first.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ConversationWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_DEPTH)
    }
}

use std::collections::VecDeque;

/// User-curated titles that play before any algorithmic pick.
///
/// Titles are unique: enqueueing one that is already waiting does nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackQueue {
    titles: VecDeque<String>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `title`; returns false when it was already queued.
    pub fn enqueue(&mut self, title: &str) -> bool {
        if self.contains(title) {
            return false;
        }
        self.titles.push_back(title.to_string());
        true
    }

    /// Puts `title` at the head; returns false when it was already queued.
    pub fn enqueue_top(&mut self, title: &str) -> bool {
        if self.contains(title) {
            return false;
        }
        self.titles.push_front(title.to_string());
        true
    }

    pub fn dequeue(&mut self) -> Option<String> {
        self.titles.pop_front()
    }

    pub fn contains(&self, title: &str) -> bool {
        self.titles.iter().any(|queued| queued == title)
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.titles.iter().cloned().collect()
    }

    /// Swaps in a reordered queue in one step. Repeated titles keep their
    /// first position.
    pub fn replace_all(&mut self, order: Vec<String>) {
        let mut next = VecDeque::with_capacity(order.len());
        for title in order {
            if !next.contains(&title) {
                next.push_back(title);
            }
        }
        self.titles = next;
    }

    pub fn remove(&mut self, title: &str) -> bool {
        let before = self.titles.len();
        self.titles.retain(|queued| queued != title);
        self.titles.len() != before
    }

    pub fn clear(&mut self) {
        self.titles.clear();
    }
}

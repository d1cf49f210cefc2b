//! On-screen message queue
//!
//! Messages are ordered by priority (highest first) and then by arrival. The
//! head is what the video driver shows; [`MessageQueue::peek`] never removes
//! it, [`MessageQueue::pull`] ages it by one tick.

use std::sync::{Mutex, MutexGuard};

/// Default number of queued messages kept before the oldest low-priority
/// message is dropped.
pub const DEFAULT_CAPACITY: usize = 8;

#[derive(Debug, Clone)]
struct Message {
    text: String,
    priority: u32,
    /// Remaining ticks; 0 means the message stays until cleared.
    duration: u32,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    messages: Vec<Message>,
    next_seq: u64,
}

/// Priority message queue shared between the main thread and helpers.
#[derive(Debug)]
pub struct MessageQueue {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MessageQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue `text` for `duration` ticks. `flush` clears the queue first.
    pub fn push(&self, text: impl Into<String>, priority: u32, duration: u32, flush: bool) {
        let mut inner = self.lock();
        if flush {
            inner.messages.clear();
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.messages.push(Message {
            text: text.into(),
            priority,
            duration,
            seq,
        });
        inner
            .messages
            .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        let capacity = self.capacity;
        inner.messages.truncate(capacity);
    }

    /// Text of the current head without removing or aging it.
    pub fn peek(&self) -> Option<String> {
        self.lock().messages.first().map(|m| m.text.clone())
    }

    /// Return the head and age it by one tick, removing it when it expires.
    pub fn pull(&self) -> Option<String> {
        let mut inner = self.lock();
        let head = inner.messages.first_mut()?;
        let text = head.text.clone();
        if head.duration > 0 {
            head.duration -= 1;
            if head.duration == 0 {
                inner.messages.remove(0);
            }
        }
        Some(text)
    }

    pub fn clear(&self) {
        self.lock().messages.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if any queued message has exactly this text.
    pub fn contains(&self, text: &str) -> bool {
        self.lock().messages.iter().any(|m| m.text == text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_then_fifo() {
        let queue = MessageQueue::default();
        queue.push("low", 0, 10, false);
        queue.push("high", 2, 10, false);
        queue.push("high again", 2, 10, false);
        assert_eq!(queue.peek().as_deref(), Some("high"));
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_peek_is_non_destructive() {
        let queue = MessageQueue::default();
        queue.push("hello", 1, 1, false);
        assert_eq!(queue.peek().as_deref(), Some("hello"));
        assert_eq!(queue.peek().as_deref(), Some("hello"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_pull_expires_head() {
        let queue = MessageQueue::default();
        queue.push("a", 1, 2, false);
        queue.push("b", 0, 1, false);
        assert_eq!(queue.pull().as_deref(), Some("a"));
        assert_eq!(queue.pull().as_deref(), Some("a"));
        assert_eq!(queue.peek().as_deref(), Some("b"));
        assert_eq!(queue.pull().as_deref(), Some("b"));
        assert_eq!(queue.pull(), None);
    }

    #[test]
    fn test_zero_duration_is_sticky() {
        let queue = MessageQueue::default();
        queue.push("Fast forward", 0, 0, true);
        for _ in 0..100 {
            queue.pull();
        }
        assert_eq!(queue.peek().as_deref(), Some("Fast forward"));
    }

    #[test]
    fn test_flush_replaces() {
        let queue = MessageQueue::default();
        queue.push("old", 5, 100, false);
        queue.push("new", 0, 100, true);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek().as_deref(), Some("new"));
    }
}

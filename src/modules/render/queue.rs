use std::collections::VecDeque;

/// Pending job ids in submission order. Whether an id still has a record is
/// the driver's concern, not the queue's.
#[derive(Debug, Default)]
pub struct FifoQueue {
    ids: VecDeque<String>,
}

impl FifoQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `id`. Returns `false` when it is already waiting.
    pub fn enqueue(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push_back(id);
        true
    }

    pub fn dequeue(&mut self) -> Option<String> {
        self.ids.pop_front()
    }

    pub fn peek(&self) -> Option<&str> {
        self.ids.front().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dequeues_in_insertion_order() {
        let mut queue = FifoQueue::new();
        queue.enqueue("a");
        queue.enqueue("b");
        queue.enqueue("c");

        assert_eq!(queue.peek(), Some("a"));
        assert_eq!(queue.dequeue().as_deref(), Some("a"));
        assert_eq!(queue.dequeue().as_deref(), Some("b"));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.dequeue().as_deref(), Some("c"));
        assert_eq!(queue.dequeue(), None);
        assert_eq!(queue.peek(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn holds_each_id_once() {
        let mut queue = FifoQueue::new();
        assert!(queue.enqueue("a"));
        assert!(!queue.enqueue("a"));
        assert_eq!(queue.len(), 1);

        queue.dequeue();
        assert!(queue.enqueue("a"));
    }
}

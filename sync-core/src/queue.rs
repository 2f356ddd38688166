//! Deferred operation queue.
//!
//! This module provides the in-memory FIFO used by the connection manager
//! to hold operations that must wait for connectivity:
//! - FIFO ordering for replay
//! - In-flight tracking (the one operation currently being awaited)
//! - Requeue at the head when the in-flight operation hits a connectivity
//!   failure, so replay order is preserved across disconnects
//!
//! Items flow through the queue in this order:
//! 1. `enqueue()` - add to the tail
//! 2. `dequeue()` - take the head, mark it in flight
//! 3. `complete()` - the in-flight item finished (success or swallowed error)
//!
//! If the in-flight item must be retried later, call `requeue()` instead of
//! `complete()`; it goes back to the front.

use std::collections::VecDeque;

/// FIFO queue with a single in-flight slot.
#[derive(Debug)]
pub struct OperationQueue<T> {
    /// Items waiting to run.
    queue: VecDeque<T>,
    /// Whether an item has been dequeued and not yet completed or requeued.
    in_flight: bool,
}

impl<T> OperationQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            in_flight: false,
        }
    }

    /// Add an item to the tail.
    pub fn enqueue(&mut self, item: T) {
        self.queue.push_back(item);
    }

    /// Remove and return the head, marking it in flight.
    ///
    /// Returns `None` when the queue is empty or an item is already in
    /// flight; items run one at a time.
    pub fn dequeue(&mut self) -> Option<T> {
        if self.in_flight {
            return None;
        }
        let item = self.queue.pop_front()?;
        self.in_flight = true;
        Some(item)
    }

    /// The in-flight item finished and will not be retried.
    pub fn complete(&mut self) {
        self.in_flight = false;
    }

    /// Put the in-flight item back at the head of the queue.
    pub fn requeue(&mut self, item: T) {
        self.queue.push_front(item);
        self.in_flight = false;
    }

    /// Whether an item is currently in flight.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Number of waiting items (not counting the in-flight one).
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Iterate over waiting items, head first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.queue.iter()
    }

    /// Drop all waiting items.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<T> Default for OperationQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(queue: &OperationQueue<&'static str>) -> Vec<&'static str> {
        queue.iter().copied().collect()
    }

    #[test]
    fn dequeues_in_fifo_order() {
        let mut queue = OperationQueue::new();
        queue.enqueue("op1");
        queue.enqueue("op2");
        queue.enqueue("op3");

        let mut seen = Vec::new();
        while let Some(item) = queue.dequeue() {
            seen.push(item);
            queue.complete();
        }

        assert_eq!(seen, vec!["op1", "op2", "op3"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn one_item_in_flight_at_a_time() {
        let mut queue = OperationQueue::new();
        queue.enqueue("a");
        queue.enqueue("b");

        assert_eq!(queue.dequeue(), Some("a"));
        assert!(queue.is_in_flight());
        assert_eq!(queue.dequeue(), None);

        queue.complete();
        assert_eq!(queue.dequeue(), Some("b"));
    }

    #[test]
    fn requeue_restores_head_position() {
        // [A, B, C]: A completes, B fails and goes back -> [B, C]
        let mut queue = OperationQueue::new();
        queue.enqueue("A");
        queue.enqueue("B");
        queue.enqueue("C");

        let a = queue.dequeue().unwrap();
        assert_eq!(a, "A");
        queue.complete();

        let b = queue.dequeue().unwrap();
        queue.requeue(b);

        assert!(!queue.is_in_flight());
        assert_eq!(contents(&queue), vec!["B", "C"]);
    }

    #[test]
    fn enqueue_while_in_flight_goes_to_tail() {
        let mut queue = OperationQueue::new();
        queue.enqueue("A");
        let a = queue.dequeue().unwrap();

        queue.enqueue("B");
        queue.requeue(a);

        assert_eq!(contents(&queue), vec!["A", "B"]);
    }

    #[test]
    fn dequeue_returns_none_when_empty() {
        let mut queue: OperationQueue<u8> = OperationQueue::new();
        assert!(queue.dequeue().is_none());
        assert!(!queue.is_in_flight());
    }

    #[test]
    fn clear_keeps_in_flight_flag() {
        let mut queue = OperationQueue::new();
        queue.enqueue(1);
        queue.enqueue(2);
        let _ = queue.dequeue();

        queue.clear();

        assert_eq!(queue.len(), 0);
        assert!(queue.is_in_flight());
    }
}

//! Per-user FIFO of messages held while the user has no open connection.

use std::collections::{HashMap, VecDeque};

use dost_core::{OutboundMessage, UserId};

/// Bounded offline queues, one per user.
///
/// Each queue holds at most `capacity` messages; the oldest are evicted first.
#[derive(Debug)]
pub struct OfflineQueue {
    capacity: usize,
    queues: HashMap<UserId, VecDeque<OutboundMessage>>,
}

impl OfflineQueue {
    /// Empty queues holding up to `capacity` messages per user (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            queues: HashMap::new(),
        }
    }

    /// Per-user cap.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a message, then trim from the front back to capacity.
    ///
    /// Returns how many messages were evicted.
    pub fn enqueue(&mut self, user_id: UserId, message: OutboundMessage) -> usize {
        let queue = self.queues.entry(user_id).or_default();
        queue.push_back(message);
        let mut evicted = 0;
        while queue.len() > self.capacity {
            let _ = queue.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Remove and return everything queued for a user, oldest first.
    pub fn flush(&mut self, user_id: UserId) -> Vec<OutboundMessage> {
        self.queues
            .remove(&user_id)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Messages waiting for one user.
    pub fn len(&self, user_id: UserId) -> usize {
        self.queues.get(&user_id).map_or(0, VecDeque::len)
    }

    /// Users with at least one queued message.
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Messages waiting across all users.
    pub fn total(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    /// Drop every queue.
    pub fn clear(&mut self) {
        self.queues.clear();
    }
}

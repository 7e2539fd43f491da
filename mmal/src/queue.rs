// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! FIFO with an abort generation, guarded by the owning pool's lock.

use std::collections::VecDeque;

/// A FIFO of buffer headers.
///
/// The queue does no locking of its own: it lives inside the pool state and
/// is only touched with the pool mutex held. Waiters record [`Queue::epoch`]
/// before blocking and treat a changed epoch as an abort.
#[derive(Debug)]
pub(crate) struct Queue<T> {
    items: VecDeque<T>,
    epoch: u64,
}

impl<T> Queue<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            epoch: 0,
        }
    }

    pub(crate) fn push(&mut self, item: T) {
        self.items.push_back(item);
    }

    pub(crate) fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Removes every queued item, oldest first.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Starts a new generation, so every waiter that recorded the old one gives up.
    pub(crate) fn abort(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut queue = Queue::with_capacity(3);
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.drain().collect::<Vec<_>>(), vec![2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn abort_bumps_epoch_only() {
        let mut queue = Queue::with_capacity(1);
        queue.push("a");
        let before = queue.epoch();
        queue.abort();
        assert_ne!(queue.epoch(), before);
        assert_eq!(queue.len(), 1);
    }
}

//! Bounded outbound frame queue.

use std::collections::VecDeque;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

/// What to do when a slow client lets its outbound queue fill up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Discard the oldest queued frame to make room for the new one.
    #[default]
    DropOldest,
    /// Refuse the new frame and close the session.
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    Queued,
    DroppedOldest,
    Rejected,
}

/// FIFO of encoded frames waiting for the writer.
///
/// Producers never wait: a push either succeeds immediately or applies
/// the overflow policy. The single consumer parks on [`notified`] when the
/// queue is empty.
///
/// [`notified`]: OutboundQueue::notified
#[derive(Debug)]
pub(crate) struct OutboundQueue {
    frames: Mutex<VecDeque<Bytes>>,
    capacity: usize,
    policy: OverflowPolicy,
    notify: Notify,
}

impl OutboundQueue {
    pub(crate) fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity,
            policy,
            notify: Notify::new(),
        }
    }

    pub(crate) fn push(&self, frame: Bytes) -> PushOutcome {
        let outcome = {
            let mut frames = self.frames.lock();
            if frames.len() < self.capacity {
                frames.push_back(frame);
                PushOutcome::Queued
            } else {
                match self.policy {
                    OverflowPolicy::DropOldest => {
                        frames.pop_front();
                        frames.push_back(frame);
                        PushOutcome::DroppedOldest
                    }
                    OverflowPolicy::Disconnect => PushOutcome::Rejected,
                }
            }
        };
        if outcome != PushOutcome::Rejected {
            // Stores a permit if the writer is not parked yet, so a push
            // racing with the writer's emptiness check is never lost.
            self.notify.notify_one();
        }
        outcome
    }

    pub(crate) fn pop(&self) -> Option<Bytes> {
        self.frames.lock().pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub(crate) async fn notified(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(b: u8) -> Bytes {
        Bytes::from(vec![b])
    }

    #[test]
    fn test_fifo_order() {
        let queue = OutboundQueue::new(4, OverflowPolicy::DropOldest);
        for b in 1..=3 {
            assert_eq!(queue.push(frame(b)), PushOutcome::Queued);
        }
        assert_eq!(queue.pop(), Some(frame(1)));
        assert_eq!(queue.pop(), Some(frame(2)));
        assert_eq!(queue.pop(), Some(frame(3)));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_drop_oldest_on_overflow() {
        let queue = OutboundQueue::new(2, OverflowPolicy::DropOldest);
        queue.push(frame(1));
        queue.push(frame(2));
        assert_eq!(queue.push(frame(3)), PushOutcome::DroppedOldest);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(frame(2)));
        assert_eq!(queue.pop(), Some(frame(3)));
    }

    #[test]
    fn test_disconnect_policy_rejects() {
        let queue = OutboundQueue::new(1, OverflowPolicy::Disconnect);
        queue.push(frame(1));
        assert_eq!(queue.push(frame(2)), PushOutcome::Rejected);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(frame(1)));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue = OutboundQueue::new(0, OverflowPolicy::Disconnect);
        assert_eq!(queue.push(frame(1)), PushOutcome::Queued);
    }

    #[tokio::test]
    async fn test_push_before_wait_is_not_lost() {
        let queue = OutboundQueue::new(4, OverflowPolicy::DropOldest);
        queue.push(frame(1));
        // The stored permit makes this return immediately.
        tokio::time::timeout(std::time::Duration::from_secs(1), queue.notified())
            .await
            .expect("permit should be stored");
    }
}

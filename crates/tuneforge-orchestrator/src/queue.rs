//! Pending job queue.
//!
//! Higher priority first; FIFO among equal priorities.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tuneforge_training::JobId;

/// Queue entry ordered for a max-heap.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueuedJob {
    priority: u8,
    seq: u64,
    job_id: JobId,
}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // Priority 10 > priority 1; for equal priority the earlier submission
        // (smaller seq) must compare greater.
        self.priority.cmp(&other.priority).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Priority queue of pending job ids.
#[derive(Debug, Default)]
pub struct PendingQueue {
    heap: BinaryHeap<QueuedJob>,
    next_seq: u64,
}

impl PendingQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, job_id: JobId, priority: u8) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedJob { priority, seq, job_id });
    }

    /// Removes and returns the next job to dispatch.
    pub fn pop(&mut self) -> Option<JobId> {
        self.heap.pop().map(|q| q.job_id)
    }

    /// Removes a job from the queue. Returns `true` if it was queued.
    pub fn remove(&mut self, job_id: &JobId) -> bool {
        let before = self.heap.len();
        self.heap.retain(|q| &q.job_id != job_id);
        before != self.heap.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_higher_priority_first() {
        let mut queue = PendingQueue::new();
        queue.push(JobId::from("low"), 1);
        queue.push(JobId::from("high"), 9);
        queue.push(JobId::from("mid"), 5);

        assert_eq!(queue.pop(), Some(JobId::from("high")));
        assert_eq!(queue.pop(), Some(JobId::from("mid")));
        assert_eq!(queue.pop(), Some(JobId::from("low")));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_fifo_within_priority() {
        let mut queue = PendingQueue::new();
        for name in ["a", "b", "c", "d"] {
            queue.push(JobId::from(name), 5);
        }
        let order: Vec<_> = std::iter::from_fn(|| queue.pop()).map(|id| id.0).collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_remove() {
        let mut queue = PendingQueue::new();
        queue.push(JobId::from("a"), 5);
        queue.push(JobId::from("b"), 5);

        assert!(queue.remove(&JobId::from("a")));
        assert!(!queue.remove(&JobId::from("a")));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(JobId::from("b")));
        assert!(queue.is_empty());
    }
}

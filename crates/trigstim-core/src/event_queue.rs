//! # Timer Event Queue
//!
//! Fixed-capacity, time-ordered queue of pending timer actions. Slots are
//! allocated once at construction and recycled through a free list, so
//! inserting and executing never touches the heap.
//!
//! Events with equal timestamps keep their insertion order.
//!
//! ## Late delay
//!
//! An event is considered due when its time is within `late_delay` of
//! `now`. Waking up for a few microseconds is more expensive than firing
//! slightly early, so near-future events run together with due ones.

use crate::clock::Nanos;
use crate::error::{StimError, StimResult};

#[derive(Debug, Clone, Copy)]
struct Slot<A> {
    at: Nanos,
    action: Option<A>,
    next: Option<usize>,
}

/// Sorted pool-backed queue of `N` timer actions
#[derive(Debug, Clone)]
pub struct EventQueue<A: Copy, const N: usize> {
    slots: [Slot<A>; N],
    head: Option<usize>,
    free: Option<usize>,
    len: usize,
    late_delay: Nanos,
}

impl<A: Copy, const N: usize> EventQueue<A, N> {
    pub fn new(late_delay: Nanos) -> Self {
        let slots = std::array::from_fn(|i| Slot {
            at: 0,
            action: None,
            next: if i + 1 < N { Some(i + 1) } else { None },
        });
        Self {
            slots,
            head: None,
            free: if N > 0 { Some(0) } else { None },
            len: 0,
            late_delay,
        }
    }

    /// Schedule `action` at `at`.
    ///
    /// Returns `true` if the new event became the head of the queue, i.e.
    /// the hardware timer needs re-arming.
    pub fn insert(&mut self, at: Nanos, action: A) -> StimResult<bool> {
        let idx = self.free.ok_or(StimError::QueueFull { capacity: N })?;
        self.free = self.slots[idx].next;
        self.slots[idx].at = at;
        self.slots[idx].action = Some(action);
        self.len += 1;

        let new_head = match self.head {
            Some(head) if self.slots[head].at <= at => {
                let mut cursor = head;
                while let Some(next) = self.slots[cursor].next {
                    if self.slots[next].at > at {
                        break;
                    }
                    cursor = next;
                }
                self.slots[idx].next = self.slots[cursor].next;
                self.slots[cursor].next = Some(idx);
                false
            }
            head => {
                self.slots[idx].next = head;
                self.head = Some(idx);
                true
            }
        };

        debug_assert!(self.is_sorted(), "event queue lost ordering");
        Ok(new_head)
    }

    /// Time the timer should fire next, `None` if nothing is pending.
    ///
    /// An overdue head reports `now + late_delay`.
    pub fn next_event_time(&self, now: Nanos) -> Option<Nanos> {
        self.head.map(|head| {
            let at = self.slots[head].at;
            if at <= now {
                now.saturating_add(self.late_delay)
            } else {
                at
            }
        })
    }

    /// Earliest pending event
    pub fn peek(&self) -> Option<(Nanos, &A)> {
        let head = self.head?;
        let slot = &self.slots[head];
        slot.action.as_ref().map(|a| (slot.at, a))
    }

    /// Check if the head is due at `now`
    pub fn has_due(&self, now: Nanos) -> bool {
        self.peek()
            .map_or(false, |(at, _)| at <= now.saturating_add(self.late_delay))
    }

    /// Pop the head if it is due
    pub fn execute_one(&mut self, now: Nanos) -> Option<(Nanos, A)> {
        let head = self.head?;
        let at = self.slots[head].at;
        if at > now.saturating_add(self.late_delay) {
            return None;
        }

        self.head = self.slots[head].next;
        let action = self.slots[head].action.take();
        self.release(head);
        action.map(|a| (at, a))
    }

    /// Run every due event, re-reading the head after each one.
    ///
    /// Returns the number of events executed.
    pub fn execute_all<F: FnMut(Nanos, A)>(&mut self, now: Nanos, mut f: F) -> usize {
        let mut executed = 0;
        while let Some((at, action)) = self.execute_one(now) {
            f(at, action);
            executed += 1;
        }
        executed
    }

    /// Drop every event matching `predicate`, returning how many went
    pub fn remove_where<P: FnMut(&A) -> bool>(&mut self, mut predicate: P) -> usize {
        let mut removed = 0;
        let mut prev: Option<usize> = None;
        let mut cursor = self.head;

        while let Some(idx) = cursor {
            let next = self.slots[idx].next;
            let hit = self.slots[idx].action.as_ref().map_or(false, &mut predicate);
            if hit {
                match prev {
                    Some(p) => self.slots[p].next = next,
                    None => self.head = next,
                }
                self.slots[idx].action = None;
                self.release(idx);
                removed += 1;
            } else {
                prev = Some(idx);
            }
            cursor = next;
        }
        removed
    }

    /// Drop all pending events
    pub fn clear(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            slot.action = None;
            slot.next = if i + 1 < N { Some(i + 1) } else { None };
        }
        self.head = None;
        self.free = if N > 0 { Some(0) } else { None };
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn late_delay(&self) -> Nanos {
        self.late_delay
    }

    fn release(&mut self, idx: usize) {
        self.slots[idx].next = self.free;
        self.free = Some(idx);
        self.len -= 1;
    }

    /// Check that pending events are in non-decreasing time order
    pub fn is_sorted(&self) -> bool {
        let mut cursor = self.head;
        let mut last = 0;
        let mut seen = 0;
        while let Some(idx) = cursor {
            if self.slots[idx].at < last || seen > N {
                return false;
            }
            last = self.slots[idx].at;
            seen += 1;
            cursor = self.slots[idx].next;
        }
        seen == self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_reports_head() {
        let mut q: EventQueue<u32, 8> = EventQueue::new(0);
        assert!(q.insert(100, 1).unwrap());
        assert!(!q.insert(200, 2).unwrap());
        assert!(q.insert(50, 3).unwrap());
        assert!(!q.insert(150, 4).unwrap());
        assert_eq!(q.len(), 4);
        assert!(q.is_sorted());
        assert_eq!(q.peek(), Some((50, &3)));
    }

    #[test]
    fn test_equal_times_keep_insertion_order() {
        let mut q: EventQueue<u32, 4> = EventQueue::new(0);
        q.insert(10, 1).unwrap();
        q.insert(10, 2).unwrap();
        q.insert(10, 3).unwrap();

        let mut order = Vec::new();
        q.execute_all(10, |_, a| order.push(a));
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_execute_respects_time() {
        let mut q: EventQueue<u32, 4> = EventQueue::new(0);
        q.insert(100, 1).unwrap();
        q.insert(300, 2).unwrap();

        assert_eq!(q.execute_one(99), None);
        assert_eq!(q.execute_one(100), Some((100, 1)));
        assert_eq!(q.execute_one(200), None);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_late_delay() {
        let mut q: EventQueue<u32, 4> = EventQueue::new(10);
        q.insert(105, 1).unwrap();

        assert_eq!(q.next_event_time(50), Some(105));
        assert_eq!(q.next_event_time(120), Some(130));
        // within late delay of now counts as due
        assert_eq!(q.execute_one(96), Some((105, 1)));
        assert_eq!(q.next_event_time(0), None);
    }

    #[test]
    fn test_pool_exhaustion_and_reuse() {
        let mut q: EventQueue<u32, 2> = EventQueue::new(0);
        q.insert(1, 1).unwrap();
        q.insert(2, 2).unwrap();
        let err = q.insert(3, 3).unwrap_err();
        assert_eq!(err, StimError::QueueFull { capacity: 2 });
        assert!(err.is_recoverable());

        assert_eq!(q.execute_all(2, |_, _| {}), 2);
        assert!(q.insert(3, 3).is_ok());
    }

    #[test]
    fn test_remove_where() {
        let mut q: EventQueue<u32, 8> = EventQueue::new(0);
        for (t, a) in [(10, 1), (20, 2), (30, 1), (40, 3)] {
            q.insert(t, a).unwrap();
        }
        assert_eq!(q.remove_where(|a| *a == 1), 2);
        assert_eq!(q.len(), 2);
        assert!(q.is_sorted());
        assert_eq!(q.peek(), Some((20, &2)));
    }

    #[test]
    fn test_clear() {
        let mut q: EventQueue<u32, 3> = EventQueue::new(0);
        q.insert(5, 1).unwrap();
        q.insert(6, 2).unwrap();
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
        for i in 0..3 {
            q.insert(i, 0).unwrap();
        }
    }
}

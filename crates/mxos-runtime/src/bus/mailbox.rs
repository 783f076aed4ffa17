//! Bounded single-producer/single-consumer mailbox.
//!
//! One mailbox carries one direction of one worker's traffic. Two push
//! policies share the same bounded queue:
//!
//! | Policy | When full |
//! |--------|-----------|
//! | [`push_latest`](Mailbox::push_latest) | evict the oldest evictable entry; drop the new one if none |
//! | [`push_control`](Mailbox::push_control) | evict the oldest evictable entry; else wait up to a timeout |
//!
//! "Evictable" is decided by the caller (for the worker uplink it is
//! "is a frame"), so a full queue never loses a control message.
//!
//! Closing a mailbox wakes every waiter. Entries already queued can still
//! be popped after close; new pushes fail.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Result of a successful push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queued without displacing anything.
    Queued,
    /// Queued after evicting the oldest evictable entry.
    Evicted,
    /// Not queued: full and nothing evictable. Only [`Mailbox::push_latest`]
    /// drops.
    Dropped,
}

/// Push failure. Returns the item to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushError<T> {
    Closed(T),
    Timeout(T),
}

/// The mailbox has been closed and is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxClosed;

#[derive(Debug)]
struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
}

/// Bounded queue with latest-wins and bounded-wait push policies.
///
/// # Example
///
/// ```
/// use mxos_runtime::bus::{Mailbox, PushOutcome};
///
/// let mailbox = Mailbox::new(2);
/// let is_even = |n: &u32| n % 2 == 0;
///
/// assert_eq!(mailbox.push_latest(2, is_even), Ok(PushOutcome::Queued));
/// assert_eq!(mailbox.push_latest(3, is_even), Ok(PushOutcome::Queued));
/// // Full: 2 is the oldest evictable entry.
/// assert_eq!(mailbox.push_latest(4, is_even), Ok(PushOutcome::Evicted));
/// assert_eq!(mailbox.drain(10), vec![3, 4]);
/// ```
#[derive(Debug)]
pub struct Mailbox<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    evicted: AtomicU64,
}

impl<T> Mailbox<T> {
    /// Creates a mailbox holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            evicted: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Non-blocking push with latest-wins semantics.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Closed`] if the mailbox is closed.
    pub fn push_latest(
        &self,
        item: T,
        evictable: impl Fn(&T) -> bool,
    ) -> Result<PushOutcome, PushError<T>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PushError::Closed(item));
        }
        let outcome = if state.queue.len() < self.capacity {
            PushOutcome::Queued
        } else if let Some(pos) = state.queue.iter().position(&evictable) {
            state.queue.remove(pos);
            PushOutcome::Evicted
        } else {
            self.evicted.fetch_add(1, Ordering::Relaxed);
            return Ok(PushOutcome::Dropped);
        };
        if outcome == PushOutcome::Evicted {
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        state.queue.push_back(item);
        self.not_empty.notify_one();
        Ok(outcome)
    }

    /// Push that never drops `item`.
    ///
    /// When full, evicts the oldest evictable entry; when nothing is
    /// evictable, waits up to `timeout` for the consumer to make room.
    ///
    /// # Errors
    ///
    /// - [`PushError::Closed`] if the mailbox is (or becomes) closed
    /// - [`PushError::Timeout`] if no room appeared in time
    pub fn push_control(
        &self,
        item: T,
        timeout: Duration,
        evictable: impl Fn(&T) -> bool,
    ) -> Result<PushOutcome, PushError<T>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(PushError::Closed(item));
            }
            if state.queue.len() < self.capacity {
                state.queue.push_back(item);
                self.not_empty.notify_one();
                return Ok(PushOutcome::Queued);
            }
            if let Some(pos) = state.queue.iter().position(&evictable) {
                state.queue.remove(pos);
                self.evicted.fetch_add(1, Ordering::Relaxed);
                state.queue.push_back(item);
                self.not_empty.notify_one();
                return Ok(PushOutcome::Evicted);
            }
            if Instant::now() >= deadline {
                return Err(PushError::Timeout(item));
            }
            self.not_full.wait_until(&mut state, deadline);
        }
    }

    /// Pops the oldest entry without waiting.
    pub fn try_pop(&self) -> Option<T> {
        let item = self.state.lock().queue.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Pops the oldest entry, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `Ok(None)` on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxClosed`] once the mailbox is closed and drained.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<T>, MailboxClosed> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.queue.pop_front() {
                self.not_full.notify_one();
                return Ok(Some(item));
            }
            if state.closed {
                return Err(MailboxClosed);
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            self.not_empty.wait_until(&mut state, deadline);
        }
    }

    /// Pops up to `max` entries without waiting, oldest first.
    pub fn drain(&self, max: usize) -> Vec<T> {
        let mut state = self.state.lock();
        let n = max.min(state.queue.len());
        let items: Vec<T> = state.queue.drain(..n).collect();
        if !items.is_empty() {
            self.not_full.notify_all();
        }
        items
    }

    /// Closes the mailbox and wakes all waiters.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Returns and resets the number of entries evicted or dropped since
    /// the last call.
    pub fn take_evicted(&self) -> u64 {
        self.evicted.swap(0, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn frame(n: &i32) -> bool {
        *n > 0
    }

    #[test]
    fn latest_wins_evicts_oldest_frame() {
        let mb = Mailbox::new(4);
        for seq in 1..=4 {
            assert_eq!(mb.push_latest(seq, frame), Ok(PushOutcome::Queued));
        }
        assert_eq!(mb.push_latest(5, frame), Ok(PushOutcome::Evicted));
        assert_eq!(mb.drain(10), vec![2, 3, 4, 5]);
        assert_eq!(mb.take_evicted(), 1);
        assert_eq!(mb.take_evicted(), 0);
    }

    #[test]
    fn latest_wins_never_displaces_control() {
        // Negative numbers stand for control messages.
        let mb = Mailbox::new(2);
        mb.push_latest(-1, frame).expect("push");
        mb.push_latest(-2, frame).expect("push");
        assert_eq!(mb.push_latest(7, frame), Ok(PushOutcome::Dropped));
        assert_eq!(mb.drain(10), vec![-1, -2]);
        assert_eq!(mb.take_evicted(), 1);
    }

    #[test]
    fn control_push_evicts_frame_before_waiting() {
        let mb = Mailbox::new(2);
        mb.push_latest(1, frame).expect("push");
        mb.push_latest(2, frame).expect("push");
        let outcome = mb.push_control(-9, Duration::ZERO, frame);
        assert_eq!(outcome, Ok(PushOutcome::Evicted));
        assert_eq!(mb.drain(10), vec![2, -9]);
    }

    #[test]
    fn control_push_times_out_when_only_control_is_queued() {
        let mb = Mailbox::new(1);
        mb.push_control(-1, Duration::ZERO, frame).expect("push");
        let started = Instant::now();
        let err = mb.push_control(-2, Duration::from_millis(30), frame);
        assert_eq!(err, Err(PushError::Timeout(-2)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn control_push_proceeds_once_consumer_makes_room() {
        let mb = Arc::new(Mailbox::new(1));
        mb.push_control(-1, Duration::ZERO, frame).expect("push");

        let consumer = {
            let mb = Arc::clone(&mb);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                mb.try_pop()
            })
        };

        let outcome = mb.push_control(-2, Duration::from_secs(2), frame);
        assert_eq!(outcome, Ok(PushOutcome::Queued));
        assert_eq!(consumer.join().expect("consumer"), Some(-1));
        assert_eq!(mb.try_pop(), Some(-2));
    }

    #[test]
    fn close_rejects_pushes_but_keeps_queued_items() {
        let mb = Mailbox::new(4);
        mb.push_latest(1, frame).expect("push");
        mb.close();
        assert!(mb.is_closed());
        assert_eq!(mb.push_latest(2, frame), Err(PushError::Closed(2)));
        assert_eq!(
            mb.push_control(-1, Duration::ZERO, frame),
            Err(PushError::Closed(-1))
        );
        assert_eq!(mb.pop_timeout(Duration::ZERO), Ok(Some(1)));
        assert_eq!(mb.pop_timeout(Duration::ZERO), Err(MailboxClosed));
    }

    #[test]
    fn close_wakes_blocked_receiver() {
        let mb = Arc::new(Mailbox::<i32>::new(1));
        let receiver = {
            let mb = Arc::clone(&mb);
            thread::spawn(move || mb.pop_timeout(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        mb.close();
        assert_eq!(receiver.join().expect("receiver"), Err(MailboxClosed));
    }

    #[test]
    fn pop_timeout_returns_none_when_idle() {
        let mb = Mailbox::<i32>::new(1);
        assert_eq!(mb.pop_timeout(Duration::from_millis(5)), Ok(None));
    }

    #[test]
    fn drain_is_bounded() {
        let mb = Mailbox::new(8);
        for n in 1..=6 {
            mb.push_latest(n, frame).expect("push");
        }
        assert_eq!(mb.drain(4), vec![1, 2, 3, 4]);
        assert_eq!(mb.len(), 2);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mb = Mailbox::<i32>::new(0);
        assert_eq!(mb.capacity(), 1);
    }
}

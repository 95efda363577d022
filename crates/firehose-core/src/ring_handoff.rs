use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicIsize, Ordering};
use std::sync::{Condvar, Mutex};

use crate::backoff::Backoff;

/// A zero-argument unit of work handed from a publisher to a worker.
pub type Task = Box<dyn FnOnce() + Send>;

/// Fixed-capacity multi-consumer task queue with a claim-slot backpressure
/// primitive.
///
/// The slot counter and the task queue are deliberately two separate
/// primitives: `claim_slot` reserves capacity (an `AtomicIsize` bounded
/// decrement), while `push` makes a claimed task visible to workers (a
/// `Mutex<VecDeque<Task>>` + `Condvar`). A publisher must claim a slot
/// before pushing; a worker releases the slot only after finishing the
/// task it popped.
pub struct RingHandoff {
    slots: AtomicIsize,
    queue: Mutex<VecDeque<Task>>,
    not_empty: Condvar,
    release_notify: Condvar,
    release_lock: Mutex<()>,
    closed: AtomicBool,
}

impl RingHandoff {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: AtomicIsize::new(capacity as isize),
            queue: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            release_notify: Condvar::new(),
            release_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Attempts to reserve one slot of capacity. Returns `true` if a slot
    /// was claimed; the caller must eventually `push` a task for each
    /// successful claim.
    pub fn try_claim_slot(&self) -> bool {
        let mut current = self.slots.load(Ordering::Acquire);
        loop {
            if current <= 0 {
                return false;
            }
            match self.slots.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Claims a slot, blocking with adaptive backoff (spin, then yield,
    /// then a bounded condvar wait on the release notification) until one
    /// frees. Returns `false` only if the handoff is closed while waiting.
    pub fn claim_slot_blocking(&self) -> bool {
        let mut backoff = Backoff::new();
        loop {
            if self.try_claim_slot() {
                return true;
            }
            if self.closed.load(Ordering::Acquire) {
                return false;
            }
            if !backoff.is_completed() {
                backoff.snooze();
                continue;
            }
            tracing::trace!("publisher parking on backpressure gate");
            let guard = self.release_lock.lock().unwrap();
            let _ = self
                .release_notify
                .wait_timeout(guard, std::time::Duration::from_millis(5))
                .unwrap();
        }
    }

    /// Pushes a task onto the queue and wakes one waiting worker. Must be
    /// paired with a prior successful slot claim.
    pub fn push(&self, task: Task) {
        let mut queue = self.queue.lock().unwrap();
        queue.push_back(task);
        self.not_empty.notify_one();
    }

    /// Pops the next task, blocking until one is available or the handoff
    /// is closed and drained. Returns `None` once closed with no remaining
    /// work.
    pub fn pop(&self) -> Option<Task> {
        let mut queue = self.queue.lock().unwrap();
        loop {
            if let Some(task) = queue.pop_front() {
                return Some(task);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            queue = self.not_empty.wait(queue).unwrap();
        }
    }

    /// Releases a previously-claimed slot and wakes any publisher parked on
    /// the backpressure gate. Called by a worker once it finishes a task.
    pub fn release_slot(&self) {
        self.slots.fetch_add(1, Ordering::AcqRel);
        let _guard = self.release_lock.lock().unwrap();
        drop(_guard);
        self.release_notify.notify_all();
    }

    /// Signals shutdown: no further tasks will be admitted, but `pop`
    /// continues to drain whatever remains in the queue before returning
    /// `None`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let queue = self.queue.lock().unwrap();
        drop(queue);
        self.not_empty.notify_all();
        let guard = self.release_lock.lock().unwrap();
        drop(guard);
        self.release_notify.notify_all();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn available_slots(&self) -> isize {
        self.slots.load(Ordering::Acquire)
    }
}

//! Ticket-ordered mutual exclusion.
//!
//! A plain mutex lets a caller that loses the low-level lock race be served
//! before an earlier-enqueued caller, which would break "first reporter
//! wins". `FairQueue` serves critical sections strictly in enqueue order:
//! a caller takes a ticket, sleeps until it is both at the head of the queue
//! and the exclusion token is free, runs its action, and wakes only the next
//! ticket holder.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

pub struct FairQueue {
    state: Mutex<State>,
    /// Signalled whenever the queue empties and the token is released.
    idle: Notify,
}

struct State {
    next_seq: u64,
    busy: bool,
    waiters: VecDeque<Waiter>,
}

struct Waiter {
    seq: u64,
    wake: Arc<Notify>,
}

impl Default for FairQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FairQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_seq: 0,
                busy: false,
                waiters: VecDeque::new(),
            }),
            idle: Notify::new(),
        }
    }

    /// Run `action` exclusively, served in enqueue order across all callers.
    /// Must not be called recursively from inside `action`.
    pub async fn run<T>(&self, ticket: &str, action: impl FnOnce() -> T) -> T {
        let (seq, wake) = {
            let mut state = self.state.lock().unwrap();
            let seq = state.next_seq;
            state.next_seq += 1;
            let wake = Arc::new(Notify::new());
            state.waiters.push_back(Waiter {
                seq,
                wake: Arc::clone(&wake),
            });
            (seq, wake)
        };

        loop {
            {
                let mut state = self.state.lock().unwrap();
                if !state.busy && state.waiters.front().map(|w| w.seq) == Some(seq) {
                    state.waiters.pop_front();
                    state.busy = true;
                    break;
                }
            }
            // notify_one stores a permit, so a wake between the check above
            // and this await is not lost.
            wake.notified().await;
        }

        tracing::trace!(ticket, seq, "fair queue turn");
        let _release = ReleaseGuard { queue: self };
        action()
    }

    /// Wait until no ticket is queued and no critical section is executing.
    pub async fn drain(&self) {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            // Register before checking, otherwise a release between the
            // check and the await would not wake us.
            idle.as_mut().enable();
            {
                let state = self.state.lock().unwrap();
                if !state.busy && state.waiters.is_empty() {
                    return;
                }
            }
            idle.await;
        }
    }
}

/// Releases the token when the critical section ends, including on panic.
struct ReleaseGuard<'a> {
    queue: &'a FairQueue,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        let state = &mut *self.queue.state.lock().unwrap();
        state.busy = false;
        match state.waiters.front() {
            Some(head) => head.wake.notify_one(),
            None => self.queue.idle.notify_waiters(),
        }
    }
}

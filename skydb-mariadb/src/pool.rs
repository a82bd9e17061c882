//! Bounded pool of authenticated sessions with per-thread affinity.
//!
//! Per-thread pinning is an explicit `HashMap<ThreadId, _>` owned by the
//! pool rather than thread-specific storage, guarded by one mutex and one
//! condition variable for the capacity wait.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use skydb_core::{ConnectOptions, Error, Result};

use crate::session::Session;

struct State {
    live_count: u32,
    available: VecDeque<Session>,
    /// Sessions pinned to a thread across a transaction or table-lock scope.
    thread_pin: HashMap<ThreadId, Session>,
}

pub(crate) struct PoolInner {
    opts: ConnectOptions,
    state: Mutex<State>,
    capacity_cv: Condvar,
}

/// One per `Database` handle.
#[derive(Clone)]
pub(crate) struct Pool {
    inner: Arc<PoolInner>,
}

thread_local! {
    static THREAD_GUARD: RefCell<Vec<Weak<PoolInner>>> = RefCell::new(Vec::new());
}

/// On thread exit, returns any session this thread still has pinned in any
/// pool it touched back to that pool's `available` queue.
struct ThreadExitGuard;

impl Drop for ThreadExitGuard {
    fn drop(&mut self) {
        let id = thread::current().id();
        THREAD_GUARD.with(|pools| {
            for weak in pools.borrow().iter() {
                if let Some(inner) = weak.upgrade() {
                    let mut state = inner.state.lock().unwrap();
                    if let Some(session) = state.thread_pin.remove(&id) {
                        state.available.push_back(session);
                        inner.capacity_cv.notify_one();
                    }
                }
            }
        });
    }
}

thread_local! {
    static EXIT_GUARD: ThreadExitGuard = ThreadExitGuard;
}

impl Pool {
    pub(crate) fn new(opts: ConnectOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                opts,
                state: Mutex::new(State {
                    live_count: 0,
                    available: VecDeque::new(),
                    thread_pin: HashMap::new(),
                }),
                capacity_cv: Condvar::new(),
            }),
        })
    }

    fn register_thread_exit_cleanup(&self) {
        EXIT_GUARD.with(|_| {});
        THREAD_GUARD.with(|pools| {
            let mut pools = pools.borrow_mut();
            let already = pools.iter().any(|w| w.as_ptr() == Arc::as_ptr(&self.inner));
            if !already {
                pools.push(Arc::downgrade(&self.inner));
            }
        });
    }

    /// Acquires a session for the current thread: its pinned session, if
    /// any; else one popped from `available`; else a freshly opened one
    /// (if under `max_sessions`); else waits on the capacity condvar.
    pub(crate) fn acquire(&self) -> Result<Session> {
        let thread_id = thread::current().id();
        let deadline = Instant::now() + Duration::from_millis(self.inner.opts.pool_acquire_timeout_ms);

        let mut state = self.inner.state.lock().unwrap();

        if let Some(session) = state.thread_pin.remove(&thread_id) {
            return Ok(session);
        }

        loop {
            if let Some(session) = state.available.pop_front() {
                return Ok(session);
            }

            if state.live_count < self.inner.opts.max_sessions {
                state.live_count += 1;
                drop(state);
                return match Session::connect(&self.inner.opts) {
                    Ok(session) => Ok(session),
                    Err(err) => {
                        let mut state = self.inner.state.lock().unwrap();
                        state.live_count -= 1;
                        self.inner.capacity_cv.notify_one();
                        Err(err)
                    }
                };
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::ResourceExhausted);
            }

            let (guard, timeout_result) =
                self.inner.capacity_cv.wait_timeout(state, deadline - now).unwrap();
            state = guard;
            if timeout_result.timed_out() && state.available.is_empty() && state.live_count >= self.inner.opts.max_sessions {
                return Err(Error::ResourceExhausted);
            }
        }
    }

    /// Returns a session after use. `pin` keeps it bound to the calling
    /// thread (an open transaction or table lock); otherwise it rejoins
    /// `available` and a capacity waiter is woken.
    pub(crate) fn release(&self, session: Session, pin: bool) {
        let thread_id = thread::current().id();
        let mut state = self.inner.state.lock().unwrap();

        if pin {
            self.register_thread_exit_cleanup();
            state.thread_pin.insert(thread_id, session);
        } else {
            state.available.push_back(session);
            self.inner.capacity_cv.notify_one();
        }
    }

    /// Destroys a broken session: closes it and frees its pool slot.
    pub(crate) fn destroy(&self, session: Session) {
        session.close();
        let mut state = self.inner.state.lock().unwrap();
        state.live_count = state.live_count.saturating_sub(1);
        self.inner.capacity_cv.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_rejects_zero_sized_capacity() {
        let opts = ConnectOptions::new().max_sessions(0);
        assert!(Pool::new(opts).is_err());
    }
}

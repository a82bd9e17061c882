//! Table-scope and record-scope ownership registries, keyed by thread
//! identity and guarded by one mutex plus a condition variable.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};

/// A composed record-lock key: `db\0table\0field\0value-bytes`.
pub(crate) fn record_key(db: &str, table: &str, field: &str, value: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(db.len() + table.len() + field.len() + value.len() + 3);
    key.extend_from_slice(db.as_bytes());
    key.push(0);
    key.extend_from_slice(table.as_bytes());
    key.push(0);
    key.extend_from_slice(field.as_bytes());
    key.push(0);
    key.extend_from_slice(value);
    key
}

pub(crate) fn table_key(db: &str, table: &str) -> String {
    format!("{}.{}", db, table)
}

#[derive(Default)]
struct State {
    locked_tables: HashMap<String, ThreadId>,
    locked_records: HashMap<Vec<u8>, ThreadId>,
}

pub(crate) struct LockManager {
    state: Mutex<State>,
    cv: Condvar,
}

impl LockManager {
    pub(crate) fn new() -> Self {
        Self { state: Mutex::new(State::default()), cv: Condvar::new() }
    }

    /// Blocks while any key in `keys` is owned by a different thread, then
    /// inserts the current thread as owner of all of them atomically.
    pub(crate) fn lock_tables(&self, keys: &[String]) -> Vec<String> {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap();

        loop {
            let contended = keys.iter().any(|k| {
                state.locked_tables.get(k).map(|owner| *owner != me).unwrap_or(false)
            });

            if !contended {
                for key in keys {
                    state.locked_tables.insert(key.clone(), me);
                }
                return keys.to_vec();
            }

            log::debug!("table lock contended, waiting: {:?}", keys);
            state = self.cv.wait(state).unwrap();
        }
    }

    pub(crate) fn unlock_tables(&self, keys: &[String]) {
        let mut state = self.state.lock().unwrap();
        for key in keys {
            state.locked_tables.remove(key);
        }
        drop(state);
        self.cv.notify_all();
    }

    pub(crate) fn lock_records(&self, keys: &[Vec<u8>]) -> Vec<Vec<u8>> {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap();

        loop {
            let contended = keys.iter().any(|k| {
                state.locked_records.get(k).map(|owner| *owner != me).unwrap_or(false)
            });

            if !contended {
                for key in keys {
                    state.locked_records.insert(key.clone(), me);
                }
                return keys.to_vec();
            }

            log::debug!("record lock contended, waiting ({} keys)", keys.len());
            state = self.cv.wait(state).unwrap();
        }
    }

    pub(crate) fn unlock_records(&self, keys: &[Vec<u8>]) {
        let mut state = self.state.lock().unwrap();
        for key in keys {
            state.locked_records.remove(key);
        }
        drop(state);
        self.cv.notify_all();
    }

    /// Releases every table/record lock held by the current thread
    /// (used when a pinned session's thread exits without an explicit unlock).
    pub(crate) fn release_all_for_current_thread(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap();
        state.locked_tables.retain(|_, owner| *owner != me);
        state.locked_records.retain(|_, owner| *owner != me);
        drop(state);
        self.cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn table_lock_round_trips() {
        let mgr = LockManager::new();
        let handle = mgr.lock_tables(&["db.t".to_string()]);
        mgr.unlock_tables(&handle);
        let state = mgr.state.lock().unwrap();
        assert!(state.locked_tables.is_empty());
    }

    #[test]
    fn second_thread_blocks_until_first_unlocks() {
        let mgr = Arc::new(LockManager::new());
        let key = record_key("db", "t", "pk", b"42");

        let handle = mgr.lock_records(&[key.clone()]);

        let unblocked = Arc::new(AtomicBool::new(false));
        let mgr2 = mgr.clone();
        let unblocked2 = unblocked.clone();
        let key2 = key.clone();
        let t = thread::spawn(move || {
            mgr2.lock_records(&[key2]);
            unblocked2.store(true, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!unblocked.load(Ordering::SeqCst));

        mgr.unlock_records(&handle);
        t.join().unwrap();
        assert!(unblocked.load(Ordering::SeqCst));
    }
}

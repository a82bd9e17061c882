//! The polymorphic `Database` façade: a single operation surface wired on
//! top of the pool, lock manager, SQL builder, and wire codec.
//!
//! One `Database` owns exactly one connection [`Pool`](crate::pool::Pool),
//! one [`LockManager`](crate::lock::LockManager), a per-`"db.table"`
//! `DESCRIBE` cache, and the per-thread transaction/lock-scope bookkeeping
//! that decides whether a session is returned to the pool or stays pinned.

mod crud;
mod ddl;

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use skydb_core::{ConnectOptions, Error, Result, Value};

use crate::lock::{self, LockManager};
use crate::logging;
use crate::pool::Pool;
use crate::result::{DbResult, ResultBackend};
use crate::session::QueryOutcome;
use crate::sql::ident::qualified_table_name;

/// `Database::lock_tables` returns one of these; pass it back to
/// `unlock_tables` to release the scope.
#[derive(Debug, Clone)]
pub struct TableLockHandle {
    keys: Vec<String>,
}

/// `Database::lock_records` returns one of these; pass it back to
/// `unlock_records` to release the scope.
#[derive(Debug, Clone)]
pub struct RecordLockHandle {
    keys: Vec<Vec<u8>>,
}

/// Per-thread "pinned session / transaction depth / tables locked" state,
/// owned explicitly by the `Database` as a `HashMap<ThreadId, _>` rather
/// than living in real thread-local storage.
#[derive(Default)]
struct DispatchState {
    /// Re-entrant; shared by explicit `start_transaction` and by
    /// `lock_tables`, which also wraps its scope in a transaction so the
    /// table lock survives across statements.
    tx_depth: u32,
    table_keys: Vec<String>,
    record_keys: Vec<Vec<u8>>,
}

impl DispatchState {
    fn should_pin(&self) -> bool {
        self.tx_depth > 0 || !self.table_keys.is_empty()
    }
}

struct Inner {
    pool: Pool,
    locks: LockManager,
    instance_suffix: String,
    default_database: Option<String>,
    describe_cache: Mutex<HashMap<String, DbResult>>,
    dispatch: Mutex<HashMap<ThreadId, DispatchState>>,
}

/// The façade handle applications hold. Cheap to clone; every clone shares
/// the same pool, lock registries, and dispatch state.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

/// Slow-query escalation threshold: a flat one-second cutoff.
const SLOW_QUERY_THRESHOLD: Duration = Duration::from_secs(1);

thread_local! {
    static DATABASE_GUARD: RefCell<Vec<Weak<Inner>>> = RefCell::new(Vec::new());
}

/// On thread exit, releases every table/record lock this thread still holds
/// on every `Database` it touched — symmetric with the pool's own
/// pinned-session thread-exit cleanup (spec §4.7 "removed symmetrically on
/// unlock or on pinned-session release").
struct DatabaseExitGuard;

impl Drop for DatabaseExitGuard {
    fn drop(&mut self) {
        DATABASE_GUARD.with(|dbs| {
            for weak in dbs.borrow().iter() {
                if let Some(inner) = weak.upgrade() {
                    inner.locks.release_all_for_current_thread();
                    inner.dispatch.lock().unwrap().remove(&thread::current().id());
                }
            }
        });
    }
}

thread_local! {
    static DATABASE_EXIT_GUARD: DatabaseExitGuard = DatabaseExitGuard;
}

impl Database {
    pub fn connect(opts: ConnectOptions) -> Result<Self> {
        opts.validate()?;
        let instance_suffix = opts.instance_suffix.clone();
        let default_database = opts.database.clone();
        let pool = Pool::new(opts)?;
        Ok(Self {
            inner: Arc::new(Inner {
                pool,
                locks: LockManager::new(),
                instance_suffix,
                default_database,
                describe_cache: Mutex::new(HashMap::new()),
                dispatch: Mutex::new(HashMap::new()),
            }),
        })
    }

    fn qualify(&self, db_name: &str) -> String {
        crate::sql::ident::qualified_database_name(db_name, &self.inner.instance_suffix)
    }

    fn qualify_table(&self, db_name: &str, table_name: &str) -> String {
        qualified_table_name(db_name, &self.inner.instance_suffix, table_name)
    }

    fn cache_key(&self, db_name: &str, table_name: &str) -> String {
        format!("{}.{}", db_name, table_name)
    }

    fn invalidate_describe(&self, db_name: &str, table_name: &str) {
        self.inner.describe_cache.lock().unwrap().remove(&self.cache_key(db_name, table_name));
    }

    /// Registers this thread for lock-registry cleanup on exit. Idempotent
    /// per `(thread, Database)` pair.
    fn register_thread_exit_cleanup(&self) {
        DATABASE_EXIT_GUARD.with(|_| {});
        DATABASE_GUARD.with(|dbs| {
            let mut dbs = dbs.borrow_mut();
            let already = dbs.iter().any(|w| w.as_ptr() == Arc::as_ptr(&self.inner));
            if !already {
                dbs.push(Arc::downgrade(&self.inner));
            }
        });
    }

    /// Runs `f` against a pooled session, applying the façade's one-retry
    /// policy (spec §4.8 step 5): a `ConnectionLost`/`ProtocolError`
    /// destroys the broken session and retries exactly once on a fresh one;
    /// any other error, or a second failure, is surfaced as-is.
    fn with_session<T>(&self, sql: &str, f: impl Fn(&mut crate::session::Session) -> Result<T>) -> Result<T> {
        let pin = self.inner.dispatch.lock().unwrap().get(&thread::current().id()).map(DispatchState::should_pin).unwrap_or(false);

        let mut session = self.inner.pool.acquire()?;
        let started = Instant::now();
        let first = f(&mut session);

        match first {
            Ok(value) => {
                logging::log_execution(sql, started.elapsed(), SLOW_QUERY_THRESHOLD);
                self.release_session(session, pin);
                Ok(value)
            }
            Err(err) if err.is_retryable() => {
                log::warn!("retrying after {:?} on a fresh session", err);
                self.inner.pool.destroy(session);

                let mut retry_session = self.inner.pool.acquire()?;
                let retry_started = Instant::now();
                match f(&mut retry_session) {
                    Ok(value) => {
                        logging::log_execution(sql, retry_started.elapsed(), SLOW_QUERY_THRESHOLD);
                        self.release_session(retry_session, pin);
                        Ok(value)
                    }
                    Err(retry_err) => {
                        if retry_err.is_retryable() {
                            self.inner.pool.destroy(retry_session);
                        } else {
                            self.release_session(retry_session, pin);
                        }
                        Err(retry_err)
                    }
                }
            }
            Err(err) => {
                self.release_session(session, pin);
                Err(err)
            }
        }
    }

    fn release_session(&self, session: crate::session::Session, pin: bool) {
        self.inner.pool.release(session, pin);
    }

    fn execute(&self, sql: &str) -> Result<u64> {
        self.with_session(sql, |session| match session.query(sql)? {
            QueryOutcome::Ok(ok) => Ok(ok.affected_rows),
            QueryOutcome::Empty => Ok(0),
            QueryOutcome::ResultSet { .. } => Ok(0),
        })
    }

    fn query_result_set(&self, sql: &str) -> Result<DbResult> {
        self.with_session(sql, |session| match session.query(sql)? {
            QueryOutcome::ResultSet { columns, rows } => {
                let names = columns.iter().map(|c| c.name.clone()).collect();
                let types = columns.iter().map(|c| c.column_type.type_descriptor()).collect();
                Ok(DbResult::new(names, types, rows))
            }
            QueryOutcome::Ok(_) | QueryOutcome::Empty => Ok(DbResult::empty()),
        })
    }

    /// Attaches provenance and the `ResultBackend` weak reference so
    /// `DbResult::update` can push changes back through this `Database`.
    fn attach(&self, mut result: DbResult, db_name: &str, table_name: &str, primary_key_columns: Vec<usize>) -> DbResult {
        result.db_name = Some(db_name.to_string());
        result.table_name = Some(table_name.to_string());
        result.primary_key_columns = primary_key_columns;
        let backend: Arc<dyn ResultBackend> = self.inner.clone();
        result.backend = Some(Arc::downgrade(&backend));
        result
    }

    // ---- transactions (spec §4.8 "Transaction commands") ----

    pub fn start_transaction(&self) -> Result<()> {
        let needs_begin = {
            let mut dispatch = self.inner.dispatch.lock().unwrap();
            let state = dispatch.entry(thread::current().id()).or_default();
            let needs_begin = state.tx_depth == 0;
            state.tx_depth += 1;
            needs_begin
        };

        if needs_begin {
            if let Err(err) = self.execute("START TRANSACTION") {
                let mut dispatch = self.inner.dispatch.lock().unwrap();
                if let Some(state) = dispatch.get_mut(&thread::current().id()) {
                    state.tx_depth = state.tx_depth.saturating_sub(1);
                }
                return Err(err);
            }
        }

        Ok(())
    }

    pub fn commit_transaction(&self) -> Result<()> {
        self.end_transaction("COMMIT")
    }

    pub fn rollback_transaction(&self) -> Result<()> {
        self.end_transaction("ROLLBACK")
    }

    /// Decrements the shared transaction-depth counter and, on the 1→0
    /// transition, issues `sql` ("COMMIT"/"ROLLBACK"). That dispatch itself
    /// recomputes `pin` from the now-decremented depth, so when no table
    /// lock is still held the session is unpinned as a side effect of
    /// sending the command — no separate release step is needed.
    fn end_transaction(&self, sql: &str) -> Result<()> {
        let should_issue = {
            let mut dispatch = self.inner.dispatch.lock().unwrap();
            let id = thread::current().id();
            let state = match dispatch.get_mut(&id) {
                Some(state) if state.tx_depth > 0 => state,
                _ => return Err(Error::InvalidArgument("no open transaction on this thread".into())),
            };
            state.tx_depth -= 1;
            let done = state.tx_depth == 0;
            if done && state.table_keys.is_empty() && state.record_keys.is_empty() {
                dispatch.remove(&id);
            }
            done
        };

        if should_issue {
            self.execute(sql)?;
        }

        Ok(())
    }

    // ---- table locks (spec §4.7) ----

    pub fn lock_tables(&self, tables: &[(&str, &str)]) -> Option<TableLockHandle> {
        if tables.is_empty() {
            return None;
        }

        let keys: Vec<String> = tables
            .iter()
            .map(|(db, table)| lock::table_key(&self.qualify(db), table))
            .collect();

        let granted = self.inner.locks.lock_tables(&keys);
        self.register_thread_exit_cleanup();

        let needs_begin = {
            let mut dispatch = self.inner.dispatch.lock().unwrap();
            let state = dispatch.entry(thread::current().id()).or_default();
            let needs_begin = state.tx_depth == 0;
            state.tx_depth += 1;
            state.table_keys.extend(granted.iter().cloned());
            needs_begin
        };

        if needs_begin {
            if self.execute("START TRANSACTION").is_err() {
                self.inner.locks.unlock_tables(&granted);
                let mut dispatch = self.inner.dispatch.lock().unwrap();
                if let Some(state) = dispatch.get_mut(&thread::current().id()) {
                    state.tx_depth = state.tx_depth.saturating_sub(1);
                    state.table_keys.retain(|k| !granted.contains(k));
                }
                return None;
            }
        }

        Some(TableLockHandle { keys: granted })
    }

    pub fn unlock_tables(&self, handle: TableLockHandle) {
        self.inner.locks.unlock_tables(&handle.keys);

        let should_commit = {
            let mut dispatch = self.inner.dispatch.lock().unwrap();
            let id = thread::current().id();
            let state = match dispatch.get_mut(&id) {
                Some(state) => state,
                None => return,
            };
            state.table_keys.retain(|k| !handle.keys.contains(k));
            state.tx_depth = state.tx_depth.saturating_sub(1);
            let done = state.tx_depth == 0;
            if done && state.table_keys.is_empty() && state.record_keys.is_empty() {
                dispatch.remove(&id);
            }
            done
        };

        if should_commit {
            let _ = self.execute("COMMIT");
        }
    }

    // ---- record locks (spec §4.7) ----

    pub fn lock_records(&self, db_name: &str, table_name: &str, criteria: &[(&str, Value)]) -> Option<RecordLockHandle> {
        if criteria.is_empty() {
            return None;
        }

        let qualified_db = self.qualify(db_name);
        let keys: Vec<Vec<u8>> = criteria
            .iter()
            .map(|(field, value)| lock::record_key(&qualified_db, table_name, field, &value_bytes(value)))
            .collect();

        let granted = self.inner.locks.lock_records(&keys);
        self.register_thread_exit_cleanup();

        let mut dispatch = self.inner.dispatch.lock().unwrap();
        let state = dispatch.entry(thread::current().id()).or_default();
        state.record_keys.extend(granted.iter().cloned());

        Some(RecordLockHandle { keys: granted })
    }

    pub fn unlock_records(&self, handle: RecordLockHandle) {
        self.inner.locks.unlock_records(&handle.keys);

        // Record locks never pin a session (spec §8's invariant ties
        // `thread_pin` only to transaction depth and table locks), so
        // there is nothing to release here beyond the registry entries.
        let mut dispatch = self.inner.dispatch.lock().unwrap();
        let id = thread::current().id();
        if let Some(state) = dispatch.get_mut(&id) {
            state.record_keys.retain(|k| !handle.keys.contains(k));
            if !state.should_pin() && state.record_keys.is_empty() {
                dispatch.remove(&id);
            }
        }
    }
}

impl ResultBackend for Inner {
    fn update_by_primary_key(
        &self,
        db_name: &str,
        table_name: &str,
        primary_key: &[(String, Value)],
        updates: &[(String, Value)],
    ) -> Result<()> {
        let db_table = qualified_table_name(db_name, &self.instance_suffix, table_name);

        let set: Vec<(&str, Value)> = updates.iter().map(|(f, v)| (f.as_str(), v.clone())).collect();
        let criteria: Vec<(&str, Value)> = primary_key.iter().map(|(f, v)| (f.as_str(), v.clone())).collect();
        let sql = crate::sql::builder::update(&db_table, &set, &criteria)?;

        // `Inner` cannot call back into `Database::execute` (that would
        // need an `Arc<Database>` cycle); the bare dispatch below is the
        // same acquire/send/release sequence without the retry/logging
        // wrapper, which is acceptable here since `update()` is already a
        // best-effort side channel per spec §4.6.
        let mut session = self.pool.acquire()?;
        let outcome = session.query(&sql);
        match outcome {
            Ok(_) => {
                self.pool.release(session, false);
                Ok(())
            }
            Err(err) if err.is_retryable() => {
                self.pool.destroy(session);
                Err(err)
            }
            Err(err) => {
                self.pool.release(session, false);
                Err(err)
            }
        }
    }
}

/// Renders a `Value` as raw bytes for composing a record-lock key (spec
/// §3: `db || 0 || table || 0 || field || 0 || value-bytes`).
fn value_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::Str(s) => s.as_bytes().to_vec(),
        Value::Bytes(b) => b.clone(),
        other => crate::sql::literal::render_value(other).into_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_state_pins_only_when_transacting_or_table_locked() {
        let mut state = DispatchState::default();
        assert!(!state.should_pin());
        state.tx_depth = 1;
        assert!(state.should_pin());
        state.tx_depth = 0;
        state.table_keys.push("db.t".to_string());
        assert!(state.should_pin());
    }
}

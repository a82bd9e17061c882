//! Blocking MariaDB/MySQL wire-protocol driver, connection pool, and CRUD
//! façade. Every operation runs on the calling OS thread and blocks on
//! socket I/O; there is no async runtime anywhere in this crate.
//!
//! The entry point is [`Database::connect`]; everything else (pooling, wire
//! codec, lock manager, SQL builder) is an implementation detail reachable
//! only through the façade.

mod auth;
mod database;
mod io;
mod lock;
mod logging;
mod pool;
mod protocol;
mod result;
mod session;
mod sql;
mod stream;

pub use database::{Database, RecordLockHandle, TableLockHandle};
pub use result::DbResult;

pub use skydb_core::{
    ConnectOptions, Credentials, Dictionary, Error, HashKind, Result, TypeDescriptor, Value,
};

//! Shared connection options, error taxonomy, and value model used by both
//! the wire-protocol driver and anything built against the `Database` façade.

pub mod connect;
pub mod dict;
pub mod error;
pub mod value;

pub use connect::{ConnectOptions, Credentials, HashKind};
pub use dict::Dictionary;
pub use error::{Error, Result};
pub use value::{TypeDescriptor, Value};

//! Error and Result types shared by the façade and the wire-protocol driver.

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::io;

/// A specialized `Result` type used throughout skydb.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every way a façade or driver call can fail.
#[derive(Debug)]
pub enum Error {
    /// Caller-side precondition failure; never touches the wire.
    InvalidArgument(String),

    /// The server rejected login, or the protocol desynced during login.
    HandshakeFailed { code: u16, sqlstate: Option<String>, message: String },

    /// A send/receive failed or the peer closed the connection mid-stream.
    ConnectionLost,

    /// Unexpected frame shape, out-of-sequence packet, or malformed metadata.
    ProtocolError(String),

    /// A well-formed Error packet was returned by the server.
    ServerError { code: u16, sqlstate: Option<String>, message: String },

    /// The query-response deadline was exceeded.
    Timeout,

    /// A pool wait timed out.
    ResourceExhausted,

    /// `DbResult::update` was called after its parent `Database` was dropped.
    DatabaseGone,

    /// Lower-level I/O error not otherwise classified above.
    Io(io::Error),

    /// Connection address failed to parse.
    UrlParse(url::ParseError),

    /// Error produced by the TLS layer during upgrade.
    TlsUpgrade(Box<dyn StdError + Send + Sync>),
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(error) => Some(error),
            Error::UrlParse(error) => Some(error),
            Error::TlsUpgrade(error) => Some(&**error),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::HandshakeFailed { code, sqlstate, message } => write!(
                f,
                "handshake failed ({}{}): {}",
                code,
                sqlstate.as_deref().map(|s| format!("/{}", s)).unwrap_or_default(),
                message
            ),
            Error::ConnectionLost => f.write_str("connection to the server was lost"),
            Error::ProtocolError(msg) => write!(f, "protocol error: {}", msg),
            Error::ServerError { code, sqlstate, message } => write!(
                f,
                "server error ({}{}): {}",
                code,
                sqlstate.as_deref().map(|s| format!("/{}", s)).unwrap_or_default(),
                message
            ),
            Error::Timeout => f.write_str("query response timed out"),
            Error::ResourceExhausted => f.write_str("timed out waiting for a pooled session"),
            Error::DatabaseGone => f.write_str("parent database handle has been dropped"),
            Error::Io(error) => write!(f, "{}", error),
            Error::UrlParse(error) => write!(f, "{}", error),
            Error::TlsUpgrade(error) => write!(f, "error during TLS upgrade: {}", error),
        }
    }
}

impl Error {
    /// True for the two error kinds the façade retries exactly once on a fresh session.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConnectionLost | Error::ProtocolError(_))
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<io::ErrorKind> for Error {
    #[inline]
    fn from(err: io::ErrorKind) -> Self {
        Error::Io(err.into())
    }
}

impl From<url::ParseError> for Error {
    #[inline]
    fn from(err: url::ParseError) -> Self {
        Error::UrlParse(err)
    }
}

//! Mapping of `sqlx` errors onto the transport/store split.

use std::time::Duration;

use rplwatch_core::SessionError;
use sqlx::mysql::MySqlDatabaseError;

/// `ER_PARSE_ERROR`: the server did not understand the statement.
pub const ER_PARSE_ERROR: u16 = 1064;

/// `ER_UNKNOWN_SYSTEM_VARIABLE`: e.g. `sql_replica_skip_counter` before
/// MySQL 8.0.26, or on MariaDB.
pub const ER_UNKNOWN_SYSTEM_VARIABLE: u16 = 1193;

/// Classify a `sqlx` error.
///
/// Errors the server returned are store errors. Anything that means the
/// connection itself is unusable is a transport error.
pub fn classify(err: sqlx::Error) -> SessionError {
    match err {
        sqlx::Error::Database(db) => SessionError::store(db.to_string()),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => SessionError::transport(err.to_string()),
        other => SessionError::store(other.to_string()),
    }
}

/// MySQL error number of a server-side error.
pub fn error_number(err: &sqlx::Error) -> Option<u16> {
    match err {
        sqlx::Error::Database(db) => db
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(MySqlDatabaseError::number),
        _ => None,
    }
}

/// The error reported when a statement outlives its deadline. The link is
/// presumed dead, so it classifies as transport.
pub fn timed_out(sql: &str, after: Duration) -> sqlx::Error {
    sqlx::Error::Io(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        format!("{sql} timed out after {after:?}"),
    ))
}

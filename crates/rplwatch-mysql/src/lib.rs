//! rplwatch-mysql — MySQL implementation of the rplwatch session traits.
//!
//! - **connector**: [`MysqlConnector`] / [`MysqlSession`] over a single
//!   `sqlx` connection
//! - **status**: replica status rows → [`rplwatch_core::StatusSample`],
//!   for both the `SHOW REPLICA STATUS` and `SHOW SLAVE STATUS` column sets
//! - **error**: `sqlx::Error` → transport or store [`rplwatch_core::SessionError`]

pub mod connector;
pub mod error;
pub mod status;

pub use connector::{MysqlConnector, MysqlSession};
pub use status::{Dialect, Statement, StatusRow, sample_from_rows};

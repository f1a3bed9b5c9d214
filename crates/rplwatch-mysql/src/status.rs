//! Replica status rows and the statement set for each server dialect.

use std::collections::HashMap;

use rplwatch_core::{ChannelStatus, Endpoint, LogPosition, SessionError, StatusSample};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row};
use tracing::debug;

use crate::error::{ER_PARSE_ERROR, ER_UNKNOWN_SYSTEM_VARIABLE};

/// Which generation of replication statements the server speaks.
///
/// MySQL 8.0.22 renamed `SLAVE` statements and columns to `REPLICA` /
/// `Source_*`; the skip counter followed only in 8.0.26, and MariaDB never
/// renamed it. Older servers only accept the legacy forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Replica,
    Legacy,
}

/// The statements the session sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement {
    Status,
    Skip,
    Resume,
}

impl Dialect {
    pub fn statement(&self, statement: Statement) -> &'static str {
        match statement {
            Statement::Status => self.status_query(),
            Statement::Skip => self.skip_statement(),
            Statement::Resume => self.resume_statement(),
        }
    }

    /// Dialect to retry with after the server rejected `statement` in this
    /// dialect with MySQL error `errno`.
    pub fn fallback(&self, statement: Statement, errno: u16) -> Option<Dialect> {
        match (self, statement, errno) {
            (Dialect::Replica, Statement::Status, ER_PARSE_ERROR) => Some(Dialect::Legacy),
            (Dialect::Replica, Statement::Skip, ER_UNKNOWN_SYSTEM_VARIABLE) => Some(Dialect::Legacy),
            _ => None,
        }
    }

    pub fn status_query(&self) -> &'static str {
        match self {
            Dialect::Replica => "SHOW REPLICA STATUS",
            Dialect::Legacy => "SHOW SLAVE STATUS",
        }
    }

    pub fn skip_statement(&self) -> &'static str {
        match self {
            Dialect::Replica => "SET GLOBAL sql_replica_skip_counter = 1",
            Dialect::Legacy => "SET GLOBAL SQL_SLAVE_SKIP_COUNTER = 1",
        }
    }

    pub fn resume_statement(&self) -> &'static str {
        match self {
            Dialect::Replica => "START REPLICA SQL_THREAD",
            Dialect::Legacy => "START SLAVE SQL_THREAD",
        }
    }
}

/// One row of replica status, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusRow {
    columns: HashMap<String, Option<String>>,
}

impl StatusRow {
    pub fn from_mysql_row(row: &MySqlRow) -> Result<Self, sqlx::Error> {
        let mut columns = HashMap::with_capacity(row.columns().len());
        for column in row.columns() {
            let value: Option<String> = row.try_get_unchecked(column.ordinal())?;
            columns.insert(column.name().to_string(), value);
        }
        Ok(Self { columns })
    }

    /// Set a column, returning the row for chaining.
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.columns.insert(name.to_string(), Some(value.into()));
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// First present, non-NULL value among `names`, trimmed.
    fn text(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .find_map(|n| self.columns.get(*n).and_then(|v| v.as_deref()))
            .map(str::trim)
    }

    /// Numeric column; missing, NULL and empty all read as zero.
    fn number(&self, names: &[&str]) -> Result<u64, SessionError> {
        match self.text(names) {
            None | Some("") => Ok(0),
            Some(raw) => raw.parse().map_err(|_| {
                SessionError::store(format!("column {} is not numeric: {raw:?}", names[0]))
            }),
        }
    }
}

const SOURCE_HOST: &[&str] = &["Source_Host", "Master_Host"];
const SOURCE_PORT: &[&str] = &["Source_Port", "Master_Port"];

const IO_ERRNO: &[&str] = &["Last_IO_Errno"];
const IO_ERROR: &[&str] = &["Last_IO_Error"];
const IO_FILE: &[&str] = &["Source_Log_File", "Master_Log_File"];
const IO_POS: &[&str] = &["Read_Source_Log_Pos", "Read_Master_Log_Pos"];

const SQL_ERRNO: &[&str] = &["Last_SQL_Errno"];
const SQL_ERROR: &[&str] = &["Last_SQL_Error"];
const SQL_FILE: &[&str] = &["Relay_Source_Log_File", "Relay_Master_Log_File"];
const SQL_POS: &[&str] = &["Exec_Source_Log_Pos", "Exec_Master_Log_Pos"];

const LEGACY_ERRNO: &[&str] = &["Last_Errno"];
const LEGACY_ERROR: &[&str] = &["Last_Error"];

/// Build a [`StatusSample`] from the rows of a replica status query.
///
/// No rows means the node is not a replica. With several rows (one per
/// replication channel) only the first is inspected.
pub fn sample_from_rows(rows: &[StatusRow]) -> Result<StatusSample, SessionError> {
    let Some(row) = rows.first() else {
        return Ok(StatusSample::not_replica());
    };
    if rows.len() > 1 {
        debug!(channels = rows.len(), "multiple replication channels, inspecting the first");
    }

    let port = row.number(SOURCE_PORT)?;
    let port = u16::try_from(port)
        .map_err(|_| SessionError::store(format!("upstream port out of range: {port}")))?;
    let upstream = Endpoint::new(row.text(SOURCE_HOST).unwrap_or_default(), port);

    let io = channel(row, IO_ERRNO, IO_ERROR, IO_FILE, IO_POS)?;
    let apply = if row.has(SQL_ERRNO[0]) || row.has(IO_ERRNO[0]) {
        channel(row, SQL_ERRNO, SQL_ERROR, SQL_FILE, SQL_POS)?
    } else {
        channel(row, LEGACY_ERRNO, LEGACY_ERROR, SQL_FILE, SQL_POS)?
    };

    Ok(StatusSample::replica(upstream, io, apply))
}

fn channel(
    row: &StatusRow,
    errno: &[&str],
    error: &[&str],
    file: &[&str],
    pos: &[&str],
) -> Result<ChannelStatus, SessionError> {
    let position = LogPosition::new(row.text(file).unwrap_or_default(), row.number(pos)?);
    let code = row.number(errno)?;
    if code == 0 {
        return Ok(ChannelStatus::healthy(position));
    }
    let code = u32::try_from(code)
        .map_err(|_| SessionError::store(format!("error number out of range: {code}")))?;
    Ok(ChannelStatus::failing(code, row.text(error).unwrap_or_default(), position))
}

//! `sqlx`-backed connector and session.
//!
//! Each session owns exactly one `MySqlConnection`. The first status query
//! picks the statement dialect: `SHOW REPLICA STATUS` is tried first and a
//! syntax error drops the session to the legacy `SLAVE` forms for good. The
//! skip counter is negotiated separately, since servers that accept the
//! modern status query may still only know `SQL_SLAVE_SKIP_COUNTER`.
//!
//! Every statement runs under a deadline. One that outlives it is reported
//! as a transport error and the connection is dropped.

use std::time::Duration;

use async_trait::async_trait;
use rplwatch_core::{NodeIdentity, ReplicaConnector, ReplicaSession, SessionError, StatusSample};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Connection, Executor};
use tracing::{debug, info, warn};

use crate::error::{classify, error_number, timed_out};
use crate::status::{Dialect, Statement, StatusRow, sample_from_rows};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens one MySQL connection per session.
#[derive(Debug, Clone)]
pub struct MysqlConnector {
    connect_timeout: Duration,
    statement_timeout: Duration,
}

impl Default for MysqlConnector {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }
}

impl MysqlConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            ..Self::default()
        }
    }

    /// Deadline for each statement a session sends, and for closing it.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn statement_timeout(&self) -> Duration {
        self.statement_timeout
    }

    fn options(node: &NodeIdentity) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&node.host)
            .port(node.port)
            .username(&node.user)
            .password(&node.password)
    }
}

#[async_trait]
impl ReplicaConnector for MysqlConnector {
    type Session = MysqlSession;

    async fn connect(&self, node: &NodeIdentity) -> Result<MysqlSession, SessionError> {
        let options = Self::options(node);
        let conn = tokio::time::timeout(self.connect_timeout, MySqlConnection::connect_with(&options))
            .await
            .map_err(|_| {
                SessionError::transport(format!(
                    "connection to {} timed out after {:?}",
                    node.address(),
                    self.connect_timeout
                ))
            })?
            .map_err(classify)?;
        debug!(node = %node.address(), "mysql connection opened");
        Ok(MysqlSession::new(conn, self.statement_timeout))
    }
}

/// One open connection to the monitored node.
pub struct MysqlSession {
    conn: Option<MySqlConnection>,
    dialect: Option<Dialect>,
    skip_dialect: Option<Dialect>,
    statement_timeout: Duration,
}

impl MysqlSession {
    fn new(conn: MySqlConnection, statement_timeout: Duration) -> Self {
        Self {
            conn: Some(conn),
            dialect: None,
            skip_dialect: None,
            statement_timeout,
        }
    }

    /// Dialect settled on by the first status query, if any.
    pub fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    fn connection(&mut self) -> Result<&mut MySqlConnection, SessionError> {
        self.conn
            .as_mut()
            .ok_or_else(|| SessionError::transport("not connected"))
    }

    /// Classify `err`; a transport error also drops the connection.
    fn fail(&mut self, err: sqlx::Error) -> SessionError {
        let err = classify(err);
        if err.is_transport() && self.conn.take().is_some() {
            warn!(error = %err, "mysql connection lost");
        }
        err
    }

    async fn run(&mut self, dialect: Dialect, statement: Statement) -> Result<Vec<MySqlRow>, sqlx::Error> {
        let sql = dialect.statement(statement);
        let timeout = self.statement_timeout;
        let Some(conn) = self.conn.as_mut() else {
            return Err(sqlx::Error::PoolClosed);
        };
        match tokio::time::timeout(timeout, conn.fetch_all(sqlx::raw_sql(sql))).await {
            Ok(result) => result,
            Err(_) => Err(timed_out(sql, timeout)),
        }
    }

    /// Run `statement` in `chosen`, or negotiate the dialect when none is
    /// settled yet. Returns the dialect that worked.
    async fn negotiate(
        &mut self,
        statement: Statement,
        chosen: Option<Dialect>,
    ) -> Result<(Dialect, Vec<MySqlRow>), SessionError> {
        self.connection()?;
        let first = chosen.unwrap_or(Dialect::Replica);
        let err = match self.run(first, statement).await {
            Ok(rows) => return Ok((first, rows)),
            Err(e) => e,
        };
        let next = match chosen {
            Some(_) => None,
            None => error_number(&err).and_then(|errno| first.fallback(statement, errno)),
        };
        let Some(next) = next else {
            return Err(self.fail(err));
        };
        info!(
            rejected = first.statement(statement),
            using = next.statement(statement),
            "server rejected modern statement, falling back"
        );
        match self.run(next, statement).await {
            Ok(rows) => Ok((next, rows)),
            Err(e) => Err(self.fail(e)),
        }
    }
}

#[async_trait]
impl ReplicaSession for MysqlSession {
    async fn replication_status(&mut self) -> Result<StatusSample, SessionError> {
        let (dialect, rows) = self.negotiate(Statement::Status, self.dialect).await?;
        self.dialect = Some(dialect);
        let rows = rows
            .iter()
            .map(StatusRow::from_mysql_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.fail(e))?;
        sample_from_rows(&rows)
    }

    async fn skip_one_event(&mut self) -> Result<(), SessionError> {
        // A legacy status dialect means the modern counter is unknown too.
        let chosen = self
            .skip_dialect
            .or(self.dialect.filter(|d| *d == Dialect::Legacy));
        let (dialect, _) = self.negotiate(Statement::Skip, chosen).await?;
        self.skip_dialect = Some(dialect);
        Ok(())
    }

    async fn resume_apply(&mut self) -> Result<(), SessionError> {
        let dialect = self.dialect.unwrap_or(Dialect::Replica);
        self.negotiate(Statement::Resume, Some(dialect)).await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn close(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        match tokio::time::timeout(self.statement_timeout, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "mysql connection closed uncleanly"),
            Err(_) => debug!(after = ?self.statement_timeout, "mysql connection close timed out"),
        }
    }
}

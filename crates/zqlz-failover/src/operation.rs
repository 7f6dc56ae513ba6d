//! Operations dispatched against a logical connection
//!
//! Every call made on a [`FailoverConnection`](crate::FailoverConnection)
//! funnels through one [`Operation`] value, which is what makes a failed call
//! replayable on a different physical link.

use std::borrow::Cow;

use zqlz_core::Value;

use crate::session::{
    IsolationLevel, SessionState, auto_commit_sql, isolation_sql, read_only_sql, use_database_sql,
};

/// Query used by [`Operation::Ping`]
pub const PING_QUERY: &str = "SELECT 1";

/// A single call against the logical connection
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// A statement that returns rows
    Query { sql: String, params: Vec<Value> },
    /// A statement that modifies data
    Execute { sql: String, params: Vec<Value> },
    /// Liveness check
    Ping,
    /// Change the default database
    SetDatabase(String),
    /// Toggle autocommit
    SetAutoCommit(bool),
    /// Toggle read-only mode; also routes the connection between roles
    SetReadOnly(bool),
    /// Change the isolation level
    SetIsolation(IsolationLevel),
    Commit,
    Rollback,
}

impl Operation {
    /// Query without parameters
    pub fn query(sql: impl Into<String>) -> Self {
        Operation::Query {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Statement without parameters
    pub fn execute(sql: impl Into<String>) -> Self {
        Operation::Execute {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Stable identifier used in logs
    pub fn id(&self) -> &'static str {
        match self {
            Operation::Query { .. } => "query",
            Operation::Execute { .. } => "execute",
            Operation::Ping => "ping",
            Operation::SetDatabase(_) => "set_database",
            Operation::SetAutoCommit(_) => "set_auto_commit",
            Operation::SetReadOnly(_) => "set_read_only",
            Operation::SetIsolation(_) => "set_isolation",
            Operation::Commit => "commit",
            Operation::Rollback => "rollback",
        }
    }

    /// Text sent over the wire for this operation
    pub fn wire_text(&self) -> Cow<'_, str> {
        match self {
            Operation::Query { sql, .. } | Operation::Execute { sql, .. } => {
                Cow::Borrowed(sql.as_str())
            }
            Operation::Ping => Cow::Borrowed(PING_QUERY),
            Operation::SetDatabase(db) => Cow::Owned(use_database_sql(db)),
            Operation::SetAutoCommit(enabled) => Cow::Owned(auto_commit_sql(*enabled)),
            Operation::SetReadOnly(read_only) => Cow::Owned(read_only_sql(*read_only)),
            Operation::SetIsolation(level) => Cow::Owned(isolation_sql(*level)),
            Operation::Commit => Cow::Borrowed("COMMIT"),
            Operation::Rollback => Cow::Borrowed("ROLLBACK"),
        }
    }

    /// Bound parameters
    pub fn params(&self) -> &[Value] {
        match self {
            Operation::Query { params, .. } | Operation::Execute { params, .. } => params,
            _ => &[],
        }
    }

    /// Apply the session side effect of a successful call
    pub(crate) fn apply_to(&self, session: &mut SessionState) {
        match self {
            Operation::SetDatabase(db) => session.database = Some(db.clone()),
            Operation::SetAutoCommit(enabled) => session.auto_commit = *enabled,
            Operation::SetReadOnly(read_only) => session.read_only = *read_only,
            Operation::SetIsolation(level) => session.isolation = Some(*level),
            _ => {}
        }
    }
}

//! Session state carried by a link
//!
//! A session option set on one physical connection has to survive a switch
//! to another one, so every link tracks the options it has applied and can
//! produce the statements that bring another link in line.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// SQL spelling used in `SET SESSION TRANSACTION ISOLATION LEVEL`
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Session options applied on a physical connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Current default database
    pub database: Option<String>,
    /// Autocommit mode (server default is on)
    pub auto_commit: bool,
    /// Whether the session was put in read-only mode
    pub read_only: bool,
    /// Explicit isolation level, `None` means the server default
    pub isolation: Option<IsolationLevel>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            database: None,
            auto_commit: true,
            read_only: false,
            isolation: None,
        }
    }
}

impl SessionState {
    /// Initial state for a link opened against `database`
    pub fn with_database(database: Option<String>) -> Self {
        Self {
            database,
            ..Self::default()
        }
    }

    /// Statements that turn a session in state `self` into `target`.
    ///
    /// Only fields that differ produce a statement. A target without an
    /// explicit isolation level leaves the current one alone.
    pub fn statements_to_reach(&self, target: &SessionState) -> Vec<String> {
        let mut statements = Vec::new();

        if let Some(db) = &target.database {
            if self.database.as_ref() != Some(db) {
                statements.push(use_database_sql(db));
            }
        }
        if self.auto_commit != target.auto_commit {
            statements.push(auto_commit_sql(target.auto_commit));
        }
        if self.read_only != target.read_only {
            statements.push(read_only_sql(target.read_only));
        }
        if let Some(level) = target.isolation {
            if self.isolation != Some(level) {
                statements.push(isolation_sql(level));
            }
        }

        statements
    }
}

/// `USE` with backtick quoting
pub(crate) fn use_database_sql(database: &str) -> String {
    format!("USE `{}`", database.replace('`', "``"))
}

pub(crate) fn auto_commit_sql(enabled: bool) -> String {
    format!("SET autocommit={}", if enabled { 1 } else { 0 })
}

pub(crate) fn read_only_sql(read_only: bool) -> String {
    if read_only {
        "SET SESSION TRANSACTION READ ONLY".to_string()
    } else {
        "SET SESSION TRANSACTION READ WRITE".to_string()
    }
}

pub(crate) fn isolation_sql(level: IsolationLevel) -> String {
    format!("SET SESSION TRANSACTION ISOLATION LEVEL {}", level.as_sql())
}

//! Physical links to database hosts
//!
//! A link owns exactly one physical connection to one host together with
//! the credentials and options that produced it. The failover layer only
//! talks to hosts through the [`PhysicalLink`] capability; the wire protocol
//! underneath is reached through [`WireConnector`] / [`WireSession`].
//!
//! Two variants exist:
//!
//! - [`SingleHostLink`] - no topology awareness, its host list is itself
//! - [`ClusterLink`] - knows the whole configured host list and can open a
//!   connection to any of them in a caller-chosen order

mod base;
mod cluster;
mod single;
mod wire;


use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use zqlz_core::{HostAddress, QueryResult, Result};

use crate::operation::Operation;
use crate::session::SessionState;

pub use cluster::ClusterLink;
pub use single::SingleHostLink;
pub use wire::{WireConnector, WireSession};

/// Default query used to find out whether a host is writable.
///
/// Replicas in a managed cluster run with `innodb_read_only` on.
pub const DEFAULT_ROLE_QUERY: &str = "SELECT @@innodb_read_only";

/// Role reported by a host when probed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRole {
    /// Host accepts writes
    Primary,
    /// Host is read-only
    Secondary,
    /// Host answered but the answer could not be interpreted
    Unknown,
}

/// Credentials used to open a link
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    password: Option<String>,
}

impl Credentials {
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        Self { username, password }
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Options used to open a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOptions {
    /// Default database selected on connect
    pub database: Option<String>,
    /// Upper bound for opening one physical connection
    pub connect_timeout: Duration,
    /// Query whose single boolean answer tells whether the host is read-only
    pub role_query: String,
    /// Extra wire-level parameters, passed through untouched
    pub params: HashMap<String, String>,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            database: None,
            connect_timeout: Duration::from_secs(5),
            role_query: DEFAULT_ROLE_QUERY.to_string(),
            params: HashMap::new(),
        }
    }
}

/// One live physical connection to one database host
#[async_trait]
pub trait PhysicalLink: Send + Sync {
    /// Host this link is connected to
    fn current_host(&self) -> &HostAddress;

    fn credentials(&self) -> &Credentials;

    fn options(&self) -> &LinkOptions;

    /// Hosts this link knows about, in configured order
    fn host_list(&self) -> &[HostAddress];

    /// Snapshot of the session options applied on this link
    fn session(&self) -> SessionState;

    /// Ask the host whether it currently holds the primary role
    async fn probe_role(&self) -> Result<LinkRole>;

    /// Run a read query used for topology discovery
    async fn execute_probe_query(&self, text: &str) -> Result<QueryResult>;

    /// Run one application operation
    async fn dispatch(&self, operation: &Operation) -> Result<QueryResult>;

    /// Open a new link to `host` with the same credentials and options.
    ///
    /// The receiver is left untouched, it may even be closed already.
    async fn connect(&self, host: &HostAddress) -> Result<Arc<dyn PhysicalLink>>;

    /// Bring this link's session options in line with `source`
    async fn sync_session_from(&self, source: &SessionState) -> Result<()>;

    /// Close the physical connection; calling it twice is a no-op
    async fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

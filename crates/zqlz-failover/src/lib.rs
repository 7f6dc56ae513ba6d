//! ZQLZ Failover - High-availability layer for database connections
//!
//! This crate keeps one logical connection usable across a cluster of
//! database hosts (a primary plus read-only replicas):
//!
//! - [`FailoverConnection`] - the facade every call goes through
//! - [`FailoverListener`] - decides how to react to a broken link and runs
//!   the host search
//! - [`TopologySearchStrategy`] - orders candidate hosts, optionally using
//!   the cluster's own view of who the writer is
//! - [`PhysicalLink`] - one physical connection, opened through a
//!   [`WireConnector`]
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use zqlz_failover::{FailoverConfig, FailoverConnection, MySqlConnector};
//!
//! let config = FailoverConfig::from_toml_str(r#"hosts = ["db-1:3306", "db-2:3306"]"#)?;
//! let conn = FailoverConnection::open(config, Arc::new(MySqlConnector)).await?;
//! let result = conn.query("SELECT 1").await?;
//! ```

mod config;
mod events;
mod interceptor;
mod link;
mod listener;
#[cfg(feature = "mysql")]
mod mysql;
mod operation;
mod scheduler;
mod session;
mod state;
mod strategy;

#[cfg(test)]
mod testing;

pub use config::FailoverConfig;
pub use events::{EVENT_CHANNEL_CAPACITY, FailoverEvent};
pub use interceptor::FailoverConnection;
pub use link::{
    ClusterLink, Credentials, DEFAULT_ROLE_QUERY, LinkOptions, LinkRole, PhysicalLink,
    SingleHostLink, WireConnector, WireSession,
};
pub use listener::{FailoverListener, FailoverPhase, HandleErrorResult};
#[cfg(feature = "mysql")]
pub use mysql::{INIT_COMMAND_PARAM, MySqlConnector, map_error as map_mysql_error};
pub use operation::{Operation, PING_QUERY};
pub use session::{IsolationLevel, SessionState};
pub use state::{ConnectionState, Role};
pub use strategy::{
    AURORA_PRIMARY_QUERY, AuroraSearch, GenericSearch, Topology, TopologySearchStrategy,
    promote_reported_primary,
};

pub use zqlz_core::{HostAddress, QueryResult, Result, Value, ZqlzError};

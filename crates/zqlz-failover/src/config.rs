//! Failover connection configuration

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::Deserialize;
use zqlz_core::{HostAddress, Result, ZqlzError};

use crate::link::{Credentials, DEFAULT_ROLE_QUERY, LinkOptions};
use crate::strategy::Topology;

/// Configuration for one logical failover connection
///
/// Loaded from TOML or built in code:
///
/// ```toml
/// hosts = ["db-1:3306", "db-2:3306"]
/// topology = "aurora"
/// max_attempts = 60
/// username = "app"
/// ```
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FailoverConfig {
    /// Hosts in configured order, the first one is the expected primary
    hosts: Vec<HostAddress>,
    /// Cluster flavour, selects the search strategy
    topology: Topology,
    /// Reconnection ceiling
    max_attempts: u32,
    /// Period of the background search in milliseconds
    schedule_interval_ms: u64,
    /// Bound for opening one physical connection in milliseconds
    connect_timeout_ms: u64,
    username: Option<String>,
    password: Option<String>,
    /// Default database
    database: Option<String>,
    /// Query telling whether a host is read-only
    role_query: String,
    /// Ask replicas for the current writer before searching (managed
    /// clusters only)
    probe_primary: bool,
    /// Wire-level parameters passed to the connector untouched
    params: HashMap<String, String>,
}

impl FailoverConfig {
    /// Create a configuration for `hosts` with default settings
    pub fn new(hosts: Vec<HostAddress>) -> Self {
        Self {
            hosts,
            ..Self::default()
        }
    }

    /// Parse a TOML document and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| ZqlzError::Configuration(format!("invalid failover config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the cluster topology
    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    /// Set the reconnection ceiling
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the background search period in milliseconds
    pub fn with_schedule_interval_ms(mut self, interval_ms: u64) -> Self {
        self.schedule_interval_ms = interval_ms;
        self
    }

    /// Set the connect timeout in milliseconds
    pub fn with_connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    /// Set the login credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: Option<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    /// Set the default database
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the role query
    pub fn with_role_query(mut self, query: impl Into<String>) -> Self {
        self.role_query = query.into();
        self
    }

    /// Enable or disable the writer lookup of managed clusters
    pub fn with_probe_primary(mut self, enabled: bool) -> Self {
        self.probe_primary = enabled;
        self
    }

    /// Add a wire-level parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn hosts(&self) -> &[HostAddress] {
        &self.hosts
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Get the background search period as a Duration
    pub fn schedule_interval(&self) -> Duration {
        Duration::from_millis(self.schedule_interval_ms)
    }

    /// Get the connect timeout as a Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn probe_primary(&self) -> bool {
        self.probe_primary
    }

    /// Whether more than one host takes part in failover
    pub fn is_multi_host(&self) -> bool {
        self.hosts.len() > 1
    }

    /// Check the configuration for values that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(ZqlzError::Configuration(
                "at least one host must be configured".into(),
            ));
        }

        let mut seen = HashSet::new();
        for host in &self.hosts {
            if !seen.insert(host) {
                return Err(ZqlzError::Configuration(format!(
                    "host {} is listed more than once",
                    host
                )));
            }
        }

        if self.max_attempts == 0 {
            return Err(ZqlzError::Configuration(
                "max_attempts must be greater than 0".into(),
            ));
        }
        if self.schedule_interval_ms == 0 {
            return Err(ZqlzError::Configuration(
                "schedule_interval_ms must be greater than 0".into(),
            ));
        }
        if self.role_query.trim().is_empty() {
            return Err(ZqlzError::Configuration("role_query must not be empty".into()));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }

    pub fn link_options(&self) -> LinkOptions {
        LinkOptions {
            database: self.database.clone(),
            connect_timeout: self.connect_timeout(),
            role_query: self.role_query.clone(),
            params: self.params.clone(),
        }
    }
}

impl Default for FailoverConfig {
    /// Defaults:
    /// - max_attempts: 120
    /// - schedule_interval: 250 ms
    /// - connect_timeout: 5 seconds
    /// - role_query: `SELECT @@innodb_read_only`
    /// - probe_primary: enabled
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            topology: Topology::default(),
            max_attempts: 120,
            schedule_interval_ms: 250,
            connect_timeout_ms: 5_000,
            username: None,
            password: None,
            database: None,
            role_query: DEFAULT_ROLE_QUERY.to_string(),
            probe_primary: true,
            params: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for FailoverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverConfig")
            .field("hosts", &self.hosts)
            .field("topology", &self.topology)
            .field("max_attempts", &self.max_attempts)
            .field("schedule_interval_ms", &self.schedule_interval_ms)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("role_query", &self.role_query)
            .field("probe_primary", &self.probe_primary)
            .finish_non_exhaustive()
    }
}

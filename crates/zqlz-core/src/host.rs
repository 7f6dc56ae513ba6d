//! Database host addressing

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ZqlzError;

/// Port used when a host is given without one.
pub const DEFAULT_PORT: u16 = 3306;

/// A database host and port
///
/// Immutable once built; compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HostAddress {
    pub host: String,
    pub port: u16,
}

impl HostAddress {
    /// Create a new host address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Check whether this host belongs to the instance named by `identifier`.
    ///
    /// Managed clusters report instance identifiers (e.g. `db-instance-2`)
    /// while endpoints embed them as the leading label
    /// (`db-instance-2.abc123.eu-west-1.rds.amazonaws.com`). Either side may
    /// carry the longer form, so a prefix match in both directions counts.
    pub fn matches_instance(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();
        if identifier.is_empty() || self.host.is_empty() {
            return false;
        }
        self.host.starts_with(identifier) || identifier.starts_with(self.host.as_str())
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for HostAddress {
    type Err = ZqlzError;

    /// Parse `host:port`, `[v6]:port` or a bare host.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ZqlzError::Configuration("empty host address".into()));
        }

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| {
                ZqlzError::Configuration(format!("unterminated IPv6 address: {}", s))
            })?;
            match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None if tail.is_empty() => (host, None),
                None => {
                    return Err(ZqlzError::Configuration(format!(
                        "invalid host address: {}",
                        s
                    )));
                }
            }
        } else {
            match s.rsplit_once(':') {
                // A bare IPv6 address has several colons and no port
                Some((host, _)) if host.contains(':') => (s, None),
                Some((host, port)) => (host, Some(port)),
                None => (s, None),
            }
        };

        if host.is_empty() {
            return Err(ZqlzError::Configuration(format!("missing host in: {}", s)));
        }

        let port = match port {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| ZqlzError::Configuration(format!("invalid port in: {}", s)))?,
            None => DEFAULT_PORT,
        };

        Ok(Self::new(host, port))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HostRepr {
    Text(String),
    Table {
        host: String,
        #[serde(default = "default_port")]
        port: u16,
    },
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl<'de> Deserialize<'de> for HostAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match HostRepr::deserialize(deserializer)? {
            HostRepr::Text(text) => text.parse().map_err(serde::de::Error::custom),
            HostRepr::Table { host, port } => Ok(HostAddress::new(host, port)),
        }
    }
}

//! Candidate ordering policies for the host search
//!
//! A strategy gets the hosts the search may try and decides the order in
//! which they are tried. It never decides roles; that is done by probing
//! each link after it connects.

mod aurora;
mod generic;


use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zqlz_core::HostAddress;

use crate::link::PhysicalLink;

pub use aurora::{AURORA_PRIMARY_QUERY, AuroraSearch};
pub use generic::GenericSearch;

/// Orders candidate hosts for one search iteration
#[async_trait]
pub trait TopologySearchStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Order `candidates` for connection attempts.
    ///
    /// `probe` is a still-healthy link the strategy may query for topology
    /// hints. Implementations must return a permutation of `candidates` and
    /// must not fail: a hint that cannot be obtained leaves the order alone.
    async fn order_candidates(
        &self,
        candidates: Vec<HostAddress>,
        need_primary: bool,
        need_secondary: bool,
        probe: Option<Arc<dyn PhysicalLink>>,
    ) -> Vec<HostAddress>;
}

/// Move the first candidate matching `identifier` to the front.
///
/// A match that is already first leaves the order unchanged, and so does
/// an identifier that matches nothing.
pub fn promote_reported_primary(candidates: &mut Vec<HostAddress>, identifier: &str) {
    let Some(index) = candidates
        .iter()
        .position(|host| host.matches_instance(identifier))
    else {
        return;
    };
    if index > 0 {
        let host = candidates.remove(index);
        candidates.insert(0, host);
    }
}

/// Cluster flavour selected in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Primary plus replicas with roles that only change on failover
    #[default]
    Failover,
    /// Managed cluster exposing the replica status view
    Aurora,
}

impl Topology {
    /// Strategy for this topology; `probe_primary` toggles the primary
    /// lookup of managed clusters
    pub fn strategy(self, probe_primary: bool) -> Arc<dyn TopologySearchStrategy> {
        match self {
            Topology::Aurora if probe_primary => Arc::new(AuroraSearch),
            _ => Arc::new(GenericSearch),
        }
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topology::Failover => write!(f, "failover"),
            Topology::Aurora => write!(f, "aurora"),
        }
    }
}

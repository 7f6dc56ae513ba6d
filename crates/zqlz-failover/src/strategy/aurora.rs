use std::sync::Arc;

use async_trait::async_trait;
use zqlz_core::{HostAddress, Result, ZqlzError};

use super::{TopologySearchStrategy, promote_reported_primary};
use crate::link::PhysicalLink;

/// Asks a replica which instance currently holds the writer session
pub const AURORA_PRIMARY_QUERY: &str = "select server_id from information_schema.replica_host_status where session_id = 'MASTER_SESSION_ID'";

/// Search for managed clusters whose endpoint names start with the
/// instance identifier
///
/// When a primary is missing and a replica is still reachable, the replica
/// is asked for the writer's identifier and the matching host is tried
/// first.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuroraSearch;

#[async_trait]
impl TopologySearchStrategy for AuroraSearch {
    fn name(&self) -> &'static str {
        "aurora"
    }

    async fn order_candidates(
        &self,
        mut candidates: Vec<HostAddress>,
        need_primary: bool,
        _need_secondary: bool,
        probe: Option<Arc<dyn PhysicalLink>>,
    ) -> Vec<HostAddress> {
        let Some(probe) = probe.filter(|_| need_primary) else {
            return candidates;
        };

        match reported_primary(probe.as_ref()).await {
            Ok(Some(identifier)) => {
                tracing::debug!(
                    probe_host = %probe.current_host(),
                    reported_primary = %identifier,
                    "cluster reported primary instance"
                );
                promote_reported_primary(&mut candidates, &identifier);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(error = %e, "keeping candidate order");
            }
        }

        candidates
    }
}

/// Identifier of the writer instance as reported by `probe`
pub(super) async fn reported_primary(probe: &dyn PhysicalLink) -> Result<Option<String>> {
    let result = probe
        .execute_probe_query(AURORA_PRIMARY_QUERY)
        .await
        .map_err(|e| {
            ZqlzError::TopologyProbe(format!(
                "primary lookup on {} failed: {}",
                probe.current_host(),
                e
            ))
        })?;
    Ok(result
        .first_value()
        .and_then(|v| v.as_str())
        .map(str::to_string))
}

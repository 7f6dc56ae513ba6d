use std::sync::Arc;

use async_trait::async_trait;
use zqlz_core::HostAddress;

use super::TopologySearchStrategy;
use crate::link::PhysicalLink;

/// Tries the remaining hosts in configured order
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericSearch;

#[async_trait]
impl TopologySearchStrategy for GenericSearch {
    fn name(&self) -> &'static str {
        "generic"
    }

    async fn order_candidates(
        &self,
        candidates: Vec<HostAddress>,
        _need_primary: bool,
        _need_secondary: bool,
        _probe: Option<Arc<dyn PhysicalLink>>,
    ) -> Vec<HostAddress> {
        candidates
    }
}

//! Link without topology awareness

use std::sync::Arc;

use async_trait::async_trait;
use zqlz_core::{HostAddress, QueryResult, Result};

use super::base::LinkCore;
use super::{Credentials, LinkOptions, LinkRole, PhysicalLink, WireConnector};
use crate::operation::Operation;
use crate::session::SessionState;

/// A link to one host that knows nothing about other hosts
pub struct SingleHostLink {
    core: LinkCore,
    hosts: [HostAddress; 1],
}

impl SingleHostLink {
    /// Open a link to `host`
    pub async fn open(
        connector: Arc<dyn WireConnector>,
        credentials: Credentials,
        options: LinkOptions,
        host: HostAddress,
    ) -> Result<Self> {
        let core = LinkCore::open(
            connector,
            Arc::new(credentials),
            Arc::new(options),
            host.clone(),
        )
        .await?;
        Ok(Self {
            core,
            hosts: [host],
        })
    }
}

#[async_trait]
impl PhysicalLink for SingleHostLink {
    fn current_host(&self) -> &HostAddress {
        self.core.host()
    }

    fn credentials(&self) -> &Credentials {
        self.core.credentials()
    }

    fn options(&self) -> &LinkOptions {
        self.core.options()
    }

    fn host_list(&self) -> &[HostAddress] {
        &self.hosts
    }

    fn session(&self) -> SessionState {
        self.core.session()
    }

    async fn probe_role(&self) -> Result<LinkRole> {
        self.core.probe_role().await
    }

    async fn execute_probe_query(&self, text: &str) -> Result<QueryResult> {
        self.core.execute_probe_query(text).await
    }

    async fn dispatch(&self, operation: &Operation) -> Result<QueryResult> {
        self.core.dispatch(operation).await
    }

    async fn connect(&self, host: &HostAddress) -> Result<Arc<dyn PhysicalLink>> {
        let core = self.core.open_sibling(host).await?;
        Ok(Arc::new(SingleHostLink {
            core,
            hosts: [host.clone()],
        }))
    }

    async fn sync_session_from(&self, source: &SessionState) -> Result<()> {
        self.core.sync_session_from(source).await
    }

    async fn close(&self) -> Result<()> {
        self.core.close().await
    }

    fn is_closed(&self) -> bool {
        self.core.is_closed()
    }
}

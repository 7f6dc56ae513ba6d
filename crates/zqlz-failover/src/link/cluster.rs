//! Cluster-aware link

use std::sync::Arc;

use async_trait::async_trait;
use zqlz_core::{HostAddress, QueryResult, Result, ZqlzError};

use super::base::LinkCore;
use super::{Credentials, LinkOptions, LinkRole, PhysicalLink, WireConnector};
use crate::operation::Operation;
use crate::session::SessionState;

/// A link that carries the full configured host list
///
/// Every link opened from a `ClusterLink` shares the same host list, so any
/// of them can be used to reach the rest of the cluster.
pub struct ClusterLink {
    core: LinkCore,
    hosts: Arc<[HostAddress]>,
}

impl ClusterLink {
    /// Open a link to the first host in `order` that accepts a connection.
    ///
    /// `order` does not have to be a subset of `hosts`, but the returned link
    /// reports `hosts` as its host list. Fails with the last connection error
    /// when no host could be reached.
    pub async fn open_any(
        connector: Arc<dyn WireConnector>,
        credentials: Credentials,
        options: LinkOptions,
        hosts: Arc<[HostAddress]>,
        order: &[HostAddress],
    ) -> Result<Self> {
        let credentials = Arc::new(credentials);
        let options = Arc::new(options);
        let mut last_error = None;

        for host in order {
            match LinkCore::open(
                connector.clone(),
                credentials.clone(),
                options.clone(),
                host.clone(),
            )
            .await
            {
                Ok(core) => {
                    tracing::info!(host = %host, "cluster link established");
                    return Ok(Self { core, hosts });
                }
                Err(e) => {
                    tracing::warn!(host = %host, error = %e, "cluster host unreachable");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ZqlzError::Configuration("no hosts to connect to".into())))
    }
}

#[async_trait]
impl PhysicalLink for ClusterLink {
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
        Ok(Arc::new(ClusterLink {
            core,
            hosts: self.hosts.clone(),
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

//! The logical connection handed to applications
//!
//! Every call funnels through [`FailoverConnection::execute`]: it runs the
//! operation on the current link, hands connectivity errors to the
//! listener and returns the single replay when the listener absorbed the
//! failure. Other errors are returned untouched.

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use zqlz_core::{HostAddress, QueryResult, Result, ZqlzError};

use crate::config::FailoverConfig;
use crate::events::FailoverEvent;
use crate::link::{ClusterLink, PhysicalLink, SingleHostLink, WireConnector};
use crate::listener::{FailoverListener, FailoverPhase};
use crate::operation::Operation;
use crate::session::IsolationLevel;
use crate::state::ConnectionState;

/// A database connection that survives host failures
pub struct FailoverConnection {
    listener: Arc<FailoverListener>,
    closed: AtomicBool,
}

impl FailoverConnection {
    /// Open a logical connection to the first reachable configured host.
    ///
    /// A single host gets a plain link; several hosts get a cluster link and
    /// the other role is searched for right away.
    pub async fn open(config: FailoverConfig, connector: Arc<dyn WireConnector>) -> Result<Self> {
        config.validate()?;

        let credentials = config.credentials();
        let options = config.link_options();
        let link: Arc<dyn PhysicalLink> = if config.is_multi_host() {
            Arc::new(
                ClusterLink::open_any(
                    connector,
                    credentials,
                    options,
                    config.hosts().into(),
                    config.hosts(),
                )
                .await?,
            )
        } else {
            let host = config
                .hosts()
                .first()
                .cloned()
                .ok_or_else(|| ZqlzError::Configuration("no hosts configured".into()))?;
            Arc::new(SingleHostLink::open(connector, credentials, options, host).await?)
        };

        let strategy = config.topology().strategy(config.probe_primary());
        let listener = FailoverListener::new(link, strategy, &config);
        listener.initialize().await?;

        tracing::info!(
            host = %listener.state().current_link().current_host(),
            hosts = config.hosts().len(),
            topology = %config.topology(),
            "failover connection opened"
        );

        Ok(Self {
            listener,
            closed: AtomicBool::new(false),
        })
    }

    /// Run one operation, failing over when the link breaks
    pub async fn execute(&self, operation: &Operation) -> Result<QueryResult> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ZqlzError::Connection("Connection permanently closed".into()));
        }
        if let Some(err) = self.listener.state().exhausted_error() {
            return Err(err);
        }

        if let Operation::SetReadOnly(read_only) = operation {
            self.listener.switch_read_only(*read_only).await?;
        }

        let link = self.listener.state().current_link();
        match link.dispatch(operation).await {
            Ok(result) => Ok(result),
            Err(err) if err.is_connectivity() => {
                tracing::debug!(
                    operation = operation.id(),
                    host = %link.current_host(),
                    error = %err,
                    "connectivity error, handing over to failover"
                );
                let outcome = self.listener.handle(&link, operation, &err).await?;
                match outcome.replayed_result {
                    Some(result) if outcome.handled => Ok(result),
                    _ => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    pub async fn query(&self, sql: impl Into<String>) -> Result<QueryResult> {
        self.execute(&Operation::query(sql)).await
    }

    pub async fn execute_statement(&self, sql: impl Into<String>) -> Result<QueryResult> {
        self.execute(&Operation::execute(sql)).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.execute(&Operation::Ping).await.map(|_| ())
    }

    pub async fn set_database(&self, database: impl Into<String>) -> Result<()> {
        self.execute(&Operation::SetDatabase(database.into()))
            .await
            .map(|_| ())
    }

    pub async fn set_auto_commit(&self, enabled: bool) -> Result<()> {
        self.execute(&Operation::SetAutoCommit(enabled))
            .await
            .map(|_| ())
    }

    /// Route reads to a replica (`true`) or back to the primary
    pub async fn set_read_only(&self, read_only: bool) -> Result<()> {
        self.execute(&Operation::SetReadOnly(read_only))
            .await
            .map(|_| ())
    }

    pub async fn set_isolation(&self, level: IsolationLevel) -> Result<()> {
        self.execute(&Operation::SetIsolation(level))
            .await
            .map(|_| ())
    }

    pub async fn commit(&self) -> Result<()> {
        self.execute(&Operation::Commit).await.map(|_| ())
    }

    pub async fn rollback(&self) -> Result<()> {
        self.execute(&Operation::Rollback).await.map(|_| ())
    }

    /// Close every link and stop the background search.
    ///
    /// Later calls fail without touching the network.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.listener.close().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> FailoverPhase {
        self.listener.phase()
    }

    pub fn attempt_count(&self) -> u32 {
        self.listener.state().attempt_count()
    }

    /// Host serving calls right now
    pub fn current_host(&self) -> HostAddress {
        self.listener.state().current_link().current_host().clone()
    }

    pub fn state(&self) -> &ConnectionState {
        self.listener.state()
    }

    pub fn listener(&self) -> &Arc<FailoverListener> {
        &self.listener
    }

    /// Receive failover notifications
    pub fn subscribe(&self) -> broadcast::Receiver<FailoverEvent> {
        self.listener.subscribe()
    }
}

impl std::fmt::Debug for FailoverConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverConnection")
            .field("closed", &self.is_closed())
            .field("listener", &self.listener)
            .finish()
    }
}

//! State and behaviour shared by both link variants

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use zqlz_core::{HostAddress, QueryResult, Result, Value, ZqlzError};

use super::{Credentials, LinkOptions, LinkRole, WireConnector, WireSession};
use crate::operation::Operation;
use crate::session::SessionState;

pub(super) struct LinkCore {
    host: HostAddress,
    credentials: Arc<Credentials>,
    options: Arc<LinkOptions>,
    connector: Arc<dyn WireConnector>,
    wire: Box<dyn WireSession>,
    session: Mutex<SessionState>,
    closed: AtomicBool,
}

impl LinkCore {
    /// Open a physical connection to `host`, bounded by the connect timeout
    pub(super) async fn open(
        connector: Arc<dyn WireConnector>,
        credentials: Arc<Credentials>,
        options: Arc<LinkOptions>,
        host: HostAddress,
    ) -> Result<Self> {
        tracing::debug!(host = %host, "opening physical link");

        let wire = tokio::time::timeout(
            options.connect_timeout,
            connector.open(&host, &credentials, &options),
        )
        .await
        .map_err(|_| {
            ZqlzError::Timeout(format!(
                "connecting to {} took longer than {:?}",
                host, options.connect_timeout
            ))
        })??;

        let session = SessionState::with_database(options.database.clone());

        Ok(Self {
            host,
            credentials,
            options,
            connector,
            wire,
            session: Mutex::new(session),
            closed: AtomicBool::new(false),
        })
    }

    /// Open a sibling connection sharing credentials, options and connector
    pub(super) async fn open_sibling(&self, host: &HostAddress) -> Result<Self> {
        Self::open(
            self.connector.clone(),
            self.credentials.clone(),
            self.options.clone(),
            host.clone(),
        )
        .await
    }

    pub(super) fn host(&self) -> &HostAddress {
        &self.host
    }

    pub(super) fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub(super) fn options(&self) -> &LinkOptions {
        &self.options
    }

    pub(super) fn session(&self) -> SessionState {
        self.session.lock().clone()
    }

    pub(super) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.wire.is_closed()
    }

    async fn run(&self, text: &str, params: &[Value]) -> Result<QueryResult> {
        if self.is_closed() {
            return Err(ZqlzError::Connection(format!(
                "link to {} is closed",
                self.host
            )));
        }
        self.wire.run_query(text, params).await
    }

    pub(super) async fn execute_probe_query(&self, text: &str) -> Result<QueryResult> {
        self.run(text, &[]).await
    }

    pub(super) async fn probe_role(&self) -> Result<LinkRole> {
        let result = self.run(&self.options.role_query, &[]).await?;
        let role = match result.first_value().and_then(|v| v.as_bool()) {
            Some(false) => LinkRole::Primary,
            Some(true) => LinkRole::Secondary,
            None => LinkRole::Unknown,
        };
        tracing::debug!(host = %self.host, role = ?role, "probed host role");
        Ok(role)
    }

    pub(super) async fn dispatch(&self, operation: &Operation) -> Result<QueryResult> {
        let result = self
            .run(&operation.wire_text(), operation.params())
            .await?;
        operation.apply_to(&mut self.session.lock());
        Ok(result)
    }

    pub(super) async fn sync_session_from(&self, source: &SessionState) -> Result<()> {
        let statements = self.session().statements_to_reach(source);
        for statement in &statements {
            self.run(statement, &[]).await?;
        }

        let mut session = self.session.lock();
        if source.database.is_some() {
            session.database = source.database.clone();
        }
        session.auto_commit = source.auto_commit;
        session.read_only = source.read_only;
        if source.isolation.is_some() {
            session.isolation = source.isolation;
        }

        if !statements.is_empty() {
            tracing::debug!(
                host = %self.host,
                statements = statements.len(),
                "synchronized session state"
            );
        }
        Ok(())
    }

    pub(super) async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!(host = %self.host, "closing physical link");
        self.wire.close().await
    }
}

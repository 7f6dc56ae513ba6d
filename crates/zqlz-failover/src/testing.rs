//! Scripted cluster used by the unit tests
//!
//! Every host has a read-only flag, an up/down switch and a generation
//! number. Bumping the generation breaks the sessions opened before while
//! leaving the host reachable, which is how a dropped connection looks to
//! the failover layer.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use zqlz_core::{HostAddress, QueryResult, Result, Value, ZqlzError};

use crate::link::{
    ClusterLink, Credentials, DEFAULT_ROLE_QUERY, LinkOptions, PhysicalLink, SingleHostLink,
    WireConnector, WireSession,
};
use crate::operation::PING_QUERY;
use crate::strategy::AURORA_PRIMARY_QUERY;

pub(crate) const PORT: u16 = 3306;

#[derive(Debug, Clone)]
struct HostState {
    read_only: bool,
    up: bool,
    generation: u64,
}

#[derive(Default)]
struct ClusterInner {
    order: Vec<String>,
    hosts: Mutex<HashMap<String, HostState>>,
    reported_primary: Mutex<Option<String>>,
    probe_fails: AtomicBool,
    network_ops: AtomicUsize,
    connects: AtomicUsize,
    statements: Mutex<Vec<(String, String)>>,
}

#[derive(Clone)]
pub(crate) struct MockCluster {
    inner: Arc<ClusterInner>,
}

impl MockCluster {
    /// Build a cluster from `(name, read_only)` pairs, all hosts up
    pub(crate) fn new(hosts: &[(&str, bool)]) -> Self {
        let inner = ClusterInner {
            order: hosts.iter().map(|(name, _)| name.to_string()).collect(),
            hosts: Mutex::new(
                hosts
                    .iter()
                    .map(|(name, read_only)| {
                        (
                            name.to_string(),
                            HostState {
                                read_only: *read_only,
                                up: true,
                                generation: 0,
                            },
                        )
                    })
                    .collect(),
            ),
            ..Default::default()
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub(crate) fn connector(&self) -> Arc<dyn WireConnector> {
        Arc::new(MockConnector {
            cluster: self.clone(),
        })
    }

    pub(crate) fn host(&self, name: &str) -> HostAddress {
        HostAddress::new(name, PORT)
    }

    pub(crate) fn hosts(&self) -> Vec<HostAddress> {
        self.inner.order.iter().map(|n| self.host(n)).collect()
    }

    /// Take a host off the network; its open sessions break
    pub(crate) fn set_down(&self, name: &str) {
        if let Some(state) = self.inner.hosts.lock().get_mut(name) {
            state.up = false;
            state.generation += 1;
        }
    }

    pub(crate) fn set_up(&self, name: &str) {
        if let Some(state) = self.inner.hosts.lock().get_mut(name) {
            state.up = true;
        }
    }

    /// Break the open sessions of a host that stays reachable
    pub(crate) fn drop_sessions(&self, name: &str) {
        if let Some(state) = self.inner.hosts.lock().get_mut(name) {
            state.generation += 1;
        }
    }

    pub(crate) fn set_read_only(&self, name: &str, read_only: bool) {
        if let Some(state) = self.inner.hosts.lock().get_mut(name) {
            state.read_only = read_only;
        }
    }

    pub(crate) fn report_primary(&self, identifier: Option<&str>) {
        *self.inner.reported_primary.lock() = identifier.map(str::to_string);
    }

    pub(crate) fn fail_topology_probe(&self, fail: bool) {
        self.inner.probe_fails.store(fail, Ordering::SeqCst);
    }

    /// Connection attempts plus statements sent
    pub(crate) fn network_ops(&self) -> usize {
        self.inner.network_ops.load(Ordering::SeqCst)
    }

    pub(crate) fn connects(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Statements received by `name`, oldest first
    pub(crate) fn statements(&self, name: &str) -> Vec<String> {
        self.inner
            .statements
            .lock()
            .iter()
            .filter(|(host, _)| host == name)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub(crate) fn credentials(&self) -> Credentials {
        Credentials::new(Some("app".into()), Some("secret".into()))
    }

    /// Open a cluster link to `name` carrying the full host list
    pub(crate) async fn open_link(&self, name: &str) -> Arc<dyn PhysicalLink> {
        let hosts: Arc<[HostAddress]> = self.hosts().into();
        let link = ClusterLink::open_any(
            self.connector(),
            self.credentials(),
            LinkOptions::default(),
            hosts,
            &[self.host(name)],
        )
        .await
        .expect("mock host should accept connections");
        Arc::new(link)
    }

    pub(crate) async fn open_single(&self, name: &str) -> Arc<dyn PhysicalLink> {
        let link = SingleHostLink::open(
            self.connector(),
            self.credentials(),
            LinkOptions::default(),
            self.host(name),
        )
        .await
        .expect("mock host should accept connections");
        Arc::new(link)
    }

    fn state(&self, name: &str) -> Option<HostState> {
        self.inner.hosts.lock().get(name).cloned()
    }
}

struct MockConnector {
    cluster: MockCluster,
}

#[async_trait]
impl WireConnector for MockConnector {
    async fn open(
        &self,
        host: &HostAddress,
        _credentials: &Credentials,
        _options: &LinkOptions,
    ) -> Result<Box<dyn WireSession>> {
        let inner = &self.cluster.inner;
        inner.network_ops.fetch_add(1, Ordering::SeqCst);
        inner.connects.fetch_add(1, Ordering::SeqCst);

        match self.cluster.state(&host.host) {
            Some(state) if state.up => Ok(Box::new(MockSession {
                cluster: self.cluster.clone(),
                name: host.host.clone(),
                generation: state.generation,
                closed: AtomicBool::new(false),
            })),
            _ => Err(ZqlzError::Connection(format!("connection refused: {}", host))),
        }
    }
}

struct MockSession {
    cluster: MockCluster,
    name: String,
    generation: u64,
    closed: AtomicBool,
}

#[async_trait]
impl WireSession for MockSession {
    async fn run_query(&self, text: &str, _params: &[Value]) -> Result<QueryResult> {
        let inner = &self.cluster.inner;
        inner.network_ops.fetch_add(1, Ordering::SeqCst);

        let state = self.cluster.state(&self.name);
        let alive = matches!(&state, Some(s) if s.up && s.generation == self.generation);
        if !alive {
            self.closed.store(true, Ordering::SeqCst);
            return Err(ZqlzError::Connection(format!(
                "connection to {} reset by peer",
                self.name
            )));
        }
        let read_only = state.map(|s| s.read_only).unwrap_or(false);

        inner
            .statements
            .lock()
            .push((self.name.clone(), text.to_string()));

        if text == DEFAULT_ROLE_QUERY {
            return Ok(QueryResult::from_rows(
                vec!["@@innodb_read_only".into()],
                vec![vec![Value::Int64(read_only as i64)]],
            ));
        }
        if text == AURORA_PRIMARY_QUERY {
            if inner.probe_fails.load(Ordering::SeqCst) {
                return Err(ZqlzError::Query(
                    "Table 'information_schema.replica_host_status' doesn't exist".into(),
                ));
            }
            let rows = inner
                .reported_primary
                .lock()
                .iter()
                .map(|id| vec![Value::String(id.clone())])
                .collect();
            return Ok(QueryResult::from_rows(vec!["server_id".into()], rows));
        }
        if text.starts_with("BAD") {
            return Err(ZqlzError::Query(format!("syntax error near '{}'", text)));
        }
        if text == PING_QUERY || text.starts_with("SELECT") {
            return Ok(QueryResult::from_rows(
                vec!["served_by".into()],
                vec![vec![Value::String(self.name.clone())]],
            ));
        }
        Ok(QueryResult::affected(1))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Host that served a result produced by the mock
pub(crate) fn served_by(result: &QueryResult) -> Option<String> {
    result
        .first_value()
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Copy a connectivity error so it can be handed to several tasks
pub(crate) fn copy_error(err: &ZqlzError) -> ZqlzError {
    match err {
        ZqlzError::Io(e) => ZqlzError::Io(std::io::Error::new(e.kind(), e.to_string())),
        ZqlzError::Timeout(msg) => ZqlzError::Timeout(msg.clone()),
        ZqlzError::Connection(msg) => ZqlzError::Connection(msg.clone()),
        other => ZqlzError::Other(other.to_string()),
    }
}

pub(crate) fn init_test_logging() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("zqlz_failover=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

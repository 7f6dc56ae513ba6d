//! Seam to the wire protocol layer

use async_trait::async_trait;
use zqlz_core::{HostAddress, QueryResult, Result, Value};

use super::{Credentials, LinkOptions};

/// Opens physical connections
///
/// Implementations live next to the protocol code (see the `mysql` feature);
/// tests plug in scripted connectors.
#[async_trait]
pub trait WireConnector: Send + Sync + 'static {
    async fn open(
        &self,
        host: &HostAddress,
        credentials: &Credentials,
        options: &LinkOptions,
    ) -> Result<Box<dyn WireSession>>;
}

/// An open physical connection
#[async_trait]
pub trait WireSession: Send + Sync {
    /// Run one statement and collect its result
    async fn run_query(&self, text: &str, params: &[Value]) -> Result<QueryResult>;

    async fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

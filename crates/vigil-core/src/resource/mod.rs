//! External resources whose reliability is tracked.
//!
//! Every resource belongs to one of three kinds, each with its own liveness
//! probe:
//! - [`RpcEndpoint`]: `eth_blockNumber`
//! - [`HttpApiEndpoint`]: GET on a status path
//! - [`DatabaseEndpoint`]: `SELECT 1`
//!
//! [`classify`] maps the transport errors of each kind onto the shared
//! error taxonomy.

pub mod classify;
mod database;
mod http_api;
mod rpc;

pub use database::{DatabaseEndpoint, DatabaseRole};
pub use http_api::HttpApiEndpoint;
pub use rpc::{parse_hex_u128, parse_hex_u64, RpcEndpoint};

use std::sync::Arc;
use vigil_types::{ResilienceError, ResourceKind};

/// Anything the fallback executor can try: identified by a resource id.
pub trait Candidate: Send + Sync {
    fn resource_id(&self) -> &str;
}

impl Candidate for String {
    fn resource_id(&self) -> &str {
        self
    }
}

impl Candidate for &str {
    fn resource_id(&self) -> &str {
        self
    }
}

impl<T: Candidate + ?Sized> Candidate for Arc<T> {
    fn resource_id(&self) -> &str {
        (**self).resource_id()
    }
}

impl Candidate for RpcEndpoint {
    fn resource_id(&self) -> &str {
        self.id()
    }
}

impl Candidate for HttpApiEndpoint {
    fn resource_id(&self) -> &str {
        self.id()
    }
}

impl Candidate for DatabaseEndpoint {
    fn resource_id(&self) -> &str {
        self.id()
    }
}

/// Closed set of probe-able resources, handed to the health prober.
#[derive(Debug, Clone)]
pub enum ResourceHandle {
    Rpc(Arc<RpcEndpoint>),
    HttpApi(Arc<HttpApiEndpoint>),
    Database(Arc<DatabaseEndpoint>),
}

impl ResourceHandle {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceHandle::Rpc(_) => ResourceKind::Rpc,
            ResourceHandle::HttpApi(_) => ResourceKind::HttpApi,
            ResourceHandle::Database(_) => ResourceKind::Database,
        }
    }

    /// Minimal read-only liveness call for this kind of resource.
    pub async fn probe(&self) -> Result<(), ResilienceError> {
        match self {
            ResourceHandle::Rpc(rpc) => rpc.probe().await,
            ResourceHandle::HttpApi(api) => api.probe().await,
            ResourceHandle::Database(db) => db.probe().await,
        }
    }
}

impl Candidate for ResourceHandle {
    fn resource_id(&self) -> &str {
        match self {
            ResourceHandle::Rpc(rpc) => rpc.id(),
            ResourceHandle::HttpApi(api) => api.id(),
            ResourceHandle::Database(db) => db.id(),
        }
    }
}

//! Endpoint pool: N persistent HTTP connections to the search backend
//! (§4.C).
//!
//! Each endpoint's status is a tagged enum behind one lock (§9's design
//! note: the original's numeric status constants and the
//! sender-exit/maintenance-tick race become an explicit per-endpoint
//! `Mutex` here). Transitions: `Closed -> Idle -> Busy -> Closed`, no
//! `Idle -> Closed` except on shutdown (§3 invariant).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

/// `reqwest::Client` with `pool_max_idle_per_host = 1`, matching the
/// "one persistent connection" semantics of the original's single
/// `httputil.ClientConn` (§4.C [EXPANSION]).
fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(1)
        .timeout(Duration::from_secs(10))
        .build()
        .expect("static reqwest client configuration is always valid")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointStatus {
    Idle,
    Busy,
    Closed,
}

pub struct Endpoint {
    pub base_url: String,
    client: Mutex<reqwest::Client>,
    status: Mutex<EndpointStatus>,
}

impl Endpoint {
    pub(crate) async fn status(&self) -> EndpointStatus {
        *self.status.lock().await
    }

    pub(crate) async fn set_status(&self, s: EndpointStatus) {
        *self.status.lock().await = s;
    }

    pub(crate) async fn client(&self) -> reqwest::Client {
        self.client.lock().await.clone()
    }

    /// Probe the endpoint with a lightweight `HEAD /`, mirroring the
    /// "dial" step of §4.C. Any response (including non-2xx) counts as
    /// a live TCP connection; only a transport-level failure means the
    /// endpoint stays `Closed`.
    pub(crate) async fn probe(&self) -> bool {
        let client = self.client().await;
        client.head(&self.base_url).send().await.is_ok()
    }
}

pub struct EndpointPool {
    endpoints: Vec<Arc<Endpoint>>,
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("no backend endpoints configured")]
    NoEndpoints,
}

impl EndpointPool {
    /// Dial each configured URL once. A failed dial yields a `Closed`
    /// endpoint rather than a hard error — the service only fails to
    /// start if every endpoint failed to configure at all (§4.C: "the
    /// service starts iff at least one endpoint was usable at any
    /// stage — but it is an error to start with zero endpoints
    /// configured").
    pub async fn connect(urls: &[String]) -> Result<Self, PoolError> {
        if urls.is_empty() {
            return Err(PoolError::NoEndpoints);
        }
        let mut endpoints = Vec::with_capacity(urls.len());
        for url in urls {
            let endpoint = Endpoint {
                base_url: url.clone(),
                client: Mutex::new(build_client()),
                status: Mutex::new(EndpointStatus::Closed),
            };
            let ok = endpoint.probe().await;
            endpoint
                .set_status(if ok { EndpointStatus::Idle } else { EndpointStatus::Closed })
                .await;
            if ok {
                info!(url, "endpoint dialed");
            } else {
                warn!(url, "endpoint dial failed, starting closed");
            }
            endpoints.push(Arc::new(endpoint));
        }
        Ok(EndpointPool { endpoints })
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    pub async fn any_usable(&self) -> bool {
        for ep in &self.endpoints {
            if ep.status().await != EndpointStatus::Closed {
                return true;
            }
        }
        false
    }
}

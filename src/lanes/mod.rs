//! Pooled HTTP lanes for session-bearing crawl traffic.
//!
//! A lane is one long-lived `reqwest::Client` with its own private cookie
//! jar and keep-alive tuned connection pool, either connecting directly or
//! through one configured forward proxy. Auction-site logins live in the
//! jar, so a crawler must perform its login step and subsequent fetches on
//! the same lane. The pool owns the lanes; crawlers and the image pipeline
//! only ever borrow an `Arc` handle via round-robin checkout.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::cookie::Jar;
use reqwest::{Client, Proxy};
use serde::Serialize;

use crate::config::{Settings, DEFAULT_PROBE_URL};

/// How a lane reaches the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaneKind {
    Direct,
    Proxied { host: String, port: u16 },
}

impl std::fmt::Display for LaneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Proxied { host, port } => write!(f, "proxy({}:{})", host, port),
        }
    }
}

/// One pooled HTTP client with its private cookie jar.
pub struct ClientLane {
    /// Stable position in the pool; survives recreation.
    pub index: usize,
    pub kind: LaneKind,
    pub client: Client,
    pub jar: Arc<Jar>,
    logged_in: AtomicBool,
    login_time: RwLock<Option<DateTime<Utc>>>,
}

impl ClientLane {
    /// Record a successful site login performed on this lane.
    pub fn mark_logged_in(&self) {
        self.logged_in.store(true, Ordering::Relaxed);
        *self.login_time.write().unwrap() = Some(Utc::now());
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::Relaxed)
    }

    pub fn login_time(&self) -> Option<DateTime<Utc>> {
        *self.login_time.read().unwrap()
    }
}

/// Outcome of a single lane connectivity probe.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub index: usize,
    pub lane: String,
    pub success: bool,
    pub status: Option<u16>,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

/// Fixed set of HTTP lanes: one direct plus one per configured proxy.
///
/// Lanes are created up front but open no connections until first use.
/// Recreation swaps a single lane in place (fresh jar, fresh client) while
/// its external index stays stable for existing holders.
pub struct LanePool {
    settings: Settings,
    lanes: RwLock<Vec<Arc<ClientLane>>>,
    next: AtomicUsize,
}

impl LanePool {
    /// Build the full lane set from settings.
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let mut lanes = Vec::with_capacity(settings.lane_count());
        lanes.push(Arc::new(build_lane(settings, 0, LaneKind::Direct)?));
        for (i, host) in settings.proxy_ips.iter().enumerate() {
            let kind = LaneKind::Proxied {
                host: host.clone(),
                port: settings.proxy_port,
            };
            lanes.push(Arc::new(build_lane(settings, i + 1, kind)?));
        }
        tracing::info!(lanes = lanes.len(), "lane pool initialized");

        Ok(Self {
            settings: settings.clone(),
            lanes: RwLock::new(lanes),
            next: AtomicUsize::new(0),
        })
    }

    /// Number of lanes currently in the pool.
    pub fn len(&self) -> usize {
        self.lanes.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the next lane, round-robin. Returns `None` after `cleanup`.
    pub fn checkout(&self) -> Option<Arc<ClientLane>> {
        let lanes = self.lanes.read().unwrap();
        if lanes.is_empty() {
            return None;
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % lanes.len();
        Some(lanes[idx].clone())
    }

    /// Borrow a specific lane by index.
    pub fn get(&self, index: usize) -> Option<Arc<ClientLane>> {
        self.lanes.read().unwrap().get(index).cloned()
    }

    /// Rebuild one lane in place with a fresh jar and transport.
    ///
    /// Holders of the old `Arc` keep a working (stale) lane until they drop
    /// it; new checkouts see the replacement.
    pub fn recreate(&self, index: usize) -> anyhow::Result<Arc<ClientLane>> {
        let kind = {
            let lanes = self.lanes.read().unwrap();
            lanes
                .get(index)
                .map(|lane| lane.kind.clone())
                .ok_or_else(|| anyhow::anyhow!("invalid lane index: {index}"))?
        };

        let fresh = Arc::new(build_lane(&self.settings, index, kind)?);
        self.lanes.write().unwrap()[index] = fresh.clone();
        tracing::info!(index, lane = %fresh.kind, "lane recreated");
        Ok(fresh)
    }

    /// Probe one lane's connectivity and latency.
    ///
    /// Diagnostics only; a failed probe never evicts a lane. Retry and
    /// recreate decisions belong to the caller.
    pub async fn probe(&self, lane: &ClientLane, url: Option<&str>) -> ProbeResult {
        let url = url.unwrap_or(DEFAULT_PROBE_URL);
        let start = Instant::now();
        let outcome = lane
            .client
            .get(url)
            .timeout(Duration::from_secs(10))
            .send()
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(response) => ProbeResult {
                index: lane.index,
                lane: lane.kind.to_string(),
                success: response.status().is_success(),
                status: Some(response.status().as_u16()),
                latency_ms: Some(latency_ms),
                error: None,
            },
            Err(err) => ProbeResult {
                index: lane.index,
                lane: lane.kind.to_string(),
                success: false,
                status: None,
                latency_ms: None,
                error: Some(err.to_string()),
            },
        }
    }

    /// Probe every lane.
    pub async fn probe_all(&self, url: Option<&str>) -> Vec<ProbeResult> {
        let lanes: Vec<_> = self.lanes.read().unwrap().clone();
        let mut results = Vec::with_capacity(lanes.len());
        for lane in &lanes {
            results.push(self.probe(lane, url).await);
        }
        results
    }

    /// Drop all lanes, closing their idle connections. Idempotent.
    pub fn cleanup(&self) {
        self.lanes.write().unwrap().clear();
    }
}

fn build_lane(settings: &Settings, index: usize, kind: LaneKind) -> anyhow::Result<ClientLane> {
    let jar = Arc::new(Jar::default());

    let mut builder = Client::builder()
        .user_agent(&settings.user_agent)
        .cookie_provider(jar.clone())
        .timeout(settings.request_timeout())
        .pool_max_idle_per_host(settings.max_idle_per_host)
        .pool_idle_timeout(settings.idle_timeout())
        .tcp_keepalive(settings.tcp_keepalive())
        .redirect(reqwest::redirect::Policy::limited(5))
        .gzip(true)
        .brotli(true);

    if let LaneKind::Proxied { host, port } = &kind {
        builder = builder.proxy(Proxy::all(format!("http://{host}:{port}"))?);
    }

    Ok(ClientLane {
        index,
        kind,
        client: builder.build()?,
        jar,
        logged_in: AtomicBool::new(false),
        login_time: RwLock::new(None),
    })
}

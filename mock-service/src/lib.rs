use axum::{
    debug_handler,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, Uri},
    routing::get,
    Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lazy_static::lazy_static;
#[allow(unused)]
use metrics::{counter, gauge, histogram};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
    time::Duration,
};
use tower_http::trace::TraceLayer;
use tracing::debug;

/// One request as the mock server saw it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hit {
    pub path: String,
    pub real_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Every request the server has received, in arrival order.
#[derive(Clone, Debug, Default)]
pub struct Hits(Arc<Mutex<Vec<Hit>>>);

impl Hits {
    fn record(&self, uri: &Uri, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let hit = Hit {
            path: uri
                .path_and_query()
                .map_or_else(|| uri.path().to_string(), |p| p.to_string()),
            real_ip: header("x-realip"),
            user_agent: header("user-agent"),
        };
        debug!("{hit:?}");
        self.0.lock().unwrap().push(hit);
    }

    pub fn all(&self) -> Vec<Hit> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Routes:
/// - `/ok/*path` answers 200
/// - `/status/:code/*path` answers with `code`
/// - `/delay/ms/:delay_ms/*path` sleeps, then answers 200
/// - `/limited/:max_tps/*path` answers 429 above `max_tps`
///
/// Anything else is recorded and answered with 404.
pub fn router(hits: Hits) -> Router {
    Router::new()
        .route("/ok/*path", get(ok))
        .route("/status/:code/*path", get(status))
        .route("/delay/ms/:delay_ms/*path", get(delay))
        .route("/limited/:max_tps/*path", get(limited))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(hits)
}

pub async fn run(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(Hits::default())).await?;
    Ok(())
}

/// Serve on an ephemeral local port. Returns the bound address and the hit recorder.
pub async fn spawn() -> anyhow::Result<(SocketAddr, Hits)> {
    let hits = Hits::default();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let app = router(hits.clone());
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!("Mock service stopped: {err}");
        }
    });

    Ok((addr, hits))
}

fn measure() {
    counter!("mock-server.tps").increment(1);
    TPS_MEASURE.fetch_add(1, Ordering::Relaxed);
}

#[debug_handler]
async fn ok(State(hits): State<Hits>, uri: Uri, headers: HeaderMap) {
    measure();
    hits.record(&uri, &headers);
}

#[debug_handler]
async fn status(
    State(hits): State<Hits>,
    Path((code, _)): Path<(u16, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> StatusCode {
    measure();
    hits.record(&uri, &headers);
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[debug_handler]
async fn delay(
    State(hits): State<Hits>,
    Path((delay_ms, _)): Path<(u64, String)>,
    uri: Uri,
    headers: HeaderMap,
) {
    measure();
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    hits.record(&uri, &headers);
}

lazy_static! {
    static ref LIMITED_MAP: RwLock<HashMap<u32, Arc<DefaultDirectRateLimiter>>> =
        RwLock::new(HashMap::new());
}

#[debug_handler]
async fn limited(
    State(hits): State<Hits>,
    Path((max_tps, _)): Path<(u32, String)>,
    uri: Uri,
    headers: HeaderMap,
) -> StatusCode {
    measure();
    hits.record(&uri, &headers);

    let Some(tps) = NonZeroU32::new(max_tps) else {
        return StatusCode::TOO_MANY_REQUESTS;
    };

    let read = LIMITED_MAP.read().unwrap().get(&max_tps).cloned();
    let limiter = match read {
        Some(limiter) => limiter,
        None => LIMITED_MAP
            .write()
            .unwrap()
            .entry(max_tps)
            .or_insert_with(|| Arc::new(RateLimiter::direct(Quota::per_second(tps))))
            .clone(),
    };

    match limiter.check() {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::TOO_MANY_REQUESTS,
    }
}

async fn not_found(State(hits): State<Hits>, uri: Uri, headers: HeaderMap) -> StatusCode {
    measure();
    hits.record(&uri, &headers);
    StatusCode::NOT_FOUND
}

/** TPS Printer **/

static TPS_MEASURE: AtomicU64 = AtomicU64::new(0);

pub async fn tps_measure_task() {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let transactions = TPS_MEASURE.swap(0, Ordering::Relaxed);
        if transactions > 0 {
            println!("{transactions} TPS");
        }
        gauge!("mock-server.tps").set(transactions as f64);
    }
}

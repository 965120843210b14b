mod utils;
#[allow(unused)]
use utils::*;

use logreplay::prelude::*;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::BufReader;

async fn replay(config: ReplayConfig, log: &tempfile::NamedTempFile) -> RunOutcome {
    let file = File::open(log.path()).await.unwrap();
    Replay::new(config, BufReader::new(file))
        .run()
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn replays_matching_lines_only() {
    init();
    let (addr, hits) = mock_service::spawn().await.unwrap();

    let log = log_file(&[
        log_line("10.1.1.1", "/ok/home", "agent-a"),
        log_line("10.1.1.2", "/ok/search?q=rust", "agent-b"),
        "10.1.1.9 - - [10/Oct/2023:13:55:36 +0000] \"POST /ok/form HTTP/1.1\" 200 1 \"-\" \"x\"\n"
            .to_string(),
        log_line("10.1.1.3", "/ok/about", "agent-c"),
    ]);

    let config = ReplayConfig::builder(base_url(addr))
        .concurrency(1)
        .build()
        .unwrap();
    let outcome = replay(config, &log).await;

    assert_eq!(outcome.metrics.total, 3);
    assert_eq!(outcome.metrics.ok, 3);
    assert_eq!(outcome.metrics.error, 0);
    assert_eq!(outcome.metrics.latencies.len(), 3);
    assert!(outcome.parser_error.is_none());
    assert_eq!(outcome.failed_workers, 0);

    let seen = hits.all();
    assert_eq!(seen.len(), 3);
    // One worker replays in log order.
    assert_eq!(seen[0].path, "/ok/home");
    assert_eq!(seen[0].real_ip.as_deref(), Some("10.1.1.1"));
    assert_eq!(seen[0].user_agent.as_deref(), Some("agent-a"));
    assert_eq!(seen[1].path, "/ok/search?q=rust");
    assert_eq!(seen[2].user_agent.as_deref(), Some("agent-c"));

    let report = outcome.report().unwrap();
    assert_eq!(report.ok, 3);
    assert!(report.percentile(100).is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn error_status_counts_as_error() {
    init();
    let (addr, hits) = mock_service::spawn().await.unwrap();

    let log = log_file(&[
        log_line("10.0.0.1", "/ok/1", "agent"),
        log_line("10.0.0.2", "/status/500/broken", "agent"),
        log_line("10.0.0.3", "/ok/2", "agent"),
    ]);

    let config = ReplayConfig::builder(base_url(addr))
        .concurrency(2)
        .build()
        .unwrap();
    let outcome = replay(config, &log).await;

    assert_eq!(outcome.metrics.total, 3);
    assert_eq!(outcome.metrics.ok, 2);
    assert_eq!(outcome.metrics.error, 1);
    assert_eq!(outcome.metrics.latencies.len(), 2);
    assert_eq!(hits.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn unreachable_target_fails_every_request() {
    init();
    let addr = closed_port().await;

    let lines: Vec<_> = (0..5)
        .map(|i| log_line("10.0.0.1", &format!("/page/{i}"), "agent"))
        .collect();
    let log = log_file(&lines);

    let config = ReplayConfig::builder(base_url(addr))
        .concurrency(2)
        .build()
        .unwrap();
    let outcome = replay(config, &log).await;

    assert_eq!(outcome.metrics.total, 5);
    assert_eq!(outcome.metrics.ok, 0);
    assert_eq!(outcome.metrics.error, 5);
    assert!(outcome.metrics.latencies.is_empty());
    assert_eq!(outcome.report(), Err(ReportError::NoSamples));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn slow_target_holds_back_the_parser() {
    init();
    let (addr, hits) = mock_service::spawn().await.unwrap();

    let lines: Vec<_> = (0..60)
        .map(|i| log_line("10.0.0.1", &format!("/delay/ms/5/{i}"), "agent"))
        .collect();
    let log = log_file(&lines);

    let config = ReplayConfig::builder(base_url(addr))
        .concurrency(1)
        .queue_capacity(NonZeroUsize::new(4).unwrap())
        .build()
        .unwrap();
    let outcome = replay(config, &log).await;

    assert_eq!(outcome.metrics.ok, 60);
    assert_eq!(outcome.queued, 60);
    assert!(outcome.queue_high_water <= 4);
    assert!(outcome.queue_high_water >= 2);
    assert_eq!(hits.len(), 60);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn request_limit_stops_parsing() {
    init();
    let (addr, hits) = mock_service::spawn().await.unwrap();

    let lines: Vec<_> = (0..20)
        .map(|i| log_line("10.0.0.1", &format!("/ok/{i}"), "agent"))
        .collect();
    let log = log_file(&lines);

    let limited = ReplayConfig::builder(base_url(addr))
        .concurrency(3)
        .request_limit(5)
        .build()
        .unwrap();
    let outcome = replay(limited, &log).await;
    assert_eq!(outcome.metrics.total, 5);
    assert_eq!(hits.len(), 5);

    let unlimited = ReplayConfig::builder(base_url(addr))
        .concurrency(3)
        .request_limit(0)
        .build()
        .unwrap();
    let outcome = replay(unlimited, &log).await;
    assert_eq!(outcome.metrics.total, 20);
    assert_eq!(hits.len(), 25);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn timed_out_request_is_an_error() {
    init();
    let (addr, _hits) = mock_service::spawn().await.unwrap();

    let log = log_file(&[
        log_line("10.0.0.1", "/delay/ms/2000/slow", "agent"),
        log_line("10.0.0.1", "/ok/fast", "agent"),
    ]);

    let config = ReplayConfig::builder(base_url(addr))
        .concurrency(2)
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let outcome = replay(config, &log).await;

    assert_eq!(outcome.metrics.ok, 1);
    assert_eq!(outcome.metrics.error, 1);
    assert!(outcome.metrics.latencies[0] < Duration::from_millis(2000));

    let transport = HttpTransport::new(Duration::from_millis(200)).unwrap();
    let record = RequestRecord::new("10.0.0.1", "/delay/ms/2000/x", "agent");
    let err = transport
        .replay(&format!("{}/delay/ms/2000/x", base_url(addr)), &record)
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(!RequestError::Status(503).is_timeout());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn throttled_responses_count_as_errors() {
    init();
    let (addr, hits) = mock_service::spawn().await.unwrap();

    // One request per second allowed; the rest of this burst is answered with 429.
    let lines: Vec<_> = (0..10)
        .map(|i| log_line("10.0.0.1", &format!("/limited/1/{i}"), "agent"))
        .collect();
    let log = log_file(&lines);

    let config = ReplayConfig::builder(base_url(addr))
        .concurrency(2)
        .build()
        .unwrap();
    let outcome = replay(config, &log).await;

    assert_eq!(outcome.metrics.total, 10);
    assert!(outcome.metrics.ok >= 1);
    assert!(outcome.metrics.error >= 5);
    assert_eq!(outcome.metrics.latencies.len() as u64, outcome.metrics.ok);
    assert_eq!(hits.len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ntest::timeout(30_000)]
async fn http_transport_classifies_responses() {
    init();
    let (addr, hits) = mock_service::spawn().await.unwrap();
    let transport = HttpTransport::new(Duration::from_secs(1)).unwrap();
    let record = RequestRecord::new("192.168.0.7", "/ok/x", "probe/1.0");

    transport
        .replay(&format!("{}/ok/x", base_url(addr)), &record)
        .await
        .unwrap();
    let err = transport
        .replay(&format!("{}/status/404/x", base_url(addr)), &record)
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::Status(404)));
    assert_eq!(err.to_string(), "HTTP Error 404: response code error");

    let first = &hits.all()[0];
    assert_eq!(first.real_ip.as_deref(), Some("192.168.0.7"));
    assert_eq!(first.user_agent.as_deref(), Some("probe/1.0"));
}

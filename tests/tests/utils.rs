use std::io::Write;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tempfile::NamedTempFile;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::new("logreplay=debug,mock_service=debug"))
            .with_test_writer()
            .try_init();
    });
}

/// A combined-format access log line for a GET of `path`.
#[allow(unused)]
pub fn log_line(client_ip: &str, path: &str, user_agent: &str) -> String {
    format!(
        "{client_ip} - - [10/Oct/2023:13:55:36 +0000] \"GET {path} HTTP/1.1\" 200 2326 \"http://referer.test/\" \"{user_agent}\"\n"
    )
}

/// Write `lines` to a fresh temp file that lives as long as the returned handle.
#[allow(unused)]
pub fn log_file(lines: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        file.write_all(line.as_bytes()).unwrap();
    }
    file.flush().unwrap();
    file
}

#[allow(unused)]
pub fn base_url(addr: SocketAddr) -> String {
    format!("http://{addr}")
}

/// An address nothing is listening on.
#[allow(unused)]
pub async fn closed_port() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

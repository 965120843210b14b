//! Issuing a replayed request against the target server.
use logreplay_core::RequestRecord;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Header carrying the client address recorded in the log.
pub const REAL_IP_HEADER: &str = "X-RealIP";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("HTTP Error {0}: response code error")]
    Status(u16),

    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

impl RequestError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RequestError::Transport(err) if err.is_timeout())
    }
}

/// How a worker turns a [`RequestRecord`] into a live request.
///
/// A successful `replay` must only return once the whole response has been received, since the
/// caller times the call as the request latency.
///
/// Every failure must come back as a [`RequestError`]. A panic takes its worker down with it and
/// the record it held is never counted.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    async fn replay(&self, url: &str, record: &RequestRecord) -> Result<(), RequestError>;
}

/// Plain HTTP GET using one connection pool per worker.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, RequestError> {
        // No cookie store: every replayed request stands on its own.
        let client = Client::builder().build()?;
        Ok(Self { client, timeout })
    }
}

impl Transport for HttpTransport {
    async fn replay(&self, url: &str, record: &RequestRecord) -> Result<(), RequestError> {
        let response = self
            .client
            .get(url)
            .header(REAL_IP_HEADER, record.client_ip())
            .header(reqwest::header::USER_AGENT, record.user_agent())
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(RequestError::Status(status));
        }

        // Drain the body so the connection can be reused and the timing covers the transfer.
        response.bytes().await?;
        Ok(())
    }
}

use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::error::ProbeError;

/// Completed HTTP exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status_code: u16,
    pub elapsed_ms: u64,
}

/// Network collaborator performing a single GET against a target
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// Issue one GET. Every status code is a valid response; only network
    /// failures (including hitting `timeout`) are errors.
    async fn get(&self, url: &str, timeout: Duration) -> Result<ProbeResponse, ProbeError>;
}

/// HTTP/HTTPS prober backed by a shared reqwest client
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("uptrack/", env!("CARGO_PKG_VERSION")))
            // One GET per check; a 3xx is classified, not followed
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn get(&self, url: &str, request_timeout: Duration) -> Result<ProbeResponse, ProbeError> {
        let start = Instant::now();

        let request = self.client.get(url).timeout(request_timeout).send();

        // Dropping the request future aborts the connection
        match timeout(request_timeout, request).await {
            Err(_) => Err(ProbeError::Timeout { elapsed_ms: elapsed_ms(start) }),
            Ok(Ok(response)) => Ok(ProbeResponse {
                status_code: response.status().as_u16(),
                elapsed_ms: elapsed_ms(start),
            }),
            Ok(Err(e)) if e.is_timeout() => Err(ProbeError::Timeout { elapsed_ms: elapsed_ms(start) }),
            Ok(Err(e)) => Err(ProbeError::Connection {
                elapsed_ms: elapsed_ms(start),
                message: format!("HTTP request failed: {e}"),
            }),
        }
    }
}

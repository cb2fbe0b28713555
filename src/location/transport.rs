//! Outbound HTTP seam.
//!
//! The library only ever needs `GET url` with a deadline. Production traffic
//! goes through `ureq` on tokio's blocking pool; tests substitute fakes.

use async_trait::async_trait;
use std::time::Duration;

/// A completed HTTP exchange (any status).
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// URL after following redirects.
    pub final_url: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Io(String),
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError>;
}

/// `ureq`-backed transport. Follows up to five redirects.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(user_agent: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(user_agent)
            .redirects(5)
            .build();
        Self { agent }
    }
}

#[async_trait]
impl HttpTransport for UreqTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        let url = url.to_string();
        // The blocking call carries the same deadline, so an abandoned
        // thread finishes on its own.
        let joined = tokio::task::spawn_blocking(move || fetch_blocking(&agent, &url, timeout)).await;
        joined.map_err(|e| TransportError::Io(e.to_string()))?
    }
}

fn fetch_blocking(
    agent: &ureq::Agent,
    url: &str,
    timeout: Duration,
) -> Result<HttpResponse, TransportError> {
    let response = match agent
        .get(url)
        .set("Accept", "application/json, text/html;q=0.9, */*;q=0.8")
        .timeout(timeout)
        .call()
    {
        Ok(r) => r,
        // Non-2xx still counts as a completed exchange.
        Err(ureq::Error::Status(_, r)) => r,
        Err(ureq::Error::Transport(t)) => return Err(classify(&t)),
    };

    let status = response.status();
    let final_url = response.get_url().to_string();
    let body = response
        .into_string()
        .map_err(|e| TransportError::Io(e.to_string()))?;

    Ok(HttpResponse { status, final_url, body })
}

fn classify(t: &ureq::Transport) -> TransportError {
    let msg = t.to_string();
    if msg.contains("timed out") || msg.contains("Timeout") {
        TransportError::Timeout
    } else {
        TransportError::Io(msg)
    }
}

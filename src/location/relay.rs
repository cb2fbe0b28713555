//! Relay fallback chain.
//!
//! A target URL is fetched through an ordered list of relays. Each relay is
//! tried at most once; the first one that returns a 2xx response with a
//! usable body wins. Relays are third-party and flaky, so there is no
//! backoff and no retry: fall through fast.

use super::transport::{HttpResponse, HttpTransport, TransportError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::form_urlencoded;

/// A named URL template that wraps a target URL.
///
/// `{url}` is replaced by the raw target, `{encoded}` by the
/// percent-encoded target. A template of just `{url}` fetches directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEndpoint {
    pub name: String,
    pub template: String,
}

impl RelayEndpoint {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self { name: name.into(), template: template.into() }
    }

    pub fn direct() -> Self {
        Self::new("direct", "{url}")
    }

    pub fn allorigins() -> Self {
        Self::new("allorigins", "https://api.allorigins.win/raw?url={encoded}")
    }

    pub fn corsproxy() -> Self {
        Self::new("corsproxy", "https://corsproxy.io/?{encoded}")
    }

    pub fn relay_url(&self, target: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
        self.template.replace("{encoded}", &encoded).replace("{url}", target)
    }

    /// Parse `name=template` or a bare template (named after its host).
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return None;
        }
        if let Some((name, template)) = spec.split_once('=') {
            if !name.contains('/') && !name.contains('?') {
                return Some(Self::new(name.trim(), template.trim()));
            }
        }
        let name = url::Url::parse(spec)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "direct".to_string());
        Some(Self::new(name, spec))
    }
}

/// Why a single relay attempt did not produce a usable body.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("timed out")]
    Timeout,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("{0}")]
    Transport(String),
    #[error("unusable body: {0}")]
    Malformed(String),
}

impl FetchError {
    /// True when the relay itself could not be reached or answered badly,
    /// as opposed to answering with content we could not use.
    pub fn is_network(&self) -> bool {
        !matches!(self, Self::Malformed(_))
    }

    /// True when no server answered at all. An HTTP status is an answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport(_))
    }
}

impl From<TransportError> for FetchError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout => Self::Timeout,
            TransportError::Io(msg) => Self::Transport(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChainError {
    #[error("all {} relays failed", .attempts.len())]
    Exhausted { attempts: Vec<(String, FetchError)> },
    #[error("cancelled")]
    Cancelled,
}

impl ChainError {
    /// Exhausted with no relay ever delivering a body.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Exhausted { attempts } => attempts.iter().all(|(_, e)| e.is_network()),
            Self::Cancelled => false,
        }
    }

    /// Exhausted with no attempt getting any HTTP answer.
    pub fn never_answered(&self) -> bool {
        match self {
            Self::Exhausted { attempts } => attempts.iter().all(|(_, e)| e.is_transport()),
            Self::Cancelled => false,
        }
    }
}

/// One link in the chain.
#[async_trait]
pub trait Relay: Send + Sync {
    fn name(&self) -> &str;

    async fn attempt(&self, target: &str, timeout: Duration) -> Result<HttpResponse, FetchError>;
}

/// Production relay: template + shared transport.
pub struct TemplateRelay {
    endpoint: RelayEndpoint,
    transport: Arc<dyn HttpTransport>,
}

impl TemplateRelay {
    pub fn new(endpoint: RelayEndpoint, transport: Arc<dyn HttpTransport>) -> Self {
        Self { endpoint, transport }
    }
}

#[async_trait]
impl Relay for TemplateRelay {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    async fn attempt(&self, target: &str, timeout: Duration) -> Result<HttpResponse, FetchError> {
        let url = self.endpoint.relay_url(target);
        let response = self.transport.get(&url, timeout).await?;
        if !response.is_success() {
            return Err(FetchError::Status(response.status));
        }
        Ok(response)
    }
}

/// Ordered relays tried front to back.
#[derive(Clone)]
pub struct RelayChain {
    relays: Vec<Arc<dyn Relay>>,
}

impl fmt::Debug for RelayChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.relays.iter().map(|r| r.name())).finish()
    }
}

impl RelayChain {
    pub fn new(relays: Vec<Arc<dyn Relay>>) -> Self {
        Self { relays }
    }

    pub fn from_endpoints(endpoints: &[RelayEndpoint], transport: Arc<dyn HttpTransport>) -> Self {
        let relays = endpoints
            .iter()
            .map(|e| Arc::new(TemplateRelay::new(e.clone(), transport.clone())) as Arc<dyn Relay>)
            .collect();
        Self { relays }
    }

    pub fn len(&self) -> usize {
        self.relays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }

    /// Fetch `target`, returning the first 2xx body.
    pub async fn fetch(
        &self,
        target: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, ChainError> {
        self.fetch_parsed(target, timeout, cancel, |r| Ok(r.clone())).await
    }

    /// Fetch `target`, returning the first 2xx response that `parse` accepts.
    /// A rejected body counts as a failed attempt.
    pub async fn fetch_parsed<T, F>(
        &self,
        target: &str,
        timeout: Duration,
        cancel: &CancellationToken,
        parse: F,
    ) -> Result<T, ChainError>
    where
        F: Fn(&HttpResponse) -> Result<T, String>,
    {
        let mut attempts = Vec::with_capacity(self.relays.len());

        for relay in &self.relays {
            if cancel.is_cancelled() {
                return Err(ChainError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ChainError::Cancelled),
                r = tokio::time::timeout(timeout, relay.attempt(target, timeout)) => r,
            };

            let error = match outcome {
                Ok(Ok(response)) => match parse(&response) {
                    Ok(value) => {
                        tracing::debug!(relay = relay.name(), "relay succeeded");
                        return Ok(value);
                    }
                    Err(msg) => FetchError::Malformed(msg),
                },
                Ok(Err(e)) => e,
                Err(_) => FetchError::Timeout,
            };

            tracing::debug!(relay = relay.name(), error = %error, "relay failed, trying next");
            attempts.push((relay.name().to_string(), error));
        }

        tracing::warn!(target_url = target, tried = attempts.len(), "relay chain exhausted");
        Err(ChainError::Exhausted { attempts })
    }
}

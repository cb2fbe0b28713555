//! Map link resolution.
//!
//! Long map URLs usually carry their coordinates and need no network. Short
//! links (`maps.app.goo.gl/...`) have to be followed: first the final URL
//! after redirects is inspected, then the page body.

use super::extract::extract;
use super::relay::{ChainError, RelayChain};
use super::types::{Cancelled, Coordinate};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShortLinkOutcome {
    pub coordinate: Option<Coordinate>,
    /// The link had to be fetched and no request got any HTTP answer.
    pub unreachable: bool,
}

impl ShortLinkOutcome {
    fn found(c: Coordinate) -> Self {
        Self { coordinate: Some(c), unreachable: false }
    }

    fn missing(unreachable: bool) -> Self {
        Self { coordinate: None, unreachable }
    }
}

#[derive(Debug, Clone)]
pub struct ShortLinkResolver {
    chain: RelayChain,
    timeout: Duration,
}

impl ShortLinkResolver {
    pub fn new(chain: RelayChain) -> Self {
        Self { chain, timeout: Duration::from_secs(5) }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Coordinates behind `url`, or `None` when they cannot be found.
    pub async fn resolve(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Coordinate>, Cancelled> {
        Ok(self.resolve_detailed(url, cancel).await?.coordinate)
    }

    pub async fn resolve_detailed(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ShortLinkOutcome, Cancelled> {
        if let Some(c) = extract(url) {
            return Ok(ShortLinkOutcome::found(c));
        }

        let response = match self.chain.fetch(url, self.timeout, cancel).await {
            Ok(r) => r,
            Err(ChainError::Cancelled) => return Err(Cancelled),
            Err(e) => {
                tracing::info!(
                    url,
                    error = %e,
                    "could not follow map link; paste the full URL or raw coordinates instead"
                );
                return Ok(ShortLinkOutcome::missing(e.never_answered()));
            }
        };

        if response.final_url != url {
            if let Some(c) = extract(&response.final_url) {
                tracing::debug!(url, final_url = %response.final_url, "resolved via redirect");
                return Ok(ShortLinkOutcome::found(c));
            }
        }

        if let Some(c) = extract(&response.body) {
            tracing::debug!(url, "resolved via page body");
            return Ok(ShortLinkOutcome::found(c));
        }

        Ok(ShortLinkOutcome::missing(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::relay::RelayEndpoint;
    use crate::location::transport::fake::{self, FakeTransport};
    use crate::location::transport::{HttpResponse, TransportError};
    use std::sync::Arc;

    fn resolver(transport: Arc<FakeTransport>) -> ShortLinkResolver {
        ShortLinkResolver::new(RelayChain::from_endpoints(&[RelayEndpoint::direct()], transport))
    }

    #[tokio::test]
    async fn test_long_url_needs_no_network() {
        let transport = Arc::new(FakeTransport::unreachable());
        let r = resolver(transport.clone());
        let got = r
            .resolve("https://www.google.com/maps/@28.7041,77.1025,15z", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(got, Some(Coordinate::new(28.7041, 77.1025).unwrap()));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_redirect_target_used() {
        let transport = Arc::new(FakeTransport::new(|_| {
            (
                Duration::ZERO,
                Ok(HttpResponse {
                    status: 200,
                    final_url: "https://www.google.com/maps/place/X/@29.3909,76.9635,17z".into(),
                    body: String::new(),
                }),
            )
        }));
        let got = resolver(transport)
            .resolve("https://maps.app.goo.gl/AbC123", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(got, Some(Coordinate::new(29.3909, 76.9635).unwrap()));
    }

    #[tokio::test]
    async fn test_body_scanned_when_url_has_nothing() {
        let html = r#"<html><meta property="og:image" content="https://maps.google.com/maps/api/staticmap?center=29.1,76.2&zoom=15"></html>"#;
        let transport = Arc::new(FakeTransport::new(move |url| (Duration::ZERO, fake::ok(url, html))));
        let got = resolver(transport)
            .resolve("https://goo.gl/maps/xyz", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(got, Some(Coordinate::new(29.1, 76.2).unwrap()));
    }

    #[tokio::test]
    async fn test_unreachable_is_absence() {
        let transport = Arc::new(FakeTransport::new(|_| {
            (Duration::ZERO, Err(TransportError::Io("cors".into())))
        }));
        let out = resolver(transport)
            .resolve_detailed("https://maps.app.goo.gl/AbC123", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.coordinate, None);
        assert!(out.unreachable);
    }

    #[tokio::test]
    async fn test_dead_link_is_not_found() {
        let transport = Arc::new(FakeTransport::new(|url| (Duration::ZERO, fake::status(url, 404))));
        let out = resolver(transport.clone())
            .resolve_detailed("https://maps.app.goo.gl/DeadLink", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, ShortLinkOutcome { coordinate: None, unreachable: false });
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_page_without_coordinates() {
        let transport = Arc::new(FakeTransport::new(|url| (Duration::ZERO, fake::ok(url, "<html></html>"))));
        let out = resolver(transport)
            .resolve_detailed("https://maps.app.goo.gl/AbC123", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, ShortLinkOutcome { coordinate: None, unreachable: false });
    }

    #[tokio::test]
    async fn test_cancelled() {
        let transport = Arc::new(FakeTransport::unreachable());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let got = resolver(transport).resolve("https://maps.app.goo.gl/AbC123", &cancel).await;
        assert_eq!(got, Err(Cancelled));
    }
}

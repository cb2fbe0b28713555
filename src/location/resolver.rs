//! Location resolver: orchestrates the interpretation chain.
//!
//! Input flow: bare coordinates → URL (map link / any URL) → place search → not found.
//! Structural parsing always runs before any network call; network paths
//! run cheapest first.

use super::extract::{extract, parse_bare};
use super::providers::PlaceSearch;
use super::relay::RelayChain;
use super::shortlink::ShortLinkResolver;
use super::transport::HttpTransport;
use super::types::{Cancelled, Coordinate, Resolution};
use crate::config::Config;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Host families whose links are worth following over the network.
pub const DEFAULT_MAP_HOSTS: &[&str] = &["google.com", "goo.gl"];

/// How a piece of input will be interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum InputKind {
    Empty,
    Coordinates(Coordinate),
    Url(Url),
    Text(String),
}

/// Classify input without touching the network.
pub fn classify(raw: &str) -> InputKind {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return InputKind::Empty;
    }
    if let Some(c) = parse_bare(trimmed) {
        return InputKind::Coordinates(c);
    }
    // "panipat:haryana" parses as a URL with scheme "panipat"; only web
    // links count.
    match Url::parse(trimmed) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => InputKind::Url(u),
        _ => InputKind::Text(trimmed.to_string()),
    }
}

/// The location resolver with its fallback pipeline.
#[derive(Debug, Clone)]
pub struct LocationResolver {
    shortlinks: ShortLinkResolver,
    search: PlaceSearch,
    map_hosts: Vec<String>,
}

impl LocationResolver {
    pub fn new(shortlinks: ShortLinkResolver, search: PlaceSearch) -> Self {
        Self {
            shortlinks,
            search,
            map_hosts: DEFAULT_MAP_HOSTS.iter().map(|h| h.to_string()).collect(),
        }
    }

    pub fn with_map_hosts(mut self, hosts: Vec<String>) -> Self {
        self.map_hosts = hosts.into_iter().map(|h| h.trim().to_lowercase()).collect();
        self
    }

    pub fn from_config(config: &Config, transport: Arc<dyn HttpTransport>) -> Self {
        let shortlinks = ShortLinkResolver::new(RelayChain::from_endpoints(
            &config.shortlink_relays,
            transport.clone(),
        ))
        .with_timeout(config.shortlink_timeout);

        let search = PlaceSearch::new(RelayChain::from_endpoints(&config.search_relays, transport))
            .with_base_url(config.nominatim_url.clone())
            .with_region_hint(config.region_hint.clone())
            .with_limit(config.search_limit)
            .with_min_query_len(config.min_query_len)
            .with_timeout(config.search_timeout);

        Self::new(shortlinks, search).with_map_hosts(config.map_hosts.clone())
    }

    /// `maps.app.goo.gl` matches `goo.gl`; `notgoogle.com` does not match `google.com`.
    pub fn is_map_host(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.map_hosts
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    }

    /// Resolve input to a single best coordinate.
    pub async fn resolve_input(
        &self,
        raw: &str,
        cancel: &CancellationToken,
    ) -> Result<Resolution, Cancelled> {
        match classify(raw) {
            InputKind::Empty => Ok(Resolution::NotFound),
            InputKind::Coordinates(c) => Ok(c.into()),
            InputKind::Url(url) => self.resolve_url(&url, raw.trim(), cancel).await,
            InputKind::Text(text) => {
                let outcome = self.search.search(&text, cancel).await?;
                Ok(match outcome.candidates.first() {
                    Some(best) => best.coordinate.into(),
                    None if outcome.unavailable => Resolution::Unavailable,
                    None => Resolution::NotFound,
                })
            }
        }
    }

    async fn resolve_url(
        &self,
        url: &Url,
        raw: &str,
        cancel: &CancellationToken,
    ) -> Result<Resolution, Cancelled> {
        let is_map = url.host_str().is_some_and(|h| self.is_map_host(h));
        if is_map {
            let outcome = self.shortlinks.resolve_detailed(raw, cancel).await?;
            if let Some(c) = outcome.coordinate {
                return Ok(c.into());
            }
            if outcome.unreachable {
                return Ok(Resolution::Unavailable);
            }
            return Ok(Resolution::NotFound);
        }
        Ok(extract(raw).map_or(Resolution::NotFound, Resolution::from))
    }

    /// Full candidate list for a suggestion dropdown, from the same search
    /// the single-answer path uses.
    pub async fn suggest(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Resolution, Cancelled> {
        let outcome = self.search.search(query, cancel).await?;
        Ok(if !outcome.candidates.is_empty() {
            Resolution::Candidates { candidates: outcome.candidates }
        } else if outcome.unavailable {
            Resolution::Unavailable
        } else {
            Resolution::NotFound
        })
    }

    /// `resolve_input` without external cancellation.
    pub async fn resolve(&self, raw: &str) -> Resolution {
        self.resolve_input(raw, &CancellationToken::new())
            .await
            .unwrap_or(Resolution::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::relay::RelayEndpoint;
    use crate::location::transport::fake::{self, FakeTransport};
    use crate::location::types::PlaceCandidate;
    use std::time::Duration;

    const PANIPAT: &str =
        r#"[{"display_name":"Panipat, Haryana, India","lat":"29.3909","lon":"76.9635"}]"#;

    fn resolver(transport: Arc<FakeTransport>) -> LocationResolver {
        let config = Config {
            search_relays: vec![RelayEndpoint::allorigins(), RelayEndpoint::corsproxy()],
            shortlink_relays: vec![RelayEndpoint::direct()],
            ..Config::default()
        };
        LocationResolver::from_config(&config, transport)
    }

    fn coord(lat: f64, lng: f64) -> Resolution {
        Coordinate::new(lat, lng).unwrap().into()
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("   "), InputKind::Empty);
        assert!(matches!(classify("28.7041,77.1025"), InputKind::Coordinates(_)));
        assert!(matches!(classify("https://maps.app.goo.gl/x"), InputKind::Url(_)));
        assert_eq!(classify(" Model Town "), InputKind::Text("Model Town".into()));
        assert_eq!(classify("panipat:haryana"), InputKind::Text("panipat:haryana".into()));
        // out of range bare pair is not coordinates
        assert_eq!(classify("200,50"), InputKind::Text("200,50".into()));
    }

    #[test]
    fn test_map_host_matching() {
        let r = resolver(Arc::new(FakeTransport::unreachable()));
        assert!(r.is_map_host("www.google.com"));
        assert!(r.is_map_host("maps.app.goo.gl"));
        assert!(r.is_map_host("GOO.GL"));
        assert!(!r.is_map_host("notgoogle.com"));
        assert!(!r.is_map_host("openstreetmap.org"));
    }

    #[tokio::test]
    async fn test_empty_is_not_found() {
        let transport = Arc::new(FakeTransport::unreachable());
        assert_eq!(resolver(transport.clone()).resolve("  ").await, Resolution::NotFound);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_bare_coordinates() {
        let transport = Arc::new(FakeTransport::unreachable());
        let got = resolver(transport.clone()).resolve(" 28.7041,77.1025 ").await;
        assert_eq!(got, coord(28.7041, 77.1025));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_viewport_marker_without_network() {
        let transport = Arc::new(FakeTransport::unreachable());
        let got = resolver(transport.clone())
            .resolve("https://www.google.com/maps/@28.7041,77.1025,15z")
            .await;
        assert_eq!(got, coord(28.7041, 77.1025));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_non_map_url_extracts_structurally() {
        let transport = Arc::new(FakeTransport::unreachable());
        let r = resolver(transport.clone());
        let got = r.resolve("https://www.openstreetmap.org/?mlat=1&ll=19.076,72.8777#map=12").await;
        assert_eq!(got, coord(19.076, 72.8777));
        let nothing = r.resolve("https://example.com/listing/42").await;
        assert_eq!(nothing, Resolution::NotFound);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_short_link_followed() {
        let transport = Arc::new(FakeTransport::new(|url| {
            if url.starts_with("https://maps.app.goo.gl") {
                (Duration::ZERO, fake::ok("https://www.google.com/maps?q=29.39,76.96", ""))
            } else {
                (Duration::ZERO, fake::status(url, 500))
            }
        }));
        let got = resolver(transport.clone()).resolve("https://maps.app.goo.gl/Xyz").await;
        assert_eq!(got, coord(29.39, 76.96));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_short_link() {
        let transport = Arc::new(FakeTransport::unreachable());
        let got = resolver(transport.clone()).resolve("https://maps.app.goo.gl/Xyz").await;
        assert_eq!(got, Resolution::Unavailable);
        // URLs are never sent to place search
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_dead_short_link_not_found() {
        let transport = Arc::new(FakeTransport::new(|url| (Duration::ZERO, fake::status(url, 404))));
        let got = resolver(transport).resolve("https://maps.app.goo.gl/DeadLink").await;
        assert_eq!(got, Resolution::NotFound);
    }

    #[tokio::test]
    async fn test_free_text_single_and_list() {
        let transport = Arc::new(FakeTransport::new(|url| (Duration::ZERO, fake::ok(url, PANIPAT))));
        let r = resolver(transport.clone());
        let cancel = CancellationToken::new();

        let single = r.resolve_input("Panipat", &cancel).await.unwrap();
        assert_eq!(single, coord(29.3909, 76.9635));

        let list = r.suggest("Panipat", &cancel).await.unwrap();
        assert_eq!(
            list,
            Resolution::Candidates {
                candidates: vec![PlaceCandidate {
                    display_name: "Panipat, Haryana, India".into(),
                    coordinate: Coordinate::new(29.3909, 76.9635).unwrap(),
                }]
            }
        );
        assert_eq!(list.coordinate(), single.coordinate());
    }

    #[tokio::test]
    async fn test_free_text_all_relays_down() {
        let transport = Arc::new(FakeTransport::unreachable());
        let r = resolver(transport.clone());
        assert_eq!(r.resolve("Panipat").await, Resolution::Unavailable);
        assert_eq!(transport.call_count(), 2);
        assert_eq!(r.suggest("Panipat", &CancellationToken::new()).await.unwrap(), Resolution::Unavailable);
    }

    #[tokio::test]
    async fn test_short_suggest_query() {
        let transport = Arc::new(FakeTransport::unreachable());
        let r = resolver(transport.clone());
        assert_eq!(r.suggest("a", &CancellationToken::new()).await.unwrap(), Resolution::NotFound);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_resolution() {
        let transport = Arc::new(FakeTransport::unreachable());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let got = resolver(transport).resolve_input("Panipat", &cancel).await;
        assert_eq!(got, Err(Cancelled));
    }
}

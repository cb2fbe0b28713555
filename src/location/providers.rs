//! Nominatim-backed providers: free-text place search and city centres.
//!
//! Both go through a relay chain. Relay bodies are not always what
//! Nominatim sent: some relays double-encode the JSON as a string, some
//! wrap it in `{"contents": "..."}`. `parse_places` accepts all three.

use super::cache::TtlCache;
use super::relay::{ChainError, RelayChain};
use super::transport::HttpResponse;
use super::types::{Cancelled, Coordinate, PlaceCandidate};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

const CITY_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

/// Build a Nominatim `/search` URL.
pub fn search_url(base: &str, query: &str, limit: usize, address_details: bool) -> String {
    let mut params = vec![
        ("format", "json".to_string()),
        ("q", query.to_string()),
        ("limit", limit.to_string()),
    ];
    if address_details {
        params.push(("addressdetails", "1".to_string()));
    }
    let endpoint = format!("{}/search", base.trim_end_matches('/'));
    match url::Url::parse_with_params(&endpoint, &params) {
        Ok(u) => u.to_string(),
        Err(_) => {
            let encoded: String = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&params)
                .finish();
            format!("{endpoint}?{encoded}")
        }
    }
}

fn with_hint(query: &str, hint: &str) -> String {
    if hint.is_empty() {
        query.to_string()
    } else {
        format!("{query}, {hint}")
    }
}

/// Decode a relay body into place candidates, dropping incomplete entries.
pub fn parse_places(body: &str) -> Result<Vec<PlaceCandidate>, String> {
    let value: Value = serde_json::from_str(body.trim()).map_err(|e| e.to_string())?;
    let items = unwrap_payload(value)?;
    Ok(items.iter().filter_map(place_from_json).collect())
}

fn unwrap_payload(value: Value) -> Result<Vec<Value>, String> {
    match value {
        Value::Array(items) => Ok(items),
        Value::String(inner) => {
            let decoded: Value = serde_json::from_str(&inner).map_err(|e| e.to_string())?;
            match decoded {
                Value::Array(items) => Ok(items),
                other => Err(format!("expected array, got {}", kind(&other))),
            }
        }
        Value::Object(mut map) => match map.remove("contents") {
            Some(Value::String(inner)) => unwrap_payload(Value::String(inner)),
            Some(Value::Array(items)) => Ok(items),
            _ => Err("object without contents".to_string()),
        },
        other => Err(format!("expected array, got {}", kind(&other))),
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn number_field(item: &Value, key: &str) -> Option<f64> {
    match item.get(key)? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn place_from_json(item: &Value) -> Option<PlaceCandidate> {
    let lat = number_field(item, "lat")?;
    let lon = number_field(item, "lon")?;
    let coordinate = Coordinate::new(lat, lon).ok()?;

    let text = |key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let display_name = text("display_name")
        .or_else(|| text("name"))
        .unwrap_or_else(|| format!("{lat}, {lon}"));

    Some(PlaceCandidate { display_name, coordinate })
}

fn non_empty_places(response: &HttpResponse) -> Result<Vec<PlaceCandidate>, String> {
    let places = parse_places(&response.body)?;
    if places.is_empty() {
        return Err("no usable places".to_string());
    }
    Ok(places)
}

/// Result of one search: the candidates plus whether the relays were
/// unreachable (as opposed to reachable but empty-handed).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub candidates: Vec<PlaceCandidate>,
    pub unavailable: bool,
}

/// Free-text place search.
#[derive(Debug, Clone)]
pub struct PlaceSearch {
    chain: RelayChain,
    base_url: String,
    region_hint: String,
    limit: usize,
    min_query_len: usize,
    timeout: Duration,
}

impl PlaceSearch {
    pub fn new(chain: RelayChain) -> Self {
        Self {
            chain,
            base_url: DEFAULT_NOMINATIM_URL.to_string(),
            region_hint: "India".to_string(),
            limit: 5,
            min_query_len: 2,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }

    pub fn with_region_hint(mut self, hint: impl Into<String>) -> Self {
        self.region_hint = hint.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn with_min_query_len(mut self, len: usize) -> Self {
        self.min_query_len = len;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ranked candidates for `query`. Short queries return nothing without
    /// touching the network.
    pub async fn search(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome, Cancelled> {
        let query = query.trim();
        if query.chars().count() < self.min_query_len {
            return Ok(SearchOutcome::default());
        }

        let target = search_url(&self.base_url, &with_hint(query, &self.region_hint), self.limit, true);
        match self.chain.fetch_parsed(&target, self.timeout, cancel, non_empty_places).await {
            Ok(candidates) => {
                tracing::debug!(query, found = candidates.len(), "place search succeeded");
                Ok(SearchOutcome { candidates, unavailable: false })
            }
            Err(ChainError::Cancelled) => Err(Cancelled),
            Err(e) => {
                let unavailable = e.is_unreachable();
                tracing::info!(query, unavailable, "place search found nothing");
                Ok(SearchOutcome { candidates: Vec::new(), unavailable })
            }
        }
    }
}

/// A city's map centre, or the fallback when the city was not found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CityCentre {
    pub coordinate: Coordinate,
    pub located: bool,
}

/// Map-centre lookup for a listing's city, memoised for 30 days.
#[derive(Clone)]
pub struct CityLocator {
    chain: RelayChain,
    cache: TtlCache,
    base_url: String,
    region_hint: String,
    timeout: Duration,
    fallback: Coordinate,
}

impl CityLocator {
    pub fn new(chain: RelayChain, cache: TtlCache, fallback: Coordinate) -> Self {
        Self {
            chain,
            cache,
            base_url: DEFAULT_NOMINATIM_URL.to_string(),
            region_hint: "Haryana, India".to_string(),
            timeout: Duration::from_secs(8),
            fallback,
        }
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }

    pub fn with_region_hint(mut self, hint: impl Into<String>) -> Self {
        self.region_hint = hint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn cache_key(city: &str) -> String {
        format!("geo:city:{}", city.trim().to_lowercase())
    }

    pub async fn locate(
        &self,
        city: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Coordinate>, Cancelled> {
        let city = city.trim();
        if city.is_empty() {
            return Ok(None);
        }

        let key = Self::cache_key(city);
        if let Some(hit) = self.cache.get::<Coordinate>(&key, CITY_TTL) {
            return Ok(Some(hit));
        }

        let target = search_url(&self.base_url, &with_hint(city, &self.region_hint), 1, false);
        match self.chain.fetch_parsed(&target, self.timeout, cancel, non_empty_places).await {
            Ok(places) => {
                let coordinate = places[0].coordinate;
                self.cache.put(&key, &coordinate);
                Ok(Some(coordinate))
            }
            Err(ChainError::Cancelled) => Err(Cancelled),
            Err(e) => {
                tracing::info!(city, error = %e, "city geocode failed");
                Ok(None)
            }
        }
    }

    /// Like `locate`, but falls back to the configured default centre.
    pub async fn locate_or_default(
        &self,
        city: &str,
        cancel: &CancellationToken,
    ) -> Result<CityCentre, Cancelled> {
        Ok(match self.locate(city, cancel).await? {
            Some(coordinate) => CityCentre { coordinate, located: true },
            None => CityCentre { coordinate: self.fallback, located: false },
        })
    }
}

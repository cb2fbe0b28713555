//! Runtime configuration.
//!
//! Defaults first, then environment variables (a `.env` file is honoured by
//! the binary via `dotenvy`), then CLI flags on top.
//!
//! ## Variables
//!
//! - `PROPNET_SEARCH_RELAYS` / `PROPNET_CITY_RELAYS` / `PROPNET_SHORTLINK_RELAYS` -
//!   comma-separated relay templates, `name=template` or bare. `{url}` is the
//!   raw target, `{encoded}` the percent-encoded one; `{url}` alone fetches directly.
//! - `PROPNET_SEARCH_TIMEOUT_MS` (10000), `PROPNET_CITY_TIMEOUT_MS` (8000),
//!   `PROPNET_SHORTLINK_TIMEOUT_MS` (5000)
//! - `PROPNET_NOMINATIM_URL`, `PROPNET_REGION_HINT` (`India`),
//!   `PROPNET_CITY_HINT` (`Haryana, India`), `PROPNET_SEARCH_LIMIT` (5),
//!   `PROPNET_MIN_QUERY_LEN` (2)
//! - `PROPNET_MAP_HOSTS` - host families whose links are followed (`google.com,goo.gl`)
//! - `PROPNET_DEFAULT_CENTER` - `lat,lng` used when a city cannot be located
//! - `PROPNET_AREA_URL`, `PROPNET_AREA_TTL_SECS` (86400)
//! - `PROPNET_CACHE_PATH` (default `~/.propnet/cache.json`)
//! - `PROPNET_SUGGEST_DEBOUNCE_MS` (500) - read only by `ResolutionSession::from_config`;
//!   the CLI and the HTTP API do not debounce
//! - `PROPNET_USER_AGENT`, `LISTEN` (`127.0.0.1:3000`), `LOG_FORMAT` (`text` | `json`)

use crate::areas::DEFAULT_AREA_URL;
use crate::location::cache::FileStore;
use crate::location::extract::parse_bare;
use crate::location::providers::DEFAULT_NOMINATIM_URL;
use crate::location::relay::RelayEndpoint;
use crate::location::resolver::DEFAULT_MAP_HOSTS;
use crate::location::types::Coordinate;
use std::path::PathBuf;
use std::time::Duration;

/// Panipat.
pub const DEFAULT_CENTER: Coordinate = Coordinate::from_trusted(29.3909, 76.9635);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}: expected a non-negative integer, got '{value}'")]
    Number { key: &'static str, value: String },
    #[error("{key}: expected 'lat,lng' in range, got '{value}'")]
    Coordinate { key: &'static str, value: String },
    #[error("{key}: no usable relay templates in '{value}'")]
    Relays { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub search_relays: Vec<RelayEndpoint>,
    pub city_relays: Vec<RelayEndpoint>,
    pub shortlink_relays: Vec<RelayEndpoint>,
    pub search_timeout: Duration,
    pub city_timeout: Duration,
    pub shortlink_timeout: Duration,
    pub nominatim_url: String,
    pub region_hint: String,
    pub city_hint: String,
    pub search_limit: usize,
    pub min_query_len: usize,
    pub map_hosts: Vec<String>,
    /// Map centre when a listing's city cannot be geocoded.
    pub default_center: Coordinate,
    pub area_url: String,
    pub area_ttl: Duration,
    pub cache_path: PathBuf,
    pub suggest_debounce: Duration,
    pub user_agent: String,
    pub listen_addr: String,
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_relays: vec![RelayEndpoint::allorigins(), RelayEndpoint::corsproxy()],
            city_relays: vec![RelayEndpoint::allorigins(), RelayEndpoint::corsproxy()],
            shortlink_relays: vec![RelayEndpoint::direct()],
            search_timeout: Duration::from_secs(10),
            city_timeout: Duration::from_secs(8),
            shortlink_timeout: Duration::from_secs(5),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            region_hint: "India".to_string(),
            city_hint: "Haryana, India".to_string(),
            search_limit: 5,
            min_query_len: 2,
            map_hosts: DEFAULT_MAP_HOSTS.iter().map(|h| h.to_string()).collect(),
            default_center: DEFAULT_CENTER,
            area_url: DEFAULT_AREA_URL.to_string(),
            area_ttl: Duration::from_secs(24 * 3600),
            cache_path: FileStore::default_path(),
            suggest_debounce: Duration::from_millis(500),
            user_agent: concat!("propnet-geo/", env!("CARGO_PKG_VERSION")).to_string(),
            listen_addr: "127.0.0.1:3000".to_string(),
            log_format: "text".to_string(),
        }
    }
}

impl Config {
    /// Defaults overridden by process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns. Blank values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("PROPNET_SEARCH_RELAYS") {
            config.search_relays = parse_relays("PROPNET_SEARCH_RELAYS", &v)?;
        }
        if let Some(v) = get("PROPNET_CITY_RELAYS") {
            config.city_relays = parse_relays("PROPNET_CITY_RELAYS", &v)?;
        }
        if let Some(v) = get("PROPNET_SHORTLINK_RELAYS") {
            config.shortlink_relays = parse_relays("PROPNET_SHORTLINK_RELAYS", &v)?;
        }

        if let Some(v) = get("PROPNET_SEARCH_TIMEOUT_MS") {
            config.search_timeout = Duration::from_millis(parse_num("PROPNET_SEARCH_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = get("PROPNET_CITY_TIMEOUT_MS") {
            config.city_timeout = Duration::from_millis(parse_num("PROPNET_CITY_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = get("PROPNET_SHORTLINK_TIMEOUT_MS") {
            config.shortlink_timeout = Duration::from_millis(parse_num("PROPNET_SHORTLINK_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = get("PROPNET_SUGGEST_DEBOUNCE_MS") {
            config.suggest_debounce = Duration::from_millis(parse_num("PROPNET_SUGGEST_DEBOUNCE_MS", &v)?);
        }
        if let Some(v) = get("PROPNET_AREA_TTL_SECS") {
            config.area_ttl = Duration::from_secs(parse_num("PROPNET_AREA_TTL_SECS", &v)?);
        }
        if let Some(v) = get("PROPNET_SEARCH_LIMIT") {
            config.search_limit = parse_num("PROPNET_SEARCH_LIMIT", &v)?.max(1) as usize;
        }
        if let Some(v) = get("PROPNET_MIN_QUERY_LEN") {
            config.min_query_len = parse_num("PROPNET_MIN_QUERY_LEN", &v)? as usize;
        }

        if let Some(v) = get("PROPNET_DEFAULT_CENTER") {
            config.default_center = parse_bare(&v).ok_or(ConfigError::Coordinate {
                key: "PROPNET_DEFAULT_CENTER",
                value: v.clone(),
            })?;
        }
        if let Some(v) = get("PROPNET_MAP_HOSTS") {
            config.map_hosts = v
                .split(',')
                .map(|h| h.trim().to_lowercase())
                .filter(|h| !h.is_empty())
                .collect();
        }

        if let Some(v) = get("PROPNET_NOMINATIM_URL") {
            config.nominatim_url = v;
        }
        if let Some(v) = lookup("PROPNET_REGION_HINT") {
            // may be set blank to disable the hint
            config.region_hint = v.trim().to_string();
        }
        if let Some(v) = lookup("PROPNET_CITY_HINT") {
            config.city_hint = v.trim().to_string();
        }
        if let Some(v) = get("PROPNET_AREA_URL") {
            config.area_url = v;
        }
        if let Some(v) = get("PROPNET_CACHE_PATH") {
            config.cache_path = PathBuf::from(v);
        }
        if let Some(v) = get("PROPNET_USER_AGENT") {
            config.user_agent = v;
        }
        if let Some(v) = get("LISTEN") {
            config.listen_addr = v;
        }
        if let Some(v) = get("LOG_FORMAT") {
            config.log_format = v.to_lowercase();
        }

        Ok(config)
    }
}

fn parse_num(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Number {
        key,
        value: value.to_string(),
    })
}

fn parse_relays(key: &'static str, value: &str) -> Result<Vec<RelayEndpoint>, ConfigError> {
    let relays: Vec<_> = value.split(',').filter_map(RelayEndpoint::parse).collect();
    if relays.is_empty() {
        return Err(ConfigError::Relays { key, value: value.to_string() });
    }
    Ok(relays)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let c = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(c.search_relays.len(), 2);
        assert_eq!(c.shortlink_relays, vec![RelayEndpoint::direct()]);
        assert_eq!(c.search_timeout, Duration::from_secs(10));
        assert_eq!(c.city_timeout, Duration::from_secs(8));
        assert_eq!(c.shortlink_timeout, Duration::from_secs(5));
        assert_eq!(c.min_query_len, 2);
        assert_eq!(c.default_center, Coordinate::new(29.3909, 76.9635).unwrap());
        assert!(c.cache_path.ends_with(".propnet/cache.json"));
    }

    #[test]
    fn test_overrides() {
        let c = Config::from_lookup(lookup(&[
            ("PROPNET_SEARCH_RELAYS", "direct={url}, https://corsproxy.io/?{encoded}"),
            ("PROPNET_SEARCH_TIMEOUT_MS", "2500"),
            ("PROPNET_MAP_HOSTS", "google.com, goo.gl ,maps.apple.com"),
            ("PROPNET_DEFAULT_CENTER", "29.6857,76.9905"),
            ("PROPNET_REGION_HINT", ""),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(c.search_relays[0], RelayEndpoint::new("direct", "{url}"));
        assert_eq!(c.search_relays[1].name, "corsproxy.io");
        assert_eq!(c.search_timeout, Duration::from_millis(2500));
        assert_eq!(c.map_hosts, vec!["google.com", "goo.gl", "maps.apple.com"]);
        assert_eq!(c.default_center.lat(), 29.6857);
        assert_eq!(c.region_hint, "");
        assert_eq!(c.log_format, "json");
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_lookup(lookup(&[("PROPNET_CITY_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Number { key: "PROPNET_CITY_TIMEOUT_MS", .. }));

        let err = Config::from_lookup(lookup(&[("PROPNET_DEFAULT_CENTER", "100,0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Coordinate { .. }));

        let err = Config::from_lookup(lookup(&[("PROPNET_SHORTLINK_RELAYS", " , ,")])).unwrap_err();
        assert!(matches!(err, ConfigError::Relays { .. }));
    }
}

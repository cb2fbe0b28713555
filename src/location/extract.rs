//! Coordinate recognition in pasted text, map URLs and HTML.
//!
//! Pure and synchronous: no network, no clock.

use super::types::Coordinate;
use regex::Regex;
use std::sync::LazyLock;

/// Whole-string `lat,lng`, optional sign and decimals, whitespace allowed around the comma.
static BARE_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?\d+(?:\.\d*)?)\s*,\s*([+-]?\d+(?:\.\d*)?)$").unwrap()
});

/// Embedded forms, in the order they are tried.
static EMBEDDED: LazyLock<[Regex; 5]> = LazyLock::new(|| {
    [
        // map viewport marker: /@28.7041,77.1025,15z
        Regex::new(r"@(-?\d+\.?\d*),(-?\d+\.?\d*)").unwrap(),
        // ?q=lat,lng  ?q=lat+lng  ?q=lat%2Clng
        Regex::new(r"(?i)[?&]q=(-?\d+\.?\d*)(?:,|\+|%2C)(-?\d+\.?\d*)").unwrap(),
        Regex::new(r"[?&]ll=(-?\d+\.?\d*),(-?\d+\.?\d*)").unwrap(),
        Regex::new(r"[?&]center=(-?\d+\.?\d*),(-?\d+\.?\d*)").unwrap(),
        // path segment: /28.7041,77.1025
        Regex::new(r"/(-?\d+\.?\d*),(-?\d+\.?\d*)").unwrap(),
    ]
});

/// Parse text that is nothing but a coordinate pair.
pub fn parse_bare(text: &str) -> Option<Coordinate> {
    let caps = BARE_PAIR.captures(text.trim())?;
    pair(&caps[1], &caps[2])
}

/// Find a coordinate pair anywhere in `text`.
///
/// Bare pairs win; then each embedded pattern is scanned in order and the
/// first in-range match is returned.
pub fn extract(text: &str) -> Option<Coordinate> {
    if let Some(c) = parse_bare(text) {
        return Some(c);
    }
    EMBEDDED.iter().find_map(|re| {
        re.captures_iter(text)
            .find_map(|caps| pair(&caps[1], &caps[2]))
    })
}

fn pair(lat: &str, lng: &str) -> Option<Coordinate> {
    let lat: f64 = lat.parse().ok()?;
    let lng: f64 = lng.parse().ok()?;
    Coordinate::new(lat, lng).ok()
}

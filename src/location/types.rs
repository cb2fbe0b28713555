//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated latitude/longitude pair.
///
/// Both values are finite and in range. Out-of-range input is rejected,
/// never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = CoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.lat, raw.lng)
    }
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::Latitude(lat));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(CoordinateError::Longitude(lng));
        }
        Ok(Self { lat, lng })
    }

    /// For literals known to be in range.
    pub(crate) const fn from_trusted(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    /// Google Maps link dropping a pin on this coordinate.
    pub fn maps_url(&self) -> String {
        format!("https://www.google.com/maps?q={}", self)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lng)
    }
}

/// Human-readable coordinates, e.g. `28.7041°N, 77.1025°E`.
pub fn format_coords(lat: f64, lng: f64) -> String {
    let ns = if lat >= 0.0 { 'N' } else { 'S' };
    let ew = if lng >= 0.0 { 'E' } else { 'W' };
    format!("{:.4}\u{00B0}{}, {:.4}\u{00B0}{}", lat.abs(), ns, lng.abs(), ew)
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    #[error("latitude {0} outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} outside [-180, 180]")]
    Longitude(f64),
}

/// A geocoder hit, in the rank order the geocoder returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCandidate {
    pub display_name: String,
    pub coordinate: Coordinate,
}

/// Outcome of resolving one piece of user input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    Coordinate { coordinate: Coordinate },
    Candidates { candidates: Vec<PlaceCandidate> },
    NotFound,
    /// Every network path failed for transport reasons and nothing
    /// structural matched. Callers may treat it like `NotFound`.
    Unavailable,
}

impl Resolution {
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Self::Coordinate { coordinate } => Some(*coordinate),
            Self::Candidates { candidates } => candidates.first().map(|c| c.coordinate),
            Self::NotFound | Self::Unavailable => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Coordinate { .. } | Self::Candidates { .. })
    }
}

impl From<Coordinate> for Resolution {
    fn from(coordinate: Coordinate) -> Self {
        Self::Coordinate { coordinate }
    }
}

/// The caller abandoned the operation through its cancellation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(Coordinate::new(200.0, 50.0), Err(CoordinateError::Latitude(200.0)));
        assert_eq!(Coordinate::new(45.0, -200.0), Err(CoordinateError::Longitude(-200.0)));
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_accepts_bounds() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_display_and_maps_url() {
        let c = Coordinate::new(28.7041, 77.1025).unwrap();
        assert_eq!(c.to_string(), "28.704100,77.102500");
        assert_eq!(c.maps_url(), "https://www.google.com/maps?q=28.704100,77.102500");
    }

    #[test]
    fn test_format_coords() {
        assert_eq!(format_coords(28.7041, 77.1025), "28.7041\u{00B0}N, 77.1025\u{00B0}E");
        assert_eq!(format_coords(-33.8688, -70.0), "33.8688\u{00B0}S, 70.0000\u{00B0}W");
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Coordinate = serde_json::from_str(r#"{"lat": 29.39, "lng": 76.96}"#).unwrap();
        assert_eq!(ok.lat(), 29.39);
        assert!(serde_json::from_str::<Coordinate>(r#"{"lat": 95.0, "lng": 0.0}"#).is_err());
    }

    #[test]
    fn test_resolution_serializes_tagged() {
        let r = Resolution::from(Coordinate::new(1.0, 2.0).unwrap());
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["kind"], "coordinate");
        assert_eq!(v["coordinate"]["lng"], 2.0);
        assert_eq!(serde_json::to_value(Resolution::NotFound).unwrap()["kind"], "not_found");
    }
}

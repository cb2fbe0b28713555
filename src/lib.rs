//! # propnet-geo
//!
//! Location-input resolution for the PropNetwork dealer client.
//!
//! Dealers paste whatever they have for a property's position: raw
//! `lat,lng`, a Google Maps link, a `maps.app.goo.gl` short link, or a place
//! name. [`location::LocationResolver`] turns it into a coordinate (or a
//! candidate list for suggestion dropdowns), trying free structural parsing
//! before any network call and falling back across relay endpoints when it
//! has to go to the network.
//!
//! Also included: the city → area directory of the listing backend
//! ([`areas`]), runtime [`config`], and a small JSON API ([`server`]).

pub mod areas;
pub mod config;
pub mod location;
pub mod server;

pub use config::Config;
pub use location::{Coordinate, LocationResolver, PlaceCandidate, Resolution};

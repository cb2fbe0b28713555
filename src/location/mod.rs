//! Location-input resolution.
//!
//! Turns pasted text (bare coordinates, map links, short links, place
//! names) into a coordinate or a ranked list of candidate places, with
//! relay fallback for every network call.

pub mod cache;
pub mod extract;
pub mod providers;
pub mod relay;
pub mod resolver;
pub mod session;
pub mod shortlink;
pub mod transport;
pub mod types;

pub use cache::{FileStore, KeyValueStore, MemoryStore, TtlCache};
pub use extract::{extract, parse_bare};
pub use providers::{CityCentre, CityLocator, PlaceSearch, SearchOutcome};
pub use relay::{ChainError, FetchError, Relay, RelayChain, RelayEndpoint};
pub use resolver::{classify, InputKind, LocationResolver};
pub use session::{ResolutionSession, SessionMode};
pub use shortlink::{ShortLinkOutcome, ShortLinkResolver};
pub use transport::{HttpResponse, HttpTransport, TransportError, UreqTransport};
pub use types::{format_coords, Cancelled, Coordinate, CoordinateError, PlaceCandidate, Resolution};

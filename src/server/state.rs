use crate::areas::AreaDirectory;
use crate::config::Config;
use crate::location::{
    CityLocator, FileStore, HttpTransport, LocationResolver, RelayChain, TtlCache, UreqTransport,
};
use std::sync::Arc;

/// Everything a request (or a CLI command) needs, built once from config.
pub struct AppState {
    pub config: Config,
    pub resolver: Arc<LocationResolver>,
    pub cities: CityLocator,
    pub areas: AreaDirectory,
}

impl AppState {
    pub fn from_config(config: Config) -> Self {
        let transport: Arc<dyn HttpTransport> = Arc::new(UreqTransport::new(&config.user_agent));
        let cache = TtlCache::new(Arc::new(FileStore::load_from(config.cache_path.clone())));
        Self::with_parts(config, transport, cache)
    }

    pub fn with_parts(config: Config, transport: Arc<dyn HttpTransport>, cache: TtlCache) -> Self {
        let resolver = Arc::new(LocationResolver::from_config(&config, transport.clone()));

        let cities = CityLocator::new(
            RelayChain::from_endpoints(&config.city_relays, transport.clone()),
            cache.clone(),
            config.default_center,
        )
        .with_base_url(config.nominatim_url.clone())
        .with_region_hint(config.city_hint.clone())
        .with_timeout(config.city_timeout);

        let areas = AreaDirectory::new(transport, cache, config.area_url.clone())
            .with_ttl(config.area_ttl);

        Self { config, resolver, cities, areas }
    }
}

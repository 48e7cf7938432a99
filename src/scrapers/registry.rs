use crate::config::Config;
use crate::error::Result;
use crate::models::Source;
use crate::scrapers::fetcher::HttpFetcher;
use crate::scrapers::traits::SiteAdapter;
use crate::scrapers::{OnTheMarketAdapter, OpenRentAdapter, RightmoveAdapter, SpareRoomAdapter, ZooplaAdapter};
use std::collections::HashMap;
use std::time::Duration;

/// Adapters keyed by lowercase site name, built once at startup
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Box<dyn SiteAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All five built-in sites, configured from `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(Duration::from_secs(config.request_timeout_secs))?;
        Self::with_fetcher(config, fetcher)
    }

    /// Same as [`from_config`](Self::from_config) with a caller-supplied fetcher
    pub fn with_fetcher(config: &Config, fetcher: HttpFetcher) -> Result<Self> {
        let sort = config.sort_type;
        let mut registry = Self::new();
        for source in Source::ALL {
            let site = config.site(source.as_str());
            let adapter: Box<dyn SiteAdapter> = match source {
                Source::Rightmove => Box::new(RightmoveAdapter::new(&site, sort, fetcher.clone())?),
                Source::Zoopla => Box::new(ZooplaAdapter::new(&site, sort, fetcher.clone())?),
                Source::SpareRoom => Box::new(SpareRoomAdapter::new(&site, sort, fetcher.clone())?),
                Source::OnTheMarket => Box::new(OnTheMarketAdapter::new(&site, sort, fetcher.clone())?),
                Source::OpenRent => Box::new(OpenRentAdapter::new(&site, sort, fetcher.clone())?),
            };
            registry.register(adapter);
        }
        Ok(registry)
    }

    /// Adds an adapter under its own name, replacing any previous one
    pub fn register(&mut self, adapter: Box<dyn SiteAdapter>) {
        self.adapters.insert(adapter.name().to_lowercase(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<&dyn SiteAdapter> {
        self.adapters.get(&name.to_lowercase()).map(|a| a.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

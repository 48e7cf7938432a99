//! Drives one scan: every enabled site in turn, then filtering, notification
//! and persistence of the seen-listing store.

use crate::config::Config;
use crate::error::{Result, ScanError};
use crate::filter::meets_criteria;
use crate::models::Listing;
use crate::notify::Notifier;
use crate::scrapers::{AdapterRegistry, SiteAdapter};
use crate::store::SeenStore;
use chrono::Utc;
use tracing::{error, info, info_span, warn, Instrument, Span};

/// Site scanned when the config enables none
const FALLBACK_SITE: &str = "rightmove";

/// A site that contributed nothing, and why
#[derive(Debug)]
pub struct SiteFailure {
    pub site: String,
    pub error: ScanError,
}

/// Everything gathered from one pass over the enabled sites
#[derive(Debug, Default)]
pub struct FetchReport {
    pub listings: Vec<Listing>,
    pub failures: Vec<SiteFailure>,
}

pub struct PropertyScanner {
    config: Config,
    registry: AdapterRegistry,
    store: SeenStore,
    notifier: Notifier,
    span: Span,
}

impl PropertyScanner {
    /// Builds the adapters, loads the seen store and sets up notifications.
    /// `span` is the parent for every per-site span the scanner opens.
    pub fn new(config: Config, span: Span) -> Result<Self> {
        let registry = AdapterRegistry::from_config(&config)?;
        let store = SeenStore::load(&config.seen_listings_path);
        let notifier = Notifier::from_config(&config.notifications);
        Ok(Self::with_parts(config, registry, store, notifier, span))
    }

    pub fn with_parts(
        config: Config,
        registry: AdapterRegistry,
        store: SeenStore,
        notifier: Notifier,
        span: Span,
    ) -> Self {
        Self {
            config,
            registry,
            store,
            notifier,
            span,
        }
    }

    pub fn seen_store(&self) -> &SeenStore {
        &self.store
    }

    pub fn enabled_sites(&self) -> Vec<String> {
        let sites: Vec<String> = self
            .config
            .sites
            .iter()
            .filter(|(_, site)| site.enabled)
            .map(|(name, _)| name.clone())
            .collect();

        if sites.is_empty() {
            vec![FALLBACK_SITE.to_string()]
        } else {
            sites
        }
    }

    async fn scan_site(&self, adapter: &dyn SiteAdapter) -> Result<Vec<Listing>> {
        let url = adapter.build_search_url()?;
        info!("Fetching {url}");
        let raw = adapter.fetch_raw(&url).await?;
        let outcome = adapter.parse_listings(&raw);

        for err in &outcome.errors {
            warn!("Skipped item: {err}");
        }
        info!(
            "Parsed {} listings from {} ({:?} strategy, {} items skipped)",
            outcome.listings.len(),
            raw.url,
            outcome.strategy,
            outcome.errors.len()
        );
        Ok(outcome.listings)
    }

    /// Scans each enabled site in order, keeping a record of the ones that failed
    pub async fn fetch_report(&self) -> FetchReport {
        let mut report = FetchReport::default();

        for site in self.enabled_sites() {
            let span = info_span!(parent: &self.span, "site", site = %site);
            let Some(adapter) = self.registry.get(&site) else {
                span.in_scope(|| warn!("No adapter available for {site}"));
                report.failures.push(SiteFailure {
                    error: ScanError::UnknownSite(site.clone()),
                    site,
                });
                continue;
            };

            match self.scan_site(adapter).instrument(span.clone()).await {
                Ok(listings) => {
                    span.in_scope(|| info!("Found {} listings from {site}", listings.len()));
                    report.listings.extend(listings);
                }
                Err(e) => {
                    span.in_scope(|| error!("Error scraping {site}: {e}"));
                    report.failures.push(SiteFailure { site, error: e });
                }
            }
        }

        report
    }

    pub async fn fetch_listings(&self) -> Vec<Listing> {
        self.fetch_report().await.listings
    }

    /// Drops listings already reported (unless the seen check is bypassed) and
    /// those outside the filter criteria. Every listing kept is recorded as seen.
    pub fn filter_listings(&mut self, listings: Vec<Listing>) -> Vec<Listing> {
        let bypass = self.config.debug.bypass_seen_check;
        let now = Utc::now();
        let mut kept = Vec::new();

        for listing in listings {
            if !bypass && self.store.contains(&listing.id) {
                continue;
            }
            if meets_criteria(&listing, &self.config.filters) {
                self.store.record(&listing.id, now);
                kept.push(listing);
            }
        }

        kept
    }

    /// One full scan. Never fails: problems are logged and the run carries on
    /// with whatever it has.
    pub async fn run_scraper(&mut self) {
        let span = self.span.clone();
        async {
            info!("Starting property scan");

            let listings = self.fetch_listings().await;
            info!("Found {} total listings", listings.len());

            let new_listings = self.filter_listings(listings);
            info!("{} new listings match the criteria", new_listings.len());

            if !new_listings.is_empty() {
                self.notifier.notify(&new_listings).await;
            }

            match self.store.save() {
                Ok(()) => info!(
                    "Saved {} seen listings to {}",
                    self.store.len(),
                    self.store.path().display()
                ),
                Err(e) => error!("{e}"),
            }
        }
        .instrument(span)
        .await
    }
}

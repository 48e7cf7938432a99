use crate::config::SortPreference;
use crate::error::Result;
use crate::scrapers::types::{ParseOutcome, RawDocument};
use async_trait::async_trait;
use reqwest::Url;

/// One property site: how to query it, fetch it, and read its results.
///
/// The scanner drives the stages in order (`build_search_url`, `fetch_raw`,
/// `parse_listings`) and treats an error from any of them as "this site
/// contributed nothing".
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Registry key, also used in logs
    fn name(&self) -> &str;

    /// Search URL built from the site's configured parameters
    fn build_search_url(&self) -> Result<Url>;

    /// Download the search page
    async fn fetch_raw(&self, url: &Url) -> Result<RawDocument>;

    /// Extract listings. Never fails as a whole: items that don't parse are
    /// reported in the outcome instead.
    fn parse_listings(&self, raw: &RawDocument) -> ParseOutcome;

    /// Query fragment for `preference`, or `None` when the site has no
    /// equivalent. Unsupported preferences return the site's default.
    fn sort_fragment(&self, preference: SortPreference) -> Option<&'static str>;
}

/// Appends a `key=value&key2=value2` fragment to `url`'s query string.
pub fn append_fragment(url: &mut Url, fragment: &str) {
    let mut query = url.query_pairs_mut();
    for pair in fragment.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        query.append_pair(key, value);
    }
}

/// Appends the fragment for `preference`, if the adapter has one
pub fn append_sort(adapter: &dyn SiteAdapter, url: &mut Url, preference: SortPreference) {
    if let Some(fragment) = adapter.sort_fragment(preference) {
        append_fragment(url, fragment);
    }
}

/// Parses a configured URL, naming the site if it's malformed
pub fn parse_url(site: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| crate::error::ScanError::InvalidUrl {
        site: site.to_string(),
        reason: format!("{raw}: {e}"),
    })
}

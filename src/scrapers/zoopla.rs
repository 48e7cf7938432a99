use crate::config::{SiteConfig, SortPreference};
use crate::error::Result;
use crate::models::{Listing, Source};
use crate::scrapers::embedded::parse_embedded;
use crate::scrapers::fetcher::HttpFetcher;
use crate::scrapers::html::{absolutize, any_amount, css, first_attr, first_number, first_text, image_src, is_weekly};
use crate::scrapers::traits::{parse_url, SiteAdapter};
use crate::scrapers::types::{ParseError, ParseOutcome, RawDocument, SiteParams, Strategy};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::info;

const BASE_URL: &str = "https://www.zoopla.co.uk";
const SEARCH_URL: &str = "https://www.zoopla.co.uk/to-rent/property/";

static DETAILS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/details/(\d+)").expect("valid details path regex"));

const EMBEDDED_PATHS: &[&[&str]] = &[
    &["props", "pageProps", "initialResults", "properties"],
    &["props", "pageProps", "initialResults", "listings"],
    &["props", "pageProps", "searchResults", "listings"],
    &["initialState", "searchResults", "properties"],
    &["initialState", "searchResults", "listings"],
    &["results", "properties"],
    &["results", "listings"],
];

/// Zoopla is fussier about client identity than the other sites
const BROWSER_HEADERS: [(&str, &str); 9] = [
    ("referer", "https://www.zoopla.co.uk/"),
    ("accept-language", "en-US,en;q=0.9"),
    ("sec-ch-ua", "\"Google Chrome\";v=\"120\", \"Chromium\";v=\"120\", \"Not=A?Brand\";v=\"99\""),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"macOS\""),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "same-origin"),
    ("upgrade-insecure-requests", "1"),
];

struct CardSelectors {
    card: Selector,
    card_alt: Selector,
    link: Selector,
    title: Selector,
    address: Selector,
    price: Selector,
    bedrooms: Selector,
    image: Selector,
}

impl CardSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            card: css(".css-wfndrn-StyledSearchResult, .srp-result, .l-searchResult")?,
            card_alt: css(r#"[data-testid="search-result"], .e2uk8e18, .e2uk8e4"#)?,
            link: css(r#"a[href*="/details/"]"#)?,
            title: css(".e2uk8e3, .css-vthwmi-DisplayStyle-Heading, .listing-title, h2")?,
            address: css(r#".e2uk8e15, .css-wxtc4h-DisplayStyle, .listing-address, [data-testid="address"]"#)?,
            price: css(r#".c-SrZLJz, .css-1h0liy1-DisplayStyle-PropertyPrice, .listing-price, [data-testid="price"]"#)?,
            bedrooms: css(r#".c-PJLV-cyFDVT, [data-testid="beds"], .icon-bed + span"#)?,
            image: css("img")?,
        })
    }
}

/// Zoopla lettings search
pub struct ZooplaAdapter {
    fetcher: HttpFetcher,
    base_url: String,
    search_url: String,
    params: SiteParams,
    selectors: CardSelectors,
}

impl ZooplaAdapter {
    pub fn new(site: &SiteConfig, sort: SortPreference, fetcher: HttpFetcher) -> Result<Self> {
        info!("Initializing zoopla adapter with sort type: {sort}");
        Ok(Self {
            fetcher: fetcher.with_headers(BROWSER_HEADERS),
            base_url: site.base_url.clone().unwrap_or_else(|| BASE_URL.to_string()),
            search_url: site.search_url.clone().unwrap_or_else(|| SEARCH_URL.to_string()),
            params: SiteParams::new(site.params.clone()),
            selectors: CardSelectors::new()?,
        })
    }

    fn parse_card(&self, index: usize, card: ElementRef<'_>) -> std::result::Result<Listing, ParseError> {
        let s = &self.selectors;
        let href = first_attr(card, &s.link, "href");

        let raw_id = ["id", "data-listing-id"]
            .iter()
            .find_map(|attr| card.value().attr(attr).filter(|v| !v.is_empty()))
            .map(str::to_string)
            .or_else(|| {
                href.and_then(|h| DETAILS_PATH.captures(h))
                    .map(|caps| caps[1].to_string())
            })
            .ok_or_else(|| ParseError::new(index, "result has no listing id"))?;

        let mut listing = Listing::new(Source::Zoopla, &raw_id);
        if let Some(title) = first_text(card, &s.title) {
            listing.title = title;
        }
        listing.address = first_text(card, &s.address).unwrap_or_default();

        if let Some(price_text) = first_text(card, &s.price) {
            listing.price = any_amount(&price_text).map(|amount| {
                if is_weekly(&price_text) {
                    amount * 4
                } else {
                    amount
                }
            });
            listing.price_text = price_text;
        }

        if let Some(beds) = first_text(card, &s.bedrooms).as_deref().and_then(first_number) {
            listing.bedrooms = beds;
        }
        listing.link = href.map(|h| absolutize(&self.base_url, h)).unwrap_or_default();
        listing.images = card
            .select(&s.image)
            .filter_map(|img| image_src(img, &["src", "data-src"]))
            .collect();

        Ok(listing)
    }

    fn parse_cards(&self, document: &Html) -> ParseOutcome {
        let mut cards: Vec<_> = document.select(&self.selectors.card).collect();
        if cards.is_empty() {
            cards = document.select(&self.selectors.card_alt).collect();
        }
        info!("Found {} Zoopla property cards", cards.len());

        ParseOutcome::collect(
            Strategy::Selectors,
            cards
                .into_iter()
                .enumerate()
                .map(|(index, card)| self.parse_card(index, card)),
        )
    }
}

#[async_trait]
impl SiteAdapter for ZooplaAdapter {
    fn name(&self) -> &str {
        Source::Zoopla.as_str()
    }

    fn build_search_url(&self) -> Result<Url> {
        let p = &self.params;
        let location = p.text("location", "bristol");
        let base = format!("{}/{}", self.search_url.trim_end_matches('/'), location);
        let mut url = parse_url(self.name(), &base)?;
        url.query_pairs_mut()
            .append_pair("q", &p.text("q", "property bristol bristol"))
            .append_pair("beds_min", &p.text("beds_min", 0))
            .append_pair("beds_max", &p.text("beds_max", 1))
            .append_pair("price_min", &p.text("price_min", 0))
            .append_pair("price_max", &p.text("price_max", 1500))
            .append_pair("radius", &p.text("radius", 0.0))
            .append_pair("price_frequency", &p.text("price_frequency", "per_month"))
            .append_pair("search_source", &p.text("search_source", "to-rent"))
            .append_pair("is_retirement_home", &p.flag("is_retirement_home", false).to_string())
            .append_pair("is_shared_accommodation", &p.flag("is_shared_accommodation", false).to_string())
            .append_pair("is_student_accommodation", &p.flag("is_student_accommodation", false).to_string())
            .append_pair("furnished_state", &p.text("furnished_state", "any"))
            .append_pair("available_from", &p.text("available_from", "1month"));
        info!("Zoopla URL: {url}");
        Ok(url)
    }

    async fn fetch_raw(&self, url: &Url) -> Result<RawDocument> {
        self.fetcher.fetch(self.name(), url).await
    }

    fn parse_listings(&self, raw: &RawDocument) -> ParseOutcome {
        let document = Html::parse_document(&raw.body);
        let outcome = self
            .parse_cards(&document)
            .or_fallback(|| parse_embedded(&document, EMBEDDED_PATHS, Source::Zoopla, &self.base_url));
        info!("Found {} Zoopla listings", outcome.listings.len());
        outcome
    }

    fn sort_fragment(&self, _preference: SortPreference) -> Option<&'static str> {
        // Zoopla results keep the site's relevance order
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter(params: serde_json::Value) -> ZooplaAdapter {
        let site = SiteConfig {
            params: params.as_object().cloned().unwrap_or_default(),
            ..SiteConfig::default()
        };
        let fetcher = HttpFetcher::new(std::time::Duration::from_secs(5)).unwrap();
        ZooplaAdapter::new(&site, SortPreference::NewestFirst, fetcher).unwrap()
    }

    #[test]
    fn builds_url_from_location() {
        let url = adapter(json!({"location": "bath", "price_max": 1300})).build_search_url().unwrap();
        assert_eq!(url.path(), "/to-rent/property/bath");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("price_max".into(), "1300".into())));
        assert!(query.contains(&("furnished_state".into(), "any".into())));
        assert!(!query.iter().any(|(k, _)| k == "results_sort"));
    }

    #[test]
    fn ignores_sort_preferences() {
        let a = adapter(json!({}));
        for pref in SortPreference::ALL {
            assert_eq!(a.sort_fragment(pref), None);
        }
    }

    #[test]
    fn parses_search_results_and_converts_weekly_rent() {
        let html = r#"<html><body>
          <div data-testid="search-result">
            <a href="/to-rent/details/555/"><h2>2 bed flat to rent</h2></a>
            <p data-testid="address">Redland, Bristol BS6</p>
            <p data-testid="price">£300 pw</p>
            <span data-testid="beds">2 beds</span>
            <img src="//lid.zoocdn.com/1.jpg"><img src="/static/icon.svg">
          </div>
          <div data-testid="search-result"><h2>Advert</h2></div>
        </body></html>"#;
        let outcome = adapter(json!({})).parse_listings(&RawDocument::new("u", html));
        assert_eq!(outcome.strategy, Strategy::Selectors);
        assert_eq!(outcome.listings.len(), 1);
        assert_eq!(outcome.errors.len(), 1);

        let listing = &outcome.listings[0];
        assert_eq!(listing.id, "zoopla-555");
        assert_eq!(listing.title, "2 bed flat to rent");
        assert_eq!(listing.price, Some(1200));
        assert_eq!(listing.price_text, "£300 pw");
        assert_eq!(listing.bedrooms, 2);
        assert_eq!(listing.link, "https://www.zoopla.co.uk/to-rent/details/555/");
        assert_eq!(listing.images, vec!["https://lid.zoocdn.com/1.jpg"]);
    }

    #[test]
    fn falls_back_to_embedded_json() {
        let html = r#"<html><body><script type="application/json">
          {"props": {"pageProps": {"initialResults": {"listings": [
            {"listingId": "9001", "displayAddress": "Easton, Bristol",
             "price": {"amount": 975, "display": "£975 pcm"}, "url": "/to-rent/details/9001/"}
          ]}}}}
        </script></body></html>"#;
        let outcome = adapter(json!({})).parse_listings(&RawDocument::new("u", html));
        assert_eq!(outcome.strategy, Strategy::EmbeddedData);
        assert_eq!(outcome.listings[0].id, "zoopla-9001");
        assert_eq!(outcome.listings[0].price, Some(975));
        assert_eq!(outcome.listings[0].link, "https://www.zoopla.co.uk/to-rent/details/9001/");
    }
}

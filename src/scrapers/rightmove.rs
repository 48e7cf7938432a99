use crate::config::{SiteConfig, SortPreference};
use crate::error::Result;
use crate::models::{Listing, Source};
use crate::scrapers::embedded::parse_embedded;
use crate::scrapers::fetcher::HttpFetcher;
use crate::scrapers::html::{absolutize, any_amount, css, first_attr, first_number, first_text, image_src};
use crate::scrapers::traits::{append_sort, parse_url, SiteAdapter};
use crate::scrapers::types::{ParseError, ParseOutcome, RawDocument, SiteParams, Strategy};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::info;

const BASE_URL: &str = "https://www.rightmove.co.uk";
const SEARCH_URL: &str = "https://www.rightmove.co.uk/property-to-rent/find.html";

static PROPERTY_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/properties/(\d+)").expect("valid property path regex"));

const EMBEDDED_PATHS: &[&[&str]] = &[
    &["props", "pageProps", "propertyData", "properties"],
    &["props", "pageProps", "searchResults", "properties"],
];

struct CardSelectors {
    card: Selector,
    link: Selector,
    title: Selector,
    address: Selector,
    price: Selector,
    bedrooms: Selector,
    description: Selector,
    image: Selector,
}

impl CardSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            card: css(r#"div.propertyCard, [data-test="propertyCard"]"#)?,
            link: css("a.propertyCard-link, a[href*='/properties/']")?,
            title: css(".propertyCard-title, h2")?,
            address: css(".propertyCard-address, address")?,
            price: css(r#".propertyCard-priceValue, [data-test="property-price"]"#)?,
            bedrooms: css(r#".propertyCard-bedrooms, [data-test="bedrooms"]"#)?,
            description: css(r#".propertyCard-description, [data-test="property-description"]"#)?,
            image: css(".propertyCard-img img, img")?,
        })
    }
}

/// Rightmove lettings search
pub struct RightmoveAdapter {
    fetcher: HttpFetcher,
    base_url: String,
    search_url: String,
    params: SiteParams,
    sort: SortPreference,
    selectors: CardSelectors,
}

impl RightmoveAdapter {
    pub fn new(site: &SiteConfig, sort: SortPreference, fetcher: HttpFetcher) -> Result<Self> {
        info!("Initializing rightmove adapter with sort type: {sort}");
        Ok(Self {
            fetcher,
            base_url: site.base_url.clone().unwrap_or_else(|| BASE_URL.to_string()),
            search_url: site.search_url.clone().unwrap_or_else(|| SEARCH_URL.to_string()),
            params: SiteParams::new(site.params.clone()),
            sort,
            selectors: CardSelectors::new()?,
        })
    }

    fn parse_card(&self, index: usize, card: ElementRef<'_>) -> std::result::Result<Listing, ParseError> {
        let s = &self.selectors;
        let href = first_attr(card, &s.link, "href");

        let raw_id = card
            .value()
            .attr("id")
            .and_then(|id| id.strip_prefix("property-"))
            .map(str::to_string)
            .or_else(|| {
                href.and_then(|h| PROPERTY_PATH.captures(h))
                    .map(|caps| caps[1].to_string())
            })
            .ok_or_else(|| ParseError::new(index, "card has no property id"))?;

        let mut listing = Listing::new(Source::Rightmove, &raw_id);
        if let Some(title) = first_text(card, &s.title) {
            listing.title = title;
        }
        listing.address = first_text(card, &s.address).unwrap_or_default();
        if let Some(price_text) = first_text(card, &s.price) {
            listing.price = any_amount(&price_text);
            listing.price_text = price_text;
        }
        if let Some(beds) = first_text(card, &s.bedrooms).as_deref().and_then(first_number) {
            listing.bedrooms = beds;
        }
        listing.description = first_text(card, &s.description);
        listing.link = href.map(|h| absolutize(&self.base_url, h)).unwrap_or_default();
        listing.images = card
            .select(&s.image)
            .filter_map(|img| image_src(img, &["src", "data-src"]))
            .collect();

        Ok(listing)
    }
}

#[async_trait]
impl SiteAdapter for RightmoveAdapter {
    fn name(&self) -> &str {
        Source::Rightmove.as_str()
    }

    fn build_search_url(&self) -> Result<Url> {
        let p = &self.params;
        let mut url = parse_url(self.name(), &self.search_url)?;
        url.query_pairs_mut()
            .append_pair("locationIdentifier", &p.text("location_identifier", "REGION^219"))
            .append_pair("minPrice", &p.text("min_price", 0))
            .append_pair("maxPrice", &p.text("max_price", 1200))
            .append_pair("minBedrooms", &p.text("min_beds", 1))
            .append_pair("maxBedrooms", &p.text("max_beds", 1))
            .append_pair("radius", &p.text("radius", 0.0))
            .append_pair("includeLetAgreed", &p.flag("include_let_agreed", false).to_string())
            .append_pair("dontShow", &p.text("dont_show", "houseShare,student,retirement"))
            .append_pair("letType", &p.text("let_type", "shortTerm"));
        append_sort(self, &mut url, self.sort);
        Ok(url)
    }

    async fn fetch_raw(&self, url: &Url) -> Result<RawDocument> {
        self.fetcher.fetch(self.name(), url).await
    }

    fn parse_listings(&self, raw: &RawDocument) -> ParseOutcome {
        let document = Html::parse_document(&raw.body);
        let outcome = ParseOutcome::collect(
            Strategy::Selectors,
            document
                .select(&self.selectors.card)
                .enumerate()
                .map(|(index, card)| self.parse_card(index, card)),
        )
        .or_fallback(|| parse_embedded(&document, EMBEDDED_PATHS, Source::Rightmove, &self.base_url));

        info!("Found {} Rightmove listings", outcome.listings.len());
        outcome
    }

    fn sort_fragment(&self, preference: SortPreference) -> Option<&'static str> {
        Some(match preference {
            SortPreference::PriceHighToLow => "sortType=2",
            SortPreference::PriceLowToHigh => "sortType=1",
            SortPreference::OldestFirst => "sortType=10",
            // Rightmove's own default is newest first
            SortPreference::NewestFirst | SortPreference::Default | SortPreference::LastUpdated => "sortType=6",
        })
    }
}

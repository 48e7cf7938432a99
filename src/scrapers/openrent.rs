use crate::config::{SiteConfig, SortPreference};
use crate::error::Result;
use crate::models::{Listing, Source};
use crate::scrapers::embedded::parse_embedded;
use crate::scrapers::fetcher::HttpFetcher;
use crate::scrapers::html::{css, first_text, image_src, pound_amount};
use crate::scrapers::traits::{append_sort, parse_url, SiteAdapter};
use crate::scrapers::types::{ParseError, ParseOutcome, RawDocument, SiteParams, Strategy};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::info;

const BASE_URL: &str = "https://www.openrent.co.uk";
const SEARCH_URL: &str = "https://www.openrent.co.uk/properties-to-rent/bristol";

static BEDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*Bed").expect("valid bedroom regex"));

const EMBEDDED_PATHS: &[&[&str]] = &[
    &["props", "pageProps", "properties"],
    &["properties"],
    &["listings"],
];

struct CardSelectors {
    card: Selector,
    carousel: Selector,
    price: Selector,
    title: Selector,
    features: Selector,
    image: Selector,
}

impl CardSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            card: css(".lpcc")?,
            carousel: css(".property-row-carousel")?,
            price: css(".pim.pl-title h2")?,
            title: css(".banda.pt.listing-title")?,
            features: css(".lic li span")?,
            image: css(".propertyPic.or-lazy-image")?,
        })
    }
}

/// Capitalizes the first letter, lowercasing the rest
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// OpenRent search
pub struct OpenRentAdapter {
    fetcher: HttpFetcher,
    base_url: String,
    search_url: String,
    params: SiteParams,
    sort: SortPreference,
    selectors: CardSelectors,
}

impl OpenRentAdapter {
    pub fn new(site: &SiteConfig, sort: SortPreference, fetcher: HttpFetcher) -> Result<Self> {
        info!("Initializing openrent adapter with sort type: {sort}");
        Ok(Self {
            fetcher,
            base_url: site.base_url.clone().unwrap_or_else(|| BASE_URL.to_string()),
            search_url: site.search_url.clone().unwrap_or_else(|| SEARCH_URL.to_string()),
            params: SiteParams::new(site.params.clone()),
            sort,
            selectors: CardSelectors::new()?,
        })
    }

    /// OpenRent cards have no link element; the detail page lives at a path
    /// built from the title slug and id.
    fn detail_link(&self, title: &str, raw_id: &str) -> String {
        let slug = title.replace(' ', "-").to_lowercase().replace(',', "");
        format!(
            "{}/property-to-rent/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.params.text("location", "bristol"),
            slug,
            raw_id
        )
    }

    fn parse_card(&self, index: usize, card: ElementRef<'_>) -> std::result::Result<Listing, ParseError> {
        let s = &self.selectors;
        let raw_id = card
            .select(&s.carousel)
            .next()
            .and_then(|carousel| carousel.value().attr("data-listing-id"))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ParseError::new(index, "card has no carousel listing id"))?
            .to_string();

        let mut listing = Listing::new(Source::OpenRent, &raw_id);

        if let Some(price_text) = first_text(card, &s.price) {
            listing.price = pound_amount(&price_text);
            listing.price_text = match listing.price {
                Some(price) if !price_text.to_lowercase().contains("per month") => {
                    format!("£{price} per month")
                }
                _ => price_text,
            };
        }

        listing.title = first_text(card, &s.title).unwrap_or_default();
        // Titles read like "1 Bed Flat, Clifton Road, BS8"
        if let Some((_, place)) = listing.title.split_once(" in ") {
            listing.address = place.trim().to_string();
        } else if let Some((_, place)) = listing.title.split_once(", ") {
            listing.address = place.trim().to_string();
        }

        if let Some(beds) = card
            .select(&s.features)
            .find_map(|span| BEDS.captures(&span.text().collect::<String>()).and_then(|c| c[1].parse().ok()))
        {
            listing.bedrooms = beds;
        }

        listing.link = self.detail_link(&listing.title, &raw_id);
        listing.images = card
            .select(&s.image)
            .filter_map(|img| image_src(img, &["data-src"]))
            .collect();

        Ok(listing)
    }
}

#[async_trait]
impl SiteAdapter for OpenRentAdapter {
    fn name(&self) -> &str {
        Source::OpenRent.as_str()
    }

    fn build_search_url(&self) -> Result<Url> {
        let p = &self.params;
        let location = capitalize(&p.text("location", "bristol"));
        let min_price = p.integer("min_price", 0);

        let mut url = parse_url(self.name(), &self.search_url)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("term", &format!("{location}, {location}"));
            if min_price != 0 {
                query.append_pair("prices_min", &min_price.to_string());
            }
            query
                .append_pair("prices_max", &p.text("max_price", 1500))
                .append_pair("bedrooms_min", &p.text("min_beds", 0))
                .append_pair("bedrooms_max", &p.text("max_beds", 1))
                .append_pair("furnishedType", &p.text("furnished-type", "1"));
            if p.flag("accept-non-students", true) {
                query.append_pair("acceptNonStudents", "true");
            }
            if p.flag("is-live", true) {
                query.append_pair("isLive", "true");
            }
        }
        append_sort(self, &mut url, self.sort);
        info!("OpenRent URL: {url}");
        Ok(url)
    }

    async fn fetch_raw(&self, url: &Url) -> Result<RawDocument> {
        self.fetcher.fetch(self.name(), url).await
    }

    fn parse_listings(&self, raw: &RawDocument) -> ParseOutcome {
        let document = Html::parse_document(&raw.body);
        let cards: Vec<_> = document.select(&self.selectors.card).collect();
        info!("Found {} OpenRent property cards", cards.len());

        let outcome = ParseOutcome::collect(
            Strategy::Selectors,
            cards
                .into_iter()
                .enumerate()
                .map(|(index, card)| self.parse_card(index, card)),
        )
        .or_fallback(|| parse_embedded(&document, EMBEDDED_PATHS, Source::OpenRent, &self.base_url));

        info!("Found {} OpenRent listings", outcome.listings.len());
        outcome
    }

    fn sort_fragment(&self, preference: SortPreference) -> Option<&'static str> {
        match preference {
            SortPreference::PriceHighToLow => Some("sortType=2"),
            SortPreference::PriceLowToHigh => Some("sortType=1"),
            // Distance order
            _ => None,
        }
    }
}

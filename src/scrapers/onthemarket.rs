use crate::config::{SiteConfig, SortPreference};
use crate::error::Result;
use crate::models::{Listing, Source};
use crate::scrapers::embedded::parse_embedded;
use crate::scrapers::fetcher::HttpFetcher;
use crate::scrapers::html::{absolutize, css, first_attr, first_number, first_text, image_src, pound_amount};
use crate::scrapers::traits::{append_sort, parse_url, SiteAdapter};
use crate::scrapers::types::{ParseError, ParseOutcome, RawDocument, SiteParams, Strategy};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::info;

const BASE_URL: &str = "https://www.onthemarket.com";

static DETAILS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/details/([^/]+)").expect("valid details path regex"));

/// Rows that hold the price next to the card's carousel
const PRICE_ROW_CLASSES: [&str; 3] = ["property-row", "property-card", "listing-item"];

const EMBEDDED_PATHS: &[&[&str]] = &[
    &["props", "pageProps", "initialReduxState", "results", "list"],
    &["props", "pageProps", "results", "list"],
    &["props", "pageProps", "properties"],
];

struct CardSelectors {
    card: Selector,
    card_alt: Selector,
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
            card: css(".property-details, .property-result, li.otm-PropertyCard")?,
            card_alt: css(r#"[data-test="property-card"], [data-properties-link], .property"#)?,
            link: css(r#"a[href*="/details/"]"#)?,
            title: css(r#"h2.title, h3.title, .otm-PropertyCardDetails-title, [data-test="property-title"]"#)?,
            address: css(r#".address, .otm-PropertyCardAddress, [data-test="address"]"#)?,
            price: css(r#".pim h2, .price, [class*="price"]"#)?,
            bedrooms: css(r#".bed-icon + span, [data-test="beds"], .otm-IconBed + span"#)?,
            description: css(r#".description, .otm-PropertyCardDescription, [data-test="description"]"#)?,
            image: css(r#"img.property-image, .otm-PropertyCardMedia img, [data-test="property-image"]"#)?,
        })
    }
}

/// OnTheMarket lettings search
pub struct OnTheMarketAdapter {
    fetcher: HttpFetcher,
    base_url: String,
    params: SiteParams,
    sort: SortPreference,
    selectors: CardSelectors,
}

impl OnTheMarketAdapter {
    pub fn new(site: &SiteConfig, sort: SortPreference, fetcher: HttpFetcher) -> Result<Self> {
        info!("Initializing onthemarket adapter with sort type: {sort}");
        Ok(Self {
            fetcher,
            base_url: site.base_url.clone().unwrap_or_else(|| BASE_URL.to_string()),
            params: SiteParams::new(site.params.clone()),
            sort,
            selectors: CardSelectors::new()?,
        })
    }

    /// Enclosing row that carries the price, if the card sits in one
    fn price_row(card: ElementRef<'_>) -> Option<ElementRef<'_>> {
        card.ancestors().filter_map(ElementRef::wrap).find(|el| {
            el.value().name() == "div"
                && el
                    .value()
                    .classes()
                    .any(|class| PRICE_ROW_CLASSES.contains(&class))
        })
    }

    fn parse_card(&self, index: usize, card: ElementRef<'_>) -> std::result::Result<Listing, ParseError> {
        let s = &self.selectors;
        let href = first_attr(card, &s.link, "href");

        let raw_id = ["id", "data-property-id"]
            .iter()
            .find_map(|attr| card.value().attr(attr).filter(|v| !v.is_empty()))
            .map(str::to_string)
            .or_else(|| {
                href.and_then(|h| DETAILS_PATH.captures(h))
                    .map(|caps| caps[1].to_string())
            })
            .ok_or_else(|| ParseError::new(index, "card has no property id"))?;

        let mut listing = Listing::new(Source::OnTheMarket, &raw_id);

        let title = first_text(card, &s.title);
        match first_text(card, &s.address) {
            Some(address) => {
                listing.address = address;
                if let Some(title) = title {
                    listing.title = title;
                }
            }
            // Some cards only have a title, which is then the address
            None => match title {
                Some(title) if title.contains(',') => {
                    let street = title.split(',').next().unwrap_or_default().trim().to_string();
                    listing.address = title;
                    listing.title = format!("{street} Property");
                }
                Some(title) => listing.title = title,
                None => {}
            },
        }

        let price_scope = Self::price_row(card).unwrap_or(card);
        if let Some(price_text) = first_text(price_scope, &s.price) {
            listing.price = pound_amount(&price_text);
            listing.price_text = match listing.price {
                Some(price) if !price_text.to_lowercase().contains("per month") => {
                    format!("£{price} per month")
                }
                _ => price_text,
            };
        }

        listing.link = href.map(|h| absolutize(&self.base_url, h)).unwrap_or_default();
        if let Some(beds) = first_text(card, &s.bedrooms).as_deref().and_then(first_number) {
            listing.bedrooms = beds;
        }
        listing.description = first_text(card, &s.description);
        listing.images = card
            .select(&s.image)
            .filter_map(|img| image_src(img, &["src", "data-src", "data-lazy-src"]))
            .collect();

        Ok(listing)
    }
}

#[async_trait]
impl SiteAdapter for OnTheMarketAdapter {
    fn name(&self) -> &str {
        Source::OnTheMarket.as_str()
    }

    fn build_search_url(&self) -> Result<Url> {
        let p = &self.params;
        let base = format!(
            "{}/to-rent/property/{}/",
            self.base_url.trim_end_matches('/'),
            p.text("location", "bristol")
        );
        let mut url = parse_url(self.name(), &base)?;
        url.query_pairs_mut()
            .append_pair("min-bedrooms", &p.text("min-bedrooms", 0))
            .append_pair("max-bedrooms", &p.text("max-bedrooms", 1))
            .append_pair("max-price", &p.text("max-price", 1500))
            .append_pair("let-length", &p.text("let-length", "short-term"))
            .append_pair("furnished", &p.text("furnished", "furnished"))
            .append_pair("shared", &p.flag("shared", false).to_string())
            .append_pair("student", &p.flag("student", false).to_string());
        append_sort(self, &mut url, self.sort);
        info!("OnTheMarket URL: {url}");
        Ok(url)
    }

    async fn fetch_raw(&self, url: &Url) -> Result<RawDocument> {
        self.fetcher.fetch(self.name(), url).await
    }

    fn parse_listings(&self, raw: &RawDocument) -> ParseOutcome {
        let document = Html::parse_document(&raw.body);
        let mut cards: Vec<_> = document.select(&self.selectors.card).collect();
        if cards.is_empty() {
            cards = document.select(&self.selectors.card_alt).collect();
        }
        info!("Found {} OnTheMarket property cards", cards.len());

        let outcome = ParseOutcome::collect(
            Strategy::Selectors,
            cards
                .into_iter()
                .enumerate()
                .map(|(index, card)| self.parse_card(index, card)),
        )
        .or_fallback(|| parse_embedded(&document, EMBEDDED_PATHS, Source::OnTheMarket, &self.base_url));

        info!("Found {} OnTheMarket listings", outcome.listings.len());
        outcome
    }

    fn sort_fragment(&self, preference: SortPreference) -> Option<&'static str> {
        match preference {
            SortPreference::PriceHighToLow => Some("sort-field=price"),
            SortPreference::PriceLowToHigh => Some("direction=asc&sort-field=price"),
            SortPreference::NewestFirst => Some("sort-field=update_date"),
            // Recommended order
            SortPreference::Default | SortPreference::OldestFirst | SortPreference::LastUpdated => None,
        }
    }
}

use crate::config::{SiteConfig, SortPreference};
use crate::error::Result;
use crate::models::{Listing, Source};
use crate::scrapers::embedded::parse_embedded;
use crate::scrapers::fetcher::HttpFetcher;
use crate::scrapers::html::{absolutize, any_amount, css, first_attr, first_text, image_src, is_weekly};
use crate::scrapers::traits::{append_sort, parse_url, SiteAdapter};
use crate::scrapers::types::{ParseError, ParseOutcome, RawDocument, Strategy};
use async_trait::async_trait;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::info;

const BASE_URL: &str = "https://www.spareroom.co.uk";
const SEARCH_URL: &str = "https://www.spareroom.co.uk/flatshare/?search_id=1361538853&mode=list";

const EMBEDDED_PATHS: &[&[&str]] = &[
    &["props", "pageProps", "results", "listings"],
    &["props", "pageProps", "listings"],
    &["results", "listings"],
];

struct CardSelectors {
    card: Selector,
    card_alt: Selector,
    price: Selector,
    title: Selector,
    address: Selector,
    link: Selector,
    image: Selector,
}

impl CardSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            card: css("li.listing-result")?,
            card_alt: css("article.listing-card")?,
            price: css(".listingPrice, .listing-card__price, .listing-card__details strong")?,
            title: css("h2.listing-result-title, h2.listing-card__title, .listing-card__title")?,
            address: css(".listingLocation, .listing-card__location")?,
            link: css("a.listing-result-title-link, a.listing-card__link")?,
            image: css(".listing-card__main-image")?,
        })
    }
}

/// SpareRoom flatshare search.
///
/// Searches are saved on SpareRoom's side, so the configured `search_url`
/// is used as-is apart from the sort order.
pub struct SpareRoomAdapter {
    fetcher: HttpFetcher,
    base_url: String,
    search_url: String,
    sort: SortPreference,
    selectors: CardSelectors,
}

impl SpareRoomAdapter {
    pub fn new(site: &SiteConfig, sort: SortPreference, fetcher: HttpFetcher) -> Result<Self> {
        info!("Initializing spareroom adapter with sort type: {sort}");
        Ok(Self {
            fetcher,
            base_url: site.base_url.clone().unwrap_or_else(|| BASE_URL.to_string()),
            search_url: site.search_url.clone().unwrap_or_else(|| SEARCH_URL.to_string()),
            sort,
            selectors: CardSelectors::new()?,
        })
    }

    /// Listing id from the card, or from the `<li>` wrapping an article card
    fn listing_id(card: ElementRef<'_>) -> Option<String> {
        if let Some(id) = card.value().attr("data-listing-id").filter(|v| !v.is_empty()) {
            return Some(id.to_string());
        }
        card.ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "li")
            .and_then(|li| li.value().attr("data-listing-id"))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn parse_card(&self, index: usize, card: ElementRef<'_>) -> std::result::Result<Listing, ParseError> {
        let s = &self.selectors;
        let raw_id = Self::listing_id(card)
            .ok_or_else(|| ParseError::new(index, "card has no data-listing-id"))?;

        let mut listing = Listing::new(Source::SpareRoom, &raw_id);
        listing.title = "Room to rent".to_string();

        if let Some(price_text) = first_text(card, &s.price) {
            let amount = any_amount(&price_text);
            match amount {
                Some(weekly) if is_weekly(&price_text) => {
                    let monthly = weekly * 4;
                    listing.price = Some(monthly);
                    listing.price_text = format!("£{monthly} pcm (calculated from {price_text})");
                }
                _ => {
                    listing.price = amount;
                    listing.price_text = price_text;
                }
            }
        }

        if let Some(title) = first_text(card, &s.title) {
            listing.title = title;
        } else if let Some(title) = card.value().attr("data-listing-title") {
            listing.title = title.replace("&#32;", " ");
        }

        listing.address = first_text(card, &s.address).unwrap_or_default();
        listing.link = first_attr(card, &s.link, "href")
            .map(|h| absolutize(&self.base_url, h))
            .unwrap_or_default();
        listing.images = card
            .select(&s.image)
            .next()
            .and_then(|img| image_src(img, &["src"]))
            .into_iter()
            .collect();

        Ok(listing)
    }
}

#[async_trait]
impl SiteAdapter for SpareRoomAdapter {
    fn name(&self) -> &str {
        Source::SpareRoom.as_str()
    }

    fn build_search_url(&self) -> Result<Url> {
        let mut url = parse_url(self.name(), &self.search_url)?;
        append_sort(self, &mut url, self.sort);
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

        let outcome = ParseOutcome::collect(
            Strategy::Selectors,
            cards
                .into_iter()
                .enumerate()
                .map(|(index, card)| self.parse_card(index, card)),
        )
        .or_fallback(|| parse_embedded(&document, EMBEDDED_PATHS, Source::SpareRoom, &self.base_url));

        info!("Found {} SpareRoom listings", outcome.listings.len());
        outcome
    }

    fn sort_fragment(&self, preference: SortPreference) -> Option<&'static str> {
        Some(match preference {
            SortPreference::PriceHighToLow => "sort_by=price_high_to_low",
            SortPreference::PriceLowToHigh => "sort_by=price_low_to_high",
            SortPreference::LastUpdated => "sort_by=last_updated",
            SortPreference::NewestFirst | SortPreference::Default | SortPreference::OldestFirst => {
                "sort_by=days_since_placed"
            }
        })
    }
}

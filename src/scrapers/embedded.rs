//! Fallback extraction from data blobs that sites embed in their pages
//! (`__NEXT_DATA__` and other `application/json` scripts).

use crate::models::{Listing, Source};
use crate::scrapers::html::{absolutize, first_number, pound_amount};
use crate::scrapers::types::{ParseError, ParseOutcome, Strategy};
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

const SCRIPT_SELECTOR: &str = r#"script#__NEXT_DATA__, script[type="application/json"]"#;

/// Every JSON document embedded in a script tag. Scripts that don't hold
/// valid JSON are skipped.
pub fn script_payloads(document: &Html) -> Vec<Value> {
    let Ok(selector) = Selector::parse(SCRIPT_SELECTOR) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|script| {
            let raw = script.text().collect::<String>();
            match serde_json::from_str(raw.trim()) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!("Skipping non-JSON script: {e}");
                    None
                }
            }
        })
        .collect()
}

/// First non-empty array found at one of `paths`
pub fn find_array<'a>(payload: &'a Value, paths: &[&[&str]]) -> Option<&'a Vec<Value>> {
    paths.iter().find_map(|path| {
        path.iter()
            .try_fold(payload, |node, key| node.get(key))
            .and_then(Value::as_array)
            .filter(|items| !items.is_empty())
    })
}

/// Parses the property array of the first payload that has one.
pub fn parse_embedded(document: &Html, paths: &[&[&str]], source: Source, base_url: &str) -> ParseOutcome {
    let payloads = script_payloads(document);
    payloads
        .iter()
        .find_map(|payload| find_array(payload, paths))
        .map(|items| {
            ParseOutcome::collect(
                Strategy::EmbeddedData,
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| listing_from_value(index, item, source, base_url)),
            )
        })
        .unwrap_or_else(|| ParseOutcome::empty(Strategy::EmbeddedData))
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| item.get(key))
        .find(|value| !value.is_null())
}

fn as_amount(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    }
}

/// Maps one embedded property object onto a listing.
///
/// The shapes differ between sites, so each field is looked up under the
/// names any of them use.
pub fn listing_from_value(index: usize, item: &Value, source: Source, base_url: &str) -> Result<Listing, ParseError> {
    if !item.is_object() {
        return Err(ParseError::new(index, "property entry is not an object"));
    }

    let raw_id = field(item, &["id", "listingId", "propertyId"])
        .and_then(as_text)
        .ok_or_else(|| ParseError::new(index, "missing property id"))?;

    let mut listing = Listing::new(source, &raw_id);

    let address = field(item, &["displayAddress", "address"]).and_then(as_text);
    if let Some(title) = field(item, &["title", "summary"]).and_then(as_text) {
        listing.title = title.chars().take(100).collect();
    } else if let Some(address) = &address {
        listing.title = address.clone();
    }
    listing.address = address.unwrap_or_default();

    match field(item, &["price"]) {
        Some(Value::Object(price)) => {
            let display = price
                .get("displayPrices")
                .and_then(|d| d.get(0))
                .and_then(|d| d.get("displayPrice"))
                .or_else(|| price.get("display"))
                .and_then(as_text);
            listing.price = price
                .get("amount")
                .and_then(as_amount)
                .or_else(|| display.as_deref().and_then(pound_amount));
            // A "£x pcm" display price wins over the raw amount, which some
            // sites quote weekly.
            if let Some(pcm) = display
                .as_deref()
                .filter(|d| d.to_lowercase().contains("pcm"))
                .and_then(pound_amount)
            {
                listing.price = Some(pcm);
            }
            if let Some(text) = display.or_else(|| listing.price.map(|p| format!("£{p} pcm"))) {
                listing.price_text = text;
            }
        }
        Some(other) => {
            listing.price = as_amount(other);
            if let Some(price) = listing.price {
                listing.price_text = format!("£{price} pcm");
            }
        }
        None => {}
    }

    if let Some(beds) = field(item, &["bedrooms", "numBedrooms"]).and_then(as_amount) {
        listing.bedrooms = u32::try_from(beds).unwrap_or(1);
    } else if let Some(features) = item.get("features").and_then(Value::as_array) {
        if let Some(beds) = features
            .iter()
            .filter_map(Value::as_str)
            .find(|f| f.to_lowercase().contains("bedroom"))
            .and_then(first_number)
        {
            listing.bedrooms = beds;
        }
    }

    listing.description = field(item, &["description", "summary"]).and_then(as_text);

    if let Some(link) = field(item, &["propertyUrl", "url", "listingUris"]).and_then(|v| {
        as_text(v).or_else(|| v.get("detail").and_then(as_text))
    }) {
        listing.link = absolutize(base_url, &link);
    }

    listing.images = image_urls(item, base_url);

    Ok(listing)
}

fn image_urls(item: &Value, base_url: &str) -> Vec<String> {
    let nested = item
        .get("propertyImages")
        .and_then(|p| p.get("images"))
        .and_then(Value::as_array);
    let lists = ["images", "propertyImages", "photos"]
        .iter()
        .filter_map(|key| item.get(key).and_then(Value::as_array))
        .chain(nested);

    lists
        .flatten()
        .filter_map(|img| match img {
            Value::String(url) => Some(url.clone()),
            Value::Object(_) => field(img, &["srcUrl", "url", "src"]).and_then(as_text),
            _ => None,
        })
        .filter(|url| !url.is_empty())
        .map(|url| absolutize(base_url, &url))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "https://www.example.co.uk";

    #[test]
    fn finds_first_matching_path() {
        let payload = json!({"props": {"pageProps": {"searchResults": {"properties": [{"id": 1}]}}}});
        let paths: &[&[&str]] = &[
            &["props", "pageProps", "propertyData", "properties"],
            &["props", "pageProps", "searchResults", "properties"],
        ];
        let found = find_array(&payload, paths).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn maps_rightmove_style_entry() {
        let item = json!({
            "id": 12345,
            "summary": "Bright one bedroom flat close to the harbour",
            "bedrooms": 1,
            "displayAddress": "Harbourside, Bristol",
            "price": {"amount": 1100, "displayPrices": [{"displayPrice": "£1,100 pcm"}]},
            "propertyUrl": "/properties/12345",
            "propertyImages": {"images": [{"srcUrl": "https://media.example.com/1.jpg"}]}
        });
        let listing = listing_from_value(0, &item, Source::Rightmove, BASE).unwrap();
        assert_eq!(listing.id, "rightmove-12345");
        assert_eq!(listing.price, Some(1100));
        assert_eq!(listing.price_text, "£1,100 pcm");
        assert_eq!(listing.address, "Harbourside, Bristol");
        assert_eq!(listing.link, "https://www.example.co.uk/properties/12345");
        assert_eq!(listing.images, vec!["https://media.example.com/1.jpg"]);
    }

    #[test]
    fn pcm_display_price_overrides_amount() {
        let item = json!({
            "listingId": "z9",
            "displayAddress": "Redland",
            "price": {"amount": 300, "display": "£1,300 pcm"},
            "features": ["2 bedrooms", "garden"],
            "images": ["//cdn.example.com/a.jpg"]
        });
        let listing = listing_from_value(0, &item, Source::Zoopla, BASE).unwrap();
        assert_eq!(listing.id, "zoopla-z9");
        assert_eq!(listing.title, "Redland");
        assert_eq!(listing.price, Some(1300));
        assert_eq!(listing.bedrooms, 2);
        assert_eq!(listing.images, vec!["https://cdn.example.com/a.jpg"]);
    }

    #[test]
    fn unreadable_price_is_unknown() {
        let item = json!({"id": "7", "price": "POA"});
        let listing = listing_from_value(0, &item, Source::OpenRent, BASE).unwrap();
        assert_eq!(listing.price, None);
        assert_eq!(listing.price_text, crate::models::PRICE_NOT_SPECIFIED);
        assert_eq!(listing.bedrooms, 1);
    }

    #[test]
    fn entry_without_id_is_an_error() {
        let item = json!({"title": "No id here"});
        let err = listing_from_value(3, &item, Source::Zoopla, BASE).unwrap_err();
        assert_eq!(err.index, 3);
    }

    #[test]
    fn parses_next_data_script() {
        let html = r#"<html><body>
            <script type="application/json">{"unrelated": true}</script>
            <script id="__NEXT_DATA__" type="application/json">
              {"props": {"pageProps": {"listings": [{"id": "a"}, {"nope": 1}]}}}
            </script>
        </body></html>"#;
        let document = Html::parse_document(html);
        let outcome = parse_embedded(&document, &[&["props", "pageProps", "listings"]], Source::SpareRoom, BASE);
        assert_eq!(outcome.strategy, Strategy::EmbeddedData);
        assert_eq!(outcome.listings.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
    }
}

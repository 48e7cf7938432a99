//! Small helpers shared by the selector-based parsers.

use crate::error::{Result, ScanError};
use regex::Regex;
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;

static POUND_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"£\s*([\d,]+)").expect("valid price regex"));
static ANY_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d[\d,]*)").expect("valid number regex"));
static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)").expect("valid number regex"));

/// Parses a CSS selector, reporting bad ones as a scan error.
pub fn css(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ScanError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Element text with whitespace runs collapsed
pub fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first match of `selector` under `scope`, if non-empty
pub fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(text_of)
        .filter(|text| !text.is_empty())
}

pub fn first_attr<'a>(scope: ElementRef<'a>, selector: &Selector, attr: &str) -> Option<&'a str> {
    scope
        .select(selector)
        .find_map(|el| el.value().attr(attr))
        .filter(|value| !value.is_empty())
}

/// Turns a site-relative or protocol-relative link into an absolute URL
pub fn absolutize(base_url: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || href.starts_with("http") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), href)
    }
}

/// Image URL from the first populated attribute, skipping icons and
/// lazy-load placeholders
pub fn image_src(img: ElementRef<'_>, attrs: &[&str]) -> Option<String> {
    let src = attrs
        .iter()
        .find_map(|attr| img.value().attr(attr).filter(|v| !v.is_empty()))?;
    if src.ends_with("svg") || src.to_lowercase().contains("placeholder") {
        return None;
    }
    Some(match src.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => src.to_string(),
    })
}

/// Amount following a pound sign, e.g. `£1,250 pcm` -> 1250
pub fn pound_amount(text: &str) -> Option<i64> {
    POUND_AMOUNT
        .captures(text)
        .and_then(|caps| caps[1].replace(',', "").parse().ok())
}

/// Pound amount if there is one, otherwise the first number in the text
pub fn any_amount(text: &str) -> Option<i64> {
    pound_amount(text).or_else(|| {
        ANY_AMOUNT
            .captures(text)
            .and_then(|caps| caps[1].replace(',', "").parse().ok())
    })
}

pub fn first_number(text: &str) -> Option<u32> {
    FIRST_NUMBER
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Sites quoting weekly rent mark it with "pw"
pub fn is_weekly(price_text: &str) -> bool {
    price_text.to_lowercase().contains("pw")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn parses_prices() {
        assert_eq!(pound_amount("£1,250 pcm"), Some(1250));
        assert_eq!(pound_amount("POA"), None);
        assert_eq!(any_amount("1,100 per month"), Some(1100));
        assert_eq!(any_amount("£300 pw"), Some(300));
        assert!(is_weekly("£300 PW"));
        assert!(!is_weekly("£1,300 pcm"));
    }

    #[test]
    fn absolutizes_links() {
        let base = "https://www.zoopla.co.uk";
        assert_eq!(absolutize(base, "/to-rent/details/1"), "https://www.zoopla.co.uk/to-rent/details/1");
        assert_eq!(absolutize(base, "//cdn.example.com/a.jpg"), "https://cdn.example.com/a.jpg");
        assert_eq!(absolutize(base, "https://other.example.com/x"), "https://other.example.com/x");
        assert_eq!(absolutize(base, ""), "");
    }

    #[test]
    fn image_src_skips_placeholders() {
        let doc = Html::parse_fragment(
            r#"<div><img src="/img/Placeholder.png"><img data-src="//cdn.x/1.jpg"><img src="icon.svg"></div>"#,
        );
        let img = css("img").unwrap();
        let found: Vec<_> = doc
            .select(&img)
            .filter_map(|el| image_src(el, &["src", "data-src"]))
            .collect();
        assert_eq!(found, vec!["https://cdn.x/1.jpg"]);
    }

    #[test]
    fn text_collapses_whitespace() {
        let doc = Html::parse_fragment("<p>  2   bed\n flat </p>");
        let p = css("p").unwrap();
        let el = doc.select(&p).next().unwrap();
        assert_eq!(text_of(el), "2 bed flat");
    }

    #[test]
    fn rejects_bad_selector() {
        assert!(matches!(css("div[["), Err(ScanError::InvalidSelector { .. })));
    }
}

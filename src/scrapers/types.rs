use crate::models::Listing;
use serde_json::{Map, Value};
use thiserror::Error;

/// Body of a fetched search page
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl RawDocument {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            body: body.into(),
        }
    }
}

/// A single search result that could not be turned into a listing
#[derive(Debug, Clone, PartialEq, Error)]
#[error("item {index}: {reason}")]
pub struct ParseError {
    pub index: usize,
    pub reason: String,
}

impl ParseError {
    pub fn new(index: usize, reason: impl Into<String>) -> Self {
        Self {
            index,
            reason: reason.into(),
        }
    }
}

/// Which extraction strategy produced the listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// CSS selectors over the result cards
    Selectors,
    /// Structured data embedded in a script tag
    EmbeddedData,
}

/// Result of parsing one search page: what parsed and what didn't
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub listings: Vec<Listing>,
    pub errors: Vec<ParseError>,
    pub strategy: Strategy,
}

impl ParseOutcome {
    pub fn empty(strategy: Strategy) -> Self {
        Self {
            listings: Vec::new(),
            errors: Vec::new(),
            strategy,
        }
    }

    /// Collects per-item results, keeping failures alongside successes.
    pub fn collect(strategy: Strategy, items: impl IntoIterator<Item = Result<Listing, ParseError>>) -> Self {
        let mut outcome = Self::empty(strategy);
        for item in items {
            match item {
                Ok(listing) => outcome.listings.push(listing),
                Err(err) => outcome.errors.push(err),
            }
        }
        outcome
    }

    /// Runs `fallback` when this outcome found nothing. Errors from both
    /// attempts are kept.
    pub fn or_fallback(self, fallback: impl FnOnce() -> ParseOutcome) -> ParseOutcome {
        if !self.listings.is_empty() {
            return self;
        }
        let mut next = fallback();
        let mut errors = self.errors;
        errors.append(&mut next.errors);
        next.errors = errors;
        next
    }
}

/// Query parameters for one site, as written in the config file.
///
/// Lookups take the adapter's default for anything the user left out.
#[derive(Debug, Clone, Default)]
pub struct SiteParams(Map<String, Value>);

impl SiteParams {
    pub fn new(params: Map<String, Value>) -> Self {
        Self(params)
    }

    /// Parameter rendered for a query string
    pub fn text(&self, key: &str, default: impl Into<Value>) -> String {
        match self.0.get(key) {
            Some(value) if !value.is_null() => render(value),
            _ => render(&default.into()),
        }
    }

    pub fn integer(&self, key: &str, default: i64) -> i64 {
        match self.0.get(key) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    pub fn flag(&self, key: &str, default: bool) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            _ => default,
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

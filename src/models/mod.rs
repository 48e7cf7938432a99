use serde::{Deserialize, Serialize};
use std::fmt;

/// Site a listing was scraped from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Rightmove,
    Zoopla,
    SpareRoom,
    OnTheMarket,
    OpenRent,
}

impl Source {
    pub const ALL: [Source; 5] = [
        Source::Rightmove,
        Source::Zoopla,
        Source::SpareRoom,
        Source::OnTheMarket,
        Source::OpenRent,
    ];

    /// Name used for config keys, registry keys and listing id prefixes
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Rightmove => "rightmove",
            Source::Zoopla => "zoopla",
            Source::SpareRoom => "spareroom",
            Source::OnTheMarket => "onthemarket",
            Source::OpenRent => "openrent",
        }
    }

    /// Builds a listing id that cannot collide with another site's ids
    pub fn listing_id(self, raw_id: &str) -> String {
        format!("{}-{}", self.as_str(), raw_id.trim())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const PRICE_NOT_SPECIFIED: &str = "Price not specified";

/// A rental listing normalized from one of the supported sites.
///
/// Listings live for a single run. Only their `id` outlives it, in the
/// seen-listings store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: String,
    pub title: String,
    /// Monthly rent. `None` when the site gave no price we could read.
    pub price: Option<i64>,
    pub price_text: String,
    pub address: String,
    pub bedrooms: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub link: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub source: Source,
}

impl Listing {
    /// Starts a listing with the defaults every site falls back to.
    pub fn new(source: Source, raw_id: &str) -> Self {
        Self {
            id: source.listing_id(raw_id),
            title: "Property".to_string(),
            price: None,
            price_text: PRICE_NOT_SPECIFIED.to_string(),
            address: String::new(),
            bedrooms: 1,
            description: None,
            link: String::new(),
            images: Vec::new(),
            source,
        }
    }

    /// Text the keyword filters search through
    pub fn searchable_text(&self) -> String {
        format!(
            "{} {} {}",
            self.title,
            self.address,
            self.description.as_deref().unwrap_or_default()
        )
        .to_lowercase()
    }
}

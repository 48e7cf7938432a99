//! Run configuration.
//!
//! Loaded once from a JSON file and treated as read-only for the rest of the
//! run. Every section is optional and falls back to its defaults.

use crate::error::{Result, ScanError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Ordering the user would like results in. Each adapter maps this to its own
/// query fragment, or ignores it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum SortPreference {
    #[default]
    Default,
    PriceHighToLow,
    PriceLowToHigh,
    NewestFirst,
    OldestFirst,
    LastUpdated,
}

impl SortPreference {
    pub const ALL: [SortPreference; 6] = [
        SortPreference::Default,
        SortPreference::PriceHighToLow,
        SortPreference::PriceLowToHigh,
        SortPreference::NewestFirst,
        SortPreference::OldestFirst,
        SortPreference::LastUpdated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortPreference::Default => "default",
            SortPreference::PriceHighToLow => "price_high_to_low",
            SortPreference::PriceLowToHigh => "price_low_to_high",
            SortPreference::NewestFirst => "newest_first",
            SortPreference::OldestFirst => "oldest_first",
            SortPreference::LastUpdated => "last_updated",
        }
    }
}

impl fmt::Display for SortPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortPreference {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SortPreference::ALL
            .into_iter()
            .find(|pref| pref.as_str() == s)
            .ok_or_else(|| format!("unknown sort type: {s}"))
    }
}

impl From<String> for SortPreference {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|err| {
            warn!("{err}, using default ordering");
            SortPreference::Default
        })
    }
}

/// Per-site settings under `sites.<name>`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub search_url: Option<String>,
    /// Site-specific query parameters, keyed by the site's own names
    pub params: Map<String, Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            search_url: None,
            params: Map::new(),
        }
    }
}

/// Criteria applied to every listing after dedup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub min_beds: Option<u32>,
    pub max_beds: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    pub sender: String,
    pub recipient: String,
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
}

fn default_smtp_port() -> u16 {
    465
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub email: Option<EmailSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Skip the seen-listings check so every listing is treated as new
    pub bypass_seen_check: bool,
}

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sort_type: SortPreference,
    /// Scanned in the order they appear in the file
    pub sites: IndexMap<String, SiteConfig>,
    pub filters: FilterCriteria,
    pub notifications: NotificationConfig,
    pub debug: DebugConfig,
    pub seen_listings_path: PathBuf,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sort_type: SortPreference::Default,
            sites: IndexMap::new(),
            filters: FilterCriteria::default(),
            notifications: NotificationConfig::default(),
            debug: DebugConfig::default(),
            seen_listings_path: PathBuf::from("seen_listings.json"),
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Read and parse a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading config from: {}", path.display());

        let contents = std::fs::read_to_string(path).map_err(|e| ScanError::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Config =
            serde_json::from_str(&contents).map_err(|e| ScanError::ConfigLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        debug!(
            sites = config.sites.len(),
            sort = %config.sort_type,
            "Loaded config"
        );
        Ok(config)
    }

    /// Settings for `site`, or the defaults if the file doesn't mention it
    pub fn site(&self, site: &str) -> SiteConfig {
        self.sites.get(site).cloned().unwrap_or_default()
    }
}

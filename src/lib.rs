pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod notify;
pub mod scanner;
pub mod scrapers;
pub mod store;

pub use config::{Config, FilterCriteria, SortPreference};
pub use error::{Result, ScanError};
pub use models::{Listing, Source};
pub use notify::{Delivery, Digest, MailTransport, Notifier};
pub use scanner::{FetchReport, PropertyScanner, SiteFailure};
pub use store::SeenStore;

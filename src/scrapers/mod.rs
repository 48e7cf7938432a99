pub mod embedded;
pub mod fetcher;
pub mod html;
pub mod onthemarket;
pub mod openrent;
pub mod registry;
pub mod rightmove;
pub mod spareroom;
pub mod traits;
pub mod types;
pub mod zoopla;

pub use fetcher::HttpFetcher;
pub use onthemarket::OnTheMarketAdapter;
pub use openrent::OpenRentAdapter;
pub use registry::AdapterRegistry;
pub use rightmove::RightmoveAdapter;
pub use spareroom::SpareRoomAdapter;
pub use traits::SiteAdapter;
pub use types::{ParseError, ParseOutcome, RawDocument, Strategy};
pub use zoopla::ZooplaAdapter;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SortPreference};

    fn registry(sort: SortPreference) -> AdapterRegistry {
        let config = Config {
            sort_type: sort,
            ..Config::default()
        };
        AdapterRegistry::from_config(&config).unwrap()
    }

    #[test]
    fn registers_all_sites() {
        let registry = registry(SortPreference::Default);
        assert_eq!(
            registry.names(),
            vec!["onthemarket", "openrent", "rightmove", "spareroom", "zoopla"]
        );
        assert!(registry.get("Rightmove").is_some());
        assert!(registry.get("gumtree").is_none());
    }

    #[test]
    fn newest_first_is_encoded_per_site() {
        let registry = registry(SortPreference::NewestFirst);
        let rightmove = registry.get("rightmove").unwrap();
        let spareroom = registry.get("spareroom").unwrap();

        let a = rightmove.sort_fragment(SortPreference::NewestFirst);
        let b = spareroom.sort_fragment(SortPreference::NewestFirst);
        assert_eq!(a, Some("sortType=6"));
        assert_eq!(b, Some("sort_by=days_since_placed"));
        assert_ne!(a, b);
    }

    #[test]
    fn unsupported_preferences_match_site_default() {
        let registry = registry(SortPreference::Default);
        let unsupported = [
            ("rightmove", SortPreference::LastUpdated),
            ("spareroom", SortPreference::OldestFirst),
            ("onthemarket", SortPreference::LastUpdated),
            ("openrent", SortPreference::NewestFirst),
            ("zoopla", SortPreference::PriceHighToLow),
        ];
        for (site, pref) in unsupported {
            let adapter = registry.get(site).unwrap();
            assert_eq!(
                adapter.sort_fragment(pref),
                adapter.sort_fragment(SortPreference::Default),
                "{site} {pref}"
            );
        }
    }
}

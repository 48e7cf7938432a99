use crate::config::FilterCriteria;
use crate::models::Listing;

fn within<T: PartialOrd>(value: T, min: Option<T>, max: Option<T>) -> bool {
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}

/// Whether `listing` satisfies the user's criteria.
///
/// Keyword matches are case-insensitive substrings of the title, address
/// and description. An exclude keyword rejects the listing outright. Price
/// bounds are skipped for listings whose price is unknown.
pub fn meets_criteria(listing: &Listing, filters: &FilterCriteria) -> bool {
    let text = listing.searchable_text();

    if filters
        .exclude_keywords
        .iter()
        .any(|keyword| text.contains(&keyword.to_lowercase()))
    {
        return false;
    }

    if !filters.keywords.is_empty()
        && !filters
            .keywords
            .iter()
            .any(|keyword| text.contains(&keyword.to_lowercase()))
    {
        return false;
    }

    if let Some(price) = listing.price {
        if !within(price, filters.min_price, filters.max_price) {
            return false;
        }
    }

    within(listing.bedrooms, filters.min_beds, filters.max_beds)
}

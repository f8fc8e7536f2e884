//! Client-side filtering of the fetched listing set.

pub mod types;

pub use types::{FilterCriteria, Selector};

use crate::models::Listing;
use tracing::debug;

/// Return the listings matching every active criterion, in input order.
pub fn apply_filters(listings: &[Listing], criteria: &FilterCriteria) -> Vec<Listing> {
    let filter = CompiledFilter::new(criteria);
    let filtered: Vec<Listing> = listings
        .iter()
        .filter(|listing| filter.matches(listing))
        .cloned()
        .collect();

    debug!(
        total = listings.len(),
        visible = filtered.len(),
        "Applied listing filters"
    );
    filtered
}

/// Criteria with lowercased needles and parsed bounds, built once per pass
struct CompiledFilter<'a> {
    search: Option<String>,
    city: Option<String>,
    min_price: Option<i64>,
    max_price: Option<i64>,
    criteria: &'a FilterCriteria,
}

impl<'a> CompiledFilter<'a> {
    fn new(criteria: &'a FilterCriteria) -> Self {
        let needle = |s: &str| (!s.is_empty()).then(|| s.to_lowercase());
        Self {
            search: needle(&criteria.search),
            city: needle(&criteria.city),
            min_price: parse_threshold(&criteria.min_price),
            max_price: parse_threshold(&criteria.max_price),
            criteria,
        }
    }

    fn matches(&self, listing: &Listing) -> bool {
        if let Some(search) = &self.search {
            let hit = [
                &listing.title,
                &listing.location,
                &listing.city,
                &listing.description,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(search.as_str()));
            if !hit {
                return false;
            }
        }

        if let Some(city) = &self.city {
            if !listing.city.to_lowercase().contains(city.as_str()) {
                return false;
            }
        }

        let rent = i64::from(listing.rent_price);
        if self.min_price.is_some_and(|min| rent < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| rent > max) {
            return false;
        }

        self.criteria.property_type.accepts(&listing.property_type)
            && self.criteria.tenant_preference.accepts(&listing.tenant_preference)
    }
}

/// Read a rent bound the way a lenient integer parser does.
///
/// Leading whitespace is skipped, then an optional sign and the longest run of
/// decimal digits are taken; trailing garbage is ignored. Returns `None` when
/// no digit can be read, which disables the bound.
pub fn parse_threshold(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }

    // saturate instead of failing on absurdly long inputs
    let magnitude = rest[..digits_end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PropertyType, TenantPreference};
    use chrono::{TimeZone, Utc};

    fn listing(id: &str, title: &str, city: &str, rent: u32, property_type: PropertyType) -> Listing {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Listing {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            location: String::new(),
            city: city.to_string(),
            rent_price: rent,
            property_type,
            tenant_preference: TenantPreference::Bachelor,
            image_url: None,
            owner_id: "owner".to_string(),
            owner_name: "Owner".to_string(),
            owner_contact: "000".to_string(),
            owner_email: "owner@example.com".to_string(),
            created_at: at,
            updated_at: at,
            is_available: true,
        }
    }

    fn sample() -> Vec<Listing> {
        let mut quiet = listing("4", "Quiet room", "Mumbai", 8_000, PropertyType::OneBed);
        quiet.description = "Walk to Pune highway".to_string();
        quiet.tenant_preference = TenantPreference::Family;

        let mut koregaon = listing("5", "Garden flat", "Nagpur", 12_000, PropertyType::OneBhk);
        koregaon.location = "Near PUNE station".to_string();

        vec![
            listing("1", "Spacious flat", "Pune", 15_000, PropertyType::TwoBhk),
            listing("2", "Pune studio", "Mumbai", 22_000, PropertyType::OneBhk),
            listing("3", "Big house", "Delhi", 30_000, PropertyType::ThreeBhk),
            quiet,
            koregaon,
        ]
    }

    fn ids(listings: &[Listing]) -> Vec<&str> {
        listings.iter().map(|l| l.id.as_str()).collect()
    }

    #[test]
    fn empty_criteria_is_identity() {
        let all = sample();
        let criteria = FilterCriteria::default();
        assert!(criteria.is_empty());
        assert_eq!(apply_filters(&all, &criteria), all);
    }

    #[test]
    fn price_and_city_scenario_includes_listing() {
        let all = vec![listing("1", "Flat", "Pune", 15_000, PropertyType::TwoBhk)];
        let criteria = FilterCriteria::default()
            .with_price_range("10000", "20000")
            .with_city("pune");
        assert_eq!(ids(&apply_filters(&all, &criteria)), vec!["1"]);
    }

    #[test]
    fn property_type_mismatch_excludes_listing() {
        let all = vec![listing("1", "Flat", "Pune", 15_000, PropertyType::TwoBhk)];
        let criteria = FilterCriteria::default().with_property_type(PropertyType::OneBhk);
        assert!(apply_filters(&all, &criteria).is_empty());
    }

    #[test]
    fn search_spans_title_location_city_and_description() {
        let criteria = FilterCriteria::default().with_search("pune");
        assert_eq!(ids(&apply_filters(&sample(), &criteria)), vec!["1", "2", "4", "5"]);
    }

    #[test]
    fn city_only_checks_city() {
        let criteria = FilterCriteria::default().with_city("PUN");
        assert_eq!(ids(&apply_filters(&sample(), &criteria)), vec!["1"]);
    }

    #[test]
    fn tenant_preference_selector() {
        let criteria = FilterCriteria::default().with_tenant_preference(TenantPreference::Family);
        assert_eq!(ids(&apply_filters(&sample(), &criteria)), vec!["4"]);
    }

    #[test]
    fn bounds_are_inclusive() {
        let criteria = FilterCriteria::default().with_price_range("12000", "22000");
        assert_eq!(ids(&apply_filters(&sample(), &criteria)), vec!["1", "2", "5"]);
    }

    #[test]
    fn malformed_bounds_are_ignored() {
        let criteria = FilterCriteria::default().with_price_range("abc", "  ");
        assert_eq!(apply_filters(&sample(), &criteria).len(), sample().len());
    }

    fn criteria_table() -> Vec<FilterCriteria> {
        vec![
            FilterCriteria::default(),
            FilterCriteria::default().with_search("a").with_price_range("9000", ""),
            FilterCriteria::default().with_search("PUNE"),
            FilterCriteria::default().with_city("mum"),
            FilterCriteria::default().with_price_range("", "15000"),
            FilterCriteria::default().with_price_range("oops", "20000"),
            FilterCriteria::default().with_price_range("30000", "8000"),
            FilterCriteria::default().with_property_type(PropertyType::OneBhk),
            FilterCriteria::default().with_tenant_preference(TenantPreference::Bachelor),
            FilterCriteria::default()
                .with_city("pune")
                .with_property_type(PropertyType::TwoBhk)
                .with_tenant_preference(TenantPreference::Bachelor)
                .with_price_range("10000", "20000"),
            FilterCriteria::default().with_search("no such room"),
        ]
    }

    #[test]
    fn result_is_subset_of_input() {
        let all = sample();
        for criteria in criteria_table() {
            for kept in apply_filters(&all, &criteria) {
                assert!(all.contains(&kept), "{} not in input for {:?}", kept.id, criteria);
            }
        }
    }

    #[test]
    fn filtering_is_idempotent() {
        let all = sample();
        for criteria in criteria_table() {
            let once = apply_filters(&all, &criteria);
            assert_eq!(apply_filters(&once, &criteria), once, "{:?}", criteria);
        }
    }

    #[test]
    fn filtering_preserves_order() {
        let mut all = sample();
        all.reverse();
        for criteria in criteria_table() {
            let mut cursor = all.iter();
            for kept in apply_filters(&all, &criteria) {
                assert!(
                    cursor.any(|l| *l == kept),
                    "{} out of order for {:?}",
                    kept.id,
                    criteria
                );
            }
        }
    }

    #[test]
    fn threshold_parsing() {
        assert_eq!(parse_threshold("15000"), Some(15_000));
        assert_eq!(parse_threshold("  42"), Some(42));
        assert_eq!(parse_threshold("12abc"), Some(12));
        assert_eq!(parse_threshold("-5"), Some(-5));
        assert_eq!(parse_threshold("+7"), Some(7));
        assert_eq!(parse_threshold(""), None);
        assert_eq!(parse_threshold("abc"), None);
        assert_eq!(parse_threshold("-"), None);
        assert_eq!(parse_threshold("1.5e3"), Some(1));
        assert_eq!(parse_threshold("99999999999999999999999"), Some(i64::MAX));
    }

    #[test]
    fn selector_parsing() {
        assert_eq!("All".parse::<Selector<PropertyType>>().unwrap(), Selector::All);
        assert_eq!(
            "3 BHK".parse::<Selector<PropertyType>>().unwrap(),
            Selector::Only(PropertyType::ThreeBhk)
        );
        assert!("Castle".parse::<Selector<PropertyType>>().is_err());
    }
}

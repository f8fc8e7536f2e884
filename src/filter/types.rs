use crate::models::{PropertyType, TenantPreference};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Either the `All` wildcard or one specific value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector<T> {
    All,
    Only(T),
}

impl<T> Default for Selector<T> {
    fn default() -> Self {
        Selector::All
    }
}

impl<T: PartialEq> Selector<T> {
    pub fn accepts(&self, value: &T) -> bool {
        match self {
            Selector::All => true,
            Selector::Only(wanted) => wanted == value,
        }
    }
}

impl<T: FromStr> FromStr for Selector<T> {
    type Err = T::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Selector::All)
        } else {
            s.parse().map(Selector::Only)
        }
    }
}

impl<T: fmt::Display> fmt::Display for Selector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.write_str("All"),
            Selector::Only(value) => value.fmt(f),
        }
    }
}

/// Client-side filter parameters for the browse view.
///
/// Rent bounds are kept as the raw text the user typed; see
/// [`parse_threshold`](super::parse_threshold) for how they are read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Matched against title, location, city and description
    pub search: String,
    /// Matched against city only
    pub city: String,
    /// Minimum monthly rent
    pub min_price: String,
    /// Maximum monthly rent
    pub max_price: String,
    pub property_type: Selector<PropertyType>,
    pub tenant_preference: Selector<TenantPreference>,
}

impl FilterCriteria {
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = city.into();
        self
    }

    pub fn with_price_range(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.min_price = min.into();
        self.max_price = max.into();
        self
    }

    pub fn with_property_type(mut self, property_type: PropertyType) -> Self {
        self.property_type = Selector::Only(property_type);
        self
    }

    pub fn with_tenant_preference(mut self, preference: TenantPreference) -> Self {
        self.tenant_preference = Selector::Only(preference);
        self
    }

    /// True when no predicate would be applied
    pub fn is_empty(&self) -> bool {
        self.search.is_empty()
            && self.city.is_empty()
            && self.min_price.is_empty()
            && self.max_price.is_empty()
            && self.property_type == Selector::All
            && self.tenant_preference == Selector::All
    }
}

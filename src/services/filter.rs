//! Normalizes storefront query parameters into a [`ProductFilter`].
//!
//! Every key other than the fixed ones (`q`, `brand`, `category`,
//! `collection`, `gender`, `min_price`, `max_price`, `sort`, `page`, `limit`)
//! is treated as an attribute facet, so `?color=red,blue&size=m` filters on the `color` and `size`
//! attributes without any per-attribute code.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::entities::product::Gender;

pub const DEFAULT_PAGE_SIZE: u64 = 12;
pub const MAX_PAGE_SIZE: u64 = 48;
const MAX_PAGE: u64 = 10_000;

const RESERVED_KEYS: [&str; 10] = [
    "q",
    "brand",
    "category",
    "collection",
    "gender",
    "min_price",
    "max_price",
    "sort",
    "page",
    "limit",
];

/// Query keys with a fixed meaning. Attributes cannot use these names.
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Featured,
    Newest,
    PriceAsc,
    PriceDesc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "featured" => Ok(Self::Featured),
            "newest" => Ok(Self::Newest),
            "price-asc" => Ok(Self::PriceAsc),
            "price-desc" => Ok(Self::PriceDesc),
            _ => Err(format!("Unknown sort order: {s}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub brands: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub collections: BTreeSet<String>,
    pub genders: BTreeSet<Gender>,
    /// attribute name -> accepted values
    pub attributes: BTreeMap<String, BTreeSet<String>>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub sort: SortOrder,
    pub page: u64,
    pub page_size: u64,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            search: None,
            brands: BTreeSet::new(),
            categories: BTreeSet::new(),
            collections: BTreeSet::new(),
            genders: BTreeSet::new(),
            attributes: BTreeMap::new(),
            min_price: None,
            max_price: None,
            sort: SortOrder::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ProductFilter {
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut filter = Self::default();

        for (raw_key, raw_value) in pairs {
            let key = raw_key.trim().to_lowercase();
            let value = raw_value.trim();

            match key.as_str() {
                "q" => {
                    filter.search = Some(value.to_owned()).filter(|v| !v.is_empty());
                }
                "brand" => filter.brands.extend(split_values(value)),
                "category" => filter.categories.extend(split_values(value)),
                "collection" => filter.collections.extend(split_values(value)),
                "gender" => filter
                    .genders
                    .extend(split_values(value).filter_map(|g| g.parse::<Gender>().ok())),
                "min_price" => filter.min_price = parse_price(value),
                "max_price" => filter.max_price = parse_price(value),
                "sort" => filter.sort = value.to_lowercase().parse().unwrap_or_default(),
                "page" => {
                    filter.page = value
                        .parse::<u64>()
                        .map(|page| page.clamp(1, MAX_PAGE))
                        .unwrap_or(1);
                }
                "limit" => {
                    filter.page_size = value
                        .parse::<u64>()
                        .map(|size| size.clamp(1, MAX_PAGE_SIZE))
                        .unwrap_or(DEFAULT_PAGE_SIZE);
                }
                "" => {}
                attribute => {
                    let values: BTreeSet<String> = split_values(value).collect();
                    if !values.is_empty() {
                        filter
                            .attributes
                            .entry(attribute.to_owned())
                            .or_default()
                            .extend(values);
                    }
                }
            }
        }

        if let (Some(min), Some(max)) = (filter.min_price, filter.max_price) {
            if min > max {
                filter.min_price = Some(max);
                filter.max_price = Some(min);
            }
        }

        filter
    }

    /// True when no facet, search term, or price bound narrows the listing.
    pub fn is_unfiltered(&self) -> bool {
        self.search.is_none()
            && self.brands.is_empty()
            && self.categories.is_empty()
            && self.collections.is_empty()
            && self.genders.is_empty()
            && self.attributes.is_empty()
            && self.min_price.is_none()
            && self.max_price.is_none()
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }
}

fn split_values(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',')
        .map(|part| part.trim().to_lowercase())
        .filter(|part| !part.is_empty())
}

fn parse_price(raw: &str) -> Option<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price >= 0.0)
}

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A purchasable variant with its attribute values keyed by attribute name.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VariantView {
    pub id: i32,
    pub sku: String,
    pub price: f64,
    pub sale_price: Option<f64>,
    pub in_stock: bool,
    pub attributes: BTreeMap<String, String>,
}

impl VariantView {
    pub fn effective_price(&self) -> f64 {
        self.sale_price.unwrap_or(self.price)
    }

    fn matches_except(&self, selection: &BTreeMap<String, String>, skip: &str) -> bool {
        selection
            .iter()
            .filter(|(name, _)| name.as_str() != skip)
            .all(|(name, value)| self.attributes.get(name) == Some(value))
    }
}

/// The variant whose attributes are exactly the selection, if any.
pub fn resolve_variant<'a>(
    variants: &'a [VariantView],
    selection: &BTreeMap<String, String>,
) -> Option<&'a VariantView> {
    variants.iter().find(|variant| variant.attributes == *selection)
}

/// For each attribute, the values that still reach an in-stock variant when
/// combined with the other selected attributes.
pub fn selectable_values(
    variants: &[VariantView],
    selection: &BTreeMap<String, String>,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut selectable: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for variant in variants.iter().filter(|v| v.in_stock) {
        for (name, value) in &variant.attributes {
            if variant.matches_except(selection, name) {
                selectable
                    .entry(name.clone())
                    .or_default()
                    .insert(value.clone());
            }
        }
    }

    selectable
}

/// Every value of every attribute across the variants, in stock or not.
pub fn attribute_options(variants: &[VariantView]) -> BTreeMap<String, BTreeSet<String>> {
    let mut options: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for variant in variants {
        for (name, value) in &variant.attributes {
            options.entry(name.clone()).or_default().insert(value.clone());
        }
    }
    options
}

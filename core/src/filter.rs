use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::catalog::CatalogRecord;
use crate::facets::{Facets, GpuFamilyTable};
use crate::text::{contains_folded, fold, leading_number};

/// Inclusive price bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn new(min: f64, max: f64) -> Self { Self { min, max } }

    /// An inverted range never matches; it does not panic.
    pub fn contains(&self, price: f64) -> bool { price >= self.min && price <= self.max }

    pub fn is_well_formed(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min >= 0.0 && self.min <= self.max
    }
}

/// Inclusion constraints. An empty set (or `None` price) leaves that dimension
/// unconstrained; dimensions are ANDed, values within one dimension ORed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub price: Option<PriceRange>,
    /// Exact, case-sensitive brand names.
    pub brands: BTreeSet<String>,
    /// Inch buckets; `15` admits sizes in `[15, 16)`.
    pub display_sizes: BTreeSet<u32>,
    /// Case-insensitive substrings of the GPU text.
    pub gpus: BTreeSet<String>,
}

impl FilterCriteria {
    pub fn new() -> Self { Self::default() }

    /// Default controls for a catalog: price bounded by the observed range, nothing else set.
    pub fn seeded_from(facets: &Facets) -> Self {
        Self { price: facets.price.map(|b| PriceRange::new(b.min, b.max)), ..Self::default() }
    }

    pub fn with_price(mut self, min: f64, max: f64) -> Self {
        self.price = Some(PriceRange::new(min, max));
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brands.insert(brand.into());
        self
    }

    pub fn with_display_size(mut self, inches: u32) -> Self {
        self.display_sizes.insert(inches);
        self
    }

    pub fn with_gpu(mut self, token: impl Into<String>) -> Self {
        self.gpus.insert(token.into());
        self
    }

    /// Admit a GPU family by its facet label. Adds the family's filter tokens,
    /// or the label itself when the table has none for it.
    pub fn with_gpu_family(mut self, table: &GpuFamilyTable, label: &str) -> Self {
        let tokens = table.filter_tokens(label);
        if tokens.is_empty() {
            self.gpus.insert(label.to_string());
        } else {
            self.gpus.extend(tokens.into_iter().map(str::to_owned));
        }
        self
    }

    pub fn is_unconstrained(&self) -> bool {
        self.price.is_none() && self.brands.is_empty() && self.display_sizes.is_empty() && self.gpus.is_empty()
    }

    pub fn matches(&self, record: &CatalogRecord) -> bool { FilterEngine::new(self).passes(record) }

    /// Records that pass, in input order.
    pub fn select<'a, I>(&self, records: I) -> Vec<&'a CatalogRecord>
    where
        I: IntoIterator<Item = &'a CatalogRecord>,
    {
        let engine = FilterEngine::new(self);
        records.into_iter().filter(|r| engine.passes(r)).collect()
    }
}

/// FilterCriteria prepared for repeated evaluation (GPU tokens folded once).
pub struct FilterEngine<'c> {
    criteria: &'c FilterCriteria,
    gpu_tokens: Vec<String>,
}

impl<'c> FilterEngine<'c> {
    pub fn new(criteria: &'c FilterCriteria) -> Self {
        let gpu_tokens = criteria.gpus.iter().map(|t| fold(t)).collect();
        Self { criteria, gpu_tokens }
    }

    pub fn passes(&self, record: &CatalogRecord) -> bool {
        self.price_ok(record) && self.brand_ok(record) && self.display_ok(record) && self.gpu_ok(record)
    }

    fn price_ok(&self, record: &CatalogRecord) -> bool {
        self.criteria.price.map_or(true, |range| range.contains(record.price))
    }

    fn brand_ok(&self, record: &CatalogRecord) -> bool {
        self.criteria.brands.is_empty() || self.criteria.brands.contains(&record.brand)
    }

    fn display_ok(&self, record: &CatalogRecord) -> bool {
        if self.criteria.display_sizes.is_empty() {
            return true;
        }
        // Unparseable display text fails this dimension only.
        let Some(size) = leading_number(&record.display) else {
            tracing::trace!(id = %record.id, display = %record.display, "display size not parseable");
            return false;
        };
        self.criteria.display_sizes.iter().any(|&bucket| {
            let lo = f64::from(bucket);
            size >= lo && size < lo + 1.0
        })
    }

    fn gpu_ok(&self, record: &CatalogRecord) -> bool {
        self.gpu_tokens.is_empty() || self.gpu_tokens.iter().any(|t| contains_folded(&record.gpu, t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laptop() -> CatalogRecord {
        CatalogRecord::new("x", "Lenovo", 1200.0)
            .with_display("14.5\" 2.8K OLED")
            .with_gpu("NVIDIA GeForce RTX 4060 Laptop GPU")
    }

    #[test]
    fn empty_criteria_admit_everything() {
        assert!(FilterCriteria::new().is_unconstrained());
        assert!(FilterCriteria::new().matches(&laptop()));
        assert!(FilterCriteria::new().matches(&CatalogRecord::new("bare", "", 0.0)));
    }

    #[test]
    fn price_bounds_are_inclusive() {
        assert!(FilterCriteria::new().with_price(1200.0, 1200.0).matches(&laptop()));
        assert!(!FilterCriteria::new().with_price(0.0, 1199.99).matches(&laptop()));
        assert!(!FilterCriteria::new().with_price(1300.0, 1100.0).matches(&laptop()));
    }

    #[test]
    fn brand_is_exact_and_case_sensitive() {
        assert!(FilterCriteria::new().with_brand("Dell").with_brand("Lenovo").matches(&laptop()));
        assert!(!FilterCriteria::new().with_brand("lenovo").matches(&laptop()));
    }

    #[test]
    fn display_bucket_is_half_open() {
        assert!(FilterCriteria::new().with_display_size(14).matches(&laptop()));
        assert!(!FilterCriteria::new().with_display_size(15).matches(&laptop()));
        let fifteen = laptop().with_display("15\"");
        assert!(FilterCriteria::new().with_display_size(15).matches(&fifteen));
        assert!(!FilterCriteria::new().with_display_size(14).matches(&fifteen));
    }

    #[test]
    fn unparseable_display_only_fails_display_filter() {
        let odd = laptop().with_display("OLED, size unknown");
        assert!(!FilterCriteria::new().with_display_size(14).matches(&odd));
        assert!(FilterCriteria::new().with_brand("Lenovo").with_gpu("rtx").matches(&odd));
    }

    #[test]
    fn gpu_tokens_match_case_insensitively() {
        assert!(FilterCriteria::new().with_gpu("rtx 40").matches(&laptop()));
        assert!(FilterCriteria::new().with_gpu("Radeon").with_gpu("GEFORCE").matches(&laptop()));
        assert!(!FilterCriteria::new().with_gpu("Iris Xe").matches(&laptop()));
    }

    #[test]
    fn gpu_family_labels_expand_to_tokens() {
        let table = GpuFamilyTable::default();
        let c = FilterCriteria::new().with_gpu_family(&table, "RTX 40-series");
        assert!(c.gpus.contains("rtx 40"));
        assert!(c.matches(&laptop()));
        let integrated = FilterCriteria::new().with_gpu_family(&table, "Integrated");
        assert!(!integrated.matches(&laptop()));
        assert!(integrated.matches(&laptop().with_gpu("AMD Radeon 780M")));
        let unknown = FilterCriteria::new().with_gpu_family(&table, "GeForce");
        assert!(unknown.matches(&laptop()));
    }

    #[test]
    fn dimensions_are_anded() {
        let c = FilterCriteria::new().with_brand("Lenovo").with_gpu("Iris");
        assert!(!c.matches(&laptop()));
    }
}

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogRecord, MAX_SCORE};

/// Observed price range of a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBounds {
    pub min: f64,
    pub max: f64,
}

impl PriceBounds {
    /// `None` for an empty catalog.
    pub fn of_catalog(catalog: &[CatalogRecord]) -> Option<Self> {
        let mut prices = catalog.iter().map(|r| r.price);
        let first = prices.next()?;
        let bounds = prices.fold(Self { min: first, max: first }, |b, p| Self { min: b.min.min(p), max: b.max.max(p) });
        Some(bounds)
    }

    /// Widen outward to whole hundreds, so every observed price stays inside.
    pub fn rounded_to_hundreds(self) -> Self {
        Self { min: (self.min / 100.0).floor() * 100.0, max: (self.max / 100.0).ceil() * 100.0 }
    }

    pub fn is_degenerate(&self) -> bool { self.max == self.min }
}

/// Maps absolute price to a 0..=10 value score relative to the current catalog; cheaper scores higher.
#[derive(Debug, Clone, Copy)]
pub struct PriceNormalizer {
    // None when the catalog is empty or every price is equal.
    bounds: Option<PriceBounds>,
}

impl PriceNormalizer {
    pub fn new(catalog: &[CatalogRecord], round_bounds: bool) -> Self {
        let bounds = PriceBounds::of_catalog(catalog)
            .filter(|b| !b.is_degenerate())
            .map(|b| if round_bounds { b.rounded_to_hundreds() } else { b });
        Self { bounds }
    }

    pub fn bounds(&self) -> Option<PriceBounds> { self.bounds }

    pub fn score(&self, price: f64) -> f64 {
        match self.bounds {
            Some(b) => MAX_SCORE - ((price - b.min) / (b.max - b.min)) * MAX_SCORE,
            None => MAX_SCORE,
        }
    }
}

/// One-shot form: normalize `price` against `catalog` without rounding.
pub fn normalized_price(catalog: &[CatalogRecord], price: f64) -> f64 {
    PriceNormalizer::new(catalog, false).score(price)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(prices: &[f64]) -> Vec<CatalogRecord> {
        prices.iter().enumerate().map(|(i, p)| CatalogRecord::new(format!("r{i}"), "Acme", *p)).collect()
    }

    #[test]
    fn cheapest_scores_ten_dearest_zero() {
        let c = catalog(&[1000.0, 1500.0, 2000.0]);
        let n = PriceNormalizer::new(&c, false);
        assert_eq!(n.score(1000.0), 10.0);
        assert_eq!(n.score(1500.0), 5.0);
        assert_eq!(n.score(2000.0), 0.0);
    }

    #[test]
    fn uniform_and_single_catalogs_score_ten() {
        assert_eq!(normalized_price(&catalog(&[1234.0]), 1234.0), 10.0);
        let c = catalog(&[1050.0, 1050.0]);
        assert_eq!(PriceNormalizer::new(&c, true).score(1050.0), 10.0);
    }

    #[test]
    fn rounding_widens_bounds() {
        let c = catalog(&[1049.0, 1951.0]);
        let n = PriceNormalizer::new(&c, true);
        assert_eq!(n.bounds(), Some(PriceBounds { min: 1000.0, max: 2000.0 }));
        assert!((n.score(1049.0) - 9.51).abs() < 1e-9);
        assert!(n.score(1951.0) > 0.0);
    }

    #[test]
    fn scores_stay_in_range() {
        let c = catalog(&[0.0, 349.99, 799.0, 1299.5, 4999.0]);
        for round in [false, true] {
            let n = PriceNormalizer::new(&c, round);
            for r in &c {
                let s = n.score(r.price);
                assert!((0.0..=10.0).contains(&s), "{s} out of range");
            }
        }
    }
}

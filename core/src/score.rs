use crate::catalog::{Category, Scores};
use crate::weights::WeightVector;

/// Weight-normalized aggregate of category scores and, optionally, price desirability.
///
/// ```text
/// weighted_score = Σ score(c) · w(c) [+ price_score · w(price)]
///                  ─────────────────────────────────────────────
///                            Σ w(c) [+ w(price)]
/// ```
///
/// A missing category score counts as 0. A zero total weight yields 0.
/// The result is not clamped.
#[derive(Debug, Clone, Copy)]
pub struct WeightedScorer<'w> {
    weights: &'w WeightVector,
    price_weight: Option<f64>,
}

impl<'w> WeightedScorer<'w> {
    /// `include_price = false` ignores any price weight in `weights`.
    pub fn new(weights: &'w WeightVector, include_price: bool) -> Self {
        let price_weight = if include_price { weights.price } else { None };
        Self { weights, price_weight }
    }

    pub fn total_weight(&self) -> f64 {
        Category::ALL.iter().map(|&c| self.weights.get(c)).sum::<f64>() + self.price_weight.unwrap_or(0.0)
    }

    pub fn score(&self, scores: &Scores, price_score: f64) -> f64 {
        let mut total = 0.0;
        let mut total_weight = 0.0;
        for category in Category::ALL {
            let w = self.weights.get(category);
            total += scores.get(category).unwrap_or(0.0) * w;
            total_weight += w;
        }
        if let Some(w) = self.price_weight {
            total += price_score * w;
            total_weight += w;
        }
        if total_weight > 0.0 { total / total_weight } else { 0.0 }
    }
}

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogRecord;
use crate::facets::{FacetExtractor, Facets, GpuFamilyTable};
use crate::filter::{FilterCriteria, FilterEngine};
use crate::normalize::PriceNormalizer;
use crate::score::WeightedScorer;
use crate::weights::WeightVector;

/// Switches for the two scoring behaviours that vary between deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingOptions {
    /// Score price as a weighted dimension when the weight vector carries a price weight.
    pub include_price: bool,
    /// Widen catalog price bounds to whole hundreds before normalizing.
    pub round_price_bounds: bool,
}

impl Default for RankingOptions {
    fn default() -> Self { Self { include_price: true, round_price_bounds: false } }
}

/// A record that passed the filters, with its derived scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord<'a> {
    #[serde(flatten)]
    pub record: &'a CatalogRecord,
    pub price_score: f64,
    pub weighted_score: f64,
}

/// Catalog + weights + filters → filtered records, best first.
///
/// Holds configuration only; every call recomputes from its inputs.
#[derive(Debug, Clone, Default)]
pub struct RankingPipeline {
    options: RankingOptions,
    gpu_families: GpuFamilyTable,
}

impl RankingPipeline {
    pub fn new(options: RankingOptions) -> Self {
        Self { options, gpu_families: GpuFamilyTable::default() }
    }

    pub fn with_gpu_families(mut self, table: GpuFamilyTable) -> Self {
        self.gpu_families = table;
        self
    }

    pub fn options(&self) -> RankingOptions { self.options }

    /// Normalizes price over the whole catalog, scores every record, drops the
    /// ones `filters` rejects, then sorts by `weighted_score` descending.
    /// Equal scores keep their catalog order.
    pub fn rank<'a>(&self, catalog: &'a [CatalogRecord], weights: &WeightVector, filters: &FilterCriteria) -> Vec<ScoredRecord<'a>> {
        let normalizer = PriceNormalizer::new(catalog, self.options.round_price_bounds);
        let scorer = WeightedScorer::new(weights, self.options.include_price);
        let engine = FilterEngine::new(filters);

        let mut ranked: Vec<ScoredRecord<'a>> = catalog
            .iter()
            .map(|record| {
                let price_score = normalizer.score(record.price);
                let weighted_score = scorer.score(&record.scores, price_score);
                ScoredRecord { record, price_score, weighted_score }
            })
            .filter(|scored| engine.passes(scored.record))
            .collect();

        // stable
        ranked.sort_by(|a, b| b.weighted_score.total_cmp(&a.weighted_score));

        tracing::debug!(catalog = catalog.len(), matched = ranked.len(), total_weight = scorer.total_weight(), "ranked catalog");
        ranked
    }

    pub fn facets(&self, catalog: &[CatalogRecord]) -> Facets {
        FacetExtractor::new(&self.gpu_families, self.options.round_price_bounds).extract(catalog)
    }
}

/// [`RankingPipeline::rank`] with default options.
pub fn rank<'a>(catalog: &'a [CatalogRecord], weights: &WeightVector, filters: &FilterCriteria) -> Vec<ScoredRecord<'a>> {
    RankingPipeline::default().rank(catalog, weights, filters)
}

/// Facets with the default GPU family table and unrounded price bounds.
pub fn extract_facets(catalog: &[CatalogRecord]) -> Facets {
    RankingPipeline::default().facets(catalog)
}

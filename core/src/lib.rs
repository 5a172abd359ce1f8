//! Scoring, filtering and ranking of a product catalog against user weights.
//!
//! Everything except [`persist`] is a pure function of its arguments.

pub mod catalog;
pub mod facets;
pub mod filter;
pub mod normalize;
pub mod persist;
pub mod pipeline;
pub mod score;
pub mod text;
pub mod weights;

pub use catalog::{CatalogRecord, Category, Scores};
pub use facets::{FacetExtractor, Facets, GpuFamilyTable};
pub use filter::{FilterCriteria, FilterEngine, PriceRange};
pub use normalize::{PriceBounds, PriceNormalizer};
pub use pipeline::{extract_facets, rank, RankingOptions, RankingPipeline, ScoredRecord};
pub use score::WeightedScorer;
pub use weights::{Preference, WeightVector};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::Category;
use crate::filter::PriceRange;

pub const NEUTRAL_WEIGHT: f64 = 5.0;
pub const MAX_WEIGHT: f64 = 10.0;

fn neutral() -> f64 { NEUTRAL_WEIGHT }

/// Importance of each scoring category, each in [0, 10].
///
/// `price` is optional: with no price weight, price is only ever a hard filter
/// and never contributes to the weighted score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    #[serde(default = "neutral")]
    pub performance: f64,
    #[serde(default = "neutral")]
    pub battery: f64,
    #[serde(default = "neutral")]
    pub build_quality: f64,
    #[serde(default = "neutral")]
    pub display: f64,
    #[serde(default = "neutral")]
    pub audio: f64,
    #[serde(default = "neutral")]
    pub portability: f64,
    #[serde(default)]
    pub price: Option<f64>,
}

impl Default for WeightVector {
    fn default() -> Self { Self::neutral() }
}

impl WeightVector {
    /// Every weight at 5, price included.
    pub fn neutral() -> Self {
        Self::uniform(NEUTRAL_WEIGHT, Some(NEUTRAL_WEIGHT))
    }

    pub fn uniform(weight: f64, price: Option<f64>) -> Self {
        Self {
            performance: weight,
            battery: weight,
            build_quality: weight,
            display: weight,
            audio: weight,
            portability: weight,
            price,
        }
    }

    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Performance => self.performance,
            Category::Battery => self.battery,
            Category::BuildQuality => self.build_quality,
            Category::Display => self.display,
            Category::Audio => self.audio,
            Category::Portability => self.portability,
        }
    }

    pub fn set(&mut self, category: Category, weight: f64) {
        let slot = match category {
            Category::Performance => &mut self.performance,
            Category::Battery => &mut self.battery,
            Category::BuildQuality => &mut self.build_quality,
            Category::Display => &mut self.display,
            Category::Audio => &mut self.audio,
            Category::Portability => &mut self.portability,
        };
        *slot = weight;
    }

    pub fn with(mut self, category: Category, weight: f64) -> Self {
        self.set(category, weight);
        self
    }

    pub fn with_price(mut self, price: Option<f64>) -> Self {
        self.price = price;
        self
    }

    /// Set a weight by name; `"price"` addresses the price weight.
    pub fn set_named(&mut self, name: &str, weight: f64) -> Result<()> {
        if name == "price" {
            self.price = Some(weight);
        } else if let Some(category) = Category::parse(name) {
            self.set(category, weight);
        } else {
            bail!("unknown weight category: {name}");
        }
        Ok(())
    }

    /// Hard range check for callers that reject rather than substitute.
    pub fn validate(&self) -> Result<()> {
        for category in Category::ALL {
            check_weight(category.as_str(), self.get(category))?;
        }
        if let Some(price) = self.price {
            check_weight("price", price)?;
        }
        Ok(())
    }
}

fn check_weight(name: &str, weight: f64) -> Result<()> {
    if !in_range(weight) {
        bail!("weight {name}={weight} outside [0, 10]");
    }
    Ok(())
}

fn in_range(weight: f64) -> bool { (0.0..=MAX_WEIGHT).contains(&weight) }

/// Sanitized output of the free-text preference inference: weights plus an optional price range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preference {
    pub weights: WeightVector,
    pub price_range: Option<PriceRange>,
}

impl Preference {
    /// Build from an untrusted inference payload. Every missing, non-numeric
    /// or out-of-range weight becomes the neutral default; a bad price range is dropped.
    pub fn from_inference(payload: &Value) -> Self {
        let mut weights = WeightVector::neutral();
        let Some(obj) = payload.as_object() else {
            tracing::warn!("preference payload is not an object, using neutral weights");
            return Self { weights, price_range: None };
        };

        for category in Category::ALL {
            if let Some(w) = sanitized_weight(obj.get(category.as_str()), category.as_str()) {
                weights.set(category, w);
            }
        }
        if let Some(w) = sanitized_weight(obj.get("price"), "price") {
            weights.price = Some(w);
        }

        let price_range = obj.get("price_range").and_then(|v| {
            let range = serde_json::from_value::<PriceRange>(v.clone()).ok().filter(PriceRange::is_well_formed);
            if range.is_none() {
                tracing::warn!(value = %v, "ignoring invalid price_range");
            }
            range
        });

        Self { weights, price_range }
    }
}

fn sanitized_weight(value: Option<&Value>, name: &str) -> Option<f64> {
    let value = value?;
    match value.as_f64() {
        Some(w) if in_range(w) => Some(w),
        _ => {
            tracing::warn!(weight = name, %value, "invalid or out-of-range weight, using default");
            None
        }
    }
}

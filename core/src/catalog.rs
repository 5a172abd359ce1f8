use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const MAX_SCORE: f64 = 10.0;

/// Scored attribute of a catalog record. `ALL` fixes the summation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Performance,
    Battery,
    BuildQuality,
    Display,
    Audio,
    Portability,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Performance,
        Category::Battery,
        Category::BuildQuality,
        Category::Display,
        Category::Audio,
        Category::Portability,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Performance => "performance",
            Category::Battery => "battery",
            Category::BuildQuality => "build_quality",
            Category::Display => "display",
            Category::Audio => "audio",
            Category::Portability => "portability",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    #[serde(default)]
    pub performance: Option<f64>,
    #[serde(default)]
    pub battery: Option<f64>,
    #[serde(default)]
    pub build_quality: Option<f64>,
    #[serde(default)]
    pub display: Option<f64>,
    #[serde(default)]
    pub audio: Option<f64>,
    #[serde(default)]
    pub portability: Option<f64>,
}

impl Scores {
    pub fn get(&self, category: Category) -> Option<f64> {
        match category {
            Category::Performance => self.performance,
            Category::Battery => self.battery,
            Category::BuildQuality => self.build_quality,
            Category::Display => self.display,
            Category::Audio => self.audio,
            Category::Portability => self.portability,
        }
    }

    pub fn set(&mut self, category: Category, value: f64) {
        let slot = match category {
            Category::Performance => &mut self.performance,
            Category::Battery => &mut self.battery,
            Category::BuildQuality => &mut self.build_quality,
            Category::Display => &mut self.display,
            Category::Audio => &mut self.audio,
            Category::Portability => &mut self.portability,
        };
        *slot = Some(value);
    }
}

/// One product in the catalog. Free-text hardware fields are carried for display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub brand: String,
    pub price: f64,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub gpu: String,
    #[serde(default)]
    pub ram: String,
    #[serde(default)]
    pub storage: String,
    /// Display description, e.g. `15.6" OLED 2880x1620`. The leading number is the size in inches.
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub battery: String,
    #[serde(default)]
    pub build: String,
    #[serde(default)]
    pub audio: String,
    #[serde(default)]
    pub ports: String,
    #[serde(default)]
    pub scores: Scores,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_updated: Option<OffsetDateTime>,
}

impl CatalogRecord {
    pub fn new(id: impl Into<String>, brand: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            brand: brand.into(),
            price,
            release_date: String::new(),
            image_urls: Vec::new(),
            cpu: String::new(),
            gpu: String::new(),
            ram: String::new(),
            storage: String::new(),
            display: String::new(),
            battery: String::new(),
            build: String::new(),
            audio: String::new(),
            ports: String::new(),
            scores: Scores::default(),
            last_updated: None,
        }
    }

    pub fn with_score(mut self, category: Category, value: f64) -> Self {
        self.scores.set(category, value);
        self
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = display.into();
        self
    }

    pub fn with_gpu(mut self, gpu: impl Into<String>) -> Self {
        self.gpu = gpu.into();
        self
    }

    /// Checks the documented ranges: non-negative finite price, scores in [0,10].
    pub fn validate(&self) -> Result<()> {
        if !self.price.is_finite() || self.price < 0.0 {
            bail!("record {}: price {} is not a non-negative number", self.id, self.price);
        }
        for category in Category::ALL {
            if let Some(score) = self.scores.get(category) {
                if !(0.0..=MAX_SCORE).contains(&score) {
                    bail!("record {}: {} score {} outside [0, 10]", self.id, category.as_str(), score);
                }
            }
        }
        Ok(())
    }
}

/// Timestamp shapes a record store may hand back: RFC 3339 text or a `{seconds, nanoseconds}` object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Text(String),
    Server {
        #[serde(alias = "_seconds")]
        seconds: i64,
        #[serde(default, alias = "_nanoseconds")]
        nanoseconds: u32,
    },
}

impl RawTimestamp {
    pub fn to_datetime(&self) -> Option<OffsetDateTime> {
        match self {
            RawTimestamp::Text(s) => OffsetDateTime::parse(s, &Rfc3339).ok(),
            RawTimestamp::Server { seconds, nanoseconds } => {
                let nanos = i128::from(*seconds) * 1_000_000_000 + i128::from(*nanoseconds);
                OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
            }
        }
    }
}

/// Converts one stored JSON object into a record. A missing or unreadable
/// `last_updated` becomes `ingested_at`.
pub fn record_from_json(mut value: Value, ingested_at: OffsetDateTime) -> Result<CatalogRecord> {
    let raw_ts = value.as_object_mut().and_then(|obj| obj.remove("last_updated"));
    let mut record: CatalogRecord = serde_json::from_value(value).context("malformed catalog record")?;
    let parsed = raw_ts
        .and_then(|v| serde_json::from_value::<RawTimestamp>(v).ok())
        .and_then(|ts| ts.to_datetime());
    if parsed.is_none() {
        tracing::debug!(id = %record.id, "no usable last_updated, using ingestion time");
    }
    record.last_updated = Some(parsed.unwrap_or(ingested_at));
    record.validate()?;
    Ok(record)
}

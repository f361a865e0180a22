use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// City + colonia pair identifying one query scope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionKey {
    pub city: String,
    pub colonia: String,
}

impl RegionKey {
    pub fn new(city: impl Into<String>, colonia: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            colonia: colonia.into(),
        }
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.city, self.colonia)
    }
}

/// A region to sweep, with the prior sample density used to order visits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Region {
    pub key: RegionKey,
    /// Largest `n_samples` seen on any panpoint row for this region
    pub n_samples: u64,
    /// Sum of `n_samples` across all panpoint rows for this region
    pub density: u64,
}

/// One observed property card.
///
/// Serialized field names match the results CSV columns so snapshot lines
/// and output rows can be compared directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub listing_id: String,
    pub url: String,
    #[serde(rename = "titulo")]
    pub title: Option<String>,
    #[serde(rename = "precio_noche")]
    pub price_per_night_text: Option<String>,
    #[serde(rename = "precio_noche_mxn")]
    pub price_per_night_amount: Option<u64>,
    #[serde(rename = "precio_total_aprox")]
    pub approx_total_price_text: Option<String>,
    #[serde(rename = "precio_total_aprox_mxn")]
    pub approx_total_price_amount: Option<u64>,
    pub rating: Option<f64>,
    #[serde(rename = "reviews")]
    pub review_count: Option<u32>,
    #[serde(rename = "tipo_lugar")]
    pub place_type: Option<String>,
    #[serde(rename = "superhost")]
    pub is_superhost: bool,
    #[serde(rename = "ubicacion")]
    pub location_text: Option<String>,
    /// Attached by the sweep, never by the extractor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<RegionKey>,
}

impl ListingRecord {
    /// A card is worth keeping when it yielded a title or a nightly price
    pub fn is_useful(&self) -> bool {
        self.title.is_some() || self.price_per_night_text.is_some()
    }
}

/// Emitted once per region after it has been processed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoverageEvent {
    pub city: String,
    pub colonia: String,
    pub new_ids: usize,
    pub total_ids: usize,
    pub elapsed_s: f64,
}

/// Per-region aggregate computed at the end of a sweep
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryRow {
    pub city: String,
    pub colonia: String,
    pub n_samples: u64,
    pub new_ids: usize,
    pub pct_total_ids: f64,
    pub elapsed_s: f64,
    pub price_avg_mxn: Option<f64>,
    pub price_median_mxn: Option<u64>,
    pub price_min_mxn: Option<u64>,
    pub price_max_mxn: Option<u64>,
    pub rating_avg: Option<f64>,
    pub reviews_median: Option<u32>,
}

/// Raw card markup plus what was extracted from it, kept for offline
/// re-validation of the extraction strategies
#[derive(Debug, Serialize)]
pub struct SnapshotRecord<'a> {
    pub listing_id: &'a str,
    pub html: &'a str,
    pub extracted_data: &'a ListingRecord,
    pub captured_at: DateTime<Utc>,
    #[serde(flatten)]
    pub context: &'a BTreeMap<String, String>,
}

use crate::models::{ListingRecord, Region, SummaryRow};

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn mean_u64(values: &[u64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<u64>() as f64 / values.len() as f64)
}

pub fn mean_f64(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Upper median: the element at `len / 2` after sorting
pub fn median<T: Ord + Copy>(values: &[T]) -> Option<T> {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted.get(sorted.len() / 2).copied()
}

/// Statistics gathered for one region while merging its records
#[derive(Debug, Clone)]
pub struct RegionStats {
    pub region: Region,
    pub new_ids: usize,
    pub elapsed_s: f64,
    pub prices: Vec<u64>,
    pub ratings: Vec<f64>,
    pub reviews: Vec<u32>,
}

impl RegionStats {
    pub fn new(region: Region) -> Self {
        Self {
            region,
            new_ids: 0,
            elapsed_s: 0.0,
            prices: Vec::new(),
            ratings: Vec::new(),
            reviews: Vec::new(),
        }
    }

    /// Account for a first-seen record attributed to this region
    pub fn observe(&mut self, record: &ListingRecord) {
        self.new_ids += 1;
        if let Some(price) = record.price_per_night_amount.filter(|p| *p > 0) {
            self.prices.push(price);
        }
        if let Some(rating) = record.rating.filter(|r| *r > 0.0) {
            self.ratings.push(rating);
        }
        if let Some(reviews) = record.review_count {
            self.reviews.push(reviews);
        }
    }

    /// Summary row; `total_ids` is the number of unique ids gathered in the run
    pub fn summarize(&self, total_ids: usize) -> SummaryRow {
        let total = total_ids.max(1) as f64;
        SummaryRow {
            city: self.region.key.city.clone(),
            colonia: self.region.key.colonia.clone(),
            n_samples: self.region.n_samples,
            new_ids: self.new_ids,
            pct_total_ids: round2(100.0 * self.new_ids as f64 / total),
            elapsed_s: round2(self.elapsed_s),
            price_avg_mxn: mean_u64(&self.prices).map(round2),
            price_median_mxn: median(&self.prices),
            price_min_mxn: self.prices.iter().min().copied(),
            price_max_mxn: self.prices.iter().max().copied(),
            rating_avg: mean_f64(&self.ratings).map(round2),
            reviews_median: median(&self.reviews),
        }
    }
}

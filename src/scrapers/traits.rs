use crate::models::ListingRecord;
use crate::scrapers::types::{ConsentControl, Pause, WaitUntil};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// The live search-results page as seen by the collector.
///
/// Headless Chrome implements this in production; tests script it.
#[async_trait]
pub trait SearchPage: Send {
    /// Load `url`, failing if `wait` is not satisfied within `timeout`
    async fn navigate(&mut self, url: &str, wait: WaitUntil, timeout: Duration) -> Result<()>;

    /// Click the control if present. `Ok(false)` means it was not on the page.
    async fn click_consent(&mut self, control: ConsentControl) -> Result<bool>;

    /// Scroll by at most one viewport, bounded by the remaining document height
    async fn scroll_step(&mut self) -> Result<()>;

    /// Number of elements currently matching `selector`
    async fn count_matching(&mut self, selector: &str) -> Result<usize>;

    /// Current serialized DOM
    async fn content(&mut self) -> Result<String>;
}

/// Source of the deliberate idle time between page interactions
#[async_trait]
pub trait Pacer: Send {
    async fn pause(&mut self, pause: Pause);
}

/// Everything the sweep needs from a page visit: records for one search URL.
///
/// `context` is attached to any snapshot lines written along the way.
#[async_trait]
pub trait RegionCollector: Send {
    async fn collect(
        &mut self,
        url: &str,
        context: &BTreeMap<String, String>,
    ) -> Result<Vec<ListingRecord>>;
}

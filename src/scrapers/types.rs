use crate::models::RegionKey;
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Query parameters shared by every region of a sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Marketplace origin, also used to absolutize relative card links
    pub base_url: String,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub adults: u32,
    /// Appended to the colonia in the free-text query
    pub state: String,
    /// Panpoint city code -> city path segment
    pub city_slugs: BTreeMap<String, String>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            base_url: "https://www.airbnb.mx".to_string(),
            checkin: NaiveDate::from_ymd_opt(2025, 9, 12).unwrap_or_default(),
            checkout: NaiveDate::from_ymd_opt(2025, 9, 16).unwrap_or_default(),
            adults: 2,
            state: "Jalisco".to_string(),
            city_slugs: BTreeMap::from([
                ("gdl".to_string(), "Guadalajara".to_string()),
                ("zap".to_string(), "Zapopan".to_string()),
            ]),
        }
    }
}

impl SearchParams {
    /// City path segment for a panpoint city code; unknown codes pass through
    pub fn city_slug<'a>(&'a self, city: &'a str) -> &'a str {
        self.city_slugs.get(city).map(String::as_str).unwrap_or(city)
    }

    /// Search results URL for one region
    pub fn search_url(&self, region: &RegionKey) -> Result<String> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid base URL {}", self.base_url))?;

        url.path_segments_mut()
            .map_err(|_| anyhow!("Base URL {} cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(["s", self.city_slug(&region.city), "homes"]);

        url.query_pairs_mut()
            .append_pair("refinement_paths[]", "/homes")
            .append_pair("search_mode", "regular_search")
            .append_pair("checkin", &self.checkin.format("%Y-%m-%d").to_string())
            .append_pair("checkout", &self.checkout.format("%Y-%m-%d").to_string())
            .append_pair("adults", &self.adults.to_string())
            .append_pair("query", &format!("{}, {}", region.colonia, self.state));

        Ok(url.into())
    }
}

/// Limits applied to a single page visit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectOptions {
    pub max_scroll_rounds: usize,
    /// Consecutive no-growth scroll rounds tolerated before stopping
    pub patience: usize,
    pub max_listings: usize,
    /// Strict navigation attempts before falling back to a looser wait
    pub nav_retries: u32,
    pub nav_timeout: Duration,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            max_scroll_rounds: 8,
            patience: 3,
            max_listings: 500,
            nav_retries: 3,
            nav_timeout: Duration::from_secs(60),
        }
    }
}

/// How long navigation waits before the page counts as loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// Full load plus listing anchors present
    NetworkIdle,
    /// Document parsed; content may still be arriving
    DomContentLoaded,
}

/// Points in a page visit where the collector deliberately idles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    Settle,
    AfterConsent,
    ScrollRound,
}

/// A consent-banner control, either by visible label or by CSS selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentControl {
    ButtonLabel(&'static str),
    Css(&'static str),
}

pub const CONSENT_CONTROLS: &[ConsentControl] = &[
    ConsentControl::ButtonLabel("Aceptar"),
    ConsentControl::ButtonLabel("Acepto"),
    ConsentControl::ButtonLabel("Accept"),
    ConsentControl::ButtonLabel("OK"),
    ConsentControl::Css(r#"button[data-testid="accept-btn"]"#),
    ConsentControl::Css(".cookie-banner button"),
];

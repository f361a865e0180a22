use crate::models::{ListingRecord, SnapshotRecord};
use crate::scrapers::extract::{parse_selector, FieldExtractor};
use crate::scrapers::identity::{absolute_url, listing_id};
use crate::scrapers::scroll::ScrollDriver;
use crate::scrapers::traits::{Pacer, SearchPage};
use crate::scrapers::types::{CollectOptions, Pause, WaitUntil, CONSENT_CONTROLS};
use crate::sweep::output::JsonLines;
use anyhow::{Context, Result};
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};
use url::Url;

/// Selectors whose matches are treated as candidate listing links. Results
/// are unioned in this order and de-duplicated by href.
const LISTING_SELECTORS: &[&str] = &[
    r#"a[href*="/rooms/"]:not([aria-hidden="true"])"#,
    r#"a[href*="/rooms/"]"#,
    r#"[data-testid="listing-card"] a"#,
    r#"[data-testid="property-card"] a"#,
    ".listing-card a",
    "div[data-listing-id] a",
    r#"article a[href*="/rooms/"]"#,
    r#"li a[href*="/rooms/"]"#,
];

/// Guesses for the element enclosing a listing link, most specific first
const CARD_CONTAINERS: &[&str] = &[
    r#"div[data-testid="listing-card"]"#,
    r#"div[data-testid="property-card"]"#,
    "article",
    "li",
    ".listing-card",
    "div",
];

/// One visit to a search results page:
/// navigate, dismiss consent, scroll, then extract every card.
pub struct PageCollector {
    extractor: FieldExtractor,
    listing_selectors: Vec<(&'static str, Selector)>,
    containers: Vec<Selector>,
    options: CollectOptions,
    base: Url,
}

impl PageCollector {
    pub fn new(options: CollectOptions, base_url: &str) -> Result<Self> {
        let listing_selectors = LISTING_SELECTORS
            .iter()
            .map(|css| parse_selector(css).map(|sel| (*css, sel)))
            .collect::<Result<Vec<_>>>()?;
        let containers = CARD_CONTAINERS
            .iter()
            .map(|css| parse_selector(css))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            extractor: FieldExtractor::new()?,
            listing_selectors,
            containers,
            options,
            base: Url::parse(base_url).with_context(|| format!("Invalid base URL {base_url}"))?,
        })
    }

    /// Collect up to `max_listings` records from `url`.
    ///
    /// Never fails: a page that cannot be loaded yields an empty list.
    pub async fn collect<P, T>(
        &self,
        page: &mut P,
        pacer: &mut T,
        url: &str,
        mut snapshots: Option<&mut JsonLines>,
        context: &BTreeMap<String, String>,
    ) -> Vec<ListingRecord>
    where
        P: SearchPage + ?Sized,
        T: Pacer + ?Sized,
    {
        info!(url, "extraction_start");

        if let Err(e) = self.navigate(page, url).await {
            warn!(url, error = %e, "extraction_error");
            return Vec::new();
        }
        pacer.pause(Pause::Settle).await;

        self.dismiss_consent(page, pacer).await;

        let driver = ScrollDriver::new(self.options.max_scroll_rounds, self.options.patience);
        match driver.run(page, pacer).await {
            Ok(outcome) => debug!(
                rounds = outcome.rounds,
                anchors = outcome.anchors,
                stop = ?outcome.stop,
                "scroll_outcome"
            ),
            Err(e) => warn!(url, error = %e, "scroll_error"),
        }

        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => {
                warn!(url, error = %e, "extraction_error");
                return Vec::new();
            }
        };

        self.extract_page(&html, snapshots.as_deref_mut(), context)
    }

    /// Strict load with retries, then one attempt with the looser wait.
    /// Each strict retry gets half the time of the one before it.
    async fn navigate<P>(&self, page: &mut P, url: &str) -> Result<()>
    where
        P: SearchPage + ?Sized,
    {
        let timeout = self.options.nav_timeout;
        let mut strict_timeout = timeout;
        for attempt in 1..=self.options.nav_retries {
            let result = page.navigate(url, WaitUntil::NetworkIdle, strict_timeout).await;
            strict_timeout /= 2;
            match result {
                Ok(()) => return Ok(()),
                Err(e) => warn!(attempt, error = %e, "timeout_warning"),
            }
        }

        page.navigate(url, WaitUntil::DomContentLoaded, timeout)
            .await
            .with_context(|| format!("Failed to load {url}"))
    }

    async fn dismiss_consent<P, T>(&self, page: &mut P, pacer: &mut T)
    where
        P: SearchPage + ?Sized,
        T: Pacer + ?Sized,
    {
        for control in CONSENT_CONTROLS {
            match page.click_consent(*control).await {
                Ok(true) => {
                    debug!(?control, "consent_dismissed");
                    pacer.pause(Pause::AfterConsent).await;
                    return;
                }
                Ok(false) => {}
                Err(e) => {
                    debug!(?control, error = %e, "consent_error");
                    return;
                }
            }
        }
    }

    /// Extract records from a rendered results page
    pub fn extract_page(
        &self,
        html: &str,
        mut snapshots: Option<&mut JsonLines>,
        context: &BTreeMap<String, String>,
    ) -> Vec<ListingRecord> {
        let document = Html::parse_document(html);
        let anchors = self.candidate_anchors(&document);
        info!(unique_links = anchors.len(), "processing_start");

        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for (i, (anchor, href)) in anchors.iter().enumerate() {
            if records.len() >= self.options.max_listings {
                break;
            }

            let Some(url) = absolute_url(&self.base, href) else {
                debug!(index = i, href, "listing_error");
                continue;
            };
            let Some(id) = listing_id(&url) else {
                continue;
            };
            if !seen.insert(id.clone()) {
                continue;
            }

            let card = self.resolve_card(*anchor);
            let record = self.extractor.extract(card, &id, &url);

            if let (Some(log), Some(_)) = (snapshots.as_deref_mut(), record.title.as_ref()) {
                let html = card.html();
                let snapshot = SnapshotRecord {
                    listing_id: &id,
                    html: &html,
                    extracted_data: &record,
                    captured_at: Utc::now(),
                    context,
                };
                if let Err(e) = log.append(&snapshot) {
                    warn!(listing_id = %id, error = %e, "snapshot_error");
                }
            }

            if record.is_useful() {
                records.push(record);
                if i % 20 == 0 {
                    debug!(
                        processed = i + 1,
                        total = anchors.len(),
                        extracted = records.len(),
                        "progress_update"
                    );
                }
            }
        }

        info!(
            total_extracted = records.len(),
            total_links = anchors.len(),
            "extraction_complete"
        );
        records
    }

    /// Union of all listing selectors, first occurrence of each href kept
    fn candidate_anchors<'a>(&self, document: &'a Html) -> Vec<(ElementRef<'a>, &'a str)> {
        let mut hrefs = HashSet::new();
        let mut anchors = Vec::new();

        for (css, selector) in &self.listing_selectors {
            let found: Vec<ElementRef<'a>> = document.select(selector).collect();
            if !found.is_empty() {
                debug!(selector = css, count = found.len(), "selector_success");
            }
            for anchor in found {
                if let Some(href) = anchor.value().attr("href") {
                    if hrefs.insert(href) {
                        anchors.push((anchor, href));
                    }
                }
            }
        }
        anchors
    }

    /// Nearest enclosing card container, or the anchor itself
    fn resolve_card<'a>(&self, anchor: ElementRef<'a>) -> ElementRef<'a> {
        self.containers
            .iter()
            .find_map(|selector| closest(anchor, selector))
            .unwrap_or(anchor)
    }
}

/// `anchor` or its nearest ancestor matching `selector`
fn closest<'a>(el: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .find(|candidate| selector.matches(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::testing::{NoPause, ScriptedPage};
    use crate::scrapers::types::ConsentControl;
    use std::time::Duration;

    const BASE: &str = "https://www.airbnb.mx";

    fn card(id: &str, title: &str, price: &str) -> String {
        format!(
            r#"<div data-testid="card-container"><div data-testid="listing-card">
                 <a href="/rooms/{id}?check_in=2025-09-12&amp;source_impression_id=p3">
                   <div data-testid="listing-card-title">{title}</div>
                 </a>
                 <div data-testid="listing-card-subtitle">Departamento · Providencia</div>
                 <span data-testid="price">{price}</span>
               </div></div>"#
        )
    }

    fn results_page(cards: &[String]) -> String {
        format!("<html><body><main>{}</main></body></html>", cards.join("\n"))
    }

    fn collector(options: CollectOptions) -> PageCollector {
        PageCollector::new(options, BASE).unwrap()
    }

    fn no_context() -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    #[test]
    fn extracts_one_record_per_listing() {
        let html = results_page(&[
            card("101", "Casa Providencia", "$1,200 MXN"),
            card("102", "Loft Americana", "$950 MXN"),
        ]);
        let records = collector(CollectOptions::default()).extract_page(&html, None, &no_context());

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].listing_id, "101");
        assert_eq!(
            records[0].url,
            "https://www.airbnb.mx/rooms/101?check_in=2025-09-12&source_impression_id=p3"
        );
        assert_eq!(records[0].title.as_deref(), Some("Casa Providencia"));
        assert_eq!(records[0].price_per_night_amount, Some(1200));
        assert_eq!(records[0].place_type.as_deref(), Some("Departamento"));
        assert_eq!(records[1].price_per_night_amount, Some(950));
    }

    #[test]
    fn same_listing_under_different_hrefs_is_extracted_once() {
        let html = results_page(&[
            card("7", "Casa Chapalita", "$800 MXN"),
            r#"<div><a href="https://www.airbnb.mx/rooms/7?photo=2">foto</a></div>"#.to_string(),
        ]);
        let records = collector(CollectOptions::default()).extract_page(&html, None, &no_context());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title.as_deref(), Some("Casa Chapalita"));
    }

    #[test]
    fn anchors_without_listing_id_and_empty_cards_are_skipped() {
        let html = results_page(&[
            r#"<div data-testid="listing-card"><a href="/rooms/plus/5">Plus</a></div>"#.to_string(),
            r#"<div data-testid="listing-card"><a href="/rooms/6"><img alt=""></a></div>"#.to_string(),
            card("8", "Depa Santa Tere", "$700 MXN"),
        ]);
        let records = collector(CollectOptions::default()).extract_page(&html, None, &no_context());
        let ids: Vec<&str> = records.iter().map(|r| r.listing_id.as_str()).collect();
        assert_eq!(ids, ["8"]);
    }

    #[test]
    fn stops_at_max_listings() {
        let cards: Vec<String> = (1..=6)
            .map(|i| card(&i.to_string(), &format!("Casa número {i}"), "$500 MXN"))
            .collect();
        let options = CollectOptions {
            max_listings: 3,
            ..CollectOptions::default()
        };
        let records = collector(options).extract_page(&results_page(&cards), None, &no_context());
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].listing_id, "3");
    }

    #[test]
    fn card_resolution_falls_back_to_the_anchor() {
        let html = r#"<html><body><a href="/rooms/99"><h3>Casa sin contenedor</h3></a></body></html>"#;
        let c = collector(CollectOptions::default());
        let document = Html::parse_document(html);
        let anchors = c.candidate_anchors(&document);
        assert_eq!(anchors.len(), 1);
        let card = c.resolve_card(anchors[0].0);
        assert_eq!(card.value().name(), "a");

        let records = c.extract_page(html, None, &no_context());
        assert_eq!(records[0].title.as_deref(), Some("Casa sin contenedor"));
    }

    #[test]
    fn snapshots_carry_markup_extraction_and_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.ndjson");
        let mut log = JsonLines::open_append(&path).unwrap();
        let context = BTreeMap::from([
            ("city".to_string(), "gdl".to_string()),
            ("colonia".to_string(), "Providencia".to_string()),
        ]);
        let html = results_page(&[card("55", "Casa Colomos", "$2,000 MXN")]);

        let records =
            collector(CollectOptions::default()).extract_page(&html, Some(&mut log), &context);
        assert_eq!(records.len(), 1);

        let contents = std::fs::read_to_string(&path).unwrap();
        let line: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(line["listing_id"], "55");
        assert_eq!(line["city"], "gdl");
        assert_eq!(line["colonia"], "Providencia");
        assert_eq!(line["extracted_data"]["titulo"], "Casa Colomos");
        assert_eq!(line["extracted_data"]["precio_noche_mxn"], 2000);
        assert!(line["html"].as_str().unwrap().contains("listing-card-title"));
        assert!(line["captured_at"].is_string());
    }

    #[tokio::test]
    async fn retries_strict_navigation_before_succeeding() {
        let mut page = ScriptedPage::with_html(results_page(&[card("1", "Casa Uno", "$100")]));
        page.strict_failures = 2;
        let records = collector(CollectOptions::default())
            .collect(&mut page, &mut NoPause, "https://x/s", None, &no_context())
            .await;
        assert_eq!(page.navigations, [WaitUntil::NetworkIdle; 3]);
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn strict_retries_wait_less_each_time() {
        let mut page = ScriptedPage::with_html(results_page(&[card("1", "Casa Uno", "$100")]));
        page.strict_failures = usize::MAX;
        let options = CollectOptions {
            nav_timeout: Duration::from_secs(60),
            ..CollectOptions::default()
        };
        collector(options)
            .collect(&mut page, &mut NoPause, "https://x/s", None, &no_context())
            .await;
        assert_eq!(
            page.timeouts,
            [60, 30, 15, 60].map(Duration::from_secs),
            "loose fallback gets the full timeout"
        );
    }

    #[tokio::test]
    async fn falls_back_to_loose_wait_after_strict_retries() {
        let mut page = ScriptedPage::with_html(results_page(&[card("1", "Casa Uno", "$100")]));
        page.strict_failures = usize::MAX;
        let records = collector(CollectOptions::default())
            .collect(&mut page, &mut NoPause, "https://x/s", None, &no_context())
            .await;
        assert_eq!(
            page.navigations,
            [
                WaitUntil::NetworkIdle,
                WaitUntil::NetworkIdle,
                WaitUntil::NetworkIdle,
                WaitUntil::DomContentLoaded
            ]
        );
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn total_navigation_failure_yields_empty_result() {
        let mut page = ScriptedPage::with_html(results_page(&[card("1", "Casa Uno", "$100")]));
        page.strict_failures = usize::MAX;
        page.loose_fails = true;
        let records = collector(CollectOptions::default())
            .collect(&mut page, &mut NoPause, "https://x/s", None, &no_context())
            .await;
        assert!(records.is_empty());
        assert_eq!(page.scrolls, 0);
        assert!(page.clicks.is_empty());
    }

    #[tokio::test]
    async fn clicks_first_matching_consent_control_only() {
        let mut page = ScriptedPage::with_html(results_page(&[]));
        page.consent = Some(ConsentControl::ButtonLabel("Accept"));
        collector(CollectOptions::default())
            .collect(&mut page, &mut NoPause, "https://x/s", None, &no_context())
            .await;
        assert_eq!(
            page.clicks,
            [
                ConsentControl::ButtonLabel("Aceptar"),
                ConsentControl::ButtonLabel("Acepto"),
                ConsentControl::ButtonLabel("Accept"),
            ]
        );
    }

    #[tokio::test]
    async fn missing_consent_banner_is_not_an_error() {
        let mut page = ScriptedPage::with_html(results_page(&[card("3", "Casa Tres", "$300")]));
        let records = collector(CollectOptions::default())
            .collect(&mut page, &mut NoPause, "https://x/s", None, &no_context())
            .await;
        assert_eq!(page.clicks.len(), CONSENT_CONTROLS.len());
        assert_eq!(records.len(), 1);
    }
}

//! Field extraction from a single listing card.
//!
//! Each semantic field owns an ordered list of [`Strategy`] values. The
//! first strategy whose element yields text that passes the field's
//! validator wins; a field whose strategies all miss stays absent.

use crate::models::ListingRecord;
use crate::scrapers::price::{parse_amount, parse_rating, parse_review_count, parse_total_amount};
use anyhow::{anyhow, Result};
use scraper::{ElementRef, Selector};

/// Separator between place type and location in the card subtitle
pub const SUBTITLE_SEPARATOR: &str = " · ";

type StrategySpec = (&'static str, Option<&'static str>);

const TITLE_STRATEGIES: &[StrategySpec] = &[
    (r#"[data-testid="listing-card-title"]"#, None),
    (r#"div[style*="-webkit-line-clamp"]"#, None),
    (r#"span[aria-hidden="true"]"#, None),
    ("h3", None),
    ("h2", None),
    (".listing-title", None),
    (r#"div[data-testid="listing-card-title"] span"#, None),
    (r#"span[data-testid="listing-card-name"]"#, None),
];

const PRICE_STRATEGIES: &[StrategySpec] = &[
    (r#"span[data-testid="price"]"#, None),
    (r#"div[data-testid="price-availability-message"]"#, None),
    (r#"span[data-testid="price-value"]"#, None),
    ("span", Some("$")),
    (".price", None),
    (r#"[data-testid="price-section"] span"#, None),
];

const TOTAL_PRICE_STRATEGIES: &[StrategySpec] = &[
    (r#"[data-testid="price-availability-row"] span"#, Some("total")),
    (r#"[data-testid="price-section"] span"#, Some("total")),
    ("span", Some("total")),
    ("button", Some("total")),
];

const RATING_STRATEGIES: &[StrategySpec] = &[
    (r#"span[aria-label*="estrellas"]"#, None),
    (r#"span[aria-label*="rating"]"#, None),
    ("span", Some("★")),
    (r#"div[role="img"][aria-label*="estrellas"]"#, None),
    (r#"span[data-testid="rating"]"#, None),
    (r#"div[aria-label*="calificación"]"#, None),
];

const REVIEW_STRATEGIES: &[StrategySpec] = &[
    (r#"span[aria-label*="reseña"]"#, None),
    (r#"span[aria-label*="comentario"]"#, None),
    ("span", Some("reseña")),
    ("span", Some("comentario")),
    (r#"span[data-testid="reviews-count"]"#, None),
    ("button", Some("reseña")),
];

const SUPERHOST_STRATEGIES: &[StrategySpec] = &[
    ("span", Some("Superanfitrión")),
    ("span", Some("Superhost")),
    ("div", Some("Superanfitrión")),
    (r#"[data-testid="superhost-badge"]"#, None),
    (".superhost-badge", None),
];

const SUBTITLE_STRATEGIES: &[StrategySpec] = &[
    (r#"[data-testid="listing-card-subtitle"]"#, None),
    (".listing-subtitle", None),
    (r#"div[data-testid="listing-card-subtitle"] span"#, None),
    (r#"span[data-testid="listing-card-subtitle"]"#, None),
];

/// Parse a CSS selector, mapping the borrowed parser error into `anyhow`.
pub fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e:?}"))
}

/// Whitespace-collapsed visible text of an element
pub fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// One way of locating a field inside a card: a CSS selector, optionally
/// narrowed to elements whose text contains a needle (case-insensitive).
#[derive(Debug, Clone)]
pub struct Strategy {
    selector: Selector,
    has_text: Option<String>,
}

impl Strategy {
    pub fn new(css: &str, has_text: Option<&str>) -> Result<Self> {
        Ok(Self {
            selector: parse_selector(css)?,
            has_text: has_text.map(str::to_lowercase),
        })
    }

    /// First descendant of `card` this strategy points at
    pub fn locate<'a>(&self, card: ElementRef<'a>) -> Option<ElementRef<'a>> {
        card.select(&self.selector).find(|el| match &self.has_text {
            Some(needle) => element_text(*el).to_lowercase().contains(needle),
            None => true,
        })
    }

    /// Visible text of the located element, falling back to its
    /// `aria-label` when the element renders no text
    pub fn probe(&self, card: ElementRef<'_>) -> Option<String> {
        let el = self.locate(card)?;
        let text = element_text(el);
        if !text.is_empty() {
            return Some(text);
        }
        el.value()
            .attr("aria-label")
            .map(|label| label.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|label| !label.is_empty())
    }
}

fn compile(specs: &[StrategySpec]) -> Result<Vec<Strategy>> {
    specs
        .iter()
        .map(|(css, has_text)| Strategy::new(css, *has_text))
        .collect()
}

/// Ordered strategies plus the validator that decides whether a probe
/// counts as a hit.
pub struct FieldRule<T> {
    strategies: Vec<Strategy>,
    validate: fn(&str) -> Option<T>,
}

impl<T> FieldRule<T> {
    pub fn new(strategies: Vec<Strategy>, validate: fn(&str) -> Option<T>) -> Self {
        Self {
            strategies,
            validate,
        }
    }

    fn from_specs(specs: &[StrategySpec], validate: fn(&str) -> Option<T>) -> Result<Self> {
        Ok(Self::new(compile(specs)?, validate))
    }

    /// Value from the first strategy that produces valid text
    pub fn resolve(&self, card: ElementRef<'_>) -> Option<T> {
        self.strategies
            .iter()
            .filter_map(|strategy| strategy.probe(card))
            .find_map(|text| (self.validate)(&text))
    }
}

fn longer_than_three(text: &str) -> Option<String> {
    (text.chars().count() > 3).then(|| text.to_string())
}

fn price_text(text: &str) -> Option<String> {
    (text.contains('$') && text.chars().count() > 2).then(|| text.to_string())
}

fn total_price_text(text: &str) -> Option<String> {
    price_text(text).filter(|t| t.to_lowercase().contains("total"))
}

/// Split a subtitle into `(place_type, location_text)`.
pub fn split_subtitle(subtitle: &str) -> (Option<String>, Option<String>) {
    match subtitle.split_once(SUBTITLE_SEPARATOR) {
        Some((kind, rest)) => {
            let kind = kind.trim();
            let rest = rest.trim();
            (
                (!kind.is_empty()).then(|| kind.to_string()),
                (!rest.is_empty()).then(|| rest.to_string()),
            )
        }
        None => (None, Some(subtitle.trim().to_string())),
    }
}

/// Resolves every card field through its strategy list
pub struct FieldExtractor {
    title: FieldRule<String>,
    price: FieldRule<String>,
    total_price: FieldRule<String>,
    rating: FieldRule<f64>,
    reviews: FieldRule<u32>,
    superhost: Vec<Strategy>,
    subtitle: FieldRule<String>,
}

impl FieldExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            title: FieldRule::from_specs(TITLE_STRATEGIES, longer_than_three)?,
            price: FieldRule::from_specs(PRICE_STRATEGIES, price_text)?,
            total_price: FieldRule::from_specs(TOTAL_PRICE_STRATEGIES, total_price_text)?,
            rating: FieldRule::from_specs(RATING_STRATEGIES, parse_rating)?,
            reviews: FieldRule::from_specs(REVIEW_STRATEGIES, parse_review_count)?,
            superhost: compile(SUPERHOST_STRATEGIES)?,
            subtitle: FieldRule::from_specs(SUBTITLE_STRATEGIES, longer_than_three)?,
        })
    }

    /// Best-effort record for one card. Never fails; unresolved fields are
    /// left empty and the caller decides whether the record is useful.
    pub fn extract(&self, card: ElementRef<'_>, listing_id: &str, url: &str) -> ListingRecord {
        let price_per_night_text = self.price.resolve(card);
        let approx_total_price_text = self.total_price.resolve(card);
        let approx_total_price_amount =
            approx_total_price_text.as_deref().and_then(parse_total_amount);
        let (place_type, location_text) = self
            .subtitle
            .resolve(card)
            .map(|s| split_subtitle(&s))
            .unwrap_or((None, None));

        ListingRecord {
            listing_id: listing_id.to_string(),
            url: url.to_string(),
            title: self.title.resolve(card),
            price_per_night_amount: price_per_night_text.as_deref().and_then(parse_amount),
            price_per_night_text,
            approx_total_price_amount,
            approx_total_price_text,
            rating: self.rating.resolve(card),
            review_count: self.reviews.resolve(card),
            place_type,
            is_superhost: self.superhost.iter().any(|s| s.locate(card).is_some()),
            location_text,
            region: None,
        }
    }
}

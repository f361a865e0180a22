use crate::scrapers::traits::{Pacer, SearchPage};
use crate::scrapers::types::Pause;
use anyhow::{Context, Result};
use tracing::{debug, info};

/// Anchors that point at a listing page; their count measures how much of
/// the grid has rendered
pub const LISTING_ANCHOR_SELECTOR: &str = r#"a[href*="/rooms/"]"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollStop {
    /// `patience` consecutive rounds revealed nothing new
    Stagnated,
    /// Ran the full `max_rounds`
    RoundsExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOutcome {
    pub rounds: usize,
    pub anchors: usize,
    pub stop: ScrollStop,
}

/// Scrolls the results grid until it stops growing or the round budget runs out
#[derive(Debug, Clone, Copy)]
pub struct ScrollDriver {
    max_rounds: usize,
    patience: usize,
}

impl ScrollDriver {
    pub fn new(max_rounds: usize, patience: usize) -> Self {
        Self {
            max_rounds,
            patience,
        }
    }

    pub async fn run<P, T>(&self, page: &mut P, pacer: &mut T) -> Result<ScrollOutcome>
    where
        P: SearchPage + ?Sized,
        T: Pacer + ?Sized,
    {
        info!(max_scrolls = self.max_rounds, patience = self.patience, "scroll_start");

        let mut previous = 0usize;
        let mut stagnant = 0usize;
        let mut rounds = 0usize;
        let mut stop = ScrollStop::RoundsExhausted;

        while rounds < self.max_rounds {
            rounds += 1;
            page.scroll_step()
                .await
                .with_context(|| format!("scroll round {rounds} failed"))?;
            pacer.pause(Pause::ScrollRound).await;

            let current = page
                .count_matching(LISTING_ANCHOR_SELECTOR)
                .await
                .context("Failed to count listing anchors")?;

            if current > previous {
                debug!(
                    round = rounds,
                    count = current,
                    new = current - previous,
                    "scroll_progress"
                );
                stagnant = 0;
            } else {
                stagnant += 1;
                debug!(round = rounds, count = current, "scroll_stagnant");
            }
            previous = current;

            if stagnant >= self.patience {
                info!(reason = "no_new_elements", patience = self.patience, "scroll_stop");
                stop = ScrollStop::Stagnated;
                break;
            }
        }

        info!(total_listings = previous, rounds, "scroll_complete");
        Ok(ScrollOutcome {
            rounds,
            anchors: previous,
            stop,
        })
    }
}

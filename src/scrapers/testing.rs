//! Scripted stand-ins for the browser seams, shared by unit tests.

use crate::scrapers::traits::{Pacer, SearchPage};
use crate::scrapers::types::{ConsentControl, Pause, WaitUntil};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

pub struct NoPause;

#[async_trait]
impl Pacer for NoPause {
    async fn pause(&mut self, _pause: Pause) {}
}

/// A page whose behaviour is fixed up front and whose interactions are recorded
#[derive(Default)]
pub struct ScriptedPage {
    counts: Vec<usize>,
    count_calls: usize,
    /// Number of strict navigations that time out before one succeeds
    pub strict_failures: usize,
    pub loose_fails: bool,
    pub html: String,
    /// The one consent control present on the page, if any
    pub consent: Option<ConsentControl>,
    pub navigations: Vec<WaitUntil>,
    pub timeouts: Vec<Duration>,
    pub clicks: Vec<ConsentControl>,
    pub scrolls: usize,
}

impl ScriptedPage {
    /// Anchor counts returned by successive count calls; the last one repeats
    pub fn with_counts(counts: &[usize]) -> Self {
        Self {
            counts: counts.to_vec(),
            ..Self::default()
        }
    }

    pub fn with_html(html: impl Into<String>) -> Self {
        Self {
            counts: vec![0],
            html: html.into(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SearchPage for ScriptedPage {
    async fn navigate(&mut self, url: &str, wait: WaitUntil, timeout: Duration) -> Result<()> {
        self.navigations.push(wait);
        self.timeouts.push(timeout);
        match wait {
            WaitUntil::NetworkIdle if self.strict_failures > 0 => {
                self.strict_failures -= 1;
                bail!("timed out waiting for network idle on {url}")
            }
            WaitUntil::DomContentLoaded if self.loose_fails => {
                bail!("timed out waiting for DOMContentLoaded on {url}")
            }
            _ => Ok(()),
        }
    }

    async fn click_consent(&mut self, control: ConsentControl) -> Result<bool> {
        self.clicks.push(control);
        Ok(self.consent == Some(control))
    }

    async fn scroll_step(&mut self) -> Result<()> {
        self.scrolls += 1;
        Ok(())
    }

    async fn count_matching(&mut self, _selector: &str) -> Result<usize> {
        let idx = self.count_calls.min(self.counts.len().saturating_sub(1));
        self.count_calls += 1;
        Ok(self.counts.get(idx).copied().unwrap_or(0))
    }

    async fn content(&mut self) -> Result<String> {
        Ok(self.html.clone())
    }
}

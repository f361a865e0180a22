use crate::models::ListingRecord;
use crate::scrapers::collector::PageCollector;
use crate::scrapers::pacing::HumanPacer;
use crate::scrapers::scroll::LISTING_ANCHOR_SELECTOR;
use crate::scrapers::traits::{RegionCollector, SearchPage};
use crate::scrapers::types::{ConsentControl, WaitUntil};
use crate::sweep::output::JsonLines;
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const SCROLL_STEP_JS: &str = r#"
(() => {
    const remaining = document.body.scrollHeight - window.pageYOffset;
    window.scrollBy(0, Math.min(window.innerHeight * 0.8, remaining));
    return true;
})()
"#;

/// Chrome launch settings
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub window_size: (u32, u32),
    pub user_agent: String,
    /// How long Chrome may sit idle between commands before the session is dropped
    pub idle_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1366, 900),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            idle_timeout: Duration::from_secs(300),
        }
    }
}

/// Quote `value` as a JavaScript string literal
fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

fn consent_js(control: ConsentControl) -> String {
    match control {
        ConsentControl::ButtonLabel(label) => format!(
            r#"(() => {{
                const label = {};
                const button = Array.from(document.querySelectorAll('button'))
                    .find(b => (b.innerText || '').trim().toLowerCase().includes(label));
                if (!button) return false;
                button.click();
                return true;
            }})()"#,
            js_string(&label.to_lowercase())
        ),
        ConsentControl::Css(selector) => format!(
            r#"(() => {{
                const el = document.querySelector({});
                if (!el) return false;
                el.click();
                return true;
            }})()"#,
            js_string(selector)
        ),
    }
}

/// One Chrome tab driven through the blocking DevTools client
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }

    /// Run a blocking tab call off the async runtime
    async fn with_tab<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .context("Browser task panicked")?
    }

    async fn evaluate(&self, js: String) -> Result<Option<serde_json::Value>> {
        self.with_tab(move |tab| Ok(tab.evaluate(&js, false)?.value)).await
    }
}

#[async_trait]
impl SearchPage for ChromePage {
    async fn navigate(&mut self, url: &str, wait: WaitUntil, timeout: Duration) -> Result<()> {
        let url = url.to_string();
        self.with_tab(move |tab| {
            tab.set_default_timeout(timeout);
            tab.navigate_to(&url)?;
            match wait {
                WaitUntil::NetworkIdle => {
                    tab.wait_until_navigated()?;
                    tab.wait_for_element_with_custom_timeout(LISTING_ANCHOR_SELECTOR, timeout)?;
                }
                WaitUntil::DomContentLoaded => {
                    tab.wait_for_element_with_custom_timeout("body", timeout)?;
                }
            }
            Ok(())
        })
        .await
    }

    async fn click_consent(&mut self, control: ConsentControl) -> Result<bool> {
        let clicked = self.evaluate(consent_js(control)).await?;
        Ok(clicked.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    async fn scroll_step(&mut self) -> Result<()> {
        self.evaluate(SCROLL_STEP_JS.to_string()).await?;
        Ok(())
    }

    async fn count_matching(&mut self, selector: &str) -> Result<usize> {
        let js = format!("document.querySelectorAll({}).length", js_string(selector));
        let count = self.evaluate(js).await?;
        Ok(count.and_then(|v| v.as_u64()).unwrap_or(0) as usize)
    }

    async fn content(&mut self) -> Result<String> {
        self.with_tab(|tab| tab.get_content()).await
    }
}

/// Collects each region in a fresh tab of one shared Chrome instance
pub struct BrowserCollector {
    browser: Browser,
    options: BrowserOptions,
    collector: PageCollector,
    pacer: HumanPacer,
    snapshots: Option<JsonLines>,
}

impl BrowserCollector {
    pub fn launch(
        options: BrowserOptions,
        collector: PageCollector,
        snapshots: Option<JsonLines>,
    ) -> Result<Self> {
        info!(headless = options.headless, "Launching Chrome...");

        let launch = LaunchOptions::default_builder()
            .headless(options.headless)
            .window_size(Some(options.window_size))
            .idle_browser_timeout(options.idle_timeout)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(launch).context("Failed to launch Chrome browser")?;

        Ok(Self {
            browser,
            options,
            collector,
            pacer: HumanPacer::new(),
            snapshots,
        })
    }

    async fn open_tab(&self) -> Result<Arc<Tab>> {
        let browser = self.browser.clone();
        let user_agent = self.options.user_agent.clone();
        tokio::task::spawn_blocking(move || {
            let tab = browser.new_tab().context("Failed to open tab")?;
            tab.set_user_agent(&user_agent, Some("es-MX,es;q=0.9"), None)
                .context("Failed to set user agent")?;
            Ok(tab)
        })
        .await
        .context("Browser task panicked")?
    }
}

#[async_trait]
impl RegionCollector for BrowserCollector {
    async fn collect(
        &mut self,
        url: &str,
        context: &BTreeMap<String, String>,
    ) -> Result<Vec<ListingRecord>> {
        let tab = self.open_tab().await?;
        let mut page = ChromePage::new(Arc::clone(&tab));

        let records = self
            .collector
            .collect(&mut page, &mut self.pacer, url, self.snapshots.as_mut(), context)
            .await;

        let closed = tokio::task::spawn_blocking(move || tab.close(true)).await;
        if let Ok(Err(e)) = closed {
            debug!(error = %e, "tab_close_error");
        }

        Ok(records)
    }
}

use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{debug, info};

use crate::config::{FetcherConfig, WatchTarget};
use crate::models::ListingKind;
use crate::utils::error::{AppError, Result};

/// Raw page snapshot handed to the extractor.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    /// Item count observed when scrolling settled. A stable count is a
    /// heuristic for exhaustion, not proof the source returned everything.
    pub item_count: usize,
    pub final_url: String,
}

/// Source of raw listing pages. The pipeline only sees this trait, so tests
/// drive it from fixture HTML.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, target: &WatchTarget) -> Result<FetchedPage>;
}

/// Scroll loop state. Listing pages lazy-load on scroll; the page counts as
/// exhausted after `scroll_stability_rounds` consecutive non-increasing item
/// counts or when the scroll budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScrollPhase {
    Loading,
    Stable { rounds: u32 },
    Exhausted,
}

fn advance(phase: ScrollPhase, grew: bool, stability_rounds: u32) -> ScrollPhase {
    if grew {
        return ScrollPhase::Loading;
    }
    let rounds = match phase {
        ScrollPhase::Stable { rounds } => rounds + 1,
        _ => 1,
    };
    if rounds >= stability_rounds {
        ScrollPhase::Exhausted
    } else {
        ScrollPhase::Stable { rounds }
    }
}

pub struct ChromeFetcher {
    browser: Browser,
    config: FetcherConfig,
}

impl ChromeFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false) // Often needed in containerized environments
            .args(vec![
                std::ffi::OsStr::new("--no-sandbox"),
                std::ffi::OsStr::new("--disable-dev-shm-usage"),
                std::ffi::OsStr::new("--disable-gpu"),
                std::ffi::OsStr::new("--disable-extensions"),
            ])
            .build()
            .map_err(|e| AppError::Browser(format!("failed to create launch options: {e}")))?;

        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| AppError::Browser(format!("failed to launch browser: {e}")))?;

        Ok(Self { browser, config })
    }

    async fn fetch_once(&self, target: &WatchTarget) -> Result<FetchedPage> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| fetch_err(target, format!("failed to create tab: {e}")))?;

        tab.set_user_agent(&self.config.user_agent, None, None)
            .map_err(|e| fetch_err(target, format!("failed to set user agent: {e}")))?;

        tab.set_default_timeout(Duration::from_secs(self.config.request_timeout));

        tab.navigate_to(&target.url)
            .map_err(|e| fetch_err(target, format!("navigation failed: {e}")))?;
        tab.wait_until_navigated()
            .map_err(|e| fetch_err(target, format!("page load failed: {e}")))?;

        let item_count = self.scroll_until_stable(&tab, target).await?;

        let html = tab
            .get_content()
            .map_err(|e| fetch_err(target, format!("failed to read page content: {e}")))?;

        let final_url = {
            let url = tab.get_url();
            if url.is_empty() {
                target.url.clone()
            } else {
                url
            }
        };

        // Close tab to free resources
        let _ = tab.close(true);

        Ok(FetchedPage {
            html,
            item_count,
            final_url,
        })
    }

    async fn scroll_until_stable(&self, tab: &Tab, target: &WatchTarget) -> Result<usize> {
        let selector = match target.kind {
            ListingKind::Product => "img[alt]",
            ListingKind::Job => "a[href]",
        };

        let mut count = self.count_items(tab, selector, target)?;
        debug!(target = %target.name, initial = count, "scrolling for lazy-loaded items");

        let mut phase = ScrollPhase::Loading;
        let mut scrolls = 0u32;

        while phase != ScrollPhase::Exhausted && scrolls < self.config.max_scroll_rounds {
            tab.evaluate(
                "window.scrollBy(0, Math.floor(window.innerHeight * 0.9));",
                false,
            )
            .map_err(|e| fetch_err(target, format!("scroll failed: {e}")))?;
            tokio::time::sleep(Duration::from_millis(self.config.scroll_settle_ms)).await;

            let next = self.count_items(tab, selector, target)?;
            phase = advance(phase, next > count, self.config.scroll_stability_rounds);
            if next > count {
                count = next;
            }
            scrolls += 1;
        }

        info!(target = %target.name, items = count, scrolls, "page settled");
        Ok(count)
    }

    fn count_items(&self, tab: &Tab, selector: &str, target: &WatchTarget) -> Result<usize> {
        let js = format!("document.querySelectorAll('{selector}').length");
        let result = tab
            .evaluate(&js, false)
            .map_err(|e| fetch_err(target, format!("item count failed: {e}")))?;
        Ok(result
            .value
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize)
    }
}

#[async_trait]
impl Fetch for ChromeFetcher {
    async fn fetch(&self, target: &WatchTarget) -> Result<FetchedPage> {
        // Delays of retry_delay_ms, 2x, 4x, ... (base-2 backoff scaled by
        // half the configured delay).
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.config.retry_delay_ms.max(2) / 2)
            .map(jitter)
            .take(self.config.max_retries as usize);

        Retry::spawn(strategy, || self.fetch_once(target)).await
    }
}

fn fetch_err(target: &WatchTarget, message: String) -> AppError {
    AppError::Fetch {
        target: target.name.clone(),
        message,
    }
}

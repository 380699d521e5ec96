use serde_json::Value;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::instrument;
use url::Url;

use crate::browser::Browser;
use crate::config::{AppSettings, Selectors};
use crate::error::{BrowserError, CollectError, StoreError};
use crate::listing::RawListing;
use crate::store;

pub const HEIGHT_SCRIPT: &str = "return document.body.scrollHeight";
pub const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

#[derive(Debug, Clone, Copy)]
pub struct ScrollLimits {
    pub pause: Duration,
    pub max_scrolls: u32,
    pub timeout: Duration,
}

impl ScrollLimits {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            pause: settings.scroll_pause(),
            max_scrolls: settings.max_scrolls,
            timeout: settings.scroll_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollStop {
    /// Two consecutive height measurements matched.
    Stable,
    MaxScrolls,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOutcome {
    pub scrolls: u32,
    pub height: u64,
    pub stop: ScrollStop,
}

/// Per-run extraction counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub matched: usize,
    pub extracted: usize,
    pub missing_title: usize,
    pub missing_price: usize,
    pub missing_link: usize,
    pub other_error: usize,
    pub original_price_defaulted: usize,
    pub shipping_defaulted: usize,
}

impl CollectStats {
    pub fn discarded(&self) -> usize {
        self.missing_title + self.missing_price + self.missing_link + self.other_error
    }

    pub fn summary(&self) -> String {
        format!(
            "Scraped {} items.\n- Matched tiles: {}\n- Discarded: {} (title {}, price {}, link {}, errors {})\n- Defaulted: original price {}, shipping {}",
            self.extracted,
            self.matched,
            self.discarded(),
            self.missing_title,
            self.missing_price,
            self.missing_link,
            self.other_error,
            self.original_price_defaulted,
            self.shipping_defaulted
        )
    }
}

#[derive(Debug)]
pub struct CollectReport {
    pub listings: Vec<RawListing>,
    pub stats: CollectStats,
    pub scroll: ScrollOutcome,
}

#[derive(Debug)]
enum Discard {
    MissingTitle,
    MissingPrice,
    MissingLink,
    Failed(BrowserError),
}

impl From<BrowserError> for Discard {
    fn from(e: BrowserError) -> Self {
        Discard::Failed(e)
    }
}

async fn page_height<B: Browser>(browser: &mut B) -> Result<u64, BrowserError> {
    match browser.execute_script(HEIGHT_SCRIPT).await? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f as u64))
            .ok_or_else(|| BrowserError::ScriptResult(n.to_string())),
        other => Err(BrowserError::ScriptResult(other.to_string())),
    }
}

/// Scrolls to the bottom until the page height stops changing, or until one
/// of `limits` is reached.
#[instrument(skip(browser))]
pub async fn scroll_until_stable<B: Browser>(
    browser: &mut B,
    limits: ScrollLimits,
) -> Result<ScrollOutcome, BrowserError> {
    let start = Instant::now();
    let mut last_height = page_height(browser).await?;
    let mut scrolls = 0;

    let stop = loop {
        if scrolls >= limits.max_scrolls {
            break ScrollStop::MaxScrolls;
        }
        if start.elapsed() >= limits.timeout {
            break ScrollStop::Timeout;
        }

        browser.execute_script(SCROLL_SCRIPT).await?;
        scrolls += 1;
        tokio::time::sleep(limits.pause).await;

        let new_height = page_height(browser).await?;
        tracing::debug!(scrolls, last_height, new_height, "Scrolled");
        if new_height == last_height {
            break ScrollStop::Stable;
        }
        last_height = new_height;
    };

    if stop != ScrollStop::Stable {
        tracing::warn!(
            scrolls,
            height = last_height,
            stop = ?stop,
            duration = ?start.elapsed(),
            "Page did not settle, extracting what has loaded"
        );
    }

    Ok(ScrollOutcome {
        scrolls,
        height: last_height,
        stop,
    })
}

/// Trimmed text of the first match under `tile`; `None` when absent or blank.
async fn field_text<B: Browser>(
    browser: &mut B,
    tile: &B::Element,
    selector: &str,
) -> Result<Option<String>, BrowserError> {
    let Some(element) = browser.find_element(tile, selector).await? else {
        return Ok(None);
    };
    let text = browser.text(&element).await?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

async fn optional_text<B: Browser>(
    browser: &mut B,
    tile: &B::Element,
    selector: &str,
) -> Option<String> {
    field_text(browser, tile, selector)
        .await
        .unwrap_or_else(|e| {
            tracing::debug!(selector, error = %e, "Optional field unreadable");
            None
        })
}

async fn link<B: Browser>(
    browser: &mut B,
    tile: &B::Element,
    selector: &str,
    base: &Url,
) -> Result<Option<String>, BrowserError> {
    let Some(anchor) = browser.find_element(tile, selector).await? else {
        return Ok(None);
    };
    let href = match browser.attribute(&anchor, "href").await? {
        Some(href) if !href.trim().is_empty() => href,
        _ => return Ok(None),
    };
    Ok(Some(base.join(href.trim()).map(String::from).unwrap_or(href)))
}

async fn extract_listing<B: Browser>(
    browser: &mut B,
    tile: &B::Element,
    selectors: &Selectors,
    base: &Url,
    timestamp: &str,
) -> Result<RawListing, Discard> {
    let title = field_text(browser, tile, &selectors.title)
        .await?
        .ok_or(Discard::MissingTitle)?;
    let price = field_text(browser, tile, &selectors.price)
        .await?
        .ok_or(Discard::MissingPrice)?;
    let original_price = optional_text(browser, tile, &selectors.original_price).await;
    let shipping = optional_text(browser, tile, &selectors.shipping).await;
    let item_url = link(browser, tile, &selectors.link, base)
        .await?
        .ok_or(Discard::MissingLink)?;

    Ok(RawListing {
        timestamp: timestamp.to_string(),
        title,
        price,
        original_price,
        shipping,
        item_url,
    })
}

/// Extracts one listing per tile. Tiles missing a title, price or link, or
/// failing in the browser, are dropped and counted.
pub async fn extract_all<B: Browser>(
    browser: &mut B,
    tiles: &[B::Element],
    selectors: &Selectors,
    base: &Url,
    timestamp: &str,
) -> (Vec<RawListing>, CollectStats) {
    let mut stats = CollectStats {
        matched: tiles.len(),
        ..CollectStats::default()
    };
    let mut listings = Vec::with_capacity(tiles.len());

    for (index, tile) in tiles.iter().enumerate() {
        match extract_listing(browser, tile, selectors, base, timestamp).await {
            Ok(listing) => {
                if listing.original_price.is_none() {
                    stats.original_price_defaulted += 1;
                }
                if listing.shipping.is_none() {
                    stats.shipping_defaulted += 1;
                }
                listings.push(listing);
            }
            Err(Discard::MissingTitle) => stats.missing_title += 1,
            Err(Discard::MissingPrice) => stats.missing_price += 1,
            Err(Discard::MissingLink) => stats.missing_link += 1,
            Err(Discard::Failed(e)) => {
                tracing::debug!(tile = index, error = %e, "Tile extraction failed");
                stats.other_error += 1;
            }
        }
    }

    stats.extracted = listings.len();
    (listings, stats)
}

/// Capture time shared by every listing of one run.
pub fn run_timestamp() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

async fn save_page<B: Browser>(browser: &mut B, path: &Path) -> Result<(), CollectError> {
    let source = browser.page_source().await?;
    std::fs::write(path, source).map_err(StoreError::from)?;
    Ok(())
}

async fn scrape<B: Browser>(
    browser: &mut B,
    settings: &AppSettings,
) -> Result<CollectReport, CollectError> {
    let base = Url::parse(&settings.target_url)?;
    browser.navigate(base.as_str()).await?;

    let scroll = scroll_until_stable(browser, ScrollLimits::from_settings(settings)).await?;
    tracing::info!(scrolls = scroll.scrolls, height = scroll.height, "Page loaded");

    if let Some(path) = &settings.debug_page_path {
        match save_page(browser, Path::new(path)).await {
            Ok(()) => tracing::info!(path = %path, "Saved page HTML"),
            Err(e) => tracing::warn!(path = %path, error = %e, "Could not save page HTML"),
        }
    }

    let tiles = browser.find_elements(&settings.selectors.item_tile).await?;
    tracing::info!(tiles = tiles.len(), "Found item tiles");

    let timestamp = run_timestamp();
    let (listings, stats) =
        extract_all(browser, &tiles, &settings.selectors, &base, &timestamp).await;

    store::append_raw(Path::new(&settings.raw_csv_path), &listings)?;

    Ok(CollectReport {
        listings,
        stats,
        scroll,
    })
}

/// Runs one collection pass against `settings.target_url` and appends the
/// results to the raw file. The session is closed before returning, on
/// success or failure.
#[instrument(skip_all, fields(url = %settings.target_url))]
pub async fn collect<B: Browser>(
    browser: &mut B,
    settings: &AppSettings,
) -> Result<CollectReport, CollectError> {
    let start = Instant::now();
    let outcome = scrape(browser, settings).await;

    if let Err(e) = browser.quit().await {
        tracing::warn!(error = %e, "Failed to close browser session");
    }

    let report = outcome?;
    let stats = &report.stats;
    tracing::info!(
        matched = stats.matched,
        extracted = stats.extracted,
        missing_title = stats.missing_title,
        missing_price = stats.missing_price,
        missing_link = stats.missing_link,
        other_error = stats.other_error,
        original_price_defaulted = stats.original_price_defaulted,
        shipping_defaulted = stats.shipping_defaulted,
        duration = ?start.elapsed(),
        "Completed collection"
    );
    Ok(report)
}

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "deals.toml";

/// CSS selectors describing the deal page markup.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Selectors {
    pub item_tile: String,
    pub title: String,
    pub price: String,
    pub original_price: String,
    pub shipping: String,
    pub link: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            item_tile: ".dne-itemtile".to_string(),
            title: ".dne-itemtile-title".to_string(),
            price: ".dne-itemtile-price .first".to_string(),
            original_price: ".itemtile-price-strikethrough".to_string(),
            shipping: ".dne-itemtile-shipping".to_string(),
            link: "a".to_string(),
        }
    }
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chrome,
    Firefox,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct AppSettings {
    pub target_url: String,
    pub raw_csv_path: String,
    pub cleaned_csv_path: String,
    pub report_json_path: String,
    pub webdriver_url: String,
    pub browser: BrowserKind,
    pub headless: bool,
    pub scroll_pause_ms: u64,
    pub max_scrolls: u32,
    pub scroll_timeout_secs: u64,
    pub debug_page_path: Option<String>,
    pub selectors: Selectors,
    pub telegram_token: Option<String>,
    pub chat_id: Option<String>,
}

impl AppSettings {
    /// Loads settings from an optional TOML file, then `DEALS_*` environment
    /// variables (nested keys use `__`, e.g. `DEALS_SELECTORS__ITEM_TILE`).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        Self::layered(path.as_ref(), environment())
    }

    fn layered(path: &Path, env: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_ms)
    }

    pub fn scroll_timeout(&self) -> Duration {
        Duration::from_secs(self.scroll_timeout_secs)
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("DEALS")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            target_url: "https://www.ebay.com/globaldeals/tech".to_string(),
            raw_csv_path: "ebay_tech_deals.csv".to_string(),
            cleaned_csv_path: "cleaned_ebay_deals.csv".to_string(),
            report_json_path: "ebay_deals_report.json".to_string(),
            webdriver_url: "http://localhost:4444".to_string(),
            browser: BrowserKind::Chrome,
            headless: true,
            scroll_pause_ms: 2000,
            max_scrolls: 50,
            scroll_timeout_secs: 300,
            debug_page_path: None,
            selectors: Selectors::default(),
            telegram_token: None,
            chat_id: None,
        }
    }
}

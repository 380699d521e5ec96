use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use deals_scraper::browser::Browser;
use deals_scraper::collector::{
    self, extract_all, scroll_until_stable, ScrollLimits, ScrollStop, HEIGHT_SCRIPT, SCROLL_SCRIPT,
};
use deals_scraper::config::{AppSettings, Selectors};
use deals_scraper::error::{BrowserError, CollectError};
use deals_scraper::store;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Field {
    Title,
    Price,
    OriginalPrice,
    Shipping,
    Link,
}

#[derive(Clone, Copy, Debug)]
enum Node {
    Tile(usize),
    Field(usize, Field),
}

#[derive(Clone, Default)]
struct Tile {
    title: Option<&'static str>,
    price: Option<&'static str>,
    original_price: Option<&'static str>,
    shipping: Option<&'static str>,
    href: Option<&'static str>,
    broken: bool,
}

fn full_tile(title: &'static str) -> Tile {
    Tile {
        title: Some(title),
        price: Some("US $19.99"),
        original_price: Some("US $29.99"),
        shipping: Some("Free shipping"),
        href: Some("https://www.ebay.com/itm/1"),
        broken: false,
    }
}

/// Scripted page: reports `heights` in order (repeating the last one) and
/// serves the given tiles.
#[derive(Default)]
struct FakeBrowser {
    heights: Vec<Value>,
    height_probes: usize,
    scrolls: u32,
    tiles: Vec<Tile>,
    fail_navigation: bool,
    quit_calls: usize,
    selectors: Selectors,
}

impl FakeBrowser {
    fn with_heights(heights: &[u64]) -> Self {
        Self {
            heights: heights.iter().map(|h| json!(h)).collect(),
            ..Self::default()
        }
    }

    fn with_tiles(tiles: Vec<Tile>) -> Self {
        Self {
            heights: vec![json!(500)],
            tiles,
            ..Self::default()
        }
    }

    fn field_for(&self, selector: &str) -> Option<Field> {
        let s = &self.selectors;
        [
            (&s.title, Field::Title),
            (&s.price, Field::Price),
            (&s.original_price, Field::OriginalPrice),
            (&s.shipping, Field::Shipping),
            (&s.link, Field::Link),
        ]
        .into_iter()
        .find(|(sel, _)| sel.as_str() == selector)
        .map(|(_, field)| field)
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    type Element = Node;

    async fn navigate(&mut self, _url: &str) -> Result<(), BrowserError> {
        if self.fail_navigation {
            return Err(BrowserError::Command("net::ERR_NAME_NOT_RESOLVED".into()));
        }
        Ok(())
    }

    async fn execute_script(&mut self, script: &str) -> Result<Value, BrowserError> {
        if script == HEIGHT_SCRIPT {
            let index = self.height_probes.min(self.heights.len() - 1);
            self.height_probes += 1;
            Ok(self.heights[index].clone())
        } else if script == SCROLL_SCRIPT {
            self.scrolls += 1;
            Ok(Value::Null)
        } else {
            Err(BrowserError::Command(format!("unexpected script {script}")))
        }
    }

    async fn find_elements(&mut self, _selector: &str) -> Result<Vec<Node>, BrowserError> {
        Ok((0..self.tiles.len()).map(Node::Tile).collect())
    }

    async fn find_element(
        &mut self,
        scope: &Node,
        selector: &str,
    ) -> Result<Option<Node>, BrowserError> {
        let Node::Tile(index) = *scope else {
            return Ok(None);
        };
        let tile = &self.tiles[index];
        if tile.broken {
            return Err(BrowserError::Command("stale element reference".into()));
        }
        let field = self.field_for(selector).expect("known selector");
        let present = match field {
            Field::Title => tile.title.is_some(),
            Field::Price => tile.price.is_some(),
            Field::OriginalPrice => tile.original_price.is_some(),
            Field::Shipping => tile.shipping.is_some(),
            Field::Link => tile.href.is_some(),
        };
        Ok(present.then_some(Node::Field(index, field)))
    }

    async fn text(&mut self, element: &Node) -> Result<String, BrowserError> {
        let Node::Field(index, field) = *element else {
            return Ok(String::new());
        };
        let tile = &self.tiles[index];
        let text = match field {
            Field::Title => tile.title,
            Field::Price => tile.price,
            Field::OriginalPrice => tile.original_price,
            Field::Shipping => tile.shipping,
            Field::Link => None,
        };
        Ok(text.unwrap_or_default().to_string())
    }

    async fn attribute(
        &mut self,
        element: &Node,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        match *element {
            Node::Field(index, Field::Link) if name == "href" => {
                Ok(self.tiles[index].href.map(str::to_string))
            }
            _ => Ok(None),
        }
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        Ok("<html></html>".into())
    }

    async fn quit(&mut self) -> Result<(), BrowserError> {
        self.quit_calls += 1;
        Ok(())
    }
}

fn limits(max_scrolls: u32) -> ScrollLimits {
    ScrollLimits {
        pause: Duration::ZERO,
        max_scrolls,
        timeout: Duration::from_secs(60),
    }
}

fn base() -> Url {
    Url::parse("https://www.ebay.com/globaldeals/tech").unwrap()
}

#[tokio::test]
async fn scroll_stops_when_height_repeats() {
    let mut browser = FakeBrowser::with_heights(&[100, 250, 250]);
    let outcome = scroll_until_stable(&mut browser, limits(50)).await.unwrap();

    assert_eq!(outcome.scrolls, 2);
    assert_eq!(outcome.stop, ScrollStop::Stable);
    assert_eq!(outcome.height, 250);
    assert_eq!(browser.scrolls, 2);
    assert_eq!(browser.height_probes, 3);
}

#[tokio::test]
async fn scroll_respects_iteration_cap() {
    let heights: Vec<u64> = (1..=100).map(|h| h * 100).collect();
    let mut browser = FakeBrowser::with_heights(&heights);
    let outcome = scroll_until_stable(&mut browser, limits(3)).await.unwrap();

    assert_eq!(outcome.stop, ScrollStop::MaxScrolls);
    assert_eq!(outcome.scrolls, 3);
    assert_eq!(browser.scrolls, 3);
}

#[tokio::test]
async fn scroll_respects_timeout() {
    let mut browser = FakeBrowser::with_heights(&[100, 200, 300]);
    let outcome = scroll_until_stable(
        &mut browser,
        ScrollLimits {
            pause: Duration::ZERO,
            max_scrolls: 50,
            timeout: Duration::ZERO,
        },
    )
    .await
    .unwrap();

    assert_eq!(outcome.stop, ScrollStop::Timeout);
    assert_eq!(browser.scrolls, 0);
}

#[tokio::test]
async fn non_numeric_height_is_an_error() {
    let mut browser = FakeBrowser {
        heights: vec![json!("tall")],
        ..FakeBrowser::default()
    };
    let result = scroll_until_stable(&mut browser, limits(5)).await;
    assert!(matches!(result, Err(BrowserError::ScriptResult(_))));
}

#[tokio::test]
async fn missing_shipping_keeps_the_listing() {
    let mut tile = full_tile("DJI Gimbal");
    tile.shipping = None;
    let mut browser = FakeBrowser::with_tiles(vec![tile]);
    let tiles = browser.find_elements(".dne-itemtile").await.unwrap();

    let (listings, stats) =
        extract_all(&mut browser, &tiles, &Selectors::default(), &base(), "ts").await;

    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].shipping, None);
    assert_eq!(listings[0].to_record()[4], "N/A");
    assert_eq!(stats.shipping_defaulted, 1);
}

#[tokio::test]
async fn missing_title_drops_only_that_tile() {
    let mut untitled = full_tile("unused");
    untitled.title = None;
    let mut browser =
        FakeBrowser::with_tiles(vec![full_tile("iPhone 11"), untitled, full_tile("Galaxy Tab")]);
    let tiles = browser.find_elements(".dne-itemtile").await.unwrap();

    let (listings, stats) =
        extract_all(&mut browser, &tiles, &Selectors::default(), &base(), "ts").await;

    assert_eq!(listings.len(), tiles.len() - 1);
    assert_eq!(stats.missing_title, 1);
    let titles: Vec<&str> = listings.iter().map(|l| l.title.as_str()).collect();
    assert_eq!(titles, vec!["iPhone 11", "Galaxy Tab"]);
}

#[tokio::test]
async fn discards_are_counted_by_reason() {
    let mut no_price = full_tile("a");
    no_price.price = None;
    let mut no_link = full_tile("b");
    no_link.href = None;
    let mut blank_title = full_tile("   ");
    blank_title.original_price = None;
    let mut broken = full_tile("c");
    broken.broken = true;
    let mut no_original = full_tile("d");
    no_original.original_price = None;

    let mut browser =
        FakeBrowser::with_tiles(vec![no_price, no_link, blank_title, broken, no_original]);
    let tiles = browser.find_elements(".dne-itemtile").await.unwrap();
    let (listings, stats) =
        extract_all(&mut browser, &tiles, &Selectors::default(), &base(), "ts").await;

    assert_eq!(listings.len(), 1);
    assert_eq!(stats.matched, 5);
    assert_eq!(stats.extracted, 1);
    assert_eq!(stats.missing_price, 1);
    assert_eq!(stats.missing_link, 1);
    assert_eq!(stats.missing_title, 1);
    assert_eq!(stats.other_error, 1);
    assert_eq!(stats.original_price_defaulted, 1);
}

#[tokio::test]
async fn relative_links_resolve_against_the_page() {
    let mut tile = full_tile("Laptop");
    tile.href = Some("/itm/123?hash=x");
    let mut browser = FakeBrowser::with_tiles(vec![tile]);
    let tiles = browser.find_elements(".dne-itemtile").await.unwrap();

    let (listings, _) =
        extract_all(&mut browser, &tiles, &Selectors::default(), &base(), "ts").await;
    assert_eq!(listings[0].item_url, "https://www.ebay.com/itm/123?hash=x");
}

#[tokio::test]
async fn collect_appends_one_batch_and_closes_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let settings = AppSettings {
        raw_csv_path: dir.path().join("raw.csv").to_string_lossy().into_owned(),
        scroll_pause_ms: 0,
        ..AppSettings::default()
    };

    let mut browser = FakeBrowser::with_tiles(vec![full_tile("Apple Watch"), full_tile("Tablet")]);
    let report = collector::collect(&mut browser, &settings).await.unwrap();
    assert_eq!(report.stats.extracted, 2);
    assert_eq!(report.scroll.stop, ScrollStop::Stable);
    assert_eq!(browser.quit_calls, 1);

    let mut second = FakeBrowser::with_tiles(vec![full_tile("Gimbal")]);
    collector::collect(&mut second, &settings).await.unwrap();

    let rows = store::read_raw(std::path::Path::new(&settings.raw_csv_path)).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].timestamp, rows[1].timestamp);
    assert_eq!(rows[2].title, "Gimbal");
}

#[tokio::test]
async fn navigation_failure_is_fatal_but_still_closes() {
    let dir = tempfile::tempdir().unwrap();
    let settings = AppSettings {
        raw_csv_path: dir.path().join("raw.csv").to_string_lossy().into_owned(),
        scroll_pause_ms: 0,
        ..AppSettings::default()
    };
    let mut browser = FakeBrowser {
        fail_navigation: true,
        ..FakeBrowser::with_tiles(vec![full_tile("x")])
    };

    let result = collector::collect(&mut browser, &settings).await;
    assert!(matches!(result, Err(CollectError::Browser(_))));
    assert_eq!(browser.quit_calls, 1);
    assert!(!dir.path().join("raw.csv").exists());
}

#[tokio::test]
async fn unwritable_debug_page_does_not_stop_collection() {
    let dir = tempfile::tempdir().unwrap();
    let settings = AppSettings {
        raw_csv_path: dir.path().join("raw.csv").to_string_lossy().into_owned(),
        debug_page_path: Some(
            dir.path()
                .join("missing-dir/debug_page.html")
                .to_string_lossy()
                .into_owned(),
        ),
        scroll_pause_ms: 0,
        ..AppSettings::default()
    };

    let mut browser = FakeBrowser::with_tiles(vec![full_tile("Samsung Tablet")]);
    let report = collector::collect(&mut browser, &settings).await.unwrap();

    assert_eq!(report.stats.extracted, 1);
    assert_eq!(browser.quit_calls, 1);
    assert_eq!(store::read_raw(std::path::Path::new(&settings.raw_csv_path)).unwrap().len(), 1);
}

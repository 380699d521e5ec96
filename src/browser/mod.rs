//! The browser automation boundary the collector drives.

mod snapshot;
mod webdriver;

pub use snapshot::HtmlSnapshot;
pub use webdriver::WebDriverBrowser;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BrowserError;

/// A controllable page. Element handles are only meaningful to the browser
/// that returned them.
#[async_trait]
pub trait Browser: Send {
    type Element: Send + Sync;

    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    async fn execute_script(&mut self, script: &str) -> Result<Value, BrowserError>;

    async fn find_elements(&mut self, selector: &str) -> Result<Vec<Self::Element>, BrowserError>;

    /// First descendant of `scope` matching `selector`, or `None`.
    async fn find_element(
        &mut self,
        scope: &Self::Element,
        selector: &str,
    ) -> Result<Option<Self::Element>, BrowserError>;

    async fn text(&mut self, element: &Self::Element) -> Result<String, BrowserError>;

    async fn attribute(
        &mut self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    async fn page_source(&mut self) -> Result<String, BrowserError>;

    /// Ends the session. Called exactly once, on every exit path.
    async fn quit(&mut self) -> Result<(), BrowserError>;
}

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use tracing::instrument;

use super::Browser;
use crate::config::{AppSettings, BrowserKind};
use crate::error::BrowserError;

/// A WebDriver session (chromedriver or geckodriver) driven through fantoccini.
pub struct WebDriverBrowser {
    client: Option<Client>,
}

impl WebDriverBrowser {
    #[instrument(skip(settings), fields(webdriver = %settings.webdriver_url))]
    pub async fn connect(settings: &AppSettings) -> Result<Self, BrowserError> {
        tracing::info!("Starting browser session");
        let client = ClientBuilder::native()
            .capabilities(capabilities(settings.browser, settings.headless))
            .connect(&settings.webdriver_url)
            .await?;
        Ok(Self {
            client: Some(client),
        })
    }

    fn client(&self) -> Result<&Client, BrowserError> {
        self.client
            .as_ref()
            .ok_or_else(|| BrowserError::Command("session already closed".into()))
    }
}

fn capabilities(kind: BrowserKind, headless: bool) -> Map<String, Value> {
    let mut caps = Map::new();
    match kind {
        BrowserKind::Chrome => {
            let mut args = vec!["--log-level=3", "--disable-gpu", "--no-sandbox"];
            if headless {
                args.push("--headless");
            }
            caps.insert("browserName".into(), json!("chrome"));
            caps.insert("goog:chromeOptions".into(), json!({ "args": args }));
        }
        BrowserKind::Firefox => {
            let args: Vec<&str> = if headless { vec!["-headless"] } else { vec![] };
            caps.insert("browserName".into(), json!("firefox"));
            caps.insert(
                "moz:firefoxOptions".into(),
                json!({ "args": args, "log": { "level": "fatal" } }),
            );
        }
    }
    caps
}

#[async_trait]
impl Browser for WebDriverBrowser {
    type Element = Element;

    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.client()?.goto(url).await?;
        Ok(())
    }

    async fn execute_script(&mut self, script: &str) -> Result<Value, BrowserError> {
        Ok(self.client()?.execute(script, Vec::new()).await?)
    }

    async fn find_elements(&mut self, selector: &str) -> Result<Vec<Element>, BrowserError> {
        Ok(self.client()?.find_all(Locator::Css(selector)).await?)
    }

    async fn find_element(
        &mut self,
        scope: &Element,
        selector: &str,
    ) -> Result<Option<Element>, BrowserError> {
        // find_all yields an empty list instead of a no-such-element error
        let mut found = scope.find_all(Locator::Css(selector)).await?;
        if found.is_empty() {
            Ok(None)
        } else {
            Ok(Some(found.swap_remove(0)))
        }
    }

    async fn text(&mut self, element: &Element) -> Result<String, BrowserError> {
        Ok(element.text().await?)
    }

    async fn attribute(
        &mut self,
        element: &Element,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        Ok(element.attr(name).await?)
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        Ok(self.client()?.source().await?)
    }

    async fn quit(&mut self) -> Result<(), BrowserError> {
        if let Some(client) = self.client.take() {
            tracing::info!("Closing browser session");
            client.close().await?;
        }
        Ok(())
    }
}

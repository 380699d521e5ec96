use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use std::path::Path;

use super::Browser;
use crate::error::BrowserError;

/// Replays a saved page (for example the debug page a live run wrote) through
/// the same interface as a live session. Elements are handed out as indices
/// into the outer HTML of everything selected so far.
pub struct HtmlSnapshot {
    source: String,
    nodes: Vec<String>,
}

impl HtmlSnapshot {
    pub fn from_html(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            nodes: Vec::new(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, BrowserError> {
        Ok(Self::from_html(std::fs::read_to_string(path)?))
    }

    fn node(&self, handle: usize) -> Result<&str, BrowserError> {
        self.nodes
            .get(handle)
            .map(String::as_str)
            .ok_or(BrowserError::StaleElement(handle))
    }

    fn remember(&mut self, html: String) -> usize {
        self.nodes.push(html);
        self.nodes.len() - 1
    }
}

fn parse_selector(selector: &str) -> Result<Selector, BrowserError> {
    Selector::parse(selector).map_err(|_| BrowserError::Selector(selector.to_string()))
}

/// The element a stored fragment was cut from.
fn fragment_root(fragment: &Html) -> Option<ElementRef<'_>> {
    fragment
        .root_element()
        .children()
        .find_map(ElementRef::wrap)
}

fn select_all(source: &str, selector: &Selector) -> Vec<String> {
    Html::parse_document(source)
        .select(selector)
        .map(|el| el.html())
        .collect()
}

fn select_within(fragment_html: &str, selector: &Selector) -> Option<String> {
    let fragment = Html::parse_fragment(fragment_html);
    let scope = fragment_root(&fragment)?;
    scope
        .select(selector)
        .find(|el| el.id() != scope.id())
        .map(|el| el.html())
}

fn visible_text(fragment_html: &str) -> String {
    let fragment = Html::parse_fragment(fragment_html);
    let text = fragment.root_element().text().collect::<String>();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn attribute_of(fragment_html: &str, name: &str) -> Option<String> {
    let fragment = Html::parse_fragment(fragment_html);
    fragment_root(&fragment)?.value().attr(name).map(str::to_string)
}

#[async_trait]
impl Browser for HtmlSnapshot {
    type Element = usize;

    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        tracing::info!(url = %url, bytes = self.source.len(), "Replaying saved page");
        Ok(())
    }

    async fn execute_script(&mut self, script: &str) -> Result<Value, BrowserError> {
        // A static page never grows, so every height probe reads the same.
        if script.trim_start().starts_with("return") && script.contains("scrollHeight") {
            Ok(json!(self.source.len()))
        } else {
            Ok(Value::Null)
        }
    }

    async fn find_elements(&mut self, selector: &str) -> Result<Vec<usize>, BrowserError> {
        let selector = parse_selector(selector)?;
        let found = select_all(&self.source, &selector);
        Ok(found.into_iter().map(|html| self.remember(html)).collect())
    }

    async fn find_element(
        &mut self,
        scope: &usize,
        selector: &str,
    ) -> Result<Option<usize>, BrowserError> {
        let selector = parse_selector(selector)?;
        let found = select_within(self.node(*scope)?, &selector);
        Ok(found.map(|html| self.remember(html)))
    }

    async fn text(&mut self, element: &usize) -> Result<String, BrowserError> {
        Ok(visible_text(self.node(*element)?))
    }

    async fn attribute(
        &mut self,
        element: &usize,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        Ok(attribute_of(self.node(*element)?, name))
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        Ok(self.source.clone())
    }

    async fn quit(&mut self) -> Result<(), BrowserError> {
        self.nodes.clear();
        Ok(())
    }
}

//! Page session abstraction shared by the drivers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::error::E2eResult;
use crate::spec::{Locator, Viewport};

/// Snapshot of one matched element, taken at query time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,

    /// Raw `textContent`, whitespace untouched
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    #[serde(default)]
    pub visible: bool,

    /// Computed values for the CSS properties requested in the query
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn style(&self, property: &str) -> Option<&str> {
        self.styles.get(property).map(String::as_str)
    }

    /// Short label for failure messages, e.g. `<a href="#sobre">`.
    pub fn label(&self) -> String {
        let mut label = format!("<{}", self.tag);
        for key in ["id", "class", "href", "src", "name"] {
            if let Some(value) = self.attributes.get(key) {
                label.push_str(&format!(" {}=\"{}\"", key, value));
            }
        }
        label.push('>');
        label
    }
}

/// A single loaded page, exclusively owned by whoever runs checks against it.
///
/// Drivers do not retry: `query` reports what the page holds right now and the
/// runner polls. `goto` and `click` honour the timeout they are given and fail
/// with [`crate::E2eError::Timeout`] when it elapses.
#[async_trait]
pub trait Page: Send {
    /// Load `url` and wait for the document to be ready.
    async fn goto(&mut self, url: &Url, timeout: Duration) -> E2eResult<()>;

    async fn set_viewport(&mut self, viewport: Viewport) -> E2eResult<()>;

    /// All elements matching `locator`, in document order.
    async fn query(&mut self, locator: &Locator, properties: &[String]) -> E2eResult<Vec<Element>>;

    /// Click the first element matching `locator`.
    async fn click(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<()>;

    async fn title(&mut self) -> E2eResult<String>;

    /// URL of the current document, fragment included.
    fn current_url(&self) -> Option<&Url>;

    async fn close(&mut self) -> E2eResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<P: Page + ?Sized> Page for Box<P> {
    async fn goto(&mut self, url: &Url, timeout: Duration) -> E2eResult<()> {
        (**self).goto(url, timeout).await
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> E2eResult<()> {
        (**self).set_viewport(viewport).await
    }

    async fn query(&mut self, locator: &Locator, properties: &[String]) -> E2eResult<Vec<Element>> {
        (**self).query(locator, properties).await
    }

    async fn click(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<()> {
        (**self).click(locator, timeout).await
    }

    async fn title(&mut self) -> E2eResult<String> {
        (**self).title().await
    }

    fn current_url(&self) -> Option<&Url> {
        (**self).current_url()
    }

    async fn close(&mut self) -> E2eResult<()> {
        (**self).close().await
    }
}

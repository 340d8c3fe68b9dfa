//! Static document driver: HTTP fetch plus an in-memory DOM
//!
//! Good enough for pages whose content does not depend on script execution.
//! There is no layout engine, so visibility and computed styles are derived
//! from markup alone:
//!
//! - an element is hidden if it or an ancestor is a non-rendered element,
//!   carries the `hidden` attribute, is `input[type=hidden]`, or has an inline
//!   `display: none`; inline `visibility: hidden` is inherited until overridden
//! - `display` resolves to the inline value, else the tag's default
//! - the viewport is recorded but does not influence queries

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::assertion::normalize_whitespace;
use crate::error::{E2eError, E2eResult};
use crate::page::{Element, Page};
use crate::spec::{Locator, Viewport};

/// Elements the browser never renders
const NON_RENDERED: &[&str] = &[
    "head", "script", "style", "template", "title", "meta", "link", "noscript", "base",
];

const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "br", "button", "cite", "code", "em", "i", "img", "input", "label",
    "picture", "select", "small", "span", "strong", "sub", "sup", "svg", "textarea", "time",
];

const CLICK_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct StaticPage {
    client: reqwest::Client,
    url: Option<Url>,
    document: Option<String>,
    viewport: Viewport,
}

/// What a click lands on, resolved while the document is parsed
struct ClickTarget {
    visible: bool,
    href: Option<String>,
    new_window: bool,
}

impl StaticPage {
    pub fn new() -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: None,
            document: None,
            viewport: Viewport::default(),
        })
    }

    /// A page preloaded with `html`, as if it had been fetched from `url`
    pub fn from_html(url: Url, html: impl Into<String>) -> E2eResult<Self> {
        let mut page = Self::new()?;
        page.url = Some(url);
        page.document = Some(html.into());
        Ok(page)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    async fn fetch(&mut self, url: &Url, timeout: Duration) -> E2eResult<()> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| navigation_error(e, url, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(E2eError::Navigation {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| navigation_error(e, url, timeout))?;

        self.url = Some(url.clone());
        self.document = Some(body);
        Ok(())
    }

    fn document(&self) -> E2eResult<&str> {
        self.document.as_deref().ok_or(E2eError::NoDocument)
    }
}

#[async_trait]
impl Page for StaticPage {
    async fn goto(&mut self, url: &Url, timeout: Duration) -> E2eResult<()> {
        self.fetch(url, timeout).await
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> E2eResult<()> {
        debug!("viewport {}", viewport);
        self.viewport = viewport;
        Ok(())
    }

    async fn query(&mut self, locator: &Locator, properties: &[String]) -> E2eResult<Vec<Element>> {
        let html = Html::parse_document(self.document()?);
        let matches = resolve(&html, locator)?;
        Ok(matches.into_iter().map(|el| snapshot(el, properties)).collect())
    }

    async fn click(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<()> {
        let deadline = Instant::now() + timeout;

        let target = loop {
            if let Some(target) = find_click_target(self.document()?, locator)? {
                if target.visible {
                    break target;
                }
            }
            if Instant::now() >= deadline {
                return Err(E2eError::timeout(format!("clickable {}", locator), timeout));
            }
            tokio::time::sleep(CLICK_POLL_INTERVAL).await;
        };

        let Some(href) = target.href else {
            debug!("click on {} has no link target", locator);
            return Ok(());
        };
        if target.new_window {
            debug!("click on {} opens a new window; page unchanged", locator);
            return Ok(());
        }

        let current = self.url.clone().ok_or(E2eError::NoDocument)?;
        let next = match current.join(&href) {
            Ok(next) => next,
            Err(e) => {
                warn!("ignoring click on unparsable href '{}': {}", href, e);
                return Ok(());
            }
        };

        if !matches!(next.scheme(), "http" | "https") {
            debug!("click on {} targets {}; page unchanged", locator, next.scheme());
            return Ok(());
        }

        if same_document(&current, &next) {
            debug!("in-page navigation to {}", next);
            self.url = Some(next);
            return Ok(());
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        self.fetch(&next, remaining.max(CLICK_POLL_INTERVAL)).await
    }

    async fn title(&mut self) -> E2eResult<String> {
        let html = Html::parse_document(self.document()?);
        let selector = parse_selector("title")?;
        Ok(html
            .select(&selector)
            .next()
            .map(|t| normalize_whitespace(&t.text().collect::<String>()))
            .unwrap_or_default())
    }

    fn current_url(&self) -> Option<&Url> {
        self.url.as_ref()
    }
}

fn navigation_error(e: reqwest::Error, url: &Url, timeout: Duration) -> E2eError {
    if e.is_timeout() {
        E2eError::timeout(format!("navigation to {}", url), timeout)
    } else {
        E2eError::Http(e)
    }
}

fn same_document(a: &Url, b: &Url) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    a.set_fragment(None);
    b.set_fragment(None);
    a == b
}

fn parse_selector(css: &str) -> E2eResult<Selector> {
    Selector::parse(css).map_err(|e| E2eError::InvalidSelector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// Resolve a locator against a parsed document, in document order per scope
fn resolve<'a>(html: &'a Html, locator: &Locator) -> E2eResult<Vec<ElementRef<'a>>> {
    let selector = parse_selector(locator.css.as_deref().unwrap_or("*"))?;

    let mut candidates: Vec<ElementRef<'a>> = match &locator.within {
        Some(scope) => {
            let mut seen = HashSet::new();
            let mut found = Vec::new();
            for scope_el in resolve(html, scope)? {
                for el in scope_el.select(&selector) {
                    if seen.insert(el.id()) {
                        found.push(el);
                    }
                }
            }
            found
        }
        None => html.select(&selector).collect(),
    };

    if let Some(text) = &locator.text {
        let needle = normalize_whitespace(text);
        candidates.retain(|el| normalize_whitespace(&el.text().collect::<String>()).contains(&needle));

        if locator.css.is_none() {
            // Bare text lookups want the innermost element holding the text
            let ids: HashSet<_> = candidates.iter().map(|el| el.id()).collect();
            let mut enclosing = HashSet::new();
            for el in &candidates {
                for ancestor in el.ancestors() {
                    if ids.contains(&ancestor.id()) {
                        enclosing.insert(ancestor.id());
                    }
                }
            }
            candidates.retain(|el| !enclosing.contains(&el.id()));
        }
    }

    if locator.first {
        candidates.truncate(1);
    }

    Ok(candidates)
}

fn snapshot(el: ElementRef<'_>, properties: &[String]) -> Element {
    let value = el.value();
    let attributes: BTreeMap<String, String> = value
        .attrs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let styles = properties
        .iter()
        .filter_map(|p| computed_style(el, p).map(|v| (p.clone(), v)))
        .collect();

    Element {
        tag: value.name().to_string(),
        text: el.text().collect(),
        attributes,
        visible: is_visible(el),
        styles,
    }
}

fn find_click_target(document: &str, locator: &Locator) -> E2eResult<Option<ClickTarget>> {
    let html = Html::parse_document(document);
    let Some(el) = resolve(&html, locator)?.into_iter().next() else {
        return Ok(None);
    };

    // The click bubbles to the nearest enclosing link
    let link = std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .find(|e| matches!(e.value().name(), "a" | "area") && e.value().attr("href").is_some());

    Ok(Some(ClickTarget {
        visible: is_visible(el),
        href: link.and_then(|l| l.value().attr("href")).map(str::to_string),
        new_window: link
            .and_then(|l| l.value().attr("target"))
            .map(|t| t.eq_ignore_ascii_case("_blank"))
            .unwrap_or(false),
    }))
}

fn inline_style(el: ElementRef<'_>, property: &str) -> Option<String> {
    el.value()
        .attr("style")?
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .filter(|(name, _)| name.trim().eq_ignore_ascii_case(property))
        .last()
        .map(|(_, value)| {
            value
                .trim()
                .trim_end_matches("!important")
                .trim()
                .to_ascii_lowercase()
        })
}

fn self_and_ancestors(el: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    std::iter::once(el).chain(el.ancestors().filter_map(ElementRef::wrap))
}

fn is_visible(el: ElementRef<'_>) -> bool {
    for node in self_and_ancestors(el) {
        let value = node.value();
        if NON_RENDERED.contains(&value.name()) || value.attr("hidden").is_some() {
            return false;
        }
        if value.name() == "input"
            && value.attr("type").map(|t| t.eq_ignore_ascii_case("hidden")).unwrap_or(false)
        {
            return false;
        }
        if inline_style(node, "display").as_deref() == Some("none") {
            return false;
        }
    }

    // The nearest declaration wins; visibility is inherited
    let visibility = self_and_ancestors(el).find_map(|node| inline_style(node, "visibility"));
    !matches!(visibility.as_deref(), Some("hidden") | Some("collapse"))
}

fn computed_style(el: ElementRef<'_>, property: &str) -> Option<String> {
    if let Some(value) = inline_style(el, property) {
        return Some(value);
    }

    let value = el.value();
    match property {
        "display" => {
            let display = if NON_RENDERED.contains(&value.name()) || value.attr("hidden").is_some() {
                "none"
            } else if INLINE_ELEMENTS.contains(&value.name()) {
                "inline"
            } else if value.name() == "li" {
                "list-item"
            } else {
                "block"
            };
            Some(display.to_string())
        }
        "visibility" => Some(
            self_and_ancestors(el)
                .find_map(|node| inline_style(node, "visibility"))
                .unwrap_or_else(|| "visible".to_string()),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<!DOCTYPE html>
<html lang="pt-BR">
<head>
  <title> José Pacheco | QA Engineer </title>
  <meta name="description" content="Portfólio">
</head>
<body>
  <nav class="navbar">
    <div class="navbar-logo">José <strong>Pacheco</strong></div>
    <ul class="nav-menu">
      <li><a href="#sobre">Sobre</a></li>
      <li><a href="#contato"><span>Conversar</span></a></li>
    </ul>
  </nav>
  <section id="sobre">
    <div class="sobre-stats">
      <div class="stat"><span class="stat-number">4+</span><span class="stat-label">Anos em QA</span></div>
    </div>
    <p class="note" hidden>secret</p>
    <div style="display: none"><span class="buried">buried</span></div>
    <div style="visibility:hidden"><span class="ghost">ghost</span><span class="shown" style="visibility: visible">shown</span></div>
    <img src="a.png" alt="a">
    <img src="b.png" alt="b" style="display:none !important">
  </section>
  <a class="external" href="https://www.linkedin.com/in/josepachecoqa/" target="_blank">LinkedIn</a>
  <a class="mail" href="mailto:jose@example.com">Email</a>
  <a class="next" href="/outra">Outra</a>
</body>
</html>"##;

    fn page() -> StaticPage {
        StaticPage::from_html(Url::parse("http://127.0.0.1:1/").unwrap(), PAGE).unwrap()
    }

    async fn query_one(page: &mut StaticPage, locator: Locator) -> Element {
        let mut found = page.query(&locator, &["display".to_string()]).await.unwrap();
        assert_eq!(found.len(), 1, "expected exactly one match for {}", locator);
        found.remove(0)
    }

    #[tokio::test]
    async fn test_css_query_and_text() {
        let mut page = page();
        let logo = query_one(&mut page, Locator::css(".navbar-logo")).await;
        assert_eq!(logo.tag, "div");
        assert_eq!(logo.text, "José Pacheco");
        assert!(logo.visible);
    }

    #[tokio::test]
    async fn test_contains_within_scope() {
        let mut page = page();
        let link = query_one(
            &mut page,
            Locator::contains("a", "Conversar").within(Locator::css(".nav-menu")),
        )
        .await;
        assert_eq!(link.attribute("href"), Some("#contato"));

        let outside = page
            .query(&Locator::contains("a", "LinkedIn").within(Locator::css(".nav-menu")), &[])
            .await
            .unwrap();
        assert!(outside.is_empty());
    }

    #[tokio::test]
    async fn test_bare_text_picks_innermost() {
        let mut page = page();
        let stat = query_one(&mut page, Locator::text("4+").within(Locator::css(".sobre-stats"))).await;
        assert_eq!(stat.tag, "span");
        assert_eq!(stat.attribute("class"), Some("stat-number"));
    }

    #[tokio::test]
    async fn test_visibility_rules() {
        let mut page = page();
        assert!(!query_one(&mut page, Locator::css("p.note")).await.visible);
        assert!(!query_one(&mut page, Locator::css(".buried")).await.visible);
        assert!(!query_one(&mut page, Locator::css(".ghost")).await.visible);
        assert!(query_one(&mut page, Locator::css(".shown")).await.visible);
        assert!(!query_one(&mut page, Locator::css("title")).await.visible);
    }

    #[tokio::test]
    async fn test_display_resolution() {
        let mut page = page();
        let images = page.query(&Locator::css("img"), &["display".to_string()]).await.unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].style("display"), Some("inline"));
        assert_eq!(images[1].style("display"), Some("none"));

        let section = query_one(&mut page, Locator::css("#sobre")).await;
        assert_eq!(section.style("display"), Some("block"));
    }

    #[tokio::test]
    async fn test_first_narrows() {
        let mut page = page();
        let all = page.query(&Locator::css("li"), &[]).await.unwrap();
        let first = page.query(&Locator::css("li").first(), &[]).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].text, "Sobre");
    }

    #[tokio::test]
    async fn test_title_is_normalized() {
        let mut page = page();
        assert_eq!(page.title().await.unwrap(), "José Pacheco | QA Engineer");
    }

    #[tokio::test]
    async fn test_fragment_click_stays_on_document() {
        let mut page = page();
        page.click(&Locator::contains("a", "Sobre"), Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(page.current_url().unwrap().as_str(), "http://127.0.0.1:1/#sobre");

        // nested text inside the link still follows it
        page.click(&Locator::text("Conversar"), Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(page.current_url().unwrap().fragment(), Some("contato"));
        assert!(page.document.is_some());
    }

    #[tokio::test]
    async fn test_click_without_navigation() {
        let mut page = page();
        page.click(&Locator::css("a.external"), Duration::from_millis(100)).await.unwrap();
        page.click(&Locator::css("a.mail"), Duration::from_millis(100)).await.unwrap();
        page.click(&Locator::css(".navbar-logo"), Duration::from_millis(100)).await.unwrap();
        assert_eq!(page.current_url().unwrap().as_str(), "http://127.0.0.1:1/");
    }

    #[tokio::test]
    async fn test_click_missing_or_hidden_times_out() {
        let mut page = page();
        let missing = page.click(&Locator::css("#nope"), Duration::from_millis(60)).await;
        assert!(matches!(missing, Err(E2eError::Timeout { .. })));

        let hidden = page.click(&Locator::css("p.note"), Duration::from_millis(60)).await;
        assert!(matches!(hidden, Err(E2eError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_invalid_selector() {
        let mut page = page();
        let result = page.query(&Locator::css("div[[["), &[]).await;
        assert!(matches!(result, Err(E2eError::InvalidSelector { .. })));
    }

    #[tokio::test]
    async fn test_query_before_navigation() {
        let mut page = StaticPage::new().unwrap();
        assert!(matches!(page.query(&Locator::css("a"), &[]).await, Err(E2eError::NoDocument)));
    }

    #[tokio::test]
    async fn test_viewport_recorded() {
        let mut page = page();
        page.set_viewport(Viewport::new(375, 812)).await.unwrap();
        assert_eq!(page.viewport(), Viewport::new(375, 812));
    }
}

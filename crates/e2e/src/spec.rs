//! Check and suite definitions, buildable in code or parsed from YAML

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::assertion::Assertion;
use crate::error::{E2eError, E2eResult};

/// Default browser window, matching what the suite was written against
pub const DEFAULT_VIEWPORT: Viewport = Viewport { width: 1000, height: 660 };

/// Named device presets accepted wherever a viewport is parsed
const PRESETS: &[(&str, Viewport)] = &[
    ("iphone-x", Viewport { width: 375, height: 812 }),
    ("iphone-6", Viewport { width: 375, height: 667 }),
    ("ipad-2", Viewport { width: 768, height: 1024 }),
    ("macbook-13", Viewport { width: 1280, height: 800 }),
    ("macbook-15", Viewport { width: 1440, height: 900 }),
    ("desktop", Viewport { width: 1920, height: 1080 }),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ViewportSpec")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn preset(name: &str) -> Option<Self> {
        PRESETS
            .iter()
            .find(|(preset, _)| preset.eq_ignore_ascii_case(name))
            .map(|(_, viewport)| *viewport)
    }

    pub fn preset_names() -> impl Iterator<Item = &'static str> {
        PRESETS.iter().map(|(name, _)| *name)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        DEFAULT_VIEWPORT
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Viewport {
    type Err = E2eError;

    /// Accepts a preset name (`iphone-x`) or explicit `WIDTHxHEIGHT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(viewport) = Viewport::preset(s) {
            return Ok(viewport);
        }

        let invalid = || {
            E2eError::Configuration(format!(
                "invalid viewport '{}': use WIDTHxHEIGHT or one of {}",
                s,
                Viewport::preset_names().collect::<Vec<_>>().join(", ")
            ))
        };

        let lower = s.to_ascii_lowercase();
        let (w, h) = lower.split_once('x').ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Viewport { width, height })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ViewportSpec {
    Named(String),
    Size { width: u32, height: u32 },
}

impl TryFrom<ViewportSpec> for Viewport {
    type Error = E2eError;

    fn try_from(spec: ViewportSpec) -> Result<Self, Self::Error> {
        match spec {
            ViewportSpec::Named(name) => name.parse(),
            ViewportSpec::Size { width, height } => Ok(Viewport { width, height }),
        }
    }
}

/// How to find elements on the page.
///
/// `css` alone behaves like `cy.get`; `css` plus `text` like `cy.contains(css, text)`;
/// `text` alone picks the deepest elements whose text contains it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LocatorSpec")]
pub struct Locator {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Scope: only descendants of this locator's matches are considered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub within: Option<Box<Locator>>,

    /// Keep only the first match
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub first: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LocatorSpec {
    #[serde(default)]
    css: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    within: Option<Box<Locator>>,
    #[serde(default)]
    first: bool,
}

impl TryFrom<LocatorSpec> for Locator {
    type Error = E2eError;

    fn try_from(spec: LocatorSpec) -> Result<Self, Self::Error> {
        if spec.css.is_none() && spec.text.is_none() {
            return Err(E2eError::SpecParse(
                "locator needs at least one of `css` or `text`".to_string(),
            ));
        }
        Ok(Locator {
            css: spec.css,
            text: spec.text,
            within: spec.within,
            first: spec.first,
        })
    }
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            css: Some(selector.into()),
            ..Default::default()
        }
    }

    pub fn contains(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            css: Some(selector.into()),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn within(mut self, scope: Locator) -> Self {
        self.within = Some(Box::new(scope));
        self
    }

    pub fn first(mut self) -> Self {
        self.first = true;
        self
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scope) = &self.within {
            write!(f, "{} >> ", scope)?;
        }
        match (&self.css, &self.text) {
            (Some(css), Some(text)) => write!(f, "{}:contains(\"{}\")", css, text)?,
            (Some(css), None) => write!(f, "{}", css)?,
            (None, Some(text)) => write!(f, "text=\"{}\"", text)?,
            (None, None) => write!(f, "*")?,
        }
        if self.first {
            write!(f, ":first")?;
        }
        Ok(())
    }
}

/// An action performed before a check's expectations are evaluated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Navigate to a URL, relative to the base URL
    Navigate {
        url: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Click the first element matching the target
    Click {
        target: Locator,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Resize the browser window
    Viewport {
        size: Viewport,
    },

    /// Wait until the target exists and is visible
    WaitFor {
        target: Locator,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
}

impl Step {
    pub fn name(&self) -> String {
        match self {
            Step::Navigate { url, .. } => format!("navigate:{}", url),
            Step::Click { target, .. } => format!("click:{}", target),
            Step::Viewport { size } => format!("viewport:{}", size),
            Step::WaitFor { target, .. } => format!("wait_for:{}", target),
        }
    }
}

/// What an assertion is evaluated against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    /// First match; collection assertions see the whole match set
    Element(Locator),
    /// Every match must satisfy the assertion
    Each(Locator),
    /// The document title
    Title,
}

impl Subject {
    pub fn locator(&self) -> Option<&Locator> {
        match self {
            Subject::Element(locator) | Subject::Each(locator) => Some(locator),
            Subject::Title => None,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Element(locator) => write!(f, "{}", locator),
            Subject::Each(locator) => write!(f, "each {}", locator),
            Subject::Title => write!(f, "title"),
        }
    }
}

impl From<Locator> for Subject {
    fn from(locator: Locator) -> Self {
        Subject::Element(locator)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectation {
    pub subject: Subject,
    #[serde(rename = "assert")]
    pub assertion: Assertion,
}

/// One independent, named verification against the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub description: String,

    #[serde(default)]
    pub steps: Vec<Step>,

    #[serde(default)]
    pub expect: Vec<Expectation>,

    /// Overrides the runner's command timeout for this check
    #[serde(default)]
    pub command_timeout_ms: Option<u64>,
}

impl Check {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            steps: Vec::new(),
            expect: Vec::new(),
            command_timeout_ms: None,
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn visit(self, url: impl Into<String>, timeout_ms: Option<u64>) -> Self {
        self.step(Step::Navigate {
            url: url.into(),
            timeout_ms,
        })
    }

    pub fn click(self, target: Locator) -> Self {
        self.step(Step::Click {
            target,
            timeout_ms: None,
        })
    }

    pub fn viewport(self, size: Viewport) -> Self {
        self.step(Step::Viewport { size })
    }

    pub fn expect(mut self, subject: impl Into<Subject>, assertion: Assertion) -> Self {
        self.expect.push(Expectation {
            subject: subject.into(),
            assertion,
        });
        self
    }

    pub fn expect_each(self, locator: Locator, assertion: Assertion) -> Self {
        self.expect(Subject::Each(locator), assertion)
    }
}

/// A named, ordered group of checks reported together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    pub name: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub checks: Vec<Check>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Parse a suite from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| E2eError::SpecParse(e.to_string()))
    }

    /// Parse a suite from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all suites from a directory, in path order
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        if !dir.is_dir() {
            return Err(E2eError::Configuration(format!(
                "suite directory not found: {}",
                dir.display()
            )));
        }

        let mut suites = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            suites.push(Self::from_file(entry.path())?);
        }

        Ok(suites)
    }

    /// Keep only checks whose description contains `pattern` (case-insensitive)
    pub fn retain_matching(&mut self, pattern: &str) {
        let pattern = pattern.to_lowercase();
        self.checks
            .retain(|check| check.description.to_lowercase().contains(&pattern));
    }
}

/// Narrow a suite list by name, tag and check description.
///
/// Empty `names` keeps every suite. Suites left without checks after the
/// description filter are dropped.
pub fn select_suites(
    suites: Vec<Suite>,
    names: &[String],
    tag: Option<&str>,
    grep: Option<&str>,
) -> Vec<Suite> {
    suites
        .into_iter()
        .filter(|s| names.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case(&s.name)))
        .filter(|s| tag.map(|t| s.tags.iter().any(|st| st == t)).unwrap_or(true))
        .filter_map(|mut s| match grep {
            Some(pattern) => {
                s.retain_matching(pattern);
                (!s.checks.is_empty()).then_some(s)
            }
            None => Some(s),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_presets_and_explicit() {
        assert_eq!("iphone-x".parse::<Viewport>().unwrap(), Viewport::new(375, 812));
        assert_eq!("iPad-2".parse::<Viewport>().unwrap(), Viewport::new(768, 1024));
        assert_eq!("1920x1080".parse::<Viewport>().unwrap(), Viewport::new(1920, 1080));
        assert!("1920".parse::<Viewport>().is_err());
        assert!("0x100".parse::<Viewport>().is_err());
        assert!("nokia-3310".parse::<Viewport>().is_err());
    }

    #[test]
    fn test_locator_display() {
        let locator = Locator::contains("a", "Sobre").within(Locator::css(".nav-menu"));
        assert_eq!(locator.to_string(), ".nav-menu >> a:contains(\"Sobre\")");
        assert_eq!(Locator::css(".servico-card").first().to_string(), ".servico-card:first");
    }

    #[test]
    fn test_parse_suite_yaml() {
        let yaml = r#"
name: Hero
tags: [smoke]
checks:
  - description: shows the hero on a phone
    steps:
      - action: viewport
        size: iphone-x
      - action: click
        target: { css: a, text: Ver Portfólio }
    expect:
      - subject: { kind: element, css: .hero }
        assert: { kind: visible }
      - subject: { kind: each, css: img }
        assert: { kind: css_not_equal, property: display, value: none }
      - subject: { kind: title }
        assert: { kind: text_contains, text: José Pacheco }
      - subject: { kind: element, css: p, within: { css: .sobre-text } }
        assert: { kind: length_greater_than, length: 0 }
"#;
        let suite = Suite::from_yaml(yaml).unwrap();
        assert_eq!(suite.name, "Hero");
        assert_eq!(suite.tags, vec!["smoke"]);

        let check = &suite.checks[0];
        assert_eq!(check.steps[0], Step::Viewport { size: Viewport::new(375, 812) });
        assert_eq!(
            check.steps[1],
            Step::Click { target: Locator::contains("a", "Ver Portfólio"), timeout_ms: None }
        );
        assert_eq!(check.expect.len(), 4);
        assert_eq!(check.expect[1].subject, Subject::Each(Locator::css("img")));
        assert_eq!(check.expect[2].subject, Subject::Title);
        assert_eq!(
            check.expect[3].assertion,
            Assertion::LengthGreaterThan { length: 0 }
        );
    }

    #[test]
    fn test_parse_explicit_viewport_size() {
        let yaml = r#"
name: Responsive
checks:
  - description: desktop
    steps:
      - action: viewport
        size: { width: 1920, height: 1080 }
"#;
        let suite = Suite::from_yaml(yaml).unwrap();
        assert_eq!(suite.checks[0].steps[0], Step::Viewport { size: Viewport::new(1920, 1080) });
    }

    #[test]
    fn test_parse_rejects_unknown_action() {
        let yaml = r#"
name: Broken
checks:
  - description: hover is not a step
    steps:
      - action: hover
        target: { css: a }
"#;
        assert!(matches!(Suite::from_yaml(yaml), Err(E2eError::SpecParse(_))));
    }

    #[test]
    fn test_parse_rejects_misspelled_locator_key() {
        let yaml = r#"
name: Banner
checks:
  - description: shows the cookie banner
    expect:
      - subject: { kind: element, selector: .cookie-banner }
        assert: { kind: visible }
"#;
        let err = Suite::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, E2eError::SpecParse(_)));
        assert!(err.to_string().contains("selector"));
    }

    #[test]
    fn test_parse_rejects_empty_locator() {
        let subject = r#"
name: Banner
checks:
  - description: shows the cookie banner
    expect:
      - subject: { kind: each, first: true }
        assert: { kind: visible }
"#;
        assert!(matches!(Suite::from_yaml(subject), Err(E2eError::SpecParse(_))));

        let scope = r#"
name: Services
checks:
  - description: cards inside an empty scope
    expect:
      - subject: { kind: element, css: .servico-card, within: {} }
        assert: { kind: length_greater_than, length: 0 }
"#;
        assert!(matches!(Suite::from_yaml(scope), Err(E2eError::SpecParse(_))));

        let step = r#"
name: Clicks
checks:
  - description: click nothing
    steps:
      - action: click
        target: {}
"#;
        assert!(matches!(Suite::from_yaml(step), Err(E2eError::SpecParse(_))));
    }

    #[test]
    fn test_select_suites() {
        let suites = vec![
            Suite::new("Navigation").tag("smoke").check(Check::new("displays the navbar")).check(Check::new("has links")),
            Suite::new("Hero").check(Check::new("displays the hero")),
        ];

        let picked = select_suites(suites.clone(), &["navigation".into()], None, None);
        assert_eq!(picked.len(), 1);

        let picked = select_suites(suites.clone(), &[], Some("smoke"), None);
        assert_eq!(picked[0].name, "Navigation");

        let picked = select_suites(suites, &[], None, Some("DISPLAYS"));
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].checks.len(), 1);
    }

    #[test]
    fn test_load_all_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "name: Second\n").unwrap();
        std::fs::write(dir.path().join("a.yml"), "name: First\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let suites = Suite::load_all(dir.path()).unwrap();
        let names: Vec<_> = suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }
}

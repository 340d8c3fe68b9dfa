//! Check runner: resets the page, runs steps, polls expectations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::assertion::{Assertion, Observed};
use crate::error::{E2eError, E2eResult};
use crate::page::Page;
use crate::probe::probe_target;
use crate::report::{RunReport, SuiteReport};
use crate::spec::{Check, Expectation, Step, Subject, Suite, Viewport};

/// Default wait for element queries and clicks
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(4000);

/// Default wait for a document load
pub const DEFAULT_PAGE_LOAD_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default pause between two polls of the same expectation
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default bound on the reachability probe run before any check
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
    Incomplete,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => write!(f, "pass"),
            Outcome::Fail => write!(f, "fail"),
            Outcome::Incomplete => write!(f, "incomplete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Observed value never matched the expected one
    Assertion,
    /// Element or navigation did not materialize in time
    Timeout,
    /// Driver or setup error
    Error,
    /// Run cancelled while the check was pending or in flight
    Aborted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Assertion => write!(f, "AssertionError"),
            FailureKind::Timeout => write!(f, "TimeoutError"),
            FailureKind::Error => write!(f, "Error"),
            FailureKind::Aborted => write!(f, "Aborted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<String>,
    /// Position of the offending element for `each` expectations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl Failure {
    fn from_error(err: E2eError) -> Self {
        let kind = if err.is_timeout() {
            FailureKind::Timeout
        } else {
            FailureKind::Error
        };
        Self {
            kind,
            detail: err.to_string(),
            expected: None,
            observed: None,
            index: None,
        }
    }

    fn aborted(detail: &str) -> Self {
        Self {
            kind: FailureKind::Aborted,
            detail: detail.to_string(),
            expected: None,
            observed: None,
            index: None,
        }
    }

    fn during(mut self, what: &str) -> Self {
        self.detail = format!("{}: {}", what, self.detail);
        self
    }
}

/// Outcome of one check in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub suite: String,
    pub check: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    pub duration_ms: u64,
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Pass
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub base_url: Url,
    /// Viewport every check starts from
    pub viewport: Viewport,
    pub command_timeout: Duration,
    pub page_load_timeout: Duration,
    pub poll_interval: Duration,
    pub probe_timeout: Duration,
}

impl RunnerConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            viewport: Viewport::default(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            page_load_timeout: DEFAULT_PAGE_LOAD_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Why the last poll of an expectation did not pass
enum Miss {
    Missing,
    Mismatch {
        observed: String,
        index: Option<usize>,
    },
}

/// Sequential runner owning a single page session
pub struct Runner<P: Page> {
    page: P,
    config: RunnerConfig,
    cancel: CancellationToken,
}

impl<P: Page> Runner<P> {
    pub fn new(page: P, config: RunnerConfig) -> Self {
        Self {
            page,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort the run when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    /// Release the page session
    pub async fn close(&mut self) -> E2eResult<()> {
        self.page.close().await
    }

    /// Fail fast when the target cannot be reached at all
    pub async fn preflight(&self) -> E2eResult<()> {
        probe_target(&self.config.base_url, self.config.probe_timeout).await
    }

    /// Probe the target, then run every suite in order
    pub async fn run_all(&mut self, suites: &[Suite]) -> E2eResult<RunReport> {
        let token = self.cancel.clone();
        tokio::select! {
            biased;
            _ = token.cancelled() => warn!("Run aborted while probing {}", self.config.base_url),
            probed = self.preflight() => probed?,
        }

        let started_at = chrono::Utc::now();
        let start = Instant::now();
        let total: usize = suites.iter().map(|s| s.checks.len()).sum();
        info!("Running {} check(s) in {} suite(s) against {}", total, suites.len(), self.config.base_url);

        let mut reports = Vec::with_capacity(suites.len());
        for suite in suites {
            let results = self.run(suite).await;
            reports.push(SuiteReport {
                name: suite.name.clone(),
                results,
            });
        }

        let report = RunReport::new(
            self.config.base_url.to_string(),
            started_at,
            start.elapsed().as_millis() as u64,
            reports,
        );

        info!("");
        info!(
            "Results: {} passed, {} failed, {} incomplete ({} ms)",
            report.passed, report.failed, report.incomplete, report.duration_ms
        );

        Ok(report)
    }

    /// Run one suite; yields exactly one result per check, in order
    pub async fn run(&mut self, suite: &Suite) -> Vec<CheckResult> {
        info!("{} ({} checks)", suite.name, suite.checks.len());

        let mut results = Vec::with_capacity(suite.checks.len());

        for check in &suite.checks {
            if self.cancel.is_cancelled() {
                results.push(CheckResult {
                    suite: suite.name.clone(),
                    check: check.description.clone(),
                    outcome: Outcome::Incomplete,
                    failure: Some(Failure::aborted("run aborted before the check started")),
                    duration_ms: 0,
                });
                continue;
            }

            let start = Instant::now();
            let token = self.cancel.clone();
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = self.run_check(check) => Some(result),
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            let (outcome, failure) = match result {
                Some(Ok(())) => {
                    info!("  ✓ {} ({} ms)", check.description, duration_ms);
                    (Outcome::Pass, None)
                }
                Some(Err(failure)) => {
                    error!("  ✗ {} - {}: {}", check.description, failure.kind, failure.detail);
                    (Outcome::Fail, Some(failure))
                }
                None => {
                    warn!("  … {} abandoned, run aborted", check.description);
                    (Outcome::Incomplete, Some(Failure::aborted("run aborted while the check was running")))
                }
            };

            results.push(CheckResult {
                suite: suite.name.clone(),
                check: check.description.clone(),
                outcome,
                failure,
                duration_ms,
            });
        }

        results
    }

    async fn run_check(&mut self, check: &Check) -> Result<(), Failure> {
        debug!("Running check: {}", check.description);

        let command_timeout = check
            .command_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.command_timeout);

        // Every check starts from the default viewport on a fresh load of the base URL
        self.page
            .set_viewport(self.config.viewport)
            .await
            .map_err(|e| Failure::from_error(e).during("reset viewport"))?;
        self.page
            .goto(&self.config.base_url, self.config.page_load_timeout)
            .await
            .map_err(|e| Failure::from_error(e).during("reset navigation"))?;

        for step in &check.steps {
            debug!("  step {}", step.name());
            self.run_step(step, command_timeout).await?;
        }

        for expectation in &check.expect {
            self.verify(expectation, command_timeout).await?;
        }

        Ok(())
    }

    async fn run_step(&mut self, step: &Step, command_timeout: Duration) -> Result<(), Failure> {
        let name = step.name();
        let result = match step {
            Step::Navigate { url, timeout_ms } => {
                let timeout = timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(self.config.page_load_timeout);
                match self.config.base_url.join(url) {
                    Ok(target) => self.page.goto(&target, timeout).await,
                    Err(e) => Err(E2eError::Url(e)),
                }
            }
            Step::Click { target, timeout_ms } => {
                let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(command_timeout);
                self.page.click(target, timeout).await
            }
            Step::Viewport { size } => self.page.set_viewport(*size).await,
            Step::WaitFor { target, timeout_ms } => {
                let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(command_timeout);
                let expectation = Expectation {
                    subject: Subject::Element(target.clone()),
                    assertion: Assertion::Visible,
                };
                return self.verify(&expectation, timeout).await.map_err(|f| f.during(&name));
            }
        };

        result.map_err(|e| Failure::from_error(e).during(&name))
    }

    /// Poll until the expectation holds or `timeout` elapses
    async fn verify(&mut self, expectation: &Expectation, timeout: Duration) -> Result<(), Failure> {
        let deadline = Instant::now() + timeout;
        let properties: Vec<String> = expectation
            .assertion
            .css_property()
            .map(|p| vec![p.to_string()])
            .unwrap_or_default();

        loop {
            let probe = self
                .observe(expectation, &properties)
                .await
                .map_err(|e| Failure::from_error(e).during(&expectation.subject.to_string()))?;

            match probe {
                None => return Ok(()),
                Some(miss) if Instant::now() >= deadline => {
                    return Err(failure_for(expectation, miss, timeout));
                }
                Some(_) => {}
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn observe(
        &mut self,
        expectation: &Expectation,
        properties: &[String],
    ) -> E2eResult<Option<Miss>> {
        let assertion = &expectation.assertion;

        let (locator, each) = match &expectation.subject {
            Subject::Title => {
                let title = self.page.title().await?;
                return Ok(judge(assertion, Observed::Text(&title)));
            }
            Subject::Element(locator) => (locator, false),
            Subject::Each(locator) => (locator, true),
        };

        let found = self.page.query(locator, properties).await?;

        if assertion.is_collection() {
            // Zero matches only count when the enclosing scope itself exists
            if found.is_empty() {
                if let Some(scope) = &locator.within {
                    if self.page.query(scope, &[]).await?.is_empty() {
                        return Ok(Some(Miss::Missing));
                    }
                }
            }
            return Ok(judge(assertion, Observed::Count(found.len())));
        }

        if !each {
            return Ok(match found.first() {
                Some(el) => judge(assertion, Observed::Element(el)),
                None => Some(Miss::Missing),
            });
        }

        if found.is_empty() {
            return Ok(Some(Miss::Missing));
        }

        for (index, el) in found.iter().enumerate() {
            if !assertion.evaluate(Observed::Element(el)) {
                return Ok(Some(Miss::Mismatch {
                    observed: format!("{} {}", el.label(), assertion.observed(Observed::Element(el))),
                    index: Some(index),
                }));
            }
        }

        Ok(None)
    }
}

fn failure_for(expectation: &Expectation, miss: Miss, timeout: Duration) -> Failure {
    let subject = expectation.subject.to_string();
    let expected = expectation.assertion.expected();

    match miss {
        Miss::Missing => Failure {
            kind: FailureKind::Timeout,
            detail: E2eError::timeout(format!("element {}", subject), timeout).to_string(),
            expected: Some(expected),
            observed: None,
            index: None,
        },
        Miss::Mismatch { observed, index } => {
            let detail = match index {
                Some(i) => format!(
                    "element #{} of {}: expected {}, observed {}",
                    i, subject, expected, observed
                ),
                None => format!("{}: expected {}, observed {}", subject, expected, observed),
            };
            Failure {
                kind: FailureKind::Assertion,
                detail,
                expected: Some(expected),
                observed: Some(observed),
                index,
            }
        }
    }
}

fn judge(assertion: &Assertion, observed: Observed<'_>) -> Option<Miss> {
    if assertion.evaluate(observed) {
        None
    } else {
        Some(Miss::Mismatch {
            observed: assertion.observed(observed),
            index: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Element;
    use crate::spec::Locator;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Scripted page: answers queries from a table keyed by locator text
    #[derive(Default)]
    struct FakePage {
        elements: HashMap<String, Vec<Element>>,
        /// Queries a locator must receive before its elements show up
        appear_after: HashMap<String, usize>,
        queries: HashMap<String, usize>,
        title: String,
        url: Option<Url>,
        gotos: Vec<(String, Duration)>,
        viewports: Vec<Viewport>,
        clicks: Vec<String>,
        query_delay: Option<Duration>,
        fail_goto: bool,
    }

    impl FakePage {
        fn with(mut self, locator: &Locator, elements: Vec<Element>) -> Self {
            self.elements.insert(locator.to_string(), elements);
            self
        }
    }

    fn visible(tag: &str, text: &str) -> Element {
        let mut el = Element::new(tag);
        el.text = text.to_string();
        el.visible = true;
        el
    }

    #[async_trait]
    impl Page for FakePage {
        async fn goto(&mut self, url: &Url, timeout: Duration) -> E2eResult<()> {
            if self.fail_goto {
                return Err(E2eError::timeout(format!("navigation to {}", url), timeout));
            }
            self.gotos.push((url.to_string(), timeout));
            self.url = Some(url.clone());
            Ok(())
        }

        async fn set_viewport(&mut self, viewport: Viewport) -> E2eResult<()> {
            self.viewports.push(viewport);
            Ok(())
        }

        async fn query(&mut self, locator: &Locator, _properties: &[String]) -> E2eResult<Vec<Element>> {
            if let Some(delay) = self.query_delay {
                tokio::time::sleep(delay).await;
            }
            let key = locator.to_string();
            let seen = self.queries.entry(key.clone()).or_insert(0);
            *seen += 1;
            if *seen <= self.appear_after.get(&key).copied().unwrap_or(0) {
                return Ok(Vec::new());
            }
            Ok(self.elements.get(&key).cloned().unwrap_or_default())
        }

        async fn click(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<()> {
            if !self.elements.contains_key(&locator.to_string()) {
                return Err(E2eError::timeout(format!("clickable {}", locator), timeout));
            }
            self.clicks.push(locator.to_string());
            Ok(())
        }

        async fn title(&mut self) -> E2eResult<String> {
            Ok(self.title.clone())
        }

        fn current_url(&self) -> Option<&Url> {
            self.url.as_ref()
        }
    }

    fn config() -> RunnerConfig {
        let mut config = RunnerConfig::new(Url::parse("http://127.0.0.1:9/").unwrap());
        config.command_timeout = Duration::from_millis(60);
        config.poll_interval = Duration::from_millis(5);
        config
    }

    fn runner(page: FakePage) -> Runner<FakePage> {
        Runner::new(page, config())
    }

    #[tokio::test]
    async fn test_empty_suite_yields_nothing() {
        let mut runner = runner(FakePage::default());
        let results = runner.run(&Suite::new("Empty")).await;
        assert!(results.is_empty());
        assert!(runner.page().gotos.is_empty());
    }

    #[tokio::test]
    async fn test_one_result_per_check_in_order_and_continue_on_failure() {
        let navbar = Locator::css(".navbar");
        let page = FakePage::default().with(&navbar, vec![visible("nav", "José Pacheco")]);
        let suite = Suite::new("Navigation")
            .check(Check::new("missing hero").expect(Locator::css(".hero"), Assertion::Visible))
            .check(Check::new("navbar").expect(navbar.clone(), Assertion::Visible))
            .check(Check::new("wrong logo").expect(navbar, Assertion::text_contains("Maria")));

        let mut runner = runner(page);
        let results = runner.run(&suite).await;

        let summary: Vec<_> = results.iter().map(|r| (r.check.as_str(), r.outcome)).collect();
        assert_eq!(
            summary,
            vec![
                ("missing hero", Outcome::Fail),
                ("navbar", Outcome::Pass),
                ("wrong logo", Outcome::Fail),
            ]
        );
        assert!(results.iter().all(|r| r.suite == "Navigation"));
    }

    #[tokio::test]
    async fn test_missing_element_is_timeout_and_mismatch_is_assertion() {
        let logo = Locator::css(".navbar-logo");
        let page = FakePage::default().with(&logo, vec![visible("div", "Outro Nome")]);
        let suite = Suite::new("Navigation")
            .check(Check::new("missing").expect(Locator::css(".hero"), Assertion::Visible))
            .check(Check::new("mismatch").expect(logo, Assertion::text_contains("José Pacheco")));

        let results = runner(page).run(&suite).await;

        let missing = results[0].failure.as_ref().unwrap();
        assert_eq!(missing.kind, FailureKind::Timeout);
        assert!(missing.detail.contains(".hero"));

        let mismatch = results[1].failure.as_ref().unwrap();
        assert_eq!(mismatch.kind, FailureKind::Assertion);
        assert_eq!(mismatch.expected.as_deref(), Some("text containing \"José Pacheco\""));
        assert_eq!(mismatch.observed.as_deref(), Some("text \"Outro Nome\""));
    }

    #[tokio::test]
    async fn test_each_names_failing_index() {
        let images = Locator::css("img");
        let mut shown = Element::new("img");
        shown.styles.insert("display".into(), "inline".into());
        let mut hidden = Element::new("img");
        hidden.attributes.insert("src".into(), "b.png".into());
        hidden.styles.insert("display".into(), "none".into());

        let page = FakePage::default().with(&images, vec![shown.clone(), hidden, shown]);
        let suite = Suite::new("Load Performance").check(
            Check::new("images").expect_each(images, Assertion::css_not_equal("display", "none")),
        );

        let results = runner(page).run(&suite).await;
        let failure = results[0].failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::Assertion);
        assert_eq!(failure.index, Some(1));
        assert!(failure.detail.starts_with("element #1 of each img"));
        assert!(failure.detail.contains("b.png"));
    }

    #[tokio::test]
    async fn test_each_with_no_match_times_out() {
        let suite = Suite::new("Load Performance").check(
            Check::new("images").expect_each(Locator::css("img"), Assertion::css_not_equal("display", "none")),
        );
        let results = runner(FakePage::default()).run(&suite).await;
        assert_eq!(results[0].failure.as_ref().unwrap().kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_empty_collection_is_assertion_failure() {
        let grid = Locator::css(".servicos-grid");
        let cards = Locator::css(".servico-card").within(grid.clone());
        let suite = Suite::new("Services")
            .check(Check::new("cards").expect(cards, Assertion::length_greater_than(0)));

        let page = FakePage::default().with(&grid, vec![visible("div", "")]);
        let results = runner(page).run(&suite).await;
        let failure = results[0].failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::Assertion);
        assert_eq!(failure.observed.as_deref(), Some("0 elements"));
    }

    #[tokio::test]
    async fn test_collection_with_missing_scope_times_out() {
        let cards = Locator::css(".servico-card").within(Locator::css(".servicos-grid"));
        let suite = Suite::new("Services")
            .check(Check::new("cards").expect(cards, Assertion::length_greater_than(0)));

        let results = runner(FakePage::default()).run(&suite).await;
        let failure = results[0].failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert!(failure.detail.contains(".servicos-grid"));
        assert_eq!(failure.observed, None);
    }

    #[tokio::test]
    async fn test_polls_until_element_appears() {
        let hero = Locator::css(".hero");
        let mut page = FakePage::default().with(&hero, vec![visible("section", "")]);
        page.appear_after.insert(hero.to_string(), 3);

        let suite = Suite::new("Hero").check(Check::new("hero").expect(hero.clone(), Assertion::Visible));
        let mut runner = runner(page);
        let results = runner.run(&suite).await;

        assert_eq!(results[0].outcome, Outcome::Pass);
        assert_eq!(runner.page().queries[&hero.to_string()], 4);
    }

    #[tokio::test]
    async fn test_every_check_resets_viewport_and_page() {
        let navbar = Locator::css(".navbar");
        let page = FakePage::default().with(&navbar, vec![visible("nav", "")]);
        let suite = Suite::new("Responsiveness")
            .check(
                Check::new("mobile")
                    .viewport(Viewport::new(375, 812))
                    .expect(navbar.clone(), Assertion::Visible),
            )
            .check(Check::new("default").expect(navbar, Assertion::Visible));

        let mut runner = runner(page);
        runner.run(&suite).await;

        let page = runner.page();
        assert_eq!(
            page.viewports,
            vec![Viewport::default(), Viewport::new(375, 812), Viewport::default()]
        );
        assert_eq!(page.gotos.len(), 2);
        assert!(page.gotos.iter().all(|(url, _)| url == "http://127.0.0.1:9/"));
    }

    #[tokio::test]
    async fn test_navigate_step_uses_its_own_timeout() {
        let hero = Locator::css(".hero");
        let page = FakePage::default().with(&hero, vec![visible("section", "")]);
        let suite = Suite::new("Load Performance").check(
            Check::new("loads in 3s")
                .visit("/", Some(3000))
                .expect(hero, Assertion::Visible),
        );

        let mut runner = runner(page);
        let results = runner.run(&suite).await;
        assert_eq!(results[0].outcome, Outcome::Pass);

        let gotos = &runner.page().gotos;
        assert_eq!(gotos[0].1, DEFAULT_PAGE_LOAD_TIMEOUT);
        assert_eq!(gotos[1], ("http://127.0.0.1:9/".to_string(), Duration::from_millis(3000)));
    }

    #[tokio::test]
    async fn test_click_step_failure_is_reported_with_step() {
        let suite = Suite::new("Click-through")
            .check(Check::new("portfolio").click(Locator::contains("a", "Ver Portfólio")));

        let results = runner(FakePage::default()).run(&suite).await;
        let failure = results[0].failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert!(failure.detail.starts_with("click:a:contains(\"Ver Portfólio\")"));
    }

    #[tokio::test]
    async fn test_reset_failure_fails_the_check_only() {
        let mut page = FakePage::default();
        page.fail_goto = true;
        let suite = Suite::new("Hero")
            .check(Check::new("a"))
            .check(Check::new("b"));

        let results = runner(page).run(&suite).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.outcome == Outcome::Fail));
        assert!(results[0].failure.as_ref().unwrap().detail.starts_with("reset navigation"));
    }

    #[tokio::test]
    async fn test_title_subject() {
        let page = FakePage {
            title: "José Pacheco | QA Engineer".into(),
            ..Default::default()
        };
        let suite = Suite::new("Accessibility")
            .check(Check::new("title").expect(Subject::Title, Assertion::text_contains("José Pacheco")))
            .check(Check::new("exact").expect(Subject::Title, Assertion::text_equals("José Pacheco")));

        let results = runner(page).run(&suite).await;
        assert_eq!(results[0].outcome, Outcome::Pass);
        assert_eq!(results[1].failure.as_ref().unwrap().kind, FailureKind::Assertion);
    }

    #[tokio::test]
    async fn test_runs_are_idempotent() {
        let logo = Locator::css(".navbar-logo");
        let page = FakePage::default().with(&logo, vec![visible("div", "José Pacheco")]);
        let suite = Suite::new("Navigation")
            .check(Check::new("logo").expect(logo, Assertion::text_contains("José Pacheco")))
            .check(Check::new("hero").expect(Locator::css(".hero"), Assertion::Visible));

        let mut runner = runner(page);
        let first: Vec<_> = runner.run(&suite).await.into_iter().map(|r| (r.outcome, r.failure.map(|f| f.kind))).collect();
        let second: Vec<_> = runner.run(&suite).await.into_iter().map(|r| (r.outcome, r.failure.map(|f| f.kind))).collect();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_marks_everything_incomplete() {
        let token = CancellationToken::new();
        token.cancel();
        let suite = Suite::new("Hero").check(Check::new("a")).check(Check::new("b"));

        let mut runner = runner(FakePage::default()).with_cancellation(token);
        let results = runner.run(&suite).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.outcome == Outcome::Incomplete));
        assert!(runner.page().gotos.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_abandons_in_flight_check() {
        let hero = Locator::css(".hero");
        let mut page = FakePage::default().with(&hero, vec![visible("section", "")]);
        page.query_delay = Some(Duration::from_secs(30));

        let suite = Suite::new("Hero")
            .check(Check::new("slow").expect(hero.clone(), Assertion::Visible))
            .check(Check::new("never started").expect(hero, Assertion::Visible));

        let mut runner = runner(page);
        let token = runner.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            token.cancel();
        });

        let results = runner.run(&suite).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].outcome, Outcome::Incomplete);
        assert!(results[0].failure.as_ref().unwrap().detail.contains("while the check was running"));
        assert_eq!(results[1].outcome, Outcome::Incomplete);
        assert_eq!(results[1].duration_ms, 0);
    }

    #[tokio::test]
    async fn test_cancel_during_preflight_stops_waiting() {
        let mut config = config();
        config.probe_timeout = Duration::from_secs(30);
        let suite = Suite::new("Hero").check(Check::new("a")).check(Check::new("b"));

        let mut runner = Runner::new(FakePage::default(), config);
        let token = runner.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let start = Instant::now();
        let report = runner.run_all(std::slice::from_ref(&suite)).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(report.total, 2);
        assert_eq!(report.incomplete, 2);
        assert!(!report.success());
        assert!(runner.page().gotos.is_empty());
    }
}

//! Folio content verification runner
//!
//! This crate checks a deployed one-page site against a catalog of content
//! checks:
//! - Drives a page session through the [`Page`] trait (static fetch or Playwright)
//! - Runs checks sequentially, resetting the page before each one
//! - Polls every expectation until it holds or its timeout elapses
//! - Parses declarative YAML suites next to the built-in landing-page catalog
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Verification Runner (Rust)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Runner<P: Page>                                            │
//! │    ├── preflight() -> probe base URL                        │
//! │    ├── run(suite) -> Vec<CheckResult>                       │
//! │    └── run_all(suites) -> RunReport                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page                                                       │
//! │    ├── StaticPage      (reqwest + scraper)                  │
//! │    └── PlaywrightPage  (node bridge, JSON lines)            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Suite (code or YAML)                                       │
//! │    └── checks: [Check]                                      │
//! │          ├── steps: navigate | click | viewport | wait_for  │
//! │          └── expect: [subject + assertion]                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod assertion;
pub mod catalog;
pub mod config;
pub mod error;
pub mod page;
pub mod playwright;
pub mod probe;
pub mod report;
pub mod runner;
pub mod site;
pub mod spec;
pub mod static_page;

pub use assertion::Assertion;
pub use config::{DriverKind, Settings};
pub use error::{E2eError, E2eResult};
pub use page::{Element, Page};
pub use playwright::{Browser, PlaywrightConfig, PlaywrightPage};
pub use report::{RunReport, SuiteReport};
pub use runner::{CheckResult, Failure, FailureKind, Outcome, Runner, RunnerConfig};
pub use site::SiteServer;
pub use spec::{select_suites, Check, Expectation, Locator, Step, Subject, Suite, Viewport};
pub use static_page::StaticPage;

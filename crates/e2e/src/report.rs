//! Run reports and their JSON artifact

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::E2eResult;
use crate::runner::{CheckResult, Outcome};

/// File name of the report written into the output directory
pub const RESULTS_FILE: &str = "test-results.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub name: String,
    pub results: Vec<CheckResult>,
}

impl SuiteReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn success(&self) -> bool {
        self.results.iter().all(CheckResult::passed)
    }
}

/// Result of running all selected suites
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub base_url: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub incomplete: usize,
    pub suites: Vec<SuiteReport>,
}

impl RunReport {
    pub fn new(
        base_url: String,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        suites: Vec<SuiteReport>,
    ) -> Self {
        let count = |outcome| suites.iter().map(|s| s.count(outcome)).sum::<usize>();
        let passed = count(Outcome::Pass);
        let failed = count(Outcome::Fail);
        let incomplete = count(Outcome::Incomplete);

        Self {
            base_url,
            started_at,
            duration_ms,
            total: passed + failed + incomplete,
            passed,
            failed,
            incomplete,
            suites,
        }
    }

    /// True when every check passed; an empty run passes
    pub fn success(&self) -> bool {
        self.failed == 0 && self.incomplete == 0
    }

    pub fn results(&self) -> impl Iterator<Item = &CheckResult> {
        self.suites.iter().flat_map(|s| s.results.iter())
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results().filter(|r| r.outcome == Outcome::Fail)
    }

    /// Write the report as pretty JSON into `dir`
    pub fn write_results(&self, dir: &Path) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let path = dir.join(RESULTS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to {}", path.display());
        Ok(path)
    }

    pub fn read_results(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

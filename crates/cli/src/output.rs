//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use folio_e2e::{CheckResult, Outcome, RunReport, Suite};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for CheckResult {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Check", "Outcome", "Duration", "Detail"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.suite.clone(),
            self.check.clone(),
            outcome_label(self.outcome),
            format!("{} ms", self.duration_ms),
            self.failure
                .as_ref()
                .map(|f| format!("{}: {}", f.kind, f.detail))
                .unwrap_or_default(),
        ]
    }
}

/// One row per check of a suite listing
#[derive(Serialize)]
pub struct CheckListing {
    pub suite: String,
    pub check: String,
    pub tags: Vec<String>,
    pub steps: usize,
    pub expectations: usize,
}

impl CheckListing {
    pub fn from_suites(suites: &[Suite]) -> Vec<Self> {
        suites
            .iter()
            .flat_map(|suite| {
                suite.checks.iter().map(move |check| CheckListing {
                    suite: suite.name.clone(),
                    check: check.description.clone(),
                    tags: suite.tags.clone(),
                    steps: check.steps.len(),
                    expectations: check.expect.len(),
                })
            })
            .collect()
    }
}

impl TableDisplay for CheckListing {
    fn headers() -> Vec<&'static str> {
        vec!["Suite", "Check", "Tags", "Steps", "Expectations"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.suite.clone(),
            self.check.clone(),
            self.tags.join(", "),
            self.steps.to_string(),
            self.expectations.to_string(),
        ]
    }
}

fn outcome_label(outcome: Outcome) -> String {
    match outcome {
        Outcome::Pass => "✓ pass".green().to_string(),
        Outcome::Fail => "✗ fail".red().to_string(),
        Outcome::Incomplete => "… incomplete".yellow().to_string(),
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print a run report: per-check results, then the summary
pub fn print_report(report: &RunReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(report).unwrap_or_default());
        }
        OutputFormat::Table => {
            let results: Vec<CheckResult> = report.results().cloned().collect();
            print_list(&results, format);
            print_summary(report);
        }
        OutputFormat::Plain => {
            for suite in &report.suites {
                println!("{}", suite.name.bold());
                for result in &suite.results {
                    println!("  {} {} ({} ms)", outcome_label(result.outcome), result.check, result.duration_ms);
                    if let Some(failure) = &result.failure {
                        println!("      {}: {}", failure.kind, failure.detail.dimmed());
                    }
                }
            }
            print_summary(report);
        }
    }
}

fn print_summary(report: &RunReport) {
    println!();
    let summary = format!(
        "{} passed, {} failed, {} incomplete of {} checks in {} ms",
        report.passed, report.failed, report.incomplete, report.total, report.duration_ms
    );
    if report.success() {
        print_success(&summary);
    } else {
        print_error(&summary);
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

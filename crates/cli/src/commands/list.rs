//! `folio list`: show the suites and checks a run would execute

use clap::Args;
use std::path::PathBuf;

use folio_e2e::{select_suites, Settings};

use crate::output::{self, CheckListing, OutputFormat};

#[derive(Args)]
pub struct ListArgs {
    /// Directory of YAML suites (default: built-in landing-page catalog)
    #[arg(long)]
    pub specs: Option<PathBuf>,

    /// Only suites with this name (repeatable)
    #[arg(long = "suite")]
    pub suites: Vec<String>,

    /// Only suites carrying this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Only checks whose description contains this text
    #[arg(long)]
    pub grep: Option<String>,
}

pub fn execute(args: ListArgs, settings: Settings, format: OutputFormat) -> anyhow::Result<()> {
    let specs = args.specs.or(settings.specs_dir);
    let suites = super::load_suites(specs.as_deref())?;
    let suites = select_suites(suites, &args.suites, args.tag.as_deref(), args.grep.as_deref());

    output::print_list(&CheckListing::from_suites(&suites), format);
    Ok(())
}

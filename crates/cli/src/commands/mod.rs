//! CLI Commands

pub mod list;
pub mod run;

use std::path::Path;

use folio_e2e::{catalog, Suite};

/// YAML suites from `specs` when given, the built-in catalog otherwise
pub fn load_suites(specs: Option<&Path>) -> anyhow::Result<Vec<Suite>> {
    match specs {
        Some(dir) => Ok(Suite::load_all(dir)?),
        None => Ok(catalog::landing_page()),
    }
}

//! Validate command - check a spec without resolving it.

use datumkit_core::{Config, Validator};
use std::path::Path;

/// Run the validate command.
pub fn run(config: Config, spec_path: &Path) -> anyhow::Result<()> {
    let spec = super::read_spec(spec_path)?;
    Validator::new(config.validation.output_repo.as_str()).validate(&spec)?;

    println!("OK: {}", spec.summary());
    println!("{} input(s)", spec.atoms().len());
    Ok(())
}

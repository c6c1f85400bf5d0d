//! Subcommand implementations and shared output helpers.

pub mod browse;
pub mod config;
pub mod list;
pub mod mount;
pub mod validate;

use anyhow::Context;
use datumkit_core::{Datum, DatumStatus, InputSpec};
use std::io::Read;
use std::path::Path;

/// Read and parse a spec document; "-" reads stdin.
pub fn read_spec(path: &Path) -> anyhow::Result<InputSpec> {
    let text = if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading spec from stdin")?;
        text
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading spec {}", path.display()))?
    };
    Ok(InputSpec::from_json(&text)?)
}

/// One-line cursor summary
pub fn format_status(status: &DatumStatus) -> String {
    let total = if status.all_datums_received {
        status.num_datums.to_string()
    } else {
        format!("{}+", status.num_datums)
    };
    format!("datum {} of {} [{}]", status.idx + 1, total, status.id)
}

/// Multi-line rendering of a datum's bindings.
pub fn format_datum(datum: &Datum) -> String {
    let mut out = String::new();
    for (alias, binding) in datum.file_bindings() {
        out.push_str(&format!(
            "  {} <- {}/{}@{} ({})\n",
            alias,
            binding.project,
            binding.repo,
            binding.branch,
            short_commit(&binding.commit)
        ));
        for path in &binding.paths {
            out.push_str(&format!("      {}\n", path));
        }
    }
    out
}

fn short_commit(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_spec_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spec.json");
        std::fs::write(&path, r#"{"input": {"pfs": {"repo": "a", "glob": "/*"}}}"#).unwrap();

        let spec = read_spec(&path).unwrap();
        assert_eq!(spec.summary(), "a:/*");
        assert!(read_spec(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_format_status_marks_partial_counts() {
        let mut status = DatumStatus {
            id: "0badf00d".to_string(),
            idx: 0,
            num_datums: 1000,
            all_datums_received: false,
        };
        assert_eq!(format_status(&status), "datum 1 of 1000+ [0badf00d]");

        status.all_datums_received = true;
        assert_eq!(format_status(&status), "datum 1 of 1000 [0badf00d]");
    }

    #[test]
    fn test_short_commit() {
        assert_eq!(short_commit("abc"), "abc");
        assert_eq!(short_commit("0123456789abcdef"), "0123456789ab");
    }
}

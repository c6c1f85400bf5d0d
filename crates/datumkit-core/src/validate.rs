//! Input spec validation.
//!
//! Validation is a pure walk over the spec tree that runs before any naming
//! or listing call is made. Per-node rules are checked depth-first in
//! declaration order and the first failure is returned; alias uniqueness is
//! checked across the whole flattened tree afterwards.

use crate::error::ValidationError;
use crate::glob::GlobPattern;
use crate::spec::{AtomSpec, InputSpec};
use std::collections::HashSet;

/// Conventional name of the pipeline output repo.
pub const DEFAULT_OUTPUT_REPO: &str = "out";

/// Checks spec structure against the engine's rules.
#[derive(Debug, Clone)]
pub struct Validator {
    output_repo: String,
}

impl Default for Validator {
    fn default() -> Self {
        Validator::new(DEFAULT_OUTPUT_REPO)
    }
}

impl Validator {
    /// Create a validator reserving the given output repo name
    pub fn new(output_repo: impl Into<String>) -> Self {
        Validator {
            output_repo: output_repo.into(),
        }
    }

    /// Validate a whole spec tree.
    pub fn validate(&self, spec: &InputSpec) -> Result<(), ValidationError> {
        self.check_node(spec)?;

        let mut seen = HashSet::new();
        for atom in spec.atoms() {
            if !seen.insert(atom.alias()) {
                return Err(ValidationError::DuplicateAlias {
                    alias: atom.alias().to_string(),
                });
            }
        }

        Ok(())
    }

    fn check_node(&self, node: &InputSpec) -> Result<(), ValidationError> {
        match node {
            InputSpec::Atom(atom) => self.check_atom(atom),
            InputSpec::Unsupported { kind } => Err(ValidationError::UnsupportedInputKind {
                kind: kind.clone(),
            }),
            InputSpec::Cross(children)
            | InputSpec::Union(children)
            | InputSpec::Join(children)
            | InputSpec::Group(children) => {
                if children.is_empty() {
                    let kind = node
                        .combinator()
                        .map(|(kind, _)| kind.to_string())
                        .unwrap_or_default();
                    return Err(ValidationError::EmptyCombinator { kind });
                }
                children.iter().try_for_each(|child| self.check_node(child))
            }
        }
    }

    fn check_atom(&self, atom: &AtomSpec) -> Result<(), ValidationError> {
        if atom.s3 {
            return Err(ValidationError::UnsupportedInputKind {
                kind: "s3".to_string(),
            });
        }
        if atom.repo.is_empty() {
            return Err(ValidationError::MissingRepo);
        }
        if atom.glob.is_empty() {
            return Err(ValidationError::MissingGlob {
                alias: atom.alias().to_string(),
            });
        }
        if !atom.commit.is_empty() {
            return Err(ValidationError::CommitNotAllowed {
                alias: atom.alias().to_string(),
            });
        }
        if atom.repo == self.output_repo && !atom.has_explicit_name() {
            return Err(ValidationError::OutputRepoNeedsAlias {
                repo: atom.repo.clone(),
            });
        }
        GlobPattern::new(&atom.glob)?;
        Ok(())
    }
}

/// Validate with the default output repo name.
pub fn validate(spec: &InputSpec) -> Result<(), ValidationError> {
    Validator::default().validate(spec)
}

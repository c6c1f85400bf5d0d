//! Atom resolution.
//!
//! Turns every atom of a validated spec into a [`FileSet`]: the repo is looked
//! up through the [`NamingService`], the branch head is pinned, and the glob is
//! evaluated against that commit through the [`FileListingService`]. Atoms are
//! independent of one another, so resolution can run on the rayon pool; the
//! returned sets are always in atom declaration order.

use crate::error::{DatumError, ResolutionError, Result};
use crate::glob::{GlobPattern, KeyTemplate};
use crate::services::{FileListingService, NamingService};
use crate::spec::{AtomSpec, InputSpec};
use crate::types::FileSet;
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Resolves atoms against a pair of collaborators.
pub struct Resolver<'a> {
    naming: &'a dyn NamingService,
    listing: &'a dyn FileListingService,
    default_project: String,
    parallel: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(naming: &'a dyn NamingService, listing: &'a dyn FileListingService) -> Self {
        Resolver {
            naming,
            listing,
            default_project: "default".to_string(),
            parallel: true,
        }
    }

    /// Project used by atoms that leave `project` empty
    pub fn with_default_project(mut self, project: impl Into<String>) -> Self {
        self.default_project = project.into();
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Resolve every atom of the spec, in declaration order.
    ///
    /// Stops at the first failure. When resolving in parallel and several
    /// atoms fail, which of their errors is returned is unspecified.
    #[instrument(skip(self, spec), fields(atoms = tracing::field::Empty))]
    pub fn resolve_all(&self, spec: &InputSpec) -> Result<Vec<FileSet>> {
        let atoms = spec.atoms();
        tracing::Span::current().record("atoms", atoms.len());
        let start = Instant::now();

        let sets = if self.parallel && atoms.len() > 1 {
            atoms
                .par_iter()
                .map(|atom| self.resolve_atom(atom))
                .collect::<Result<Vec<_>>>()?
        } else {
            atoms
                .iter()
                .map(|atom| self.resolve_atom(atom))
                .collect::<Result<Vec<_>>>()?
        };

        info!(
            atoms = sets.len(),
            entries = sets.iter().map(FileSet::len).sum::<usize>(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Resolved input atoms"
        );
        Ok(sets)
    }

    /// Resolve a single atom to its file set.
    pub fn resolve_atom(&self, atom: &AtomSpec) -> Result<FileSet> {
        let alias = atom.alias();
        let project = if atom.project.is_empty() {
            self.default_project.as_str()
        } else {
            atom.project.as_str()
        };

        let repo = self
            .naming
            .resolve_repo(project, &atom.repo)
            .map_err(|e| service_error(alias, e))?
            .ok_or_else(|| ResolutionError::RepoNotFound {
                project: project.to_string(),
                repo: atom.repo.clone(),
            })?;

        let branch = if atom.branch.is_empty() {
            repo.default_branch.as_str()
        } else {
            atom.branch.as_str()
        };

        let commit = self
            .naming
            .head_commit(&repo, branch)
            .map_err(|e| service_error(alias, e))?
            .ok_or_else(|| ResolutionError::BranchNotFound {
                repo: repo.to_string(),
                branch: branch.to_string(),
            })?;

        let pattern = GlobPattern::new(&atom.glob)?;
        let entries = self
            .listing
            .glob(&commit, &pattern)
            .map_err(|e| service_error(alias, e))?;

        debug!(
            alias,
            commit = %commit,
            glob = pattern.as_str(),
            matches = entries.len(),
            "Resolved atom"
        );

        Ok(FileSet {
            alias: alias.to_string(),
            commit,
            entries,
            join_on: template(&atom.join_on),
            group_by: template(&atom.group_by),
        })
    }
}

fn template(source: &str) -> Option<KeyTemplate> {
    (!source.is_empty()).then(|| KeyTemplate::parse(source))
}

fn service_error(alias: &str, err: anyhow::Error) -> DatumError {
    ResolutionError::Service {
        alias: alias.to_string(),
        reason: format!("{:#}", err),
    }
    .into()
}

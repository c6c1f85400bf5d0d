//! Collaborator interfaces consumed by the engine.
//!
//! The engine never owns repository data. It resolves names through a
//! [`NamingService`] and walks commit trees through a [`FileListingService`];
//! both are treated as read-only snapshots as of the call. Backends (such as
//! the directory-backed store in `datumkit-backend-local`) implement these
//! traits, and [`MemoryStore`] provides an in-process implementation.
//!
//! ## Error Handling
//!
//! "Not found" is an expected answer and is returned as `Ok(None)`; `Err` is
//! reserved for service failures, which the resolver wraps with the alias of
//! the atom being resolved and surfaces without retrying.

use crate::glob::GlobPattern;
use crate::types::{CommitHandle, MatchEntry, RepoHandle};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Resolves project/repo/branch names to handles.
pub trait NamingService: Send + Sync {
    /// Look up a repo; `Ok(None)` if the project or repo does not exist.
    fn resolve_repo(&self, project: &str, repo: &str) -> anyhow::Result<Option<RepoHandle>>;

    /// Current head commit of a branch; `Ok(None)` if the branch does not exist.
    fn head_commit(
        &self,
        repo: &RepoHandle,
        branch: &str,
    ) -> anyhow::Result<Option<CommitHandle>>;
}

/// Walks the file tree of a commit.
pub trait FileListingService: Send + Sync {
    /// List every file path in the commit. Directories are implied by paths.
    fn list_files(&self, commit: &CommitHandle) -> anyhow::Result<Vec<String>>;

    /// Match a glob against the commit's tree.
    ///
    /// The default walks the whole listing; stores with an index can
    /// override this to prune by the pattern's literal prefix.
    fn glob(
        &self,
        commit: &CommitHandle,
        pattern: &GlobPattern,
    ) -> anyhow::Result<Vec<MatchEntry>> {
        let files = self.list_files(commit)?;
        Ok(pattern.match_tree(&files))
    }
}

#[derive(Debug, Default)]
struct MemoryRepo {
    default_branch: String,
    /// branch -> head commit id
    branches: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    projects: BTreeSet<String>,
    repos: BTreeMap<(String, String), MemoryRepo>,
    /// commit id -> immutable file listing
    commits: HashMap<String, Arc<BTreeSet<String>>>,
    next_commit: u64,
}

/// In-memory versioned store implementing both collaborator traits.
///
/// Every write creates a new immutable commit and moves the branch head, so
/// a [`CommitHandle`] obtained earlier keeps listing the files it saw.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store containing only the `default` project.
    pub fn new() -> Self {
        let store = MemoryStore::default();
        store.create_project("default");
        store
    }

    /// Create a project; a no-op if it exists.
    pub fn create_project(&self, project: &str) {
        self.state.write().projects.insert(project.to_string());
    }

    /// Create a repo whose head branch is `master`.
    pub fn create_repo(&self, project: &str, repo: &str) {
        self.create_repo_with_head(project, repo, "master");
    }

    /// Create a repo with a specific head branch, creating the project if needed.
    pub fn create_repo_with_head(&self, project: &str, repo: &str, head: &str) {
        let mut state = self.state.write();
        state.projects.insert(project.to_string());
        state
            .repos
            .entry((project.to_string(), repo.to_string()))
            .or_insert_with(|| MemoryRepo {
                default_branch: head.to_string(),
                branches: BTreeMap::new(),
            });
    }

    /// Add files to a branch as a single new commit, creating the branch if
    /// needed. Returns the new commit id.
    pub fn put_files<I, S>(&self, project: &str, repo: &str, branch: &str, paths: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.write();
        let key = (project.to_string(), repo.to_string());
        let parent = state
            .repos
            .get(&key)
            .and_then(|r| r.branches.get(branch))
            .and_then(|id| state.commits.get(id))
            .map(|files| files.as_ref().clone())
            .unwrap_or_default();

        let mut files = parent;
        for path in paths {
            files.insert(crate::glob::normalize_path(path.as_ref()));
        }

        state.next_commit += 1;
        let id = format!("{:032x}", state.next_commit);
        state.commits.insert(id.clone(), Arc::new(files));
        state.projects.insert(project.to_string());
        state
            .repos
            .entry(key)
            .or_insert_with(|| MemoryRepo {
                default_branch: "master".to_string(),
                branches: BTreeMap::new(),
            })
            .branches
            .insert(branch.to_string(), id.clone());
        id
    }

    /// Point a branch at an existing commit.
    pub fn create_branch(&self, project: &str, repo: &str, branch: &str, commit_id: &str) {
        let mut state = self.state.write();
        if let Some(r) = state.repos.get_mut(&(project.to_string(), repo.to_string())) {
            r.branches.insert(branch.to_string(), commit_id.to_string());
        }
    }
}

impl NamingService for MemoryStore {
    fn resolve_repo(&self, project: &str, repo: &str) -> anyhow::Result<Option<RepoHandle>> {
        let state = self.state.read();
        Ok(state
            .repos
            .get(&(project.to_string(), repo.to_string()))
            .map(|r| RepoHandle::new(project, repo, r.default_branch.clone())))
    }

    fn head_commit(
        &self,
        repo: &RepoHandle,
        branch: &str,
    ) -> anyhow::Result<Option<CommitHandle>> {
        let state = self.state.read();
        Ok(state
            .repos
            .get(&(repo.project.clone(), repo.name.clone()))
            .and_then(|r| r.branches.get(branch))
            .map(|id| CommitHandle::new(repo, branch, id.clone())))
    }
}

impl FileListingService for MemoryStore {
    fn list_files(&self, commit: &CommitHandle) -> anyhow::Result<Vec<String>> {
        let state = self.state.read();
        let files = state
            .commits
            .get(&commit.id)
            .ok_or_else(|| anyhow::anyhow!("commit {} not found", commit))?;
        Ok(files.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_and_list() {
        let store = MemoryStore::new();
        store.create_repo("default", "repo");
        store.put_files("default", "repo", "master", ["dir/file1", "file2"]);

        let repo = store.resolve_repo("default", "repo").unwrap().unwrap();
        assert_eq!(repo.default_branch, "master");

        let commit = store.head_commit(&repo, "master").unwrap().unwrap();
        assert_eq!(
            store.list_files(&commit).unwrap(),
            vec!["/dir/file1", "/file2"]
        );
    }

    #[test]
    fn test_not_found_is_none() {
        let store = MemoryStore::new();
        assert!(store.resolve_repo("default", "missing").unwrap().is_none());

        store.create_repo("default", "repo");
        let repo = store.resolve_repo("default", "repo").unwrap().unwrap();
        assert!(store.head_commit(&repo, "dev").unwrap().is_none());
    }

    #[test]
    fn test_commits_are_immutable() {
        let store = MemoryStore::new();
        store.create_repo("default", "repo");
        let first = store.put_files("default", "repo", "master", ["file1"]);
        store.put_files("default", "repo", "master", ["file2"]);

        store.create_branch("default", "repo", "copy", &first);
        let repo = store.resolve_repo("default", "repo").unwrap().unwrap();

        let copy = store.head_commit(&repo, "copy").unwrap().unwrap();
        assert_eq!(store.list_files(&copy).unwrap(), vec!["/file1"]);

        let master = store.head_commit(&repo, "master").unwrap().unwrap();
        assert_eq!(store.list_files(&master).unwrap().len(), 2);
    }

    #[test]
    fn test_default_glob_uses_listing() {
        let store = MemoryStore::new();
        store.create_repo("default", "repo");
        store.put_files("default", "repo", "master", ["a.txt", "b.md"]);
        let repo = store.resolve_repo("default", "repo").unwrap().unwrap();
        let commit = store.head_commit(&repo, "master").unwrap().unwrap();

        let pattern = GlobPattern::new("/*.txt").unwrap();
        let matches = store.glob(&commit, &pattern).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, "/a.txt");
    }
}

//! Directory-backed store.

use crate::error::LocalStoreError;
use datumkit_core::services::{FileListingService, NamingService};
use datumkit_core::types::{CommitHandle, RepoHandle};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// File naming a repo's head branch.
const HEAD_FILE: &str = "HEAD";

/// Store over `<root>/<project>/<repo>/<branch>/...`.
pub struct LocalStore {
    root: PathBuf,
    default_branch: String,
    /// branch dir -> latest commit id and the listing it was computed from
    snapshots: RwLock<HashMap<PathBuf, (String, Arc<Vec<String>>)>>,
}

impl LocalStore {
    /// Open a store rooted at an existing directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, LocalStoreError> {
        let root = root.into();
        let metadata = fs::metadata(&root).map_err(|e| LocalStoreError::io(&root, e))?;
        if !metadata.is_dir() {
            return Err(LocalStoreError::NotADirectory { path: root });
        }

        info!(root = %root.display(), "Opened local store");
        Ok(LocalStore {
            root,
            default_branch: "master".to_string(),
            snapshots: RwLock::new(HashMap::new()),
        })
    }

    /// Head branch for repos without a HEAD file
    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repo_dir(&self, project: &str, repo: &str) -> Result<PathBuf, LocalStoreError> {
        Ok(self.root.join(component(project)?).join(component(repo)?))
    }

    /// Head branch named by the repo's HEAD file, or the default.
    fn head_branch(&self, repo_dir: &Path) -> Result<String, LocalStoreError> {
        let head = repo_dir.join(HEAD_FILE);
        match fs::read_to_string(&head) {
            Ok(contents) => {
                let branch = contents.trim();
                if branch.is_empty() {
                    Ok(self.default_branch.clone())
                } else {
                    Ok(branch.to_string())
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(self.default_branch.clone()),
            Err(e) => Err(LocalStoreError::io(head, e)),
        }
    }

    /// Walk a branch directory and compute its commit id.
    fn snapshot(&self, branch_dir: &Path) -> Result<(String, Vec<String>), LocalStoreError> {
        let mut files: Vec<(String, u64)> = Vec::new();
        let mut stack = vec![branch_dir.to_path_buf()];

        while let Some(dir) = stack.pop() {
            let entries = fs::read_dir(&dir).map_err(|e| LocalStoreError::io(&dir, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| LocalStoreError::io(&dir, e))?;
                let path = entry.path();
                let metadata = entry
                    .metadata()
                    .map_err(|e| LocalStoreError::io(&path, e))?;

                if metadata.is_dir() {
                    stack.push(path);
                    continue;
                }

                let relative = path
                    .strip_prefix(branch_dir)
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                files.push((format!("/{}", relative), metadata.len()));
            }
        }

        files.sort();
        let mut hasher = crc32fast::Hasher::new();
        for (path, size) in &files {
            hasher.update(path.as_bytes());
            hasher.update(&size.to_le_bytes());
        }
        let id = format!("{:08x}{:08x}", hasher.finalize(), files.len() as u32);

        debug!(dir = %branch_dir.display(), files = files.len(), commit = %id, "Snapshotted branch");
        Ok((id, files.into_iter().map(|(path, _)| path).collect()))
    }

    fn branch_dir(&self, commit: &CommitHandle) -> Result<PathBuf, LocalStoreError> {
        Ok(self
            .repo_dir(&commit.project, &commit.repo)?
            .join(component(&commit.branch)?))
    }
}

/// Check that a name is exactly one normal path component.
fn component(name: &str) -> Result<&str, LocalStoreError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if name != HEAD_FILE => Ok(name),
        _ => Err(LocalStoreError::InvalidName {
            name: name.to_string(),
        }),
    }
}

impl NamingService for LocalStore {
    fn resolve_repo(&self, project: &str, repo: &str) -> anyhow::Result<Option<RepoHandle>> {
        let dir = match self.repo_dir(project, repo) {
            Ok(dir) => dir,
            Err(e) => {
                debug!(project, repo, error = %e, "Unresolvable repo name");
                return Ok(None);
            }
        };
        if !dir.is_dir() {
            return Ok(None);
        }

        let head = self.head_branch(&dir)?;
        Ok(Some(RepoHandle::new(project, repo, head)))
    }

    fn head_commit(
        &self,
        repo: &RepoHandle,
        branch: &str,
    ) -> anyhow::Result<Option<CommitHandle>> {
        let branch_dir = match component(branch) {
            Ok(name) => self.repo_dir(&repo.project, &repo.name)?.join(name),
            Err(_) => return Ok(None),
        };
        if !branch_dir.is_dir() {
            return Ok(None);
        }

        let (id, files) = self.snapshot(&branch_dir)?;
        self.snapshots
            .write()
            .insert(branch_dir, (id.clone(), Arc::new(files)));
        Ok(Some(CommitHandle::new(repo, branch, id)))
    }
}

impl FileListingService for LocalStore {
    fn list_files(&self, commit: &CommitHandle) -> anyhow::Result<Vec<String>> {
        let branch_dir = self.branch_dir(commit)?;
        if let Some((id, files)) = self.snapshots.read().get(&branch_dir) {
            if *id == commit.id {
                return Ok(files.as_ref().clone());
            }
        }

        let (current, files) = self.snapshot(&branch_dir)?;
        if current != commit.id {
            return Err(LocalStoreError::CommitMoved {
                branch: commit.to_string(),
                commit: commit.id.clone(),
                current,
            }
            .into());
        }
        Ok(files)
    }
}

//! Core data types for Datumkit.
//!
//! These are the values that flow between the resolver, the combinator
//! engine and the session: handles returned by the naming service, the
//! per-atom file sets, and the datums produced by indexing into an
//! enumeration. Datums are value objects built on demand; nothing here holds
//! a fully expanded enumeration.

use crate::glob::KeyTemplate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A repo resolved through the naming service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoHandle {
    /// Project the repo lives in
    pub project: String,

    /// Repo name
    pub name: String,

    /// Branch used when an atom does not name one
    pub default_branch: String,
}

impl RepoHandle {
    /// Create a new repo handle
    pub fn new(
        project: impl Into<String>,
        name: impl Into<String>,
        default_branch: impl Into<String>,
    ) -> Self {
        RepoHandle {
            project: project.into(),
            name: name.into(),
            default_branch: default_branch.into(),
        }
    }
}

impl fmt::Display for RepoHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.name)
    }
}

/// The head commit of a branch at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitHandle {
    pub project: String,
    pub repo: String,
    pub branch: String,

    /// Store-specific commit identifier
    pub id: String,
}

impl CommitHandle {
    /// Create a commit handle on the given repo and branch
    pub fn new(repo: &RepoHandle, branch: impl Into<String>, id: impl Into<String>) -> Self {
        CommitHandle {
            project: repo.project.clone(),
            repo: repo.name.clone(),
            branch: branch.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for CommitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}={}", self.project, self.repo, self.branch, self.id)
    }
}

/// One path matched by a glob, with the text captured by each group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchEntry {
    /// Rooted path ("/" for the whole tree, "/dir" for a directory subtree)
    pub path: String,

    /// Captured substrings, one per capturing group, in group order
    pub captures: Vec<String>,
}

impl MatchEntry {
    /// Create a match entry
    pub fn new(path: impl Into<String>, captures: Vec<String>) -> Self {
        MatchEntry {
            path: path.into(),
            captures,
        }
    }
}

/// The ordered matches for one atom, computed once per mount.
#[derive(Debug, Clone)]
pub struct FileSet {
    /// Alias the entries are bound under
    pub alias: String,

    /// Commit the glob was evaluated against
    pub commit: CommitHandle,

    /// Matches in path order
    pub entries: Vec<MatchEntry>,

    pub join_on: Option<KeyTemplate>,
    pub group_by: Option<KeyTemplate>,
}

impl FileSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the single-entry datum input for entry `i`.
    pub fn input_at(&self, i: usize) -> Option<DatumInput> {
        let entry = self.entries.get(i)?;
        Some(DatumInput {
            alias: self.alias.clone(),
            commit: self.commit.clone(),
            join_key: self.join_on.as_ref().map(|t| t.expand(&entry.captures)),
            group_key: self.group_by.as_ref().map(|t| t.expand(&entry.captures)),
            entries: vec![entry.clone()],
        })
    }
}

/// One alias binding inside a datum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatumInput {
    pub alias: String,
    pub commit: CommitHandle,

    /// One entry for cross/union/join datums, the whole key subset for group
    pub entries: Vec<MatchEntry>,

    /// Key produced by the atom's `join_on` template, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_key: Option<String>,

    /// Key produced by the atom's `group_by` template, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
}

/// A unit of work: alias bindings in atom declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Datum {
    pub inputs: Vec<DatumInput>,
}

impl Datum {
    /// Create a datum from its inputs
    pub fn new(inputs: Vec<DatumInput>) -> Self {
        Datum { inputs }
    }

    /// Concatenate the bindings of several datums (cross and join products).
    pub fn concat(parts: impl IntoIterator<Item = Datum>) -> Self {
        Datum {
            inputs: parts.into_iter().flat_map(|d| d.inputs).collect(),
        }
    }

    /// Look up the binding for an alias
    pub fn input(&self, alias: &str) -> Option<&DatumInput> {
        self.inputs.iter().find(|i| i.alias == alias)
    }

    /// Aliases bound by this datum
    pub fn aliases(&self) -> Vec<&str> {
        self.inputs.iter().map(|i| i.alias.as_str()).collect()
    }

    /// The join key of the first binding that carries one.
    ///
    /// For a nested join all bindings share the key, so the first one is
    /// representative.
    pub fn join_key(&self) -> Option<&str> {
        self.inputs.iter().find_map(|i| i.join_key.as_deref())
    }

    /// The group key of the first binding that carries one.
    pub fn group_key(&self) -> Option<&str> {
        self.inputs.iter().find_map(|i| i.group_key.as_deref())
    }

    /// The mapping handed to the filesystem-view collaborator.
    pub fn file_bindings(&self) -> BTreeMap<String, FileBinding> {
        self.inputs
            .iter()
            .map(|input| {
                let binding = FileBinding {
                    project: input.commit.project.clone(),
                    repo: input.commit.repo.clone(),
                    branch: input.commit.branch.clone(),
                    commit: input.commit.id.clone(),
                    paths: input.entries.iter().map(|e| e.path.clone()).collect(),
                };
                (input.alias.clone(), binding)
            })
            .collect()
    }

    /// Short stable identifier derived from the bindings.
    pub fn id(&self) -> String {
        let mut hasher = crc32fast::Hasher::new();
        for input in &self.inputs {
            hasher.update(input.alias.as_bytes());
            hasher.update(&[0]);
            hasher.update(input.commit.id.as_bytes());
            hasher.update(&[0]);
            for entry in &input.entries {
                hasher.update(entry.path.as_bytes());
                hasher.update(&[0]);
            }
        }
        format!("{:08x}", hasher.finalize())
    }
}

/// What a worker needs to see for one alias: which commit and which paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBinding {
    pub project: String,
    pub repo: String,
    pub branch: String,
    pub commit: String,
    pub paths: Vec<String>,
}

//! Input spec model.
//!
//! An input spec is a tree whose leaves are atoms (one repo/branch/glob each)
//! and whose inner nodes are the cross, union, join and group combinators.
//! The JSON shape follows the pipeline spec format:
//!
//! ```json
//! {"input": {"cross": [
//!     {"pfs": {"repo": "images", "glob": "/*"}},
//!     {"pfs": {"repo": "models", "glob": "/", "branch": "dev"}}
//! ]}}
//! ```
//!
//! Any node key other than `pfs`, `cross`, `union`, `join` or `group` parses
//! to [`InputSpec::Unsupported`] so the validator can report it by name.

use crate::error::{DatumError, Result};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A leaf reference into one repo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtomSpec {
    /// Project (empty = the configured default project)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub project: String,

    pub repo: String,

    /// Branch (empty = the repo's head branch)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub branch: String,

    pub glob: String,

    /// Alias; defaults to the repo name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub join_on: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub group_by: String,

    /// Never valid on an atom; kept so the validator can reject it
    #[serde(skip_serializing_if = "String::is_empty")]
    pub commit: String,

    /// Object-store access flag; not supported by this engine
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub s3: bool,
}

impl AtomSpec {
    /// Create an atom on a repo with a glob
    pub fn new(repo: impl Into<String>, glob: impl Into<String>) -> Self {
        AtomSpec {
            repo: repo.into(),
            glob: glob.into(),
            ..Default::default()
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_join_on(mut self, template: impl Into<String>) -> Self {
        self.join_on = template.into();
        self
    }

    pub fn with_group_by(mut self, template: impl Into<String>) -> Self {
        self.group_by = template.into();
        self
    }

    /// The name the atom's files are bound under.
    pub fn alias(&self) -> &str {
        if self.name.is_empty() {
            &self.repo
        } else {
            &self.name
        }
    }

    /// Whether the alias was chosen explicitly
    pub fn has_explicit_name(&self) -> bool {
        !self.name.is_empty()
    }
}

/// A node of the input tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawInput")]
#[serde(rename_all = "lowercase")]
pub enum InputSpec {
    #[serde(rename = "pfs")]
    Atom(AtomSpec),
    Cross(Vec<InputSpec>),
    Union(Vec<InputSpec>),
    Join(Vec<InputSpec>),
    Group(Vec<InputSpec>),

    /// A node kind the engine does not enumerate (e.g. `cron`)
    #[serde(skip_serializing)]
    Unsupported { kind: String },
}

/// Which combinator a node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinatorKind {
    Cross,
    Union,
    Join,
    Group,
}

impl fmt::Display for CombinatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombinatorKind::Cross => write!(f, "cross"),
            CombinatorKind::Union => write!(f, "union"),
            CombinatorKind::Join => write!(f, "join"),
            CombinatorKind::Group => write!(f, "group"),
        }
    }
}

impl InputSpec {
    /// Shorthand for an atom node
    pub fn atom(atom: AtomSpec) -> Self {
        InputSpec::Atom(atom)
    }

    /// Combinator kind and children, or None for leaves.
    pub fn combinator(&self) -> Option<(CombinatorKind, &[InputSpec])> {
        match self {
            InputSpec::Cross(c) => Some((CombinatorKind::Cross, c.as_slice())),
            InputSpec::Union(c) => Some((CombinatorKind::Union, c.as_slice())),
            InputSpec::Join(c) => Some((CombinatorKind::Join, c.as_slice())),
            InputSpec::Group(c) => Some((CombinatorKind::Group, c.as_slice())),
            InputSpec::Atom(_) | InputSpec::Unsupported { .. } => None,
        }
    }

    /// All atoms in depth-first declaration order.
    pub fn atoms(&self) -> Vec<&AtomSpec> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<&'a AtomSpec>) {
        match self {
            InputSpec::Atom(atom) => out.push(atom),
            InputSpec::Unsupported { .. } => {}
            InputSpec::Cross(c) | InputSpec::Union(c) | InputSpec::Join(c) | InputSpec::Group(c) => {
                for child in c {
                    child.collect_atoms(out);
                }
            }
        }
    }

    /// Parse a spec document: either `{"input": <node>}` or a bare node.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if value.get("input").is_some() {
            let request: MountRequest = serde_json::from_value(value)?;
            return Ok(request.input);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// One-line rendering for logs and describe output
    pub fn summary(&self) -> String {
        fn combined(kind: CombinatorKind, children: &[InputSpec]) -> String {
            let inner: Vec<String> = children.iter().map(InputSpec::summary).collect();
            format!("{}({})", kind, inner.join(", "))
        }

        match self {
            InputSpec::Atom(a) if a.branch.is_empty() => format!("{}:{}", a.alias(), a.glob),
            InputSpec::Atom(a) => format!("{}:{}@{}", a.alias(), a.glob, a.branch),
            InputSpec::Cross(c) => combined(CombinatorKind::Cross, c),
            InputSpec::Union(c) => combined(CombinatorKind::Union, c),
            InputSpec::Join(c) => combined(CombinatorKind::Join, c),
            InputSpec::Group(c) => combined(CombinatorKind::Group, c),
            InputSpec::Unsupported { kind } => format!("<{}>", kind),
        }
    }
}

/// Request body for mounting: `{"input": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountRequest {
    pub input: InputSpec,
}

/// Loose shape used to detect which node kind a JSON object declares.
#[derive(Deserialize)]
struct RawInput {
    pfs: Option<AtomSpec>,
    cross: Option<Vec<InputSpec>>,
    union: Option<Vec<InputSpec>>,
    join: Option<Vec<InputSpec>>,
    group: Option<Vec<InputSpec>>,
    #[serde(flatten)]
    other: BTreeMap<String, IgnoredAny>,
}

impl TryFrom<RawInput> for InputSpec {
    type Error = DatumError;

    fn try_from(raw: RawInput) -> Result<Self> {
        let mut found = Vec::new();
        if let Some(atom) = raw.pfs {
            found.push(InputSpec::Atom(atom));
        }
        if let Some(c) = raw.cross {
            found.push(InputSpec::Cross(c));
        }
        if let Some(c) = raw.union {
            found.push(InputSpec::Union(c));
        }
        if let Some(c) = raw.join {
            found.push(InputSpec::Join(c));
        }
        if let Some(c) = raw.group {
            found.push(InputSpec::Group(c));
        }
        if let Some(kind) = raw.other.keys().next() {
            return Ok(InputSpec::Unsupported { kind: kind.clone() });
        }

        match found.len() {
            1 => Ok(found.remove(0)),
            0 => Err(DatumError::SpecParse {
                reason: "input must declare one of pfs, cross, union, join, group".to_string(),
            }),
            _ => Err(DatumError::SpecParse {
                reason: "input declares more than one node type".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_atom_with_wrapper() {
        let spec = InputSpec::from_json(
            r#"{"input": {"pfs": {"project": "default", "repo": "repo", "glob": "/*", "branch": "dev"}}}"#,
        )
        .unwrap();

        match spec {
            InputSpec::Atom(atom) => {
                assert_eq!(atom.repo, "repo");
                assert_eq!(atom.branch, "dev");
                assert_eq!(atom.alias(), "repo");
            }
            other => panic!("expected atom, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_nested_combinators() {
        let spec = InputSpec::from_json(
            r#"{"cross": [
                {"union": [
                    {"pfs": {"repo": "a", "glob": "/*", "name": "a1"}},
                    {"pfs": {"repo": "a", "glob": "/*/*", "name": "a2"}}
                ]},
                {"pfs": {"repo": "b", "glob": "/"}}
            ]}"#,
        )
        .unwrap();

        let aliases: Vec<&str> = spec.atoms().iter().map(|a| a.alias()).collect();
        assert_eq!(aliases, vec!["a1", "a2", "b"]);
        assert_eq!(spec.summary(), "cross(union(a1:/*, a2:/*/*), b:/)");
    }

    #[test]
    fn test_parse_unsupported_kind() {
        let spec =
            InputSpec::from_json(r#"{"input": {"cron": {"name": "tick", "spec": "@every 60s"}}}"#)
                .unwrap();
        assert_eq!(
            spec,
            InputSpec::Unsupported {
                kind: "cron".to_string()
            }
        );
    }

    #[test]
    fn test_parse_keeps_rejected_fields() {
        let spec =
            InputSpec::from_json(r#"{"pfs": {"repo": "repo", "glob": "/*", "s3": true, "commit": "abc"}}"#)
                .unwrap();
        match spec {
            InputSpec::Atom(atom) => {
                assert!(atom.s3);
                assert_eq!(atom.commit, "abc");
            }
            other => panic!("expected atom, got {:?}", other),
        }
    }

    #[test]
    fn test_mount_request_shape() {
        let request = MountRequest {
            input: InputSpec::atom(AtomSpec::new("repo", "/*")),
        };
        let text = serde_json::to_string(&request).unwrap();
        assert_eq!(text, r#"{"input":{"pfs":{"repo":"repo","glob":"/*"}}}"#);
        assert_eq!(InputSpec::from_json(&text).unwrap(), request.input);
    }

    #[test]
    fn test_parse_rejects_empty_node() {
        assert!(InputSpec::from_json("{}").is_err());
        assert!(InputSpec::from_json("not json").is_err());
    }

    #[test]
    fn test_serialize_round_shape() {
        let spec = InputSpec::Join(vec![
            InputSpec::atom(AtomSpec::new("a", "/(*)").with_join_on("$1")),
            InputSpec::atom(AtomSpec::new("b", "/(*)").with_join_on("$1")),
        ]);
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["join"][0]["pfs"]["join_on"], "$1");
        assert!(json["join"][1]["pfs"].get("commit").is_none());
    }
}

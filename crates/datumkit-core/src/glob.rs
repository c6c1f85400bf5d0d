//! Glob matching with capturing groups.
//!
//! Globs are evaluated against rooted paths of a single commit's file tree.
//! The tree walk itself belongs to the file-listing service; this module
//! derives the directory structure from the listing and owns the pattern
//! semantics:
//!
//! - `/` matches the root, i.e. the whole tree as one entry; no other
//!   pattern selects the root
//! - `*` matches within one path segment, `?` one non-separator character
//! - `**` matches across segments (`/a/**/b` also matches `/a/b`)
//! - `[abc]`, `[!abc]` character classes (never matching `/`)
//! - `{png,jpg}` alternation
//! - `(...)` capturing groups, referenced from key templates as `$1`, `$2`, ...
//!
//! Directories are matchable: `/*` over a tree containing `dir/file1` and
//! `file2` yields `/dir` and `/file2`.

use crate::error::ValidationError;
use crate::types::MatchEntry;
use regex::Regex;
use std::collections::BTreeSet;

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    regex: Regex,
    /// Only the bare `/` pattern selects the root node
    matches_root: bool,
}

impl GlobPattern {
    /// Compile a glob into an anchored regex.
    pub fn new(pattern: &str) -> Result<Self, ValidationError> {
        let normalized = normalize_path(pattern);
        let source = translate(&normalized).map_err(|reason| ValidationError::InvalidGlob {
            pattern: pattern.to_string(),
            reason,
        })?;

        let regex = Regex::new(&source).map_err(|e| ValidationError::InvalidGlob {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(GlobPattern {
            pattern: pattern.to_string(),
            regex,
            matches_root: normalized == "/",
        })
    }

    /// The pattern as written by the user
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Number of capturing groups
    pub fn group_count(&self) -> usize {
        self.regex.captures_len() - 1
    }

    /// Match a rooted path, returning the captured groups on success.
    ///
    /// Groups that did not participate in the match capture "". The root
    /// `/` only matches the pattern `/`.
    pub fn captures(&self, path: &str) -> Option<Vec<String>> {
        if path == "/" && !self.matches_root {
            return None;
        }
        let caps = self.regex.captures(path)?;
        Some(
            (1..caps.len())
                .map(|i| caps.get(i).map_or(String::new(), |m| m.as_str().to_string()))
                .collect(),
        )
    }

    /// Match every node of the tree described by `files`.
    ///
    /// `files` lists the leaf paths of a commit; the root and every
    /// intermediate directory are derived from them. The result is ordered by
    /// path and free of duplicates regardless of listing order.
    pub fn match_tree<S: AsRef<str>>(&self, files: &[S]) -> Vec<MatchEntry> {
        tree_nodes(files)
            .into_iter()
            .filter_map(|path| {
                let captures = self.captures(&path)?;
                Some(MatchEntry { path, captures })
            })
            .collect()
    }
}

/// Expand every node (root, directories, files) of a file listing.
fn tree_nodes<S: AsRef<str>>(files: &[S]) -> BTreeSet<String> {
    let mut nodes = BTreeSet::new();
    nodes.insert("/".to_string());

    for file in files {
        let path = normalize_path(file.as_ref());
        if path == "/" {
            continue;
        }
        let mut end = 0;
        while let Some(offset) = path[end + 1..].find('/') {
            end += 1 + offset;
            nodes.insert(path[..end].to_string());
        }
        nodes.insert(path);
    }

    nodes
}

/// Root a path at "/" and drop any trailing separator.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Translate a normalized glob into regex source.
fn translate(glob: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(glob.len() * 2 + 4);
    out.push('^');

    let chars: Vec<char> = glob.chars().collect();
    let mut i = 0;
    let mut brace_depth = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                i += 1;
                // "/**/" also matches a single "/"
                if out.ends_with('/') && chars.get(i + 1) == Some(&'/') {
                    i += 1;
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == ']')
                    .ok_or_else(|| "unclosed character class".to_string())?;
                let body = &chars[i + 1..i + 1 + close];
                let negated = matches!(body.first(), Some('!' | '^'));
                out.push_str(if negated { "[^/" } else { "[" });
                for &ch in body.iter().skip(usize::from(negated)) {
                    match ch {
                        '\\' | '[' | '&' | '~' => {
                            out.push('\\');
                            out.push(ch);
                        }
                        _ => out.push(ch),
                    }
                }
                // classes never match the separator
                out.push_str(if negated { "]" } else { "&&[^/]]" });
                i += close + 1;
            }
            '{' => {
                brace_depth += 1;
                out.push_str("(?:");
            }
            ',' if brace_depth > 0 => out.push('|'),
            '}' if brace_depth > 0 => {
                brace_depth -= 1;
                out.push(')');
            }
            '(' | ')' => out.push(c),
            '\\' => {
                i += 1;
                let escaped = chars
                    .get(i)
                    .ok_or_else(|| "dangling escape".to_string())?;
                out.push_str(&regex::escape(&escaped.to_string()));
            }
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    if brace_depth > 0 {
        return Err("unclosed alternation".to_string());
    }

    out.push('$');
    Ok(out)
}

/// A `join_on` / `group_by` template such as `$1` or `$2-$1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTemplate {
    source: String,
    parts: Vec<KeyPart>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyPart {
    Literal(String),
    Group(usize),
}

impl KeyTemplate {
    /// Parse a template. `$N` (or `${N}`) references group N, `$$` is a
    /// literal dollar; anything else is copied through.
    pub fn parse(source: &str) -> Self {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let chars: Vec<char> = source.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            if chars[i] != '$' {
                literal.push(chars[i]);
                i += 1;
                continue;
            }

            let braced = chars.get(i + 1) == Some(&'{');
            let start = if braced { i + 2 } else { i + 1 };
            let digits: String = chars[start.min(chars.len())..]
                .iter()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            let end = start + digits.len();
            let closed = !braced || chars.get(end) == Some(&'}');

            match digits.parse::<usize>() {
                Ok(group) if closed => {
                    if !literal.is_empty() {
                        parts.push(KeyPart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(KeyPart::Group(group));
                    i = if braced { end + 1 } else { end };
                }
                _ if chars.get(i + 1) == Some(&'$') => {
                    literal.push('$');
                    i += 2;
                }
                _ => {
                    literal.push('$');
                    i += 1;
                }
            }
        }

        if !literal.is_empty() {
            parts.push(KeyPart::Literal(literal));
        }

        KeyTemplate {
            source: source.to_string(),
            parts,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Substitute captures; out-of-range and `$0` references expand to "".
    pub fn expand(&self, captures: &[String]) -> String {
        let mut key = String::new();
        for part in &self.parts {
            match part {
                KeyPart::Literal(s) => key.push_str(s),
                KeyPart::Group(0) => {}
                KeyPart::Group(n) => {
                    if let Some(cap) = captures.get(n - 1) {
                        key.push_str(cap);
                    }
                }
            }
        }
        key
    }
}

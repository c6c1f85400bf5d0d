//! Combinator engine.
//!
//! Every node of a spec tree becomes an [`Enumeration`]: a lazily extended,
//! indexable sequence of datums. The engine only ever needs four things from
//! a node, captured by [`DatumSource`]:
//!
//! - how many datums are known so far,
//! - whether that count is final,
//! - the datum at a known index,
//! - a way to extend the known prefix by about one page.
//!
//! Datums are computed on demand from child indices; nothing is materialized
//! beyond the per-node key tables join and group need.
//!
//! ## Ordering
//!
//! - **Atom**: file set order (path order).
//! - **Cross**: row-major over the children, last child varying fastest.
//! - **Union**: all datums of child 0, then child 1, and so on.
//! - **Join**: keys in order of first appearance in child 0; within a key,
//!   the cross product of every child's matching entries.
//! - **Group**: keys in lexicographic order, one datum per key.
//!
//! ## Sizes
//!
//! Once final: cross is the product of child sizes, union the sum, join the
//! sum over child-0 keys of the product of per-child multiplicities (keys
//! missing from any child contribute nothing), and group the number of
//! distinct keys across all children.

use crate::error::{DatumError, Result, ValidationError};
use crate::spec::InputSpec;
use crate::types::{Datum, DatumInput, FileSet};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Incremental, indexable enumeration of datums.
pub trait DatumSource {
    /// Number of datums known so far.
    fn known_len(&self) -> usize;

    /// Whether `known_len` is the final size.
    fn is_final(&self) -> bool;

    /// The datum at a known index; `None` beyond `known_len`.
    fn datum_at(&self, index: usize) -> Option<Datum>;

    /// Grow the known prefix by at least `page_size` datums unless the
    /// enumeration finishes first. Returns how many datums became known;
    /// returns 0 only once final.
    fn extend_page(&mut self, page_size: usize) -> usize;
}

/// A node of the enumeration tree.
#[derive(Debug)]
pub enum Enumeration {
    Atom(AtomSource),
    Cross(CrossSource),
    Union(UnionSource),
    Join(JoinSource),
    Group(GroupSource),
}

impl DatumSource for Enumeration {
    fn known_len(&self) -> usize {
        match self {
            Enumeration::Atom(s) => s.known_len(),
            Enumeration::Cross(s) => s.known_len(),
            Enumeration::Union(s) => s.known_len(),
            Enumeration::Join(s) => s.known_len(),
            Enumeration::Group(s) => s.known_len(),
        }
    }

    fn is_final(&self) -> bool {
        match self {
            Enumeration::Atom(s) => s.is_final(),
            Enumeration::Cross(s) => s.is_final(),
            Enumeration::Union(s) => s.is_final(),
            Enumeration::Join(s) => s.is_final(),
            Enumeration::Group(s) => s.is_final(),
        }
    }

    fn datum_at(&self, index: usize) -> Option<Datum> {
        match self {
            Enumeration::Atom(s) => s.datum_at(index),
            Enumeration::Cross(s) => s.datum_at(index),
            Enumeration::Union(s) => s.datum_at(index),
            Enumeration::Join(s) => s.datum_at(index),
            Enumeration::Group(s) => s.datum_at(index),
        }
    }

    fn extend_page(&mut self, page_size: usize) -> usize {
        match self {
            Enumeration::Atom(s) => s.extend_page(page_size),
            Enumeration::Cross(s) => s.extend_page(page_size),
            Enumeration::Union(s) => s.extend_page(page_size),
            Enumeration::Join(s) => s.extend_page(page_size),
            Enumeration::Group(s) => s.extend_page(page_size),
        }
    }
}

/// Extend until final.
pub fn drain(source: &mut impl DatumSource, page_size: usize) {
    let page = page_size.max(1);
    while !source.is_final() {
        if source.extend_page(page) == 0 {
            break;
        }
    }
}

/// Build the enumeration for a spec from its resolved file sets.
///
/// `sets` must hold one file set per atom, in declaration order, which is
/// what [`Resolver::resolve_all`](crate::resolve::Resolver::resolve_all)
/// returns.
pub fn build(spec: &InputSpec, sets: &[Arc<FileSet>], page_size: usize) -> Result<Enumeration> {
    let mut remaining = sets.iter().cloned();
    let root = build_node(spec, &mut remaining, page_size.max(1))?;
    if remaining.next().is_some() {
        return Err(DatumError::Internal(
            "more file sets than atoms in spec".to_string(),
        ));
    }
    Ok(root)
}

fn build_node<I>(node: &InputSpec, sets: &mut I, page_size: usize) -> Result<Enumeration>
where
    I: Iterator<Item = Arc<FileSet>>,
{
    let node = match node {
        InputSpec::Atom(_) => {
            let set = sets.next().ok_or_else(|| {
                DatumError::Internal("fewer file sets than atoms in spec".to_string())
            })?;
            Enumeration::Atom(AtomSource::new(set))
        }
        InputSpec::Cross(c) => {
            Enumeration::Cross(CrossSource::new(build_children(c, sets, page_size)?, page_size))
        }
        InputSpec::Union(c) => {
            Enumeration::Union(UnionSource::new(build_children(c, sets, page_size)?))
        }
        InputSpec::Join(c) => {
            Enumeration::Join(JoinSource::new(build_children(c, sets, page_size)?, page_size))
        }
        InputSpec::Group(c) => {
            Enumeration::Group(GroupSource::new(build_children(c, sets, page_size)?, page_size))
        }
        InputSpec::Unsupported { kind } => {
            return Err(ValidationError::UnsupportedInputKind { kind: kind.clone() }.into())
        }
    };
    Ok(node)
}

fn build_children<I>(children: &[InputSpec], sets: &mut I, page_size: usize) -> Result<Vec<Enumeration>>
where
    I: Iterator<Item = Arc<FileSet>>,
{
    children
        .iter()
        .map(|child| build_node(child, sets, page_size))
        .collect()
}

/// Leaf: one datum per matched entry.
#[derive(Debug)]
pub struct AtomSource {
    set: Arc<FileSet>,
}

impl AtomSource {
    pub fn new(set: Arc<FileSet>) -> Self {
        AtomSource { set }
    }
}

impl DatumSource for AtomSource {
    fn known_len(&self) -> usize {
        self.set.len()
    }

    fn is_final(&self) -> bool {
        true
    }

    fn datum_at(&self, index: usize) -> Option<Datum> {
        self.set.input_at(index).map(|input| Datum::new(vec![input]))
    }

    fn extend_page(&mut self, _page_size: usize) -> usize {
        0
    }
}

/// Cartesian product.
///
/// Every child but the first is drained on construction so the inner radix
/// is fixed; only the first child streams.
#[derive(Debug)]
pub struct CrossSource {
    children: Vec<Enumeration>,
    /// Final sizes of children 1..n
    radices: Vec<usize>,
    /// Product of `radices`
    inner: usize,
}

impl CrossSource {
    pub fn new(mut children: Vec<Enumeration>, page_size: usize) -> Self {
        for child in children.iter_mut().skip(1) {
            drain(child, page_size);
        }
        let radices: Vec<usize> = children.iter().skip(1).map(|c| c.known_len()).collect();
        let inner = radices.iter().fold(1usize, |acc, &n| acc.saturating_mul(n));
        CrossSource {
            children,
            radices,
            inner,
        }
    }
}

impl DatumSource for CrossSource {
    fn known_len(&self) -> usize {
        match self.children.first() {
            Some(first) => first.known_len().saturating_mul(self.inner),
            None => 0,
        }
    }

    fn is_final(&self) -> bool {
        self.inner == 0 || self.children.first().map_or(true, |c| c.is_final())
    }

    fn extend_page(&mut self, page_size: usize) -> usize {
        if self.is_final() {
            return 0;
        }
        let before = self.known_len();
        let rows = page_size.div_ceil(self.inner).max(1);
        while let Some(first) = self.children.first_mut() {
            if first.is_final() || first.extend_page(rows) == 0 {
                break;
            }
            if self.known_len() - before >= page_size {
                break;
            }
        }
        self.known_len() - before
    }

    fn datum_at(&self, index: usize) -> Option<Datum> {
        if index >= self.known_len() {
            return None;
        }

        let mut rest = index;
        let mut picks = vec![0usize; self.children.len()];
        for (j, &radix) in self.radices.iter().enumerate().rev() {
            picks[j + 1] = rest % radix;
            rest /= radix;
        }
        picks[0] = rest;

        let parts = self
            .children
            .iter()
            .zip(picks)
            .map(|(child, i)| child.datum_at(i))
            .collect::<Option<Vec<_>>>()?;
        Some(Datum::concat(parts))
    }
}

/// Concatenation.
///
/// Only a prefix of final children plus the first unfinished child is
/// visible, so indices never shift once known.
#[derive(Debug)]
pub struct UnionSource {
    children: Vec<Enumeration>,
}

impl UnionSource {
    pub fn new(children: Vec<Enumeration>) -> Self {
        UnionSource { children }
    }
}

impl DatumSource for UnionSource {
    fn known_len(&self) -> usize {
        let mut total = 0usize;
        for child in &self.children {
            total = total.saturating_add(child.known_len());
            if !child.is_final() {
                break;
            }
        }
        total
    }

    fn is_final(&self) -> bool {
        self.children.iter().all(|c| c.is_final())
    }

    fn extend_page(&mut self, page_size: usize) -> usize {
        let before = self.known_len();
        while self.known_len() - before < page_size {
            let Some(child) = self.children.iter_mut().find(|c| !c.is_final()) else {
                break;
            };
            if child.extend_page(page_size) == 0 && !child.is_final() {
                break;
            }
        }
        self.known_len() - before
    }

    fn datum_at(&self, index: usize) -> Option<Datum> {
        let mut rest = index;
        for child in &self.children {
            let len = child.known_len();
            if rest < len {
                return child.datum_at(rest);
            }
            if !child.is_final() {
                return None;
            }
            rest -= len;
        }
        None
    }
}

#[derive(Debug, Clone, Copy)]
enum KeyKind {
    Join,
    Group,
}

/// Key of a child datum; datums without a template share the empty key.
fn key_at(source: &Enumeration, index: usize, kind: KeyKind) -> String {
    source
        .datum_at(index)
        .and_then(|d| {
            let key = match kind {
                KeyKind::Join => d.join_key(),
                KeyKind::Group => d.group_key(),
            };
            key.map(str::to_string)
        })
        .unwrap_or_default()
}

/// Key -> ascending child indices.
fn index_keys(source: &Enumeration, kind: KeyKind) -> HashMap<String, Vec<usize>> {
    let mut map: HashMap<String, Vec<usize>> = HashMap::new();
    for i in 0..source.known_len() {
        map.entry(key_at(source, i, kind)).or_default().push(i);
    }
    map
}

#[derive(Debug, Clone, Copy)]
struct KeyRun {
    /// Position in `JoinSource::first_keys`
    key: usize,
    /// First output index of the run
    start: usize,
    count: usize,
}

/// Equi-join on `join_on` keys.
///
/// Key tables are built on construction. Extension walks the keys of the
/// first child in order, skipping keys some other child lacks, and appends
/// one run of output indices per matched key.
#[derive(Debug)]
pub struct JoinSource {
    children: Vec<Enumeration>,
    /// Distinct keys of child 0 in order of first appearance
    first_keys: Vec<(String, Vec<usize>)>,
    others: Vec<HashMap<String, Vec<usize>>>,
    cursor: usize,
    runs: Vec<KeyRun>,
    known: usize,
}

impl JoinSource {
    pub fn new(mut children: Vec<Enumeration>, page_size: usize) -> Self {
        for child in children.iter_mut() {
            drain(child, page_size);
        }

        let mut first_keys: Vec<(String, Vec<usize>)> = Vec::new();
        if let Some(first) = children.first() {
            let mut positions: HashMap<String, usize> = HashMap::new();
            for i in 0..first.known_len() {
                let key = key_at(first, i, KeyKind::Join);
                match positions.get(&key) {
                    Some(&pos) => first_keys[pos].1.push(i),
                    None => {
                        positions.insert(key.clone(), first_keys.len());
                        first_keys.push((key, vec![i]));
                    }
                }
            }
        }

        let others = children
            .iter()
            .skip(1)
            .map(|c| index_keys(c, KeyKind::Join))
            .collect();

        JoinSource {
            children,
            first_keys,
            others,
            cursor: 0,
            runs: Vec::new(),
            known: 0,
        }
    }
}

impl DatumSource for JoinSource {
    fn known_len(&self) -> usize {
        self.known
    }

    fn is_final(&self) -> bool {
        self.cursor >= self.first_keys.len()
    }

    fn extend_page(&mut self, page_size: usize) -> usize {
        let before = self.known;
        while self.cursor < self.first_keys.len() && self.known - before < page_size {
            let pos = self.cursor;
            self.cursor += 1;

            let (key, first) = &self.first_keys[pos];
            let mut count = first.len();
            let mut matched = true;
            for other in &self.others {
                match other.get(key) {
                    Some(list) => count = count.saturating_mul(list.len()),
                    None => {
                        matched = false;
                        break;
                    }
                }
            }

            if matched {
                self.runs.push(KeyRun {
                    key: pos,
                    start: self.known,
                    count,
                });
                self.known = self.known.saturating_add(count);
            }
        }
        self.known - before
    }

    fn datum_at(&self, index: usize) -> Option<Datum> {
        if index >= self.known {
            return None;
        }
        let slot = self.runs.partition_point(|r| r.start + r.count <= index);
        let run = self.runs.get(slot)?;
        let (key, first) = &self.first_keys[run.key];

        let mut lists: Vec<&[usize]> = vec![first.as_slice()];
        for other in &self.others {
            lists.push(other.get(key)?.as_slice());
        }

        let mut rest = index - run.start;
        let mut picks = vec![0usize; lists.len()];
        for (j, list) in lists.iter().enumerate().rev() {
            picks[j] = list[rest % list.len()];
            rest /= list.len();
        }

        let parts = self
            .children
            .iter()
            .zip(picks)
            .map(|(child, i)| child.datum_at(i))
            .collect::<Option<Vec<_>>>()?;
        Some(Datum::concat(parts))
    }
}

/// Grouping on `group_by` keys: one datum per distinct key, binding every
/// entry under that key from every child.
#[derive(Debug)]
pub struct GroupSource {
    children: Vec<Enumeration>,
    /// Sorted keys with, per child, the child indices under the key
    groups: Vec<(String, Vec<Vec<usize>>)>,
}

impl GroupSource {
    pub fn new(mut children: Vec<Enumeration>, page_size: usize) -> Self {
        for child in children.iter_mut() {
            drain(child, page_size);
        }

        let width = children.len();
        let mut map: BTreeMap<String, Vec<Vec<usize>>> = BTreeMap::new();
        for (j, child) in children.iter().enumerate() {
            for i in 0..child.known_len() {
                map.entry(key_at(child, i, KeyKind::Group))
                    .or_insert_with(|| vec![Vec::new(); width])[j]
                    .push(i);
            }
        }
        debug!(keys = map.len(), children = width, "Built group key table");

        GroupSource {
            children,
            groups: map.into_iter().collect(),
        }
    }
}

impl DatumSource for GroupSource {
    fn known_len(&self) -> usize {
        self.groups.len()
    }

    fn is_final(&self) -> bool {
        true
    }

    fn extend_page(&mut self, _page_size: usize) -> usize {
        0
    }

    fn datum_at(&self, index: usize) -> Option<Datum> {
        let (_, lists) = self.groups.get(index)?;
        let mut merged: Vec<DatumInput> = Vec::new();
        for (child, list) in self.children.iter().zip(lists) {
            for &i in list {
                for input in child.datum_at(i)?.inputs {
                    merge_input(&mut merged, input);
                }
            }
        }
        Some(Datum::new(merged))
    }
}

/// Fold an input into the binding for its alias, keeping entries unique.
fn merge_input(merged: &mut Vec<DatumInput>, input: DatumInput) {
    match merged.iter_mut().find(|m| m.alias == input.alias) {
        Some(existing) => {
            for entry in input.entries {
                if !existing.entries.contains(&entry) {
                    existing.entries.push(entry);
                }
            }
        }
        None => merged.push(input),
    }
}

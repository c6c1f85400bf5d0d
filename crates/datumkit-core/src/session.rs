//! Enumeration session.
//!
//! A [`DatumSession`] holds at most one mounted spec and a cursor over its
//! datums. The session moves between two states:
//!
//! - **Unmounted**: the initial state. Only `mount` and `unmount` succeed.
//! - **Mounted**: a spec is resolved and the cursor points at a datum.
//!
//! The known datum count grows one page at a time as the cursor crosses the
//! end of the window, so very large crosses and joins never have to be
//! expanded up front. All operations take the session lock for their whole
//! duration and never interleave.

use crate::combine::{self, DatumSource, Enumeration};
use crate::config::Config;
use crate::error::{DatumError, Result};
use crate::resolve::Resolver;
use crate::services::{FileListingService, NamingService};
use crate::spec::InputSpec;
use crate::types::{Datum, FileBinding};
use crate::validate::Validator;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Knobs a session needs from the configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Datums added to the known window per extension
    pub page_size: usize,
    pub parallel_resolve: bool,
    pub default_project: String,
    pub output_repo: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings::from(&Config::default())
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        SessionSettings {
            page_size: config.session.page_size.max(1),
            parallel_resolve: config.resolve.parallel,
            default_project: config.store.default_project.clone(),
            output_repo: config.validation.output_repo.clone(),
        }
    }
}

/// Cursor position reported by mount and navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatumStatus {
    /// Identifier of the datum under the cursor
    pub id: String,
    pub idx: usize,
    /// Datums known so far; exact once `all_datums_received`
    pub num_datums: usize,
    pub all_datums_received: bool,
}

/// Snapshot returned by [`DatumSession::describe`].
#[derive(Debug, Clone, Serialize)]
pub struct DatumsDescription {
    pub input: InputSpec,
    pub summary: String,
    pub idx: usize,
    pub num_datums: usize,
    pub all_datums_received: bool,
}

/// Live state of a mounted spec.
#[derive(Debug)]
struct EnumerationState {
    spec: InputSpec,
    source: Enumeration,
    index: usize,
    /// Size of the window exposed to the client
    known: usize,
    page_size: usize,
}

impl EnumerationState {
    /// Grow the window by up to one page. Returns the number of datums added;
    /// 0 means the enumeration is exhausted.
    fn extend_window(&mut self) -> usize {
        let target = self.known.saturating_add(self.page_size);
        while self.source.known_len() < target && !self.source.is_final() {
            let needed = target - self.source.known_len();
            if self.source.extend_page(needed) == 0 {
                break;
            }
        }

        let known = self.source.known_len().min(target);
        let added = known.saturating_sub(self.known);
        self.known = known.max(self.known);
        if added > 0 {
            debug!(known = self.known, added, "Extended datum window");
        }
        added
    }

    fn all_received(&self) -> bool {
        self.source.is_final() && self.known == self.source.known_len()
    }

    fn current(&self) -> Result<Datum> {
        self.source
            .datum_at(self.index)
            .ok_or_else(|| DatumError::Internal(format!("no datum at index {}", self.index)))
    }

    fn status(&self) -> Result<DatumStatus> {
        Ok(DatumStatus {
            id: self.current()?.id(),
            idx: self.index,
            num_datums: self.known,
            all_datums_received: self.all_received(),
        })
    }

    fn seek(&mut self, target: usize) -> Result<()> {
        while target >= self.known && !self.all_received() {
            if self.extend_window() == 0 {
                break;
            }
        }
        if target < self.known {
            self.index = target;
            Ok(())
        } else {
            Err(DatumError::OutOfRange {
                requested: target as i64,
                known: self.known,
            })
        }
    }
}

/// Cursor-addressable view over one mounted input spec.
pub struct DatumSession {
    naming: Arc<dyn NamingService>,
    listing: Arc<dyn FileListingService>,
    settings: SessionSettings,
    state: Mutex<Option<EnumerationState>>,
}

impl DatumSession {
    /// Create an unmounted session with default settings.
    pub fn new(naming: Arc<dyn NamingService>, listing: Arc<dyn FileListingService>) -> Self {
        Self::with_settings(naming, listing, SessionSettings::default())
    }

    pub fn with_settings(
        naming: Arc<dyn NamingService>,
        listing: Arc<dyn FileListingService>,
        mut settings: SessionSettings,
    ) -> Self {
        settings.page_size = settings.page_size.max(1);
        DatumSession {
            naming,
            listing,
            settings,
            state: Mutex::new(None),
        }
    }

    /// Active settings
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn is_mounted(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Validate, resolve and combine a spec, then point the cursor at the
    /// first datum.
    ///
    /// Any previous mount is discarded first; if this mount fails the
    /// session is left unmounted.
    #[instrument(skip(self, spec), fields(input = %spec.summary()))]
    pub fn mount(&self, spec: InputSpec) -> Result<DatumStatus> {
        let mut state = self.state.lock();
        if state.take().is_some() {
            debug!("Discarding previous mount");
        }

        let start = Instant::now();
        Validator::new(self.settings.output_repo.as_str()).validate(&spec)?;

        let sets: Vec<_> = Resolver::new(self.naming.as_ref(), self.listing.as_ref())
            .with_default_project(self.settings.default_project.as_str())
            .with_parallel(self.settings.parallel_resolve)
            .resolve_all(&spec)?
            .into_iter()
            .map(Arc::new)
            .collect();

        let source = combine::build(&spec, &sets, self.settings.page_size)?;
        let mut mounted = EnumerationState {
            spec,
            source,
            index: 0,
            known: 0,
            page_size: self.settings.page_size,
        };
        mounted.extend_window();

        if mounted.known == 0 {
            warn!("Spec produced no datums");
            return Err(DatumError::EmptyEnumeration);
        }

        let status = mounted.status()?;
        info!(
            num_datums = status.num_datums,
            all_datums_received = status.all_datums_received,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Mounted datums"
        );
        *state = Some(mounted);
        Ok(status)
    }

    /// Advance the cursor, computing the next page if the window is exhausted.
    pub fn next(&self) -> Result<DatumStatus> {
        self.with_mounted(|m| {
            m.seek(m.index + 1)?;
            m.status()
        })
    }

    /// Move the cursor back one datum.
    pub fn prev(&self) -> Result<DatumStatus> {
        self.with_mounted(|m| {
            if m.index == 0 {
                return Err(DatumError::OutOfRange {
                    requested: -1,
                    known: m.known,
                });
            }
            m.index -= 1;
            m.status()
        })
    }

    /// Jump to an absolute index, extending the window as needed.
    pub fn seek(&self, index: usize) -> Result<DatumStatus> {
        self.with_mounted(|m| {
            m.seek(index)?;
            m.status()
        })
    }

    /// Report the mounted spec and cursor without moving it.
    pub fn describe(&self) -> Result<DatumsDescription> {
        self.with_mounted(|m| {
            Ok(DatumsDescription {
                input: m.spec.clone(),
                summary: m.spec.summary(),
                idx: m.index,
                num_datums: m.known,
                all_datums_received: m.all_received(),
            })
        })
    }

    /// Drop the mounted spec. A no-op when nothing is mounted.
    pub fn unmount(&self) -> Result<()> {
        if self.state.lock().take().is_some() {
            info!("Unmounted datums");
        }
        Ok(())
    }

    /// Materialize the datum under the cursor.
    pub fn current_datum(&self) -> Result<Datum> {
        self.with_mounted(|m| m.current())
    }

    /// The alias -> files mapping for the datum under the cursor.
    pub fn current_bindings(&self) -> Result<BTreeMap<String, FileBinding>> {
        Ok(self.current_datum()?.file_bindings())
    }

    fn with_mounted<T>(&self, f: impl FnOnce(&mut EnumerationState) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock();
        let mounted = state.as_mut().ok_or(DatumError::NotMounted)?;
        f(mounted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ResolutionError, ValidationError};
    use crate::services::MemoryStore;
    use crate::spec::AtomSpec;
    use crate::types::{CommitHandle, RepoHandle};
    use proptest::prelude::*;

    fn store() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.create_repo("default", "repo1");
        store.put_files("default", "repo1", "master", ["dir/file1", "file2"]);
        store.put_files("default", "repo1", "dev", ["dir/file3", "file4"]);
        Arc::new(store)
    }

    fn session_on(store: Arc<MemoryStore>, page_size: usize) -> DatumSession {
        let settings = SessionSettings {
            page_size,
            ..SessionSettings::default()
        };
        DatumSession::with_settings(store.clone(), store, settings)
    }

    fn atom(repo: &str, glob: &str) -> AtomSpec {
        AtomSpec::new(repo, glob)
    }

    #[test]
    fn test_operations_require_mount() {
        let session = session_on(store(), 10);
        assert!(matches!(session.next(), Err(DatumError::NotMounted)));
        assert!(matches!(session.prev(), Err(DatumError::NotMounted)));
        assert!(matches!(session.seek(0), Err(DatumError::NotMounted)));
        assert!(matches!(session.describe(), Err(DatumError::NotMounted)));
        assert!(matches!(session.current_datum(), Err(DatumError::NotMounted)));
        assert!(session.unmount().is_ok());
    }

    #[test]
    fn test_mount_whole_repo() {
        let session = session_on(store(), 10);
        let status = session.mount(InputSpec::atom(atom("repo1", "/"))).unwrap();
        assert_eq!(status.idx, 0);
        assert_eq!(status.num_datums, 1);
        assert!(status.all_datums_received);

        let bindings = session.current_bindings().unwrap();
        assert_eq!(bindings["repo1"].paths, vec!["/"]);
        assert_eq!(bindings["repo1"].branch, "master");
    }

    #[test]
    fn test_navigation_boundaries() {
        let session = session_on(store(), 10);
        let status = session.mount(InputSpec::atom(atom("repo1", "/*"))).unwrap();
        assert_eq!(status.num_datums, 2);

        assert_eq!(session.next().unwrap().idx, 1);
        let err = session.next().unwrap_err();
        assert!(matches!(err, DatumError::OutOfRange { requested: 2, .. }));
        assert_eq!(session.describe().unwrap().idx, 1);

        assert_eq!(session.prev().unwrap().idx, 0);
        assert!(matches!(
            session.prev(),
            Err(DatumError::OutOfRange { requested: -1, .. })
        ));
        assert_eq!(session.describe().unwrap().idx, 0);
    }

    #[test]
    fn test_cross_scenario() {
        let session = session_on(store(), 10);
        let spec = InputSpec::Cross(vec![
            InputSpec::atom(atom("repo1", "/*").with_name("a")),
            InputSpec::atom(atom("repo1", "/").with_name("b").with_branch("dev")),
        ]);
        assert_eq!(session.mount(spec).unwrap().num_datums, 2);

        let first = session.current_bindings().unwrap();
        assert_eq!(first["a"].paths, vec!["/dir"]);
        assert_eq!(first["b"].paths, vec!["/"]);
        assert_eq!(first["b"].branch, "dev");

        session.next().unwrap();
        let second = session.current_bindings().unwrap();
        assert_eq!(second["a"].paths, vec!["/file2"]);
        assert_eq!(second["b"].paths, vec!["/"]);
    }

    #[test]
    fn test_union_scenario() {
        let session = session_on(store(), 10);
        let spec = InputSpec::Union(vec![
            InputSpec::atom(atom("repo1", "/*").with_name("a")),
            InputSpec::atom(atom("repo1", "/").with_name("b").with_branch("dev")),
        ]);
        assert_eq!(session.mount(spec).unwrap().num_datums, 3);

        let mut aliases = Vec::new();
        loop {
            let datum = session.current_datum().unwrap();
            aliases.push(datum.aliases().join(","));
            if session.next().is_err() {
                break;
            }
        }
        assert_eq!(aliases, vec!["a", "a", "b"]);
    }

    #[test]
    fn test_join_scenario() {
        let store = MemoryStore::new();
        store.put_files("default", "a", "master", ["x.1", "y.2"]);
        store.put_files("default", "b", "master", ["y.3", "z.4"]);
        let session = session_on(Arc::new(store), 10);

        let spec = InputSpec::Join(vec![
            InputSpec::atom(atom("a", "/(*).*").with_join_on("$1")),
            InputSpec::atom(atom("b", "/(*).*").with_join_on("$1")),
        ]);
        let status = session.mount(spec).unwrap();
        assert_eq!(status.num_datums, 1);

        let bindings = session.current_bindings().unwrap();
        assert_eq!(bindings["a"].paths, vec!["/y.2"]);
        assert_eq!(bindings["b"].paths, vec!["/y.3"]);
    }

    #[test]
    fn test_group_binds_all_entries_under_key() {
        let store = MemoryStore::new();
        store.put_files("default", "logs", "master", ["2024-01/a", "2024-01/b", "2024-02/c"]);
        let session = session_on(Arc::new(store), 10);

        let spec = InputSpec::Group(vec![InputSpec::atom(
            atom("logs", "/(*)/*").with_group_by("$1"),
        )]);
        assert_eq!(session.mount(spec).unwrap().num_datums, 2);
        assert_eq!(
            session.current_bindings().unwrap()["logs"].paths,
            vec!["/2024-01/a", "/2024-01/b"]
        );
    }

    #[test]
    fn test_nested_cross() {
        let store = store();
        store.create_repo("default", "repo2");
        store.put_files("default", "repo2", "dev", ["dir/file3", "file4"]);
        store.put_files("default", "repo2", "master", ["unused"]);
        let session = session_on(store, 4);

        let pair = |repo: &str, branch: &str, p: &str| {
            InputSpec::Cross(vec![
                InputSpec::atom(
                    atom(repo, "/*")
                        .with_branch(branch)
                        .with_name(format!("{}1", p)),
                ),
                InputSpec::atom(
                    atom(repo, "/*/*")
                        .with_branch(branch)
                        .with_name(format!("{}2", p)),
                ),
            ])
        };
        let spec = InputSpec::Cross(vec![
            pair("repo1", "master", "a"),
            pair("repo2", "dev", "b"),
            InputSpec::Cross(vec![
                InputSpec::atom(atom("repo1", "/*").with_name("c1")),
                InputSpec::atom(atom("repo1", "/*").with_name("c2").with_branch("dev")),
            ]),
        ]);

        let status = session.mount(spec).unwrap();
        assert_eq!(status.num_datums, 4);
        assert!(!status.all_datums_received);

        let end = session.seek(15).unwrap();
        assert_eq!(end.num_datums, 16);
        assert!(end.all_datums_received);
        assert!(session.seek(16).is_err());
        assert_eq!(session.describe().unwrap().idx, 15);
    }

    #[test]
    fn test_pagination_extends_on_next() {
        let store = MemoryStore::new();
        let files: Vec<String> = (0..7).map(|i| format!("f{}", i)).collect();
        store.put_files("default", "repo", "master", &files);
        let session = session_on(Arc::new(store), 3);

        let status = session.mount(InputSpec::atom(atom("repo", "/*"))).unwrap();
        assert_eq!(status.num_datums, 3);
        assert!(!status.all_datums_received);

        let mut last = status;
        for _ in 0..6 {
            last = session.next().unwrap();
        }
        assert_eq!(last.idx, 6);
        assert_eq!(last.num_datums, 7);
        assert!(last.all_datums_received);
        assert!(session.next().is_err());
    }

    #[test]
    fn test_empty_enumeration_leaves_unmounted() {
        let session = session_on(store(), 10);
        let err = session
            .mount(InputSpec::atom(atom("repo1", "/nothing/*")))
            .unwrap_err();
        assert!(matches!(err, DatumError::EmptyEnumeration));
        assert!(err.to_string().contains("nothing to mount"));
        assert!(!session.is_mounted());
    }

    #[test]
    fn test_failed_remount_discards_previous() {
        let session = session_on(store(), 10);
        session.mount(InputSpec::atom(atom("repo1", "/*"))).unwrap();
        assert!(session.mount(InputSpec::atom(atom("missing", "/*"))).is_err());
        assert!(matches!(session.describe(), Err(DatumError::NotMounted)));
    }

    #[test]
    fn test_duplicate_alias_then_named() {
        let session = session_on(store(), 10);
        let dup = InputSpec::Cross(vec![
            InputSpec::atom(atom("repo1", "/")),
            InputSpec::atom(atom("repo1", "/*")),
        ]);
        assert!(matches!(
            session.mount(dup),
            Err(DatumError::Validation(ValidationError::DuplicateAlias { .. }))
        ));

        let named = InputSpec::Cross(vec![
            InputSpec::atom(atom("repo1", "/").with_name("whole")),
            InputSpec::atom(atom("repo1", "/*")),
        ]);
        assert_eq!(session.mount(named).unwrap().num_datums, 2);
    }

    #[test]
    fn test_repo_not_found_in_project() {
        let session = session_on(store(), 10);
        let err = session
            .mount(InputSpec::atom(atom("repo1", "/*").with_project("invalid")))
            .unwrap_err();
        assert!(matches!(
            err,
            DatumError::Resolution(ResolutionError::RepoNotFound { .. })
        ));
    }

    #[test]
    fn test_branch_pointing_at_older_commit() {
        let store = MemoryStore::new();
        store.create_repo("default", "repo");
        let first = store.put_files("default", "repo", "master", ["file1"]);
        store.put_files("default", "repo", "master", ["file2"]);
        store.create_branch("default", "repo", "copy", &first);
        let session = session_on(Arc::new(store), 10);

        let status = session
            .mount(InputSpec::atom(atom("repo", "/*").with_branch("copy")))
            .unwrap();
        assert_eq!(status.num_datums, 1);
        let bindings = session.current_bindings().unwrap();
        assert_eq!(bindings["repo"].commit, first);
        assert_eq!(bindings["repo"].paths, vec!["/file1"]);
    }

    struct Unavailable;

    impl FileListingService for Unavailable {
        fn list_files(&self, commit: &CommitHandle) -> anyhow::Result<Vec<String>> {
            anyhow::bail!("listing {} timed out", commit)
        }
    }

    impl NamingService for Unavailable {
        fn resolve_repo(&self, project: &str, repo: &str) -> anyhow::Result<Option<RepoHandle>> {
            Ok(Some(RepoHandle::new(project, repo, "master")))
        }

        fn head_commit(
            &self,
            repo: &RepoHandle,
            branch: &str,
        ) -> anyhow::Result<Option<CommitHandle>> {
            Ok(Some(CommitHandle::new(repo, branch, "0")))
        }
    }

    #[test]
    fn test_service_failure_is_wrapped() {
        let backend = Arc::new(Unavailable);
        let session = DatumSession::new(backend.clone(), backend);
        let err = session
            .mount(InputSpec::atom(atom("images", "/*").with_name("imgs")))
            .unwrap_err();
        assert!(matches!(
            err,
            DatumError::Resolution(ResolutionError::Service { ref alias, .. }) if alias == "imgs"
        ));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_describe_reports_spec() {
        let session = session_on(store(), 10);
        session.mount(InputSpec::atom(atom("repo1", "/*"))).unwrap();
        session.next().unwrap();

        let description = session.describe().unwrap();
        assert_eq!(description.summary, "repo1:/*");
        assert_eq!(description.idx, 1);
        assert_eq!(description.num_datums, 2);
        assert!(description.all_datums_received);

        session.unmount().unwrap();
        assert!(!session.is_mounted());
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        let store = MemoryStore::new();
        store.put_files("default", "repo", "master", ["a", "b"]);
        let session = session_on(Arc::new(store), 0);
        assert_eq!(session.settings().page_size, 1);

        let status = session.mount(InputSpec::atom(atom("repo", "/*"))).unwrap();
        assert_eq!(status.num_datums, 1);
        assert_eq!(session.next().unwrap().num_datums, 2);
    }

    #[test]
    fn test_concurrent_navigation_keeps_cursor_consistent() {
        let store = MemoryStore::new();
        let files: Vec<String> = (0..50).map(|i| format!("f{:02}", i)).collect();
        store.put_files("default", "repo", "master", &files);
        let session = Arc::new(session_on(Arc::new(store), 4));
        session.mount(InputSpec::atom(atom("repo", "/*"))).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        let forward = session.next().unwrap();
                        assert!(forward.idx >= 1);
                        assert!(forward.idx < forward.num_datums);
                        let datum = session.current_datum().unwrap();
                        assert_eq!(datum.inputs.len(), 1);
                        session.prev().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let description = session.describe().unwrap();
        assert_eq!(description.idx, 0);
        assert_eq!(
            session.current_bindings().unwrap()["repo"].paths,
            vec!["/f00"]
        );
    }

    proptest! {
        #[test]
        fn prop_next_prev_round_trip(count in 2usize..12, page in 1usize..5, steps in 0usize..10) {
            let store = MemoryStore::new();
            let files: Vec<String> = (0..count).map(|i| format!("f{:02}", i)).collect();
            store.put_files("default", "repo", "master", &files);
            let session = session_on(Arc::new(store), page);
            session.mount(InputSpec::atom(atom("repo", "/*"))).unwrap();

            let start = steps % (count - 1);
            session.seek(start).unwrap();
            let before = session.current_datum().unwrap();

            let forward = session.next().unwrap();
            prop_assert_eq!(forward.idx, start + 1);
            let back = session.prev().unwrap();
            prop_assert_eq!(back.idx, start);
            prop_assert_eq!(session.current_datum().unwrap(), before);
        }
    }
}

//! # Datumkit Core Library
//!
//! This crate turns a declarative input spec (atoms combined with cross,
//! union, join and group) into a deterministic, cursor-addressable sequence
//! of datums. Repository storage is abstracted behind the collaborator traits
//! in [`services`], so the engine runs against any store that can name repos
//! and list commit trees.
//!
//! ## Architecture
//!
//! - **Spec** (`spec`): The input tree and its JSON form
//! - **Glob** (`glob`): Glob patterns with capturing groups and key templates
//! - **Validate** (`validate`): Structural checks run before any lookup
//! - **Services** (`services`): Naming and file-listing traits, in-memory store
//! - **Resolve** (`resolve`): Atoms to file sets, in parallel
//! - **Combine** (`combine`): Lazy cross/union/join/group enumerations
//! - **Session** (`session`): Mount/next/prev/seek/describe/unmount
//! - **Config** (`config`): Configuration management
//!
//! ## Example
//!
//! ```rust,ignore
//! use datumkit_core::{DatumSession, InputSpec, MemoryStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! store.put_files("default", "images", "master", ["a.png", "b.png"]);
//!
//! let session = DatumSession::new(store.clone(), store);
//! let spec = InputSpec::from_json(r#"{"pfs": {"repo": "images", "glob": "/*"}}"#)?;
//! let status = session.mount(spec)?;
//! println!("{} datums", status.num_datums);
//! ```

pub mod combine;
pub mod config;
pub mod error;
pub mod glob;
pub mod resolve;
pub mod services;
pub mod session;
pub mod spec;
pub mod types;
pub mod validate;

// Re-export commonly used types
pub use combine::{DatumSource, Enumeration};
pub use config::Config;
pub use error::{DatumError, ResolutionError, Result, ValidationError};
pub use glob::{GlobPattern, KeyTemplate};
pub use resolve::Resolver;
pub use services::{FileListingService, MemoryStore, NamingService};
pub use session::{DatumSession, DatumStatus, DatumsDescription, SessionSettings};
pub use spec::{AtomSpec, CombinatorKind, InputSpec, MountRequest};
pub use types::{CommitHandle, Datum, DatumInput, FileBinding, FileSet, MatchEntry, RepoHandle};
pub use validate::{validate, Validator};

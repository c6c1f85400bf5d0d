//! # Datumkit Local Directory Backend
//!
//! This crate implements the `NamingService` and `FileListingService` traits
//! over a plain directory tree, so specs can be mounted against repositories
//! kept on local disk.
//!
//! ## Layout
//!
//! ```text
//! <root>/<project>/<repo>/HEAD            optional, names the head branch
//! <root>/<project>/<repo>/<branch>/...    the branch's files
//! ```
//!
//! A branch's commit id is a digest of its current listing (paths and
//! sizes). Listing a commit re-walks the branch and fails if the digest no
//! longer matches, so a mount never silently mixes two versions of a branch.
//! Only the latest listing of each branch is kept in memory.

mod store;

/// Error types specific to the local backend
pub mod error;

pub use error::LocalStoreError;
pub use store::LocalStore;

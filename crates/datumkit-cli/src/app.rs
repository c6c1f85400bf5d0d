//! Application state management.

use datumkit_backend_local::LocalStore;
use datumkit_core::{Config, DatumSession, SessionSettings};
use std::sync::Arc;
use tracing::info;

/// Shared application state.
pub struct App {
    /// Configuration
    pub config: Config,

    /// Enumeration session over the local store
    pub session: DatumSession,
}

impl App {
    /// Open the configured store and create an unmounted session.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let root = config.store_root()?;
        let store = Arc::new(
            LocalStore::open(&root)?.with_default_branch(config.store.default_branch.as_str()),
        );
        let settings = SessionSettings::from(&config);

        info!(
            root = %store.root().display(),
            page_size = settings.page_size,
            "Application initialized"
        );

        let session = DatumSession::with_settings(store.clone(), store, settings);
        Ok(App { config, session })
    }
}

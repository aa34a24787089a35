//! Application state

use std::path::PathBuf;
use std::sync::Arc;

use crm_core::analytics::AnalyticsReporter;
use crm_core::store::CrmStore;

use crate::auth::AuthStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    auth_store: AuthStore,
    crm_store: CrmStore,
    analytics: AnalyticsReporter,
}

impl AppState {
    /// Create a new AppState with the given data directory
    pub async fn new(data_dir: PathBuf) -> crm_core::Result<Self> {
        let auth_store = AuthStore::new(data_dir.join("auth.json")).await?;
        let crm_store = CrmStore::new(data_dir.join("crm.json")).await?;
        let analytics = AnalyticsReporter::new(crm_store.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                auth_store,
                crm_store,
                analytics,
            }),
        })
    }

    pub fn auth_store(&self) -> &AuthStore {
        &self.inner.auth_store
    }

    pub fn crm_store(&self) -> &CrmStore {
        &self.inner.crm_store
    }

    pub fn analytics(&self) -> &AnalyticsReporter {
        &self.inner.analytics
    }
}

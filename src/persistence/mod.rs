//! Persistence service client
//!
//! Holds the Supabase project endpoint and service key. The handle is
//! built at startup and kept in the application state; no route reads
//! or writes through it.

use crate::config::PersistenceConfig;

/// Handle to the Supabase project
#[derive(Clone)]
pub struct PersistenceClient {
    url: String,
    key: String,
}

impl PersistenceClient {
    pub fn new(config: &PersistenceConfig) -> Self {
        PersistenceClient {
            url: config.url.trim_end_matches('/').to_string(),
            key: config.key.clone(),
        }
    }

    /// Whether both the project URL and the key are set
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.key.is_empty()
    }
}

impl std::fmt::Debug for PersistenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceClient")
            .field("url", &self.url)
            .field("configured", &self.is_configured())
            .finish()
    }
}

use netia_core::{BotStore, DispatchError, ErrorExt, NewActivity};
use std::sync::Arc;
use tracing::debug;

/// Append-only writer for dispatch outcomes. Storage errors are logged, never returned.
pub struct ActivityLog {
    store: Arc<dyn BotStore>,
}

impl ActivityLog {
    pub fn new(store: Arc<dyn BotStore>) -> Self {
        Self { store }
    }

    /// Returns whether the entry was stored.
    pub async fn record(&self, entry: &NewActivity) -> bool {
        match self.store.append_activity(entry).await {
            Ok(()) => {
                debug!(
                    "Logged {} activity for {} (success: {})",
                    entry.platform,
                    entry.content.id(),
                    entry.success
                );
                true
            }
            Err(source) => {
                DispatchError::Persistence { source }.log_error();
                false
            }
        }
    }
}

use std::sync::Arc;

use super::database::CredentialStore;
use crate::models::AccessLogEntry;

/// Writes access-log rows. A failed write is logged and dropped; it never
/// fails the operation being audited.
#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn CredentialStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Fire-and-forget write on a background task.
    pub fn record(&self, entry: AccessLogEntry) {
        let logger = self.clone();
        tokio::spawn(async move {
            logger.record_now(&entry).await;
        });
    }

    /// Awaited write, still swallowing failures.
    pub async fn record_now(&self, entry: &AccessLogEntry) {
        if let Err(e) = self.store.insert_access_log(entry).await {
            tracing::warn!(
                error = %e,
                action = %entry.action,
                username = %entry.username,
                success = entry.success,
                "Failed to write access log"
            );
        }
    }
}

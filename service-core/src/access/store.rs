use async_trait::async_trait;

use super::capability::CapabilityProfile;
use super::error::AccessError;
use super::policy::{RlsPolicy, RoleView};
use super::predicate::Predicate;

/// A row or document as a JSON object.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Per-call execution settings handed to the store.
#[derive(Debug, Clone, Default)]
pub struct StoreSession {
    /// Role to switch to before the statement. Only set on engines that
    /// enforce natively.
    pub database_role: Option<String>,
    pub user_id: i64,
}

/// A storage engine the access layer can drive.
///
/// Implementations execute exactly the filter they are given. Permission
/// logic lives in [`AccessHandle`](super::AccessHandle), never here.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn capabilities(&self) -> CapabilityProfile;

    /// Name used in logs and error messages only.
    fn engine_name(&self) -> &str;

    async fn find(
        &self,
        session: &StoreSession,
        table: &str,
        filter: &Predicate,
        limit: Option<i64>,
    ) -> Result<Vec<Record>, AccessError>;

    async fn insert(
        &self,
        session: &StoreSession,
        table: &str,
        record: &Record,
    ) -> Result<Record, AccessError>;

    /// Returns the number of matched rows.
    async fn update(
        &self,
        session: &StoreSession,
        table: &str,
        filter: &Predicate,
        changes: &Record,
    ) -> Result<u64, AccessError>;

    async fn delete(
        &self,
        session: &StoreSession,
        table: &str,
        filter: &Predicate,
    ) -> Result<u64, AccessError>;

    async fn enable_row_security(&self, _table: &str) -> Result<(), AccessError> {
        Err(AccessError::unsupported(self.engine_name(), "row level security"))
    }

    async fn create_policy(&self, _policy: &RlsPolicy) -> Result<(), AccessError> {
        Err(AccessError::unsupported(self.engine_name(), "row level security"))
    }

    async fn create_role_view(&self, _view: &RoleView) -> Result<(), AccessError> {
        Err(AccessError::unsupported(self.engine_name(), "role based views"))
    }
}

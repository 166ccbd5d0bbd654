use std::sync::Arc;

use super::capability::{CapabilityProfile, Enforcement};
use super::context::AccessContext;
use super::error::AccessError;
use super::policy::{PolicyRegistry, RlsPolicy, RoleView, WriteOp};
use super::predicate::Predicate;
use super::store::{Record, RecordStore, StoreSession};

/// Entry point for permission-checked data access on one store.
#[derive(Clone)]
pub struct PermissionAwareManager {
    store: Arc<dyn RecordStore>,
    policies: Arc<PolicyRegistry>,
}

impl PermissionAwareManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_policies(store, PolicyRegistry::default())
    }

    pub fn with_policies(store: Arc<dyn RecordStore>, policies: PolicyRegistry) -> Self {
        Self {
            store,
            policies: Arc::new(policies),
        }
    }

    pub fn capabilities(&self) -> CapabilityProfile {
        self.store.capabilities()
    }

    pub fn enforcement(&self) -> Enforcement {
        self.store.capabilities().enforcement()
    }

    /// A handle bound to one caller's identity and permissions.
    pub fn for_context(&self, ctx: AccessContext) -> AccessHandle {
        AccessHandle {
            store: Arc::clone(&self.store),
            policies: Arc::clone(&self.policies),
            enforcement: self.enforcement(),
            ctx,
        }
    }

    pub async fn enable_row_security(&self, table: &str) -> Result<(), AccessError> {
        self.require_row_security()?;
        self.store.enable_row_security(table).await
    }

    pub async fn create_policy(&self, policy: &RlsPolicy) -> Result<(), AccessError> {
        self.require_row_security()?;
        self.store.create_policy(policy).await
    }

    pub async fn create_role_view(&self, view: &RoleView) -> Result<(), AccessError> {
        let caps = self.capabilities();
        if !(caps.views && caps.roles) {
            return Err(AccessError::unsupported(
                self.store.engine_name(),
                "role based views",
            ));
        }
        self.store.create_role_view(view).await
    }

    fn require_row_security(&self) -> Result<(), AccessError> {
        if self.enforcement() != Enforcement::NativeRowSecurity {
            return Err(AccessError::unsupported(
                self.store.engine_name(),
                "row level security",
            ));
        }
        Ok(())
    }
}

/// Permission-enforcing view of a store for a single caller.
pub struct AccessHandle {
    store: Arc<dyn RecordStore>,
    policies: Arc<PolicyRegistry>,
    enforcement: Enforcement,
    ctx: AccessContext,
}

impl AccessHandle {
    pub fn context(&self) -> &AccessContext {
        &self.ctx
    }

    pub fn enforcement(&self) -> Enforcement {
        self.enforcement
    }

    pub async fn find(&self, resource: &str, filter: Predicate) -> Result<Vec<Record>, AccessError> {
        self.find_limited(resource, filter, None).await
    }

    pub async fn first(&self, resource: &str, filter: Predicate) -> Result<Option<Record>, AccessError> {
        let mut rows = self.find_limited(resource, filter, Some(1)).await?;
        Ok(rows.pop())
    }

    pub async fn find_limited(
        &self,
        resource: &str,
        filter: Predicate,
        limit: Option<i64>,
    ) -> Result<Vec<Record>, AccessError> {
        let scoped = self.scope(resource, filter);
        if scoped.is_never() {
            tracing::debug!(
                user_id = self.ctx.user_id,
                resource = %resource,
                "No read permission, returning empty result"
            );
        }
        self.store
            .find(&self.session(), resource, &scoped, limit)
            .await
    }

    pub async fn create(&self, resource: &str, record: Record) -> Result<Record, AccessError> {
        self.authorize(resource, WriteOp::Create)?;
        self.store.insert(&self.session(), resource, &record).await
    }

    /// Update the matching rows the caller can see. Returns the match count.
    pub async fn update(
        &self,
        resource: &str,
        filter: Predicate,
        changes: Record,
    ) -> Result<u64, AccessError> {
        self.authorize(resource, WriteOp::Update)?;
        let scoped = self.scope(resource, filter);
        self.store
            .update(&self.session(), resource, &scoped, &changes)
            .await
    }

    pub async fn delete(&self, resource: &str, filter: Predicate) -> Result<u64, AccessError> {
        self.authorize(resource, WriteOp::Delete)?;
        let scoped = self.scope(resource, filter);
        self.store.delete(&self.session(), resource, &scoped).await
    }

    fn session(&self) -> StoreSession {
        let database_role = match self.enforcement {
            Enforcement::NativeRowSecurity => Some(self.ctx.database_role().to_string()),
            Enforcement::ApplicationFilter => None,
        };
        StoreSession {
            database_role,
            user_id: self.ctx.user_id,
        }
    }

    fn scope(&self, resource: &str, filter: Predicate) -> Predicate {
        match self.enforcement {
            Enforcement::NativeRowSecurity => filter,
            Enforcement::ApplicationFilter => {
                let permitted = self
                    .policies
                    .get(resource)
                    .map(|policy| policy.read_predicate(&self.ctx))
                    .unwrap_or(Predicate::Never);
                permitted.and(filter)
            }
        }
    }

    fn authorize(&self, resource: &str, op: WriteOp) -> Result<(), AccessError> {
        if self.enforcement == Enforcement::NativeRowSecurity {
            return Ok(());
        }

        let required = self
            .policies
            .get(resource)
            .and_then(|policy| policy.write_permission(op));

        match required {
            Some(code) if self.ctx.has_permission(code) => Ok(()),
            Some(code) => {
                tracing::warn!(
                    user_id = self.ctx.user_id,
                    resource = %resource,
                    permission = %code,
                    "Write refused"
                );
                Err(AccessError::PermissionDenied(format!(
                    "{} on {} requires {}",
                    op.as_str(),
                    resource,
                    code
                )))
            }
            None => Err(AccessError::PermissionDenied(format!(
                "{} is not permitted on {}",
                op.as_str(),
                resource
            ))),
        }
    }
}

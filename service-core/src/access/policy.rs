use std::collections::HashMap;

use super::context::AccessContext;
use super::predicate::Predicate;

/// Which rows a read rule exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowScope {
    All,
    /// Rows whose field equals the caller's user id.
    Owner(String),
    /// Rows whose field names the caller as assignee.
    Assigned(String),
    /// Rows whose field is one of the caller's enterprises.
    Enterprise(String),
}

#[derive(Debug, Clone)]
pub struct ReadRule {
    pub permission: String,
    pub scope: RowScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Update,
    Delete,
}

impl WriteOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteOp::Create => "create",
            WriteOp::Update => "update",
            WriteOp::Delete => "delete",
        }
    }
}

/// Application-side access rules for one table or collection.
///
/// Read rules are tried in registration order and the first one the caller
/// holds decides the row scope, so register the broadest rule first.
#[derive(Debug, Clone)]
pub struct ResourcePolicy {
    pub resource: String,
    pub read_rules: Vec<ReadRule>,
    create: Option<String>,
    update: Option<String>,
    delete: Option<String>,
}

impl ResourcePolicy {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            read_rules: Vec::new(),
            create: None,
            update: None,
            delete: None,
        }
    }

    pub fn readable_with(mut self, permission: impl Into<String>, scope: RowScope) -> Self {
        self.read_rules.push(ReadRule {
            permission: permission.into(),
            scope,
        });
        self
    }

    pub fn writable_with(mut self, op: WriteOp, permission: impl Into<String>) -> Self {
        let slot = match op {
            WriteOp::Create => &mut self.create,
            WriteOp::Update => &mut self.update,
            WriteOp::Delete => &mut self.delete,
        };
        *slot = Some(permission.into());
        self
    }

    /// `<prefix>:create`, `<prefix>:update` and `<prefix>:delete`.
    pub fn writable_by_prefix(self, prefix: &str) -> Self {
        self.writable_with(WriteOp::Create, format!("{}:create", prefix))
            .writable_with(WriteOp::Update, format!("{}:update", prefix))
            .writable_with(WriteOp::Delete, format!("{}:delete", prefix))
    }

    pub fn read_predicate(&self, ctx: &AccessContext) -> Predicate {
        let rule = self
            .read_rules
            .iter()
            .find(|rule| ctx.has_permission(&rule.permission));

        match rule.map(|r| &r.scope) {
            Some(RowScope::All) => Predicate::Always,
            Some(RowScope::Owner(field)) | Some(RowScope::Assigned(field)) => {
                Predicate::eq(field.clone(), ctx.user_id)
            }
            Some(RowScope::Enterprise(field)) => {
                Predicate::in_list(field.clone(), ctx.enterprise_ids.iter().copied())
            }
            None => Predicate::Never,
        }
    }

    pub fn write_permission(&self, op: WriteOp) -> Option<&str> {
        match op {
            WriteOp::Create => self.create.as_deref(),
            WriteOp::Update => self.update.as_deref(),
            WriteOp::Delete => self.delete.as_deref(),
        }
    }
}

/// Resource policies keyed by table or collection name.
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    policies: HashMap<String, ResourcePolicy>,
}

impl PolicyRegistry {
    pub fn empty() -> Self {
        Self {
            policies: HashMap::new(),
        }
    }

    pub fn register(mut self, policy: ResourcePolicy) -> Self {
        self.policies.insert(policy.resource.clone(), policy);
        self
    }

    pub fn get(&self, resource: &str) -> Option<&ResourcePolicy> {
        self.policies.get(resource)
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::empty()
            .register(
                ResourcePolicy::new("resumes")
                    .readable_with("resume:view_all", RowScope::All)
                    .readable_with("resume:view_own", RowScope::Owner("user_id".into()))
                    .readable_with(
                        "resume:view_enterprise",
                        RowScope::Enterprise("enterprise_id".into()),
                    )
                    .writable_by_prefix("resume"),
            )
            .register(
                ResourcePolicy::new("approvals")
                    .readable_with("approve:view_all", RowScope::All)
                    .readable_with(
                        "approve:view_assigned",
                        RowScope::Assigned("assigned_to".into()),
                    )
                    .writable_by_prefix("approve"),
            )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyCommand {
    All,
    Select,
    Insert,
    Update,
    Delete,
}

impl PolicyCommand {
    pub fn as_sql(&self) -> &'static str {
        match self {
            PolicyCommand::All => "ALL",
            PolicyCommand::Select => "SELECT",
            PolicyCommand::Insert => "INSERT",
            PolicyCommand::Update => "UPDATE",
            PolicyCommand::Delete => "DELETE",
        }
    }
}

/// A declarative row policy to install on an engine with native row security.
///
/// `using` and `with_check` are SQL boolean expressions supplied by the
/// operator; identifiers are validated by the store.
#[derive(Debug, Clone)]
pub struct RlsPolicy {
    pub table: String,
    pub name: String,
    pub command: PolicyCommand,
    pub role: String,
    pub using: String,
    pub with_check: Option<String>,
}

impl RlsPolicy {
    /// Rows owned by the user id the store publishes per transaction
    /// (`app.current_user_id`).
    pub fn owner_only(table: &str, role: &str, owner_column: &str) -> Self {
        let expr = format!(
            "{} = NULLIF(current_setting('app.current_user_id', true), '')::bigint",
            owner_column
        );
        Self {
            table: table.to_string(),
            name: format!("{}_{}_owner", table, role),
            command: PolicyCommand::All,
            role: role.to_string(),
            using: expr.clone(),
            with_check: Some(expr),
        }
    }
}

/// A view granted to one database role.
#[derive(Debug, Clone)]
pub struct RoleView {
    pub name: String,
    pub query: String,
    pub role: String,
}

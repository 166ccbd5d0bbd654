//! PostgreSQL store with native row security.
//!
//! Each operation runs in its own transaction that first switches to the
//! session's database role (`SET LOCAL ROLE`) and publishes the caller's id
//! as `app.current_user_id`, so installed policies can reference it.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPool, Postgres, QueryBuilder, Row, Transaction};

use super::capability::CapabilityProfile;
use super::error::AccessError;
use super::policy::{PolicyCommand, RlsPolicy, RoleView};
use super::predicate::{Predicate, Scalar};
use super::store::{Record, RecordStore, StoreSession};

/// First server version with `CREATE POLICY`.
const MIN_RLS_VERSION: i32 = 90500;

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
    capabilities: CapabilityProfile,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            capabilities: CapabilityProfile::POSTGRES,
        }
    }

    /// Probe the server version and drop row security on servers without it.
    pub async fn detect(pool: PgPool) -> Result<Self, AccessError> {
        let version: i32 =
            sqlx::query_scalar("SELECT current_setting('server_version_num')::int")
                .fetch_one(&pool)
                .await?;

        let capabilities = if version >= MIN_RLS_VERSION {
            CapabilityProfile::POSTGRES
        } else {
            CapabilityProfile {
                row_level_security: false,
                ..CapabilityProfile::POSTGRES
            }
        };

        tracing::info!(
            server_version = version,
            row_level_security = capabilities.row_level_security,
            "Detected PostgreSQL capabilities"
        );

        Ok(Self { pool, capabilities })
    }

    async fn begin(
        &self,
        session: &StoreSession,
    ) -> Result<Transaction<'static, Postgres>, AccessError> {
        let mut tx = self.pool.begin().await?;

        if let Some(role) = &session.database_role {
            let stmt = format!("SET LOCAL ROLE {}", quote_column(role)?);
            sqlx::query(&stmt).execute(&mut *tx).await?;
        }

        sqlx::query("SELECT set_config('app.current_user_id', $1, true)")
            .bind(session.user_id.to_string())
            .execute(&mut *tx)
            .await?;

        Ok(tx)
    }
}

/// Quote a table name, optionally schema-qualified.
pub(crate) fn quote_table(name: &str) -> Result<String, AccessError> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return Err(AccessError::InvalidIdentifier(name.to_string()));
    }
    parts
        .iter()
        .map(|part| quote_part(part, name))
        .collect::<Result<Vec<_>, _>>()
        .map(|quoted| quoted.join("."))
}

/// Quote a column or role name.
pub(crate) fn quote_column(name: &str) -> Result<String, AccessError> {
    quote_part(name, name)
}

fn quote_part(part: &str, whole: &str) -> Result<String, AccessError> {
    let mut chars = part.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_start && valid_rest && part.len() <= 63 {
        Ok(format!("\"{}\"", part))
    } else {
        Err(AccessError::InvalidIdentifier(whole.to_string()))
    }
}

fn push_scalar(qb: &mut QueryBuilder<'_, Postgres>, value: &Scalar) {
    match value {
        Scalar::Int(v) => qb.push_bind(*v),
        Scalar::Bool(v) => qb.push_bind(*v),
        Scalar::Text(v) => qb.push_bind(v.clone()),
    };
}

/// Render a predicate against the row alias `t`.
pub(crate) fn push_predicate(
    qb: &mut QueryBuilder<'_, Postgres>,
    predicate: &Predicate,
) -> Result<(), AccessError> {
    match predicate {
        Predicate::Always => {
            qb.push("TRUE");
        }
        Predicate::Never => {
            qb.push("FALSE");
        }
        Predicate::Eq { field, value } => {
            qb.push("t.").push(quote_column(field)?).push(" = ");
            push_scalar(qb, value);
        }
        Predicate::In { field, values } => {
            qb.push("t.").push(quote_column(field)?).push(" IN (");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                push_scalar(qb, value);
            }
            qb.push(")");
        }
        Predicate::And(parts) if parts.is_empty() => {
            qb.push("TRUE");
        }
        Predicate::And(parts) => {
            qb.push("(");
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    qb.push(" AND ");
                }
                push_predicate(qb, part)?;
            }
            qb.push(")");
        }
    }
    Ok(())
}

fn quoted_columns(record: &Record) -> Result<Vec<String>, AccessError> {
    if record.is_empty() {
        return Err(AccessError::QueryFailed(anyhow::anyhow!(
            "record has no columns"
        )));
    }
    record.keys().map(|k| quote_column(k)).collect()
}

fn into_record(value: Value) -> Result<Record, AccessError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(AccessError::QueryFailed(anyhow::anyhow!(
            "expected a row object, got {}",
            other
        ))),
    }
}

pub(crate) fn select_query(
    table: &str,
    filter: &Predicate,
    limit: Option<i64>,
) -> Result<QueryBuilder<'static, Postgres>, AccessError> {
    let mut qb = QueryBuilder::new("SELECT to_jsonb(t) AS row FROM ");
    qb.push(quote_table(table)?).push(" AS t WHERE ");
    push_predicate(&mut qb, filter)?;
    if let Some(limit) = limit {
        qb.push(" LIMIT ").push_bind(limit);
    }
    Ok(qb)
}

pub(crate) fn update_query(
    table: &str,
    filter: &Predicate,
    changes: &Record,
) -> Result<QueryBuilder<'static, Postgres>, AccessError> {
    let table = quote_table(table)?;
    let columns = quoted_columns(changes)?;

    let mut qb = QueryBuilder::new("UPDATE ");
    qb.push(&table).push(" AS t SET ");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(column).push(" = r.").push(column);
    }
    qb.push(" FROM jsonb_populate_record(NULL::")
        .push(&table)
        .push(", ");
    qb.push_bind(Value::Object(changes.clone()));
    qb.push(") AS r WHERE ");
    push_predicate(&mut qb, filter)?;
    Ok(qb)
}

#[async_trait]
impl RecordStore for PgRecordStore {
    fn capabilities(&self) -> CapabilityProfile {
        self.capabilities
    }

    fn engine_name(&self) -> &str {
        "postgresql"
    }

    async fn find(
        &self,
        session: &StoreSession,
        table: &str,
        filter: &Predicate,
        limit: Option<i64>,
    ) -> Result<Vec<Record>, AccessError> {
        let mut qb = select_query(table, filter, limit)?;

        let mut tx = self.begin(session).await?;
        let rows = qb.build().fetch_all(&mut *tx).await?;
        tx.commit().await?;

        rows.into_iter()
            .map(|row| {
                let value: Value = row.try_get("row")?;
                into_record(value)
            })
            .collect()
    }

    async fn insert(
        &self,
        session: &StoreSession,
        table: &str,
        record: &Record,
    ) -> Result<Record, AccessError> {
        let table = quote_table(table)?;
        let column_list = quoted_columns(record)?.join(", ");

        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO ");
        qb.push(&table)
            .push(" AS t (")
            .push(&column_list)
            .push(") SELECT ")
            .push(&column_list)
            .push(" FROM jsonb_populate_record(NULL::")
            .push(&table)
            .push(", ");
        qb.push_bind(Value::Object(record.clone()));
        qb.push(") RETURNING to_jsonb(t) AS row");

        let mut tx = self.begin(session).await?;
        let row = qb.build().fetch_one(&mut *tx).await?;
        tx.commit().await?;

        into_record(row.try_get("row")?)
    }

    async fn update(
        &self,
        session: &StoreSession,
        table: &str,
        filter: &Predicate,
        changes: &Record,
    ) -> Result<u64, AccessError> {
        let mut qb = update_query(table, filter, changes)?;

        let mut tx = self.begin(session).await?;
        let result = qb.build().execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn delete(
        &self,
        session: &StoreSession,
        table: &str,
        filter: &Predicate,
    ) -> Result<u64, AccessError> {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM ");
        qb.push(quote_table(table)?).push(" AS t WHERE ");
        push_predicate(&mut qb, filter)?;

        let mut tx = self.begin(session).await?;
        let result = qb.build().execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn enable_row_security(&self, table: &str) -> Result<(), AccessError> {
        if !self.capabilities.row_level_security {
            return Err(AccessError::unsupported(self.engine_name(), "row level security"));
        }
        let stmt = format!("ALTER TABLE {} ENABLE ROW LEVEL SECURITY", quote_table(table)?);
        sqlx::query(&stmt).execute(&self.pool).await?;
        tracing::info!(table = %table, "Enabled row level security");
        Ok(())
    }

    async fn create_policy(&self, policy: &RlsPolicy) -> Result<(), AccessError> {
        if !self.capabilities.row_level_security {
            return Err(AccessError::unsupported(self.engine_name(), "row level security"));
        }
        let table = quote_table(&policy.table)?;
        let name = quote_column(&policy.name)?;
        let role = quote_column(&policy.role)?;

        let mut create = format!(
            "CREATE POLICY {} ON {} FOR {} TO {} USING ({})",
            name,
            table,
            policy.command.as_sql(),
            role,
            policy.using
        );
        // WITH CHECK is rejected for SELECT and DELETE policies
        if let Some(check) = &policy.with_check {
            if !matches!(policy.command, PolicyCommand::Select | PolicyCommand::Delete) {
                create.push_str(&format!(" WITH CHECK ({})", check));
            }
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DROP POLICY IF EXISTS {} ON {}", name, table))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&create).execute(&mut *tx).await?;
        tx.commit().await?;

        tracing::info!(policy = %policy.name, table = %policy.table, role = %policy.role, "Installed row policy");
        Ok(())
    }

    async fn create_role_view(&self, view: &RoleView) -> Result<(), AccessError> {
        if !self.capabilities.views {
            return Err(AccessError::unsupported(self.engine_name(), "role based views"));
        }
        let name = quote_table(&view.name)?;
        let role = quote_column(&view.role)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("CREATE OR REPLACE VIEW {} AS {}", name, view.query))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("GRANT SELECT ON {} TO {}", name, role))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(view = %view.name, role = %view.role, "Created role view");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identifiers_are_validated_and_quoted() {
        assert_eq!(quote_table("resumes").unwrap(), "\"resumes\"");
        assert_eq!(quote_table("hr.resumes").unwrap(), "\"hr\".\"resumes\"");
        assert!(quote_table("a.b.c").is_err());
        assert!(quote_column("user_id; DROP TABLE users").is_err());
        assert!(quote_column("1st").is_err());
        assert!(quote_column("").is_err());
        assert!(quote_column("hr.user_id").is_err());
    }

    #[test]
    fn select_renders_binds_in_order() {
        let filter = Predicate::eq("user_id", 7_i64).and(Predicate::in_list("status", ["open", "draft"]));
        let qb = select_query("resumes", &filter, Some(10)).unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT to_jsonb(t) AS row FROM \"resumes\" AS t WHERE (t.\"user_id\" = $1 AND t.\"status\" IN ($2, $3)) LIMIT $4"
        );
    }

    #[test]
    fn never_renders_false() {
        let qb = select_query("resumes", &Predicate::Never, None).unwrap();
        assert!(qb.sql().ends_with("WHERE FALSE"));
    }

    #[test]
    fn update_sets_from_populated_record() {
        let changes = json!({ "title": "Senior" }).as_object().cloned().unwrap();
        let qb = update_query("resumes", &Predicate::eq("id", 3_i64), &changes).unwrap();
        assert_eq!(
            qb.sql(),
            "UPDATE \"resumes\" AS t SET \"title\" = r.\"title\" FROM jsonb_populate_record(NULL::\"resumes\", $1) AS r WHERE t.\"id\" = $2"
        );
    }

    #[test]
    fn bad_field_in_filter_is_rejected() {
        let filter = Predicate::eq("owner or 1=1", 1_i64);
        assert!(matches!(
            select_query("resumes", &filter, None),
            Err(AccessError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn owner_policy_reads_session_user() {
        let policy = RlsPolicy::owner_only("resumes", "app_user", "user_id");
        assert!(policy.using.contains("app.current_user_id"));
        assert_eq!(policy.name, "resumes_app_user_owner");
    }
}

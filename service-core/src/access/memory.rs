//! In-process store for tests and local runs.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::capability::CapabilityProfile;
use super::error::AccessError;
use super::policy::{RlsPolicy, RoleView};
use super::predicate::Predicate;
use super::store::{Record, RecordStore, StoreSession};

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Record>>,
    next_id: i64,
    role_switches: Vec<String>,
    policies: Vec<RlsPolicy>,
    views: Vec<RoleView>,
    secured_tables: Vec<String>,
}

/// Keeps rows in memory and evaluates predicates directly.
///
/// The capability profile is configurable so both enforcement paths can be
/// exercised. Role switches are recorded, not enforced.
pub struct MemoryRecordStore {
    name: String,
    capabilities: CapabilityProfile,
    state: Mutex<MemoryState>,
}

impl MemoryRecordStore {
    pub fn new(name: impl Into<String>, capabilities: CapabilityProfile) -> Self {
        Self {
            name: name.into(),
            capabilities,
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, AccessError> {
        self.state
            .lock()
            .map_err(|e| AccessError::QueryFailed(anyhow::anyhow!("Memory store mutex poisoned: {}", e)))
    }

    /// Insert rows as-is, bypassing every check.
    pub fn seed(&self, table: &str, rows: Vec<Value>) -> Result<(), AccessError> {
        let mut state = self.lock()?;
        let target = state.tables.entry(table.to_string()).or_default();
        for row in rows {
            if let Value::Object(map) = row {
                target.push(map);
            }
        }
        Ok(())
    }

    pub fn rows(&self, table: &str) -> Result<Vec<Record>, AccessError> {
        Ok(self.lock()?.tables.get(table).cloned().unwrap_or_default())
    }

    pub fn role_switches(&self) -> Result<Vec<String>, AccessError> {
        Ok(self.lock()?.role_switches.clone())
    }

    pub fn installed_policies(&self) -> Result<Vec<RlsPolicy>, AccessError> {
        Ok(self.lock()?.policies.clone())
    }

    fn record_session(state: &mut MemoryState, session: &StoreSession) {
        if let Some(role) = &session.database_role {
            state.role_switches.push(role.clone());
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    fn capabilities(&self) -> CapabilityProfile {
        self.capabilities
    }

    fn engine_name(&self) -> &str {
        &self.name
    }

    async fn find(
        &self,
        session: &StoreSession,
        table: &str,
        filter: &Predicate,
        limit: Option<i64>,
    ) -> Result<Vec<Record>, AccessError> {
        let mut state = self.lock()?;
        Self::record_session(&mut state, session);

        let limit = limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        Ok(state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filter.matches(row))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(
        &self,
        session: &StoreSession,
        table: &str,
        record: &Record,
    ) -> Result<Record, AccessError> {
        let mut state = self.lock()?;
        Self::record_session(&mut state, session);

        let mut stored = record.clone();
        if !stored.contains_key("id") {
            state.next_id += 1;
            stored.insert("id".to_string(), Value::from(state.next_id));
        }
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        session: &StoreSession,
        table: &str,
        filter: &Predicate,
        changes: &Record,
    ) -> Result<u64, AccessError> {
        let mut state = self.lock()?;
        Self::record_session(&mut state, session);

        let mut matched = 0;
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| filter.matches(row)) {
                for (key, value) in changes {
                    row.insert(key.clone(), value.clone());
                }
                matched += 1;
            }
        }
        Ok(matched)
    }

    async fn delete(
        &self,
        session: &StoreSession,
        table: &str,
        filter: &Predicate,
    ) -> Result<u64, AccessError> {
        let mut state = self.lock()?;
        Self::record_session(&mut state, session);

        let Some(rows) = state.tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !filter.matches(row));
        Ok((before - rows.len()) as u64)
    }

    async fn enable_row_security(&self, table: &str) -> Result<(), AccessError> {
        if !self.capabilities.row_level_security {
            return Err(AccessError::unsupported(&self.name, "row level security"));
        }
        self.lock()?.secured_tables.push(table.to_string());
        Ok(())
    }

    async fn create_policy(&self, policy: &RlsPolicy) -> Result<(), AccessError> {
        if !self.capabilities.row_level_security {
            return Err(AccessError::unsupported(&self.name, "row level security"));
        }
        let mut state = self.lock()?;
        state
            .policies
            .retain(|p| !(p.table == policy.table && p.name == policy.name));
        state.policies.push(policy.clone());
        Ok(())
    }

    async fn create_role_view(&self, view: &RoleView) -> Result<(), AccessError> {
        if !self.capabilities.views {
            return Err(AccessError::unsupported(&self.name, "role based views"));
        }
        let mut state = self.lock()?;
        state.views.retain(|v| v.name != view.name);
        state.views.push(view.clone());
        Ok(())
    }
}

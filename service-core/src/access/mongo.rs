//! MongoDB store. No row security: the access layer injects filters.

use async_trait::async_trait;
use mongodb::bson::{self, doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::{options::FindOptions, Database};

use super::capability::CapabilityProfile;
use super::error::AccessError;
use super::predicate::{Predicate, Scalar};
use super::store::{Record, RecordStore, StoreSession};

#[derive(Clone)]
pub struct MongoRecordStore {
    db: Database,
}

impl MongoRecordStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self, name: &str) -> Result<mongodb::Collection<Document>, AccessError> {
        if name.is_empty() || name.starts_with("system.") || name.contains('$') {
            return Err(AccessError::InvalidIdentifier(name.to_string()));
        }
        Ok(self.db.collection::<Document>(name))
    }
}

fn check_field(field: &str) -> Result<(), AccessError> {
    if field.is_empty() || field.starts_with('$') || field.contains('\0') {
        return Err(AccessError::InvalidIdentifier(field.to_string()));
    }
    Ok(())
}

fn scalar_to_bson(value: &Scalar) -> Bson {
    match value {
        Scalar::Int(v) => Bson::Int64(*v),
        Scalar::Bool(v) => Bson::Boolean(*v),
        Scalar::Text(v) => Bson::String(v.clone()),
    }
}

/// Translate a predicate into a query filter document.
pub(crate) fn to_filter(predicate: &Predicate) -> Result<Document, AccessError> {
    match predicate {
        Predicate::Always => Ok(doc! {}),
        Predicate::Never => Ok(doc! { "_id": { "$exists": false } }),
        Predicate::Eq { field, value } => {
            check_field(field)?;
            let mut filter = Document::new();
            filter.insert(field.clone(), scalar_to_bson(value));
            Ok(filter)
        }
        Predicate::In { field, values } => {
            check_field(field)?;
            let values: Vec<Bson> = values.iter().map(scalar_to_bson).collect();
            let mut filter = Document::new();
            filter.insert(field.clone(), doc! { "$in": values });
            Ok(filter)
        }
        Predicate::And(parts) => {
            let mut clauses = Vec::with_capacity(parts.len());
            for part in parts {
                let clause = to_filter(part)?;
                if !clause.is_empty() {
                    clauses.push(Bson::Document(clause));
                }
            }
            if clauses.is_empty() {
                Ok(doc! {})
            } else {
                Ok(doc! { "$and": clauses })
            }
        }
    }
}

fn to_document(record: &Record) -> Result<Document, AccessError> {
    for field in record.keys() {
        check_field(field)?;
    }
    bson::to_document(record).map_err(|e| AccessError::QueryFailed(anyhow::Error::new(e)))
}

fn to_record(document: Document) -> Result<Record, AccessError> {
    match Bson::Document(document).into_relaxed_extjson() {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(AccessError::QueryFailed(anyhow::anyhow!(
            "expected a document, got {}",
            other
        ))),
    }
}

#[async_trait]
impl RecordStore for MongoRecordStore {
    fn capabilities(&self) -> CapabilityProfile {
        CapabilityProfile::MONGODB
    }

    fn engine_name(&self) -> &str {
        "mongodb"
    }

    async fn find(
        &self,
        _session: &StoreSession,
        table: &str,
        filter: &Predicate,
        limit: Option<i64>,
    ) -> Result<Vec<Record>, AccessError> {
        let options = FindOptions::builder().limit(limit).build();
        let cursor = self
            .collection(table)?
            .find(to_filter(filter)?, options)
            .await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        documents.into_iter().map(to_record).collect()
    }

    async fn insert(
        &self,
        _session: &StoreSession,
        table: &str,
        record: &Record,
    ) -> Result<Record, AccessError> {
        let result = self
            .collection(table)?
            .insert_one(to_document(record)?, None)
            .await?;

        let mut stored = record.clone();
        stored.insert("_id".to_string(), result.inserted_id.into_relaxed_extjson());
        Ok(stored)
    }

    async fn update(
        &self,
        _session: &StoreSession,
        table: &str,
        filter: &Predicate,
        changes: &Record,
    ) -> Result<u64, AccessError> {
        let update = doc! { "$set": to_document(changes)? };
        let result = self
            .collection(table)?
            .update_many(to_filter(filter)?, update, None)
            .await?;
        Ok(result.matched_count)
    }

    async fn delete(
        &self,
        _session: &StoreSession,
        table: &str,
        filter: &Predicate,
    ) -> Result<u64, AccessError> {
        let result = self
            .collection(table)?
            .delete_many(to_filter(filter)?, None)
            .await?;
        Ok(result.deleted_count)
    }
}

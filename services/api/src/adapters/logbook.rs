//! services/api/src/adapters/logbook.rs
//!
//! Postgres implementation of the `LogbookStore` and `LogbookTx` ports.
//!
//! Structured fields (views, findings, demographics, signatures) live in
//! JSONB columns and round-trip through the domain types' own serde
//! shapes, so the stored JSON matches what the signing digest and the API
//! responses serialize.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use echolog_core::domain::{
    Demographics, Findings, ImageQuality, LogbookEntry, Role, SignatureRecord, View,
};
use echolog_core::ports::{LogbookStore, LogbookTx, StoreError, StoreResult};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use super::db::DbAdapter;

//=========================================================================================
// Database Record Structs
//=========================================================================================

const ENTRY_COLUMNS: &str = "id, owner_id, scan_date, indication, views, findings, summary, \
                             directly_observed, image_quality, demographics, notes, diagnosis, \
                             comments, mentor_signature, supervisor_signature, locked, \
                             created_at, updated_at";

#[derive(FromRow)]
struct EntryRecord {
    id: Uuid,
    owner_id: String,
    scan_date: DateTime<Utc>,
    indication: Option<String>,
    views: Json<Vec<View>>,
    findings: Json<Findings>,
    summary: Option<String>,
    directly_observed: Option<bool>,
    image_quality: Option<String>,
    demographics: Json<Demographics>,
    notes: Option<String>,
    diagnosis: String,
    comments: Option<String>,
    mentor_signature: Option<Json<SignatureRecord>>,
    supervisor_signature: Option<Json<SignatureRecord>>,
    locked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EntryRecord {
    fn to_domain(self) -> StoreResult<LogbookEntry> {
        let image_quality = self
            .image_quality
            .map(|s| s.parse::<ImageQuality>())
            .transpose()
            .map_err(StoreError::Unexpected)?;
        Ok(LogbookEntry {
            id: self.id,
            owner_id: self.owner_id,
            date: self.scan_date,
            indication: self.indication,
            views: self.views.0,
            findings: self.findings.0,
            summary: self.summary,
            directly_observed: self.directly_observed,
            image_quality,
            demographics: self.demographics.0,
            notes: self.notes,
            diagnosis: self.diagnosis,
            comments: self.comments,
            mentor_signature: self.mentor_signature.map(|j| j.0),
            supervisor_signature: self.supervisor_signature.map(|j| j.0),
            locked: self.locked,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

//=========================================================================================
// `LogbookStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl LogbookStore for DbAdapter {
    async fn begin(&self) -> StoreResult<Box<dyn LogbookTx>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(Box::new(PgLogbookTx { tx }))
    }

    async fn entry(&self, id: Uuid) -> StoreResult<Option<LogbookEntry>> {
        let record = sqlx::query_as::<_, EntryRecord>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM logbook_entries WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        record.map(EntryRecord::to_domain).transpose()
    }

    async fn entries_for_owner(&self, owner_id: &str) -> StoreResult<Vec<LogbookEntry>> {
        let records = sqlx::query_as::<_, EntryRecord>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM logbook_entries \
             WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        records.into_iter().map(EntryRecord::to_domain).collect()
    }

    async fn insert_entry(&self, entry: &LogbookEntry) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO logbook_entries (id, owner_id, scan_date, indication, views, findings, \
                                          summary, directly_observed, image_quality, demographics, \
                                          notes, diagnosis, comments, mentor_signature, \
                                          supervisor_signature, locked, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(entry.id)
        .bind(&entry.owner_id)
        .bind(entry.date)
        .bind(&entry.indication)
        .bind(Json(&entry.views))
        .bind(Json(&entry.findings))
        .bind(&entry.summary)
        .bind(entry.directly_observed)
        .bind(entry.image_quality.map(ImageQuality::as_str))
        .bind(Json(&entry.demographics))
        .bind(&entry.notes)
        .bind(&entry.diagnosis)
        .bind(&entry.comments)
        .bind(entry.mentor_signature.as_ref().map(Json))
        .bind(entry.supervisor_signature.as_ref().map(Json))
        .bind(entry.locked)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(())
    }
}

//=========================================================================================
// `LogbookTx` Trait Implementation
//=========================================================================================

/// One open Postgres transaction over the logbook table. Dropping it
/// without `commit` rolls everything back.
struct PgLogbookTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LogbookTx for PgLogbookTx {
    async fn entry_for_update(&mut self, id: Uuid) -> StoreResult<Option<LogbookEntry>> {
        let record = sqlx::query_as::<_, EntryRecord>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM logbook_entries WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        record.map(EntryRecord::to_domain).transpose()
    }

    async fn write_signature(
        &mut self,
        id: Uuid,
        role: Role,
        record: &SignatureRecord,
        lock: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        // The signature column is selected by role; the lock flag only ever
        // ratchets on.
        let column = match role {
            Role::Mentor => "mentor_signature",
            Role::Supervisor => "supervisor_signature",
        };
        sqlx::query(&format!(
            "UPDATE logbook_entries \
             SET {column} = $2, locked = locked OR $3, updated_at = $4 \
             WHERE id = $1"
        ))
        .bind(id)
        .bind(Json(record))
        .bind(lock)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn update_core(&mut self, entry: &LogbookEntry) -> StoreResult<()> {
        sqlx::query(
            "UPDATE logbook_entries \
             SET scan_date = $2, indication = $3, views = $4, findings = $5, summary = $6, \
                 directly_observed = $7, image_quality = $8, demographics = $9, notes = $10, \
                 diagnosis = $11, comments = $12, updated_at = $13 \
             WHERE id = $1",
        )
        .bind(entry.id)
        .bind(entry.date)
        .bind(&entry.indication)
        .bind(Json(&entry.views))
        .bind(Json(&entry.findings))
        .bind(&entry.summary)
        .bind(entry.directly_observed)
        .bind(entry.image_quality.map(ImageQuality::as_str))
        .bind(Json(&entry.demographics))
        .bind(&entry.notes)
        .bind(&entry.diagnosis)
        .bind(&entry.comments)
        .bind(entry.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.tx
            .commit()
            .await
            .map_err(|e| StoreError::Unexpected(e.to_string()))
    }
}

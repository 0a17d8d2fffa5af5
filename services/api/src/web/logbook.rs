//! services/api/src/web/logbook.rs
//!
//! Axum handlers for logbook entries: CRUD, counter-signing, and digest
//! verification. The clinical payload shapes mirror the domain types'
//! serde forms, so what a client sends is exactly what gets digested and
//! stored.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use echolog_core::domain::{
    Demographics, EntryContent, Findings, ImageQuality, LogbookEntry, Role, SignatureRecord, View,
};
use echolog_core::logbook;
use echolog_core::signing::{sign_entry, verify_entry, SignatureAttrs};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::CurrentUser;
use crate::web::rest::{logbook_error, OkResponse};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// The editable clinical content, shared by create and update. Everything
/// except the scan date is optional; omitted findings mean "not assessed".
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntryPayload {
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub indication: Option<String>,
    #[serde(default)]
    #[schema(value_type = Vec<String>, example = json!(["PLAX", "IVC"]))]
    pub views: Vec<View>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub findings: Findings,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub directly_observed: Option<bool>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "Acceptable")]
    pub image_quality: Option<ImageQuality>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub demographics: Demographics,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub comments: Option<String>,
}

impl EntryPayload {
    fn into_content(self) -> EntryContent {
        EntryContent {
            date: self.date,
            indication: self.indication,
            views: self.views,
            findings: self.findings,
            summary: self.summary,
            directly_observed: self.directly_observed,
            image_quality: self.image_quality,
            demographics: self.demographics,
            notes: self.notes,
            diagnosis: self.diagnosis,
            comments: self.comments,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    pub id: Uuid,
    pub owner_id: String,
    pub date: DateTime<Utc>,
    pub indication: Option<String>,
    #[schema(value_type = Vec<String>)]
    pub views: Vec<View>,
    #[schema(value_type = Object)]
    pub findings: Findings,
    pub summary: Option<String>,
    pub directly_observed: Option<bool>,
    #[schema(value_type = Option<String>)]
    pub image_quality: Option<ImageQuality>,
    #[schema(value_type = Object)]
    pub demographics: Demographics,
    pub notes: Option<String>,
    pub diagnosis: String,
    pub comments: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub mentor_signature: Option<SignatureRecord>,
    #[schema(value_type = Option<Object>)]
    pub supervisor_signature: Option<SignatureRecord>,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LogbookEntry> for EntryResponse {
    fn from(entry: LogbookEntry) -> Self {
        Self {
            id: entry.id,
            owner_id: entry.owner_id,
            date: entry.date,
            indication: entry.indication,
            views: entry.views,
            findings: entry.findings,
            summary: entry.summary,
            directly_observed: entry.directly_observed,
            image_quality: entry.image_quality,
            demographics: entry.demographics,
            notes: entry.notes,
            diagnosis: entry.diagnosis,
            comments: entry.comments,
            mentor_signature: entry.mentor_signature,
            supervisor_signature: entry.supervisor_signature,
            locked: entry.locked,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    /// `"mentor"` or `"supervisor"`.
    pub role: String,
    #[serde(default)]
    pub sig_url: Option<String>,
    #[serde(default)]
    pub signer_name: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /logbook - Create a draft entry owned by the caller
#[utoipa::path(
    post,
    path = "/logbook",
    request_body = EntryPayload,
    responses(
        (status = 201, description = "Entry created", body = EntryResponse),
        (status = 401, description = "Unauthenticated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_entry_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentUser>,
    Json(payload): Json<EntryPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let entry = logbook::create_entry(state.logbook.as_ref(), &caller.0, payload.into_content())
        .await
        .map_err(logbook_error)?;
    Ok((StatusCode::CREATED, Json(EntryResponse::from(entry))))
}

/// GET /logbook - The caller's entries, newest first
#[utoipa::path(
    get,
    path = "/logbook",
    responses(
        (status = 200, description = "The caller's entries, newest first", body = [EntryResponse]),
        (status = 401, description = "Unauthenticated")
    )
)]
pub async fn list_entries_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let found = logbook::entries_for_owner(state.logbook.as_ref(), &caller.0)
        .await
        .map_err(logbook_error)?;
    let body: Vec<EntryResponse> = found.into_iter().map(EntryResponse::from).collect();
    Ok(Json(body))
}

/// GET /logbook/{entry_id} - Fetch one entry
#[utoipa::path(
    get,
    path = "/logbook/{entry_id}",
    params(("entry_id" = Uuid, Path, description = "The entry to fetch")),
    responses(
        (status = 200, description = "The entry", body = EntryResponse),
        (status = 401, description = "Unauthenticated"),
        (status = 404, description = "Entry not found")
    )
)]
pub async fn get_entry_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentUser>,
    Path(entry_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let entry = logbook::entry(state.logbook.as_ref(), &caller.0, entry_id)
        .await
        .map_err(logbook_error)?;
    Ok(Json(EntryResponse::from(entry)))
}

/// PUT /logbook/{entry_id} - Replace an entry's clinical content
#[utoipa::path(
    put,
    path = "/logbook/{entry_id}",
    params(("entry_id" = Uuid, Path, description = "The entry to update")),
    request_body = EntryPayload,
    responses(
        (status = 200, description = "Updated entry", body = EntryResponse),
        (status = 401, description = "Unauthenticated"),
        (status = 403, description = "Not the entry owner"),
        (status = 404, description = "Entry not found"),
        (status = 409, description = "Entry locked")
    )
)]
pub async fn update_entry_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentUser>,
    Path(entry_id): Path<Uuid>,
    Json(payload): Json<EntryPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let entry =
        logbook::update_entry(state.logbook.as_ref(), &caller.0, entry_id, payload.into_content())
            .await
            .map_err(logbook_error)?;
    Ok(Json(EntryResponse::from(entry)))
}

/// POST /logbook/{entry_id}/sign - Counter-sign an entry
#[utoipa::path(
    post,
    path = "/logbook/{entry_id}/sign",
    params(("entry_id" = Uuid, Path, description = "The entry to sign")),
    request_body = SignRequest,
    responses(
        (status = 200, description = "Signature recorded", body = OkResponse),
        (status = 400, description = "Invalid role"),
        (status = 401, description = "Unauthenticated"),
        (status = 404, description = "Entry not found"),
        (status = 409, description = "Entry locked")
    )
)]
pub async fn sign_entry_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentUser>,
    Path(entry_id): Path<Uuid>,
    Json(req): Json<SignRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let role = req
        .role
        .parse::<Role>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let attrs = SignatureAttrs { signer_name: req.signer_name, image_url: req.sig_url };
    sign_entry(state.logbook.as_ref(), &caller.0, entry_id, role, attrs)
        .await
        .map_err(logbook_error)?;
    Ok(Json(OkResponse { ok: true }))
}

/// GET /logbook/{entry_id}/verify - Recompute the stored signature digests
#[utoipa::path(
    get,
    path = "/logbook/{entry_id}/verify",
    params(("entry_id" = Uuid, Path, description = "The entry to verify")),
    responses(
        (status = 200, description = "Digest report, one check per stored signature"),
        (status = 401, description = "Unauthenticated"),
        (status = 404, description = "Entry not found")
    )
)]
pub async fn verify_entry_handler(
    State(state): State<Arc<AppState>>,
    Path(entry_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let report = verify_entry(state.logbook.as_ref(), entry_id)
        .await
        .map_err(logbook_error)?;
    Ok(Json(report))
}

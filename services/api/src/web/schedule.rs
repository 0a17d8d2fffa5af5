//! services/api/src/web/schedule.rs
//!
//! Axum handlers for supervision slots and bookings.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use echolog_core::booking::book_slot;
use echolog_core::domain::{Booking, DayKey, Slot};
use echolog_core::slots::{self, Availability, NewSlot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::CurrentUser;
use crate::web::rest::{booking_error, schedule_error, OkResponse};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlotRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: String,
    #[serde(default)]
    pub daily_cap_for_trainee: Option<u32>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlotResponse {
    pub supervisor_id: String,
    pub id: Uuid,
    /// Canonical locator accepted by the booking endpoint.
    pub path: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: String,
    pub status: String,
    pub trainee_id: Option<String>,
    pub booking_id: Option<Uuid>,
    pub daily_cap_for_trainee: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Slot> for SlotResponse {
    fn from(slot: Slot) -> Self {
        let path = slot.key().path();
        Self {
            supervisor_id: slot.supervisor_id,
            id: slot.id,
            path,
            start: slot.start,
            end: slot.end,
            location: slot.location,
            status: slot.status.as_str().to_string(),
            trainee_id: slot.trainee_id,
            booking_id: slot.booking_id,
            daily_cap_for_trainee: slot.daily_cap_for_trainee,
            created_at: slot.created_at,
            updated_at: slot.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookSlotRequest {
    /// `schedules/{supervisor}/slots/{slot_id}`
    pub slot_path: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub id: Uuid,
    pub slot_path: String,
    pub supervisor_id: String,
    pub trainee_id: String,
    pub status: String,
    pub slot_date_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            slot_path: booking.slot.path(),
            supervisor_id: booking.slot.supervisor_id.clone(),
            trainee_id: booking.trainee_id,
            status: booking.status.as_str().to_string(),
            slot_date_key: booking.slot_date_key.to_string(),
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}

#[derive(Deserialize)]
pub struct SlotWindowQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct BookingsQuery {
    pub day: Option<String>,
}

//=========================================================================================
// Slot Handlers
//=========================================================================================

/// POST /slots - Publish a bookable slot owned by the caller
#[utoipa::path(
    post,
    path = "/slots",
    request_body = CreateSlotRequest,
    responses(
        (status = 201, description = "Slot created", body = SlotResponse),
        (status = 400, description = "End not after start"),
        (status = 401, description = "Unauthenticated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_slot_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentUser>,
    Json(req): Json<CreateSlotRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let slot = slots::create_slot(
        state.schedule.as_ref(),
        &caller.0,
        NewSlot {
            start: req.start,
            end: req.end,
            location: req.location,
            daily_cap_for_trainee: req.daily_cap_for_trainee,
        },
    )
    .await
    .map_err(schedule_error)?;
    Ok((StatusCode::CREATED, Json(SlotResponse::from(slot))))
}

/// GET /slots - List available slots starting inside [from, to)
#[utoipa::path(
    get,
    path = "/slots",
    params(
        ("from" = String, Query, description = "Window start (RFC 3339)"),
        ("to" = String, Query, description = "Window end (RFC 3339), exclusive")
    ),
    responses(
        (status = 200, description = "Available slots ordered by start", body = [SlotResponse]),
        (status = 400, description = "Invalid window"),
        (status = 401, description = "Unauthenticated")
    )
)]
pub async fn list_available_slots_handler(
    State(state): State<Arc<AppState>>,
    Query(window): Query<SlotWindowQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let found = slots::available_slots(state.schedule.as_ref(), window.from, window.to)
        .await
        .map_err(schedule_error)?;
    let body: Vec<SlotResponse> = found.into_iter().map(SlotResponse::from).collect();
    Ok(Json(body))
}

/// POST /slots/{slot_id}/block - Withdraw one of the caller's slots
#[utoipa::path(
    post,
    path = "/slots/{slot_id}/block",
    params(("slot_id" = Uuid, Path, description = "The slot to block")),
    responses(
        (status = 200, description = "Slot blocked", body = OkResponse),
        (status = 401, description = "Unauthenticated"),
        (status = 404, description = "Not one of the caller's slots"),
        (status = 409, description = "Slot is already booked")
    )
)]
pub async fn block_slot_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentUser>,
    Path(slot_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    slots::set_availability(state.schedule.as_ref(), &caller.0, slot_id, Availability::Blocked)
        .await
        .map_err(schedule_error)?;
    Ok(Json(OkResponse { ok: true }))
}

/// POST /slots/{slot_id}/unblock - Reopen one of the caller's slots
#[utoipa::path(
    post,
    path = "/slots/{slot_id}/unblock",
    params(("slot_id" = Uuid, Path, description = "The slot to reopen")),
    responses(
        (status = 200, description = "Slot reopened", body = OkResponse),
        (status = 401, description = "Unauthenticated"),
        (status = 404, description = "Not one of the caller's slots"),
        (status = 409, description = "Slot is already booked")
    )
)]
pub async fn unblock_slot_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentUser>,
    Path(slot_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    slots::set_availability(state.schedule.as_ref(), &caller.0, slot_id, Availability::Open)
        .await
        .map_err(schedule_error)?;
    Ok(Json(OkResponse { ok: true }))
}

//=========================================================================================
// Booking Handlers
//=========================================================================================

/// POST /bookings - Book a slot for the caller
#[utoipa::path(
    post,
    path = "/bookings",
    request_body = BookSlotRequest,
    responses(
        (status = 201, description = "Slot booked", body = OkResponse),
        (status = 400, description = "Invalid slot path"),
        (status = 401, description = "Unauthenticated"),
        (status = 404, description = "Slot not found"),
        (status = 409, description = "Slot not available, or daily booking limit reached"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn book_slot_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentUser>,
    Json(req): Json<BookSlotRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    book_slot(state.schedule.as_ref(), &state.policy, &caller.0, &req.slot_path)
        .await
        .map_err(booking_error)?;
    info!("Booked {} for {}", req.slot_path, caller.0);
    Ok((StatusCode::CREATED, Json(OkResponse { ok: true })))
}

/// GET /bookings - The caller's bookings, optionally narrowed to one day
#[utoipa::path(
    get,
    path = "/bookings",
    params(
        ("day" = Option<String>, Query, description = "Day bucket filter (YYYY-MM-DD)")
    ),
    responses(
        (status = 200, description = "The caller's bookings, newest first", body = [BookingResponse]),
        (status = 400, description = "Invalid day"),
        (status = 401, description = "Unauthenticated")
    )
)]
pub async fn list_bookings_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentUser>,
    Query(query): Query<BookingsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let day = query
        .day
        .as_deref()
        .map(str::parse::<DayKey>)
        .transpose()
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid day".to_string()))?;
    let found = slots::bookings_for_trainee(state.schedule.as_ref(), &caller.0, day.as_ref())
        .await
        .map_err(schedule_error)?;
    let body: Vec<BookingResponse> = found.into_iter().map(BookingResponse::from).collect();
    Ok(Json(body))
}

//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification, the shared `ok`
//! response body, and the mapping from engine errors to HTTP responses.
//!
//! The engines' display strings are the wire-level error messages; only
//! store faults are replaced with a generic body after logging.

use axum::http::StatusCode;
use echolog_core::booking::BookingError;
use echolog_core::logbook::LogbookError;
use echolog_core::slots::ScheduleError;
use serde::Serialize;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

use crate::web::auth::{AuthResponse, LoginRequest, SignupRequest};
use crate::web::logbook::{EntryPayload, EntryResponse, SignRequest};
use crate::web::schedule::{BookSlotRequest, BookingResponse, CreateSlotRequest, SlotResponse};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        crate::web::schedule::create_slot_handler,
        crate::web::schedule::list_available_slots_handler,
        crate::web::schedule::block_slot_handler,
        crate::web::schedule::unblock_slot_handler,
        crate::web::schedule::book_slot_handler,
        crate::web::schedule::list_bookings_handler,
        crate::web::logbook::create_entry_handler,
        crate::web::logbook::list_entries_handler,
        crate::web::logbook::get_entry_handler,
        crate::web::logbook::update_entry_handler,
        crate::web::logbook::sign_entry_handler,
        crate::web::logbook::verify_entry_handler,
    ),
    components(
        schemas(
            SignupRequest,
            LoginRequest,
            AuthResponse,
            CreateSlotRequest,
            SlotResponse,
            BookSlotRequest,
            BookingResponse,
            EntryPayload,
            EntryResponse,
            SignRequest,
            OkResponse,
        )
    ),
    tags(
        (name = "Echolog API", description = "API endpoints for echo training records and supervision booking.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Shared Response Types
//=========================================================================================

/// Minimal acknowledgement body for operations whose result is a state
/// change rather than a resource.
#[derive(Serialize, ToSchema)]
pub struct OkResponse {
    pub ok: bool,
}

//=========================================================================================
// Engine Error → HTTP Mapping
//=========================================================================================

pub(crate) fn booking_error(err: BookingError) -> (StatusCode, String) {
    match &err {
        BookingError::Unauthenticated => (StatusCode::UNAUTHORIZED, err.to_string()),
        BookingError::InvalidSlotPath => (StatusCode::BAD_REQUEST, err.to_string()),
        BookingError::SlotNotFound => (StatusCode::NOT_FOUND, err.to_string()),
        BookingError::SlotUnavailable | BookingError::DailyCapExceeded(_) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        BookingError::Store(e) => {
            error!("Booking failed: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
        }
    }
}

pub(crate) fn schedule_error(err: ScheduleError) -> (StatusCode, String) {
    match &err {
        ScheduleError::Unauthenticated => (StatusCode::UNAUTHORIZED, err.to_string()),
        ScheduleError::InvalidWindow => (StatusCode::BAD_REQUEST, err.to_string()),
        ScheduleError::SlotNotFound => (StatusCode::NOT_FOUND, err.to_string()),
        ScheduleError::SlotBooked => (StatusCode::CONFLICT, err.to_string()),
        ScheduleError::Store(e) => {
            error!("Schedule operation failed: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
        }
    }
}

pub(crate) fn logbook_error(err: LogbookError) -> (StatusCode, String) {
    match &err {
        LogbookError::Unauthenticated => (StatusCode::UNAUTHORIZED, err.to_string()),
        LogbookError::EntryNotFound => (StatusCode::NOT_FOUND, err.to_string()),
        LogbookError::EntryLocked => (StatusCode::CONFLICT, err.to_string()),
        LogbookError::NotOwner => (StatusCode::FORBIDDEN, err.to_string()),
        LogbookError::Canonicalize(e) => {
            error!("Failed to canonicalize entry: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
        }
        LogbookError::Store(e) => {
            error!("Logbook operation failed: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
        }
    }
}

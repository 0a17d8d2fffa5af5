//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use echolog_core::booking::SchedulePolicy;
use echolog_core::ports::{IdentityStore, LogbookStore, ScheduleStore};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// The three store handles usually point at the same `DbAdapter`; keeping
/// them as separate trait objects lets tests swap any one of them out.
#[derive(Clone)]
pub struct AppState {
    pub schedule: Arc<dyn ScheduleStore>,
    pub logbook: Arc<dyn LogbookStore>,
    pub identity: Arc<dyn IdentityStore>,
    pub policy: SchedulePolicy,
    pub config: Arc<Config>,
}

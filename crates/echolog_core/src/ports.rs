//! crates/echolog_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases.
//!
//! Writes that must be atomic go through explicit transaction objects
//! (`ScheduleTx`, `LogbookTx`). Dropping a transaction without calling
//! `commit` aborts it with no partial writes; the engines rely on that for
//! their all-or-nothing guarantees.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    AuthSession, Booking, DayKey, LogbookEntry, Role, SignatureRecord, Slot, SlotKey, SlotStatus,
    User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors of the backing store. Lookups
/// return `Option`; absence is not an error at this level.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness or constraint conflict (e.g. duplicate user email).
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

//=========================================================================================
// Schedule (slots + bookings)
//=========================================================================================

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Opens a transaction covering slots, bookings and day buckets.
    async fn begin(&self) -> StoreResult<Box<dyn ScheduleTx>>;

    // --- Plain reads (no transaction) ---
    async fn slot(&self, key: &SlotKey) -> StoreResult<Option<Slot>>;

    /// Slots in `available` status whose start falls inside `[from, to)`,
    /// ordered by start.
    async fn available_slots(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Slot>>;

    /// A trainee's non-cancelled bookings, optionally narrowed to one day
    /// bucket, newest first.
    async fn bookings_for_trainee(
        &self,
        trainee_id: &str,
        day: Option<&DayKey>,
    ) -> StoreResult<Vec<Booking>>;

    // --- Writes that need no coordination ---
    async fn create_slot(&self, slot: &Slot) -> StoreResult<()>;
}

/// One schedule transaction. All reads through it see a consistent snapshot
/// and all writes land atomically on `commit`.
#[async_trait]
pub trait ScheduleTx: Send {
    /// Reads a slot and holds it exclusively until the transaction ends, so
    /// two concurrent bookings of the same slot serialize here.
    async fn slot_for_update(&mut self, key: &SlotKey) -> StoreResult<Option<Slot>>;

    /// Counts the trainee's bookings in `booked` status for one day bucket.
    ///
    /// Contract: implementations must serialize concurrent transactions that
    /// count the same trainee + day, so that two parallel bookings cannot
    /// both observe a pre-insert count (write skew on the daily cap).
    async fn booked_count_for_trainee_day(
        &mut self,
        trainee_id: &str,
        day: &DayKey,
    ) -> StoreResult<u32>;

    /// Flips the slot to `booked` and binds the trainee and booking id,
    /// touching nothing else but `updated_at`.
    async fn mark_slot_booked(
        &mut self,
        key: &SlotKey,
        trainee_id: &str,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Rewrites the slot's status (availability toggles).
    async fn set_slot_status(
        &mut self,
        key: &SlotKey,
        status: SlotStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

//=========================================================================================
// Logbook
//=========================================================================================

#[async_trait]
pub trait LogbookStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn LogbookTx>>;

    // --- Plain reads ---
    async fn entry(&self, id: Uuid) -> StoreResult<Option<LogbookEntry>>;

    /// All of one owner's entries, newest first.
    async fn entries_for_owner(&self, owner_id: &str) -> StoreResult<Vec<LogbookEntry>>;

    // --- Writes that need no coordination ---
    async fn insert_entry(&self, entry: &LogbookEntry) -> StoreResult<()>;
}

#[async_trait]
pub trait LogbookTx: Send {
    /// Reads an entry and holds it exclusively until the transaction ends.
    async fn entry_for_update(&mut self, id: Uuid) -> StoreResult<Option<LogbookEntry>>;

    /// Writes one signature record into the field selected by `role`, sets
    /// the lock flag when requested, and bumps `updated_at` - a single
    /// atomic write.
    async fn write_signature(
        &mut self,
        id: Uuid,
        role: Role,
        record: &SignatureRecord,
        lock: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Replaces the editable clinical content of an entry. Signature fields
    /// and the lock flag are not touched.
    async fn update_core(&mut self, entry: &LogbookEntry) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

//=========================================================================================
// Identity
//=========================================================================================

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Creates a user; a duplicate email surfaces as `StoreError::Conflict`.
    async fn create_user(
        &self,
        email: &str,
        name: &str,
        hashed_password: &str,
    ) -> StoreResult<User>;

    async fn credentials(&self, email: &str) -> StoreResult<Option<UserCredentials>>;

    async fn create_auth_session(&self, session: &AuthSession) -> StoreResult<()>;

    /// Resolves a session cookie to the owning user's email, returning
    /// `None` for unknown or expired sessions.
    async fn resolve_auth_session(&self, session_id: &str) -> StoreResult<Option<String>>;

    async fn delete_auth_session(&self, session_id: &str) -> StoreResult<()>;
}

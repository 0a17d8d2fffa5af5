//! crates/echolog_core/src/slots.rs
//!
//! Supervisor-side slot lifecycle: creating slots and toggling their
//! availability. Booking itself lives in `booking`; these operations never
//! touch a booked slot.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{DayKey, Slot, SlotKey, SlotStatus};
use crate::ports::{ScheduleStore, StoreError};

/// Attributes for a new slot; the caller becomes the owning supervisor.
#[derive(Debug, Clone)]
pub struct NewSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: String,
    pub daily_cap_for_trainee: Option<u32>,
}

/// Target state for an availability toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Open,
    Blocked,
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("Slot end must be after start")]
    InvalidWindow,
    #[error("Slot not found")]
    SlotNotFound,
    /// Booked slots are off limits to lifecycle toggles; freeing one up
    /// would orphan its booking.
    #[error("Slot is already booked")]
    SlotBooked,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Creates an `available` slot owned by the caller.
pub async fn create_slot(
    store: &dyn ScheduleStore,
    caller: &str,
    new: NewSlot,
) -> Result<Slot, ScheduleError> {
    if caller.is_empty() {
        return Err(ScheduleError::Unauthenticated);
    }
    if new.start >= new.end {
        return Err(ScheduleError::InvalidWindow);
    }

    let now = Utc::now();
    let slot = Slot {
        supervisor_id: caller.to_owned(),
        id: Uuid::new_v4(),
        start: new.start,
        end: new.end,
        location: new.location,
        status: SlotStatus::Available,
        trainee_id: None,
        booking_id: None,
        daily_cap_for_trainee: new.daily_cap_for_trainee,
        created_at: now,
        updated_at: now,
    };
    store.create_slot(&slot).await?;
    Ok(slot)
}

/// Toggles one of the caller's own slots between `available` and
/// `unavailable`. The ownership check is structural: the slot is looked up
/// under the caller's key, so someone else's slot is simply not found.
/// Booked slots reject the toggle; a slot already in the requested state is
/// a no-op.
pub async fn set_availability(
    store: &dyn ScheduleStore,
    caller: &str,
    slot_id: Uuid,
    to: Availability,
) -> Result<(), ScheduleError> {
    if caller.is_empty() {
        return Err(ScheduleError::Unauthenticated);
    }
    let key = SlotKey::new(caller, slot_id);

    let mut tx = store.begin().await?;
    let slot = tx
        .slot_for_update(&key)
        .await?
        .ok_or(ScheduleError::SlotNotFound)?;

    let target = match to {
        Availability::Open => SlotStatus::Available,
        Availability::Blocked => SlotStatus::Unavailable,
    };
    if slot.status == SlotStatus::Booked {
        return Err(ScheduleError::SlotBooked);
    }
    if slot.status != target {
        tx.set_slot_status(&key, target, Utc::now()).await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Available slots starting inside `[from, to)`, for the booking screen.
pub async fn available_slots(
    store: &dyn ScheduleStore,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Slot>, ScheduleError> {
    if from >= to {
        return Err(ScheduleError::InvalidWindow);
    }
    Ok(store.available_slots(from, to).await?)
}

/// The caller's own bookings, optionally narrowed to one day bucket.
pub async fn bookings_for_trainee(
    store: &dyn ScheduleStore,
    caller: &str,
    day: Option<&DayKey>,
) -> Result<Vec<crate::domain::Booking>, ScheduleError> {
    if caller.is_empty() {
        return Err(ScheduleError::Unauthenticated);
    }
    Ok(store.bookings_for_trainee(caller, day).await?)
}

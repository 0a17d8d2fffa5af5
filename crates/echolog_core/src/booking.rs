//! crates/echolog_core/src/booking.rs
//!
//! The booking engine: transactional reservation of a supervision slot
//! with per-slot double-booking protection and a per-trainee daily cap.

use chrono::Utc;
use chrono_tz::Tz;
use uuid::Uuid;

use crate::domain::{Booking, BookingStatus, DayKey, SlotKey, SlotStatus};
use crate::ports::{ScheduleStore, StoreError};

/// Scheduling policy shared by every booking decision.
///
/// `day_key_tz` is the governing timezone for day bucketing: the daily cap
/// counts bookings per calendar date in this zone, not per UTC date.
#[derive(Debug, Clone, Copy)]
pub struct SchedulePolicy {
    pub day_key_tz: Tz,
}

impl SchedulePolicy {
    pub fn new(day_key_tz: Tz) -> Self {
        Self { day_key_tz }
    }
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self { day_key_tz: chrono_tz::Europe::London }
    }
}

/// Everything that can go wrong while booking. The display strings are the
/// user-visible failure messages and must stay stable.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("Invalid slot path")]
    InvalidSlotPath,
    #[error("Slot not found")]
    SlotNotFound,
    #[error("Slot not available")]
    SlotUnavailable,
    /// The trainee already holds as many same-day bookings as the slot's
    /// cap allows. Carries the cap so the message can show it.
    #[error("Daily booking limit reached ({0}).")]
    DailyCapExceeded(u32),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Books the slot at `slot_path` for `caller`.
///
/// The whole check-and-reserve sequence runs inside one store transaction:
///
/// 1. the caller identity must be non-empty,
/// 2. the locator must parse as `schedules/{supervisor}/slots/{slot_id}`,
/// 3. the slot must exist and be in `available` status,
/// 4. the trainee's booked count for the slot's day bucket must be below
///    the slot's per-trainee daily cap,
/// 5. the slot is flipped to `booked` (trainee and fresh booking id bound,
///    scheduling metadata untouched) and the booking row is inserted with
///    the supervisor denormalized from the slot key.
///
/// Any failure aborts the transaction with zero writes; the engine never
/// retries on its own. Concurrent calls for the same slot serialize on the
/// slot row, so exactly one observes `available` and wins; the loser gets
/// `SlotUnavailable`. Concurrent same-trainee same-day calls serialize
/// through the store's day-bucket contract (`booked_count_for_trainee_day`),
/// which closes the write-skew window on the cap check.
pub async fn book_slot(
    store: &dyn ScheduleStore,
    policy: &SchedulePolicy,
    caller: &str,
    slot_path: &str,
) -> Result<Booking, BookingError> {
    if caller.is_empty() {
        return Err(BookingError::Unauthenticated);
    }
    let key: SlotKey = slot_path.parse().map_err(|_| BookingError::InvalidSlotPath)?;

    let mut tx = store.begin().await?;

    let slot = tx
        .slot_for_update(&key)
        .await?
        .ok_or(BookingError::SlotNotFound)?;
    if slot.status != SlotStatus::Available {
        return Err(BookingError::SlotUnavailable);
    }

    let cap = slot.trainee_daily_cap();
    let day = DayKey::from_instant(slot.start, policy.day_key_tz);
    let already_booked = tx.booked_count_for_trainee_day(caller, &day).await?;
    if already_booked >= cap {
        return Err(BookingError::DailyCapExceeded(cap));
    }

    let booking_id = Uuid::new_v4();
    let now = Utc::now();
    tx.mark_slot_booked(&key, caller, booking_id, now).await?;

    let booking = Booking {
        id: booking_id,
        slot: key,
        trainee_id: caller.to_owned(),
        status: BookingStatus::Booked,
        slot_date_key: day,
        created_at: now,
        updated_at: now,
    };
    tx.insert_booking(&booking).await?;
    tx.commit().await?;

    Ok(booking)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_the_wire_contract() {
        assert_eq!(BookingError::Unauthenticated.to_string(), "Unauthenticated");
        assert_eq!(BookingError::SlotNotFound.to_string(), "Slot not found");
        assert_eq!(BookingError::SlotUnavailable.to_string(), "Slot not available");
        assert_eq!(
            BookingError::DailyCapExceeded(2).to_string(),
            "Daily booking limit reached (2)."
        );
        assert_eq!(
            BookingError::DailyCapExceeded(5).to_string(),
            "Daily booking limit reached (5)."
        );
    }

    #[test]
    fn default_policy_governs_in_london_time() {
        assert_eq!(SchedulePolicy::default().day_key_tz, chrono_tz::Europe::London);
    }
}

//! services/api/src/adapters/schedule.rs
//!
//! Postgres implementation of the `ScheduleStore` and `ScheduleTx` ports.
//!
//! The transaction contract's two isolation requirements map to row locks:
//! `slot_for_update` takes `FOR UPDATE` on the slot row, and
//! `booked_count_for_trainee_day` serializes same-trainee same-day
//! transactions through a dedicated `booking_day_locks` row before
//! counting, which closes the write-skew window on the daily cap at plain
//! READ COMMITTED isolation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use echolog_core::domain::{Booking, DayKey, Slot, SlotKey, SlotStatus};
use echolog_core::ports::{ScheduleStore, ScheduleTx, StoreError, StoreResult};
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use super::db::DbAdapter;

//=========================================================================================
// Database Record Structs
//=========================================================================================

const SLOT_COLUMNS: &str = "supervisor_id, id, start_at, end_at, location, status, \
                            trainee_id, booking_id, daily_cap_for_trainee, created_at, updated_at";

#[derive(FromRow)]
struct SlotRecord {
    supervisor_id: String,
    id: Uuid,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    location: String,
    status: String,
    trainee_id: Option<String>,
    booking_id: Option<Uuid>,
    daily_cap_for_trainee: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl SlotRecord {
    fn to_domain(self) -> StoreResult<Slot> {
        let status = self.status.parse::<SlotStatus>().map_err(StoreError::Unexpected)?;
        Ok(Slot {
            supervisor_id: self.supervisor_id,
            id: self.id,
            start: self.start_at,
            end: self.end_at,
            location: self.location,
            status,
            trainee_id: self.trainee_id,
            booking_id: self.booking_id,
            // A negative cap in storage is treated like an absent one.
            daily_cap_for_trainee: self.daily_cap_for_trainee.and_then(|c| u32::try_from(c).ok()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const BOOKING_COLUMNS: &str =
    "id, supervisor_id, slot_id, trainee_id, status, slot_date_key, created_at, updated_at";

#[derive(FromRow)]
struct BookingRecord {
    id: Uuid,
    supervisor_id: String,
    slot_id: Uuid,
    trainee_id: String,
    status: String,
    slot_date_key: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl BookingRecord {
    fn to_domain(self) -> StoreResult<Booking> {
        let status = self.status.parse().map_err(StoreError::Unexpected)?;
        let slot_date_key = self
            .slot_date_key
            .parse::<DayKey>()
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(Booking {
            id: self.id,
            slot: SlotKey::new(self.supervisor_id, self.slot_id),
            trainee_id: self.trainee_id,
            status,
            slot_date_key,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

//=========================================================================================
// `ScheduleStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ScheduleStore for DbAdapter {
    async fn begin(&self) -> StoreResult<Box<dyn ScheduleTx>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(Box::new(PgScheduleTx { tx }))
    }

    async fn slot(&self, key: &SlotKey) -> StoreResult<Option<Slot>> {
        let record = sqlx::query_as::<_, SlotRecord>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots WHERE supervisor_id = $1 AND id = $2"
        ))
        .bind(&key.supervisor_id)
        .bind(key.slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        record.map(SlotRecord::to_domain).transpose()
    }

    async fn available_slots(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Slot>> {
        let records = sqlx::query_as::<_, SlotRecord>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots \
             WHERE status = 'available' AND start_at >= $1 AND start_at < $2 \
             ORDER BY start_at"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        records.into_iter().map(SlotRecord::to_domain).collect()
    }

    async fn bookings_for_trainee(
        &self,
        trainee_id: &str,
        day: Option<&DayKey>,
    ) -> StoreResult<Vec<Booking>> {
        let records = sqlx::query_as::<_, BookingRecord>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE trainee_id = $1 AND status <> 'cancelled' \
               AND ($2::TEXT IS NULL OR slot_date_key = $2) \
             ORDER BY created_at DESC"
        ))
        .bind(trainee_id)
        .bind(day.map(DayKey::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        records.into_iter().map(BookingRecord::to_domain).collect()
    }

    async fn create_slot(&self, slot: &Slot) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO slots (supervisor_id, id, start_at, end_at, location, status, \
                                trainee_id, booking_id, daily_cap_for_trainee, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&slot.supervisor_id)
        .bind(slot.id)
        .bind(slot.start)
        .bind(slot.end)
        .bind(&slot.location)
        .bind(slot.status.as_str())
        .bind(&slot.trainee_id)
        .bind(slot.booking_id)
        .bind(slot.daily_cap_for_trainee.map(|c| c as i32))
        .bind(slot.created_at)
        .bind(slot.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(())
    }
}

//=========================================================================================
// `ScheduleTx` Trait Implementation
//=========================================================================================

/// One open Postgres transaction over the schedule tables. Dropping it
/// without `commit` rolls everything back.
struct PgScheduleTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ScheduleTx for PgScheduleTx {
    async fn slot_for_update(&mut self, key: &SlotKey) -> StoreResult<Option<Slot>> {
        let record = sqlx::query_as::<_, SlotRecord>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots WHERE supervisor_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(&key.supervisor_id)
        .bind(key.slot_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        record.map(SlotRecord::to_domain).transpose()
    }

    async fn booked_count_for_trainee_day(
        &mut self,
        trainee_id: &str,
        day: &DayKey,
    ) -> StoreResult<u32> {
        // Serialize all same-trainee same-day transactions on a dedicated
        // lock row, so no two of them can both count before either
        // inserts. The insert-if-absent makes the row exist the first time
        // a trainee books on a given day.
        sqlx::query(
            "INSERT INTO booking_day_locks (trainee_id, day_key) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(trainee_id)
        .bind(day.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        sqlx::query("SELECT 1 FROM booking_day_locks WHERE trainee_id = $1 AND day_key = $2 FOR UPDATE")
            .bind(trainee_id)
            .bind(day.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM bookings \
             WHERE trainee_id = $1 AND status = 'booked' AND slot_date_key = $2",
        )
        .bind(trainee_id)
        .bind(day.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(count as u32)
    }

    async fn mark_slot_booked(
        &mut self,
        key: &SlotKey,
        trainee_id: &str,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE slots SET status = 'booked', trainee_id = $3, booking_id = $4, updated_at = $5 \
             WHERE supervisor_id = $1 AND id = $2",
        )
        .bind(&key.supervisor_id)
        .bind(key.slot_id)
        .bind(trainee_id)
        .bind(booking_id)
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn set_slot_status(
        &mut self,
        key: &SlotKey,
        status: SlotStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE slots SET status = $3, updated_at = $4 \
             WHERE supervisor_id = $1 AND id = $2",
        )
        .bind(&key.supervisor_id)
        .bind(key.slot_id)
        .bind(status.as_str())
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO bookings (id, supervisor_id, slot_id, trainee_id, status, \
                                   slot_date_key, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(booking.id)
        .bind(&booking.slot.supervisor_id)
        .bind(booking.slot.slot_id)
        .bind(&booking.trainee_id)
        .bind(booking.status.as_str())
        .bind(booking.slot_date_key.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
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

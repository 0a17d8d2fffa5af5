//! crates/echolog_core/tests/support/mod.rs
//!
//! An in-memory implementation of the store ports for exercising the
//! engines without a database. Transactions are globally serialized
//! through an async mutex and buffer their writes, which land atomically
//! on commit; a dropped transaction applies nothing. That satisfies the
//! port contracts (slot row exclusivity, trainee+day serialization,
//! all-or-nothing commits) with strictly coarser locking than the real
//! adapter.

// Each test binary uses its own subset of these helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use echolog_core::domain::{
    Booking, BookingStatus, DayKey, EntryContent, LogbookEntry, Role, SignatureRecord, Slot,
    SlotKey, SlotStatus,
};
use echolog_core::ports::{
    LogbookStore, LogbookTx, ScheduleStore, ScheduleTx, StoreError, StoreResult,
};

#[derive(Default, Clone)]
struct State {
    slots: HashMap<SlotKey, Slot>,
    bookings: Vec<Booking>,
    entries: HashMap<Uuid, LogbookEntry>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<StdMutex<State>>,
    tx_gate: Arc<AsyncMutex<()>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_slot(&self, slot: Slot) {
        self.state.lock().unwrap().slots.insert(slot.key(), slot);
    }

    pub fn seed_entry(&self, entry: LogbookEntry) {
        self.state.lock().unwrap().entries.insert(entry.id, entry);
    }

    pub fn slot_now(&self, key: &SlotKey) -> Option<Slot> {
        self.state.lock().unwrap().slots.get(key).cloned()
    }

    pub fn entry_now(&self, id: Uuid) -> Option<LogbookEntry> {
        self.state.lock().unwrap().entries.get(&id).cloned()
    }

    /// Stable snapshot of all slots and bookings, for before/after
    /// comparisons around operations that must not write.
    pub fn snapshot(&self) -> (Vec<Slot>, Vec<Booking>) {
        let st = self.state.lock().unwrap();
        let mut slots: Vec<Slot> = st.slots.values().cloned().collect();
        slots.sort_by_key(|s| s.id);
        let mut bookings = st.bookings.clone();
        bookings.sort_by_key(|b| b.id);
        (slots, bookings)
    }
}

//=========================================================================================
// Buffered writes
//=========================================================================================

enum WriteOp {
    MarkBooked { key: SlotKey, trainee_id: String, booking_id: Uuid, now: DateTime<Utc> },
    SetStatus { key: SlotKey, status: SlotStatus, now: DateTime<Utc> },
    InsertBooking(Booking),
    WriteSignature { id: Uuid, role: Role, record: SignatureRecord, lock: bool, now: DateTime<Utc> },
    UpdateCore(LogbookEntry),
}

pub fn content_of(entry: &LogbookEntry) -> EntryContent {
    EntryContent {
        date: entry.date,
        indication: entry.indication.clone(),
        views: entry.views.clone(),
        findings: entry.findings.clone(),
        summary: entry.summary.clone(),
        directly_observed: entry.directly_observed,
        image_quality: entry.image_quality,
        demographics: entry.demographics.clone(),
        notes: entry.notes.clone(),
        diagnosis: entry.diagnosis.clone(),
        comments: entry.comments.clone(),
    }
}

fn apply(state: &mut State, op: WriteOp) -> StoreResult<()> {
    match op {
        WriteOp::MarkBooked { key, trainee_id, booking_id, now } => {
            let slot = state
                .slots
                .get_mut(&key)
                .ok_or_else(|| StoreError::Unexpected(format!("no slot {key}")))?;
            slot.status = SlotStatus::Booked;
            slot.trainee_id = Some(trainee_id);
            slot.booking_id = Some(booking_id);
            slot.updated_at = now;
        }
        WriteOp::SetStatus { key, status, now } => {
            let slot = state
                .slots
                .get_mut(&key)
                .ok_or_else(|| StoreError::Unexpected(format!("no slot {key}")))?;
            slot.status = status;
            slot.updated_at = now;
        }
        WriteOp::InsertBooking(booking) => state.bookings.push(booking),
        WriteOp::WriteSignature { id, role, record, lock, now } => {
            let entry = state
                .entries
                .get_mut(&id)
                .ok_or_else(|| StoreError::Unexpected(format!("no entry {id}")))?;
            entry.set_signature(role, record);
            if lock {
                entry.locked = true;
            }
            entry.updated_at = now;
        }
        WriteOp::UpdateCore(updated) => {
            let entry = state
                .entries
                .get_mut(&updated.id)
                .ok_or_else(|| StoreError::Unexpected(format!("no entry {}", updated.id)))?;
            let at = updated.updated_at;
            entry.apply_content(content_of(&updated), at);
        }
    }
    Ok(())
}

struct MemTx {
    state: Arc<StdMutex<State>>,
    writes: Vec<WriteOp>,
    _gate: OwnedMutexGuard<()>,
}

impl MemTx {
    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> T {
        f(&self.state.lock().unwrap())
    }

    fn finish(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        let mut state = this.state.lock().unwrap();
        for op in this.writes {
            apply(&mut state, op)?;
        }
        Ok(())
    }
}

//=========================================================================================
// Port implementations
//=========================================================================================

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn ScheduleTx>> {
        let gate = self.tx_gate.clone().lock_owned().await;
        Ok(Box::new(MemTx { state: self.state.clone(), writes: Vec::new(), _gate: gate }))
    }

    async fn slot(&self, key: &SlotKey) -> StoreResult<Option<Slot>> {
        Ok(self.state.lock().unwrap().slots.get(key).cloned())
    }

    async fn available_slots(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<Slot>> {
        let st = self.state.lock().unwrap();
        let mut found: Vec<Slot> = st
            .slots
            .values()
            .filter(|s| s.status == SlotStatus::Available && s.start >= from && s.start < to)
            .cloned()
            .collect();
        found.sort_by_key(|s| s.start);
        Ok(found)
    }

    async fn bookings_for_trainee(
        &self,
        trainee_id: &str,
        day: Option<&DayKey>,
    ) -> StoreResult<Vec<Booking>> {
        let st = self.state.lock().unwrap();
        let mut found: Vec<Booking> = st
            .bookings
            .iter()
            .filter(|b| {
                b.trainee_id == trainee_id
                    && b.status != BookingStatus::Cancelled
                    && day.map_or(true, |d| &b.slot_date_key == d)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn create_slot(&self, slot: &Slot) -> StoreResult<()> {
        self.state.lock().unwrap().slots.insert(slot.key(), slot.clone());
        Ok(())
    }
}

#[async_trait]
impl ScheduleTx for MemTx {
    async fn slot_for_update(&mut self, key: &SlotKey) -> StoreResult<Option<Slot>> {
        Ok(self.read(|st| st.slots.get(key).cloned()))
    }

    async fn booked_count_for_trainee_day(
        &mut self,
        trainee_id: &str,
        day: &DayKey,
    ) -> StoreResult<u32> {
        Ok(self.read(|st| {
            st.bookings
                .iter()
                .filter(|b| {
                    b.trainee_id == trainee_id
                        && b.status == BookingStatus::Booked
                        && &b.slot_date_key == day
                })
                .count() as u32
        }))
    }

    async fn mark_slot_booked(
        &mut self,
        key: &SlotKey,
        trainee_id: &str,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.writes.push(WriteOp::MarkBooked {
            key: key.clone(),
            trainee_id: trainee_id.to_owned(),
            booking_id,
            now,
        });
        Ok(())
    }

    async fn set_slot_status(
        &mut self,
        key: &SlotKey,
        status: SlotStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.writes.push(WriteOp::SetStatus { key: key.clone(), status, now });
        Ok(())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        self.writes.push(WriteOp::InsertBooking(booking.clone()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.finish()
    }
}

#[async_trait]
impl LogbookStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn LogbookTx>> {
        let gate = self.tx_gate.clone().lock_owned().await;
        Ok(Box::new(MemTx { state: self.state.clone(), writes: Vec::new(), _gate: gate }))
    }

    async fn entry(&self, id: Uuid) -> StoreResult<Option<LogbookEntry>> {
        Ok(self.state.lock().unwrap().entries.get(&id).cloned())
    }

    async fn entries_for_owner(&self, owner_id: &str) -> StoreResult<Vec<LogbookEntry>> {
        let st = self.state.lock().unwrap();
        let mut found: Vec<LogbookEntry> = st
            .entries
            .values()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn insert_entry(&self, entry: &LogbookEntry) -> StoreResult<()> {
        self.state.lock().unwrap().entries.insert(entry.id, entry.clone());
        Ok(())
    }
}

#[async_trait]
impl LogbookTx for MemTx {
    async fn entry_for_update(&mut self, id: Uuid) -> StoreResult<Option<LogbookEntry>> {
        Ok(self.read(|st| st.entries.get(&id).cloned()))
    }

    async fn write_signature(
        &mut self,
        id: Uuid,
        role: Role,
        record: &SignatureRecord,
        lock: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.writes.push(WriteOp::WriteSignature { id, role, record: record.clone(), lock, now });
        Ok(())
    }

    async fn update_core(&mut self, entry: &LogbookEntry) -> StoreResult<()> {
        self.writes.push(WriteOp::UpdateCore(entry.clone()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.finish()
    }
}

//=========================================================================================
// Fixtures
//=========================================================================================

pub fn slot_at(
    supervisor: &str,
    start: DateTime<Utc>,
    cap: Option<u32>,
) -> Slot {
    let now = Utc::now();
    Slot {
        supervisor_id: supervisor.to_owned(),
        id: Uuid::new_v4(),
        start,
        end: start + chrono::Duration::minutes(30),
        location: "UCLH".to_owned(),
        status: SlotStatus::Available,
        trainee_id: None,
        booking_id: None,
        daily_cap_for_trainee: cap,
        created_at: now,
        updated_at: now,
    }
}

pub fn draft_entry(owner: &str) -> LogbookEntry {
    use echolog_core::domain::{Demographics, Findings, ImageQuality, View, YesNoUa};
    let content = EntryContent {
        date: Utc::now(),
        indication: Some("hypotension".to_owned()),
        views: vec![View::Plax, View::Psax, View::Ivc],
        findings: Findings {
            rv_dilated: Some(YesNoUa::No),
            low_preload: Some(YesNoUa::Yes),
            ..Findings::default()
        },
        summary: Some("underfilled, hyperdynamic".to_owned()),
        directly_observed: Some(false),
        image_quality: Some(ImageQuality::Good),
        demographics: Demographics { age: Some(47), gender: None, bmi: None },
        notes: None,
        diagnosis: "hypovolaemia".to_owned(),
        comments: None,
    };
    LogbookEntry::new(Uuid::new_v4(), owner, content, Utc::now())
}

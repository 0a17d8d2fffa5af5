//! crates/echolog_core/src/logbook.rs
//!
//! Logbook entry CRUD. Entries belong to the trainee who created them;
//! once a supervisor signature locks an entry, every edit path here
//! rejects it for good. Signing and verification live in `signing`.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{EntryContent, LogbookEntry};
use crate::ports::{LogbookStore, StoreError};

/// Failures shared by the logbook CRUD and signing operations. Display
/// strings are the user-visible messages and must stay stable.
#[derive(Debug, thiserror::Error)]
pub enum LogbookError {
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("Entry not found")]
    EntryNotFound,
    /// The terminal state: a supervisor has signed.
    #[error("Entry locked")]
    EntryLocked,
    #[error("Not the entry owner")]
    NotOwner,
    #[error("Failed to canonicalize entry for signing")]
    Canonicalize(#[source] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Creates a fresh draft entry owned by the caller.
pub async fn create_entry(
    store: &dyn LogbookStore,
    caller: &str,
    content: EntryContent,
) -> Result<LogbookEntry, LogbookError> {
    if caller.is_empty() {
        return Err(LogbookError::Unauthenticated);
    }
    let entry = LogbookEntry::new(Uuid::new_v4(), caller, content, Utc::now());
    store.insert_entry(&entry).await?;
    Ok(entry)
}

/// Replaces an entry's clinical content.
///
/// Runs inside a transaction so a concurrent supervisor signature cannot
/// slip in between the lock check and the write. Locked entries reject the
/// edit outright; only the owner may edit. Editing a mentor-signed but
/// unlocked entry is allowed, which leaves the mentor's digest stale until
/// re-signed (visible through `signing::verify_entry`).
pub async fn update_entry(
    store: &dyn LogbookStore,
    caller: &str,
    entry_id: Uuid,
    content: EntryContent,
) -> Result<LogbookEntry, LogbookError> {
    if caller.is_empty() {
        return Err(LogbookError::Unauthenticated);
    }

    let mut tx = store.begin().await?;
    let mut entry = tx
        .entry_for_update(entry_id)
        .await?
        .ok_or(LogbookError::EntryNotFound)?;
    if entry.locked {
        return Err(LogbookError::EntryLocked);
    }
    if entry.owner_id != caller {
        return Err(LogbookError::NotOwner);
    }

    entry.apply_content(content, Utc::now());
    tx.update_core(&entry).await?;
    tx.commit().await?;
    Ok(entry)
}

/// Fetches one entry. Any authenticated caller may read; mentors and
/// supervisors have to see an entry to counter-sign it.
pub async fn entry(
    store: &dyn LogbookStore,
    caller: &str,
    entry_id: Uuid,
) -> Result<LogbookEntry, LogbookError> {
    if caller.is_empty() {
        return Err(LogbookError::Unauthenticated);
    }
    store
        .entry(entry_id)
        .await?
        .ok_or(LogbookError::EntryNotFound)
}

/// The caller's own entries, newest first.
pub async fn entries_for_owner(
    store: &dyn LogbookStore,
    caller: &str,
) -> Result<Vec<LogbookEntry>, LogbookError> {
    if caller.is_empty() {
        return Err(LogbookError::Unauthenticated);
    }
    Ok(store.entries_for_owner(caller).await?)
}

//! crates/echolog_core/tests/signing_flow.rs
//!
//! The signing and locking state machine end to end: draft, mentor
//! signature, supervisor lock, terminality, and digest verification with
//! deliberate tampering.

mod support;

use uuid::Uuid;

use echolog_core::domain::Role;
use echolog_core::logbook::{self, LogbookError};
use echolog_core::signing::{sign_entry, verify_entry, SignatureAttrs};
use support::{content_of, draft_entry, MemoryStore};

const OWNER: &str = "trainee@nhs.net";
const MENTOR: &str = "mentor@uclh.nhs.uk";
const SUPERVISOR: &str = "supervisor@uclh.nhs.uk";

fn attrs(name: &str) -> SignatureAttrs {
    SignatureAttrs {
        signer_name: Some(name.to_owned()),
        image_url: Some(format!("https://sig.example/{name}.png")),
    }
}

#[tokio::test]
async fn mentor_signature_records_a_digest_without_locking() {
    let store = MemoryStore::new();
    let entry = draft_entry(OWNER);
    let id = entry.id;
    store.seed_entry(entry);

    let record = sign_entry(&store, MENTOR, id, Role::Mentor, attrs("Dr M"))
        .await
        .unwrap();
    assert_eq!(record.signed_by, MENTOR);
    assert_eq!(record.display_name, "Dr M");
    assert_eq!(record.digest.len(), 64);

    let stored = store.entry_now(id).unwrap();
    assert!(!stored.locked);
    assert_eq!(stored.mentor_signature.as_ref(), Some(&record));
    assert!(stored.supervisor_signature.is_none());

    let report = verify_entry(&store, id).await.unwrap();
    assert!(report.mentor.unwrap().valid);
    assert!(report.supervisor.is_none());
    assert!(!report.locked);
}

#[tokio::test]
async fn supervisor_may_sign_a_draft_directly_and_locks_it() {
    let store = MemoryStore::new();
    let entry = draft_entry(OWNER);
    let id = entry.id;
    store.seed_entry(entry);

    sign_entry(&store, SUPERVISOR, id, Role::Supervisor, attrs("Dr V"))
        .await
        .unwrap();

    let stored = store.entry_now(id).unwrap();
    assert!(stored.locked);
    assert!(stored.mentor_signature.is_none());
    assert!(stored.supervisor_signature.is_some());

    let report = verify_entry(&store, id).await.unwrap();
    assert!(report.locked);
    assert!(report.supervisor.unwrap().valid);
}

#[tokio::test]
async fn locked_entries_reject_all_further_signing() {
    let store = MemoryStore::new();
    let entry = draft_entry(OWNER);
    let id = entry.id;
    store.seed_entry(entry);

    sign_entry(&store, SUPERVISOR, id, Role::Supervisor, SignatureAttrs::default())
        .await
        .unwrap();
    let frozen = store.entry_now(id).unwrap();

    let mentor_err = sign_entry(&store, MENTOR, id, Role::Mentor, SignatureAttrs::default())
        .await
        .unwrap_err();
    assert!(matches!(mentor_err, LogbookError::EntryLocked));

    // Even the supervisor cannot re-sign once the lock is set.
    let resign_err = sign_entry(&store, SUPERVISOR, id, Role::Supervisor, SignatureAttrs::default())
        .await
        .unwrap_err();
    assert!(matches!(resign_err, LogbookError::EntryLocked));

    assert_eq!(store.entry_now(id).unwrap(), frozen, "rejections must not write");
}

#[tokio::test]
async fn locked_entries_reject_core_edits() {
    let store = MemoryStore::new();
    let entry = draft_entry(OWNER);
    let id = entry.id;
    store.seed_entry(entry);
    sign_entry(&store, SUPERVISOR, id, Role::Supervisor, SignatureAttrs::default())
        .await
        .unwrap();

    let mut content = content_of(&store.entry_now(id).unwrap());
    content.diagnosis = "revised".to_owned();
    let err = logbook::update_entry(&store, OWNER, id, content)
        .await
        .unwrap_err();
    assert!(matches!(err, LogbookError::EntryLocked));
    assert_eq!(err.to_string(), "Entry locked");
    assert_eq!(store.entry_now(id).unwrap().diagnosis, "hypovolaemia");
}

#[tokio::test]
async fn editing_after_mentor_signature_stales_the_digest() {
    let store = MemoryStore::new();
    let entry = draft_entry(OWNER);
    let id = entry.id;
    store.seed_entry(entry);

    sign_entry(&store, MENTOR, id, Role::Mentor, attrs("Dr M"))
        .await
        .unwrap();
    assert!(verify_entry(&store, id).await.unwrap().mentor.unwrap().valid);

    // Mentor-signed but unlocked entries stay editable.
    let mut content = content_of(&store.entry_now(id).unwrap());
    content.summary = Some("revised after discussion".to_owned());
    logbook::update_entry(&store, OWNER, id, content).await.unwrap();

    let stale = verify_entry(&store, id).await.unwrap().mentor.unwrap();
    assert!(!stale.valid, "edited core must no longer match the mentor digest");

    // Re-signing repairs it: the new digest covers the edited core.
    sign_entry(&store, MENTOR, id, Role::Mentor, attrs("Dr M"))
        .await
        .unwrap();
    assert!(verify_entry(&store, id).await.unwrap().mentor.unwrap().valid);
}

#[tokio::test]
async fn mentor_resigning_replaces_the_previous_record() {
    let store = MemoryStore::new();
    let entry = draft_entry(OWNER);
    let id = entry.id;
    store.seed_entry(entry);

    sign_entry(&store, MENTOR, id, Role::Mentor, attrs("Dr M"))
        .await
        .unwrap();
    sign_entry(&store, "locum@uclh.nhs.uk", id, Role::Mentor, attrs("Dr L"))
        .await
        .unwrap();

    let stored = store.entry_now(id).unwrap();
    let sig = stored.mentor_signature.unwrap();
    assert_eq!(sig.signed_by, "locum@uclh.nhs.uk");
    assert_eq!(sig.display_name, "Dr L");
    assert!(verify_entry(&store, id).await.unwrap().mentor.unwrap().valid);
}

#[tokio::test]
async fn omitted_attrs_store_empty_name_and_no_image() {
    let store = MemoryStore::new();
    let entry = draft_entry(OWNER);
    let id = entry.id;
    store.seed_entry(entry);

    let record = sign_entry(&store, MENTOR, id, Role::Mentor, SignatureAttrs::default())
        .await
        .unwrap();
    assert_eq!(record.display_name, "");
    assert!(record.image_url.is_none());
}

#[tokio::test]
async fn signing_validation_failures() {
    let store = MemoryStore::new();

    let err = sign_entry(&store, "", Uuid::new_v4(), Role::Mentor, SignatureAttrs::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Unauthenticated");

    let err = sign_entry(&store, MENTOR, Uuid::new_v4(), Role::Mentor, SignatureAttrs::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Entry not found");

    let err = verify_entry(&store, Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, LogbookError::EntryNotFound));
}

#[tokio::test]
async fn concurrent_mentor_and_supervisor_signing_is_safe() {
    let store = MemoryStore::new();
    let entry = draft_entry(OWNER);
    let id = entry.id;
    store.seed_entry(entry);

    let mentor_store = store.clone();
    let mentor = tokio::spawn(async move {
        sign_entry(&mentor_store, MENTOR, id, Role::Mentor, SignatureAttrs::default()).await
    });
    let supervisor_store = store.clone();
    let supervisor = tokio::spawn(async move {
        sign_entry(&supervisor_store, SUPERVISOR, id, Role::Supervisor, SignatureAttrs::default())
            .await
    });

    let mentor_result = mentor.await.unwrap();
    supervisor.await.unwrap().unwrap();

    // Whichever order the two landed in, the supervisor signature and the
    // lock are present; the mentor either got in before the lock or was
    // rejected by it.
    let stored = store.entry_now(id).unwrap();
    assert!(stored.locked);
    assert!(stored.supervisor_signature.is_some());
    match mentor_result {
        Ok(_) => assert!(stored.mentor_signature.is_some()),
        Err(LogbookError::EntryLocked) => assert!(stored.mentor_signature.is_none()),
        Err(other) => panic!("unexpected failure: {other}"),
    }
}

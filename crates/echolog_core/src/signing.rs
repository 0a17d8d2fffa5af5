//! crates/echolog_core/src/signing.rs
//!
//! Counter-signing and locking of logbook entries, plus after-the-fact
//! digest verification. The digest is tamper evidence, not tamper
//! prevention: it proves what the clinical content looked like when the
//! signer signed, and `verify_entry` recomputes it to spot later edits.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::{
    Demographics, Findings, ImageQuality, LogbookEntry, Role, SignatureRecord, View,
};
use crate::logbook::LogbookError;
use crate::ports::LogbookStore;

/// The canonical signable core of an entry: exactly the clinical fields, in
/// a fixed order, with the date collapsed to epoch milliseconds. Existing
/// signatures and the lock flag are deliberately absent, so a signature
/// never signs over a prior signature.
///
/// Field order is load-bearing: serialization follows declaration order,
/// and reordering fields would silently invalidate every stored digest.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignableCore<'a> {
    owner_id: &'a str,
    date: i64,
    indication: &'a Option<String>,
    views: &'a [View],
    findings: &'a Findings,
    summary: &'a Option<String>,
    directly_observed: &'a Option<bool>,
    image_quality: &'a Option<ImageQuality>,
    demographics: &'a Demographics,
    notes: &'a Option<String>,
    diagnosis: &'a str,
    comments: &'a Option<String>,
}

impl<'a> SignableCore<'a> {
    fn of(entry: &'a LogbookEntry) -> Self {
        Self {
            owner_id: &entry.owner_id,
            date: entry.date.timestamp_millis(),
            indication: &entry.indication,
            views: &entry.views,
            findings: &entry.findings,
            summary: &entry.summary,
            directly_observed: &entry.directly_observed,
            image_quality: &entry.image_quality,
            demographics: &entry.demographics,
            notes: &entry.notes,
            diagnosis: &entry.diagnosis,
            comments: &entry.comments,
        }
    }
}

/// Computes the integrity digest an entry's signature must carry: SHA-256
/// over the serialized signable core joined with the signer identity and
/// role, rendered as lowercase hex. Pure; identical inputs always produce
/// the identical digest.
pub fn entry_digest(
    entry: &LogbookEntry,
    signer: &str,
    role: Role,
) -> Result<String, serde_json::Error> {
    let core = serde_json::to_string(&SignableCore::of(entry))?;
    let payload = format!("{core}|{signer}|{role}");
    Ok(hex::encode(Sha256::digest(payload.as_bytes())))
}

/// Optional descriptive attributes accompanying a signature.
#[derive(Debug, Clone, Default)]
pub struct SignatureAttrs {
    pub signer_name: Option<String>,
    pub image_url: Option<String>,
}

/// Signs an entry as `role` on behalf of `caller`.
///
/// Inside one transaction: load the entry, refuse if locked, compute the
/// digest over the current signable core, and write the signature record
/// into the role's field. A supervisor signature sets the terminal lock in
/// the same write; after that, neither role can ever sign again. A mentor
/// may re-sign an unlocked entry, replacing the earlier mentor record. No
/// ordering between the roles is enforced.
pub async fn sign_entry(
    store: &dyn LogbookStore,
    caller: &str,
    entry_id: Uuid,
    role: Role,
    attrs: SignatureAttrs,
) -> Result<SignatureRecord, LogbookError> {
    if caller.is_empty() {
        return Err(LogbookError::Unauthenticated);
    }

    let mut tx = store.begin().await?;
    let entry = tx
        .entry_for_update(entry_id)
        .await?
        .ok_or(LogbookError::EntryNotFound)?;
    if entry.locked {
        return Err(LogbookError::EntryLocked);
    }

    let digest = entry_digest(&entry, caller, role).map_err(LogbookError::Canonicalize)?;
    let now = Utc::now();
    let record = SignatureRecord {
        signed_by: caller.to_owned(),
        display_name: attrs.signer_name.unwrap_or_default(),
        signed_at: now,
        image_url: attrs.image_url,
        digest,
    };

    let lock = role == Role::Supervisor;
    tx.write_signature(entry_id, role, &record, lock, now).await?;
    tx.commit().await?;
    Ok(record)
}

/// Verification verdict for one stored signature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureCheck {
    pub signed_by: String,
    pub signed_at: DateTime<Utc>,
    pub digest: String,
    /// True when recomputing the digest from the entry's current core and
    /// this record's signer reproduces `digest` exactly.
    pub valid: bool,
}

/// Digest report for an entry: one check per stored signature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub entry_id: Uuid,
    pub locked: bool,
    pub mentor: Option<SignatureCheck>,
    pub supervisor: Option<SignatureCheck>,
}

/// Recomputes every stored signature digest against the entry's current
/// signable core. A mismatch means the core changed after that signature
/// was written (possible for mentor signatures on unlocked entries, which
/// stay editable).
pub async fn verify_entry(
    store: &dyn LogbookStore,
    entry_id: Uuid,
) -> Result<VerifyReport, LogbookError> {
    let entry = store
        .entry(entry_id)
        .await?
        .ok_or(LogbookError::EntryNotFound)?;

    let mut report = VerifyReport {
        entry_id: entry.id,
        locked: entry.locked,
        mentor: None,
        supervisor: None,
    };
    for role in [Role::Mentor, Role::Supervisor] {
        if let Some(record) = entry.signature(role) {
            let expected =
                entry_digest(&entry, &record.signed_by, role).map_err(LogbookError::Canonicalize)?;
            let check = SignatureCheck {
                signed_by: record.signed_by.clone(),
                signed_at: record.signed_at,
                digest: record.digest.clone(),
                valid: expected == record.digest,
            };
            match role {
                Role::Mentor => report.mentor = Some(check),
                Role::Supervisor => report.supervisor = Some(check),
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntryContent, YesNoUa};
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn content() -> EntryContent {
        EntryContent {
            date: Utc.with_ymd_and_hms(2025, 9, 5, 9, 0, 0).unwrap(),
            indication: Some("dyspnea".into()),
            views: vec![View::Plax, View::Ap4c],
            findings: Findings {
                lv_dilated: Some(YesNoUa::No),
                lv_impaired: Some(YesNoUa::Yes),
                ..Findings::default()
            },
            summary: Some("impaired LV".into()),
            directly_observed: Some(true),
            image_quality: Some(ImageQuality::Acceptable),
            demographics: Demographics { age: Some(61), gender: None, bmi: Some(27.4) },
            notes: None,
            diagnosis: "LV impairment".into(),
            comments: None,
        }
    }

    fn entry() -> LogbookEntry {
        LogbookEntry::new(Uuid::new_v4(), "trainee@nhs.net", content(), Utc::now())
    }

    #[test]
    fn digest_is_deterministic() {
        let e = entry();
        let a = entry_digest(&e, "mentor@nhs.net", Role::Mentor).unwrap();
        let b = entry_digest(&e, "mentor@nhs.net", Role::Mentor).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn digest_depends_on_signer_and_role() {
        let e = entry();
        let mentor = entry_digest(&e, "m@nhs.net", Role::Mentor).unwrap();
        let other_signer = entry_digest(&e, "m2@nhs.net", Role::Mentor).unwrap();
        let supervisor = entry_digest(&e, "m@nhs.net", Role::Supervisor).unwrap();
        assert_ne!(mentor, other_signer);
        assert_ne!(mentor, supervisor);
    }

    #[test]
    fn digest_changes_when_core_changes() {
        let mut e = entry();
        let before = entry_digest(&e, "m@nhs.net", Role::Mentor).unwrap();
        e.findings.lv_impaired = Some(YesNoUa::No);
        let after = entry_digest(&e, "m@nhs.net", Role::Mentor).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn digest_ignores_signatures_and_lock() {
        let mut e = entry();
        let before = entry_digest(&e, "m@nhs.net", Role::Mentor).unwrap();
        e.mentor_signature = Some(SignatureRecord {
            signed_by: "m@nhs.net".into(),
            display_name: "Dr M".into(),
            signed_at: Utc::now(),
            image_url: Some("https://sig.example/m.png".into()),
            digest: before.clone(),
        });
        e.locked = true;
        let after = entry_digest(&e, "m@nhs.net", Role::Mentor).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn digest_sees_timestamp_at_millisecond_grain() {
        let mut e = entry();
        let before = entry_digest(&e, "m@nhs.net", Role::Mentor).unwrap();
        e.date += chrono::Duration::milliseconds(1);
        let after = entry_digest(&e, "m@nhs.net", Role::Mentor).unwrap();
        assert_ne!(before, after);
    }

    proptest! {
        #[test]
        fn digest_shape_holds_for_arbitrary_text(
            diagnosis in ".*",
            summary in proptest::option::of(".*"),
            signer in "[a-z]{1,12}@[a-z]{1,12}",
        ) {
            let mut e = entry();
            e.diagnosis = diagnosis;
            e.summary = summary;
            let d = entry_digest(&e, &signer, Role::Supervisor).unwrap();
            prop_assert_eq!(d.len(), 64);
            prop_assert!(d.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        }
    }
}

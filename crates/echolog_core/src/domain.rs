//! crates/echolog_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format;
//! adapters map them to and from their own record types.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Fallback per-trainee daily booking cap when a slot does not set its own.
pub const DEFAULT_TRAINEE_DAILY_CAP: u32 = 2;

//=========================================================================================
// Slots and bookings
//=========================================================================================

/// Composite identity of a slot: the owning supervisor plus the slot id.
///
/// The canonical wire form is the hierarchical path
/// `schedules/{supervisor}/slots/{slot_id}`, kept for compatibility with
/// existing clients of the booking endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub supervisor_id: String,
    pub slot_id: Uuid,
}

/// Error returned when a slot locator string does not have the
/// `schedules/{supervisor}/slots/{slot_id}` shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid slot path")]
pub struct SlotPathError;

impl SlotKey {
    pub fn new(supervisor_id: impl Into<String>, slot_id: Uuid) -> Self {
        Self { supervisor_id: supervisor_id.into(), slot_id }
    }

    /// Renders the canonical hierarchical path for this key.
    pub fn path(&self) -> String {
        format!("schedules/{}/slots/{}", self.supervisor_id, self.slot_id)
    }
}

impl FromStr for SlotKey {
    type Err = SlotPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        match (parts.next(), parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("schedules"), Some(supervisor), Some("slots"), Some(id), None) => {
                if supervisor.is_empty() {
                    return Err(SlotPathError);
                }
                let slot_id = Uuid::parse_str(id).map_err(|_| SlotPathError)?;
                Ok(SlotKey::new(supervisor, slot_id))
            }
            _ => Err(SlotPathError),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Lifecycle state of a supervision slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Available,
    Booked,
    Unavailable,
}

impl SlotStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Booked => "booked",
            SlotStatus::Unavailable => "unavailable",
        }
    }
}

impl FromStr for SlotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(SlotStatus::Available),
            "booked" => Ok(SlotStatus::Booked),
            "unavailable" => Ok(SlotStatus::Unavailable),
            other => Err(format!("unknown slot status '{other}'")),
        }
    }
}

/// A bookable supervision time window, owned by one supervisor.
///
/// Invariant: `status == Booked` exactly when both `trainee_id` and
/// `booking_id` are set. The booking engine is the only writer of that
/// transition, and it never touches the scheduling metadata (start, end,
/// location, cap) it does not own.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub supervisor_id: String,
    pub id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: String,
    pub status: SlotStatus,
    pub trainee_id: Option<String>,
    pub booking_id: Option<Uuid>,
    pub daily_cap_for_trainee: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.supervisor_id.clone(), self.id)
    }

    /// Per-trainee daily cap for this slot, falling back to the default
    /// when the slot does not set one.
    pub fn trainee_daily_cap(&self) -> u32 {
        self.daily_cap_for_trainee.unwrap_or(DEFAULT_TRAINEE_DAILY_CAP)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    Booked,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Booked => "booked",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booked" => Ok(BookingStatus::Booked),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status '{other}'")),
        }
    }
}

/// One trainee's reservation of one slot.
///
/// The supervisor lives inside the slot key; `slot_date_key` is fixed at
/// creation from the slot's start instant and never recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub slot: SlotKey,
    pub trainee_id: String,
    pub status: BookingStatus,
    pub slot_date_key: DayKey,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Supervisor identifier denormalized from the slot at booking time.
    pub fn supervisor_id(&self) -> &str {
        &self.slot.supervisor_id
    }
}

/// Calendar-date bucket (`YYYY-MM-DD`) used to group a trainee's bookings
/// for daily-cap enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(String);

impl DayKey {
    /// Buckets an instant by its calendar date in the governing timezone.
    ///
    /// Always derived from the slot's start instant, never from the wall
    /// clock at booking time: a booking made at 23:59 for a slot starting
    /// 00:05 the next day buckets to the slot's day.
    pub fn from_instant(instant: DateTime<Utc>, tz: Tz) -> Self {
        DayKey(instant.with_timezone(&tz).format("%Y-%m-%d").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DayKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let date = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
        Ok(DayKey(date.format("%Y-%m-%d").to_string()))
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//=========================================================================================
// Logbook entries
//=========================================================================================

/// Counter-signing role. Selecting the signature field is always a match
/// on this enum; the wire strings are `"mentor"` and `"supervisor"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Mentor,
    Supervisor,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid role")]
pub struct RoleParseError;

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Mentor => "mentor",
            Role::Supervisor => "supervisor",
        }
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mentor" => Ok(Role::Mentor),
            "supervisor" => Ok(Role::Supervisor),
            _ => Err(RoleParseError),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard echo windows recorded on a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum View {
    Plax,
    Psax,
    Ap4c,
    Sc4c,
    Ivc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageQuality {
    Good,
    Acceptable,
    Poor,
}

impl ImageQuality {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageQuality::Good => "Good",
            ImageQuality::Acceptable => "Acceptable",
            ImageQuality::Poor => "Poor",
        }
    }
}

impl FromStr for ImageQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Good" => Ok(ImageQuality::Good),
            "Acceptable" => Ok(ImageQuality::Acceptable),
            "Poor" => Ok(ImageQuality::Poor),
            other => Err(format!("unknown image quality '{other}'")),
        }
    }
}

/// Yes / No / unassessable answer used for individual findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YesNoUa {
    Yes,
    No,
    #[serde(rename = "U/A")]
    Unassessable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "M")]
    Male,
    Other,
}

/// Structured scan findings. Every answer is optional; an omitted answer
/// means the question was not assessed at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Findings {
    pub lv_dilated: Option<YesNoUa>,
    pub lv_impaired: Option<YesNoUa>,
    pub rv_dilated: Option<YesNoUa>,
    pub rv_impaired: Option<YesNoUa>,
    pub low_preload: Option<YesNoUa>,
    pub pericardial_fluid: Option<YesNoUa>,
    pub pleural_fluid: Option<YesNoUa>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub bmi: Option<f32>,
}

/// A mentor or supervisor counter-signature attached to an entry.
///
/// `digest` is the SHA-256 integrity proof over the entry's signable core
/// plus the signer identity and role; recomputing it against the current
/// core detects post-signature edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRecord {
    pub signed_by: String,
    pub display_name: String,
    pub signed_at: DateTime<Utc>,
    pub image_url: Option<String>,
    pub digest: String,
}

/// The editable clinical content of a logbook entry, shared by the create
/// and update operations. This is exactly the signable core minus the
/// owner, which is fixed at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryContent {
    pub date: DateTime<Utc>,
    pub indication: Option<String>,
    pub views: Vec<View>,
    pub findings: Findings,
    pub summary: Option<String>,
    pub directly_observed: Option<bool>,
    pub image_quality: Option<ImageQuality>,
    pub demographics: Demographics,
    pub notes: Option<String>,
    pub diagnosis: String,
    pub comments: Option<String>,
}

/// One documented training scan.
///
/// The derived lifecycle is: draft (no signatures), then mentor-signed
/// (still editable), then locked (supervisor signature present, terminal).
/// `locked` is only ever set by the signing operation, together with the
/// supervisor signature.
#[derive(Debug, Clone, PartialEq)]
pub struct LogbookEntry {
    pub id: Uuid,
    pub owner_id: String,
    pub date: DateTime<Utc>,
    pub indication: Option<String>,
    pub views: Vec<View>,
    pub findings: Findings,
    pub summary: Option<String>,
    pub directly_observed: Option<bool>,
    pub image_quality: Option<ImageQuality>,
    pub demographics: Demographics,
    pub notes: Option<String>,
    pub diagnosis: String,
    pub comments: Option<String>,
    pub mentor_signature: Option<SignatureRecord>,
    pub supervisor_signature: Option<SignatureRecord>,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LogbookEntry {
    /// Builds a fresh, unsigned, unlocked entry owned by `owner_id`.
    pub fn new(
        id: Uuid,
        owner_id: impl Into<String>,
        content: EntryContent,
        now: DateTime<Utc>,
    ) -> Self {
        let mut entry = Self {
            id,
            owner_id: owner_id.into(),
            date: content.date,
            indication: None,
            views: Vec::new(),
            findings: Findings::default(),
            summary: None,
            directly_observed: None,
            image_quality: None,
            demographics: Demographics::default(),
            notes: None,
            diagnosis: String::new(),
            comments: None,
            mentor_signature: None,
            supervisor_signature: None,
            locked: false,
            created_at: now,
            updated_at: now,
        };
        entry.apply_content(content, now);
        entry
    }

    /// Replaces the editable clinical content. Callers are responsible for
    /// the lock check; this is a plain field update.
    pub fn apply_content(&mut self, content: EntryContent, now: DateTime<Utc>) {
        self.date = content.date;
        self.indication = content.indication;
        self.views = content.views;
        self.findings = content.findings;
        self.summary = content.summary;
        self.directly_observed = content.directly_observed;
        self.image_quality = content.image_quality;
        self.demographics = content.demographics;
        self.notes = content.notes;
        self.diagnosis = content.diagnosis;
        self.comments = content.comments;
        self.updated_at = now;
    }

    /// The signature slot for a role, as a typed field selection.
    pub fn signature(&self, role: Role) -> Option<&SignatureRecord> {
        match role {
            Role::Mentor => self.mentor_signature.as_ref(),
            Role::Supervisor => self.supervisor_signature.as_ref(),
        }
    }

    pub fn set_signature(&mut self, role: Role, record: SignatureRecord) {
        match role {
            Role::Mentor => self.mentor_signature = Some(record),
            Role::Supervisor => self.supervisor_signature = Some(record),
        }
    }
}

//=========================================================================================
// Identity
//=========================================================================================

// Represents a registered user - used throughout the service.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub email: String,
    pub name: String,
}

// Only used internally for login/signup - contains sensitive data.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub email: String,
    pub name: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie).
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_email: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn slot_path_roundtrip() {
        let key = SlotKey::new("carol@uclh.nhs.uk", Uuid::new_v4());
        let parsed: SlotKey = key.path().parse().unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn slot_path_rejects_malformed_locators() {
        for bad in [
            "",
            "schedules/carol@uclh.nhs.uk/slots",
            "schedules//slots/6f7dd2e4-8496-4f0e-9f9f-2b5a3b2f2a11",
            "schedule/carol@uclh.nhs.uk/slots/6f7dd2e4-8496-4f0e-9f9f-2b5a3b2f2a11",
            "schedules/carol@uclh.nhs.uk/slot/6f7dd2e4-8496-4f0e-9f9f-2b5a3b2f2a11",
            "schedules/carol@uclh.nhs.uk/slots/not-a-uuid",
            "schedules/carol@uclh.nhs.uk/slots/6f7dd2e4-8496-4f0e-9f9f-2b5a3b2f2a11/extra",
        ] {
            assert!(bad.parse::<SlotKey>().is_err(), "accepted: {bad}");
        }
    }

    #[test]
    fn role_parses_exact_wire_strings_only() {
        assert_eq!("mentor".parse::<Role>().unwrap(), Role::Mentor);
        assert_eq!("supervisor".parse::<Role>().unwrap(), Role::Supervisor);
        assert!("Mentor".parse::<Role>().is_err());
        assert!("admin".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
        assert_eq!(RoleParseError.to_string(), "Invalid role");
    }

    #[test]
    fn day_key_uses_governing_timezone_not_utc() {
        let tz = chrono_tz::Europe::London;
        // 23:30 UTC on 1 June is 00:30 on 2 June in London (BST, UTC+1).
        let summer = Utc.with_ymd_and_hms(2025, 6, 1, 23, 30, 0).unwrap();
        assert_eq!(DayKey::from_instant(summer, tz).as_str(), "2025-06-02");
        // In winter London is on GMT and the dates agree.
        let winter = Utc.with_ymd_and_hms(2025, 1, 15, 23, 30, 0).unwrap();
        assert_eq!(DayKey::from_instant(winter, tz).as_str(), "2025-01-15");
    }

    #[test]
    fn day_key_parse_normalizes() {
        let key: DayKey = "2025-09-05".parse().unwrap();
        assert_eq!(key.as_str(), "2025-09-05");
        assert!("2025-13-05".parse::<DayKey>().is_err());
        assert!("yesterday".parse::<DayKey>().is_err());
    }

    #[test]
    fn trainee_daily_cap_defaults_to_two() {
        let now = Utc::now();
        let mut slot = Slot {
            supervisor_id: "bob@uclh.nhs.uk".into(),
            id: Uuid::new_v4(),
            start: now,
            end: now,
            location: "UCLH".into(),
            status: SlotStatus::Available,
            trainee_id: None,
            booking_id: None,
            daily_cap_for_trainee: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(slot.trainee_daily_cap(), DEFAULT_TRAINEE_DAILY_CAP);
        slot.daily_cap_for_trainee = Some(5);
        assert_eq!(slot.trainee_daily_cap(), 5);
    }

    proptest! {
        #[test]
        fn slot_path_roundtrip_for_any_email_like_supervisor(
            local in "[a-z][a-z0-9.]{0,15}",
            host in "[a-z][a-z0-9.]{0,15}",
        ) {
            let key = SlotKey::new(format!("{local}@{host}"), Uuid::new_v4());
            prop_assert_eq!(key.path().parse::<SlotKey>().unwrap(), key);
        }

        #[test]
        fn day_key_always_has_iso_date_shape(secs in 0i64..4_102_444_800) {
            let instant = Utc.timestamp_opt(secs, 0).unwrap();
            let key = DayKey::from_instant(instant, chrono_tz::Europe::London);
            let s = key.as_str().to_owned();
            prop_assert_eq!(s.len(), 10);
            prop_assert!(s.as_bytes()[4] == b'-' && s.as_bytes()[7] == b'-');
            let reparsed = s.parse::<DayKey>().unwrap();
            prop_assert_eq!(reparsed.as_str(), &s);
        }
    }
}

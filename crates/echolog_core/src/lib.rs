pub mod booking;
pub mod domain;
pub mod logbook;
pub mod ports;
pub mod signing;
pub mod slots;

pub use booking::{book_slot, BookingError, SchedulePolicy};
pub use domain::{
    AuthSession, Booking, BookingStatus, DayKey, Demographics, EntryContent, Findings, Gender,
    ImageQuality, LogbookEntry, Role, RoleParseError, SignatureRecord, Slot, SlotKey, SlotPathError,
    SlotStatus, User, UserCredentials, View, YesNoUa, DEFAULT_TRAINEE_DAILY_CAP,
};
pub use logbook::LogbookError;
pub use ports::{
    IdentityStore, LogbookStore, LogbookTx, ScheduleStore, ScheduleTx, StoreError, StoreResult,
};
pub use signing::{sign_entry, verify_entry, SignatureAttrs, SignatureCheck, VerifyReport};
pub use slots::{Availability, NewSlot, ScheduleError};

pub mod db;
pub mod logbook;
pub mod schedule;

pub use db::DbAdapter;

//! services/api/src/lib.rs
//!
//! Library crate for the API service, shared by the `api` and `openapi`
//! binaries.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;

pub mod auth;
pub mod logbook;
pub mod middleware;
pub mod rest;
pub mod schedule;
pub mod state;

// Re-export what the binary needs to assemble the router.
pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use state::AppState;

//! Hearth HTTP server
//!
//! Maps the HTTP surface onto storage actors:
//! - `app`: router construction and middleware
//! - `handlers`: one handler per route
//! - `instance`: resolves which instance a request addresses
//! - `response`: JSON bodies with optional pretty printing
//! - `error`: error to status code mapping

pub mod app;
pub mod error;
pub mod handlers;
pub mod instance;
pub mod response;
pub mod state;

pub use app::build_router;
pub use state::AppState;

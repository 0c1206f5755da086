// calsync library
// Reconciliation, storage and the Google Calendar client, shared by the CLI and tests

pub mod calendar;
pub mod command_handlers;
pub mod config;
pub mod database;
pub mod error;
pub mod http_config;
pub mod models;
pub mod utils;

// Re-export commonly used types
pub use calendar::{CalendarReconciler, EventStore, GoogleCalendarClient, RemoteCalendarProvider, RemoteEventWriter};
pub use database::Database;
pub use error::{AppError, AppResult};
pub use models::*;

//! Core library for mailroom.
//!
//! Holds everything a front end needs to talk to the settlement-mail backend:
//! the session guard that owns the bearer token, the guarded API client, the
//! resource models, and configuration.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{Identity, SessionGuard, SessionState, SessionStore, SweepHandle};
pub use config::{Config, StoreKind};

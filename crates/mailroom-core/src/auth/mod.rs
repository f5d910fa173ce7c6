//! Authentication module for managing the client-held session.
//!
//! This module provides:
//! - `SessionGuard`: owns the bearer token and its expiry, tears the session
//!   down on expiry or rejection, and reports invalidation to the host
//! - `SessionStore`: key/value storage the guard persists into, with
//!   in-memory, file and OS keychain backends
//! - `Identity`: display name and email decoded from the token payload
//!
//! Tokens carry an absolute expiry in epoch milliseconds; a background sweep
//! clears them even when no request happens to notice.

pub mod clock;
pub mod identity;
pub mod session;
pub mod store;
pub mod sweep;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, SystemClock};
pub use identity::Identity;
pub use session::{SessionGuard, SessionState};
pub use store::{FileStore, KeyringStore, MemoryStore, SessionStore};
pub use sweep::SweepHandle;

/// Storage key for the bearer token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key for the absolute expiry instant (epoch milliseconds)
pub const TOKEN_EXPIRY_KEY: &str = "tokenExpiry";

/// Storage key for the cached display name
pub const USER_NAME_KEY: &str = "userName";

/// Storage key for the cached email address
pub const USER_EMAIL_KEY: &str = "userEmail";

/// Every key that shares the session teardown lifecycle
pub const SESSION_KEYS: [&str; 4] = [
    ACCESS_TOKEN_KEY,
    TOKEN_EXPIRY_KEY,
    USER_NAME_KEY,
    USER_EMAIL_KEY,
];

//! REST API client module for the settlement-mail backend.
//!
//! This module provides the `ApiClient` for logging in and for every
//! authenticated call the dashboard makes: merchants, emails, transactions
//! and settlement records.
//!
//! Every authenticated call goes through the session guard: no request is
//! sent without a live token, and a 401 tears the session down.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;

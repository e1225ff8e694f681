//! # Turnstile Shared
//!
//! Wire types shared by the API and its clients, including the single
//! rate-limit error body every 429 carries.

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorResponse, RateLimitedResponse};

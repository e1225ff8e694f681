//! Data Transfer Objects - request/response types for the API.

use serde::{Deserialize, Serialize};

/// A caller's standing in one tier, as reported by the quota endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaResponse {
    pub tier: String,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch seconds at which the window resets.
    pub reset: i64,
}

/// Acknowledgement returned by the demo action endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionAccepted {
    pub action: String,
}

/// Bearer token issued by the demo login and signup endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
}

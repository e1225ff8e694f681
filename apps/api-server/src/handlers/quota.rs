//! Quota introspection.

use actix_web::{HttpRequest, HttpResponse, web};

use turnstile_core::domain::Tier;
use turnstile_shared::ApiResponse;
use turnstile_shared::dto::QuotaResponse;

use crate::middleware::error::{AppError, AppResult};
use crate::middleware::rate_limit::admission_request;
use crate::state::AppState;

/// The caller's standing in a tier. Does not consume quota.
///
/// GET /api/rate-limit/{tier}
pub async fn get_quota(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let tier: Tier = path
        .parse()
        .map_err(|_| AppError::NotFound(format!("Rate limit tier '{}' does not exist", path)))?;

    let admission = admission_request(&req, state.tokens.as_ref());
    let verdict = state.gate.peek_tier(&admission, tier).await;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(QuotaResponse {
        tier: tier.to_string(),
        limit: verdict.limit,
        remaining: verdict.remaining,
        reset: verdict.reset_epoch_secs(),
    })))
}

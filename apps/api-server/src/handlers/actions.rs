//! Demo endpoints. Each one sits behind the rate limit middleware under the
//! tier `route_tiers` assigns it and only acknowledges the call.

use actix_web::{HttpResponse, web};
use uuid::Uuid;

use turnstile_shared::ApiResponse;
use turnstile_shared::dto::{ActionAccepted, AuthResponse};

use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

fn accepted(action: &str) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok(ActionAccepted {
        action: action.to_string(),
    }))
}

/// GET /api/posts
pub async fn list_posts() -> HttpResponse {
    accepted("list-posts")
}

/// POST /api/comments
pub async fn create_comment() -> HttpResponse {
    accepted("create-comment")
}

/// POST /api/posts/{id}/like
pub async fn like_post(path: web::Path<String>) -> HttpResponse {
    accepted(&format!("like-post:{}", path.into_inner()))
}

fn issue_token(state: &AppState) -> AppResult<HttpResponse> {
    let token = state
        .tokens
        .generate_token(Uuid::new_v4())
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(AuthResponse {
        access_token: token,
        token_type: "Bearer".to_string(),
    })))
}

/// POST /api/auth/login
pub async fn login(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    issue_token(&state)
}

/// POST /api/auth/signup
pub async fn signup(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    issue_token(&state)
}

/// POST /api/auth/password-reset
pub async fn password_reset() -> HttpResponse {
    accepted("password-reset")
}

//! Rate limiting middleware.
//!
//! Looks up the route's tier in [`RouteTiers`], asks the [`AdmissionGate`]
//! and either forwards the request with `X-RateLimit-*` headers attached or
//! answers 429 with the shared [`RateLimitedResponse`] body.

use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    Error, HttpRequest, HttpResponse, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{HeaderName, HeaderValue},
};
use futures::future::{LocalBoxFuture, Ready, ready};

use turnstile_core::domain::{RouteRule, RouteTiers};
use turnstile_core::ports::TokenService;
use turnstile_core::{AdmissionGate, AdmissionRequest, AdmissionResult, Denial};
use turnstile_shared::RateLimitedResponse;

use super::auth::bearer_user_id;
use super::error::AppError;
use crate::state::AppState;

/// Everything the gate needs to know about an HTTP request.
pub fn admission_request(req: &HttpRequest, tokens: &dyn TokenService) -> AdmissionRequest {
    let mut admission = AdmissionRequest::new();

    if let Some(user_id) = bearer_user_id(req, tokens) {
        admission = admission.with_user_id(user_id);
    }
    if let Some(chain) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        admission = admission.with_forwarded_for(chain);
    }
    if let Some(peer) = req.peer_addr() {
        admission = admission.with_peer_addr(peer.to_string());
    }

    admission
}

fn too_many_requests(denial: Denial) -> HttpResponse {
    let mut response = HttpResponse::TooManyRequests();
    for pair in denial.header_pairs() {
        response.insert_header(pair);
    }
    response.json(RateLimitedResponse::new(denial.message, denial.retry_after))
}

/// Rate limiting middleware factory.
pub struct RateLimitMiddleware {
    gate: Arc<AdmissionGate>,
    routes: Arc<RouteTiers>,
    tokens: Arc<dyn TokenService>,
}

impl RateLimitMiddleware {
    pub fn new(state: &AppState) -> Self {
        Self {
            gate: state.gate.clone(),
            routes: state.routes.clone(),
            tokens: state.tokens.clone(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            gate: self.gate.clone(),
            routes: self.routes.clone(),
            tokens: self.tokens.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    gate: Arc<AdmissionGate>,
    routes: Arc<RouteTiers>,
    tokens: Arc<dyn TokenService>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        let tier = match self.routes.resolve(req.method().as_str(), req.path()) {
            RouteRule::Limit(tier) => Some(tier.clone()),
            RouteRule::Exempt => None,
        };
        let Some(tier) = tier else {
            return Box::pin(async move {
                let res = service.call(req).await?;
                Ok(res.map_into_left_body())
            });
        };

        let gate = self.gate.clone();
        let admission = admission_request(req.request(), self.tokens.as_ref());

        Box::pin(async move {
            let response = match gate.admit(&admission, &tier).await {
                Ok(AdmissionResult::Admitted(headers)) => {
                    let mut res = service.call(req).await?;
                    for (name, value) in headers.pairs() {
                        if let Ok(value) = HeaderValue::try_from(value) {
                            res.headers_mut()
                                .insert(HeaderName::from_static(name), value);
                        }
                    }
                    return Ok(res.map_into_left_body());
                }
                Ok(AdmissionResult::Denied(denial)) => too_many_requests(denial),
                Err(e) => AppError::from(e).error_response(),
            };

            let (http_req, _payload) = req.into_parts();
            Ok(ServiceResponse::new(http_req, response).map_into_right_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use actix_web::{App, http::Method, http::StatusCode, test, web};
    use async_trait::async_trait;
    use turnstile_core::AdmissionConfig;
    use turnstile_core::domain::{PolicyRegistry, Tier};
    use turnstile_core::ports::{CounterStore, StoreError, WindowRecord};
    use turnstile_infra::{InMemoryCounterStore, JwtConfig, JwtTokenService};

    use crate::handlers;

    struct DownStore;

    #[async_trait]
    impl CounterStore for DownStore {
        async fn increment(
            &self,
            _key: &str,
            _window: Duration,
        ) -> Result<WindowRecord, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }

        async fn get(
            &self,
            _key: &str,
            _window: Duration,
        ) -> Result<Option<WindowRecord>, StoreError> {
            Err(StoreError::Connection("connection refused".to_string()))
        }
    }

    fn state_with(store: Arc<dyn CounterStore>, routes: RouteTiers) -> AppState {
        let registry = Arc::new(PolicyRegistry::default());
        AppState {
            gate: Arc::new(AdmissionGate::new(store, registry, AdmissionConfig::default())),
            routes: Arc::new(routes),
            tokens: Arc::new(JwtTokenService::new(JwtConfig::default())),
        }
    }

    fn test_state() -> AppState {
        state_with(Arc::new(InMemoryCounterStore::new()), handlers::route_tiers())
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .wrap(RateLimitMiddleware::new(&$state))
                    .app_data(web::Data::new($state.clone()))
                    .configure(handlers::configure_routes),
            )
            .await
        };
    }

    fn header<B>(res: &ServiceResponse<B>, name: &str) -> Option<String> {
        res.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn client(addr: &str) -> test::TestRequest {
        test::TestRequest::default()
            .insert_header(("x-forwarded-for", addr.to_string()))
    }

    #[actix_web::test]
    async fn test_admitted_response_carries_quota_headers() {
        let state = test_state();
        let app = app!(state);

        let req = client("203.0.113.7").uri("/api/posts").to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(header(&res, "x-ratelimit-limit").as_deref(), Some("60"));
        assert_eq!(header(&res, "x-ratelimit-remaining").as_deref(), Some("59"));
        assert!(header(&res, "x-ratelimit-reset").is_some());
        assert!(header(&res, "retry-after").is_none());
    }

    #[actix_web::test]
    async fn test_request_over_quota_gets_429_contract() {
        let state = test_state();
        let app = app!(state);

        for _ in 0..60 {
            let req = client("203.0.113.7").uri("/api/posts").to_request();
            let res = test::call_service(&app, req).await;
            assert_eq!(res.status(), StatusCode::OK);
        }

        let req = client("203.0.113.7").uri("/api/posts").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&res, "x-ratelimit-limit").as_deref(), Some("60"));
        assert_eq!(header(&res, "x-ratelimit-remaining").as_deref(), Some("0"));
        let retry_after: u64 = header(&res, "retry-after").unwrap().parse().unwrap();
        assert!((1..=60).contains(&retry_after));

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["retryAfter"], retry_after);
        assert_eq!(
            body["error"],
            format!("Too many requests. Please try again in {retry_after} seconds.")
        );

        // Another address is unaffected.
        let req = client("198.51.100.1").uri("/api/posts").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_routes_use_their_own_tier() {
        let state = test_state();
        let app = app!(state);

        for _ in 0..5 {
            let req = client("203.0.113.7")
                .method(Method::POST)
                .uri("/api/auth/login")
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }

        let req = client("203.0.113.7")
            .method(Method::POST)
            .uri("/api/auth/signup")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header(&res, "x-ratelimit-limit").as_deref(), Some("5"));

        // Credential exhaustion leaves public reads alone.
        let req = client("203.0.113.7").uri("/api/posts").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_exempt_routes_are_never_limited() {
        let state = test_state();
        let app = app!(state);

        for _ in 0..100 {
            let req = client("203.0.113.7").uri("/api/health").to_request();
            let res = test::call_service(&app, req).await;
            assert_eq!(res.status(), StatusCode::OK);
            assert!(header(&res, "x-ratelimit-limit").is_none());
        }
    }

    #[actix_web::test]
    async fn test_authenticated_users_get_their_own_bucket() {
        let state = test_state();
        let app = app!(state);
        let token = state.tokens.generate_token(uuid::Uuid::new_v4()).unwrap();

        for _ in 0..10 {
            let req = client("203.0.113.7")
                .method(Method::POST)
                .uri("/api/comments")
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }

        let anonymous = client("203.0.113.7")
            .method(Method::POST)
            .uri("/api/comments")
            .to_request();
        assert_eq!(
            test::call_service(&app, anonymous).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );

        // Same address, but keyed by user id.
        let authenticated = client("203.0.113.7")
            .method(Method::POST)
            .uri("/api/comments")
            .insert_header(("authorization", format!("Bearer {token}")))
            .to_request();
        let res = test::call_service(&app, authenticated).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(header(&res, "x-ratelimit-remaining").as_deref(), Some("9"));
    }

    #[actix_web::test]
    async fn test_quota_endpoint_does_not_consume() {
        let state = test_state();
        let app = app!(state);

        let req = client("203.0.113.7")
            .method(Method::POST)
            .uri("/api/posts/7/like")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        for _ in 0..3 {
            let req = client("203.0.113.7")
                .uri("/api/rate-limit/elevated-action")
                .to_request();
            let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["data"]["limit"], 30);
            assert_eq!(body["data"]["remaining"], 29);
        }

        let req = client("203.0.113.7").uri("/api/rate-limit/premium").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_credential_window_cannot_be_cleared_by_the_caller() {
        let state = test_state();
        let app = app!(state);
        let post = |uri: &str| {
            client("203.0.113.7")
                .method(Method::POST)
                .uri(uri)
                .to_request()
        };

        let mut admitted_logins = 0;
        for _ in 0..4 {
            for _ in 0..6 {
                let res = test::call_service(&app, post("/api/auth/login")).await;
                if res.status().is_success() {
                    admitted_logins += 1;
                }
            }
            test::call_service(&app, post("/api/auth/password-reset/confirm")).await;
            test::call_service(&app, post("/api/auth/password-reset")).await;
        }

        assert_eq!(admitted_logins, 5);
    }

    #[actix_web::test]
    async fn test_unknown_route_tier_is_a_server_error() {
        let routes =
            RouteTiers::new(Tier::PublicRead).limit("GET", "/api/posts", "premium");
        let state = state_with(Arc::new(InMemoryCounterStore::new()), routes);
        let app = app!(state);

        let req = client("203.0.113.7").uri("/api/posts").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["status"], 500);
    }

    #[actix_web::test]
    async fn test_store_outage_fails_open() {
        let state = state_with(Arc::new(DownStore), handlers::route_tiers());
        let app = app!(state);

        for _ in 0..10 {
            let req = client("203.0.113.7")
                .method(Method::POST)
                .uri("/api/auth/login")
                .to_request();
            let res = test::call_service(&app, req).await;
            assert_eq!(res.status(), StatusCode::OK);
            assert_eq!(header(&res, "x-ratelimit-remaining").as_deref(), Some("5"));
        }
    }
}

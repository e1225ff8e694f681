//! HTTP handlers and route configuration.

mod actions;
mod health;
mod quota;

use actix_web::web;

use turnstile_core::domain::{RouteTiers, Tier};

/// Configure all application routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health::health_check))
            .route("/rate-limit/{tier}", web::get().to(quota::get_quota))
            .route("/posts", web::get().to(actions::list_posts))
            .route("/posts/{id}/like", web::post().to(actions::like_post))
            .route("/comments", web::post().to(actions::create_comment))
            .service(
                web::scope("/auth")
                    .route("/login", web::post().to(actions::login))
                    .route("/signup", web::post().to(actions::signup))
                    .route("/password-reset", web::post().to(actions::password_reset)),
            ),
    );
}

/// Which tier guards which route. Unlisted routes are public reads.
pub fn route_tiers() -> RouteTiers {
    RouteTiers::new(Tier::PublicRead)
        .exempt("GET", "/api/health")
        .exempt("GET", "/api/rate-limit/{tier}")
        .limit("POST", "/api/comments", Tier::UserAction)
        .limit("POST", "/api/posts/{id}/like", Tier::ElevatedAction)
        .limit("POST", "/api/auth/password-reset", Tier::CredentialReset)
        .limit("POST", "/api/auth/*", Tier::Credential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_core::domain::{PolicyRegistry, RouteRule};

    fn tier_of(routes: &RouteTiers, method: &str, path: &str) -> RouteRule {
        routes.resolve(method, path).clone()
    }

    #[test]
    fn test_route_tiers_cover_demo_routes() {
        let routes = route_tiers();
        let limit = |tier: Tier| RouteRule::Limit(tier.to_string());

        assert_eq!(tier_of(&routes, "GET", "/api/health"), RouteRule::Exempt);
        assert_eq!(
            tier_of(&routes, "GET", "/api/rate-limit/credential"),
            RouteRule::Exempt
        );
        assert_eq!(
            tier_of(&routes, "GET", "/api/posts"),
            limit(Tier::PublicRead)
        );
        assert_eq!(
            tier_of(&routes, "POST", "/api/comments"),
            limit(Tier::UserAction)
        );
        assert_eq!(
            tier_of(&routes, "POST", "/api/posts/42/like"),
            limit(Tier::ElevatedAction)
        );
        assert_eq!(
            tier_of(&routes, "POST", "/api/auth/login"),
            limit(Tier::Credential)
        );
        assert_eq!(
            tier_of(&routes, "POST", "/api/auth/signup"),
            limit(Tier::Credential)
        );
        assert_eq!(
            tier_of(&routes, "POST", "/api/auth/password-reset"),
            limit(Tier::CredentialReset)
        );
        assert_eq!(
            tier_of(&routes, "POST", "/api/auth/password-reset/confirm"),
            limit(Tier::Credential)
        );
    }

    #[test]
    fn test_route_tiers_validate_against_defaults() {
        assert!(route_tiers().validate(&PolicyRegistry::default()).is_ok());
    }
}

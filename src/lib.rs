//! MDRRMO Backend - library for app logic and testing

pub mod content;
pub mod db;
pub mod error;
pub mod logging;
pub mod routes;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to local dev origins.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                "http://localhost:3000".parse().unwrap(),
                "http://127.0.0.1:3000".parse().unwrap(),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/// Create and configure the application router.
pub fn create_app() -> Router {
    let cors = configure_cors();
    tracing::info!("CORS configured");

    Router::new()
        // Auth
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/verify", post(routes::auth::verify_token))
        .route("/api/auth/refresh", post(routes::auth::refresh))
        .route("/api/auth/logout", post(routes::auth::logout))
        // User management (admin role only)
        .route(
            "/api/admin/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/api/admin/users/{id}",
            axum::routing::patch(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        // Pages and sections
        .route(
            "/api/pages",
            get(routes::pages::list_pages).post(routes::pages::create_page),
        )
        .route(
            "/api/pages/{slug}",
            get(routes::pages::get_page)
                .patch(routes::pages::update_page)
                .delete(routes::pages::delete_page),
        )
        .route(
            "/api/pages/{slug}/content",
            put(routes::pages::compose_content),
        )
        .route(
            "/api/pages/{slug}/sections",
            get(routes::pages::list_sections).post(routes::pages::create_section),
        )
        .route(
            "/api/sections/{id}",
            axum::routing::patch(routes::pages::update_section)
                .delete(routes::pages::delete_section),
        )
        .route(
            "/api/sections/{id}/reorder",
            post(routes::pages::reorder_section),
        )
        // Resources
        .route(
            "/api/resources",
            get(routes::resources::list_resources).post(routes::resources::create_resource),
        )
        .route(
            "/api/resources/{id}",
            get(routes::resources::get_resource)
                .patch(routes::resources::update_resource)
                .delete(routes::resources::delete_resource),
        )
        .route(
            "/api/resources/{id}/download",
            post(routes::resources::download_resource),
        )
        // Emergency data
        .route("/api/alerts", get(routes::alerts::list_public_alerts))
        .route(
            "/api/admin/alerts",
            get(routes::alerts::list_all_alerts).post(routes::alerts::create_alert),
        )
        .route(
            "/api/admin/alerts/{id}",
            axum::routing::patch(routes::alerts::update_alert)
                .delete(routes::alerts::delete_alert),
        )
        .route("/api/hotlines", get(routes::directory::list_hotlines))
        .route(
            "/api/admin/hotlines",
            post(routes::directory::create_hotline),
        )
        .route(
            "/api/admin/hotlines/{id}",
            axum::routing::patch(routes::directory::update_hotline)
                .delete(routes::directory::delete_hotline),
        )
        .route(
            "/api/organization",
            get(routes::directory::get_organization),
        )
        .route(
            "/api/admin/organization",
            post(routes::directory::create_org_member),
        )
        .route(
            "/api/admin/organization/{id}",
            axum::routing::patch(routes::directory::update_org_member)
                .delete(routes::directory::delete_org_member),
        )
        .route("/api/personnel", get(routes::directory::list_personnel))
        .route(
            "/api/admin/personnel",
            post(routes::directory::create_personnel),
        )
        .route(
            "/api/admin/personnel/{id}",
            axum::routing::patch(routes::directory::update_personnel)
                .delete(routes::directory::delete_personnel),
        )
        // Weather
        .route("/api/weather", get(routes::weather::get_weather))
        .route("/api/weather/sync", post(routes::weather::sync_weather))
        // Analytics
        .route("/api/analytics/events", post(routes::analytics::track_event))
        .route(
            "/api/admin/analytics/summary",
            get(routes::analytics::summary),
        )
        // Health
        .route("/health", get(routes::health::health_ping))
        .route("/health/database", get(routes::health::health_database))
        .route("/health/ready", get(routes::health::health_ready))
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        // Global 2 MB request body cap — prevents unbounded buffering
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024))
        .layer(cors)
}

/// Run the server (used by main).
pub async fn run() {
    dotenvy::dotenv().ok();

    // Guards MUST be held for the programme's lifetime; dropping them early
    // shuts down background log-writer threads and loses buffered log lines.
    let _log_guards = logging::init();

    routes::health::init_start_time();

    // Refuse to start in production with the insecure default JWT secret.
    let environment = std::env::var("ENVIRONMENT").unwrap_or_default();
    if environment == "production" {
        let secret = std::env::var("JWT_SECRET").unwrap_or_default();
        if secret.is_empty() || secret == "default-jwt-secret-change-in-production" {
            panic!(
                "FATAL: JWT_SECRET must be set to a secure, unique value in production. \
                 Refusing to start with the default secret."
            );
        }
    }

    if std::env::var("DATABASE_URL").is_ok() {
        match db::init_pool(None).await {
            Ok(pool) => {
                if let Err(e) = db::run_migrations(&pool).await {
                    tracing::error!("Failed to run database migrations: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize database pool: {}. Continuing without database.",
                    e
                );
            }
        }
    } else {
        tracing::info!("DATABASE_URL not set. Running without database connection.");
    }

    let app = create_app();

    // Bind address is configurable via HOST / PORT env vars.
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3001);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .expect("Invalid HOST/PORT configuration");
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn test_create_app_returns_router() {
        let _app = create_app();
        // Just test that it compiles and doesn't panic
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = create_app();
        let req = Request::get("/api/nope").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_public_page_route_without_db_is_503() {
        let app = create_app();
        let req = Request::get("/api/pages/evacuation-centers")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_admin_summary_without_token_is_401() {
        let app = create_app();
        let req = Request::get("/api/admin/analytics/summary")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}

#![allow(dead_code)]

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: https:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest(
            "/api/v1/sessions",
            sessions_routes(app_state.clone())
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::rate_limit::rate_limit_middleware,
                ))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    middlewares::auth::identity_middleware,
                )),
        )
        .nest(
            "/api/v1/proctored",
            proctored_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::rate_limit::rate_limit_middleware,
            )),
        )
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn sessions_routes(
    app_state: std::sync::Arc<services::AppState>,
) -> Router<std::sync::Arc<services::AppState>> {
    // Password attempts carry their own, much tighter limiter.
    let authenticate_route = Router::new()
        .route(
            "/{id}/authenticate",
            post(handlers::proctored::authenticate),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::rate_limit::password_rate_limit_middleware,
        ));

    Router::new()
        .route("/", post(handlers::sessions::create_session))
        .route(
            "/{id}",
            get(handlers::sessions::get_session).delete(handlers::sessions::exit_session),
        )
        .route("/{id}/begin", post(handlers::sessions::begin_session))
        .route("/{id}/answers", post(handlers::sessions::select_answer))
        .route(
            "/{id}/answers/{index}",
            delete(handlers::sessions::clear_answer),
        )
        .route("/{id}/advance", post(handlers::sessions::advance_session))
        .route("/{id}/jump", post(handlers::sessions::jump_to_question))
        .route("/{id}/submit", post(handlers::sessions::submit_session))
        .route("/{id}/continue", post(handlers::sessions::continue_session))
        .route("/{id}/track", post(handlers::recommendations::choose_track))
        .route(
            "/{id}/roadmap",
            post(handlers::recommendations::request_roadmap),
        )
        .route("/{id}/stream", get(handlers::sse::session_stream))
        .merge(authenticate_route)
}

fn proctored_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new().route("/", post(handlers::proctored::enter_test))
}

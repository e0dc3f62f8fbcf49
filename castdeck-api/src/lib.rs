//! Castdeck HTTP API
//!
//! JSON routes over the service layer plus a websocket stream of lifecycle
//! events. The binary in `main.rs` adds configuration, logging and an
//! optional in-process dispatcher.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use libcastdeck::CastdeckService;

pub mod error;
mod routes;
mod ws;

pub struct AppState {
    pub service: CastdeckService,
}

impl AppState {
    pub fn new(service: CastdeckService) -> Arc<Self> {
        Arc::new(Self { service })
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit =
        usize::try_from(state.service.config().media.max_bytes).unwrap_or(usize::MAX);

    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Accounts
        .route("/accounts", get(routes::accounts::list_accounts))
        .route("/accounts/connect", post(routes::accounts::connect_account))
        .route(
            "/accounts/{id}",
            get(routes::accounts::get_account).delete(routes::accounts::disconnect_account),
        )
        // Scheduled content
        .route("/content", post(routes::content::schedule_post))
        .route(
            "/content/{id}",
            get(routes::content::list_account_posts).delete(routes::content::cancel_post),
        )
        .route("/posts/{id}", get(routes::content::get_post))
        // Templates
        .route(
            "/templates",
            get(routes::templates::list_templates).post(routes::templates::create_template),
        )
        .route("/templates/apply", post(routes::templates::apply_template))
        .route(
            "/templates/{id}",
            get(routes::templates::get_template).delete(routes::templates::delete_template),
        )
        // Engagement
        .route(
            "/engagement/post/{id}",
            get(routes::engagement::get_engagement).post(routes::engagement::record_metrics),
        )
        .route(
            "/engagement/account/{id}/summary",
            get(routes::engagement::account_summary),
        )
        .route(
            "/engagement/account/{id}/recent",
            get(routes::engagement::recent_engagement),
        )
        .route("/engagement/account/{id}/top", get(routes::engagement::top_posts))
        // Hashtags
        .route("/hashtags/suggestions", post(routes::hashtags::suggestions))
        .route("/hashtags/trending", get(routes::hashtags::trending))
        .route("/hashtags/performance/{tag}", get(routes::hashtags::performance))
        // Media library
        .route(
            "/media",
            get(routes::media::list_media)
                .post(routes::media::upload_media)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/media/{id}",
            get(routes::media::get_media).delete(routes::media::delete_media),
        )
        // Analytics
        .route("/analytics/account/{id}", get(routes::analytics::account_analytics))
        .route(
            "/analytics/account/{id}/report",
            get(routes::analytics::account_report),
        )
        .route("/analytics/post/{id}", get(routes::analytics::post_analytics))
        // Notifications
        .route("/notifications", get(routes::notifications::list_notifications))
        .route("/notifications/read-all", post(routes::notifications::mark_all_read))
        .route("/notifications/{id}/read", post(routes::notifications::mark_read))
        // Live events
        .route("/events/ws", get(ws::events_ws))
        .with_state(state)
        // Method + path + status + latency; bodies and query strings stay out of the logs
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

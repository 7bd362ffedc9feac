use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer, Config};
use crate::handlers::{events, health_check, purchases, search};
use crate::state::AppState;

pub fn create_routes(state: AppState, config: &Config) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/categories", get(events::list_categories))
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:id/purchases", post(purchases::submit_purchase))
        .route("/purchases", get(purchases::list_purchases))
        .route("/me/purchases", get(purchases::my_purchases))
        .route("/purchases/:id", get(purchases::get_purchase))
        .route("/purchases/:id/rating", put(purchases::rate_purchase))
        .route("/search", get(search::search_events))
        .route("/search/live", get(search::live_search))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(config.production))
        .layer(create_cors_layer(config.cors_allowed_origins.as_deref()))
}

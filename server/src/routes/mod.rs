use axum::routing::{get, post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer, Config};
use crate::handlers::{bookings, catalog, health_check, webhooks};
use crate::state::AppState;

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let public = Router::new()
        .route("/health", get(health_check))
        .route("/movies", get(catalog::list_movies))
        .route("/movies/:id", get(catalog::get_movie))
        .route("/studios", get(catalog::list_studios))
        .route("/studios/:id", get(catalog::studio_layout))
        .route("/showtimes", get(catalog::list_showtimes))
        .route("/showtimes/:id", get(catalog::get_showtime))
        .route("/showtimes/:id/seats", get(catalog::occupied_seats));

    let admin = Router::new()
        .route("/movies", post(catalog::create_movie))
        .route(
            "/movies/:id",
            put(catalog::update_movie).delete(catalog::delete_movie),
        )
        .route("/studios", post(catalog::create_studio))
        .route(
            "/studios/:id",
            put(catalog::update_studio).delete(catalog::delete_studio),
        )
        .route("/showtimes", post(catalog::create_showtime))
        .route(
            "/showtimes/:id",
            put(catalog::update_showtime).delete(catalog::delete_showtime),
        );

    let customer = Router::new()
        .route(
            "/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route(
            "/bookings/:id",
            get(bookings::get_booking).delete(bookings::cancel_booking),
        )
        .route("/bookings/:id/retry-payment", post(bookings::retry_payment));

    let router = Router::new()
        .merge(public)
        .merge(customer)
        .nest("/admin", admin)
        .route("/webhooks/payment", post(webhooks::payment_callback))
        .with_state(state);

    create_security_headers_layer(router, config.production).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(create_cors_layer(&config.allowed_origins)),
    )
}

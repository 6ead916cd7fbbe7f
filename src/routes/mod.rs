use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod auth;
pub mod bookmarks;
pub mod dashboard;
pub mod health;
pub mod profiles;
pub mod ratings;
pub mod reminders;
pub mod resources;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    // Browsing, the view/download counters, and the email-link rating
    // path are public; upload and direct rating submission authenticate
    // via the bearer extractor on the handler itself.
    let resources_routes = Router::new()
        .route(
            "/",
            get(resources::list_resources).post(resources::create_resource),
        )
        .route("/:id", get(resources::get_resource))
        .route("/:id/view", post(resources::record_view))
        .route("/:id/download", post(resources::record_download))
        .route(
            "/:id/ratings",
            get(ratings::list_ratings).post(ratings::submit_rating),
        )
        .route(
            "/:id/bookmark",
            post(bookmarks::add_bookmark).delete(bookmarks::remove_bookmark),
        );

    let rating_link_routes =
        Router::new().route("/api/ratings/submit", get(ratings::submit_rating_link));

    let profiles_routes = Router::new()
        .route(
            "/me",
            get(profiles::my_profile).patch(profiles::update_my_profile),
        )
        .route("/:user_id", get(profiles::get_profile));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/profiles", profiles_routes)
        .route("/api/bookmarks", get(bookmarks::list_bookmarks))
        .route("/api/dashboard", get(dashboard::dashboard))
        .route("/api/reminders/run", post(reminders::run_batch))
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(rating_link_routes)
        .merge(protected_routes)
        .nest("/api/resources", resources_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 512))
}

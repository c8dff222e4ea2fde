use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{self, platforms, reviews, titles};
use super::AppState;
use crate::middleware::{guard, make_span_with_request_id, request_id_middleware, Guard};
use crate::policy::{self, EndpointPolicy};

/// Wraps a route group in the guard for `policy`
fn guarded(state: &AppState, policy: EndpointPolicy, routes: Router<AppState>) -> Router<AppState> {
    let guard_state = Guard {
        state: state.clone(),
        policy,
    };
    routes.route_layer(from_fn_with_state(guard_state, guard))
}

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    let titles = Router::new()
        .route("/", get(titles::list_titles).post(titles::create_title))
        .route(
            "/:id/",
            get(titles::get_title)
                .put(titles::update_title)
                .delete(titles::delete_title),
        );

    let platforms = Router::new()
        .route(
            "/stream/",
            get(platforms::list_platforms).post(platforms::create_platform),
        )
        .route(
            "/stream/:id/",
            get(platforms::get_platform)
                .put(platforms::update_platform)
                .delete(platforms::delete_platform),
        );

    let review_create = Router::new().route("/:id/reviews/create/", post(reviews::create_review));
    let review_list = Router::new().route("/:id/reviews/", get(reviews::list_reviews));
    let review_detail = Router::new().route(
        "/reviews/:id/",
        get(reviews::get_review)
            .put(reviews::update_review)
            .delete(reviews::delete_review),
    );
    let user_reviews = Router::new().route("/user-reviews/", get(reviews::user_reviews));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(guarded(&state, policy::TITLES, titles))
        .merge(guarded(&state, policy::PLATFORMS, platforms))
        .merge(guarded(&state, policy::REVIEW_CREATE, review_create))
        .merge(guarded(&state, policy::REVIEW_LIST, review_list))
        .merge(guarded(&state, policy::REVIEW_DETAIL, review_detail))
        .merge(guarded(&state, policy::USER_REVIEWS, user_reviews))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
        .with_state(state)
}

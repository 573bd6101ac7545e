use axum::{
    Router,
    http::HeaderName,
    routing::{get, post},
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{
        create_user, create_user_posts, decrement_counter, get_counter, health,
        increment_counter, list_posts, list_user_posts, list_users,
    },
    state::AppState,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn build_router(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health))
        .route("/users", get(list_users).post(create_user))
        .route("/posts", get(list_posts))
        .route("/user-posts", get(list_user_posts).post(create_user_posts))
        .route("/counter", get(get_counter))
        .route("/counter/increment", post(increment_counter))
        .route("/counter/decrement", post(decrement_counter))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}

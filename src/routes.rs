use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{HeaderName, Request, header},
    middleware,
    routing::{delete, get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{middlewares::jwt_auth_middleware, state::AppState};

const REQUEST_ID_HEADER: &str = "x-request-id";
// Records may carry inline data-URL images.
const WEBTOON_BODY_LIMIT: usize = 10 * 1024 * 1024;

pub fn init_router(app_state: AppState) -> Router {
    let state = Arc::new(app_state);

    let app = Router::new()
        .route("/", get(crate::controllers::home::index))
        .route("/auth", post(crate::controllers::auth::store))
        .route("/auth/register", post(crate::controllers::auth::register));

    let me_route = Router::new()
        .route("/", get(crate::controllers::me::index))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_middleware,
        ));

    let webtoons_route = Router::new()
        .route(
            "/",
            get(crate::controllers::webtoons::index)
                .post(crate::controllers::webtoons::store)
                .delete(crate::controllers::webtoons::clear),
        )
        .route("/stats", get(crate::controllers::webtoons::stats))
        .route("/{id}", delete(crate::controllers::webtoons::destroy))
        .layer(DefaultBodyLimit::max(WEBTOON_BODY_LIMIT))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_middleware,
        ));

    let x_request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);
    let request_id_middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(
            x_request_id_header.clone(),
            MakeRequestUuid,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|val| val.to_str().ok())
                    .unwrap_or_default();
                let user_agent = request
                    .headers()
                    .get(header::USER_AGENT)
                    .and_then(|val| val.to_str().ok())
                    .unwrap_or_default();

                let matched_path = request
                    .extensions()
                    .get::<MatchedPath>()
                    .map(MatchedPath::as_str);

                tracing::info_span!(
                    "http_request",
                    request_id,
                    method = ?request.method(),
                    uri = ?request.uri(),
                    path = matched_path,
                    version = ?request.version(),
                    user_agent,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::new(x_request_id_header));

    app.nest("/me", me_route)
        .nest("/webtoons", webtoons_route)
        .layer(CompressionLayer::new())
        .layer(request_id_middleware)
        .with_state(state)
}

use std::sync::Arc;
use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::{Request, Uri},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::Span;

pub mod env_utils;
pub mod error;
pub mod kaiten;
pub mod route_handlers;
pub mod tilda;
pub mod utils;

use env_utils::KaitenConfig;
use kaiten::CardCreator;

pub const WEBHOOK_PATH: &str = "/webhook/tilda";

/// Largest webhook body accepted, in bytes.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub struct AppState {
    pub kaiten: KaitenConfig,
    pub card_creator: Arc<dyn CardCreator>,
}
pub type SharedAppState = Arc<AppState>;

impl AppState {
    pub fn new(kaiten: KaitenConfig, card_creator: Arc<dyn CardCreator>) -> SharedAppState {
        Arc::new(Self {
            kaiten,
            card_creator,
        })
    }
}

/**
 * main router for the app, the tilda webhook route plus the healthcheck
 **/
pub fn get_main_router(state: SharedAppState) -> Router {
    tracing::debug!("initializing router(s) ...");
    tracing::info!("Webhook event route: {}", WEBHOOK_PATH);

    Router::new()
        .route(WEBHOOK_PATH, post(route_handlers::webhooks::handler))
        .route("/healthcheck", get(|| async { "Ok" }))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/**
 * wraps the router with panic recovery, the request timeout and access logging
 **/
pub fn add_layers(router: Router, request_timeout: Duration) -> Router {
    router
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(error::handle_timeout))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(axum::middleware::from_fn(uri_middleware))
        .layer(TraceLayer::new_for_http().on_response(
            |response: &Response, latency: Duration, _span: &Span| {
                let url = match response.extensions().get::<RequestUri>().map(|r| &r.0) {
                    Some(uri) => uri.to_string(),
                    None => "unknown".to_string(),
                };
                let status = response.status();
                let latency = utils::duration_to_ms_string(latency);

                if url == "/healthcheck" {
                    tracing::trace!("{} {} {}", url, status, latency);
                    return;
                }

                tracing::debug!("{} {} {}", url, status, latency);
            },
        ))
}

struct RequestUri(Uri);

async fn uri_middleware<B>(request: Request<B>, next: Next<B>) -> Response {
    let uri = request.uri().clone();

    let mut response = next.run(request).await;

    response.extensions_mut().insert(RequestUri(uri));

    response
}

use crate::{
    alert::Alert,
    config::Config,
    feed::{AlertFeed, Dismissal},
    metrics::{
        METRICS_HANDLE,
        http::{http_request_timer, record_http_request},
    },
    presentation::FeedView,
};
use axum::{
    Json, Router,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use hyper::StatusCode;
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc};

/// Creates an Axum Web Server
pub async fn create_server(config: Config, feed: Arc<AlertFeed>) -> anyhow::Result<()> {
    tracing::info!("Starting the web server");

    let app = create_router(feed);

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Unable to parse address: {}", e))?;

    tracing::info!("Listening on {}", addr);

    axum_server::bind(addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}

/// Create the router for the application
pub fn create_router(feed: Arc<AlertFeed>) -> Router {
    Router::new()
        .route("/alive", get(alive))
        .route("/metrics", get(metrics))
        .route("/alerts", get(view))
        .route("/alerts/all", get(all))
        .route("/alerts/refresh", post(refresh))
        .route("/alerts/dismiss-all", post(dismiss_all))
        .route("/alerts/{id}/dismiss", post(dismiss))
        .route("/alerts/{id}/action", get(action))
        .with_state(feed)
}

/// This is the handler for the /alive path
async fn alive() -> StatusCode {
    record_http_request("/alive");
    let _timer = http_request_timer("/alive");

    StatusCode::OK
}

/// This is the handler for the /metrics path
#[tracing::instrument]
async fn metrics() -> impl IntoResponse {
    record_http_request("/metrics");
    let _timer = http_request_timer("/metrics");

    match METRICS_HANDLE.get().and_then(Option::as_ref) {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to get the metrics handle".to_string(),
        ),
    }
}

/// Active alerts as cards, ages computed at request time
async fn view(State(feed): State<Arc<AlertFeed>>) -> Json<FeedView> {
    record_http_request("/alerts");
    let _timer = http_request_timer("/alerts");

    Json(feed.view(chrono::Utc::now()))
}

async fn all(State(feed): State<Arc<AlertFeed>>) -> Json<Vec<Alert>> {
    record_http_request("/alerts/all");
    let _timer = http_request_timer("/alerts/all");

    Json(feed.alerts())
}

/// Kick off a refresh without waiting for it
async fn refresh(State(feed): State<Arc<AlertFeed>>) -> StatusCode {
    record_http_request("/alerts/refresh");
    let _timer = http_request_timer("/alerts/refresh");

    tokio::spawn(async move {
        feed.refresh().await;
    });

    StatusCode::ACCEPTED
}

#[derive(Serialize)]
struct DismissAllResponse {
    dismissed: usize,
}

async fn dismiss_all(State(feed): State<Arc<AlertFeed>>) -> Json<DismissAllResponse> {
    record_http_request("/alerts/dismiss-all");
    let _timer = http_request_timer("/alerts/dismiss-all");

    Json(DismissAllResponse {
        dismissed: feed.dismiss_all(),
    })
}

async fn dismiss(State(feed): State<Arc<AlertFeed>>, Path(id): Path<String>) -> StatusCode {
    record_http_request("/alerts/{id}/dismiss");
    let _timer = http_request_timer("/alerts/{id}/dismiss");

    match feed.dismiss(&id) {
        Dismissal::Dismissed | Dismissal::AlreadyDismissed => StatusCode::NO_CONTENT,
        Dismissal::NotFound => StatusCode::NOT_FOUND,
    }
}

/// Send the browser to the alert's action link
async fn action(State(feed): State<Arc<AlertFeed>>, Path(id): Path<String>) -> Response {
    record_http_request("/alerts/{id}/action");
    let _timer = http_request_timer("/alerts/{id}/action");

    match feed.action_url(&id) {
        Some(url) => Redirect::to(&url).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

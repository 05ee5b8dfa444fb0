use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use shared::{
    error::ApiError,
    protocol::{ContactReceipt, ContactSubmission},
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod contact;
mod content;

use config::load_settings;
use contact::ContactInbox;
use content::{ApiFailure, ContentStore, Section};

struct AppState {
    content: ContentStore,
    inbox: ContactInbox,
    max_contact_bytes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let state = Arc::new(AppState {
        content: ContentStore::new(settings.content_root),
        inbox: ContactInbox::default(),
        max_contact_bytes: settings.max_contact_bytes,
    });
    let content_root = state.content.root().display().to_string();
    if !state.content.root().is_dir() {
        warn!(%content_root, "content root does not exist; every content request will return 404");
    }
    let app = build_router(state);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, %content_root, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let contact_limit = RequestBodyLimitLayer::new(state.max_contact_bytes);
    Router::new()
        .route("/healthz", get(healthz))
        .route("/pages/:name", get(page))
        .route("/components/:name", get(component))
        .route("/data/projects.json", get(projects))
        .route("/contact", post(submit_contact).layer(contact_limit))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn page(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Html<String>, ApiFailure> {
    state.content.fragment(Section::Pages, &name).await.map(Html)
}

async fn component(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Html<String>, ApiFailure> {
    state
        .content
        .fragment(Section::Components, &name)
        .await
        .map(Html)
}

async fn projects(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiFailure> {
    let body = state.content.projects().await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

async fn submit_contact(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<ContactSubmission>,
) -> Result<Json<ContactReceipt>, ApiFailure> {
    state
        .inbox
        .accept(submission)
        .map(Json)
        .map_err(|err| (StatusCode::BAD_REQUEST, Json(ApiError::from(err))))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, header};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::info;

use crate::registry::Registry;
use crate::settings::Settings;

use super::models::{
    ErrorResponse, LanguagePair, PicTransRequest, PicTransResponse, UploadRequest, UploadResponse,
};
use super::state::ServerState;
use super::translate::{ServerError, pic_trans_request, upload_request};

type HandlerError = (StatusCode, Json<ErrorResponse>);

pub async fn run_server(settings: Settings, registry: Registry, addr: String) -> Result<()> {
    let files_route = settings
        .store_url
        .starts_with('/')
        .then(|| format!("{}/:name", settings.store_url));
    let state = Arc::new(ServerState { settings, registry });
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/language_pairs", get(language_pairs))
        .route("/pic_trans", post(pic_trans))
        .route("/upload_image", post(upload_image));
    if let Some(route) = files_route {
        app = app.route(&route, get(stored_file));
    }
    let app = app
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("failed to bind server address")?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert("access-control-allow-methods", HeaderValue::from_static("GET,POST,OPTIONS"));
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
}

fn into_handler_error(err: ServerError) -> HandlerError {
    (err.status, Json(ErrorResponse { error: err.message }))
}

fn task_failed(err: tokio::task::JoinError) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: format!("server task failed: {}", err),
        }),
    )
}

async fn pic_trans(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<PicTransRequest>,
) -> Result<Json<PicTransResponse>, HandlerError> {
    let handle = tokio::runtime::Handle::current();
    let result = tokio::task::spawn_blocking(move || {
        handle.block_on(pic_trans_request(state.as_ref(), payload))
    })
    .await
    .map_err(task_failed)?;
    result.map(Json).map_err(into_handler_error)
}

async fn upload_image(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, HandlerError> {
    upload_request(state.as_ref(), payload)
        .await
        .map(Json)
        .map_err(into_handler_error)
}

async fn language_pairs(State(state): State<Arc<ServerState>>) -> Json<Vec<LanguagePair>> {
    let pairs = state
        .registry
        .language_pairs()
        .into_iter()
        .map(|(from, to)| LanguagePair {
            from_lan: from.code().to_string(),
            to_lan: to.code().to_string(),
        })
        .collect();
    Json(pairs)
}

async fn stored_file(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> Result<Response<Body>, HandlerError> {
    let internal = |err: anyhow::Error| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("{:#}", err),
            }),
        )
    };
    let store = state.registry.store().await.map_err(internal)?;
    let url = format!("{}/{}", state.settings.store_url, name);
    let bytes = store.fetch(&url).await.map_err(|err| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("{:#}", err),
            }),
        )
    })?;
    let Some(bytes) = bytes else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("{} not found", name),
            }),
        ));
    };
    let mime = match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => "image/png",
    };
    let mut response = Response::new(Body::from(bytes));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(mime));
    Ok(response)
}

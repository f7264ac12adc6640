//! HTTP API layer exposing the class hierarchy and the admin file flow.

use axum::{
    extract::{rejection::QueryRejection, DefaultBodyLimit, Path, Query, State},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use class_portal_core::{
    auth::{TokenIssuer, TokenVerifier},
    blob::BlobStorage,
    model::{CategoryDoc, ClassDoc, FileRecord, SubjectDoc},
    storage::ClassStore,
    PortalError,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

pub mod admin;
pub mod auth_middleware;
pub mod error;
pub mod uploads;

use auth_middleware::require_admin;
use error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<ClassStore>>,
    pub blobs: Arc<dyn BlobStorage>,
    pub issuer: Arc<TokenIssuer>,
    pub verifier: Arc<dyn TokenVerifier>,
    /// Prefix for generated file links, without a trailing slash.
    pub public_base_url: String,
    pub max_upload_bytes: usize,
    /// Include fault details in 500 bodies.
    pub expose_errors: bool,
}

impl AppState {
    pub fn error(&self, err: impl Into<PortalError>) -> ApiError {
        ApiError::new(err.into(), self.expose_errors)
    }

    /// Malformed JSON, query strings and forms answer with the same
    /// `{message}` body as every other fault.
    pub fn rejected(&self, rejection: impl std::fmt::Display) -> ApiError {
        self.error(PortalError::bad_request(rejection.to_string()))
    }

    pub fn file_url(&self, stored_name: &str) -> String {
        format!("{}/uploads/{}", self.public_base_url, stored_name)
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/admin/files", get(admin::list_files))
        .route(
            "/api/admin/files/{file_id}",
            put(admin::update_file).delete(admin::delete_file),
        )
        .route(
            "/api/admin/upload",
            post(admin::upload).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .route_layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            require_admin,
        ));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/classes", get(list_classes))
        .route("/api/classes/{class_id}", get(get_class))
        .route(
            "/api/classes/{class_id}/subjects/{subject_name}",
            get(get_subject),
        )
        .route(
            "/api/classes/{class_id}/subjects/{subject_name}/categories",
            get(list_categories),
        )
        .route(
            "/api/classes/{class_id}/subjects/{subject_name}/categories/{category_type}",
            get(get_category),
        )
        .route(
            "/api/classes/{class_id}/subjects/{subject_name}/categories/{category_type}/files",
            get(list_files),
        )
        .route("/api/admin/login", post(admin::login))
        .route("/uploads/{filename}", get(uploads::serve_upload))
        .merge(protected)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn class_id(raw: &str) -> Result<Uuid, PortalError> {
    Uuid::parse_str(raw).map_err(|_| PortalError::ClassNotFound)
}

#[derive(Deserialize)]
struct ListParams {
    view: Option<String>,
}

async fn list_classes(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Response {
    let params = match params {
        Ok(Query(params)) => params,
        Err(rejection) => return state.rejected(rejection).into_response(),
    };
    let store = state.store.read().await;
    match params.view.as_deref() {
        Some("summary") => Json(store.summaries()).into_response(),
        _ => Json(store.classes().to_vec()).into_response(),
    }
}

async fn get_class(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<ClassDoc>, ApiError> {
    let id = class_id(&raw_id).map_err(|e| state.error(e))?;
    let store = state.store.read().await;
    let class = store.class(id).map_err(|e| state.error(e))?;
    Ok(Json(class.clone()))
}

async fn get_subject(
    State(state): State<AppState>,
    Path((raw_id, subject)): Path<(String, String)>,
) -> Result<Json<SubjectDoc>, ApiError> {
    let id = class_id(&raw_id).map_err(|e| state.error(e))?;
    let store = state.store.read().await;
    let subject = store.subject(id, &subject).map_err(|e| state.error(e))?;
    Ok(Json(subject.clone()))
}

async fn list_categories(
    State(state): State<AppState>,
    Path((raw_id, subject)): Path<(String, String)>,
) -> Result<Json<Vec<CategoryDoc>>, ApiError> {
    let id = class_id(&raw_id).map_err(|e| state.error(e))?;
    let store = state.store.read().await;
    let categories = store.categories(id, &subject).map_err(|e| state.error(e))?;
    Ok(Json(categories.to_vec()))
}

async fn get_category(
    State(state): State<AppState>,
    Path((raw_id, subject, category)): Path<(String, String, String)>,
) -> Result<Json<CategoryDoc>, ApiError> {
    let id = class_id(&raw_id).map_err(|e| state.error(e))?;
    let store = state.store.read().await;
    let category = store
        .category(id, &subject, &category)
        .map_err(|e| state.error(e))?;
    Ok(Json(category.clone()))
}

async fn list_files(
    State(state): State<AppState>,
    Path((raw_id, subject, category)): Path<(String, String, String)>,
) -> Result<Json<Vec<FileRecord>>, ApiError> {
    let id = class_id(&raw_id).map_err(|e| state.error(e))?;
    let store = state.store.read().await;
    let files = store
        .files(id, &subject, &category)
        .map_err(|e| state.error(e))?;
    Ok(Json(files.to_vec()))
}

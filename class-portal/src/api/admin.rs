//! Admin endpoints: login, upload, rename/relocate, delete.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use class_portal_core::{
    blob,
    model::{FileEntry, FilePath, FileRecord},
    storage::{FileUpdate, PathFilter},
    PortalError,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::{auth_middleware::AdminContext, error::ApiError, AppState};

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    token: String,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    message: String,
    id: Uuid,
}

pub async fn login(
    State(state): State<AppState>,
    req: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(req) = req.map_err(|e| state.rejected(e))?;
    if req.username.is_empty() || req.password.is_empty() {
        return Err(state.error(PortalError::bad_request(
            "username and password are required",
        )));
    }
    match state.issuer.login(&req.username, &req.password) {
        Ok(token) => {
            info!(username = %req.username, "admin logged in");
            Ok(Json(LoginResponse { token }))
        }
        Err(err) => {
            warn!(username = %req.username, "admin login rejected");
            Err(state.error(err))
        }
    }
}

pub async fn list_files(State(state): State<AppState>) -> Json<Vec<FileEntry>> {
    Json(state.store.read().await.file_index())
}

/// Fields collected from the upload form.
#[derive(Default)]
struct UploadForm {
    class_name: Option<String>,
    subject: Option<String>,
    category: Option<String>,
    file: Option<(String, Vec<u8>)>,
}

impl UploadForm {
    fn into_parts(self) -> Result<(FilePath, String, Vec<u8>), PortalError> {
        let required = |v: Option<String>, field: &str| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| PortalError::bad_request(format!("{field} is required")))
        };
        let path = FilePath {
            class_name: required(self.class_name, "className")?,
            subject: required(self.subject, "subject")?,
            category: required(self.category, "category")?,
        };
        let (name, data) = self
            .file
            .ok_or_else(|| PortalError::bad_request("file is required"))?;
        Ok((path, name, data))
    }
}

fn multipart_error(err: MultipartError, limit: usize) -> PortalError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        PortalError::bad_request(format!("file exceeds the {limit} byte upload limit"))
    } else {
        PortalError::bad_request(format!("invalid multipart data: {}", err.body_text()))
    }
}

/// Last path component of a client-supplied file name.
fn display_name(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if name.is_empty() {
        "file".to_string()
    } else {
        name.to_string()
    }
}

async fn read_form(multipart: &mut Multipart, limit: usize) -> Result<UploadForm, PortalError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = display_name(field.file_name().unwrap_or_default());
                let data = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                form.file = Some((file_name, data.to_vec()));
            }
            "className" | "subject" | "category" => {
                let value = field.text().await.map_err(|e| multipart_error(e, limit))?;
                match name.as_str() {
                    "className" => form.class_name = Some(value),
                    "subject" => form.subject = Some(value),
                    _ => form.category = Some(value),
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

pub async fn upload(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<FileEntry>), ApiError> {
    let mut multipart = multipart.map_err(|e| state.rejected(e))?;
    let form = read_form(&mut multipart, state.max_upload_bytes)
        .await
        .map_err(|e| state.error(e))?;
    let (path, file_name, data) = form.into_parts().map_err(|e| state.error(e))?;

    let now = Utc::now();
    let stored_name = blob::stored_name(&file_name, now);
    state
        .blobs
        .put(&stored_name, &data)
        .await
        .map_err(|e| state.error(e))?;

    let record = FileRecord {
        id: Uuid::new_v4(),
        file_name,
        file_url: state.file_url(&stored_name),
        stored_name: stored_name.clone(),
        uploaded_at: now,
    };
    let result = state.store.write().await.add_file(&path, record);
    match result {
        Ok(entry) => {
            info!(
                admin = %admin.username,
                file_id = %entry.file.id,
                class = %path.class_name,
                subject = %path.subject,
                category = %path.category,
                size = data.len(),
                "file uploaded"
            );
            Ok((StatusCode::CREATED, Json(entry)))
        }
        Err(err) => {
            if let Err(cleanup) = state.blobs.delete(&stored_name).await {
                warn!(key = %stored_name, error = %cleanup, "failed to remove orphaned upload");
            }
            Err(state.error(err))
        }
    }
}

fn file_id(raw: &str) -> Result<Uuid, PortalError> {
    Uuid::parse_str(raw).map_err(|_| PortalError::FileNotFound)
}

pub async fn update_file(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(raw_id): Path<String>,
    update: Result<Json<FileUpdate>, JsonRejection>,
) -> Result<Json<FileEntry>, ApiError> {
    let Json(update) = update.map_err(|e| state.rejected(e))?;
    let id = file_id(&raw_id).map_err(|e| state.error(e))?;
    if update.is_empty() {
        let store = state.store.read().await;
        let entry = store
            .find_file(id, &PathFilter::default())
            .map_err(|e| state.error(e))?;
        return Ok(Json(entry));
    }
    let entry = state
        .store
        .write()
        .await
        .update_file(id, &update)
        .map_err(|e| state.error(e))?;
    info!(
        admin = %admin.username,
        file_id = %id,
        class = %entry.path.class_name,
        subject = %entry.path.subject,
        category = %entry.path.category,
        "file updated"
    );
    Ok(Json(entry))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminContext>,
    Path(raw_id): Path<String>,
    filter: Result<Query<PathFilter>, QueryRejection>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let Query(filter) = filter.map_err(|e| state.rejected(e))?;
    let id = file_id(&raw_id).map_err(|e| state.error(e))?;
    let removed = state
        .store
        .write()
        .await
        .remove_file(id, &filter.normalized())
        .map_err(|e| state.error(e))?;
    info!(admin = %admin.username, file_id = %id, "file deleted");

    if let Err(err) = state.blobs.delete(&removed.file.stored_name).await {
        warn!(
            file_id = %id,
            key = %removed.file.stored_name,
            error = %err,
            "failed to delete stored bytes"
        );
    }
    Ok(Json(DeleteResponse {
        message: "File deleted successfully".to_string(),
        id,
    }))
}

#[cfg(test)]
mod tests {
    use super::super::{router, tests::*};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use tower::util::ServiceExt;

    fn uploads_in(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir.join("uploads")).unwrap().count()
    }

    #[tokio::test]
    async fn login_rejects_wrong_credentials() {
        let tempdir = tempfile::tempdir().unwrap();
        let app = router(test_state(tempdir.path()));
        for (body, status) in [
            (json!({ "username": "admin", "password": "nope" }), StatusCode::UNAUTHORIZED),
            (json!({ "username": "other", "password": "pw" }), StatusCode::UNAUTHORIZED),
            (json!({ "username": "admin" }), StatusCode::BAD_REQUEST),
        ] {
            let req = Request::builder()
                .method("POST")
                .uri("/api/admin/login")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), status);
            assert!(json_body(resp).await.get("token").is_none());
        }
    }

    #[tokio::test]
    async fn upload_without_token_changes_nothing() {
        let tempdir = tempfile::tempdir().unwrap();
        let state = test_state(tempdir.path());
        let app = router(state.clone());

        for auth in [None, Some("Bearer garbage")] {
            let mut req = Request::builder()
                .method("POST")
                .uri("/api/admin/upload")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                );
            if let Some(auth) = auth {
                req = req.header("Authorization", auth);
            }
            let req = req
                .body(multipart_body(
                    &[("className", "Class 6"), ("subject", "Maths"), ("category", "Notes")],
                    Some(("a.pdf", &b"data"[..])),
                ))
                .unwrap();
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }

        assert!(state.store.read().await.file_index().is_empty());
        assert_eq!(uploads_in(tempdir.path()), 0);
    }

    #[tokio::test]
    async fn upload_reuses_existing_nodes() {
        let tempdir = tempfile::tempdir().unwrap();
        let state = test_state(tempdir.path());
        let app = router(state.clone());
        let token = login(&app).await;

        let first = upload(&app, &token, ("Class 10", "Maths", "Notes"), "ch1.pdf", b"one").await;
        let second = upload(&app, &token, ("Class 10", "Maths", "Notes"), "ch2.pdf", b"two").await;
        assert_eq!(first["classId"], second["classId"]);
        assert!(first["fileUrl"]
            .as_str()
            .unwrap()
            .starts_with("http://localhost:5000/uploads/"));

        let store = state.store.read().await;
        assert_eq!(store.classes().len(), 1);
        let class = &store.classes()[0];
        assert_eq!(class.subjects.len(), 1);
        assert_eq!(class.subjects[0].categories.len(), 1);
        assert_eq!(class.subjects[0].categories[0].files.len(), 2);
        assert_eq!(uploads_in(tempdir.path()), 2);
    }

    #[tokio::test]
    async fn upload_requires_every_field() {
        let tempdir = tempfile::tempdir().unwrap();
        let state = test_state(tempdir.path());
        let app = router(state.clone());
        let token = login(&app).await;

        let cases: Vec<(Vec<(&str, &str)>, Option<(&str, &[u8])>, &str)> = vec![
            (
                vec![("subject", "Maths"), ("category", "Notes")],
                Some(("a.pdf", &b"x"[..])),
                "className is required",
            ),
            (
                vec![("className", "Class 6"), ("subject", " "), ("category", "Notes")],
                Some(("a.pdf", &b"x"[..])),
                "subject is required",
            ),
            (
                vec![("className", "Class 6"), ("subject", "Maths"), ("category", "Notes")],
                None,
                "file is required",
            ),
        ];
        for (fields, file, message) in cases {
            let req = Request::builder()
                .method("POST")
                .uri("/api/admin/upload")
                .header("Authorization", format!("Bearer {token}"))
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(multipart_body(&fields, file))
                .unwrap();
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(resp).await["message"], message);
        }
        assert!(state.store.read().await.classes().is_empty());
        assert_eq!(uploads_in(tempdir.path()), 0);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let tempdir = tempfile::tempdir().unwrap();
        let mut state = test_state(tempdir.path());
        state.max_upload_bytes = 256;
        let app = router(state.clone());
        let token = login(&app).await;

        let big = vec![b'x'; 4096];
        let req = Request::builder()
            .method("POST")
            .uri("/api/admin/upload")
            .header("Authorization", format!("Bearer {token}"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart_body(
                &[("className", "Class 6"), ("subject", "Maths"), ("category", "Notes")],
                Some(("big.bin", big.as_slice())),
            ))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
        assert!(state.store.read().await.classes().is_empty());
        assert_eq!(uploads_in(tempdir.path()), 0);
    }

    #[tokio::test]
    async fn delete_removes_record_and_bytes() {
        let tempdir = tempfile::tempdir().unwrap();
        let app = router(test_state(tempdir.path()));
        let token = login(&app).await;

        let keep = upload(&app, &token, ("Class 8", "English", "Notes"), "keep.pdf", b"k").await;
        let gone = upload(&app, &token, ("Class 8", "English", "Notes"), "gone.pdf", b"g").await;
        let class_id = gone["classId"].as_str().unwrap();
        let gone_id = gone["id"].as_str().unwrap();
        assert_eq!(uploads_in(tempdir.path()), 2);

        let req = Request::builder()
            .method("DELETE")
            .uri(format!(
                "/api/admin/files/{gone_id}?className=Class%208&subject=English&category=Notes"
            ))
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["id"], gone_id);

        let req = Request::builder()
            .uri(format!(
                "/api/classes/{class_id}/subjects/English/categories/Notes/files"
            ))
            .body(Body::empty())
            .unwrap();
        let files = json_body(app.clone().oneshot(req).await.unwrap()).await;
        let ids: Vec<_> = files
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["id"].clone())
            .collect();
        assert_eq!(ids, vec![keep["id"].clone()]);
        assert_eq!(uploads_in(tempdir.path()), 1);

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/api/admin/files/{gone_id}"))
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(resp).await["message"], "File not found");
    }

    #[tokio::test]
    async fn delete_survives_missing_bytes() {
        let tempdir = tempfile::tempdir().unwrap();
        let app = router(test_state(tempdir.path()));
        let token = login(&app).await;
        let entry = upload(&app, &token, ("Class 6", "Maths", "Notes"), "a.pdf", b"a").await;
        let stored = entry["storedName"].as_str().unwrap();
        std::fs::remove_file(tempdir.path().join("uploads").join(stored)).unwrap();

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/api/admin/files/{}", entry["id"].as_str().unwrap()))
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn delete_with_wrong_hint_reports_level() {
        let tempdir = tempfile::tempdir().unwrap();
        let app = router(test_state(tempdir.path()));
        let token = login(&app).await;
        let entry = upload(&app, &token, ("Class 6", "Maths", "Notes"), "a.pdf", b"a").await;
        let id = entry["id"].as_str().unwrap();

        for (query, message) in [
            ("className=Class%205", "Class not found"),
            ("className=Class%206&subject=Art", "Subject not found"),
            ("className=Class%206&subject=Maths&category=Tests", "Category not found"),
        ] {
            let req = Request::builder()
                .method("DELETE")
                .uri(format!("/api/admin/files/{id}?{query}"))
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap();
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
            assert_eq!(json_body(resp).await["message"], message);
        }
    }

    #[tokio::test]
    async fn update_renames_and_relocates() {
        let tempdir = tempfile::tempdir().unwrap();
        let state = test_state(tempdir.path());
        let app = router(state.clone());
        let token = login(&app).await;
        let entry = upload(&app, &token, ("Class 9", "Maths", "Notes"), "a.pdf", b"a").await;
        let id = entry["id"].as_str().unwrap();

        let req = Request::builder()
            .method("PUT")
            .uri(format!("/api/admin/files/{id}"))
            .header("Authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "fileName": "Algebra.pdf", "category": "NCERT-Solutions" }).to_string(),
            ))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let updated = json_body(resp).await;
        assert_eq!(updated["id"], entry["id"]);
        assert_eq!(updated["fileName"], "Algebra.pdf");
        assert_eq!(updated["category"], "NCERT-Solutions");
        assert_eq!(updated["fileUrl"], entry["fileUrl"]);

        let req = Request::builder()
            .uri("/api/admin/files")
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let listed = json_body(app.clone().oneshot(req).await.unwrap()).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["category"], "NCERT-Solutions");
        assert_eq!(listed[0]["className"], "Class 9");
    }

    #[tokio::test]
    async fn update_unknown_file_is_not_found() {
        let tempdir = tempfile::tempdir().unwrap();
        let app = router(test_state(tempdir.path()));
        let token = login(&app).await;
        for id in [uuid::Uuid::new_v4().to_string(), "bogus".to_string()] {
            let req = Request::builder()
                .method("PUT")
                .uri(format!("/api/admin/files/{id}"))
                .header("Authorization", format!("Bearer {token}"))
                .header("content-type", "application/json")
                .body(Body::from(json!({ "fileName": "x.pdf" }).to_string()))
                .unwrap();
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn malformed_requests_get_json_messages() {
        let tempdir = tempfile::tempdir().unwrap();
        let app = router(test_state(tempdir.path()));
        let token = login(&app).await;
        let file = uuid::Uuid::new_v4();

        let requests = [
            Request::builder()
                .method("POST")
                .uri("/api/admin/login")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
            Request::builder()
                .method("POST")
                .uri("/api/admin/login")
                .body(Body::from(json!({ "username": "admin", "password": "pw" }).to_string()))
                .unwrap(),
            Request::builder()
                .method("PUT")
                .uri(format!("/api/admin/files/{file}"))
                .header("Authorization", format!("Bearer {token}"))
                .header("content-type", "application/json")
                .body(Body::from("[1, 2"))
                .unwrap(),
            Request::builder()
                .method("POST")
                .uri("/api/admin/upload")
                .header("Authorization", format!("Bearer {token}"))
                .header("content-type", "text/plain")
                .body(Body::from("file"))
                .unwrap(),
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/admin/files/{file}?className=a&className=b"))
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        ];
        for req in requests {
            let uri = req.uri().clone();
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
            let body = json_body(resp).await;
            assert!(!body["message"].as_str().unwrap().is_empty(), "{uri}");
        }
    }

    #[tokio::test]
    async fn admin_listing_needs_token() {
        let tempdir = tempfile::tempdir().unwrap();
        let app = router(test_state(tempdir.path()));
        let req = Request::builder()
            .uri("/api/admin/files")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(resp).await["message"], "Unauthorized");
    }

    #[test]
    fn display_name_strips_client_paths() {
        assert_eq!(super::display_name("C:\\Users\\me\\notes.pdf"), "notes.pdf");
        assert_eq!(super::display_name("dir/notes.pdf"), "notes.pdf");
        assert_eq!(super::display_name(""), "file");
    }
}

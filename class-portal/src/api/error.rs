use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use class_portal_core::PortalError;
use serde::Serialize;

/// JSON error body: `{ "message": ..., "error": ... }`.
#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// A [`PortalError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError {
    err: PortalError,
    expose_details: bool,
}

impl ApiError {
    pub fn new(err: PortalError, expose_details: bool) -> Self {
        Self {
            err,
            expose_details,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.err {
            PortalError::ClassNotFound
            | PortalError::SubjectNotFound
            | PortalError::CategoryNotFound
            | PortalError::FileNotFound => StatusCode::NOT_FOUND,
            PortalError::BadRequest(_) => StatusCode::BAD_REQUEST,
            PortalError::Unauthorized => StatusCode::UNAUTHORIZED,
            PortalError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PortalError> for ApiError {
    fn from(err: PortalError) -> Self {
        Self::new(err, true)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self.err {
            PortalError::Storage(err) => {
                tracing::error!(error = ?err, "request failed");
                ErrorBody {
                    message: "Internal server error".to_string(),
                    error: self.expose_details.then(|| format!("{err:#}")),
                }
            }
            other => ErrorBody {
                message: other.to_string(),
                error: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

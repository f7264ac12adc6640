use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use class_portal_core::{auth::TokenVerifier, PortalError};
use std::sync::Arc;

use super::error::ApiError;

/// Admin identity proven by a verified bearer token.
#[derive(Clone, Debug)]
pub struct AdminContext {
    pub username: String,
}

/// Extract the admin context from the `Authorization` header.
pub async fn extract_admin_context(
    headers: &HeaderMap,
    verifier: &dyn TokenVerifier,
) -> Option<AdminContext> {
    let auth = headers.get("Authorization")?.to_str().ok()?;
    let token = auth.strip_prefix("Bearer ")?.trim();
    let claims = verifier.verify(token).await?;
    Some(AdminContext {
        username: claims.sub,
    })
}

/// Middleware guarding admin routes. Rejects before the handler runs, so
/// the request body is never read without a valid token.
pub async fn require_admin(
    State(verifier): State<Arc<dyn TokenVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(admin) = extract_admin_context(request.headers(), verifier.as_ref()).await else {
        tracing::debug!(path = %request.uri().path(), "rejected admin request without valid token");
        return Err(PortalError::Unauthorized.into());
    };

    request.extensions_mut().insert(admin);

    Ok(next.run(request).await)
}

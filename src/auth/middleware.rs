use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json, RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;

use super::AuthContext;
use crate::app::AppState;
use crate::error::ErrorResponse;

/// Extractor that requires authentication
/// Use this in route handlers to require a valid JWT
///
/// Example:
/// ```ignore
/// async fn protected_route(auth: RequireAuth) -> impl IntoResponse {
///     format!("Hello, user {}", auth.user_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthContext);

impl std::ops::Deref for RequireAuth {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authorization token"),
            AuthError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
        };

        let body = ErrorResponse {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            field: None,
            request_id: None,
        };

        (status, Json(body)).into_response()
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Dev bypass is resolved at verifier construction and only ever
        // active in the dev environment
        if state.verifier.dev_bypass() {
            return Ok(RequireAuth(state.verifier.dev_identity()));
        }

        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AuthError::MissingToken)?;

        let claims = state.verifier.verify_token(bearer.token()).map_err(|e| {
            tracing::warn!(error = %e, "JWT verification failed");
            AuthError::InvalidToken(e.to_string())
        })?;

        let mut context = AuthContext::from_claims(&claims).map_err(|e| {
            tracing::warn!(error = %e, "Failed to build auth context");
            AuthError::InvalidToken(e.to_string())
        })?;

        // First registered user is promoted to admin; settles permanently
        // once any admin exists
        if let Err(e) = state
            .bootstrap
            .promote_if_first(&state.db, &mut context)
            .await
        {
            tracing::warn!(error = %e, "Admin bootstrap check failed");
        }

        Ok(RequireAuth(context))
    }
}

//! Request extractors.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use engine_core::Error;
use tracing::warn;

use crate::response::ApiError;
use crate::state::AppState;

/// Proof that the request carries the admin bearer token.
///
/// Always granted when no token is configured.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if !state.auth_enabled() {
            return Ok(AdminAuth);
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        match token {
            Some(t) if t == &*state.admin_token => Ok(AdminAuth),
            Some(_) => {
                warn!("Rejected admin request with invalid token");
                Err(Error::unauthorized("invalid admin token").into())
            }
            None => Err(Error::unauthorized("missing bearer token").into()),
        }
    }
}

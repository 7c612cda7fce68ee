// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Requests without a bearer token pass through anonymously; handlers that
//! need a caller use the [`Auth`](super::Auth) extractor, which rejects them.
//! Requests with a bearer token are verified and resolved to a [`Principal`]
//! before any handler runs, and rejected with a generic `401` otherwise.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/api/users/me", get(get_current_user))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), authenticate))
//!     .with_state(state);
//! ```

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::location::{self, LocationHint, RawLocation};
use super::{AuthError, IdentityResolver, TokenVerifier};
use crate::error::ApiError;
use crate::models::Principal;
use crate::state::AppState;

/// Largest body buffered when looking for a location hint.
pub const MAX_LOCATION_BODY_BYTES: usize = 64 * 1024;

/// Token verification followed by principal resolution.
#[derive(Clone)]
pub struct Authenticator {
    verifier: Arc<TokenVerifier>,
    resolver: IdentityResolver,
}

impl Authenticator {
    pub fn new(verifier: TokenVerifier, resolver: IdentityResolver) -> Self {
        Self {
            verifier: Arc::new(verifier),
            resolver,
        }
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub async fn authenticate(
        &self,
        token: &str,
        location: Option<LocationHint>,
    ) -> Result<Principal, AuthError> {
        let claims = self.verifier.verify(token).await?;

        // Storage calls block; keep them off the async workers.
        let resolver = self.resolver.clone();
        tokio::task::spawn_blocking(move || resolver.resolve(&claims, location))
            .await
            .map_err(|e| AuthError::ProvisioningFailed(format!("resolver task failed: {e}")))?
    }
}

/// Token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively. Any other scheme, or a header
/// that is not valid UTF-8, counts as no credential.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Authentication middleware function.
pub async fn authenticate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()).map(str::to_owned) else {
        return next.run(request).await;
    };

    let (mut request, location) = match extract_location(request).await {
        Ok(extracted) => extracted,
        Err(e) => return e.into_response(),
    };

    match state.authenticator.authenticate(&token, location).await {
        Ok(principal) => {
            tracing::debug!(principal_id = %principal.id, "Request authenticated");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => {
            let path = request.uri().path();
            if err.is_infrastructure() {
                tracing::error!(error = %err, error_code = err.error_code(), path, "Authentication failed");
            } else {
                tracing::warn!(error = %err, error_code = err.error_code(), path, "Authentication failed");
            }
            err.into_response()
        }
    }
}

/// Find a location hint, buffering and restoring the body if needed.
async fn extract_location(
    request: Request,
) -> Result<(Request, Option<LocationHint>), ApiError> {
    let found = location::from_headers(request.headers())
        .or_else(|| location::from_query(request.uri().query()));
    if let Some(raw) = found {
        return Ok((request, raw.into_hint()));
    }
    if !body_may_carry_location(request.headers()) {
        return Ok((request, None));
    }

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_LOCATION_BODY_BYTES)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Failed to buffer request body");
            ApiError::bad_request("Failed to read request body")
        })?;

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let hint = location::from_body(content_type, &bytes).and_then(RawLocation::into_hint);

    Ok((Request::from_parts(parts, Body::from(bytes)), hint))
}

/// Only bodies of a known, bounded length and a parseable type are read.
fn body_may_carry_location(headers: &HeaderMap) -> bool {
    let length = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());

    matches!(length, Some(len) if len > 0 && len <= MAX_LOCATION_BODY_BYTES)
        && location::is_supported_body(content_type)
}

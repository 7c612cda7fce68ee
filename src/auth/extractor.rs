// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the authenticated principal.
//!
//! Both read the [`Principal`] that the authentication middleware attached
//! to the request. Neither verifies tokens itself.
//!
//! ```rust,ignore
//! async fn my_handler(Auth(principal): Auth) -> impl IntoResponse {
//!     // principal is the caller's local record
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::AuthError;
use crate::models::Principal;

/// Requires an authenticated principal; rejects with a generic `401`.
pub struct Auth(pub Principal);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(Auth)
            .ok_or(AuthError::MissingCredential)
    }
}

/// The authenticated principal, if any. Never rejects.
pub struct OptionalAuth(pub Option<Principal>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(parts.extensions.get::<Principal>().cloned()))
    }
}

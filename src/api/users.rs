// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::Json;

use crate::auth::Auth;
use crate::models::PrincipalProfile;

/// Get the current authenticated user's profile.
///
/// The principal is provisioned on the first authenticated request, so this
/// endpoint always finds one for a valid token.
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    security(("bearer" = [])),
    params(
        ("X-User-Latitude" = Option<f64>, Header, description = "Current latitude"),
        ("X-User-Longitude" = Option<f64>, Header, description = "Current longitude")
    ),
    responses(
        (status = 200, description = "User profile", body = PrincipalProfile),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_current_user(Auth(principal): Auth) -> Json<PrincipalProfile> {
    Json(principal.into())
}

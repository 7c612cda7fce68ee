// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Every variant renders as the same `401 Unauthorized` body. The specific
//! kind is only available through [`AuthError::error_code`] and `Display`,
//! which are meant for logs.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Generic message returned to callers for every authentication failure.
pub const GENERIC_AUTH_FAILURE: &str = "Authentication failed";

/// Authentication error type.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// Handler requires a principal but the request carried no bearer token
    #[error("Authorization header with a bearer token is required")]
    MissingCredential,
    /// Token is not a well-formed JWT, or required claims are missing
    #[error("Token is malformed")]
    MalformedToken,
    /// No key in the provider's key set matches the token's `kid`
    #[error("No matching key found in JWKS")]
    UnknownKey,
    /// Signature mismatch or unexpected algorithm
    #[error("Token signature is invalid")]
    BadSignature,
    /// Issuer claim differs from the configured issuer
    #[error("Token issuer is invalid")]
    BadIssuer,
    /// Audience claim does not contain the configured audience
    #[error("Token audience is invalid")]
    BadAudience,
    /// Expiry claim is not in the future
    #[error("Token has expired")]
    Expired,
    /// Not-before claim is still in the future
    #[error("Token is not valid yet")]
    NotYetValid,
    /// Key set could not be fetched or parsed
    #[error("Failed to fetch JWKS: {0}")]
    FetchError(String),
    /// Principal lookup or creation failed
    #[error("Failed to provision principal: {0}")]
    ProvisioningFailed(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: &'static str,
    error_code: &'static str,
}

impl AuthError {
    /// Internal error code, for logs only.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "missing_credential",
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnknownKey => "unknown_key",
            AuthError::BadSignature => "bad_signature",
            AuthError::BadIssuer => "bad_issuer",
            AuthError::BadAudience => "bad_audience",
            AuthError::Expired => "expired",
            AuthError::NotYetValid => "not_yet_valid",
            AuthError::FetchError(_) => "fetch_error",
            AuthError::ProvisioningFailed(_) => "provisioning_failed",
        }
    }

    /// Whether the failure came from infrastructure rather than the credential.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AuthError::FetchError(_) | AuthError::ProvisioningFailed(_)
        )
    }

    /// HTTP status for this error. Always `401`.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: GENERIC_AUTH_FAILURE,
            error_code: "authentication_failed",
        });
        let mut response = (status, body).into_response();
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(error: AuthError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn every_kind_renders_the_same_generic_401() {
        let kinds = vec![
            AuthError::MissingCredential,
            AuthError::MalformedToken,
            AuthError::UnknownKey,
            AuthError::BadSignature,
            AuthError::BadIssuer,
            AuthError::BadAudience,
            AuthError::Expired,
            AuthError::NotYetValid,
            AuthError::FetchError("connection refused".to_string()),
            AuthError::ProvisioningFailed("disk full".to_string()),
        ];

        for kind in kinds {
            let (status, body) = body_of(kind).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["error"], GENERIC_AUTH_FAILURE);
            assert_eq!(body["error_code"], "authentication_failed");
        }
    }

    #[tokio::test]
    async fn response_does_not_leak_detail() {
        let response = AuthError::FetchError("10.0.0.7 unreachable".to_string()).into_response();
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("10.0.0.7"));
        assert!(!text.contains("fetch"));
    }

    #[test]
    fn error_codes_distinguish_kinds_for_logs() {
        assert_eq!(AuthError::Expired.error_code(), "expired");
        assert_eq!(AuthError::BadIssuer.error_code(), "bad_issuer");
        assert!(AuthError::FetchError(String::new()).is_infrastructure());
        assert!(!AuthError::BadSignature.is_infrastructure());
    }
}

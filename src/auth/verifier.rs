// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. header parses and names a `kid`
//! 2. the `kid` resolves in the key set (one refresh on a miss)
//! 3. the header `alg` belongs to the key and the signature verifies
//! 4. `iss` equals the configured issuer
//! 5. `exp` is in the future and `nbf`, if present, is not
//! 6. `aud` contains the configured audience, if one is configured
//!
//! The audience is not checked by default: Clerk session tokens carry no
//! `aud` claim unless a custom JWT template adds one.

use std::collections::HashSet;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use tracing::instrument;

use super::claims::{ProviderClaims, VerifiedClaims};
use super::error::AuthError;
use super::jwks::KeySetCache;
use crate::config::AuthConfig;

pub struct TokenVerifier {
    keys: Arc<KeySetCache>,
    issuer: String,
    audience: Option<String>,
    leeway_secs: i64,
}

impl TokenVerifier {
    pub fn new(keys: Arc<KeySetCache>, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: None,
            leeway_secs: 0,
        }
    }

    pub fn from_config(keys: Arc<KeySetCache>, config: &AuthConfig) -> Self {
        let verifier = Self::new(keys, config.issuer.clone())
            .with_leeway_secs(i64::try_from(config.leeway.as_secs()).unwrap_or(i64::MAX));
        match &config.audience {
            Some(audience) => verifier.with_audience(audience.clone()),
            None => verifier,
        }
    }

    /// Require `aud` to contain `audience`.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Accept tokens up to `secs` past their expiry or before their `nbf`.
    pub fn with_leeway_secs(mut self, secs: i64) -> Self {
        self.leeway_secs = secs.max(0);
        self
    }

    pub fn key_set(&self) -> &Arc<KeySetCache> {
        &self.keys
    }

    /// Verify a bearer token and return its claims.
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        let header = decode_header(token).map_err(|e| {
            if names_unsupported_algorithm(token) {
                tracing::warn!("Token header names an unsupported algorithm");
                return AuthError::BadSignature;
            }
            tracing::debug!(error = %e, "Token header did not parse");
            AuthError::MalformedToken
        })?;

        let kid = header.kid.as_deref().ok_or_else(|| {
            tracing::debug!("Token header carries no kid");
            AuthError::UnknownKey
        })?;

        let key = self.keys.get(kid).await?;

        if !key.accepts(header.alg) {
            tracing::warn!(
                kid = %kid,
                alg = ?header.alg,
                expected = ?key.algorithms(),
                "Token algorithm does not match signing key"
            );
            return Err(AuthError::BadSignature);
        }

        // Signature only; claim checks run below in a fixed order.
        let mut validation = Validation::new(header.alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        let token_data = decode::<ProviderClaims>(token, key.decoding_key(), &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName
                | ErrorKind::MissingAlgorithm
                | ErrorKind::InvalidKeyFormat
                | ErrorKind::InvalidEcdsaKey
                | ErrorKind::InvalidRsaKey(_) => AuthError::BadSignature,
                _ => {
                    tracing::debug!(error = %e, "Token body did not decode");
                    AuthError::MalformedToken
                }
            })?;

        self.check_claims(token_data.claims, Utc::now())
    }

    fn check_claims(
        &self,
        claims: ProviderClaims,
        now: DateTime<Utc>,
    ) -> Result<VerifiedClaims, AuthError> {
        let issuer = claims
            .iss
            .filter(|iss| *iss == self.issuer)
            .ok_or(AuthError::BadIssuer)?;

        let exp = claims.exp.ok_or(AuthError::MalformedToken)?;
        if exp.saturating_add(self.leeway_secs) <= now.timestamp() {
            return Err(AuthError::Expired);
        }
        let expires_at = DateTime::from_timestamp(exp, 0).ok_or(AuthError::MalformedToken)?;
        if claims
            .nbf
            .is_some_and(|nbf| nbf > now.timestamp().saturating_add(self.leeway_secs))
        {
            return Err(AuthError::NotYetValid);
        }

        if let Some(expected) = &self.audience {
            if !claims.aud.as_ref().is_some_and(|aud| aud.contains(expected)) {
                return Err(AuthError::BadAudience);
            }
        }

        let subject = claims
            .sub
            .filter(|sub| !sub.is_empty())
            .ok_or(AuthError::MalformedToken)?;
        let email = claims.email.filter(|email| !email.trim().is_empty());

        Ok(VerifiedClaims::new(subject, email, expires_at, issuer))
    }
}

/// Whether the header is readable JSON whose `alg` is not a known algorithm,
/// `none` included.
fn names_unsupported_algorithm(token: &str) -> bool {
    let Some(segment) = token.split('.').next() else {
        return false;
    };
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(segment) else {
        return false;
    };
    let Ok(header) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
        return false;
    };
    header
        .get("alg")
        .and_then(serde_json::Value::as_str)
        .is_some_and(|alg| alg.parse::<Algorithm>().is_err())
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Raw claims as they appear in a Clerk session token.
///
/// Every field is optional so that a missing claim is reported by the
/// verifier as the check it fails, not as a deserialisation error.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ProviderClaims {
    /// Subject (user ID) - the canonical Clerk user identifier
    #[serde(default)]
    pub sub: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub iss: Option<String>,

    /// Expiration timestamp (seconds since epoch)
    #[serde(default)]
    pub exp: Option<i64>,

    /// Not-before timestamp (seconds since epoch)
    #[serde(default)]
    pub nbf: Option<i64>,

    #[serde(default)]
    pub aud: Option<Audience>,
}

/// `aud` is either a single string or a list of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, expected: &str) -> bool {
        match self {
            Audience::One(aud) => aud == expected,
            Audience::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// Claims of a token that passed signature, issuer and expiry checks.
///
/// Only the token verifier constructs this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    subject: String,
    email: Option<String>,
    expires_at: DateTime<Utc>,
    issuer: String,
}

impl VerifiedClaims {
    pub(crate) fn new(
        subject: String,
        email: Option<String>,
        expires_at: DateTime<Utc>,
        issuer: String,
    ) -> Self {
        Self {
            subject,
            email,
            expires_at,
            issuer,
        }
    }

    /// Provider-assigned subject identifier.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

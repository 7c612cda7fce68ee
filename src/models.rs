// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Data Models
//!
//! The local [`Principal`] record that every authenticated request is bound
//! to, and the API view of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::LocationHint;

// =============================================================================
// Principal
// =============================================================================

/// Local user record keyed by the identity provider's subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Principal {
    /// Local identifier (UUID v4)
    pub id: String,
    /// Provider subject. Unique and never changed after creation.
    pub subject: String,
    pub email: String,
    /// Local part of the email at creation time
    pub username: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    pub fn location(&self) -> Option<LocationHint> {
        LocationHint::new(self.latitude?, self.longitude?)
    }

    /// Whether `hint` differs from the stored coordinates.
    pub fn location_differs(&self, hint: &LocationHint) -> bool {
        self.latitude != Some(hint.latitude) || self.longitude != Some(hint.longitude)
    }

    pub fn set_location(&mut self, hint: LocationHint) {
        self.latitude = Some(hint.latitude);
        self.longitude = Some(hint.longitude);
        self.updated_at = Utc::now();
    }
}

/// Fields supplied when provisioning a principal. The store assigns the id
/// and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPrincipal {
    pub subject: String,
    pub email: String,
    pub username: String,
    pub location: Option<LocationHint>,
}

impl NewPrincipal {
    pub fn new(subject: impl Into<String>, email: impl Into<String>) -> Self {
        let email = email.into();
        Self {
            subject: subject.into(),
            username: username_from_email(&email),
            email,
            location: None,
        }
    }

    pub fn with_location(mut self, location: Option<LocationHint>) -> Self {
        self.location = location;
        self
    }

    /// Materialise the record with a fresh id and timestamps.
    pub fn into_principal(self) -> Principal {
        let now = Utc::now();
        Principal {
            id: uuid::Uuid::new_v4().to_string(),
            subject: self.subject,
            email: self.email,
            username: self.username,
            latitude: self.location.map(|l| l.latitude),
            longitude: self.location.map(|l| l.longitude),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Username derived from an email address: everything before the `@`.
pub fn username_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

// =============================================================================
// API views
// =============================================================================

/// Profile of the authenticated principal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct PrincipalProfile {
    /// Local principal id
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl From<Principal> for PrincipalProfile {
    fn from(principal: Principal) -> Self {
        Self {
            id: principal.id,
            username: principal.username,
            email: principal.email,
            latitude: principal.latitude,
            longitude: principal.longitude,
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified claims → local [`Principal`].
//!
//! The first verified request for a subject provisions its principal; later
//! requests look it up and, when they carry a location hint, record it.

use std::sync::Arc;

use super::{AuthError, LocationHint, VerifiedClaims};
use crate::models::{NewPrincipal, Principal};
use crate::storage::{PrincipalRepository, StorageError};

/// Domain of the email synthesized for subjects whose token has no email.
pub const PLACEHOLDER_EMAIL_DOMAIN: &str = "clerk.user";

/// Deterministic placeholder email for `subject`.
pub fn placeholder_email(subject: &str) -> String {
    format!("{subject}@{PLACEHOLDER_EMAIL_DOMAIN}")
}

#[derive(Clone)]
pub struct IdentityResolver {
    principals: Arc<dyn PrincipalRepository>,
}

impl IdentityResolver {
    pub fn new(principals: Arc<dyn PrincipalRepository>) -> Self {
        Self { principals }
    }

    pub fn principals(&self) -> &Arc<dyn PrincipalRepository> {
        &self.principals
    }

    /// Find or provision the principal for `claims`, applying `location`.
    ///
    /// Two first-contact requests for the same subject may race; the store
    /// lets one create win and the other is answered from a second lookup.
    pub fn resolve(
        &self,
        claims: &VerifiedClaims,
        location: Option<LocationHint>,
    ) -> Result<Principal, AuthError> {
        let subject = claims.subject();
        if subject.trim().is_empty() {
            return Err(AuthError::ProvisioningFailed(
                "claims carry no subject".to_string(),
            ));
        }

        if let Some(existing) = self.principals.find_by_subject(subject).map_err(provisioning)? {
            return self.apply_location(existing, location);
        }

        let email = claims
            .email()
            .filter(|email| !email.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_email(subject));
        let new = NewPrincipal::new(subject, email).with_location(location);

        match self.principals.create(new) {
            Ok(principal) => {
                tracing::info!(
                    principal_id = %principal.id,
                    subject = %subject,
                    "Provisioned principal"
                );
                Ok(principal)
            }
            Err(StorageError::AlreadyExists(_)) => {
                tracing::debug!(subject = %subject, "Principal created concurrently, re-reading");
                let existing = self
                    .principals
                    .find_by_subject(subject)
                    .map_err(provisioning)?
                    .ok_or_else(|| {
                        AuthError::ProvisioningFailed(format!(
                            "principal for {subject} vanished after uniqueness conflict"
                        ))
                    })?;
                self.apply_location(existing, location)
            }
            Err(e) => Err(provisioning(e)),
        }
    }

    fn apply_location(
        &self,
        mut principal: Principal,
        location: Option<LocationHint>,
    ) -> Result<Principal, AuthError> {
        let Some(hint) = location else {
            return Ok(principal);
        };
        if !principal.location_differs(&hint) {
            return Ok(principal);
        }

        principal.set_location(hint);
        self.principals.update(&principal).map_err(provisioning)?;
        tracing::debug!(
            principal_id = %principal.id,
            latitude = hint.latitude,
            longitude = hint.longitude,
            "Updated principal location"
        );
        Ok(principal)
    }
}

fn provisioning(err: StorageError) -> AuthError {
    AuthError::ProvisioningFailed(err.to_string())
}

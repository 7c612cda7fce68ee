// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Clerk session-token authentication and principal provisioning.
//!
//! ## Auth Flow
//!
//! 1. Frontend authenticates the user with Clerk
//! 2. Frontend sends `Authorization: Bearer <Clerk JWT>`, optionally with a
//!    location hint (headers, query or body)
//! 3. Server:
//!    - Resolves the token's `kid` in the cached Clerk JWKS, refreshing the
//!      cache once on a miss
//!    - Verifies signature, issuer, expiry and (if configured) audience
//!    - Maps `sub` to a local [`Principal`](crate::models::Principal),
//!      creating it on first contact and recording the location hint
//!
//! ## Security
//!
//! - Every failure is answered with the same generic `401`
//! - Requests without a bearer token continue anonymously; protected
//!   handlers reject them through the [`Auth`] extractor
//! - JWKS refreshes are coalesced: concurrent misses share one fetch

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod location;
pub mod middleware;
pub mod resolver;
pub mod verifier;

pub use claims::VerifiedClaims;
pub use error::AuthError;
pub use extractor::{Auth, OptionalAuth};
pub use jwks::{KeyMaterial, KeySetCache, SigningKeySet};
pub use location::LocationHint;
pub use middleware::{authenticate, Authenticator};
pub use resolver::IdentityResolver;
pub use verifier::TokenVerifier;

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{Authenticator, IdentityResolver, KeySetCache, TokenVerifier};
use crate::config::AuthConfig;
use crate::storage::PrincipalRepository;

#[derive(Clone)]
pub struct AppState {
    pub authenticator: Authenticator,
    pub principals: Arc<dyn PrincipalRepository>,
}

impl AppState {
    pub fn new(auth: &AuthConfig, principals: Arc<dyn PrincipalRepository>) -> Self {
        let keys = Arc::new(KeySetCache::from_config(auth));
        let verifier = TokenVerifier::from_config(keys, auth);
        let resolver = IdentityResolver::new(Arc::clone(&principals));
        Self {
            authenticator: Authenticator::new(verifier, resolver),
            principals,
        }
    }

    pub fn key_set(&self) -> &Arc<KeySetCache> {
        self.authenticator.verifier().key_set()
    }
}

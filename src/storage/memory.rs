// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory principal store.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{PrincipalRepository, StorageError, StorageResult};
use crate::models::{NewPrincipal, Principal};

/// Principals keyed by subject.
#[derive(Debug, Default)]
pub struct InMemoryPrincipalStore {
    by_subject: RwLock<HashMap<String, Principal>>,
}

impl InMemoryPrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_subject.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PrincipalRepository for InMemoryPrincipalStore {
    fn find_by_subject(&self, subject: &str) -> StorageResult<Option<Principal>> {
        let map = self.by_subject.read().map_err(|_| StorageError::Poisoned)?;
        Ok(map.get(subject).cloned())
    }

    fn create(&self, new: NewPrincipal) -> StorageResult<Principal> {
        let mut map = self.by_subject.write().map_err(|_| StorageError::Poisoned)?;
        if map.contains_key(&new.subject) {
            return Err(StorageError::AlreadyExists(format!(
                "Principal for subject {}",
                new.subject
            )));
        }
        let principal = new.into_principal();
        map.insert(principal.subject.clone(), principal.clone());
        Ok(principal)
    }

    fn update(&self, principal: &Principal) -> StorageResult<()> {
        let mut map = self.by_subject.write().map_err(|_| StorageError::Poisoned)?;
        match map.get_mut(&principal.subject) {
            Some(existing) if existing.id == principal.id => {
                *existing = principal.clone();
                Ok(())
            }
            _ => Err(StorageError::NotFound(format!("Principal {}", principal.id))),
        }
    }
}

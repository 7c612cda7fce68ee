// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded principal database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `principals`: principal id → serialized Principal
//! - `principal_subjects`: provider subject → principal id
//!
//! The subject table is the uniqueness constraint. redb runs one write
//! transaction at a time, so the existence check and the insert in
//! [`RedbPrincipalStore::create`] cannot interleave with another create.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{PrincipalRepository, StorageError, StorageResult};
use crate::models::{NewPrincipal, Principal};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: principal id → serialized Principal (JSON bytes).
const PRINCIPALS: TableDefinition<&str, &[u8]> = TableDefinition::new("principals");

/// Index: provider subject → principal id.
const SUBJECT_INDEX: TableDefinition<&str, &str> = TableDefinition::new("principal_subjects");

// =============================================================================
// RedbPrincipalStore
// =============================================================================

pub struct RedbPrincipalStore {
    db: Database,
}

impl RedbPrincipalStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PRINCIPALS)?;
            let _ = write_txn.open_table(SUBJECT_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl PrincipalRepository for RedbPrincipalStore {
    fn find_by_subject(&self, subject: &str) -> StorageResult<Option<Principal>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(SUBJECT_INDEX)?;
        let Some(id) = index.get(subject)? else {
            return Ok(None);
        };

        let principals = read_txn.open_table(PRINCIPALS)?;
        let value = principals
            .get(id.value())?
            .ok_or_else(|| StorageError::NotFound(format!("Principal {}", id.value())))?;
        let principal: Principal = serde_json::from_slice(value.value())?;
        Ok(Some(principal))
    }

    fn create(&self, new: NewPrincipal) -> StorageResult<Principal> {
        let principal = new.into_principal();
        let json = serde_json::to_vec(&principal)?;

        let write_txn = self.db.begin_write()?;
        let taken = {
            let mut index = write_txn.open_table(SUBJECT_INDEX)?;
            let taken = index.get(principal.subject.as_str())?.is_some();
            if !taken {
                index.insert(principal.subject.as_str(), principal.id.as_str())?;
                let mut principals = write_txn.open_table(PRINCIPALS)?;
                principals.insert(principal.id.as_str(), json.as_slice())?;
            }
            taken
        };

        if taken {
            write_txn.abort()?;
            return Err(StorageError::AlreadyExists(format!(
                "Principal for subject {}",
                principal.subject
            )));
        }
        write_txn.commit()?;
        Ok(principal)
    }

    fn update(&self, principal: &Principal) -> StorageResult<()> {
        let json = serde_json::to_vec(principal)?;

        let write_txn = self.db.begin_write()?;
        let exists = {
            let mut principals = write_txn.open_table(PRINCIPALS)?;
            let exists = principals.get(principal.id.as_str())?.is_some();
            if exists {
                principals.insert(principal.id.as_str(), json.as_slice())?;
            }
            exists
        };

        if !exists {
            write_txn.abort()?;
            return Err(StorageError::NotFound(format!("Principal {}", principal.id)));
        }
        write_txn.commit()?;
        Ok(())
    }

    fn ping(&self) -> StorageResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(SUBJECT_INDEX)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LocationHint;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_store() -> (RedbPrincipalStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RedbPrincipalStore::open(&dir.path().join("principals.redb")).unwrap();
        (store, dir)
    }

    #[test]
    fn open_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/data/principals.redb");
        RedbPrincipalStore::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn unusable_parent_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();
        assert!(matches!(
            RedbPrincipalStore::open(&blocker.join("principals.redb")),
            Err(StorageError::Io(_))
        ));
    }

    #[test]
    fn create_then_find() {
        let (store, _dir) = test_store();
        assert!(store.find_by_subject("user_1").unwrap().is_none());

        let created = store
            .create(NewPrincipal::new("user_1", "sara@example.com"))
            .unwrap();
        let found = store.find_by_subject("user_1").unwrap().unwrap();
        assert_eq!(found, created);
        assert_eq!(found.email, "sara@example.com");
        assert_eq!(found.username, "sara");
    }

    #[test]
    fn duplicate_subject_is_rejected() {
        let (store, _dir) = test_store();
        let first = store.create(NewPrincipal::new("user_1", "a@x.io")).unwrap();

        let err = store
            .create(NewPrincipal::new("user_1", "b@x.io"))
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
        assert_eq!(store.find_by_subject("user_1").unwrap().unwrap(), first);
    }

    #[test]
    fn update_persists_location() {
        let (store, _dir) = test_store();
        let mut principal = store.create(NewPrincipal::new("user_1", "a@x.io")).unwrap();
        principal.set_location(LocationHint::new(21.4, 39.8).unwrap());
        store.update(&principal).unwrap();

        let found = store.find_by_subject("user_1").unwrap().unwrap();
        assert_eq!(found.latitude, Some(21.4));
        assert_eq!(found.longitude, Some(39.8));
    }

    #[test]
    fn update_of_unknown_principal_fails() {
        let (store, _dir) = test_store();
        let principal = NewPrincipal::new("ghost", "g@x.io").into_principal();
        assert!(matches!(
            store.update(&principal),
            Err(StorageError::NotFound(_))
        ));
        assert!(store.find_by_subject("ghost").unwrap().is_none());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("principals.redb");
        let created = {
            let store = RedbPrincipalStore::open(&path).unwrap();
            store.create(NewPrincipal::new("user_1", "a@x.io")).unwrap()
        };

        let store = RedbPrincipalStore::open(&path).unwrap();
        assert_eq!(store.find_by_subject("user_1").unwrap(), Some(created));
        store.ping().unwrap();
    }

    #[test]
    fn concurrent_creates_leave_one_row() {
        let (store, _dir) = test_store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.create(NewPrincipal::new("user_1", format!("u{i}@x.io")))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let created: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(created.len(), 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(StorageError::AlreadyExists(_)))));
        assert_eq!(
            store.find_by_subject("user_1").unwrap().as_ref(),
            Some(created[0])
        );
    }
}

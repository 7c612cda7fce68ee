// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Principal Storage
//!
//! Persistence for [`Principal`] records behind the [`PrincipalRepository`]
//! trait.
//!
//! - [`RedbPrincipalStore`]: embedded redb file under `DATA_DIR`
//! - [`InMemoryPrincipalStore`]: process-local map, used when no data
//!   directory is configured and in tests
//!
//! Both enforce one principal per subject. A `create` for a subject that
//! already exists fails with [`StorageError::AlreadyExists`] and leaves the
//! existing row untouched.

pub mod memory;
pub mod principals;

pub use memory::InMemoryPrincipalStore;
pub use principals::RedbPrincipalStore;

use crate::models::{NewPrincipal, Principal};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("store lock poisoned")]
    Poisoned,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Principal persistence.
///
/// Calls are synchronous; redb transactions are short and local.
pub trait PrincipalRepository: Send + Sync {
    fn find_by_subject(&self, subject: &str) -> StorageResult<Option<Principal>>;

    /// Insert a new principal. Fails with `AlreadyExists` if the subject is
    /// taken.
    fn create(&self, new: NewPrincipal) -> StorageResult<Principal>;

    /// Overwrite an existing principal, matched by id.
    fn update(&self, principal: &Principal) -> StorageResult<()>;

    /// Readiness probe.
    fn ping(&self) -> StorageResult<()> {
        Ok(())
    }
}

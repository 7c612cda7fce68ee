// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Thimar Identity - Clerk token verification and principal provisioning
//!
//! This crate authenticates API requests bearing Clerk session tokens and
//! binds each one to a local principal record, creating it on first contact.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - JWKS cache, token verification, principal resolution, middleware
//! - `config` - Environment configuration
//! - `storage` - Principal persistence (redb or in-memory)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;

#[cfg(test)]
mod test_support;

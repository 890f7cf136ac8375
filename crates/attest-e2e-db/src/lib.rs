// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Database layer for the attest end-to-end runner.
//!
//! This crate provides sqlite access for the two entities the harness
//! touches in the shared verification database:
//!
//! - **Realms**: named tenant boundaries for credentials. The harness
//!   creates (or reuses) a single fixed test realm and never deletes it.
//! - **Authorized apps**: named, typed (admin/device) API keys scoped to a
//!   realm, revocable via soft-delete (`deleted_at` timestamp).

pub mod authorized_app;
pub mod error;
pub mod pool;
pub mod realm;

pub use authorized_app::{ApiKeyType, AuthorizedApp, AuthorizedAppRepository};
pub use error::{DbError, Result};
pub use pool::{create_pool, run_migrations};
pub use realm::{Realm, RealmRepository};

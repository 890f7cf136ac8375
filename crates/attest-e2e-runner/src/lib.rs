// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! End-to-end test runner for the attest verification server.
//!
//! This crate provisions an ephemeral test realm plus admin/device API keys
//! in the shared verification database, exposes HTTP trigger routes that run
//! the synthetic issue/verify workflow against the remote API, and revokes
//! the keys on shutdown.

pub mod client;
pub mod lifecycle;
pub mod provision;
pub mod routes;

pub use attest_e2e_config::{RunnerConfig, TestConfig};
pub use client::{EndToEnd, RestClient, WorkflowError};
pub use lifecycle::{setup, SetupError, Teardown};
pub use provision::{provision, ProvisionError, ProvisionedKeys};
pub use routes::create_router;

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP trigger routes.
//!
//! Each route carries its own frozen copy of the test configuration with
//! the revise flag fixed at registration time. Handlers never mutate shared
//! state, so concurrent requests to the two routes cannot observe each
//! other's flag.

use axum::{
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::any,
	Router,
};
use std::sync::Arc;

use attest_e2e_config::TestConfig;

use crate::client::EndToEnd;

/// Per-route state: the workflow client plus an immutable config snapshot.
#[derive(Clone)]
struct TriggerState {
	runner: Arc<dyn EndToEnd>,
	config: TestConfig,
}

/// Build the trigger router.
///
/// # Routes
/// * `any /default` - run the default workflow (`do_revise = false`)
/// * `any /revise` - run the revise workflow (`do_revise = true`)
pub fn create_router(runner: Arc<dyn EndToEnd>, test_config: &TestConfig) -> Router {
	let default_state = TriggerState {
		runner: Arc::clone(&runner),
		config: with_revise(test_config, false),
	};
	let revise_state = TriggerState {
		runner,
		config: with_revise(test_config, true),
	};

	Router::new()
		.route("/default", any(run_trigger).with_state(default_state))
		.route("/revise", any(run_trigger).with_state(revise_state))
}

fn with_revise(config: &TestConfig, do_revise: bool) -> TestConfig {
	let mut config = config.clone();
	config.do_revise = do_revise;
	config
}

/// Trigger one end-to-end run. Consumes no body or query parameters.
async fn run_trigger(State(state): State<TriggerState>) -> Response {
	match state.runner.run_end_to_end(&state.config).await {
		Ok(()) => (StatusCode::OK, "ok").into_response(),
		Err(e) => {
			tracing::error!(
				error = %e,
				revise = state.config.do_revise,
				"could not run end to end"
			);
			(
				StatusCode::INTERNAL_SERVER_ERROR,
				format!("failed (check server logs for more details): {e}"),
			)
				.into_response()
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! End-to-end runner binary: a small webserver that triggers the
//! issue/verify workflow against the attest verification API.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use attest_e2e_runner::{create_router, lifecycle, EndToEnd, RestClient};

/// End-to-end runner - HTTP trigger server for attest workflow tests.
#[derive(Parser, Debug)]
#[command(
	name = "attest-e2e-runner",
	about = "End-to-end test runner for the attest verification server",
	version
)]
struct Args {
	/// Subcommands for the runner (e.g., `version`)
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	// Parse CLI arguments
	let args = Args::parse();

	// Handle subcommands that should not start the server
	if let Some(Command::Version) = args.command {
		println!("attest-e2e-runner {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	// Load .env file if present
	dotenvy::dotenv().ok();

	// Load configuration
	let mut config = attest_e2e_config::load_config()?;

	// Setup tracing
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		"starting attest-e2e-runner"
	);

	// Provision the test realm and API keys on a background task; the
	// token also lets an external interrupt unblock that task.
	let cancel = CancellationToken::new();
	let teardown = lifecycle::setup(cancel.clone(), &mut config).await?;

	let runner: Arc<dyn EndToEnd> = Arc::new(RestClient::new()?);
	let app = create_router(runner, &config.test).layer(TraceLayer::new_for_http());

	// Start server
	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);

	let listener = tokio::net::TcpListener::bind(&addr).await?;

	// Run server with graceful shutdown
	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
			cancel.cancel();
		}
	}

	// Revoke the provisioned keys before giving control back to the OS.
	teardown.finish();
	teardown.join().await;

	tracing::info!("Server shutdown complete");
	Ok(())
}

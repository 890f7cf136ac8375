// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the attest end-to-end runner.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`ATTEST_E2E_*`)
//!
//! # Usage
//!
//! ```ignore
//! use attest_e2e_config::load_config;
//!
//! let config = load_config()?;
//! println!("Runner listening on {}:{}", config.http.host, config.http.port);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::RunnerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved runner configuration.
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub test: TestConfig,
}

impl RunnerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`ATTEST_E2E_*`)
/// 2. Config file (`/etc/attest/e2e-runner.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<RunnerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<RunnerConfig, ConfigError> {
	let mut merged = RunnerConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<RunnerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<RunnerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = RunnerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: RunnerConfigLayer) -> Result<RunnerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let test = layer.test.unwrap_or_default().finalize();

	let config = RunnerConfig {
		http,
		database,
		logging,
		test,
	};
	validate_config(&config)?;

	info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		api_server_url = %config.test.api_server_url,
		admin_api_url = %config.test.admin_api_url,
		"Runner configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &RunnerConfig) -> Result<(), ConfigError> {
	if config.http.port == 0 {
		return Err(ConfigError::Validation(
			"ATTEST_E2E_PORT must be nonzero".to_string(),
		));
	}
	if config.database.url.is_empty() {
		return Err(ConfigError::Validation(
			"ATTEST_E2E_DATABASE_URL must not be empty".to_string(),
		));
	}
	if config.test.api_server_url.is_empty() || config.test.admin_api_url.is_empty() {
		return Err(ConfigError::Validation(
			"ATTEST_E2E_API_SERVER_URL and ATTEST_E2E_ADMIN_API_URL must not be empty".to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_are_valid() {
		let config = finalize(RunnerConfigLayer::default()).unwrap();
		assert_eq!(config.socket_addr(), "0.0.0.0:8080");
		assert_eq!(config.database.url, "sqlite:./attest-e2e.db");
		assert!(config.test.admin_api_key.is_empty());
	}

	#[test]
	fn test_zero_port_rejected() {
		let layer = RunnerConfigLayer {
			http: Some(HttpConfigLayer {
				host: None,
				port: Some(0),
			}),
			..Default::default()
		};
		let result = finalize(layer);
		assert!(result.is_err());
		assert!(result.unwrap_err().to_string().contains("nonzero"));
	}

	#[test]
	fn test_config_file_overrides_defaults() {
		use std::io::Write;
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
[database]
url = "sqlite:/tmp/e2e-test.db"
"#
		)
		.unwrap();

		let config = load_config_with_file(file.path()).unwrap();
		assert_eq!(config.database.url, "sqlite:/tmp/e2e-test.db");
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end test run configuration.

use serde::Deserialize;

/// Configuration for a single end-to-end workflow run.
///
/// The two key fields are empty until the lifecycle coordinator provisions
/// credentials; they are never read from config sources. Consumers receive
/// their own clone of this value and must not share a mutable copy across
/// requests.
#[derive(Debug, Clone)]
pub struct TestConfig {
	/// Base URL of the device-facing API server.
	pub api_server_url: String,
	/// Base URL of the admin API.
	pub admin_api_url: String,
	/// Admin API key, filled at runtime by the lifecycle coordinator.
	pub admin_api_key: String,
	/// Device API key, filled at runtime by the lifecycle coordinator.
	pub device_api_key: String,
	/// Run the revise variant of the workflow.
	pub do_revise: bool,
}

impl Default for TestConfig {
	fn default() -> Self {
		Self {
			api_server_url: "http://localhost:8081".to_string(),
			admin_api_url: "http://localhost:8082".to_string(),
			admin_api_key: String::new(),
			device_api_key: String::new(),
			do_revise: false,
		}
	}
}

/// Test configuration layer (partial, for merging).
///
/// Only the URLs are configurable; credentials and the revise flag are
/// runtime state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestConfigLayer {
	#[serde(default)]
	pub api_server_url: Option<String>,
	#[serde(default)]
	pub admin_api_url: Option<String>,
}

impl TestConfigLayer {
	pub fn merge(&mut self, other: TestConfigLayer) {
		if other.api_server_url.is_some() {
			self.api_server_url = other.api_server_url;
		}
		if other.admin_api_url.is_some() {
			self.admin_api_url = other.admin_api_url;
		}
	}

	pub fn finalize(self) -> TestConfig {
		TestConfig {
			api_server_url: self
				.api_server_url
				.unwrap_or_else(|| "http://localhost:8081".to_string()),
			admin_api_url: self
				.admin_api_url
				.unwrap_or_else(|| "http://localhost:8082".to_string()),
			admin_api_key: String::new(),
			device_api_key: String::new(),
			do_revise: false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_credentials_start_empty() {
		let config = TestConfigLayer::default().finalize();
		assert!(config.admin_api_key.is_empty());
		assert!(config.device_api_key.is_empty());
		assert!(!config.do_revise);
	}

	#[test]
	fn test_urls_merge() {
		let mut base = TestConfigLayer::default();
		base.merge(TestConfigLayer {
			api_server_url: Some("https://api.example.com".to_string()),
			admin_api_url: None,
		});
		let config = base.finalize();
		assert_eq!(config.api_server_url, "https://api.example.com");
		assert_eq!(config.admin_api_url, "http://localhost:8082");
	}
}

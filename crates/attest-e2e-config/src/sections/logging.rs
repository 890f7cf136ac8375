// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Logging configuration.

use serde::Deserialize;

/// Logging configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct LoggingConfig {
	/// Tracing filter directive, e.g. "info" or "attest_e2e_runner=debug".
	pub level: String,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
		}
	}
}

/// Logging configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfigLayer {
	#[serde(default)]
	pub level: Option<String>,
	/// Shorthand debug toggle; wins over `level` when set.
	#[serde(default)]
	pub debug: Option<bool>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: LoggingConfigLayer) {
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.debug.is_some() {
			self.debug = other.debug;
		}
	}

	pub fn finalize(self) -> LoggingConfig {
		let level = match self.debug {
			Some(true) => "debug".to_string(),
			_ => self.level.unwrap_or_else(|| "info".to_string()),
		};
		LoggingConfig { level }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_level() {
		let config = LoggingConfigLayer::default().finalize();
		assert_eq!(config.level, "info");
	}

	#[test]
	fn test_debug_toggle_wins() {
		let layer = LoggingConfigLayer {
			level: Some("warn".to_string()),
			debug: Some(true),
		};
		assert_eq!(layer.finalize().level, "debug");
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Client for the remote issue/verify workflow.
//!
//! The trigger routes only depend on the [`EndToEnd`] trait; [`RestClient`]
//! is the production implementation speaking to the verification API over
//! HTTP with the credentials carried in the [`TestConfig`].

use async_trait::async_trait;
use attest_e2e_config::TestConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-api-key";
const TEST_TYPE_CONFIRMED: &str = "confirmed";
const TEST_TYPE_USER_REPORT: &str = "user-report";

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
	#[error("HTTP error: {0}")]
	Http(String),

	#[error("API error ({status}): {message}")]
	Api { status: u16, message: String },

	#[error("Invalid response: {0}")]
	InvalidResponse(String),
}

impl From<reqwest::Error> for WorkflowError {
	fn from(err: reqwest::Error) -> Self {
		WorkflowError::Http(err.to_string())
	}
}

/// Executes one end-to-end issue/verify run against the remote API.
#[async_trait]
pub trait EndToEnd: Send + Sync {
	async fn run_end_to_end(&self, config: &TestConfig) -> Result<(), WorkflowError>;
}

#[derive(Debug, Serialize)]
struct IssueCodeRequest<'a> {
	test_type: &'a str,
	symptom_date: String,
}

#[derive(Debug, Deserialize)]
struct IssueCodeResponse {
	#[serde(default)]
	code: String,
	#[serde(default)]
	error: Option<String>,
}

#[derive(Debug, Serialize)]
struct VerifyCodeRequest<'a> {
	code: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyCodeResponse {
	#[serde(default)]
	token: String,
	#[serde(default)]
	error: Option<String>,
}

/// HTTP implementation of the end-to-end workflow.
pub struct RestClient {
	http: reqwest::Client,
}

impl RestClient {
	pub fn new() -> Result<Self, WorkflowError> {
		let http = reqwest::Client::builder()
			.timeout(Duration::from_secs(30))
			.build()?;
		Ok(Self { http })
	}

	/// Issue a verification code via the admin API.
	async fn issue_code(
		&self,
		config: &TestConfig,
		test_type: &str,
	) -> Result<String, WorkflowError> {
		let url = format!("{}/api/issue", config.admin_api_url);
		let request = IssueCodeRequest {
			test_type,
			symptom_date: chrono_date_today(),
		};

		let response = self
			.http
			.post(&url)
			.header(API_KEY_HEADER, &config.admin_api_key)
			.json(&request)
			.send()
			.await?;

		let status = response.status();
		let body: IssueCodeResponse = response
			.json()
			.await
			.map_err(|e| WorkflowError::InvalidResponse(e.to_string()))?;

		if let Some(message) = body.error {
			return Err(WorkflowError::Api {
				status: status.as_u16(),
				message,
			});
		}
		if body.code.is_empty() {
			return Err(WorkflowError::InvalidResponse(
				"issue response contained no code".to_string(),
			));
		}
		Ok(body.code)
	}

	/// Exchange a code for a verification token via the device API.
	async fn verify_code(&self, config: &TestConfig, code: &str) -> Result<String, WorkflowError> {
		let url = format!("{}/api/verify", config.api_server_url);

		let response = self
			.http
			.post(&url)
			.header(API_KEY_HEADER, &config.device_api_key)
			.json(&VerifyCodeRequest { code })
			.send()
			.await?;

		let status = response.status();
		let body: VerifyCodeResponse = response
			.json()
			.await
			.map_err(|e| WorkflowError::InvalidResponse(e.to_string()))?;

		if let Some(message) = body.error {
			return Err(WorkflowError::Api {
				status: status.as_u16(),
				message,
			});
		}
		if body.token.is_empty() {
			return Err(WorkflowError::InvalidResponse(
				"verify response contained no token".to_string(),
			));
		}
		Ok(body.token)
	}
}

#[async_trait]
impl EndToEnd for RestClient {
	async fn run_end_to_end(&self, config: &TestConfig) -> Result<(), WorkflowError> {
		let code = self.issue_code(config, TEST_TYPE_CONFIRMED).await?;
		let _token = self.verify_code(config, &code).await?;
		tracing::debug!(revise = config.do_revise, "issue/verify round trip completed");

		if config.do_revise {
			let code = self.issue_code(config, TEST_TYPE_USER_REPORT).await?;
			let _token = self.verify_code(config, &code).await?;
			tracing::debug!("revise round trip completed");
		}

		Ok(())
	}
}

fn chrono_date_today() -> String {
	chrono::Utc::now().format("%Y-%m-%d").to_string()
}

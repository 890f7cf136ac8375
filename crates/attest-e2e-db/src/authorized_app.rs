// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Authorized app (API key) repository for database operations.
//!
//! Authorized apps are realm-scoped API keys. Revocation is a soft delete:
//! the row keeps its key value and gains a `deleted_at` timestamp, so audit
//! history survives the end of a test run.

use chrono::{DateTime, Utc};
use rand::RngCore;
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::DbError;

/// Type of an authorized app's API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyType {
	Admin,
	Device,
}

impl ApiKeyType {
	pub fn as_str(&self) -> &'static str {
		match self {
			ApiKeyType::Admin => "admin",
			ApiKeyType::Device => "device",
		}
	}
}

impl std::str::FromStr for ApiKeyType {
	type Err = DbError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"admin" => Ok(ApiKeyType::Admin),
			"device" => Ok(ApiKeyType::Device),
			other => Err(DbError::Internal(format!("Invalid key type: {other}"))),
		}
	}
}

impl std::fmt::Display for ApiKeyType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A realm-scoped API key.
#[derive(Debug, Clone)]
pub struct AuthorizedApp {
	pub id: String,
	pub realm_id: String,
	pub name: String,
	pub api_key: String,
	pub key_type: ApiKeyType,
	pub created_at: DateTime<Utc>,
	pub deleted_at: Option<DateTime<Utc>>,
}

impl AuthorizedApp {
	/// Whether the key is currently usable.
	pub fn is_live(&self) -> bool {
		self.deleted_at.is_none()
	}
}

/// Repository for authorized app database operations.
///
/// Key values are generated server-side and returned exactly once from
/// `create_authorized_app`.
#[derive(Clone)]
pub struct AuthorizedAppRepository {
	pool: SqlitePool,
}

impl AuthorizedAppRepository {
	/// Create a new authorized app repository with the given pool.
	///
	/// # Arguments
	/// * `pool` - SQLite connection pool
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create a new authorized app scoped to a realm.
	///
	/// # Arguments
	/// * `realm_id` - The owning realm's UUID
	/// * `name` - Unique name for the app
	/// * `key_type` - Admin or device key
	///
	/// # Returns
	/// The generated API key value.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if an app with this name already exists.
	#[tracing::instrument(skip(self), fields(realm_id = %realm_id, name = %name, key_type = %key_type))]
	pub async fn create_authorized_app(
		&self,
		realm_id: &str,
		name: &str,
		key_type: ApiKeyType,
	) -> Result<String, DbError> {
		let id = Uuid::new_v4().to_string();
		let api_key = generate_api_key()?;
		let now = Utc::now();

		let result = sqlx::query(
			r#"
			INSERT INTO authorized_apps (
				id, realm_id, name, api_key, key_type, created_at
			) VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&id)
		.bind(realm_id)
		.bind(name)
		.bind(&api_key)
		.bind(key_type.as_str())
		.bind(now.to_rfc3339())
		.execute(&self.pool)
		.await;

		match result {
			Ok(_) => {
				tracing::debug!(app_id = %id, realm_id = %realm_id, "authorized app created");
				Ok(api_key)
			}
			Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(DbError::Conflict(
				format!("authorized app {name} already exists"),
			)),
			Err(e) => Err(e.into()),
		}
	}

	/// Get an authorized app by its API key value.
	///
	/// # Returns
	/// `None` if no app exists with this key.
	///
	/// # Note
	/// Returns the app regardless of deletion status - caller should check
	/// `deleted_at`.
	#[tracing::instrument(skip(self, api_key))]
	pub async fn find_authorized_app_by_key(
		&self,
		api_key: &str,
	) -> Result<Option<AuthorizedApp>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, realm_id, name, api_key, key_type, created_at, deleted_at
			FROM authorized_apps
			WHERE api_key = ?
			"#,
		)
		.bind(api_key)
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => {
				let app = parse_authorized_app_row(&row)?;
				tracing::debug!(app_id = %app.id, realm_id = %app.realm_id, "authorized app found by key");
				Ok(Some(app))
			}
			None => Ok(None),
		}
	}

	/// List all authorized apps for a realm.
	///
	/// # Returns
	/// List of apps (including soft-deleted) ordered by creation date
	/// descending.
	#[tracing::instrument(skip(self), fields(realm_id = %realm_id))]
	pub async fn list_authorized_apps_for_realm(
		&self,
		realm_id: &str,
	) -> Result<Vec<AuthorizedApp>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, realm_id, name, api_key, key_type, created_at, deleted_at
			FROM authorized_apps
			WHERE realm_id = ?
			ORDER BY created_at DESC
			"#,
		)
		.bind(realm_id)
		.fetch_all(&self.pool)
		.await?;

		let mut apps = Vec::with_capacity(rows.len());
		for row in rows {
			apps.push(parse_authorized_app_row(&row)?);
		}
		tracing::debug!(realm_id = %realm_id, count = apps.len(), "listed authorized apps for realm");
		Ok(apps)
	}

	/// Soft-delete an authorized app by stamping `deleted_at`.
	///
	/// # Arguments
	/// * `id` - The app's UUID
	///
	/// # Returns
	/// `true` if the app was revoked, `false` if already revoked or not found.
	#[tracing::instrument(skip(self), fields(app_id = %id))]
	pub async fn soft_delete_authorized_app(&self, id: &str) -> Result<bool, DbError> {
		let now = Utc::now();

		let result = sqlx::query(
			r#"
			UPDATE authorized_apps
			SET deleted_at = ?
			WHERE id = ? AND deleted_at IS NULL
			"#,
		)
		.bind(now.to_rfc3339())
		.bind(id)
		.execute(&self.pool)
		.await?;

		let revoked = result.rows_affected() > 0;
		if revoked {
			tracing::info!(app_id = %id, "authorized app revoked");
		}
		Ok(revoked)
	}
}

/// Generate a random API key value (32 bytes, hex encoded).
fn generate_api_key() -> Result<String, DbError> {
	let mut bytes = [0u8; 32];
	rand::rngs::OsRng
		.try_fill_bytes(&mut bytes)
		.map_err(|e| DbError::Internal(format!("entropy source failed: {e}")))?;
	Ok(hex::encode(bytes))
}

fn parse_authorized_app_row(row: &sqlx::sqlite::SqliteRow) -> Result<AuthorizedApp, DbError> {
	let id: String = row.get("id");
	let realm_id: String = row.get("realm_id");
	let name: String = row.get("name");
	let api_key: String = row.get("api_key");
	let key_type_str: String = row.get("key_type");
	let created_at_str: String = row.get("created_at");
	let deleted_at_str: Option<String> = row.get("deleted_at");

	let key_type = key_type_str.parse()?;

	let created_at = DateTime::parse_from_rfc3339(&created_at_str)
		.map_err(|e| DbError::Internal(format!("Invalid created_at: {e}")))?
		.with_timezone(&Utc);

	let deleted_at = deleted_at_str
		.map(|s| {
			DateTime::parse_from_rfc3339(&s)
				.map(|dt| dt.with_timezone(&Utc))
				.map_err(|e| DbError::Internal(format!("Invalid deleted_at: {e}")))
		})
		.transpose()?;

	Ok(AuthorizedApp {
		id,
		realm_id,
		name,
		api_key,
		key_type,
		created_at,
		deleted_at,
	})
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Realm repository for database operations.
//!
//! Realms are named tenant boundaries for API keys. The end-to-end harness
//! only ever creates one fixed test realm and reuses it across runs.

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::DbError;

/// A named tenant boundary for authorized apps.
#[derive(Debug, Clone, PartialEq)]
pub struct Realm {
	pub id: String,
	pub name: String,
	pub region_code: String,
	pub created_at: DateTime<Utc>,
}

/// Repository for realm database operations.
#[derive(Clone)]
pub struct RealmRepository {
	pool: SqlitePool,
}

impl RealmRepository {
	/// Create a new realm repository with the given pool.
	///
	/// # Arguments
	/// * `pool` - SQLite connection pool
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create a new realm.
	///
	/// # Arguments
	/// * `name` - Unique realm name
	/// * `region_code` - Region code attached to the realm
	///
	/// # Errors
	/// Returns `DbError::Conflict` if a realm with this name already exists.
	#[tracing::instrument(skip(self), fields(name = %name))]
	pub async fn create_realm(&self, name: &str, region_code: &str) -> Result<Realm, DbError> {
		let id = Uuid::new_v4().to_string();
		let now = Utc::now();

		let result = sqlx::query(
			r#"
			INSERT INTO realms (id, name, region_code, created_at)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(&id)
		.bind(name)
		.bind(region_code)
		.bind(now.to_rfc3339())
		.execute(&self.pool)
		.await;

		match result {
			Ok(_) => {
				tracing::debug!(realm_id = %id, name = %name, "realm created");
				Ok(Realm {
					id,
					name: name.to_string(),
					region_code: region_code.to_string(),
					created_at: now,
				})
			}
			Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
				Err(DbError::Conflict(format!("realm {name} already exists")))
			}
			Err(e) => Err(e.into()),
		}
	}

	/// Get a realm by its unique name.
	///
	/// # Returns
	/// `None` if no realm exists with this name.
	#[tracing::instrument(skip(self), fields(name = %name))]
	pub async fn find_realm_by_name(&self, name: &str) -> Result<Option<Realm>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, region_code, created_at
			FROM realms
			WHERE name = ?
			"#,
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => Ok(Some(parse_realm_row(&row)?)),
			None => Ok(None),
		}
	}

	/// Find a realm by name, creating it when absent.
	///
	/// A concurrent creator losing the insert race hits the `name` UNIQUE
	/// constraint; that conflict is resolved by re-fetching the winner's
	/// row, so concurrent callers always converge on a single realm.
	#[tracing::instrument(skip(self), fields(name = %name))]
	pub async fn find_or_create_realm(
		&self,
		name: &str,
		region_code: &str,
	) -> Result<Realm, DbError> {
		if let Some(realm) = self.find_realm_by_name(name).await? {
			tracing::debug!(realm_id = %realm.id, "reusing existing realm");
			return Ok(realm);
		}

		match self.create_realm(name, region_code).await {
			Ok(realm) => Ok(realm),
			Err(DbError::Conflict(_)) => {
				self.find_realm_by_name(name).await?.ok_or_else(|| {
					DbError::Internal(format!("realm {name} vanished after conflict"))
				})
			}
			Err(e) => Err(e),
		}
	}
}

fn parse_realm_row(row: &sqlx::sqlite::SqliteRow) -> Result<Realm, DbError> {
	let id: String = row.get("id");
	let name: String = row.get("name");
	let region_code: String = row.get("region_code");
	let created_at_str: String = row.get("created_at");

	let created_at = DateTime::parse_from_rfc3339(&created_at_str)
		.map_err(|e| DbError::Internal(format!("Invalid created_at: {e}")))?
		.with_timezone(&Utc);

	Ok(Realm {
		id,
		name,
		region_code,
		created_at,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::pool::run_migrations;
	use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
	use std::str::FromStr;

	async fn make_repo() -> RealmRepository {
		let options = SqliteConnectOptions::from_str(":memory:")
			.unwrap()
			.create_if_missing(true);

		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect_with(options)
			.await
			.expect("Failed to create test pool");

		run_migrations(&pool).await.unwrap();
		RealmRepository::new(pool)
	}

	#[tokio::test]
	async fn test_create_and_find_realm() {
		let repo = make_repo().await;

		let realm = repo.create_realm("test-realm", "us").await.unwrap();
		assert_eq!(realm.name, "test-realm");
		assert_eq!(realm.region_code, "us");

		let found = repo.find_realm_by_name("test-realm").await.unwrap();
		assert_eq!(found, Some(realm));
	}

	#[tokio::test]
	async fn test_find_realm_not_found() {
		let repo = make_repo().await;
		let found = repo.find_realm_by_name("nope").await.unwrap();
		assert!(found.is_none());
	}

	#[tokio::test]
	async fn test_duplicate_name_conflicts() {
		let repo = make_repo().await;

		repo.create_realm("dup", "us").await.unwrap();
		let err = repo.create_realm("dup", "eu").await.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));
	}

	#[tokio::test]
	async fn test_find_or_create_is_idempotent() {
		let repo = make_repo().await;

		let first = repo.find_or_create_realm("e2e", "e2e-region").await.unwrap();
		let second = repo.find_or_create_realm("e2e", "other").await.unwrap();

		// Second call reuses the first realm, including its region code.
		assert_eq!(first.id, second.id);
		assert_eq!(second.region_code, "e2e-region");
	}
}

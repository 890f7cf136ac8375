// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Credential provisioning for an end-to-end run.
//!
//! Each run mints two API keys (admin + device) in the fixed test realm.
//! Key names share a random suffix so keys from concurrent or repeated runs
//! never collide.

use attest_e2e_db::{ApiKeyType, AuthorizedAppRepository, DbError, RealmRepository};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqlitePool;

/// Name of the realm all end-to-end credentials live in. Created on first
/// use, reused forever after, never deleted by this harness.
pub const REALM_NAME: &str = "e2e-test-realm";
/// Region code attached to the realm on creation.
pub const REALM_REGION_CODE: &str = "e2e-test";
/// Name prefix for the admin API key.
pub const ADMIN_KEY_PREFIX: &str = "e2e-admin-key.";
/// Name prefix for the device API key.
pub const DEVICE_KEY_PREFIX: &str = "e2e-device-key.";

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
	#[error("database error: {0}")]
	Db(#[from] DbError),

	#[error("failed to generate random suffix: {0}")]
	Entropy(String),
}

/// Key values minted for one end-to-end run.
#[derive(Debug, Clone)]
pub struct ProvisionedKeys {
	pub admin_key: String,
	pub device_key: String,
}

/// Random uniqueness suffix for key names: 512 random bytes, hashed and hex
/// encoded (64 characters).
fn random_suffix() -> Result<String, ProvisionError> {
	let mut bytes = [0u8; 512];
	rand::rngs::OsRng
		.try_fill_bytes(&mut bytes)
		.map_err(|e| ProvisionError::Entropy(e.to_string()))?;
	Ok(hex::encode(Sha256::digest(bytes)))
}

/// Provision the test realm and a fresh admin/device key pair.
///
/// Any creation failure aborts the whole step and leaves no live
/// credential: if the device key cannot be created, the already-created
/// admin key is revoked before the error is returned.
#[tracing::instrument(skip(pool))]
pub async fn provision(
	pool: &SqlitePool,
	realm_name: &str,
	region_code: &str,
) -> Result<ProvisionedKeys, ProvisionError> {
	let realms = RealmRepository::new(pool.clone());
	let apps = AuthorizedAppRepository::new(pool.clone());

	let realm = realms.find_or_create_realm(realm_name, region_code).await?;
	let suffix = random_suffix()?;

	let admin_key = apps
		.create_authorized_app(
			&realm.id,
			&format!("{ADMIN_KEY_PREFIX}{suffix}"),
			ApiKeyType::Admin,
		)
		.await?;

	let device_key = match apps
		.create_authorized_app(
			&realm.id,
			&format!("{DEVICE_KEY_PREFIX}{suffix}"),
			ApiKeyType::Device,
		)
		.await
	{
		Ok(key) => key,
		Err(e) => {
			// The admin key is already live; take it back down before
			// surfacing the error so a half-provisioned run cannot leave a
			// usable credential behind.
			if let Err(revoke_err) = revoke_key(pool.clone(), admin_key).await {
				tracing::error!(
					error = %revoke_err,
					"failed to revoke admin key after provisioning failure"
				);
			}
			return Err(e.into());
		}
	};

	tracing::info!(realm_id = %realm.id, "provisioned end-to-end credentials");
	Ok(ProvisionedKeys {
		admin_key,
		device_key,
	})
}

/// Revoke one credential: re-fetch it by key value and stamp `deleted_at`.
pub(crate) async fn revoke_key(pool: SqlitePool, api_key: String) -> Result<(), DbError> {
	let apps = AuthorizedAppRepository::new(pool);
	let app = apps
		.find_authorized_app_by_key(&api_key)
		.await?
		.ok_or_else(|| DbError::NotFound("authorized app for key".to_string()))?;
	apps.soft_delete_authorized_app(&app.id).await?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use attest_e2e_db::run_migrations;
	use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
	use std::str::FromStr;

	async fn make_pool() -> SqlitePool {
		let options = SqliteConnectOptions::from_str(":memory:")
			.unwrap()
			.create_if_missing(true);

		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect_with(options)
			.await
			.expect("Failed to create test pool");

		run_migrations(&pool).await.unwrap();
		pool
	}

	#[test]
	fn test_random_suffix_shape() {
		let suffix = random_suffix().unwrap();
		assert_eq!(suffix.len(), 64);
		assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
	}

	#[test]
	fn test_random_suffix_unique() {
		let a = random_suffix().unwrap();
		let b = random_suffix().unwrap();
		assert_ne!(a, b);
	}

	#[tokio::test]
	async fn test_provision_creates_two_keys() {
		let pool = make_pool().await;

		let keys = provision(&pool, REALM_NAME, REALM_REGION_CODE)
			.await
			.unwrap();
		assert_ne!(keys.admin_key, keys.device_key);

		let apps = AuthorizedAppRepository::new(pool.clone());
		let admin = apps
			.find_authorized_app_by_key(&keys.admin_key)
			.await
			.unwrap()
			.unwrap();
		let device = apps
			.find_authorized_app_by_key(&keys.device_key)
			.await
			.unwrap()
			.unwrap();

		assert_eq!(admin.key_type, ApiKeyType::Admin);
		assert_eq!(device.key_type, ApiKeyType::Device);
		assert!(admin.name.starts_with(ADMIN_KEY_PREFIX));
		assert!(device.name.starts_with(DEVICE_KEY_PREFIX));

		// Both names carry the same 64-char hex suffix.
		let admin_suffix = admin.name.strip_prefix(ADMIN_KEY_PREFIX).unwrap();
		let device_suffix = device.name.strip_prefix(DEVICE_KEY_PREFIX).unwrap();
		assert_eq!(admin_suffix, device_suffix);
		assert_eq!(admin_suffix.len(), 64);
	}

	#[tokio::test]
	async fn test_failed_provision_revokes_admin_key() {
		let pool = make_pool().await;

		// Reject device-key inserts so provisioning fails after the admin
		// key already exists.
		sqlx::query(
			r#"
			CREATE TRIGGER reject_device_keys
			BEFORE INSERT ON authorized_apps
			WHEN NEW.key_type = 'device'
			BEGIN
				SELECT RAISE(ABORT, 'device keys rejected');
			END
			"#,
		)
		.execute(&pool)
		.await
		.unwrap();

		let result = provision(&pool, REALM_NAME, REALM_REGION_CODE).await;
		assert!(result.is_err());

		let realms = RealmRepository::new(pool.clone());
		let realm = realms.find_realm_by_name(REALM_NAME).await.unwrap().unwrap();

		let apps = AuthorizedAppRepository::new(pool);
		let all = apps.list_authorized_apps_for_realm(&realm.id).await.unwrap();
		assert_eq!(all.len(), 1);
		assert!(all[0].name.starts_with(ADMIN_KEY_PREFIX));
		assert!(!all[0].is_live());
	}

	#[tokio::test]
	async fn test_provision_reuses_realm() {
		let pool = make_pool().await;

		provision(&pool, REALM_NAME, REALM_REGION_CODE)
			.await
			.unwrap();
		provision(&pool, REALM_NAME, REALM_REGION_CODE)
			.await
			.unwrap();

		let realms = RealmRepository::new(pool.clone());
		let realm = realms.find_realm_by_name(REALM_NAME).await.unwrap().unwrap();

		let apps = AuthorizedAppRepository::new(pool);
		let all = apps.list_authorized_apps_for_realm(&realm.id).await.unwrap();
		assert_eq!(all.len(), 4);
	}
}

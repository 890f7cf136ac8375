// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Setup/teardown lifecycle for an end-to-end run.
//!
//! [`setup`] runs provisioning on a background task and blocks the caller
//! only until the task reports readiness over a one-shot channel. The task
//! then parks until it is told to finish (or the ambient cancellation token
//! fires), revokes the credentials it created in reverse creation order,
//! and closes its database pool. The pool is owned by the background task
//! for its whole lifetime; no other component revokes the credentials.

use attest_e2e_config::RunnerConfig;
use attest_e2e_db::{create_pool, run_migrations, DbError};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::provision::{
	provision, revoke_key, ProvisionError, ProvisionedKeys, REALM_NAME, REALM_REGION_CODE,
};

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
	#[error("database error: {0}")]
	Db(#[from] DbError),

	#[error("provisioning error: {0}")]
	Provision(#[from] ProvisionError),

	#[error("setup task stopped before reporting readiness")]
	TaskStopped,
}

/// Handle for ending an end-to-end run.
///
/// `finish` signals the background task to tear down and returns without
/// waiting; `join` waits for the task (and therefore revocation) to
/// complete. Both are safe to call more than once.
pub struct Teardown {
	done: Mutex<Option<oneshot::Sender<()>>>,
	task: Mutex<Option<JoinHandle<()>>>,
}

impl Teardown {
	/// Signal the background task to proceed to teardown. Fire-and-forget;
	/// repeated calls are no-ops.
	pub fn finish(&self) {
		let sender = self.done.lock().expect("teardown lock poisoned").take();
		if let Some(tx) = sender {
			// Send fails only if the task already exited, which is fine.
			let _ = tx.send(());
		}
	}

	/// Wait for the background task to complete teardown. Call after
	/// `finish` (or after cancelling the ambient token) when the process
	/// must not exit before revocation has run.
	pub async fn join(&self) {
		let handle = self.task.lock().expect("teardown lock poisoned").take();
		if let Some(handle) = handle {
			if let Err(e) = handle.await {
				tracing::error!(error = %e, "lifecycle task panicked");
			}
		}
	}
}

/// Ordered stack of cleanup actions, executed in reverse push order.
///
/// A failing action is logged and does not stop the remaining actions from
/// running.
struct CleanupStack {
	actions: Vec<(&'static str, CleanupFn)>,
}

type CleanupFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), DbError>> + Send>;

impl CleanupStack {
	fn new() -> Self {
		Self {
			actions: Vec::new(),
		}
	}

	fn push<F, Fut>(&mut self, label: &'static str, action: F)
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<(), DbError>> + Send + 'static,
	{
		self.actions.push((label, Box::new(move || Box::pin(action()))));
	}

	async fn run(mut self) {
		while let Some((label, action)) = self.actions.pop() {
			match action().await {
				Ok(()) => tracing::info!(action = label, "cleanup complete"),
				Err(e) => tracing::error!(action = label, error = %e, "cleanup failed"),
			}
		}
	}
}

/// Set up the end-to-end environment (database and authorized apps).
///
/// Blocks until the background task has either provisioned the credentials
/// or failed. On success the key values are written into `config.test` and
/// the returned [`Teardown`] must be used to end the run; on failure no
/// credential exists and there is nothing to tear down.
///
/// Cancelling `cancel` unblocks the background task the same way `finish`
/// does; both lead to the same revocation path.
pub async fn setup(
	cancel: CancellationToken,
	config: &mut RunnerConfig,
) -> Result<Teardown, SetupError> {
	let (ready_tx, ready_rx) = oneshot::channel();
	let (done_tx, done_rx) = oneshot::channel();

	let database_url = config.database.url.clone();
	let handle = tokio::spawn(lifecycle_task(database_url, cancel, ready_tx, done_rx));

	let keys = match ready_rx.await {
		Ok(Ok(keys)) => keys,
		Ok(Err(e)) => return Err(e),
		Err(_) => return Err(SetupError::TaskStopped),
	};

	config.test.admin_api_key = keys.admin_key;
	config.test.device_api_key = keys.device_key;

	Ok(Teardown {
		done: Mutex::new(Some(done_tx)),
		task: Mutex::new(Some(handle)),
	})
}

async fn lifecycle_task(
	database_url: String,
	cancel: CancellationToken,
	ready: oneshot::Sender<Result<ProvisionedKeys, SetupError>>,
	mut done: oneshot::Receiver<()>,
) {
	let pool = match create_pool(&database_url).await {
		Ok(pool) => pool,
		Err(e) => {
			report_setup_failure(ready, e.into());
			return;
		}
	};

	if let Err(e) = run_migrations(&pool).await {
		report_setup_failure(ready, e.into());
		pool.close().await;
		return;
	}

	let keys = match provision(&pool, REALM_NAME, REALM_REGION_CODE).await {
		Ok(keys) => keys,
		Err(e) => {
			report_setup_failure(ready, e.into());
			pool.close().await;
			return;
		}
	};

	// Registered in creation order, executed in reverse: device key is
	// revoked first, then the admin key.
	let mut cleanups = CleanupStack::new();
	{
		let pool = pool.clone();
		let key = keys.admin_key.clone();
		cleanups.push("admin API key", move || revoke_key(pool, key));
	}
	{
		let pool = pool.clone();
		let key = keys.device_key.clone();
		cleanups.push("device API key", move || revoke_key(pool, key));
	}

	if ready.send(Ok(keys)).is_err() {
		tracing::warn!("setup caller went away before readiness; tearing down immediately");
	}

	tokio::select! {
		_ = &mut done => {
			tracing::debug!("teardown signal received");
		}
		_ = cancel.cancelled() => {
			tracing::debug!("ambient cancellation received");
		}
	}

	cleanups.run().await;
	pool.close().await;
	tracing::info!("end-to-end lifecycle complete");
}

fn report_setup_failure(
	ready: oneshot::Sender<Result<ProvisionedKeys, SetupError>>,
	err: SetupError,
) {
	tracing::error!(error = %err, "end-to-end setup failed");
	let _ = ready.send(Err(err));
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;

	#[tokio::test]
	async fn test_cleanup_stack_runs_in_reverse_and_survives_failures() {
		let order = Arc::new(Mutex::new(Vec::new()));
		let mut stack = CleanupStack::new();

		let log = Arc::clone(&order);
		stack.push("first", move || async move {
			log.lock().unwrap().push("first");
			Ok(())
		});
		let log = Arc::clone(&order);
		stack.push("second", move || async move {
			log.lock().unwrap().push("second");
			Err(DbError::Internal("boom".to_string()))
		});
		let log = Arc::clone(&order);
		stack.push("third", move || async move {
			log.lock().unwrap().push("third");
			Ok(())
		});

		stack.run().await;

		let order = order.lock().unwrap();
		assert_eq!(*order, vec!["third", "second", "first"]);
	}

	#[tokio::test]
	async fn test_finish_is_idempotent() {
		let (done_tx, done_rx) = oneshot::channel();
		let counter = Arc::new(AtomicUsize::new(0));
		let task_counter = Arc::clone(&counter);
		let handle = tokio::spawn(async move {
			let _ = done_rx.await;
			task_counter.fetch_add(1, Ordering::SeqCst);
		});

		let teardown = Teardown {
			done: Mutex::new(Some(done_tx)),
			task: Mutex::new(Some(handle)),
		};

		teardown.finish();
		teardown.finish();
		teardown.join().await;
		teardown.join().await;

		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}
}

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use rcstream_runtime::{Collaborators, ConnectionManager, ConnectionState, HttpTransport};
use tracing::info;

use crate::config::Resolved;
use crate::consumer::ChunkForwarder;
use crate::output::PrintingListener;

pub async fn execute(resolved: Resolved) -> Result<()> {
	let transport = HttpTransport::new().context("failed to create HTTP transport")?;
	let collaborators = Collaborators {
		versions: resolved.versions(),
		auth: resolved.auth(),
		identity: resolved.identity(),
		transport: Arc::new(transport),
		consumer: Arc::new(ChunkForwarder),
	};

	let manager = ConnectionManager::start(resolved.manager.clone(), collaborators);
	let listener = Arc::new(PrintingListener::default());
	let _registration = manager.add_listener(listener.clone());
	info!(
		target = "rcstream.cli",
		namespace = %resolved.manager.namespace,
		"listening for config updates; press Ctrl-C to stop"
	);

	let mut state = manager.watch_state();
	let failed = tokio::select! {
		signal = tokio::signal::ctrl_c() => {
			signal.context("failed to listen for Ctrl-C")?;
			false
		}
		changed = state.wait_for(|s| *s == ConnectionState::Failed) => changed.is_ok(),
	};

	manager.shutdown().await;
	info!(target = "rcstream.cli", updates = listener.updates(), "stopped");

	if failed {
		bail!("realtime stream unavailable after retries");
	}
	Ok(())
}

use anyhow::{Context, Result};
use rcstream_runtime::RequestBuilder;

use crate::config::Resolved;
use crate::output;

pub async fn execute(resolved: Resolved) -> Result<()> {
	let builder = RequestBuilder::new(
		&resolved.manager,
		resolved.versions(),
		resolved.auth(),
		resolved.identity(),
	);
	let request = builder.build().await.context("failed to build stream request")?;
	print!("{}", output::render_request(&request)?);
	Ok(())
}

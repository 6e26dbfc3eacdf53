mod listen;
mod request;

use anyhow::Result;

use crate::cli::{Cli, Commands};
use crate::config::{self, Resolved};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let file = config::load(cli.config.as_deref())?;

	match cli.command {
		Commands::Listen(args) => listen::execute(Resolved::merge(args, file)?).await,
		Commands::Request(args) => request::execute(Resolved::merge(args, file)?).await,
	}
}

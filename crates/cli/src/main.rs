use clap::Parser;
use colored::Colorize;
use rcstream_cli::cli::Cli;
use rcstream_cli::error::CliError;
use rcstream_cli::{commands, logging};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = commands::dispatch(cli).await {
		handle_error(&err);
		std::process::exit(1);
	}
}

fn handle_error(err: &anyhow::Error) {
	eprintln!("{} {err:#}", "error:".red().bold());
	if err.downcast_ref::<CliError>().is_some_and(CliError::is_config_file_error) {
		eprintln!("hint: pass --config <FILE> or fix the file at the default location");
	}
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rcstream")]
#[command(about = "Realtime config stream client")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Config file (defaults to <config dir>/rcstream/config.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Hold a realtime stream open and print update notifications
	Listen(StreamArgs),

	/// Print the request that would open the stream, without sending it
	Request(StreamArgs),
}

/// Connection settings. Each overrides the config file.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamArgs {
	/// Application id, e.g. 1:123456789:android:abcdef
	#[arg(long, env = "RCSTREAM_APP_ID", value_name = "ID")]
	pub app_id: Option<String>,

	/// API key sent with every request
	#[arg(long, env = "RCSTREAM_API_KEY", value_name = "KEY", hide_env_values = true)]
	pub api_key: Option<String>,

	/// Installation auth token
	#[arg(long, env = "RCSTREAM_INSTALLATION_TOKEN", value_name = "TOKEN", hide_env_values = true)]
	pub installation_token: Option<String>,

	/// Config namespace
	#[arg(short, long)]
	pub namespace: Option<String>,

	/// Base URL of the realtime endpoint
	#[arg(long, value_name = "URL")]
	pub endpoint: Option<String>,

	/// Package name reported to the backend
	#[arg(long, value_name = "NAME")]
	pub package_name: Option<String>,

	/// Signing certificate SHA-1 as hex, colons allowed
	#[arg(long, value_name = "HEX")]
	pub cert_fingerprint: Option<String>,

	/// Template version the client already holds
	#[arg(long, value_name = "N")]
	pub template_version: Option<i64>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_listen_with_global_flags_after_subcommand() {
		let cli = Cli::try_parse_from([
			"rcstream",
			"listen",
			"--app-id",
			"1:123:web:abc",
			"-n",
			"ns1",
			"-vv",
			"--config",
			"/tmp/rc.json",
		])
		.unwrap();

		assert_eq!(cli.verbose, 2);
		assert_eq!(cli.config, Some(PathBuf::from("/tmp/rc.json")));
		let Commands::Listen(args) = cli.command else {
			panic!("expected listen");
		};
		assert_eq!(args.app_id.as_deref(), Some("1:123:web:abc"));
		assert_eq!(args.namespace.as_deref(), Some("ns1"));
	}

	#[test]
	fn rejects_non_numeric_template_version() {
		let result = Cli::try_parse_from(["rcstream", "request", "--template-version", "latest"]);
		assert!(result.is_err());
	}

	#[test]
	fn command_definition_is_consistent() {
		use clap::CommandFactory;
		Cli::command().debug_assert();
	}
}

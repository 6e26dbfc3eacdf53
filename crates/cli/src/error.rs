use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

/// Configuration problems reported before any connection is attempted.
#[derive(Debug, Error)]
pub enum CliError {
	#[error("failed to read config file {path}")]
	ConfigRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid config file {path}")]
	ConfigParse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("missing {field}: pass {flag} or set it in the config file")]
	Missing { field: &'static str, flag: &'static str },

	#[error("invalid certificate fingerprint '{0}': expected hex bytes, optionally colon-separated")]
	InvalidFingerprint(String),
}

impl CliError {
	/// True for errors the user fixes by editing the config file.
	pub fn is_config_file_error(&self) -> bool {
		matches!(self, CliError::ConfigRead { .. } | CliError::ConfigParse { .. })
	}
}

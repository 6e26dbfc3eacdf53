//! Config file loading and merging with command-line settings.
//!
//! Precedence: flags and `RCSTREAM_*` environment variables, then the JSON
//! config file, then built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rcstream_protocol::fingerprint_hex;
use rcstream_runtime::{
	InstallationAuth, ManagerConfig, PlatformIdentity, RetryConfig, StaticIdentity, StaticToken, StaticVersion,
	TemplateVersionSource,
};
use serde::{Deserialize, Serialize};

use crate::cli::StreamArgs;
use crate::error::{CliError, Result};

const DEFAULT_PACKAGE_NAME: &str = "rcstream";

/// On-disk settings. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub app_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub api_key: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub installation_token: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub namespace: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub endpoint: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub package_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cert_fingerprint: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub template_version: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_timeout_ms: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub open_timeout_ms: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_retries: Option<u32>,
}

/// `<config dir>/rcstream/config.json`, if the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join("rcstream").join("config.json"))
}

/// Loads the config file.
///
/// An explicit `path` must exist. Without one, a missing default file yields
/// an empty config.
pub fn load(path: Option<&Path>) -> Result<FileConfig> {
	match path {
		Some(path) => read(path),
		None => match default_path() {
			Some(path) if path.exists() => read(&path),
			_ => Ok(FileConfig::default()),
		},
	}
}

fn read(path: &Path) -> Result<FileConfig> {
	let content = fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
		path: path.to_path_buf(),
		source,
	})?;
	serde_json::from_str(&content).map_err(|source| CliError::ConfigParse {
		path: path.to_path_buf(),
		source,
	})
}

/// Fully merged settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
	pub manager: ManagerConfig,
	pub installation_token: Option<String>,
	pub package_name: String,
	pub cert_fingerprint: Option<String>,
	pub template_version: i64,
}

impl Resolved {
	pub fn merge(args: StreamArgs, file: FileConfig) -> Result<Self> {
		let app_id = args.app_id.or(file.app_id).ok_or(CliError::Missing {
			field: "application id",
			flag: "--app-id",
		})?;
		let api_key = args.api_key.or(file.api_key).ok_or(CliError::Missing {
			field: "API key",
			flag: "--api-key",
		})?;

		let mut manager = ManagerConfig::new(app_id, api_key);
		if let Some(namespace) = args.namespace.or(file.namespace) {
			manager = manager.with_namespace(namespace);
		}
		if let Some(endpoint) = args.endpoint.or(file.endpoint) {
			manager = manager.with_endpoint(endpoint);
		}
		if let Some(ms) = file.token_timeout_ms {
			manager = manager.with_token_timeout(Duration::from_millis(ms));
		}
		if let Some(ms) = file.open_timeout_ms {
			manager = manager.with_open_timeout(Duration::from_millis(ms));
		}
		if let Some(max) = file.max_retries {
			manager = manager.with_retry(RetryConfig::default().with_max_retries(max));
		}

		let cert_fingerprint = args
			.cert_fingerprint
			.or(file.cert_fingerprint)
			.map(|raw| normalize_fingerprint(&raw))
			.transpose()?;

		Ok(Self {
			manager,
			installation_token: args.installation_token.or(file.installation_token),
			package_name: args
				.package_name
				.or(file.package_name)
				.unwrap_or_else(|| DEFAULT_PACKAGE_NAME.to_string()),
			cert_fingerprint,
			template_version: args.template_version.or(file.template_version).unwrap_or(0),
		})
	}

	pub fn versions(&self) -> Arc<dyn TemplateVersionSource> {
		Arc::new(StaticVersion::new(self.template_version))
	}

	pub fn auth(&self) -> Arc<dyn InstallationAuth> {
		match &self.installation_token {
			Some(token) => Arc::new(StaticToken::new(token.clone())),
			None => Arc::new(StaticToken::none()),
		}
	}

	pub fn identity(&self) -> Arc<dyn PlatformIdentity> {
		Arc::new(StaticIdentity::new(
			self.package_name.clone(),
			self.cert_fingerprint.clone(),
		))
	}
}

/// Accepts `ab:cd:ef` or `abcdef` in either case and renders uppercase hex.
pub fn normalize_fingerprint(raw: &str) -> Result<String> {
	let invalid = || CliError::InvalidFingerprint(raw.to_string());
	let digits: String = raw.chars().filter(|c| *c != ':').collect();
	if digits.is_empty() || digits.len() % 2 != 0 || !digits.is_ascii() {
		return Err(invalid());
	}

	let bytes = (0..digits.len())
		.step_by(2)
		.map(|i| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid()))
		.collect::<Result<Vec<u8>>>()?;
	Ok(fingerprint_hex(&bytes))
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use tempfile::NamedTempFile;

	use super::*;

	fn write_config(json: &str) -> NamedTempFile {
		let mut file = NamedTempFile::new().unwrap();
		file.write_all(json.as_bytes()).unwrap();
		file
	}

	fn args() -> StreamArgs {
		StreamArgs {
			app_id: Some("1:123456789:android:abcdef".to_string()),
			api_key: Some("flag-key".to_string()),
			..Default::default()
		}
	}

	#[test]
	fn loads_camel_case_fields() {
		let file = write_config(
			r#"{"appId": "1:42:web:ff", "namespace": "ns1", "templateVersion": 7, "tokenTimeoutMs": 500, "openTimeoutMs": 9000}"#,
		);
		let config = load(Some(file.path())).unwrap();
		assert_eq!(config.app_id.as_deref(), Some("1:42:web:ff"));
		assert_eq!(config.namespace.as_deref(), Some("ns1"));
		assert_eq!(config.template_version, Some(7));
		assert_eq!(config.token_timeout_ms, Some(500));
		assert_eq!(config.open_timeout_ms, Some(9000));
		assert_eq!(config.api_key, None);
	}

	#[test]
	fn explicit_missing_file_is_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let err = load(Some(&dir.path().join("absent.json"))).unwrap_err();
		assert!(matches!(err, CliError::ConfigRead { .. }));
		assert!(err.is_config_file_error());
	}

	#[test]
	fn malformed_file_is_a_parse_error() {
		let file = write_config("{ not json");
		let err = load(Some(file.path())).unwrap_err();
		assert!(matches!(err, CliError::ConfigParse { .. }));
	}

	#[test]
	fn flags_override_file() {
		let file = FileConfig {
			api_key: Some("file-key".to_string()),
			namespace: Some("file-ns".to_string()),
			package_name: Some("com.example.file".to_string()),
			max_retries: Some(3),
			open_timeout_ms: Some(15_000),
			..Default::default()
		};
		let mut args = args();
		args.namespace = Some("flag-ns".to_string());

		let resolved = Resolved::merge(args, file).unwrap();
		assert_eq!(resolved.manager.api_key, "flag-key");
		assert_eq!(resolved.manager.namespace, "flag-ns");
		assert_eq!(resolved.manager.retry.max_retries, 3);
		assert_eq!(resolved.manager.open_timeout, Duration::from_secs(15));
		assert_eq!(resolved.package_name, "com.example.file");
		assert_eq!(resolved.template_version, 0);
		assert_eq!(resolved.installation_token, None);
	}

	#[test]
	fn defaults_apply_when_unset() {
		let resolved = Resolved::merge(args(), FileConfig::default()).unwrap();
		assert_eq!(resolved.manager.namespace, rcstream_runtime::DEFAULT_NAMESPACE);
		assert_eq!(
			resolved.manager.endpoint,
			rcstream_protocol::DEFAULT_REALTIME_ENDPOINT
		);
		assert_eq!(resolved.package_name, DEFAULT_PACKAGE_NAME);
		assert_eq!(resolved.cert_fingerprint, None);
	}

	#[test]
	fn missing_app_id_is_reported() {
		let args = StreamArgs {
			api_key: Some("key".to_string()),
			..Default::default()
		};
		let err = Resolved::merge(args, FileConfig::default()).unwrap_err();
		assert!(matches!(err, CliError::Missing { flag: "--app-id", .. }));
	}

	#[test]
	fn fingerprint_is_normalized() {
		assert_eq!(normalize_fingerprint("ab:cd:0f").unwrap(), "ABCD0F");
		assert_eq!(normalize_fingerprint("ABCD0F").unwrap(), "ABCD0F");
		assert!(normalize_fingerprint("abc").is_err());
		assert!(normalize_fingerprint("zz").is_err());
		assert!(normalize_fingerprint("").is_err());
		assert!(normalize_fingerprint("é0").is_err());
	}
}

//! Application identifier parsing.
//!
//! An application id has the shape `<prefix>:<project-number>:<platform>:<hex>`,
//! e.g. `1:123456789:android:abcdef`. Only the project number is needed on the
//! wire, but the whole id is validated so a typo fails early.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

static APP_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^[^:]+:([0-9]+):(android|ios|web):([0-9a-f]+)$").expect("app id pattern is valid")
});

/// Platform segment of an application id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
	Android,
	Ios,
	Web,
}

impl Platform {
	fn from_segment(segment: &str) -> Option<Self> {
		match segment {
			"android" => Some(Self::Android),
			"ios" => Some(Self::Ios),
			"web" => Some(Self::Web),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Android => "android",
			Self::Ios => "ios",
			Self::Web => "web",
		}
	}
}

impl fmt::Display for Platform {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A validated application identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppId {
	raw: String,
	project_number: String,
	platform: Platform,
}

impl AppId {
	/// Parses and validates an application id.
	///
	/// # Errors
	///
	/// Returns [`ProtocolError::InvalidAppId`] if `raw` does not match
	/// `<prefix>:<digits>:<android|ios|web>:<lowercase hex>` in full.
	pub fn parse(raw: &str) -> Result<Self> {
		let invalid = || ProtocolError::InvalidAppId(raw.to_string());
		let captures = APP_ID_PATTERN.captures(raw).ok_or_else(invalid)?;

		let project_number = captures.get(1).ok_or_else(invalid)?.as_str().to_string();
		let platform = captures
			.get(2)
			.and_then(|m| Platform::from_segment(m.as_str()))
			.ok_or_else(invalid)?;

		Ok(Self {
			raw: raw.to_string(),
			project_number,
			platform,
		})
	}

	/// Project number segment, e.g. `"123456789"`.
	pub fn project_number(&self) -> &str {
		&self.project_number
	}

	pub fn platform(&self) -> Platform {
		self.platform
	}

	pub fn as_str(&self) -> &str {
		&self.raw
	}
}

impl fmt::Display for AppId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.raw)
	}
}

impl std::str::FromStr for AppId {
	type Err = ProtocolError;

	fn from_str(s: &str) -> Result<Self> {
		Self::parse(s)
	}
}

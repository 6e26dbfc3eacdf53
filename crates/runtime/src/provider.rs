//! Collaborators the connection manager calls out to.
//!
//! None of these are implemented here beyond static stand-ins: the fetch
//! subsystem owns the template version, the installation service owns auth
//! tokens, and the host platform owns package identity.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::{Error, Result};

/// Boxed, sendable future returned by collaborator and transport traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of the template version the client already holds.
///
/// Read live each time a request is built, never cached by the manager.
pub trait TemplateVersionSource: Send + Sync {
	fn current_template_version(&self) -> i64;
}

/// Installation auth token provider.
///
/// Best effort: a failed or slow fetch only drops the auth header.
pub trait InstallationAuth: Send + Sync {
	fn fetch_token(&self) -> BoxFuture<'_, Result<String>>;
}

/// Identity of the host package, used for API key restrictions.
pub trait PlatformIdentity: Send + Sync {
	fn package_name(&self) -> String;

	/// Uppercase hex certificate fingerprint, or `None` if unavailable.
	fn certificate_fingerprint(&self) -> Option<String>;
}

/// Version source backed by an atomic the owner can update.
#[derive(Debug, Default)]
pub struct StaticVersion(AtomicI64);

impl StaticVersion {
	pub fn new(version: i64) -> Self {
		Self(AtomicI64::new(version))
	}

	pub fn set(&self, version: i64) {
		self.0.store(version, Ordering::SeqCst);
	}
}

impl TemplateVersionSource for StaticVersion {
	fn current_template_version(&self) -> i64 {
		self.0.load(Ordering::SeqCst)
	}
}

/// Token provider returning a fixed token, or failing when there is none.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
	pub fn new(token: impl Into<String>) -> Self {
		Self(Some(token.into()))
	}

	pub fn none() -> Self {
		Self(None)
	}
}

impl InstallationAuth for StaticToken {
	fn fetch_token(&self) -> BoxFuture<'_, Result<String>> {
		Box::pin(async move {
			self.0
				.clone()
				.ok_or_else(|| Error::TokenUnavailable("no installation token configured".to_string()))
		})
	}
}

/// Platform identity with fixed values.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
	pub package_name: String,
	pub certificate_fingerprint: Option<String>,
}

impl StaticIdentity {
	pub fn new(package_name: impl Into<String>, certificate_fingerprint: Option<String>) -> Self {
		Self {
			package_name: package_name.into(),
			certificate_fingerprint,
		}
	}
}

impl PlatformIdentity for StaticIdentity {
	fn package_name(&self) -> String {
		self.package_name.clone()
	}

	fn certificate_fingerprint(&self) -> Option<String> {
		self.certificate_fingerprint.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn static_version_reads_latest_value() {
		let version = StaticVersion::new(3);
		assert_eq!(version.current_template_version(), 3);
		version.set(11);
		assert_eq!(version.current_template_version(), 11);
	}

	#[tokio::test]
	async fn static_token_without_value_fails() {
		let err = StaticToken::none().fetch_token().await.unwrap_err();
		assert!(matches!(err, Error::TokenUnavailable(_)), "{err:?}");
		assert_eq!(StaticToken::new("abc").fetch_token().await.unwrap(), "abc");
	}
}

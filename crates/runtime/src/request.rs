//! Assembly of the request that opens a realtime stream.
//!
//! The URL and body come from a per-attempt [`RequestContext`]; headers come
//! from the API key plus the platform identity and installation auth
//! collaborators. The installation token is fetched with a bounded wait and
//! left out if it does not arrive.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rcstream_protocol::{AppId, StreamRequestBody, headers, realtime_url};
use tracing::debug;
use url::Url;

use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::provider::{InstallationAuth, PlatformIdentity, TemplateVersionSource};

/// Read-only data for one open attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
	pub namespace: String,
	pub project_number: String,
	pub last_known_version: i64,
}

/// A fully assembled stream-open request. Always a `POST`.
#[derive(Clone, PartialEq, Eq)]
pub struct StreamRequest {
	pub url: Url,
	pub headers: Vec<(&'static str, String)>,
	pub body: StreamRequestBody,
}

impl StreamRequest {
	pub fn method(&self) -> &'static str {
		"POST"
	}

	/// First value of header `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	pub fn body_bytes(&self) -> Result<Vec<u8>> {
		Ok(self.body.to_json_bytes()?)
	}

	/// Headers with secret values replaced, for logs and dry runs.
	pub fn redacted_headers(&self) -> Vec<(&'static str, String)> {
		self.headers
			.iter()
			.map(|(name, value)| {
				let shown = if headers::is_sensitive(name) {
					"<redacted>".to_string()
				} else {
					value.clone()
				};
				(*name, shown)
			})
			.collect()
	}
}

impl fmt::Debug for StreamRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("StreamRequest")
			.field("url", &self.url.as_str())
			.field("headers", &self.redacted_headers())
			.field("body", &self.body)
			.finish()
	}
}

/// Builds [`StreamRequest`]s for one namespace.
pub struct RequestBuilder {
	endpoint: String,
	namespace: String,
	app_id: String,
	api_key: String,
	token_timeout: Duration,
	versions: Arc<dyn TemplateVersionSource>,
	auth: Arc<dyn InstallationAuth>,
	identity: Arc<dyn PlatformIdentity>,
}

impl RequestBuilder {
	pub fn new(
		config: &ManagerConfig,
		versions: Arc<dyn TemplateVersionSource>,
		auth: Arc<dyn InstallationAuth>,
		identity: Arc<dyn PlatformIdentity>,
	) -> Self {
		Self {
			endpoint: config.endpoint.clone(),
			namespace: config.namespace.clone(),
			app_id: config.app_id.clone(),
			api_key: config.api_key.clone(),
			token_timeout: config.token_timeout,
			versions,
			auth,
			identity,
		}
	}

	/// Captures the per-attempt context, reading the template version live.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidAppId`] if the configured application id does not parse.
	pub fn context(&self) -> Result<RequestContext> {
		let app_id = AppId::parse(&self.app_id)?;
		Ok(RequestContext {
			namespace: self.namespace.clone(),
			project_number: app_id.project_number().to_string(),
			last_known_version: self.versions.current_template_version(),
		})
	}

	/// Builds the request for `ctx` without the installation token.
	///
	/// # Errors
	///
	/// Returns [`Error::MalformedEndpoint`] if the endpoint, project or
	/// namespace cannot be composed into an absolute http(s) URL.
	pub fn build_request(&self, ctx: &RequestContext) -> Result<StreamRequest> {
		let url = self.url_for(ctx)?;

		let mut request_headers = vec![
			(headers::API_KEY, self.api_key.clone()),
			(headers::PACKAGE, self.identity.package_name()),
		];
		if let Some(fingerprint) = self.identity.certificate_fingerprint() {
			request_headers.push((headers::CERT, fingerprint));
		}
		request_headers.extend([
			(headers::CAN_RETRY, headers::CAN_RETRY_VALUE.to_string()),
			(
				headers::ACCEPT_RESPONSE_STREAMING,
				headers::ACCEPT_RESPONSE_STREAMING_VALUE.to_string(),
			),
			(headers::CONTENT_TYPE, headers::JSON.to_string()),
			(headers::ACCEPT, headers::JSON.to_string()),
		]);

		Ok(StreamRequest {
			url,
			headers: request_headers,
			body: StreamRequestBody::new(&ctx.project_number, &ctx.namespace, ctx.last_known_version),
		})
	}

	/// Builds the request for the next attempt, including the installation
	/// token when it arrives within the configured timeout.
	pub async fn build(&self) -> Result<StreamRequest> {
		let ctx = self.context()?;
		let mut request = self.build_request(&ctx)?;
		if let Some(token) = self.installation_token().await {
			request.headers.push((headers::INSTALLATIONS_AUTH, token));
		}
		debug!(
			target = "rcstream.request",
			url = %request.url,
			namespace = %ctx.namespace,
			last_known_version = ctx.last_known_version,
			authenticated = request.header(headers::INSTALLATIONS_AUTH).is_some(),
			"built stream request"
		);
		Ok(request)
	}

	async fn installation_token(&self) -> Option<String> {
		match tokio::time::timeout(self.token_timeout, self.auth.fetch_token()).await {
			Ok(Ok(token)) => Some(token),
			Ok(Err(e)) => {
				debug!(target = "rcstream.request", error = %e, "installation token unavailable; continuing without it");
				None
			}
			Err(_) => {
				debug!(
					target = "rcstream.request",
					timeout_ms = self.token_timeout.as_millis() as u64,
					"installation token fetch timed out; continuing without it"
				);
				None
			}
		}
	}

	fn url_for(&self, ctx: &RequestContext) -> Result<Url> {
		if ctx.namespace.is_empty() || ctx.namespace.contains(['/', '?', '#']) {
			return Err(Error::MalformedEndpoint(format!("invalid namespace '{}'", ctx.namespace)));
		}
		if ctx.project_number.is_empty() || !ctx.project_number.bytes().all(|b| b.is_ascii_digit()) {
			return Err(Error::MalformedEndpoint(format!(
				"invalid project number '{}'",
				ctx.project_number
			)));
		}

		let raw = realtime_url(&self.endpoint, &ctx.project_number, &ctx.namespace);
		let url = Url::parse(&raw).map_err(|e| Error::MalformedEndpoint(format!("{raw}: {e}")))?;
		if matches!(url.scheme(), "http" | "https") && url.has_host() {
			Ok(url)
		} else {
			Err(Error::MalformedEndpoint(format!("{raw}: not an http(s) URL")))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::provider::{BoxFuture, StaticIdentity, StaticToken, StaticVersion};

	fn config() -> ManagerConfig {
		ManagerConfig::new("1:123:android:abcdef", "api-key")
			.with_namespace("ns1")
			.with_endpoint("https://rt.example.com/v1/projects")
	}

	fn builder_with(config: &ManagerConfig, auth: Arc<dyn InstallationAuth>) -> RequestBuilder {
		RequestBuilder::new(
			config,
			Arc::new(StaticVersion::new(42)),
			auth,
			Arc::new(StaticIdentity::new("com.example.app", Some("AB12".to_string()))),
		)
	}

	struct NeverToken;

	impl InstallationAuth for NeverToken {
		fn fetch_token(&self) -> BoxFuture<'_, Result<String>> {
			Box::pin(std::future::pending())
		}
	}

	#[test]
	fn builds_url_and_body() {
		let builder = builder_with(&config(), Arc::new(StaticToken::none()));
		let ctx = RequestContext {
			namespace: "ns1".to_string(),
			project_number: "123".to_string(),
			last_known_version: 42,
		};
		let request = builder.build_request(&ctx).unwrap();

		assert_eq!(request.method(), "POST");
		assert_eq!(request.url.as_str(), "https://rt.example.com/v1/projects/123/namespaces/ns1");
		assert_eq!(
			String::from_utf8(request.body_bytes().unwrap()).unwrap(),
			r#"{"project":"123","namespace":"ns1","lastKnownVersionNumber":"42"}"#
		);
	}

	#[test]
	fn sets_protocol_headers() {
		let builder = builder_with(&config(), Arc::new(StaticToken::none()));
		let request = builder.build_request(&builder.context().unwrap()).unwrap();

		assert_eq!(request.header(headers::API_KEY), Some("api-key"));
		assert_eq!(request.header(headers::PACKAGE), Some("com.example.app"));
		assert_eq!(request.header(headers::CERT), Some("AB12"));
		assert_eq!(request.header("x-google-gfe-can-retry"), Some("yes"));
		assert_eq!(request.header(headers::ACCEPT_RESPONSE_STREAMING), Some("true"));
		assert_eq!(request.header(headers::CONTENT_TYPE), Some("application/json"));
		assert_eq!(request.header(headers::ACCEPT), Some("application/json"));
		assert_eq!(request.header(headers::INSTALLATIONS_AUTH), None);
	}

	#[test]
	fn omits_cert_header_without_fingerprint() {
		let builder = RequestBuilder::new(
			&config(),
			Arc::new(StaticVersion::new(1)),
			Arc::new(StaticToken::none()),
			Arc::new(StaticIdentity::new("com.example.app", None)),
		);
		let request = builder.build_request(&builder.context().unwrap()).unwrap();
		assert_eq!(request.header(headers::CERT), None);
	}

	#[test]
	fn context_reads_version_live() {
		let versions = Arc::new(StaticVersion::new(1));
		let builder = RequestBuilder::new(
			&config(),
			versions.clone(),
			Arc::new(StaticToken::none()),
			Arc::new(StaticIdentity::default()),
		);
		assert_eq!(builder.context().unwrap().last_known_version, 1);
		versions.set(9);
		assert_eq!(builder.context().unwrap().last_known_version, 9);
		assert_eq!(builder.context().unwrap().project_number, "123");
	}

	#[test]
	fn rejects_bad_namespace_and_endpoint() {
		let builder = builder_with(&config().with_namespace("a/b"), Arc::new(StaticToken::none()));
		let err = builder.build_request(&builder.context().unwrap()).unwrap_err();
		assert!(matches!(err, Error::MalformedEndpoint(_)), "{err:?}");

		let builder = builder_with(&config().with_endpoint("not a url"), Arc::new(StaticToken::none()));
		let err = builder.build_request(&builder.context().unwrap()).unwrap_err();
		assert!(matches!(err, Error::MalformedEndpoint(_)), "{err:?}");

		let builder = builder_with(&config().with_endpoint("ftp://rt.example.com"), Arc::new(StaticToken::none()));
		let err = builder.build_request(&builder.context().unwrap()).unwrap_err();
		assert!(matches!(err, Error::MalformedEndpoint(_)), "{err:?}");
	}

	#[test]
	fn invalid_app_id_fails_context() {
		let config = ManagerConfig::new("not-an-app-id", "key");
		let builder = builder_with(&config, Arc::new(StaticToken::none()));
		assert!(matches!(builder.context(), Err(Error::InvalidAppId(_))));
	}

	#[tokio::test]
	async fn build_adds_token_when_available() {
		let builder = builder_with(&config(), Arc::new(StaticToken::new("fis-token")));
		let request = builder.build().await.unwrap();
		assert_eq!(request.header(headers::INSTALLATIONS_AUTH), Some("fis-token"));
	}

	#[tokio::test]
	async fn build_proceeds_without_failed_token() {
		let builder = builder_with(&config(), Arc::new(StaticToken::none()));
		let request = builder.build().await.unwrap();
		assert_eq!(request.header(headers::INSTALLATIONS_AUTH), None);
		assert_eq!(request.header(headers::API_KEY), Some("api-key"));
	}

	#[tokio::test(start_paused = true)]
	async fn build_does_not_wait_forever_for_token() {
		let builder = builder_with(&config(), Arc::new(NeverToken));
		let request = builder.build().await.unwrap();
		assert_eq!(request.header(headers::INSTALLATIONS_AUTH), None);
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let mut request = builder_with(&config(), Arc::new(StaticToken::none()))
			.build_request(&RequestContext {
				namespace: "ns1".to_string(),
				project_number: "123".to_string(),
				last_known_version: 0,
			})
			.unwrap();
		request.headers.push((headers::INSTALLATIONS_AUTH, "secret-token".to_string()));
		let rendered = format!("{request:?}");
		assert!(!rendered.contains("api-key"));
		assert!(!rendered.contains("secret-token"));
		assert!(rendered.contains("com.example.app"));
	}
}

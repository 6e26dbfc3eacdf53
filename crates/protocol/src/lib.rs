//! Wire types for the realtime config update stream.
//!
//! Everything needed to describe the request that opens a stream, with no
//! async and no I/O:
//!
//! - [`AppId`] - parsed application identifier (`X:<project-number>:<platform>:<hex>`)
//! - [`StreamRequestBody`] - the JSON body posted to the realtime endpoint
//! - [`headers`] - header names and fixed protocol header values
//! - [`realtime_url`] - endpoint template for a project and namespace

pub mod app_id;
pub mod body;
pub mod error;
pub mod headers;

pub use app_id::{AppId, Platform};
pub use body::StreamRequestBody;
pub use error::{ProtocolError, Result};
pub use headers::fingerprint_hex;

/// Default base URL of the realtime endpoint.
pub const DEFAULT_REALTIME_ENDPOINT: &str =
	"https://firebaseremoteconfigrealtime.googleapis.com/v1/projects";

/// Composes `<endpoint>/<project>/namespaces/<namespace>`.
///
/// Trailing slashes on `endpoint` are ignored. The caller validates the result.
pub fn realtime_url(endpoint: &str, project_number: &str, namespace: &str) -> String {
	format!(
		"{}/{}/namespaces/{}",
		endpoint.trim_end_matches('/'),
		project_number,
		namespace
	)
}

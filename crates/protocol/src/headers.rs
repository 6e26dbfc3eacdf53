//! Header names and fixed values for the stream-open request.

/// API key of the application.
pub const API_KEY: &str = "X-Goog-Api-Key";
/// Platform package identifier, used for API key restrictions.
pub const PACKAGE: &str = "X-Android-Package";
/// Uppercase hex SHA-1 of the platform signing certificate.
pub const CERT: &str = "X-Android-Cert";
/// Tells the frontend the request may be retried.
pub const CAN_RETRY: &str = "X-Google-GFE-Can-Retry";
/// Tells the server the client expects a streamed response.
pub const ACCEPT_RESPONSE_STREAMING: &str = "X-Accept-Response-Streaming";
/// Installation auth token. Omitted when the token is unavailable.
pub const INSTALLATIONS_AUTH: &str = "X-Goog-Firebase-Installations-Auth";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const ACCEPT: &str = "Accept";

pub const CAN_RETRY_VALUE: &str = "yes";
pub const ACCEPT_RESPONSE_STREAMING_VALUE: &str = "true";
pub const JSON: &str = "application/json";

/// Headers whose values are secrets and must not be printed verbatim.
pub const SENSITIVE: [&str; 2] = [API_KEY, INSTALLATIONS_AUTH];

/// Returns true if `name` carries a secret (case-insensitive).
pub fn is_sensitive(name: &str) -> bool {
	SENSITIVE.iter().any(|s| s.eq_ignore_ascii_case(name))
}

/// Renders a certificate digest as uppercase hex without separators.
pub fn fingerprint_hex(digest: &[u8]) -> String {
	use std::fmt::Write;

	digest.iter().fold(String::with_capacity(digest.len() * 2), |mut out, b| {
		let _ = write!(out, "{b:02X}");
		out
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fingerprint_is_uppercase_hex() {
		assert_eq!(fingerprint_hex(&[0x00, 0xab, 0x1f, 0xff]), "00AB1FFF");
		assert_eq!(fingerprint_hex(&[]), "");
	}

	#[test]
	fn sensitive_headers_match_case_insensitively() {
		assert!(is_sensitive("x-goog-api-key"));
		assert!(is_sensitive(INSTALLATIONS_AUTH));
		assert!(!is_sensitive(PACKAGE));
	}
}

//! JSON body posted to open a realtime stream.

use serde::{Deserialize, Serialize};

/// Body of the stream-open request.
///
/// Every field is a string on the wire, including the version number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequestBody {
	/// Project number taken from the application id.
	pub project: String,
	/// Config namespace the stream is scoped to.
	pub namespace: String,
	/// Template version the client already holds, stringified.
	pub last_known_version_number: String,
}

impl StreamRequestBody {
	pub fn new(project: impl Into<String>, namespace: impl Into<String>, last_known_version: i64) -> Self {
		Self {
			project: project.into(),
			namespace: namespace.into(),
			last_known_version_number: last_known_version.to_string(),
		}
	}

	/// Serializes the body to UTF-8 JSON.
	pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
		serde_json::to_vec(self)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn body_fields_are_strings() {
		let body = StreamRequestBody::new("123", "ns1", 42);
		let json = String::from_utf8(body.to_json_bytes().unwrap()).unwrap();
		assert_eq!(
			json,
			r#"{"project":"123","namespace":"ns1","lastKnownVersionNumber":"42"}"#
		);
	}

	#[test]
	fn negative_and_zero_versions_are_stringified() {
		assert_eq!(StreamRequestBody::new("1", "firebase", 0).last_known_version_number, "0");
		assert_eq!(StreamRequestBody::new("1", "firebase", -1).last_known_version_number, "-1");
	}

	#[test]
	fn body_deserializes_from_wire_shape() {
		let body: StreamRequestBody = serde_json::from_str(
			r#"{"project":"9","namespace":"firebase","lastKnownVersionNumber":"17"}"#,
		)
		.unwrap();
		assert_eq!(body, StreamRequestBody::new("9", "firebase", 17));
	}
}

//! Transport layer for opening realtime streams.
//!
//! [`StreamTransport`] opens a connection, writes the request and hands back
//! the response body as a [`ByteStream`]. [`HttpTransport`] is the production
//! implementation on top of `reqwest`; tests substitute scripted transports.

mod http;

#[cfg(test)]
mod tests;

use std::pin::Pin;

use futures_util::Stream;

pub use http::HttpTransport;

use crate::error::Result;
use crate::provider::BoxFuture;
use crate::request::StreamRequest;

/// Response body of an open stream, chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Opens realtime streams.
pub trait StreamTransport: Send + Sync {
	/// Establishes the connection and writes headers and body.
	///
	/// # Errors
	///
	/// Returns [`Error::TransportOpen`](crate::Error::TransportOpen) if the
	/// connection or the write fails, or the server rejects the request.
	fn open<'a>(&'a self, request: &'a StreamRequest) -> BoxFuture<'a, Result<ByteStream>>;
}

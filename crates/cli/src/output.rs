//! Terminal output for stream events and request dumps.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};

use colored::Colorize;
use rcstream_runtime::{ErrorKind, Listener, StreamRequest};

/// Prints one line per notification.
///
/// Updates go to stdout so they can be piped; errors go to stderr.
#[derive(Debug, Default)]
pub struct PrintingListener {
	updates: AtomicUsize,
	errors: AtomicUsize,
}

impl PrintingListener {
	pub fn updates(&self) -> usize {
		self.updates.load(Ordering::SeqCst)
	}

	pub fn errors(&self) -> usize {
		self.errors.load(Ordering::SeqCst)
	}
}

impl Listener for PrintingListener {
	fn on_update(&self) {
		let n = self.updates.fetch_add(1, Ordering::SeqCst) + 1;
		println!("{} config update #{n}", "update".green().bold());
	}

	fn on_error(&self, kind: ErrorKind, message: &str) {
		self.errors.fetch_add(1, Ordering::SeqCst);
		eprintln!("{} [{}] {message}", "error".red().bold(), kind_label(kind));
	}
}

fn kind_label(kind: ErrorKind) -> &'static str {
	match kind {
		ErrorKind::MalformedEndpoint => "malformed-endpoint",
		ErrorKind::TransportOpen => "transport-open",
		ErrorKind::StreamTerminated => "stream-terminated",
		ErrorKind::StreamUnavailable => "stream-unavailable",
		ErrorKind::Internal => "internal",
	}
}

/// Renders a request as an HTTP-style dump with secrets redacted.
pub fn render_request(request: &StreamRequest) -> anyhow::Result<String> {
	let mut out = String::new();
	writeln!(out, "{} {}", request.method(), request.url)?;
	for (name, value) in request.redacted_headers() {
		writeln!(out, "{name}: {value}")?;
	}
	out.push('\n');
	out.push_str(&serde_json::to_string_pretty(&request.body)?);
	out.push('\n');
	Ok(out)
}

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Maps `-v` count to a default filter. `RUST_LOG` overrides it.
fn default_filter(verbosity: u8) -> &'static str {
	// 0 = warnings and errors from the stream machinery only
	// 1 (-v) = retry scheduling and session opens
	// 2+ (-vv) = state transitions and request building
	match verbosity {
		0 => "warn",
		1 => "warn,rcstream=info",
		_ => "info,rcstream=debug",
	}
}

pub fn init_logging(verbosity: u8) {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn filters_parse() {
		for verbosity in 0..=3 {
			assert!(EnvFilter::try_new(default_filter(verbosity)).is_ok());
		}
	}
}

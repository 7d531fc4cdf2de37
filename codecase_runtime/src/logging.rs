//! Subscriber setup for binaries. Library code only emits events.

use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `directives` (e.g. `info` or
/// `codecase_runtime=debug,codecase_engine=info`).
///
/// Installing twice is not an error; the first subscriber stays.
pub fn init_tracing(directives: &str) -> Result<(), tracing_subscriber::filter::ParseError> {
    let filter = EnvFilter::try_new(directives)?;
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
    {
        debug!(error = %err, "tracing subscriber already installed");
    }
    Ok(())
}

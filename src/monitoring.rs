//! In this module, we build the logging for one acquisition session.
//! The subscriber is handed to the session explicitly (see `tracing::subscriber::with_default`)
//! rather than installed for the whole process. Logs go to stderr, stdout may carry data.

use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;

/// `LEVEL: message` lines on stderr, without targets or timestamps
pub fn session_subscriber(level: LevelFilter) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish()
}

/**
 * file: log.rs
 * desc: Application logging.
 */
use tracing::Level;
use tracing_subscriber;

/**
 * Sets up tracing and logging. All logging goes to stderr, per-transcript and per-stage
 * details are only shown when verbose.
 */
pub fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let _ = tracing_subscriber::fmt()
        .with_ansi(true)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .try_init();
}

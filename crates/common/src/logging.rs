use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber for one process of the game.
///
/// Filtering comes from RUST_LOG (default "info"). Output goes to stderr
/// unconditionally: a player's stdout is its move pipe and must carry
/// nothing but move bytes.
pub fn setup_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

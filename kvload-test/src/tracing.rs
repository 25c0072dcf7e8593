use tracing_subscriber::EnvFilter;

/// Targets of the harness binary and its libraries.
const CRATE_NAMES: &[&str] = &["kvload", "kvload_core", "kvload_cli"];

/// Routes harness logs at every level into the test runner's captured output.
///
/// Logs of dependencies such as `reqwest` or `hyper` are limited to errors. Calling this more
/// than once is fine.
pub fn init() {
    let env_filter = CRATE_NAMES
        .iter()
        .filter_map(|name| format!("{name}=TRACE").parse().ok())
        .fold(EnvFilter::new("ERROR"), EnvFilter::add_directive);

    tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .compact()
        .try_init()
        .ok();
}

use std::env;
use std::io::{self, IsTerminal};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::{EnvFilter, Layer, prelude::*};

use crate::config::{Config, LogFormat};

/// Installs the global tracing subscriber, writing to stderr.
///
/// Stdout is left to the run summary.
pub fn init_tracing(config: &Config) {
    let (level, env_filter) = parse_rust_log(config.logging.level);
    let ansi = use_ansi(config.logging.format);

    let format: Box<dyn Layer<Registry> + Send + Sync> = match config.logging.format {
        LogFormat::Auto => tracing_subscriber::fmt::layer()
            .compact()
            .with_ansi(ansi)
            .with_writer(io::stderr)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(ansi)
            .with_writer(io::stderr)
            .with_target(true)
            .boxed(),
        LogFormat::Simplified => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_ansi(ansi)
            .with_writer(io::stderr)
            .with_target(false)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(ansi)
            .with_writer(io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(format.with_filter(level))
        .with(env_filter)
        .init();
}

fn use_ansi(format: LogFormat) -> bool {
    match format {
        LogFormat::Auto => io::stderr().is_terminal(),
        LogFormat::Pretty => true,
        LogFormat::Simplified | LogFormat::Json => false,
    }
}

/// Returns the effective level and the maximum-verbosity filter.
///
/// A plain level in `RUST_LOG` overrides the configured level. Anything else in `RUST_LOG` is
/// used literally as a filter directive.
pub fn parse_rust_log(configured: LevelFilter) -> (LevelFilter, EnvFilter) {
    let level = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) => match value.parse::<LevelFilter>() {
            Ok(level) => level,
            Err(_) => return (LevelFilter::TRACE, EnvFilter::new(value)),
        },
        Err(_) => configured,
    };

    // This is the maximum verbosity that will be logged, we filter this down to `level`.
    let env_filter = EnvFilter::new(
        "INFO,\
        kvload=TRACE,\
        kvload_cli=TRACE,\
        kvload_core=TRACE,\
        ",
    );

    (level, env_filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_only_for_terminal_formats() {
        assert!(use_ansi(LogFormat::Pretty));
        assert!(!use_ansi(LogFormat::Simplified));
        assert!(!use_ansi(LogFormat::Json));
        assert_eq!(use_ansi(LogFormat::Auto), io::stderr().is_terminal());
    }
}

use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;

use crate::config::Config;
use crate::harness::{self, Roles};
use crate::{observability, summary};

/// Load generator measuring write and read latencies of key-value stores.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Write(WriteCommand),
    Read(ReadCommand),
    Version(VersionCommand),
}

/// run the writer and the reader concurrently
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {}

/// run only the writer
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "write")]
struct WriteCommand {}

/// run only the reader
///
/// Without a configured read limit, the reader runs until interrupted with SIGINT or SIGTERM.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "read")]
struct ReadCommand {}

/// print the kvload version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    let roles = match args.command {
        Command::Run(RunCommand {}) => Roles::Both,
        Command::Write(WriteCommand {}) => Roles::Writer,
        Command::Read(ReadCommand {}) => Roles::Reader,
        Command::Version(VersionCommand {}) => {
            println!("kvload {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
    };

    let config = Config::load(args.config.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("kvload-rt")
        .enable_all()
        .worker_threads(config.runtime.worker_threads)
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    let connector = harness::connector(&config.store);
    let outcome = runtime.block_on(harness::run(&config, roles, connector))?;

    summary::print(&outcome);
    outcome.into_result()
}

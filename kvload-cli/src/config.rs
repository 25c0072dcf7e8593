//! Configuration for the kvload harness.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `KVLOAD__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! See [`Config`] for a description of all configuration fields and their defaults.
//!
//! # Environment Variables
//!
//! Environment variables use `KVLOAD__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `KVLOAD__SEED=7` sets the key seed of both roles
//! - `KVLOAD__STORE__TYPE=http` selects the HTTP store
//! - `KVLOAD__WRITER__TARGET_RATE=50000` paces the writer to 50k keys per second
//!
//! # YAML Configuration File
//!
//! The above configuration in YAML format would look like this:
//!
//! ```yaml
//! seed: 7
//!
//! store:
//!   type: http
//!   endpoint: http://localhost:8080
//!
//! writer:
//!   target_rate: 50000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use figment::providers::{Env, Format, Serialized, Yaml};
use kvload_core::digest::DEFAULT_COMPRESSION;
use kvload_core::keyset::KeySpace;
use kvload_core::pacer::Pacing;
use kvload_core::window::DEFAULT_WINDOW_SIZE;
use kvload_core::{ReaderOptions, WriterOptions};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "KVLOAD__";

/// Store backend configuration.
///
/// The `type` field in YAML or `__TYPE` in environment variables determines which variant is used.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Storage {
    /// In-process store (type `"memory"`).
    ///
    /// Writer and reader share one map, which makes this suitable for dry runs of the harness
    /// itself.
    Memory,

    /// Key-value store speaking the JSON-over-HTTP protocol (type `"http"`).
    ///
    /// # Example
    ///
    /// ```yaml
    /// store:
    ///   type: http
    ///   endpoint: http://localhost:8080
    ///   database: bench
    ///   namespace: kv
    /// ```
    Http {
        /// Base URL of the store.
        ///
        /// # Environment Variables
        ///
        /// - `KVLOAD__STORE__TYPE=http`
        /// - `KVLOAD__STORE__ENDPOINT=http://localhost:8080`
        endpoint: String,

        /// Database (keyspace) holding the benchmark table.
        ///
        /// Defaults to `"test"`.
        #[serde(default = "default_table")]
        database: String,

        /// Namespace (table) within the database.
        ///
        /// Defaults to `"test"`.
        #[serde(default = "default_table")]
        namespace: String,
    },
}

fn default_table() -> String {
    "test".to_owned()
}

/// Writer role configuration.
///
/// Used in: [`Config::writer`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Writer {
    /// Number of batches to write.
    ///
    /// Defaults to `40000`.
    pub iterations: u64,

    /// Number of unique keys per batch.
    ///
    /// Defaults to `5000`.
    pub keys: usize,

    /// Maximum number of upserts per request, or `0` to send every batch in one request.
    ///
    /// Defaults to `10`.
    pub batch_size: usize,

    /// Requests atomic application of every request.
    pub atomic: bool,

    /// Fixed delay after every iteration, e.g. `"5ms"`.
    ///
    /// Mutually exclusive with [`target_rate`](Self::target_rate).
    #[serde(with = "humantime_serde")]
    pub delay: Option<Duration>,

    /// Target throughput in keys per second. `0` disables pacing.
    ///
    /// # Environment Variable
    ///
    /// `KVLOAD__WRITER__TARGET_RATE`
    pub target_rate: u64,

    /// File that iteration events are appended to.
    pub stats: Option<PathBuf>,
}

impl Writer {
    /// Returns the pacing mode described by `delay` and `target_rate`.
    pub fn pacing(&self) -> Result<Pacing> {
        Ok(match (self.delay, self.target_rate) {
            (Some(_), rate) if rate > 0 => {
                bail!("writer.delay and writer.target_rate cannot be combined")
            }
            (Some(delay), _) => Pacing::FixedDelay(delay),
            (None, 0) => Pacing::Unlimited,
            (None, rate) => Pacing::TargetRate(rate),
        })
    }
}

impl Default for Writer {
    fn default() -> Self {
        let options = WriterOptions::default();
        Self {
            iterations: options.iterations,
            keys: options.keys,
            batch_size: options.batch_size,
            atomic: options.atomic,
            delay: None,
            target_rate: 0,
            stats: None,
        }
    }
}

/// Reader role configuration.
///
/// Used in: [`Config::reader`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Reader {
    /// Number of samples per reported window.
    ///
    /// Defaults to `10000`.
    pub window: u64,

    /// Stop after this many lookups. Unset runs until interrupted.
    pub reads: Option<u64>,

    /// File that window events are appended to.
    pub stats: Option<PathBuf>,
}

impl Default for Reader {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW_SIZE,
            reads: None,
            stats: None,
        }
    }
}

/// Runtime configuration for the Tokio async runtime.
///
/// Used in: [`Config::runtime`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Runtime {
    /// Number of worker threads.
    ///
    /// Defaults to the number of CPU cores on the host machine.
    ///
    /// # Environment Variable
    ///
    /// `KVLOAD__RUNTIME__WORKER_THREADS`
    pub worker_threads: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
        }
    }
}

/// Format of log messages on stderr.
///
/// Used in: [`Logging::format`]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact single-line messages, colored only when stderr is a terminal.
    Auto,

    /// Multi-line messages with colors and source locations, for local runs.
    Pretty,

    /// Level and message only, without timestamps or colors, for captured output.
    Simplified,

    /// JSON lines, for log collectors.
    Json,
}

/// (De)serializes a [`LevelFilter`] by its name, such as `info` or `off`.
mod level_filter {
    use std::borrow::Cow;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use tracing::level_filters::LevelFilter;

    pub fn serialize<S: Serializer>(level: &LevelFilter, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(level)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<LevelFilter, D::Error> {
        let name = Cow::<'de, str>::deserialize(deserializer)?;
        name.parse().map_err(D::Error::custom)
    }
}

/// Logging configuration.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum level of log messages, overridden by a plain level in `RUST_LOG`.
    ///
    /// Defaults to `info`.
    #[serde(with = "level_filter")]
    pub level: LevelFilter,

    /// Format of log messages on stderr.
    ///
    /// Defaults to [`LogFormat::Auto`].
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Main configuration struct for the harness.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// The store under test. Defaults to [`Storage::Memory`].
    pub store: Storage,

    /// Seed shared by the writer's key generator and the reader's key stream.
    ///
    /// # Environment Variable
    ///
    /// `KVLOAD__SEED`
    pub seed: u64,

    /// Largest key value drawn. Keys are drawn uniformly from `0..=key_space`.
    ///
    /// Defaults to `4294967295`.
    pub key_space: u64,

    /// Upper bound for every individual store call. Unset waits indefinitely.
    #[serde(default, with = "humantime_serde")]
    pub operation_timeout: Option<Duration>,

    /// Writer role configuration.
    pub writer: Writer,

    /// Reader role configuration.
    pub reader: Reader,

    /// Logging configuration.
    pub logging: Logging,

    /// Tokio runtime configuration.
    pub runtime: Runtime,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: Storage::Memory,
            seed: 0,
            key_space: KeySpace::default().max(),
            operation_timeout: None,
            writer: Writer::default(),
            reader: Reader::default(),
            logging: Logging::default(),
            runtime: Runtime::default(),
        }
    }
}

impl Config {
    /// Loads and validates the configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.writer.pacing()?;
        if config.runtime.worker_threads == 0 {
            bail!("runtime.worker_threads must be at least 1");
        }

        Ok(config)
    }

    /// Returns the options of the writer role.
    pub fn writer_options(&self) -> Result<WriterOptions> {
        Ok(WriterOptions {
            seed: self.seed,
            key_space: KeySpace::up_to(self.key_space),
            iterations: self.writer.iterations,
            keys: self.writer.keys,
            batch_size: self.writer.batch_size,
            atomic: self.writer.atomic,
            pacing: self.writer.pacing()?,
            operation_timeout: self.operation_timeout,
        })
    }

    /// Returns the options of the reader role.
    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            seed: self.seed,
            key_space: KeySpace::up_to(self.key_space),
            window_size: self.reader.window,
            compression: DEFAULT_COMPRESSION,
            max_reads: self.reader.reads,
            operation_timeout: self.operation_timeout,
        }
    }
}

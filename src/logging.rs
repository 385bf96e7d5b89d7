//! Structured logging setup, built once in `main` and never reached into
//! ambiently afterwards.
//!
//! Writes to `COU_DATA/log/cou-YYYYMMDDHHMMSS.log` ("Persisted
//! state") via `tracing-appender`, and mirrors the level to stderr so an
//! interactive operator sees the same messages the log file records.

use std::path::Path;

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Verbosity requested on the command line: `-v`/`--verbose` is
/// repeatable, `-q`/`--quiet` is mutually exclusive with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verbosity {
    /// `--quiet`: only warnings and errors.
    Quiet,
    /// Default: informational messages and above.
    Normal,
    /// One `-v`: debug messages and above.
    Verbose,
    /// Two or more `-v`: trace messages and above.
    Trace,
}

impl Verbosity {
    /// What: Fold the parsed `--verbose` count and `--quiet` flag into one
    /// [`Verbosity`]. `--quiet` wins if both are somehow set (`clap`'s
    /// `conflicts_with` should already prevent that at parse time).
    #[must_use]
    pub const fn from_flags(verbose_count: u8, quiet: bool) -> Self {
        if quiet {
            Self::Quiet
        } else {
            match verbose_count {
                0 => Self::Normal,
                1 => Self::Verbose,
                _ => Self::Trace,
            }
        }
    }

    const fn level(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Verbose => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Holds the non-blocking log-file writer's worker guard; the caller keeps
/// this alive for the process lifetime (dropping it stops flushing).
pub struct LogGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// What: Build a `tracing` subscriber writing to both stderr and a
/// timestamped file under `data_dir/log/`, and install it as the global
/// default.
///
/// Input: `data_dir`, the `COU_DATA` directory; `verbosity`, the level
/// folded from CLI flags.
///
/// Output: A [`LogGuard`] the caller must keep alive until the process
/// exits; dropping it early truncates buffered log lines.
///
/// # Errors
/// Returns `Err` when the log directory cannot be created.
pub fn init(data_dir: &Path, verbosity: Verbosity) -> std::io::Result<LogGuard> {
    let log_dir = data_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_name = format!("cou-{}.log", timestamp());
    let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
    let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_new(format!("cou={},warn", verbosity.level()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.and(std::io::stderr))
        .with_target(false)
        .with_ansi(false)
        .init();

    Ok(LogGuard { _file_guard: file_guard })
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d%H%M%S").to_string()
}

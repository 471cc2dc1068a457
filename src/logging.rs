use std::path::Path;

use tracing::Subscriber;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Verbosity selected with `--log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Info,    // info, warning and error
    Warning, // warning and error
    Trace,
}

impl LogLevel {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(LogLevel::Off),
            1 => Some(LogLevel::Error),
            2 => Some(LogLevel::Info),
            3 => Some(LogLevel::Warning),
            4 => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Build the subscriber for one run. Logs go to stderr, or to a daily
/// rolling file under `log_dir`. Keep the returned guard alive until the
/// run ends or buffered file output is lost.
pub fn subscriber(
    level: LogLevel,
    log_dir: Option<&Path>,
) -> (impl Subscriber + Send + Sync + 'static, Option<WorkerGuard>) {
    let (writer, guard) = match log_dir {
        Some(dir) => {
            let file_appender = rolling::daily(dir, "hameg.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let subscriber = fmt()
        .with_writer(writer)
        .with_ansi(log_dir.is_none())
        .with_level(true)
        .with_max_level(level.filter())
        .finish();
    (subscriber, guard)
}

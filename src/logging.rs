use std::fs;
use std::io;
use std::path::PathBuf;

use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("subscriber init failed: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Clone, Copy, Debug)]
pub struct LogOptions {
    pub debug: bool,
    pub use_color: bool,
    pub to_file: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            debug: false,
            use_color: true,
            to_file: false,
        }
    }
}

/// 日志系统；持有期间文件日志保持写入
pub struct LogSystem {
    _guard: Option<WorkerGuard>,
}

impl LogSystem {
    /// 终端日志写到 stderr，stdout 留给更新提示和正文
    pub fn init(options: LogOptions) -> Result<Self, LogError> {
        let level = if options.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };

        let console_layer = fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_ansi(options.use_color)
            .with_writer(io::stderr)
            .with_filter(level);

        let (file_layer, guard) = if options.to_file {
            let logs_dir = PathBuf::from("logs");
            fs::create_dir_all(&logs_dir)?;
            let file_appender = rolling::never(&logs_dir, "latest.log");
            let (file_writer, guard) = non_blocking::NonBlockingBuilder::default()
                .lossy(false)
                .finish(file_appender);
            let layer = fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(file_writer)
                .with_filter(LevelFilter::DEBUG);
            (Some(layer), Some(guard))
        } else {
            (None, None)
        };

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        Ok(Self { _guard: guard })
    }
}

//! Логирование органайзера.
//!
//! ## Уровни логов
//! - `ERROR`: ошибки перемещения, сбои watcher'а
//! - `WARN`:  некритичные проблемы (ошибки notify, устаревший PID-файл)
//! - `INFO`:  жизненный цикл (startup, shutdown), файлы в очереди, перемещённые файлы
//! - `DEBUG`: детали sweep'ов и событий notify
//!
//! ## Корреляция событий
//! Каждый sweep получает [`LogContext`] с `correlation_id`, который пишется в
//! начало сообщений — так строки одного прохода легко собрать вместе.
//!
//! ## Использование
//! ```ignore
//! use downloads_organizer::logging::{init_logging, LogContext};
//!
//! init_logging(None)?; // вызывается один раз при старте
//!
//! let ctx = LogContext::with_operation("sweep");
//! log::info!(target: "downloads_organizer::sweep", "[{}] Starting pending files check", ctx.correlation_id);
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Once;

use log::{Level, LevelFilter};

use crate::error::OrganizerError;

static INIT: Once = Once::new();

/// Инициализировать логирование (idempotent).
///
/// `log_file`: если указан, строки дописываются в этот файл, иначе — в stderr.
///
/// Управление уровнем логов: переменная окружения `RUST_LOG`.
/// Примеры:
/// - `RUST_LOG=info` — только INFO и выше
/// - `RUST_LOG=downloads_organizer=debug` — DEBUG для нашего crate
pub fn init_logging(log_file: Option<&Path>) -> Result<(), OrganizerError> {
    // Файл открываем до call_once, чтобы ошибка открытия дошла до вызывающего.
    let target = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            env_logger::Target::Pipe(Box::new(file))
        }
        None => env_logger::Target::Stderr,
    };

    INIT.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_module("downloads_organizer", LevelFilter::Info)
            .filter_module("notify", LevelFilter::Warn)
            .parse_env("RUST_LOG")
            .target(target)
            .format(|buf, record| {
                let level = match record.level() {
                    Level::Error => "ERROR",
                    Level::Warn => "WARN",
                    Level::Info => "INFO",
                    Level::Debug => "DEBUG",
                    Level::Trace => "TRACE",
                };

                // Формат: [timestamp] [LEVEL] [target] message
                writeln!(
                    buf,
                    "[{}] [{}] [{}] {}",
                    timestamp(),
                    level,
                    record.target(),
                    record.args()
                )
            })
            .try_init();
    });

    Ok(())
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Контекст логирования с корреляционным ID.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Уникальный идентификатор для корреляции событий.
    pub correlation_id: String,
    /// Опциональный контекст операции.
    pub operation: Option<String>,
}

impl LogContext {
    /// Создать новый контекст с уникальным correlation_id.
    pub fn new() -> Self {
        Self {
            correlation_id: generate_correlation_id("ctx"),
            operation: None,
        }
    }

    /// Создать контекст операции; префикс ID совпадает с именем операции.
    pub fn with_operation(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        Self {
            correlation_id: generate_correlation_id(&operation),
            operation: Some(operation),
        }
    }
}

impl Default for LogContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Формат: `<prefix>_<timestamp_ms>_<counter>`
fn generate_correlation_id(prefix: &str) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let timestamp = chrono::Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("{}_{}_{}", prefix, timestamp, counter % 10000)
}

//! Настройки органайзера.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classifier::CategoryTable;
use crate::error::OrganizerError;
use crate::file_watcher::default_watch_dir;
use crate::pidfile::default_pid_file;
use crate::scheduler::{DEFAULT_GRACE_PERIOD, DEFAULT_SWEEP_INTERVAL};

#[derive(Debug, Clone)]
pub struct OrganizerConfig {
    /// Папка, за которой следим (нерекурсивно).
    pub watch_dir: PathBuf,
    /// Минимальный возраст файла перед перемещением.
    pub grace_period: Duration,
    /// Пауза между sweep'ами.
    pub sweep_interval: Duration,
    pub pid_file: PathBuf,
    /// `None` — логи в stderr.
    pub log_file: Option<PathBuf>,
    pub categories: CategoryTable,
}

impl OrganizerConfig {
    /// Настройки по умолчанию для указанной папки.
    pub fn new(watch_dir: impl Into<PathBuf>) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            grace_period: DEFAULT_GRACE_PERIOD,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            pid_file: default_pid_file(),
            log_file: None,
            categories: CategoryTable::default(),
        }
    }

    /// Настройки по умолчанию для папки загрузок пользователя.
    pub fn for_downloads() -> Result<Self, OrganizerError> {
        Ok(Self::new(default_watch_dir()?))
    }

    pub fn validate(&self) -> Result<(), OrganizerError> {
        if self.sweep_interval.is_zero() {
            return Err(OrganizerError::InvalidConfig(
                "sweep interval must be greater than zero".to_string(),
            ));
        }

        // Служебные файлы в самой папке попали бы в очередь и уехали в others/.
        let own_files = [
            ("PID file", Some(self.pid_file.as_path())),
            ("log file", self.log_file.as_deref()),
        ];
        for (what, path) in own_files {
            if let Some(path) = path.filter(|p| lies_directly_in(p, &self.watch_dir)) {
                return Err(OrganizerError::InvalidConfig(format!(
                    "{what} must not be placed directly in the watched directory: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

fn lies_directly_in(file: &Path, dir: &Path) -> bool {
    let parent = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => match std::env::current_dir() {
            Ok(cwd) => cwd,
            Err(_) => return false,
        },
    };
    resolve(&parent) == resolve(dir)
}

// Несуществующий путь сравнивается как есть.
fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

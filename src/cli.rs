//! Аргументы командной строки.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::OrganizerConfig;
use crate::error::OrganizerError;

/// Раскладывает файлы из папки загрузок по подпапкам категорий,
/// когда файл пролежал дольше grace-периода.
#[derive(Parser, Debug, Clone)]
#[command(name = "downloads-organizer")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Папка для наблюдения (абсолютный путь). По умолчанию — папка загрузок.
    #[arg(short = 'd', long = "dir", env = "DOWNLOADS_ORGANIZER_DIR")]
    pub directory: Option<PathBuf>,

    /// Минимальный возраст файла перед сортировкой, в часах
    #[arg(
        long = "grace-hours",
        env = "DOWNLOADS_ORGANIZER_GRACE_HOURS",
        default_value_t = 24
    )]
    pub grace_hours: u64,

    /// Пауза между проверками, в минутах
    #[arg(
        long = "interval-minutes",
        env = "DOWNLOADS_ORGANIZER_INTERVAL_MINUTES",
        default_value_t = 120,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval_minutes: u64,

    /// Путь к PID-файлу
    #[arg(long = "pid-file", env = "DOWNLOADS_ORGANIZER_PID_FILE")]
    pub pid_file: Option<PathBuf>,

    /// Писать лог в файл (дописывать) вместо stderr
    #[arg(long = "log-file", env = "DOWNLOADS_ORGANIZER_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn into_config(self) -> Result<OrganizerConfig, OrganizerError> {
        let mut config = match self.directory {
            Some(dir) => OrganizerConfig::new(dir),
            None => OrganizerConfig::for_downloads()?,
        };
        config.grace_period = Duration::from_secs(self.grace_hours * 3600);
        config.sweep_interval = Duration::from_secs(self.interval_minutes * 60);
        if let Some(pid_file) = self.pid_file {
            config.pid_file = pid_file;
        }
        config.log_file = self.log_file;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_config() {
        let args = Args::try_parse_from(["downloads-organizer", "--dir", "/srv/in"]).unwrap();
        let config = args.into_config().unwrap();

        assert_eq!(config.watch_dir, PathBuf::from("/srv/in"));
        assert_eq!(config.grace_period, Duration::from_secs(24 * 3600));
        assert_eq!(config.sweep_interval, Duration::from_secs(2 * 3600));
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "downloads-organizer",
            "-d",
            "/srv/in",
            "--grace-hours",
            "48",
            "--interval-minutes",
            "15",
            "--pid-file",
            "/run/org.pid",
            "--log-file",
            "/var/log/org.log",
        ])
        .unwrap();
        let config = args.into_config().unwrap();

        assert_eq!(config.grace_period, Duration::from_secs(48 * 3600));
        assert_eq!(config.sweep_interval, Duration::from_secs(15 * 60));
        assert_eq!(config.pid_file, PathBuf::from("/run/org.pid"));
        assert_eq!(config.log_file, Some(PathBuf::from("/var/log/org.log")));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let result =
            Args::try_parse_from(["downloads-organizer", "--interval-minutes", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_file_in_watched_dir_is_rejected() {
        let args = Args::try_parse_from([
            "downloads-organizer",
            "--dir",
            "/srv/in",
            "--log-file",
            "/srv/in/organizer.log",
        ])
        .unwrap();

        assert!(matches!(
            args.into_config(),
            Err(OrganizerError::InvalidConfig(_))
        ));
    }
}

use std::path::PathBuf;

/// Единый тип ошибок органайзера.
#[derive(thiserror::Error, Debug)]
pub enum OrganizerError {
  #[error("Downloads directory is not available on this OS/user")]
  DownloadsDirNotFound,

  #[error("Invalid path: {0}")]
  InvalidPath(String),

  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("An instance is already running with PID {pid} (pid file: {pid_file:?})")]
  AlreadyRunning { pid: u32, pid_file: PathBuf },

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Notify error: {0}")]
  Notify(#[from] notify::Error),

  #[error("Cannot determine file name for path: {0:?}")]
  FileNameMissing(PathBuf),

  #[error("Cannot create category directory {path:?}: {source}")]
  CreateCategoryDir {
    path: PathBuf,
    source: std::io::Error,
  },

  #[error("Cannot move {from:?} -> {to:?}: {source}")]
  Move {
    from: PathBuf,
    to: PathBuf,
    source: std::io::Error,
  },

  #[error("No free destination name for {0:?}")]
  DestinationConflict(PathBuf),

  #[error("File watcher failed: {0}")]
  WatcherFailed(String),

  #[error("Sweep scheduler failed: {0}")]
  SchedulerFailed(String),
}

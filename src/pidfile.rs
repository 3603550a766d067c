//! PID-файл: защита от второго экземпляра и точка для внешних скриптов.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::error::OrganizerError;

pub const DEFAULT_PID_FILE_NAME: &str = "downloads_organizer.pid";

const LOG_TARGET: &str = "downloads_organizer::pidfile";

/// `<data_local_dir>/downloads_organizer/downloads_organizer.pid`, иначе — в текущей папке.
pub fn default_pid_file() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("downloads_organizer").join(DEFAULT_PID_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PID_FILE_NAME))
}

/// Захваченный PID-файл. Удаляется при drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    pid: u32,
}

impl PidFile {
    /// Записать PID текущего процесса.
    ///
    /// Если файл указывает на живой процесс, возвращает
    /// [`OrganizerError::AlreadyRunning`]. Устаревший или нечитаемый файл
    /// перезаписывается.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, OrganizerError> {
        let path = path.into();
        let pid = std::process::id();

        if let Some(old_pid) = read_pid(&path) {
            if old_pid != pid && process_alive(old_pid) {
                warn!(target: LOG_TARGET, "An instance is already running with PID {old_pid}");
                return Err(OrganizerError::AlreadyRunning {
                    pid: old_pid,
                    pid_file: path,
                });
            }
            info!(target: LOG_TARGET, "Replacing stale pid file (PID {old_pid})");
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, pid.to_string())?;
        info!(target: LOG_TARGET, "Organizer started with PID: {pid}");

        Ok(Self { path, pid })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        // Не трогаем файл, если его уже перезаписал другой экземпляр.
        if read_pid(&self.path) != Some(self.pid) {
            return;
        }
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(target: LOG_TARGET, "Cannot remove pid file {}: {err}", self.path.display());
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    let contents = fs::read_to_string(path).ok()?;
    match contents.trim().parse() {
        Ok(pid) => Some(pid),
        Err(err) => {
            warn!(target: LOG_TARGET, "Unreadable pid file {}: {err}", path.display());
            None
        }
    }
}

fn process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).is_some()
}

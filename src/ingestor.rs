//! Наполнение реестра: стартовое сканирование и живые события watcher'а.

use std::fs::{self, Metadata};
use std::path::Path;
use std::time::SystemTime;

use log::{info, warn};

use crate::error::OrganizerError;
use crate::file_watcher::FileCreatedEvent;
use crate::registry::PendingRegistry;

const LOG_TARGET: &str = "downloads_organizer::ingestor";

/// Поставить в очередь все обычные файлы, лежащие прямо в `dir`.
///
/// Время первого наблюдения берётся с диска (см. [`disk_timestamp`]), поэтому
/// после перезапуска возраст файла не обнуляется. Возвращает число новых записей.
pub fn scan_existing(dir: &Path, registry: &PendingRegistry) -> Result<usize, OrganizerError> {
    info!(target: LOG_TARGET, "Processing existing files in {}", dir.display());

    let mut queued = 0;
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(target: LOG_TARGET, "Cannot read directory entry: {err}");
                continue;
            }
        };
        let path = entry.path();
        // metadata() идёт по симлинкам: ссылка на обычный файл тоже подходит.
        let meta = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => continue,
            Err(err) => {
                warn!(target: LOG_TARGET, "Cannot stat {}: {err}", path.display());
                continue;
            }
        };

        if registry.insert_if_absent(path.clone(), disk_timestamp(&meta)) {
            queued += 1;
            info!(
                target: LOG_TARGET,
                "Added existing file to queue: {}",
                entry.file_name().to_string_lossy()
            );
        }
    }

    info!(target: LOG_TARGET, "Startup scan queued {queued} file(s)");
    Ok(queued)
}

/// Обработать событие watcher'а.
pub fn record_created(registry: &PendingRegistry, event: FileCreatedEvent) -> bool {
    let queued = registry.insert_if_absent(event.full_path, event.observed_at);
    if queued {
        info!(target: LOG_TARGET, "New file detected: {}", event.file_name);
    }
    queued
}

/// Когда файл появился на диске.
///
/// Порядок: время создания (birth), если FS его отдаёт; на unix иначе ctime;
/// в остальных случаях mtime. mtime не годится первым: распаковщики, `wget`,
/// `cp -p` и `rsync -t` выставляют его в прошлое.
pub fn disk_timestamp(meta: &Metadata) -> SystemTime {
    if let Ok(created) = meta.created() {
        return created;
    }
    #[cfg(unix)]
    {
        if let Some(changed) = status_change_time(meta) {
            return changed;
        }
    }
    meta.modified().unwrap_or_else(|_| SystemTime::now())
}

#[cfg(unix)]
fn status_change_time(meta: &Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;
    use std::time::Duration;

    let secs = u64::try_from(meta.ctime()).ok()?;
    let nanos = u32::try_from(meta.ctime_nsec()).ok()?;
    SystemTime::UNIX_EPOCH.checked_add(Duration::new(secs, nanos))
}

//! События, которые watcher отдаёт наружу.
//!
//! Не зависят от `notify`: потребитель видит только путь и время наблюдения.

use std::path::PathBuf;
use std::time::SystemTime;

/// В наблюдаемой папке появился новый файл (создан или переименован в неё).
#[derive(Clone, Debug)]
pub struct FileCreatedEvent {
    /// Имя файла.
    pub file_name: String,
    /// Полный путь к файлу.
    pub full_path: PathBuf,
    /// Когда событие было получено.
    pub observed_at: SystemTime,
}

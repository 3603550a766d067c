//! Перемещение одного файла в папку его категории.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::classifier::CategoryTable;
use crate::error::OrganizerError;

/// Сколько суффиксов ` (N)` перебирать при конфликте имён.
pub const MAX_CONFLICT_SUFFIX: u32 = 1000;

const LOG_TARGET: &str = "downloads_organizer::mover";

/// Итог перемещения.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Файл перемещён в `destination`.
    Moved {
        category: String,
        destination: PathBuf,
    },
    /// Файла уже нет (удалён или перемещён вручную) — считаем обработанным.
    SourceMissing,
}

/// Раскладывает файлы по подпапкам `<root>/<category>/`.
///
/// Состояния не хранит, поэтому один экземпляр можно делить между потоками.
#[derive(Debug, Clone)]
pub struct Mover {
    root: PathBuf,
    categories: CategoryTable,
}

impl Mover {
    pub fn new(root: impl Into<PathBuf>, categories: CategoryTable) -> Self {
        Self {
            root: root.into(),
            categories,
        }
    }

    /// Переместить файл в папку категории.
    ///
    /// Существующий файл в месте назначения никогда не перезаписывается: к имени
    /// добавляется ` (N)`. Любая ошибка ввода-вывода возвращается вызывающему.
    pub fn organize(&self, path: &Path) -> Result<MoveOutcome, OrganizerError> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(MoveOutcome::SourceMissing),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(target: LOG_TARGET, "Source vanished before sweep: {}", path.display());
                return Ok(MoveOutcome::SourceMissing);
            }
            Err(err) => return Err(err.into()),
        }

        let file_name = path
            .file_name()
            .ok_or_else(|| OrganizerError::FileNameMissing(path.to_path_buf()))?;

        let category = self.categories.classify_path(path).to_string();
        let dest_dir = self.root.join(&category);
        fs::create_dir_all(&dest_dir).map_err(|source| OrganizerError::CreateCategoryDir {
            path: dest_dir.clone(),
            source,
        })?;

        let destination = place_without_clobber(path, &dest_dir.join(file_name))?;

        info!(
            target: LOG_TARGET,
            "File organized: {} -> {}",
            file_name.to_string_lossy(),
            category
        );

        Ok(MoveOutcome::Moved {
            category,
            destination,
        })
    }
}

/// Переместить `src` на первый свободный путь: `name.ext`, затем
/// `name (1).ext`, `name (2).ext`, ...
///
/// Имя занимается через `hard_link`, который не заменяет существующий файл,
/// после чего исходная ссылка удаляется. Файл, появившийся в месте назначения
/// между попытками, остаётся нетронутым.
fn place_without_clobber(src: &Path, candidate: &Path) -> Result<PathBuf, OrganizerError> {
    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = candidate
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let names = std::iter::once(candidate.to_path_buf()).chain(
        (1..=MAX_CONFLICT_SUFFIX).map(|n| candidate.with_file_name(format!("{stem} ({n}){ext}"))),
    );
    for next in names {
        match fs::hard_link(src, &next) {
            Ok(()) => {
                if let Err(source) = fs::remove_file(src) {
                    let _ = fs::remove_file(&next);
                    return Err(move_error(src, &next, source));
                }
                return Ok(next);
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                debug!(target: LOG_TARGET, "Destination taken: {}", next.display());
            }
            Err(err) => {
                // FS без жёстких ссылок (FAT, часть сетевых): обычный rename.
                debug!(target: LOG_TARGET, "hard_link unavailable ({err}), using rename");
                if exists(&next)? {
                    continue;
                }
                fs::rename(src, &next).map_err(|source| move_error(src, &next, source))?;
                return Ok(next);
            }
        }
    }

    Err(OrganizerError::DestinationConflict(candidate.to_path_buf()))
}

fn move_error(from: &Path, to: &Path, source: io::Error) -> OrganizerError {
    OrganizerError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    }
}

// symlink_metadata: висячая ссылка в месте назначения тоже занимает имя.
fn exists(path: &Path) -> Result<bool, OrganizerError> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

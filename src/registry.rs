//! Реестр файлов, ожидающих сортировки.
//!
//! Ключ — абсолютный путь, значение — время первого наблюдения. Это единственная
//! разделяемая изменяемая структура: её одновременно пополняет watcher и
//! разбирает sweep. Все обращения идут через методы реестра под одним mutex'ом.
//!
//! Sweep работает в два шага: [`PendingRegistry::extract_older_than`] помечает
//! записи как выданные (checked out), а после попытки перемещения вызывается
//! [`PendingRegistry::remove`] или [`PendingRegistry::release`]. Выданная запись
//! не попадает в повторную выборку, пока её не вернут.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

/// Запись, выданная sweep'у.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub path: PathBuf,
    pub first_seen: SystemTime,
}

#[derive(Debug)]
struct Slot {
    first_seen: SystemTime,
    checked_out: bool,
    /// Новое наблюдение того же пути, пришедшее, пока запись была выдана.
    reobserved: Option<SystemTime>,
}

#[derive(Debug, Default)]
pub struct PendingRegistry {
    entries: Mutex<HashMap<PathBuf, Slot>>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Паника в другом потоке не делает карту несогласованной: каждая операция
    // меняет её за один шаг.
    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Slot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Добавить путь, если его ещё нет. Время первого наблюдения никогда не
    /// перезаписывается.
    ///
    /// Возвращает `true`, если наблюдение поставлено в очередь. Для пути, который
    /// сейчас обрабатывает sweep, наблюдение запоминается отдельно и вступит в
    /// силу после [`remove`](Self::remove).
    pub fn insert_if_absent(&self, path: impl Into<PathBuf>, first_seen: SystemTime) -> bool {
        let mut entries = self.lock();
        match entries.entry(path.into()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if slot.checked_out && slot.reobserved.is_none() {
                    slot.reobserved = Some(first_seen);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    first_seen,
                    checked_out: false,
                    reobserved: None,
                });
                true
            }
        }
    }

    /// Выдать все невыданные записи с возрастом `now - first_seen >= min_age`.
    ///
    /// Записи остаются в реестре; вызывающий обязан завершить каждую через
    /// [`remove`](Self::remove) или [`release`](Self::release). Результат
    /// отсортирован по времени первого наблюдения.
    pub fn extract_older_than(&self, min_age: Duration, now: SystemTime) -> Vec<PendingEntry> {
        let mut entries = self.lock();
        let mut due: Vec<PendingEntry> = entries
            .iter_mut()
            .filter(|(_, slot)| !slot.checked_out && age(slot.first_seen, now) >= min_age)
            .map(|(path, slot)| {
                slot.checked_out = true;
                PendingEntry {
                    path: path.clone(),
                    first_seen: slot.first_seen,
                }
            })
            .collect();
        due.sort_by(|a, b| a.first_seen.cmp(&b.first_seen).then_with(|| a.path.cmp(&b.path)));
        due
    }

    /// Удалить запись. Если за время обработки путь наблюдали снова, запись
    /// заменяется этим новым наблюдением. Для отсутствующего пути — no-op.
    pub fn remove(&self, path: &Path) {
        let mut entries = self.lock();
        let Some(slot) = entries.get_mut(path) else {
            return;
        };
        match slot.reobserved.take() {
            Some(seen) => {
                slot.first_seen = seen;
                slot.checked_out = false;
            }
            None => {
                entries.remove(path);
            }
        }
    }

    /// Вернуть выданную запись в очередь без изменений (перемещение не удалось
    /// или sweep отменён). Повторное наблюдение при этом отбрасывается: исходное
    /// время старше.
    pub fn release(&self, path: &Path) {
        if let Some(slot) = self.lock().get_mut(path) {
            slot.checked_out = false;
            slot.reobserved = None;
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    pub fn first_seen(&self, path: &Path) -> Option<SystemTime> {
        self.lock().get(path).map(|slot| slot.first_seen)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Возраст записи; время из будущего (сдвиг часов) считается нулевым возрастом.
fn age(first_seen: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(first_seen).unwrap_or(Duration::ZERO)
}

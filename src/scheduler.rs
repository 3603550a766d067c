//! Периодический sweep реестра.
//!
//! Цикл: Idle → Running → Idle → ... → Stopped. Пауза отсчитывается от конца
//! предыдущего прохода, поэтому медленный sweep сдвигает следующий.
//! Остановка прерывает паузу сразу, а идущий проход — между файлами: текущее
//! перемещение завершается, оставшиеся записи возвращаются в реестр.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, SystemTime};

use log::{debug, error, info};

use crate::error::OrganizerError;
use crate::logging::LogContext;
use crate::mover::{MoveOutcome, Mover};
use crate::registry::PendingRegistry;

/// Минимальный возраст файла перед сортировкой.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
/// Пауза между концом одного sweep'а и началом следующего.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);

const LOG_TARGET: &str = "downloads_organizer::sweep";

/// Итоги одного прохода.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Перемещено в папки категорий.
    pub moved: usize,
    /// Файла уже не было — запись просто удалена.
    pub vanished: usize,
    /// Перемещение не удалось, запись ждёт следующего прохода.
    pub failed: usize,
    /// Не обработано из-за остановки.
    pub deferred: usize,
}

/// Один проход по реестру: выборка, перемещение, удаление записей.
#[derive(Debug)]
pub struct Sweeper {
    registry: Arc<PendingRegistry>,
    mover: Arc<Mover>,
    grace_period: Duration,
}

impl Sweeper {
    pub fn new(registry: Arc<PendingRegistry>, mover: Arc<Mover>, grace_period: Duration) -> Self {
        Self {
            registry,
            mover,
            grace_period,
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Sweep по текущим часам без возможности отмены.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now(), || false)
    }

    /// Sweep, считающий возраст относительно `now`.
    ///
    /// `cancelled` проверяется перед каждым файлом; после отмены оставшиеся
    /// записи возвращаются в реестр через `release`.
    pub fn sweep_at(&self, now: SystemTime, cancelled: impl Fn() -> bool) -> SweepReport {
        let ctx = LogContext::with_operation("sweep");
        let id = &ctx.correlation_id;
        info!(target: LOG_TARGET, "[{id}] Starting pending files check");

        let due = self.registry.extract_older_than(self.grace_period, now);
        debug!(
            target: LOG_TARGET,
            "[{id}] {} of {} pending file(s) are due",
            due.len(),
            self.registry.len()
        );

        let mut report = SweepReport::default();
        let mut entries = due.into_iter();
        for entry in entries.by_ref() {
            if cancelled() {
                self.registry.release(&entry.path);
                report.deferred += 1;
                break;
            }

            match self.mover.organize(&entry.path) {
                Ok(MoveOutcome::Moved { .. }) => {
                    self.registry.remove(&entry.path);
                    report.moved += 1;
                }
                Ok(MoveOutcome::SourceMissing) => {
                    self.registry.remove(&entry.path);
                    report.vanished += 1;
                }
                Err(err) => {
                    error!(
                        target: LOG_TARGET,
                        "[{id}] Error organizing {}: {err}",
                        entry.path.display()
                    );
                    self.registry.release(&entry.path);
                    report.failed += 1;
                }
            }
        }
        for entry in entries {
            self.registry.release(&entry.path);
            report.deferred += 1;
        }

        info!(
            target: LOG_TARGET,
            "[{id}] Check completed: moved={}, vanished={}, failed={}, deferred={}, still pending={}",
            report.moved,
            report.vanished,
            report.failed,
            report.deferred,
            self.registry.len()
        );
        report
    }
}

/// Состояние планировщика.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    Idle = 0,
    Running = 1,
    Stopped = 2,
}

impl SchedulerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

#[derive(Debug)]
struct Shared {
    cancelled: AtomicBool,
    state: AtomicU8,
}

impl Shared {
    fn set_state(&self, state: SchedulerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// Handle фонового потока sweep'ов.
#[derive(Debug)]
pub struct SchedulerHandle {
    stop_tx: mpsc::Sender<()>,
    shared: Arc<Shared>,
    join: Option<thread::JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    /// Отменить ожидание или текущий проход и дождаться завершения потока.
    pub fn stop(mut self) -> Result<(), OrganizerError> {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        let _ = self.stop_tx.send(());
        if let Some(join) = self.join.take() {
            join.join().map_err(|_| {
                OrganizerError::SchedulerFailed("sweep thread panicked".to_string())
            })?;
        }
        Ok(())
    }
}

/// Запустить sweep'ы в отдельном потоке. Первый проход — сразу.
pub fn spawn_scheduler(
    sweeper: Sweeper,
    interval: Duration,
) -> Result<SchedulerHandle, OrganizerError> {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let shared = Arc::new(Shared {
        cancelled: AtomicBool::new(false),
        state: AtomicU8::new(SchedulerState::Idle as u8),
    });

    let thread_shared = Arc::clone(&shared);
    let join = thread::Builder::new()
        .name("organizer-sweep".to_string())
        .spawn(move || {
            info!(
                target: LOG_TARGET,
                "Sweep scheduler started - grace {:?}, checking every {:?}",
                sweeper.grace_period(),
                interval
            );
            loop {
                if thread_shared.cancelled.load(Ordering::SeqCst) {
                    break;
                }

                thread_shared.set_state(SchedulerState::Running);
                sweeper.sweep_at(SystemTime::now(), || {
                    thread_shared.cancelled.load(Ordering::SeqCst)
                });
                thread_shared.set_state(SchedulerState::Idle);

                debug!(target: LOG_TARGET, "Next check in {:?}", interval);
                match stop_rx.recv_timeout(interval) {
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            thread_shared.set_state(SchedulerState::Stopped);
            info!(target: LOG_TARGET, "Sweep scheduler stopped");
        })?;

    Ok(SchedulerHandle {
        stop_tx,
        shared,
        join: Some(join),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::CategoryTable;
    use std::cell::Cell;
    use std::fs;
    use std::path::Path;
    use std::time::Instant;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn setup(dir: &Path) -> (Arc<PendingRegistry>, Sweeper) {
        let registry = Arc::new(PendingRegistry::new());
        let mover = Arc::new(Mover::new(dir, CategoryTable::default()));
        let sweeper = Sweeper::new(Arc::clone(&registry), mover, DEFAULT_GRACE_PERIOD);
        (registry, sweeper)
    }

    fn touch(dir: &Path, name: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, name).unwrap();
        path
    }

    #[test]
    fn test_sweep_moves_only_aged_files() {
        let dir = TempDir::new().unwrap();
        let (registry, sweeper) = setup(dir.path());
        let now = SystemTime::now();
        let old = touch(dir.path(), "report.PDF");
        let young = touch(dir.path(), "photo.png");
        registry.insert_if_absent(old.clone(), now - HOUR * 25);
        registry.insert_if_absent(young.clone(), now - HOUR);

        let report = sweeper.sweep_at(now, || false);

        assert_eq!(report.moved, 1);
        assert!(dir.path().join("documents").join("report.PDF").exists());
        assert!(young.exists());
        assert!(!registry.contains(&old));
        assert!(registry.contains(&young));
    }

    #[test]
    fn test_vanished_file_is_dropped_silently() {
        let dir = TempDir::new().unwrap();
        let (registry, sweeper) = setup(dir.path());
        let now = SystemTime::now();
        let path = dir.path().join("deleted.zip");
        registry.insert_if_absent(path.clone(), now - HOUR * 48);

        let report = sweeper.sweep_at(now, || false);

        assert_eq!(report, SweepReport { vanished: 1, ..SweepReport::default() });
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failed_move_is_retried_next_sweep() {
        let dir = TempDir::new().unwrap();
        let (registry, sweeper) = setup(dir.path());
        let now = SystemTime::now();
        let path = touch(dir.path(), "movie.mkv");
        registry.insert_if_absent(path.clone(), now - HOUR * 30);

        // Файл на месте папки категории — create_dir_all падает.
        fs::write(dir.path().join("videos"), "blocker").unwrap();
        let first = sweeper.sweep_at(now, || false);
        assert_eq!(first.failed, 1);
        assert!(registry.contains(&path));

        fs::remove_file(dir.path().join("videos")).unwrap();
        let second = sweeper.sweep_at(now, || false);
        assert_eq!(second.moved, 1);
        assert!(dir.path().join("videos").join("movie.mkv").exists());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_mid_sweep_releases_remaining_entries() {
        let dir = TempDir::new().unwrap();
        let (registry, sweeper) = setup(dir.path());
        let now = SystemTime::now();
        for (i, name) in ["a.txt", "b.txt", "c.txt"].iter().enumerate() {
            let path = touch(dir.path(), name);
            registry.insert_if_absent(path, now - HOUR * (30 + i as u32));
        }

        let calls = Cell::new(0);
        let report = sweeper.sweep_at(now, || {
            calls.set(calls.get() + 1);
            calls.get() > 1
        });

        assert_eq!(report.moved, 1);
        assert_eq!(report.deferred, 2);
        assert_eq!(registry.len(), 2);
        // Отложенные записи снова доступны следующему проходу.
        assert_eq!(sweeper.sweep_at(now, || false).moved, 2);
    }

    #[test]
    fn test_scheduler_stops_during_long_interval() {
        let dir = TempDir::new().unwrap();
        let (registry, sweeper) = setup(dir.path());
        let path = touch(dir.path(), "song.mp3");
        registry.insert_if_absent(path, SystemTime::now() - HOUR * 25);

        let handle = spawn_scheduler(sweeper, HOUR).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !registry.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(registry.is_empty(), "first sweep should run immediately");
        assert!(dir.path().join("music").join("song.mp3").exists());

        let start = Instant::now();
        handle.stop().unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_scheduler_state_transitions() {
        let dir = TempDir::new().unwrap();
        let (_registry, sweeper) = setup(dir.path());

        let handle = spawn_scheduler(sweeper, HOUR).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.state() != SchedulerState::Idle && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(handle.state(), SchedulerState::Idle);

        let shared = Arc::clone(&handle.shared);
        handle.stop().unwrap();
        assert_eq!(
            SchedulerState::from_u8(shared.state.load(Ordering::SeqCst)),
            SchedulerState::Stopped
        );
    }
}

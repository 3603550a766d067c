//! Контекст органайзера: владеет реестром, watcher'ом и планировщиком.
//!
//! Порядок запуска: подписка на события → стартовое сканирование → первый
//! sweep. Подписка идёт первой, чтобы файл, появившийся во время сканирования,
//! не потерялся; повторное наблюдение поглощает `insert_if_absent`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use crate::config::OrganizerConfig;
use crate::error::OrganizerError;
use crate::file_watcher::{ensure_watch_dir, start_watcher, WatcherHandle};
use crate::ingestor::{record_created, scan_existing};
use crate::mover::Mover;
use crate::registry::PendingRegistry;
use crate::scheduler::{spawn_scheduler, SchedulerHandle, Sweeper};

const LOG_TARGET: &str = "downloads_organizer";

/// Подготовленный, но ещё не запущенный органайзер.
#[derive(Debug)]
pub struct Organizer {
    config: OrganizerConfig,
    registry: Arc<PendingRegistry>,
    mover: Arc<Mover>,
}

impl Organizer {
    /// Проверить настройки и подготовить папку наблюдения (создаётся при отсутствии).
    pub fn new(mut config: OrganizerConfig) -> Result<Self, OrganizerError> {
        config.validate()?;
        config.watch_dir = ensure_watch_dir(&config.watch_dir)?;

        let mover = Arc::new(Mover::new(config.watch_dir.clone(), config.categories.clone()));
        Ok(Self {
            config,
            registry: Arc::new(PendingRegistry::new()),
            mover,
        })
    }

    pub fn watch_dir(&self) -> &Path {
        &self.config.watch_dir
    }

    pub fn registry(&self) -> &Arc<PendingRegistry> {
        &self.registry
    }

    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.mover),
            self.config.grace_period,
        )
    }

    /// Запустить watcher и sweep'ы.
    ///
    /// `on_watcher_failure` вызывается, если подписку на события не удалось
    /// восстановить; дальше органайзер новых файлов не увидит.
    pub fn start(
        self,
        on_watcher_failure: impl FnOnce(OrganizerError) + Send + 'static,
    ) -> Result<RunningOrganizer, OrganizerError> {
        info!(
            target: LOG_TARGET,
            "Organizer started. Monitoring: {}",
            self.config.watch_dir.display()
        );

        let registry = Arc::clone(&self.registry);
        let watcher = start_watcher(
            &self.config.watch_dir,
            move |event| {
                record_created(&registry, event);
            },
            on_watcher_failure,
        )?;

        let mut running = RunningOrganizer {
            watch_dir: self.config.watch_dir.clone(),
            registry: Arc::clone(&self.registry),
            watcher: Some(watcher),
            scheduler: None,
        };

        // При ошибке здесь running дропается и останавливает watcher.
        scan_existing(&self.config.watch_dir, &self.registry)?;
        running.scheduler = Some(spawn_scheduler(self.sweeper(), self.config.sweep_interval)?);

        Ok(running)
    }
}

/// Запущенный органайзер. Остановка — [`RunningOrganizer::shutdown`] или drop.
#[derive(Debug)]
pub struct RunningOrganizer {
    watch_dir: PathBuf,
    registry: Arc<PendingRegistry>,
    watcher: Option<WatcherHandle>,
    scheduler: Option<SchedulerHandle>,
}

impl RunningOrganizer {
    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    pub fn registry(&self) -> &Arc<PendingRegistry> {
        &self.registry
    }

    /// Отписаться от событий, остановить sweep'ы и дождаться обоих потоков.
    ///
    /// Идущее перемещение успевает завершиться; необработанные записи остаются
    /// в реестре и после перезапуска восстановятся сканированием.
    pub fn shutdown(mut self) -> Result<(), OrganizerError> {
        info!(target: LOG_TARGET, "Stopping downloads organizer...");
        self.stop_all()
    }

    fn stop_all(&mut self) -> Result<(), OrganizerError> {
        let watcher_result = self.watcher.take().map_or(Ok(()), WatcherHandle::stop);
        let scheduler_result = self.scheduler.take().map_or(Ok(()), SchedulerHandle::stop);

        if !self.registry.is_empty() {
            info!(
                target: LOG_TARGET,
                "{} file(s) still pending; they will be picked up on next start",
                self.registry.len()
            );
        }
        watcher_result.and(scheduler_result)
    }
}

impl Drop for RunningOrganizer {
    fn drop(&mut self) {
        if self.watcher.is_none() && self.scheduler.is_none() {
            return;
        }
        if let Err(err) = self.stop_all() {
            warn!(target: LOG_TARGET, "Error while stopping organizer: {err}");
        }
    }
}

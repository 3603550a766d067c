//! Мониторинг наблюдаемой папки.
//!
//! Отвечает за:
//! - определение папки загрузок по умолчанию
//! - запуск нерекурсивного `notify` watcher
//! - повторную подписку при сбое `notify`
//! - graceful shutdown

mod events;

pub use events::FileCreatedEvent;

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, SystemTime};

use log::{debug, error, info, warn};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::OrganizerError;

/// Сколько раз пытаться переподписаться, прежде чем сдаться.
pub const MAX_RESUBSCRIBE_ATTEMPTS: u32 = 3;

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);
const POLL_TICK: Duration = Duration::from_millis(250);
const LOG_TARGET: &str = "downloads_organizer::watcher";

type NotifyResult = Result<notify::Event, notify::Error>;

/// Handle запущенного watcher'а.
#[derive(Debug)]
pub struct WatcherHandle {
  stop_tx: mpsc::Sender<()>,
  join: Option<thread::JoinHandle<()>>,
  watch_dir: PathBuf,
}

impl WatcherHandle {
  pub fn watch_dir(&self) -> &Path {
    &self.watch_dir
  }

  /// Отписаться и дождаться завершения потока.
  pub fn stop(mut self) -> Result<(), OrganizerError> {
    let _ = self.stop_tx.send(());
    if let Some(join) = self.join.take() {
      join
        .join()
        .map_err(|_| OrganizerError::WatcherFailed("watcher thread panicked".to_string()))?;
    }
    Ok(())
  }
}

/// Папка загрузок текущего пользователя: `dirs::download_dir()`, иначе `~/Downloads`.
pub fn default_watch_dir() -> Result<PathBuf, OrganizerError> {
  dirs::download_dir()
    .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
    .ok_or(OrganizerError::DownloadsDirNotFound)
}

/// Проверить путь наблюдения, создать папку при отсутствии и канонизировать путь.
pub fn ensure_watch_dir(path: &Path) -> Result<PathBuf, OrganizerError> {
  if path.as_os_str().is_empty() {
    return Err(OrganizerError::InvalidPath("empty watch directory".to_string()));
  }
  if !path.is_absolute() {
    return Err(OrganizerError::InvalidPath(format!(
      "watch directory must be absolute: {}",
      path.display()
    )));
  }
  std::fs::create_dir_all(path)?;
  Ok(path.canonicalize()?)
}

/// Запустить watcher.
///
/// Подписка создаётся синхронно: если `notify` не может наблюдать папку,
/// ошибка возвращается сразу.
///
/// `on_created`: вызывается для каждого нового обычного файла (в потоке watcher'а).
/// `on_failure`: вызывается один раз, если подписку не удалось восстановить.
pub fn start_watcher(
  watch_dir: &Path,
  on_created: impl Fn(FileCreatedEvent) + Send + 'static,
  on_failure: impl FnOnce(OrganizerError) + Send + 'static,
) -> Result<WatcherHandle, OrganizerError> {
  let watch_dir = watch_dir.to_path_buf();
  info!(target: LOG_TARGET, "Starting watcher for: {}", watch_dir.display());

  let subscription = subscribe(&watch_dir)?;
  let (stop_tx, stop_rx) = mpsc::channel::<()>();

  let watch_dir_clone = watch_dir.clone();
  let join = thread::Builder::new()
    .name("organizer-watcher".to_string())
    .spawn(move || run_loop(&watch_dir_clone, subscription, &stop_rx, on_created, on_failure))?;

  Ok(WatcherHandle {
    stop_tx,
    join: Some(join),
    watch_dir,
  })
}

fn subscribe(
  watch_dir: &Path,
) -> Result<(RecommendedWatcher, mpsc::Receiver<NotifyResult>), OrganizerError> {
  let (event_tx, event_rx) = mpsc::channel::<NotifyResult>();
  let mut watcher = notify::recommended_watcher(move |res| {
    // best-effort send; если receiver уже закрыт — просто игнорируем.
    let _ = event_tx.send(res);
  })?;
  watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
  Ok((watcher, event_rx))
}

fn run_loop(
  watch_dir: &Path,
  subscription: (RecommendedWatcher, mpsc::Receiver<NotifyResult>),
  stop_rx: &mpsc::Receiver<()>,
  on_created: impl Fn(FileCreatedEvent),
  on_failure: impl FnOnce(OrganizerError),
) {
  // watcher должен жить, пока мы читаем его канал.
  let (mut _watcher, mut event_rx) = subscription;

  loop {
    // 1) graceful shutdown
    if stop_requested(stop_rx) {
      info!(target: LOG_TARGET, "Watcher shutdown requested");
      break;
    }

    // 2) обработка событий notify
    match event_rx.recv_timeout(POLL_TICK) {
      Ok(Ok(event)) => {
        debug!(target: LOG_TARGET, "notify event: {:?}", event.kind);
        for path in created_paths(&event) {
          if !is_direct_regular_file(watch_dir, path) {
            continue;
          }
          match make_created_event(path) {
            Ok(e) => on_created(e),
            Err(err) => warn!(target: LOG_TARGET, "Cannot build FileCreatedEvent: {err}"),
          }
        }
      }
      Ok(Err(err)) => {
        warn!(target: LOG_TARGET, "notify error: {err}");
      }
      Err(mpsc::RecvTimeoutError::Timeout) => {
        // тик
      }
      Err(mpsc::RecvTimeoutError::Disconnected) => {
        warn!(target: LOG_TARGET, "notify channel disconnected, resubscribing");
        match resubscribe(watch_dir, stop_rx) {
          Ok(Some((watcher, rx))) => {
            _watcher = watcher;
            event_rx = rx;
          }
          Ok(None) => {
            info!(target: LOG_TARGET, "Watcher shutdown requested during resubscribe");
            break;
          }
          Err(err) => {
            error!(target: LOG_TARGET, "Cannot restore file notifications: {err}");
            on_failure(OrganizerError::WatcherFailed(err.to_string()));
            break;
          }
        }
      }
    }
  }

  info!(target: LOG_TARGET, "Watcher thread finished");
}

fn stop_requested(stop_rx: &mpsc::Receiver<()>) -> bool {
  match stop_rx.try_recv() {
    Ok(()) | Err(mpsc::TryRecvError::Disconnected) => true,
    Err(mpsc::TryRecvError::Empty) => false,
  }
}

/// `Ok(None)` — пока ждали между попытками, пришёл запрос на остановку.
fn resubscribe(
  watch_dir: &Path,
  stop_rx: &mpsc::Receiver<()>,
) -> Result<Option<(RecommendedWatcher, mpsc::Receiver<NotifyResult>)>, OrganizerError> {
  let mut last_err = None;
  for attempt in 1..=MAX_RESUBSCRIBE_ATTEMPTS {
    match subscribe(watch_dir) {
      Ok(subscription) => {
        info!(target: LOG_TARGET, "Resubscribed to {} (attempt {attempt})", watch_dir.display());
        return Ok(Some(subscription));
      }
      Err(err) => {
        warn!(target: LOG_TARGET, "Resubscribe attempt {attempt} failed: {err}");
        last_err = Some(err);
      }
    }
    match stop_rx.recv_timeout(RESUBSCRIBE_DELAY) {
      Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(None),
      Err(mpsc::RecvTimeoutError::Timeout) => {}
    }
  }
  Err(last_err.unwrap_or_else(|| OrganizerError::WatcherFailed("resubscribe failed".to_string())))
}

/// Пути, которые событие добавляет в папку.
fn created_paths(event: &notify::Event) -> &[PathBuf] {
  match event.kind {
    EventKind::Create(CreateKind::Folder) => &[],
    // Некоторые FS/драйверы отдают CreateKind::Any / Other.
    EventKind::Create(_) => &event.paths,
    // Браузеры докачивают во временный файл и переименовывают его.
    EventKind::Modify(ModifyKind::Name(RenameMode::To)) => &event.paths,
    // FSEvents не различает стороны переименования; исчезнувший путь отсеет stat.
    EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => &event.paths,
    EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.get(1..).unwrap_or(&[]),
    EventKind::Modify(_) => &[],
    EventKind::Remove(_) => &[],
    EventKind::Access(_) => &[],
    EventKind::Other => &[],
    EventKind::Any => &[],
  }
}

fn is_direct_regular_file(watch_dir: &Path, path: &Path) -> bool {
  if path.parent() != Some(watch_dir) {
    return false;
  }
  match std::fs::metadata(path) {
    Ok(m) => m.is_file(),
    Err(_) => false,
  }
}

fn make_created_event(path: &Path) -> Result<FileCreatedEvent, OrganizerError> {
  let file_name = path
    .file_name()
    .and_then(|s| s.to_str())
    .ok_or_else(|| OrganizerError::FileNameMissing(path.to_path_buf()))?
    .to_string();

  Ok(FileCreatedEvent {
    file_name,
    full_path: path.to_path_buf(),
    observed_at: SystemTime::now(),
  })
}

//! Интеграционные тесты для file_watcher.
//!
//! Используют временную директорию для изоляции тестов.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use downloads_organizer::file_watcher::{ensure_watch_dir, start_watcher, FileCreatedEvent, WatcherHandle};

/// Собирает события в потокобезопасную очередь для проверки.
#[derive(Clone, Default)]
struct EventCollector {
    events: Arc<Mutex<VecDeque<FileCreatedEvent>>>,
}

impl EventCollector {
    fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: FileCreatedEvent) {
        self.events.lock().unwrap().push_back(event);
    }

    fn take_all(&self) -> Vec<FileCreatedEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }

    fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

/// Ожидание событий с таймаутом.
fn wait_for_events(collector: &EventCollector, min_count: usize, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if collector.count() >= min_count {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}

fn create_test_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    File::create(&path).expect("Failed to create test file");
    path
}

/// Запускает watcher на канонизированной временной папке.
fn start(temp_dir: &TempDir, collector: &EventCollector) -> (PathBuf, WatcherHandle) {
    let dir = ensure_watch_dir(temp_dir.path()).expect("Failed to prepare watch dir");
    let collector_clone = collector.clone();
    let handle = start_watcher(
        &dir,
        move |e| collector_clone.push(e),
        |err| panic!("watcher failed: {err}"),
    )
    .expect("Failed to start watcher");

    // Даём watcher'у время на запуск
    thread::sleep(Duration::from_millis(200));
    (dir, handle)
}

// ============================================================================
// Базовая функциональность
// ============================================================================

#[test]
fn test_watcher_starts_and_stops_successfully() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let collector = EventCollector::new();

    let (dir, handle) = start(&temp_dir, &collector);

    assert_eq!(handle.watch_dir(), dir);
    handle.stop().expect("Failed to stop watcher");
}

#[test]
fn test_watcher_detects_new_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let collector = EventCollector::new();
    let (dir, handle) = start(&temp_dir, &collector);

    create_test_file(&dir, "test_file.txt");

    let found = wait_for_events(&collector, 1, Duration::from_secs(5));
    assert!(found, "Watcher did not detect the new file within timeout");

    let events = collector.take_all();
    assert_eq!(events[0].file_name, "test_file.txt");
    assert_eq!(events[0].full_path, dir.join("test_file.txt"));

    handle.stop().expect("Failed to stop watcher");
}

#[test]
fn test_watcher_detects_multiple_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let collector = EventCollector::new();
    let (dir, handle) = start(&temp_dir, &collector);

    create_test_file(&dir, "file1.txt");
    create_test_file(&dir, "file2.txt");
    create_test_file(&dir, "file3.txt");

    let found = wait_for_events(&collector, 3, Duration::from_secs(5));
    assert!(found, "Watcher did not detect all files within timeout");

    let events = collector.take_all();
    let file_names: Vec<&str> = events.iter().map(|e| e.file_name.as_str()).collect();
    assert!(file_names.contains(&"file1.txt"));
    assert!(file_names.contains(&"file2.txt"));
    assert!(file_names.contains(&"file3.txt"));

    handle.stop().expect("Failed to stop watcher");
}

#[test]
fn test_watcher_detects_file_renamed_into_place() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let outside = TempDir::new_in(temp_dir.path()).expect("Failed to create staging dir");
    let watched = temp_dir.path().join("watched");
    fs::create_dir(&watched).unwrap();
    let staged = create_test_file(outside.path(), "movie.mkv.part");

    let collector = EventCollector::new();
    let dir = ensure_watch_dir(&watched).unwrap();
    let collector_clone = collector.clone();
    let handle = start_watcher(&dir, move |e| collector_clone.push(e), |_| {}).unwrap();
    thread::sleep(Duration::from_millis(200));

    fs::rename(&staged, dir.join("movie.mkv")).unwrap();

    let found = wait_for_events(&collector, 1, Duration::from_secs(5));
    assert!(found, "Watcher did not report the renamed file");
    let events = collector.take_all();
    assert!(events.iter().any(|e| e.file_name == "movie.mkv"));

    handle.stop().expect("Failed to stop watcher");
}

// ============================================================================
// Обработка ошибок
// ============================================================================

#[test]
fn test_watcher_fails_for_missing_directory() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let missing = temp_dir.path().join("does-not-exist");

    let result = start_watcher(&missing, |_| {}, |_| {});

    assert!(result.is_err());
}

#[test]
fn test_ensure_watch_dir_creates_directory() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let non_existent = temp_dir.path().join("subdir").join("nested").join("watch_dir");

    let dir = ensure_watch_dir(&non_existent).expect("Failed to prepare watch dir");

    assert!(non_existent.is_dir());
    assert!(dir.ends_with("subdir/nested/watch_dir"));
}

// ============================================================================
// Graceful shutdown
// ============================================================================

#[test]
fn test_watcher_stops_cleanly() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let collector = EventCollector::new();
    let (_dir, handle) = start(&temp_dir, &collector);

    let start = std::time::Instant::now();
    handle.stop().expect("Failed to stop watcher");

    assert!(
        start.elapsed() < Duration::from_secs(2),
        "Stop took too long: {:?}",
        start.elapsed()
    );
}

// ============================================================================
// Содержимое событий
// ============================================================================

#[test]
fn test_event_timestamp_is_observation_time() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let collector = EventCollector::new();
    let (dir, handle) = start(&temp_dir, &collector);

    let before_create = SystemTime::now();
    create_test_file(&dir, "metadata_test.txt");

    let found = wait_for_events(&collector, 1, Duration::from_secs(5));
    assert!(found, "Watcher did not detect the file");

    let event = &collector.take_all()[0];
    assert!(event.full_path.is_absolute());
    assert!(event.observed_at >= before_create);
    assert!(event.observed_at <= SystemTime::now());

    handle.stop().expect("Failed to stop watcher");
}

#[test]
fn test_watcher_ignores_directories() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let collector = EventCollector::new();
    let (dir, handle) = start(&temp_dir, &collector);

    fs::create_dir(dir.join("subdir")).expect("Failed to create subdir");
    thread::sleep(Duration::from_millis(500));

    let events = collector.take_all();
    assert!(
        events.is_empty(),
        "Watcher should ignore directories, but got {:?}",
        events
    );

    handle.stop().expect("Failed to stop watcher");
}

#[test]
fn test_watcher_is_not_recursive() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let collector = EventCollector::new();
    let (dir, handle) = start(&temp_dir, &collector);
    fs::create_dir(dir.join("images")).unwrap();
    thread::sleep(Duration::from_millis(100));

    create_test_file(&dir.join("images"), "nested.png");
    thread::sleep(Duration::from_millis(500));

    assert_eq!(collector.count(), 0);
    handle.stop().expect("Failed to stop watcher");
}

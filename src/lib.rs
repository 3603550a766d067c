//! Downloads Organizer
//!
//! Следит за папкой (по умолчанию — загрузки) и раскладывает файлы по
//! подпапкам категорий, но только когда файл пролежал дольше grace-периода.
//! Недокачанные и только что открытые файлы так остаются на месте.
//!
//! Бинарник `downloads-organizer` связывает библиотеку с CLI, сигналами и
//! PID-файлом.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod file_watcher;
pub mod ingestor;
pub mod logging;
pub mod mover;
pub mod organizer;
pub mod pidfile;
pub mod registry;
pub mod scheduler;

pub use classifier::{CategoryTable, FALLBACK_CATEGORY};
pub use config::OrganizerConfig;
pub use error::OrganizerError;
pub use organizer::{Organizer, RunningOrganizer};
pub use registry::{PendingEntry, PendingRegistry};
pub use scheduler::{SweepReport, Sweeper};

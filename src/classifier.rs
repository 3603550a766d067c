//! Классификация файлов по расширению.

use std::path::Path;

/// Категория, куда попадают файлы с неизвестным расширением.
pub const FALLBACK_CATEGORY: &str = "others";

const DEFAULT_TABLE: &[(&str, &[&str])] = &[
    (
        "images",
        &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp", ".svg", ".ico"],
    ),
    (
        "videos",
        &[".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm", ".m4v", ".3gp"],
    ),
    (
        "documents",
        &[".pdf", ".doc", ".docx", ".txt", ".xlsx", ".ppt", ".pptx", ".csv", ".odt"],
    ),
    (
        "music",
        &[".mp3", ".wav", ".flac", ".m4a", ".ogg", ".midi", ".aac", ".wma"],
    ),
    (
        "programs",
        &[".exe", ".msi", ".app", ".bat", ".cmd", ".py", ".jar", ".dll"],
    ),
    (
        "compressed",
        &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz", ".iso"],
    ),
    ("3d_printing", &[".stl", ".obj", ".3mf", ".f3d"]),
];

/// Таблица «категория → расширения».
///
/// Порядок категорий фиксирован: при поиске побеждает первая подходящая.
/// Расширения хранятся в нижнем регистре с ведущей точкой.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    categories: Vec<(String, Vec<String>)>,
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_TABLE
                .iter()
                .map(|(name, exts)| (*name, exts.iter().copied())),
        )
    }
}

impl CategoryTable {
    pub fn new<N, E, S>(categories: impl IntoIterator<Item = (N, E)>) -> Self
    where
        N: Into<String>,
        E: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let categories = categories
            .into_iter()
            .map(|(name, exts)| {
                let exts = exts
                    .into_iter()
                    .map(|e| normalize_extension(e.as_ref()))
                    .filter(|e| !e.is_empty())
                    .collect();
                (name.into(), exts)
            })
            .collect();
        Self { categories }
    }

    /// Категория для расширения. Никогда не падает: неизвестное или пустое
    /// расширение даёт [`FALLBACK_CATEGORY`].
    pub fn classify(&self, extension: &str) -> &str {
        let normalized = normalize_extension(extension);
        if normalized.is_empty() {
            return FALLBACK_CATEGORY;
        }

        self.categories
            .iter()
            .find(|(_, exts)| exts.iter().any(|e| *e == normalized))
            .map_or(FALLBACK_CATEGORY, |(name, _)| name.as_str())
    }

    /// Категория по последнему расширению пути (`archive.tar.gz` → `.gz`).
    pub fn classify_path(&self, path: &Path) -> &str {
        match path.extension() {
            Some(ext) => self.classify(&ext.to_string_lossy()),
            None => FALLBACK_CATEGORY,
        }
    }

    /// Имена категорий в порядке поиска (без fallback).
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|(name, _)| name.as_str())
    }
}

/// `"PDF"` / `".PDF"` → `".pdf"`; пустая строка остаётся пустой.
fn normalize_extension(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "." {
        return String::new();
    }
    let lower = trimmed.to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

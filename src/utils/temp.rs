//! Модуль для работы с временными файлами
//!
//! Каждый запуск конвейера получает собственный каталог `dub-<run id>-*`,
//! поэтому параллельные запуски не пересекаются по именам файлов.
//! Все промежуточные пути регистрируются в `TempArtifactSet` и удаляются
//! ровно один раз: явным вызовом `cleanup` или при уничтожении объекта.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::TempDir;

use crate::error::Result;

/// Итог очистки временных артефактов
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    /// Удалено путей
    pub removed: usize,
    /// Путей, которых уже не было
    pub missing: usize,
    /// Путей, которые не удалось удалить
    pub failed: usize,
}

/// Набор временных артефактов одного запуска
pub struct TempArtifactSet {
    /// Идентификатор запуска
    run_id: String,
    /// Путь к каталогу запуска
    run_path: PathBuf,
    /// Каталог запуска; None после очистки
    run_dir: Option<TempDir>,
    /// Зарегистрированные пути в порядке создания
    artifacts: Vec<PathBuf>,
}

impl TempArtifactSet {
    /// Создать каталог запуска внутри `root` (или системной временной директории)
    pub fn new(root: Option<&Path>) -> Result<Self> {
        let run_id = uuid::Uuid::new_v4().simple().to_string()[..12].to_string();
        let prefix = format!("dub-{}-", run_id);

        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let run_dir = match root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        let run_path = run_dir.path().to_path_buf();
        debug!("Run {} uses working directory {}", run_id, run_path.display());

        Ok(Self {
            run_id,
            run_path,
            run_dir: Some(run_dir),
            artifacts: Vec::new(),
        })
    }

    /// Идентификатор запуска
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Путь к каталогу запуска
    pub fn run_dir(&self) -> &Path {
        &self.run_path
    }

    /// Зарегистрировать путь к будущему файлу `<prefix>_<run id>.<extension>`
    pub fn create_path(&mut self, prefix: &str, extension: &str) -> PathBuf {
        let file_name = format!("{}_{}.{}", prefix, self.run_id, extension);
        let path = self.run_path.join(file_name);
        self.artifacts.push(path.clone());
        path
    }

    /// Создать и зарегистрировать подкаталог
    pub fn create_dir(&mut self, name: &str) -> Result<PathBuf> {
        let path = self.run_path.join(name);
        fs::create_dir_all(&path)?;
        self.artifacts.push(path.clone());
        Ok(path)
    }

    /// Зарегистрировать путь, созданный сторонним инструментом
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.artifacts.contains(&path) {
            self.artifacts.push(path);
        }
    }

    /// Зарегистрированные пути
    pub fn paths(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// Была ли уже выполнена очистка
    pub fn is_cleaned(&self) -> bool {
        self.run_dir.is_none()
    }

    /// Удалить все зарегистрированные пути и каталог запуска.
    ///
    /// Отсутствующие файлы пропускаются молча. Повторный вызов ничего не делает.
    pub fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        let Some(run_dir) = self.run_dir.take() else {
            return report;
        };

        // В обратном порядке: файлы внутри подкаталогов удаляются раньше самих подкаталогов
        for path in self.artifacts.drain(..).rev() {
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };

            match result {
                Ok(()) => report.removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => report.missing += 1,
                Err(e) => {
                    warn!("Failed to remove temporary artifact {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        if let Err(e) = run_dir.close() {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove run directory {}: {}", self.run_path.display(), e);
            }
        }

        debug!(
            "Run {} cleanup: removed={} missing={} failed={}",
            self.run_id, report.removed, report.missing, report.failed
        );
        report
    }
}

impl Drop for TempArtifactSet {
    fn drop(&mut self) {
        // Срабатывает, если запуск был прерван до явной очистки
        if !self.is_cleaned() {
            self.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_cleanup_removes_files_and_run_dir() {
        let root = tempfile::tempdir().unwrap();
        let mut artifacts = TempArtifactSet::new(Some(root.path())).unwrap();

        let audio = artifacts.create_path("audio", "wav");
        fs::write(&audio, b"RIFF").unwrap();
        let workdir = artifacts.create_dir("separation").unwrap();
        fs::write(workdir.join("vocals.wav"), b"RIFF").unwrap();
        // Зарегистрирован, но так и не создан
        artifacts.create_path("final", "wav");

        assert!(artifacts.run_dir().starts_with(root.path()));
        assert_eq!(entries(root.path()), 1);

        let report = artifacts.cleanup();
        assert_eq!(report.removed, 2);
        assert_eq!(report.missing, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(entries(root.path()), 0);

        // Повторная очистка ничего не делает
        assert_eq!(artifacts.cleanup(), CleanupReport::default());
    }

    #[test]
    fn test_drop_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        {
            let mut artifacts = TempArtifactSet::new(Some(root.path())).unwrap();
            let path = artifacts.create_path("audio", "wav");
            fs::write(&path, b"data").unwrap();
        }
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn test_runs_are_isolated() {
        let root = tempfile::tempdir().unwrap();
        let mut first = TempArtifactSet::new(Some(root.path())).unwrap();
        let mut second = TempArtifactSet::new(Some(root.path())).unwrap();

        assert_ne!(first.run_id(), second.run_id());
        assert_ne!(first.run_dir(), second.run_dir());
        assert_ne!(first.create_path("audio", "wav"), second.create_path("audio", "wav"));
    }

    #[test]
    fn test_track_is_deduplicated() {
        let mut artifacts = TempArtifactSet::new(None).unwrap();
        let path = artifacts.run_dir().join("external.wav");
        artifacts.track(&path);
        artifacts.track(&path);
        assert_eq!(artifacts.paths().len(), 1);
    }
}

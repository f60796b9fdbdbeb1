//! Готовые наблюдатели для событий прогресса конвейера

use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::progress::{PipelineStage, ProgressInfo, ProgressObserver};

fn format_details(progress: &ProgressInfo) -> String {
    match progress.details.as_deref() {
        Some(details) if !details.is_empty() => format!(", details: {}", details),
        _ => String::new(),
    }
}

/// Наблюдатель, пишущий события в лог
#[derive(Debug, Default)]
pub struct LoggingProgressObserver {
    prefix: Option<String>,
}

impl LoggingProgressObserver {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl ProgressObserver for LoggingProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        let prefix = self.prefix.as_deref().unwrap_or("");
        if progress.stage == PipelineStage::Failed {
            warn!("{}Stage: {}{}", prefix, progress.stage, format_details(&progress));
        } else {
            info!(
                "{}Stage: {}, total progress: {:.1}%{}",
                prefix,
                progress.stage,
                progress.total_progress,
                format_details(&progress)
            );
        }
    }
}

/// Наблюдатель, сохраняющий события в памяти
#[derive(Debug, Clone, Default)]
pub struct MemoryProgressObserver {
    history: Arc<Mutex<Vec<ProgressInfo>>>,
}

impl MemoryProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// История событий
    pub fn history(&self) -> Vec<ProgressInfo> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Только этапы, в порядке прохождения
    pub fn stages(&self) -> Vec<PipelineStage> {
        self.history().iter().map(|p| p.stage).collect()
    }

    pub fn clear_history(&self) {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl ProgressObserver for MemoryProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(progress);
    }
}

/// Комбинированный наблюдатель, объединяющий несколько наблюдателей
#[derive(Default)]
pub struct CompositeProgressObserver {
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl CompositeProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }
}

impl ProgressObserver for CompositeProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        for observer in &self.observers {
            observer.on_progress_update(progress.clone());
        }
    }
}

//! Модуль для отслеживания прогресса конвейера дубляжа
//!
//! Реализация паттерна Observer: каждая смена этапа конвейера отправляется
//! зарегистрированным наблюдателям. Таймингов и анимации здесь нет, только
//! события на границах этапов.

use std::collections::HashMap;
use std::fmt;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, RwLock,
};

use log::error;
use serde::{Deserialize, Serialize};

/// Этапы конвейера дубляжа
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    ExtractingAudio,
    DetectingSpeakers,
    Separating,
    AnalyzingEmotion,
    Transcribing,
    Translating,
    Synthesizing,
    Mixing,
    Remuxing,
    CleaningUp,
    Done,
    Failed,
}

impl PipelineStage {
    /// Получить название этапа в виде строки
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ExtractingAudio => "extracting_audio",
            Self::DetectingSpeakers => "detecting_speakers",
            Self::Separating => "separating",
            Self::AnalyzingEmotion => "analyzing_emotion",
            Self::Transcribing => "transcribing",
            Self::Translating => "translating",
            Self::Synthesizing => "synthesizing",
            Self::Mixing => "mixing",
            Self::Remuxing => "remuxing",
            Self::CleaningUp => "cleaning_up",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Весовой коэффициент этапа (в процентах от общего процесса)
    pub fn weight(&self) -> f32 {
        match self {
            Self::ExtractingAudio => 5.0,
            Self::DetectingSpeakers => 3.0,
            Self::Separating => 25.0,
            Self::AnalyzingEmotion => 5.0,
            Self::Transcribing => 15.0,
            Self::Translating => 5.0,
            Self::Synthesizing => 30.0,
            Self::Mixing => 5.0,
            Self::Remuxing => 5.0,
            Self::CleaningUp => 2.0,
            Self::Idle | Self::Done | Self::Failed => 0.0,
        }
    }

    /// Допустим ли переход в `next`.
    ///
    /// Прямая цепочка этапов, пропуск `Mixing`, уход в `CleaningUp` из любого
    /// рабочего этапа и `Idle -> Failed` для отказа до создания артефактов.
    pub fn can_transition_to(&self, next: PipelineStage) -> bool {
        use PipelineStage::*;

        match (*self, next) {
            (Idle, ExtractingAudio)
            | (ExtractingAudio, DetectingSpeakers)
            | (DetectingSpeakers, Separating)
            | (Separating, AnalyzingEmotion)
            | (AnalyzingEmotion, Transcribing)
            | (Transcribing, Translating)
            | (Translating, Synthesizing)
            | (Synthesizing, Mixing)
            | (Synthesizing, Remuxing)
            | (Mixing, Remuxing)
            | (CleaningUp, Done)
            | (CleaningUp, Failed)
            | (Idle, Failed) => true,
            (from, CleaningUp) => !matches!(from, Idle | CleaningUp | Done | Failed),
            _ => false,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Событие на границе этапа
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Этап, в который перешёл конвейер
    pub stage: PipelineStage,
    /// Общий процент выполнения (0.0 - 100.0)
    pub total_progress: f32,
    /// Дополнительная информация об этапе
    pub details: Option<String>,
}

impl ProgressInfo {
    pub fn new(stage: PipelineStage, total_progress: f32, details: Option<String>) -> Self {
        Self {
            stage,
            total_progress: total_progress.clamp(0.0, 100.0),
            details,
        }
    }
}

/// Трейт для наблюдателя, получающего уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Трейт для объекта, отправляющего уведомления о прогрессе
pub trait ProgressReporter: Send + Sync {
    /// Добавить наблюдателя; возвращает идентификатор для удаления
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize;

    /// Удалить наблюдателя по идентификатору
    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>>;

    /// Уведомить всех наблюдателей о прогрессе
    fn notify_progress(&self, progress: ProgressInfo);
}

/// Синхронный репортер: наблюдатели вызываются в потоке конвейера
pub struct DefaultProgressReporter {
    observers: RwLock<HashMap<usize, Box<dyn ProgressObserver>>>,
    next_id: AtomicUsize,
}

impl DefaultProgressReporter {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(0),
        }
    }

    fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn dispatch(&self, progress: &ProgressInfo) {
        let observers = self.observers.read().unwrap_or_else(|e| e.into_inner());
        for observer in observers.values() {
            observer.on_progress_update(progress.clone());
        }
    }
}

impl Default for DefaultProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for DefaultProgressReporter {
    fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id();
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        observers.insert(id, observer);
        id
    }

    fn remove_observer(&mut self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        observers.remove(&id)
    }

    fn notify_progress(&self, progress: ProgressInfo) {
        self.dispatch(&progress);
    }
}

/// Трекер этапов одного запуска конвейера
pub struct ProgressTracker {
    reporter: Option<Arc<dyn ProgressReporter>>,
    stage: PipelineStage,
    /// Сумма весов пройденных этапов
    completed_weight: f32,
}

impl ProgressTracker {
    pub fn new(reporter: Option<Arc<dyn ProgressReporter>>) -> Self {
        Self {
            reporter,
            stage: PipelineStage::Idle,
            completed_weight: 0.0,
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn total_progress(&self) -> f32 {
        match self.stage {
            PipelineStage::Done => 100.0,
            _ => self.completed_weight.clamp(0.0, 100.0),
        }
    }

    /// Перейти на этап `next`, засчитав текущий, и уведомить наблюдателей.
    ///
    /// Недопустимый переход не меняет состояние; возвращается `false`.
    pub fn transition(&mut self, next: PipelineStage, details: Option<String>) -> bool {
        self.advance(next, details, true)
    }

    /// Уйти в очистку после ошибки; прерванный этап не засчитывается
    pub fn abort(&mut self, reason: String) -> bool {
        self.advance(PipelineStage::CleaningUp, Some(reason), false)
    }

    fn advance(&mut self, next: PipelineStage, details: Option<String>, credit: bool) -> bool {
        if !self.stage.can_transition_to(next) {
            error!("Illegal pipeline transition {} -> {}", self.stage, next);
            return false;
        }

        if credit && next != PipelineStage::Failed {
            self.completed_weight += self.stage.weight();
        }
        self.stage = next;

        if let Some(reporter) = &self.reporter {
            reporter.notify_progress(ProgressInfo::new(next, self.total_progress(), details));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct TestObserver {
        updates: Arc<Mutex<Vec<ProgressInfo>>>,
    }

    impl TestObserver {
        fn new() -> (Self, Arc<Mutex<Vec<ProgressInfo>>>) {
            let updates = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    updates: updates.clone(),
                },
                updates,
            )
        }
    }

    impl ProgressObserver for TestObserver {
        fn on_progress_update(&self, progress: ProgressInfo) {
            self.updates.lock().unwrap().push(progress);
        }
    }

    const HAPPY_PATH: [PipelineStage; 12] = [
        PipelineStage::ExtractingAudio,
        PipelineStage::DetectingSpeakers,
        PipelineStage::Separating,
        PipelineStage::AnalyzingEmotion,
        PipelineStage::Transcribing,
        PipelineStage::Translating,
        PipelineStage::Synthesizing,
        PipelineStage::Mixing,
        PipelineStage::Remuxing,
        PipelineStage::CleaningUp,
        PipelineStage::Done,
        PipelineStage::Done,
    ];

    #[test]
    fn test_stage_weights_sum_to_hundred() {
        let total: f32 = HAPPY_PATH[..10].iter().map(|s| s.weight()).sum();
        assert!((total - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_transitions() {
        use PipelineStage::*;

        assert!(Idle.can_transition_to(ExtractingAudio));
        assert!(Synthesizing.can_transition_to(Mixing));
        assert!(Synthesizing.can_transition_to(Remuxing));
        assert!(Transcribing.can_transition_to(CleaningUp));
        assert!(CleaningUp.can_transition_to(Failed));
        assert!(Idle.can_transition_to(Failed));

        assert!(!Idle.can_transition_to(Separating));
        assert!(!Separating.can_transition_to(Transcribing));
        assert!(!Idle.can_transition_to(CleaningUp));
        assert!(!Done.can_transition_to(CleaningUp));
        assert!(!Remuxing.can_transition_to(Done));
        assert!(!Failed.can_transition_to(Idle));
    }

    #[test]
    fn test_tracker_reports_every_transition() {
        let mut reporter = DefaultProgressReporter::new();
        let (observer, updates) = TestObserver::new();
        reporter.add_observer(Box::new(observer));

        let mut tracker = ProgressTracker::new(Some(Arc::new(reporter)));
        for stage in &HAPPY_PATH[..11] {
            assert!(tracker.transition(*stage, None));
        }
        // Done -> Done недопустим и не уведомляет
        assert!(!tracker.transition(PipelineStage::Done, None));

        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 11);
        assert_eq!(updates[0].stage, PipelineStage::ExtractingAudio);
        assert_eq!(updates[0].total_progress, 0.0);
        assert_eq!(updates[3].total_progress, 33.0);
        assert_eq!(updates[10].stage, PipelineStage::Done);
        assert_eq!(updates[10].total_progress, 100.0);
        for pair in updates.windows(2) {
            assert!(pair[0].total_progress <= pair[1].total_progress);
        }
    }

    #[test]
    fn test_failure_path() {
        let mut tracker = ProgressTracker::new(None);
        tracker.transition(PipelineStage::ExtractingAudio, None);
        tracker.transition(PipelineStage::DetectingSpeakers, None);
        assert!(!tracker.transition(PipelineStage::Remuxing, None));
        assert_eq!(tracker.stage(), PipelineStage::DetectingSpeakers);

        assert!(tracker.abort("boom".to_string()));
        assert_eq!(tracker.total_progress(), 5.0);
        assert!(tracker.transition(PipelineStage::Failed, None));
        assert_eq!(tracker.stage(), PipelineStage::Failed);
        assert!(tracker.total_progress() < 100.0);
    }

    #[test]
    fn test_stage_serialization() {
        assert_eq!(
            serde_json::to_string(&PipelineStage::AnalyzingEmotion).unwrap(),
            "\"analyzing_emotion\""
        );
        assert_eq!(PipelineStage::CleaningUp.to_string(), "cleaning_up");
    }
}

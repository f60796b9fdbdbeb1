//! Разделение аудио на вокал и фон
//!
//! Движки пробуются по порядку: основной (Demucs), затем резервный
//! (шумоподавление). Переход на резервный движок не считается ошибкой,
//! он только логируется. Ошибка возвращается, если не сработал ни один.

pub mod demucs;
pub mod fallback;
pub mod speakers;

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::config::DubConfig;
use crate::error::{DubError, Result};
use crate::types::{MediaAsset, Stems};

pub use demucs::DemucsSeparator;
pub use fallback::NoiseReductionSeparator;
pub use speakers::{
    count_energy_transitions, estimate_speaker_count, estimate_speaker_count_file,
    speakers_for_transitions, window_energies,
};

/// Движок разделения на стемы
#[async_trait::async_trait]
pub trait SeparationEngine: Send + Sync {
    /// Имя движка для логов
    fn name(&self) -> &str;

    /// Можно ли запускать движок в текущем окружении
    fn is_available(&self) -> bool {
        true
    }

    /// Разделить `audio`, записав стемы внутрь `workdir`
    async fn separate(&self, audio: &MediaAsset, workdir: &Path) -> Result<Stems>;
}

/// Какой из движков дал результат
#[derive(Debug, Clone, PartialEq)]
pub enum SeparationOutcome {
    Primary(Stems),
    Fallback(Stems),
    /// Причины отказа каждого движка по порядку
    Failed(Vec<String>),
}

impl SeparationOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    pub fn into_result(self) -> Result<Stems> {
        match self {
            Self::Primary(stems) | Self::Fallback(stems) => Ok(stems),
            Self::Failed(reasons) => Err(DubError::Separation(reasons.join("; "))),
        }
    }
}

/// Разделитель с упорядоченным списком движков
pub struct SourceSeparator {
    primary: Option<Arc<dyn SeparationEngine>>,
    fallback: Arc<dyn SeparationEngine>,
}

impl SourceSeparator {
    pub fn new(
        primary: Option<Arc<dyn SeparationEngine>>,
        fallback: Arc<dyn SeparationEngine>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Demucs (если включён) и шумоподавление в качестве резерва
    pub fn from_config(config: &DubConfig) -> Self {
        let primary: Option<Arc<dyn SeparationEngine>> = if config.demucs.enabled {
            Some(Arc::new(DemucsSeparator::new(&config.demucs)))
        } else {
            None
        };
        Self::new(primary, Arc::new(NoiseReductionSeparator::default()))
    }

    pub async fn separate(&self, audio: &MediaAsset, workdir: &Path) -> Result<Stems> {
        self.separate_with_outcome(audio, workdir)
            .await
            .into_result()
    }

    pub async fn separate_with_outcome(&self, audio: &MediaAsset, workdir: &Path) -> SeparationOutcome {
        let mut reasons = Vec::new();

        if let Some(primary) = &self.primary {
            if !primary.is_available() {
                let reason = format!("{} is not available", primary.name());
                warn!("{}, using fallback separation", reason);
                reasons.push(reason);
            } else {
                match run_engine(primary.as_ref(), audio, workdir).await {
                    Ok(stems) => {
                        info!("Separated stems with {}", primary.name());
                        return SeparationOutcome::Primary(stems);
                    }
                    Err(e) => {
                        warn!("{} failed: {}, using fallback separation", primary.name(), e);
                        reasons.push(format!("{}: {}", primary.name(), e));
                    }
                }
            }
        }

        match run_engine(self.fallback.as_ref(), audio, workdir).await {
            Ok(stems) => {
                info!("Separated stems with {}", self.fallback.name());
                SeparationOutcome::Fallback(stems)
            }
            Err(e) => {
                log::error!("{} failed: {}", self.fallback.name(), e);
                reasons.push(format!("{}: {}", self.fallback.name(), e));
                SeparationOutcome::Failed(reasons)
            }
        }
    }
}

/// Запуск движка с проверкой, что оба стема действительно записаны
async fn run_engine(
    engine: &dyn SeparationEngine,
    audio: &MediaAsset,
    workdir: &Path,
) -> Result<Stems> {
    let stems = engine.separate(audio, workdir).await?;
    for stem in [&stems.vocals, &stems.background] {
        if !stem.exists() {
            return Err(DubError::Separation(format!(
                "expected stem {} is missing",
                stem.path().display()
            )));
        }
    }
    Ok(stems)
}

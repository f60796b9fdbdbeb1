use std::path::Path;
use std::sync::Arc;

use super::*;
use crate::media::audio::read_wav;
use crate::separation::{estimate_speaker_count, estimate_speaker_count_file, SeparationOutcome};

/// Основной движок, который просто копирует вход в оба стема
struct CopySeparator;

#[async_trait::async_trait]
impl SeparationEngine for CopySeparator {
    fn name(&self) -> &str {
        "copy"
    }

    async fn separate(&self, audio: &MediaAsset, workdir: &Path) -> Result<Stems> {
        let vocals = workdir.join("vocals.wav");
        let background = workdir.join("no_vocals.wav");
        std::fs::copy(audio.path(), &vocals)?;
        std::fs::copy(audio.path(), &background)?;
        Ok(Stems {
            vocals: MediaAsset::new(vocals),
            background: MediaAsset::new(background),
        })
    }
}

/// Движок, который «успешно» отработал, но файлов не записал
struct PhantomSeparator;

#[async_trait::async_trait]
impl SeparationEngine for PhantomSeparator {
    fn name(&self) -> &str {
        "phantom"
    }

    async fn separate(&self, _audio: &MediaAsset, workdir: &Path) -> Result<Stems> {
        Ok(Stems {
            vocals: MediaAsset::new(workdir.join("ghost_vocals.wav")),
            background: MediaAsset::new(workdir.join("ghost_background.wav")),
        })
    }
}

struct UnavailableSeparator;

#[async_trait::async_trait]
impl SeparationEngine for UnavailableSeparator {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn separate(&self, _audio: &MediaAsset, _workdir: &Path) -> Result<Stems> {
        panic!("unavailable engine must not run");
    }
}

fn source_clip(dir: &Path) -> MediaAsset {
    let path = dir.join("source.wav");
    let buffer = AudioBuffer::mono(speech_like(16000, 2.0), 16000);
    write_wav(&buffer, &path).unwrap();
    MediaAsset::audio(path, 16000, 1, buffer.duration_secs())
}

#[tokio::test]
async fn test_primary_failure_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let audio = source_clip(dir.path());
    let separator = SourceSeparator::new(
        Some(Arc::new(FailingSeparator)),
        Arc::new(NoiseReductionSeparator::default()),
    );

    let outcome = separator.separate_with_outcome(&audio, dir.path()).await;
    assert!(outcome.is_fallback());

    let stems = outcome.into_result().unwrap();
    assert!(stems.vocals.exists());
    assert!(stems.background.exists());
    assert_eq!(stems.vocals.sample_rate, stems.background.sample_rate);
    assert_eq!(
        stems.vocals.path().file_name().unwrap(),
        "vocals_simple.wav"
    );
    assert_eq!(read_wav(stems.vocals.path()).unwrap().frames(), 32000);
}

#[tokio::test]
async fn test_primary_success_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let audio = source_clip(dir.path());
    let separator = SourceSeparator::new(
        Some(Arc::new(CopySeparator)),
        Arc::new(NoiseReductionSeparator::default()),
    );

    let outcome = separator.separate_with_outcome(&audio, dir.path()).await;
    assert!(matches!(outcome, SeparationOutcome::Primary(_)));
    assert!(!dir.path().join("vocals_simple.wav").exists());
}

#[tokio::test]
async fn test_unavailable_primary_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let audio = source_clip(dir.path());
    let separator = SourceSeparator::new(
        Some(Arc::new(UnavailableSeparator)),
        Arc::new(NoiseReductionSeparator::default()),
    );

    let stems = separator.separate(&audio, dir.path()).await.unwrap();
    assert!(stems.vocals.exists());
}

#[tokio::test]
async fn test_missing_stem_files_count_as_failure() {
    let dir = tempfile::tempdir().unwrap();
    let audio = source_clip(dir.path());
    let separator = SourceSeparator::new(
        Some(Arc::new(PhantomSeparator)),
        Arc::new(NoiseReductionSeparator::default()),
    );

    let outcome = separator.separate_with_outcome(&audio, dir.path()).await;
    assert!(outcome.is_fallback());
}

#[tokio::test]
async fn test_total_failure_lists_every_engine() {
    let dir = tempfile::tempdir().unwrap();
    let audio = MediaAsset::new(dir.path().join("missing.wav"));
    let separator = SourceSeparator::new(
        Some(Arc::new(FailingSeparator)),
        Arc::new(NoiseReductionSeparator::default()),
    );

    match separator.separate(&audio, dir.path()).await {
        Err(DubError::Separation(message)) => {
            assert!(message.contains("failing"));
            assert!(message.contains("noise-reduction"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_silence_then_tone_is_one_speaker() {
    let rate = 16000;
    let mut samples = vec![0.0; rate as usize * 5];
    samples.extend(tone(440.0, rate, 5.0, 0.5));
    assert_eq!(estimate_speaker_count(&AudioBuffer::mono(samples.clone(), rate)), 1);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.wav");
    write_wav(&AudioBuffer::mono(samples, rate), &path).unwrap();
    assert_eq!(estimate_speaker_count_file(&path).unwrap(), 1);
}

#[test]
fn test_alternating_activity_is_more_speakers() {
    let rate = 16000;
    let second = rate as usize;
    let mut samples = Vec::new();
    for i in 0..20 {
        if i % 2 == 0 {
            samples.extend(tone(300.0, rate, 1.0, 0.5));
        } else {
            samples.extend(vec![0.0; second]);
        }
    }
    assert_eq!(estimate_speaker_count(&AudioBuffer::mono(samples, rate)), 3);
}

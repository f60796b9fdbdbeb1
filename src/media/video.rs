//! Модуль для работы с видео
//!
//! Реализация [`MediaTool`] поверх ffmpeg/ffprobe.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::audio::wav_duration;
use super::{MediaTool, EXTRACT_SAMPLE_RATE};
use crate::config::FfmpegConfig;
use crate::error::{DubError, Result};
use crate::types::MediaAsset;
use crate::utils::ffmpeg::{check_tool_installed, run_ffmpeg_command, run_ffprobe_command};

/// Работа с видео через внешние ffmpeg и ffprobe
#[derive(Debug, Clone)]
pub struct FfmpegMedia {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegMedia {
    pub fn new(config: &FfmpegConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
        }
    }

    /// Установлены ли ffmpeg и ffprobe
    pub fn is_available(&self) -> bool {
        check_tool_installed(&self.ffmpeg) && check_tool_installed(&self.ffprobe)
    }

    /// Есть ли в контейнере хотя бы одна аудиодорожка
    async fn has_audio_stream(&self, video: &Path) -> Result<bool> {
        let args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-select_streams".into(),
            "a".into(),
            "-show_entries".into(),
            "stream=index".into(),
            "-of".into(),
            "csv=p=0".into(),
            video.as_os_str().to_owned(),
        ];
        let output = run_ffprobe_command(&self.ffprobe, &args).await?;
        Ok(!output.trim().is_empty())
    }
}

#[async_trait::async_trait]
impl MediaTool for FfmpegMedia {
    async fn extract_audio(&self, video: &Path, output: &Path) -> Result<(MediaAsset, f64)> {
        if !self.has_audio_stream(video).await? {
            return Err(DubError::Media(format!(
                "No audio stream found in {}",
                video.display()
            )));
        }

        run_ffmpeg_command(&self.ffmpeg, &extract_args(video, output)).await?;

        if !output.exists() {
            return Err(DubError::Media(format!(
                "FFmpeg did not produce {}",
                output.display()
            )));
        }

        let duration = wav_duration(output)?;
        info!(
            "Extracted audio from {} ({:.2}s)",
            video.display(),
            duration
        );
        Ok((
            MediaAsset::audio(output, EXTRACT_SAMPLE_RATE, 1, duration),
            duration,
        ))
    }

    async fn remux(&self, video: &Path, audio: &Path, output: &Path) -> Result<PathBuf> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // ffmpeg пишет во временный файл рядом с результатом; существующий
        // файл по пути `output` заменяется только после успешной сборки
        let partial = partial_path(output);
        let result = run_ffmpeg_command(&self.ffmpeg, &remux_args(video, audio, &partial)).await;

        match result {
            Ok(()) if partial.exists() => {
                tokio::fs::rename(&partial, output).await?;
                info!("Remuxed dubbed video to {}", output.display());
                Ok(output.to_path_buf())
            }
            Ok(()) => Err(DubError::Media(format!(
                "FFmpeg did not produce {}",
                output.display()
            ))),
            Err(e) => {
                if partial.exists() {
                    if let Err(remove_err) = tokio::fs::remove_file(&partial).await {
                        warn!(
                            "Failed to remove partial output {}: {}",
                            partial.display(),
                            remove_err
                        );
                    } else {
                        debug!("Removed partial output {}", partial.display());
                    }
                }
                Err(e)
            }
        }
    }
}

/// Временное имя рядом с `output`; расширение сохраняется, по нему ffmpeg выбирает контейнер
fn partial_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let name = match output.extension() {
        Some(ext) => format!(".{}.partial-{}.{}", stem, &suffix[..8], ext.to_string_lossy()),
        None => format!(".{}.partial-{}", stem, &suffix[..8]),
    };
    output.with_file_name(name)
}

/// Аргументы извлечения: моно, 16 кГц, 16-бит PCM
pub(crate) fn extract_args(video: &Path, output: &Path) -> Vec<OsString> {
    let rate = EXTRACT_SAMPLE_RATE.to_string();
    vec![
        "-y".into(),
        "-i".into(),
        video.as_os_str().to_owned(),
        "-vn".into(),
        "-acodec".into(),
        "pcm_s16le".into(),
        "-ar".into(),
        rate.into(),
        "-ac".into(),
        "1".into(),
        output.as_os_str().to_owned(),
    ]
}

/// Аргументы сведения: видео копируется, аудио заменяется, длина по кратчайшему потоку
pub(crate) fn remux_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-i".into(),
        video.as_os_str().to_owned(),
        "-i".into(),
        audio.as_os_str().to_owned(),
        "-c:v".into(),
        "copy".into(),
        "-map".into(),
        "0:v:0".into(),
        "-map".into(),
        "1:a:0".into(),
        "-shortest".into(),
        output.as_os_str().to_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().to_string()).collect()
    }

    #[test]
    fn test_extract_args() {
        let args = render(&extract_args(Path::new("in.mp4"), Path::new("out.wav")));
        assert_eq!(
            args,
            vec!["-y", "-i", "in.mp4", "-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1", "out.wav"]
        );
    }

    #[test]
    fn test_remux_args_copy_video() {
        let args = render(&remux_args(
            Path::new("in.mp4"),
            Path::new("dub.wav"),
            Path::new("out.mp4"),
        ));
        let joined = args.join(" ");
        assert!(joined.contains("-c:v copy"));
        assert!(joined.contains("-map 0:v:0 -map 1:a:0"));
        assert!(joined.contains("-shortest"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_partial_path_keeps_directory_and_extension() {
        let partial = partial_path(Path::new("/videos/out/dubbed_clip_es.mp4"));
        assert_eq!(partial.parent(), Some(Path::new("/videos/out")));
        assert_eq!(partial.extension().unwrap(), "mp4");
        let name = partial.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(".dubbed_clip_es.partial-"));
    }

    #[tokio::test]
    async fn test_failed_remux_keeps_existing_output() {
        let media = FfmpegMedia::new(&FfmpegConfig {
            ffmpeg_path: "no-such-ffmpeg-binary".to_string(),
            ffprobe_path: "no-such-ffprobe-binary".to_string(),
        });
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("dubbed.mp4");
        std::fs::write(&output, b"previous result").unwrap();

        let result = media
            .remux(&dir.path().join("in.mp4"), &dir.path().join("dub.wav"), &output)
            .await;
        assert!(matches!(result, Err(DubError::Media(_))));
        assert_eq!(std::fs::read(&output).unwrap(), b"previous result");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_missing_ffprobe_fails_extract() {
        let media = FfmpegMedia::new(&FfmpegConfig {
            ffmpeg_path: "no-such-ffmpeg-binary".to_string(),
            ffprobe_path: "no-such-ffprobe-binary".to_string(),
        });
        assert!(!media.is_available());

        let dir = tempfile::tempdir().unwrap();
        let result = media
            .extract_audio(&dir.path().join("in.mp4"), &dir.path().join("out.wav"))
            .await;
        assert!(matches!(result, Err(DubError::Media(_))));
    }
}

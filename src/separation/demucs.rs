use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;

use super::SeparationEngine;
use crate::config::DemucsConfig;
use crate::error::{DubError, Result};
use crate::media::audio::probe_wav;
use crate::types::{MediaAsset, Stems};

/// Сколько последних строк stderr сохранять для сообщения об ошибке
const STDERR_TAIL_LINES: usize = 5;

/// Разделение через CLI Demucs (`--two-stems=vocals`)
#[derive(Debug, Clone)]
pub struct DemucsSeparator {
    binary: String,
    model: String,
    device: Option<String>,
}

impl DemucsSeparator {
    pub fn new(config: &DemucsConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            model: config.model.clone(),
            device: config.device.clone(),
        }
    }

    /// Пути, по которым Demucs кладёт результат: `<out>/<model>/<stem>/{vocals,no_vocals}.wav`
    pub fn expected_outputs(&self, audio: &Path, workdir: &Path) -> (PathBuf, PathBuf) {
        let stem = audio
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let dir = workdir.join(&self.model).join(stem);
        (dir.join("vocals.wav"), dir.join("no_vocals.wav"))
    }

    fn command_args(&self, audio: &Path, workdir: &Path) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = vec![
            "--two-stems=vocals".into(),
            "-n".into(),
            self.model.clone().into(),
        ];
        if let Some(device) = &self.device {
            args.push("-d".into());
            args.push(device.into());
        }
        args.push("--out".into());
        args.push(workdir.as_os_str().to_owned());
        args.push(audio.as_os_str().to_owned());
        args
    }
}

#[async_trait::async_trait]
impl SeparationEngine for DemucsSeparator {
    fn name(&self) -> &str {
        "demucs"
    }

    fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }

    async fn separate(&self, audio: &MediaAsset, workdir: &Path) -> Result<Stems> {
        info!("Separating audio using Demucs model {}", self.model);

        let args = self.command_args(audio.path(), workdir);
        let mut child = TokioCommand::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DubError::Separation(format!("failed to start demucs: {}", e)))?;

        let tail = match child.stderr.take() {
            Some(stderr) => read_stderr_tail(BufReader::new(stderr)).await,
            None => VecDeque::new(),
        };

        let status = child.wait().await?;
        if !status.success() {
            return Err(DubError::Separation(format!(
                "demucs exited with {}: {}",
                status,
                Vec::from(tail).join(" | ")
            )));
        }

        let (vocals, background) = self.expected_outputs(audio.path(), workdir);
        if !vocals.exists() || !background.exists() {
            return Err(DubError::Separation(format!(
                "demucs output not found in {}",
                vocals.parent().unwrap_or(workdir).display()
            )));
        }

        Ok(Stems {
            vocals: probe_wav(&vocals)?,
            background: probe_wav(&background)?,
        })
    }
}

/// Доля выполнения из строк вида `Processed ... 45.5%`
/// Дочитывает stderr до конца, чтобы процесс не встал на полном канале.
/// Строки с прогрессом уходят в лог, из остальных сохраняются последние.
async fn read_stderr_tail<R: AsyncBufRead + Unpin>(mut reader: R) -> VecDeque<String> {
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES + 1);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to read demucs stderr: {}", e);
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf).trim_end().to_string();
        if let Some(progress) = parse_progress(&line) {
            debug!("Demucs progress: {:.0}%", progress * 100.0);
        } else if !line.trim().is_empty() {
            tail.push_back(line);
            if tail.len() > STDERR_TAIL_LINES {
                tail.pop_front();
            }
        }
    }
    tail
}

fn parse_progress(line: &str) -> Option<f32> {
    if line.contains("Processed") && line.contains('%') {
        if let Some(percent) = line
            .split('%')
            .next()
            .and_then(|s| s.split_whitespace().last())
            .and_then(|s| s.parse::<f32>().ok())
        {
            return Some(percent / 100.0);
        }
    }
    None
}

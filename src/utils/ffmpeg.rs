//! Модуль для работы с FFmpeg
//!
//! Запуск ffmpeg/ffprobe как дочерних процессов. Процессы убиваются,
//! если future запуска отброшен (например, по таймауту вызывающей стороны).

use std::ffi::OsStr;
use std::process::{Command, Stdio};

use log::debug;
use tokio::process::Command as TokioCommand;

use crate::error::{DubError, Result};

/// Сколько последних строк stderr включать в сообщение об ошибке
const STDERR_TAIL_LINES: usize = 5;

/// Проверка наличия инструмента (`<binary> -version`)
pub fn check_tool_installed(binary: &str) -> bool {
    match Command::new(binary)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) => status.success(),
        Err(_) => false,
    }
}

/// Запуск команды FFmpeg
pub async fn run_ffmpeg_command<S: AsRef<OsStr>>(binary: &str, args: &[S]) -> Result<()> {
    debug!("{} {}", binary, render_args(args));

    let output = TokioCommand::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| DubError::Media(format!("Failed to start {}: {}", binary, e)))?;

    if !output.status.success() {
        return Err(DubError::Media(format!(
            "FFmpeg command failed with status {}: {}",
            output.status,
            stderr_tail(&output.stderr)
        )));
    }

    Ok(())
}

/// Запуск команды FFprobe, возвращает stdout
pub async fn run_ffprobe_command<S: AsRef<OsStr>>(binary: &str, args: &[S]) -> Result<String> {
    debug!("{} {}", binary, render_args(args));

    let output = TokioCommand::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| DubError::Media(format!("Failed to start {}: {}", binary, e)))?;

    if !output.status.success() {
        return Err(DubError::Media(format!(
            "FFprobe command failed with status {}: {}",
            output.status,
            stderr_tail(&output.stderr)
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Последние строки stderr для сообщения об ошибке
pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}

fn render_args<S: AsRef<OsStr>>(args: &[S]) -> String {
    args.iter()
        .map(|a| a.as_ref().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr = b"line1\nline2\n\nline3\nline4\nline5\nline6\n";
        assert_eq!(stderr_tail(stderr), "line2 | line3 | line4 | line5 | line6");
        assert_eq!(stderr_tail(b""), "");
    }

    #[test]
    fn test_missing_tool_is_not_installed() {
        assert!(!check_tool_installed("definitely-not-a-real-ffmpeg-binary"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_media_error() {
        let result = run_ffmpeg_command("definitely-not-a-real-ffmpeg-binary", &["-version"]).await;
        assert!(matches!(result, Err(DubError::Media(_))));
    }
}

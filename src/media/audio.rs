//! # Audio buffers and formats
//!
//! Чтение и запись аудио для всех этапов конвейера:
//!
//! - WAV (8/16/24/32 бит, int и float) через `hound`
//! - MP3 и AAC через `symphonia`
//! - ресемплинг через `rubato` (sinc-интерполяция)
//! - базовые операции над семплами: RMS, пик, нормализация, кроссфейд
//!
//! Внутри конвейера аудио передаётся как [`AudioBuffer`] с чередующимися
//! (interleaved) семплами `f32` в диапазоне [-1.0, 1.0].

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, warn};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{DubError, Result};
use crate::types::MediaAsset;

/// Размер блока ресемплера
const RESAMPLE_CHUNK: usize = 1024;

/// PCM аудио в памяти
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Семплы, каналы чередуются
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// Моно буфер
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(samples, sample_rate, 1)
    }

    /// Количество кадров (семплов на канал)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Максимальная абсолютная амплитуда
    pub fn peak(&self) -> f32 {
        peak(&self.samples)
    }

    /// Сведение каналов в моно усреднением
    pub fn to_mono(&self) -> AudioBuffer {
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return self.clone();
        }
        let samples = self
            .samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();
        AudioBuffer::mono(samples, self.sample_rate)
    }

    /// Сведение в моно и ресемплинг к заданной частоте
    pub fn to_mono_at(&self, sample_rate: u32) -> Result<AudioBuffer> {
        let mono = self.to_mono();
        let samples = resample(&mono.samples, mono.sample_rate, sample_rate)?;
        Ok(AudioBuffer::mono(samples, sample_rate))
    }
}

/// Длительность WAV файла по заголовку, в секундах
pub fn wav_duration<P: AsRef<Path>>(path: P) -> Result<f64> {
    let reader = WavReader::open(path.as_ref())?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Ok(0.0);
    }
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

/// Описание WAV файла по его заголовку
pub fn probe_wav<P: AsRef<Path>>(path: P) -> Result<MediaAsset> {
    let path = path.as_ref();
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let duration = if spec.sample_rate == 0 {
        0.0
    } else {
        reader.duration() as f64 / spec.sample_rate as f64
    };
    Ok(MediaAsset::audio(path, spec.sample_rate, spec.channels, duration))
}

/// Декодирует аудиофайл: WAV через hound, остальные форматы через symphonia
pub fn read_audio_file<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    if extension == "wav" {
        return read_wav(path);
    }

    let mut buffer = Vec::new();
    File::open(path)?.read_to_end(&mut buffer)?;
    decode_with_symphonia(buffer, Some(&extension))
}

/// Читает WAV-файл, сохраняя раскладку каналов
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let reader = WavReader::open(path.as_ref())?;
    decode_wav_reader(reader)
}

/// Декодирует аудио из памяти (например, ответ сервера синтеза)
pub fn decode_audio_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<AudioBuffer> {
    if bytes.starts_with(b"RIFF") {
        let reader = WavReader::new(Cursor::new(bytes))?;
        return decode_wav_reader(reader);
    }
    decode_with_symphonia(bytes, extension)
}

fn decode_wav_reader<R: Read>(mut reader: WavReader<R>) -> Result<AudioBuffer> {
    let spec = reader.spec();

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect::<std::result::Result<_, _>>()?,
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        _ => {
            return Err(DubError::AudioProcessing(format!(
                "Unsupported WAV format: {:?}, {} bits",
                spec.sample_format, spec.bits_per_sample
            )));
        }
    };

    Ok(AudioBuffer::new(samples, spec.sample_rate, spec.channels))
}

fn decode_with_symphonia(bytes: Vec<u8>, extension: Option<&str>) -> Result<AudioBuffer> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension.filter(|e| !e.is_empty()) {
        hint.with_extension(ext);
    }

    let format_opts = FormatOptions {
        enable_gapless: false,
        ..Default::default()
    };

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &MetadataOptions::default())
        .map_err(|e| DubError::AudioProcessing(format!("Unrecognized audio format: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DubError::AudioProcessing("No audio track found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DubError::AudioProcessing(format!("Cannot create decoder: {}", e)))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(1);

    let mut samples = Vec::new();

    // Конец потока symphonia сообщает ошибкой next_packet
    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(sample_buf.samples());
            }
            Err(e) => {
                warn!("Skipping undecodable audio packet: {}", e);
                continue;
            }
        }
    }

    debug!(
        "Decoded {} samples ({} ch) at {} Hz",
        samples.len(),
        channels,
        sample_rate
    );
    Ok(AudioBuffer::new(samples, sample_rate, channels))
}

/// Записывает буфер в WAV (32-бит float)
pub fn write_wav<P: AsRef<Path>>(buffer: &AudioBuffer, path: P) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.channels.max(1),
        sample_rate: buffer.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)?;
    for &sample in &buffer.samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    debug!(
        "Wrote WAV {} ({} frames, {} Hz)",
        path.as_ref().display(),
        buffer.frames(),
        buffer.sample_rate
    );
    Ok(())
}

/// Ресемплинг моно сигнала между частотами
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(DubError::AudioProcessing(format!(
            "Invalid resample rates: {} -> {}",
            from_rate, to_rate
        )));
    }
    resample_ratio(samples, to_rate as f64 / from_rate as f64)
}

/// Ресемплинг моно сигнала с коэффициентом `ratio` (выход = вход * ratio).
///
/// Длина результата `round(len * ratio)`; задержка фильтра компенсируется.
pub fn resample_ratio(samples: &[f32], ratio: f64) -> Result<Vec<f32>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err(DubError::AudioProcessing(format!(
            "Invalid resample ratio: {}",
            ratio
        )));
    }
    if (ratio - 1.0).abs() < 1e-9 {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| DubError::AudioProcessing(format!("Resampler init failed: {}", e)))?;

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let wanted = delay + expected;
    let mut output: Vec<f32> = Vec::with_capacity(wanted + RESAMPLE_CHUNK);

    let mut pos = 0;
    while pos + RESAMPLE_CHUNK <= samples.len() {
        let out = resampler
            .process(&[&samples[pos..pos + RESAMPLE_CHUNK]], None)
            .map_err(|e| DubError::AudioProcessing(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&out[0]);
        pos += RESAMPLE_CHUNK;
    }

    if pos < samples.len() {
        let out = resampler
            .process_partial(Some(&[&samples[pos..]]), None)
            .map_err(|e| DubError::AudioProcessing(format!("Resampling failed: {}", e)))?;
        output.extend_from_slice(&out[0]);
    }

    // Досливаем хвост фильтра
    while output.len() < wanted {
        let out = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| DubError::AudioProcessing(format!("Resampling failed: {}", e)))?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    let end = wanted.min(output.len());
    let start = delay.min(end);
    let mut result = output[start..end].to_vec();
    result.resize(expected, 0.0);
    Ok(result)
}

/// Среднеквадратичное значение
pub fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Максимальная абсолютная амплитуда
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
}

/// Масштабирует семплы так, чтобы пик стал равен `target_peak`.
///
/// Тишина (пик 0) остаётся без изменений. Возвращает применённый коэффициент.
pub fn normalize_peak(samples: &mut [f32], target_peak: f32) -> f32 {
    let max_amplitude = peak(samples);
    if max_amplitude <= 0.0 {
        return 1.0;
    }

    let factor = target_peak / max_amplitude;
    for sample in samples.iter_mut() {
        *sample *= factor;
    }
    factor
}

/// Склеивает два моно фрагмента с линейным кроссфейдом длиной `crossfade_samples`
pub fn crossfade(first: &[f32], second: &[f32], crossfade_samples: usize) -> Vec<f32> {
    if first.is_empty() {
        return second.to_vec();
    }
    if second.is_empty() {
        return first.to_vec();
    }

    // Окно кроссфейда не длиннее самих фрагментов
    let overlap = crossfade_samples.min(first.len()).min(second.len());
    let mut result = Vec::with_capacity(first.len() + second.len() - overlap);
    result.extend_from_slice(&first[..first.len() - overlap]);

    for i in 0..overlap {
        let t = i as f32 / overlap as f32;
        let a = first[first.len() - overlap + i];
        result.push(a * (1.0 - t) + second[i] * t);
    }

    result.extend_from_slice(&second[overlap..]);
    result
}

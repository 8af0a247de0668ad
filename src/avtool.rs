//! A/V Toolchain Adapter (design doc §4.3). Wraps the external `ffmpeg` /
//! `ffprobe` binaries to probe duration, extract audio, and split audio into
//! size- and duration-bounded segments. Every path that reaches a
//! `Command` is a `&Path`, never a bare string, to avoid shell-quoting bugs
//! with spaces and non-ASCII filenames (design doc §9).

use crate::error::{PipelineError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// Options for `extract_audio` (§4.3).
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub codec: String,
    pub bitrate: String,
    pub sample_rate: u32,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            codec: "libmp3lame".to_string(),
            bitrate: "192k".to_string(),
            sample_rate: 44_100,
        }
    }
}

/// Options for `split_audio` (§4.3).
#[derive(Debug, Clone)]
pub struct SplitOptions {
    pub max_size_bytes: u64,
    pub max_segment_seconds: u64,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            max_size_bytes: 25 * 1024 * 1024,
            max_segment_seconds: 600,
        }
    }
}

/// One produced segment: its path and its absolute start offset within the
/// source file.
#[derive(Debug, Clone)]
pub struct Segment {
    pub path: PathBuf,
    pub start_seconds: f64,
}

fn check_tool(name: &str) -> Result<()> {
    let output = Command::new(name).arg("-version").output().map_err(|e| {
        PipelineError::Toolchain(format!("{name} not found in PATH: {e}"))
    })?;
    if !output.status.success() {
        return Err(PipelineError::Toolchain(format!("{name} -version failed")));
    }
    Ok(())
}

pub fn check_ffmpeg() -> Result<()> {
    check_tool("ffmpeg")
}

pub fn check_ffprobe() -> Result<()> {
    check_tool("ffprobe")
}

/// Probe the duration (seconds) of a media file via `ffprobe`.
pub fn probe_duration(path: &Path) -> Result<f64> {
    if !path.exists() {
        return Err(PipelineError::Toolchain(format!(
            "probe target does not exist: {}",
            path.display()
        )));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .map_err(|e| PipelineError::Toolchain(format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::Toolchain(format!("ffprobe failed: {stderr}")));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    text.trim()
        .parse::<f64>()
        .map_err(|e| PipelineError::Toolchain(format!("could not parse duration '{text}': {e}")))
}

/// Extract audio from `source_path` into `dest_path`, re-encoding per
/// `options`. Overwrites the destination.
pub fn extract_audio(source_path: &Path, dest_path: &Path, options: &ExtractOptions) -> Result<()> {
    check_ffmpeg()?;

    if let Some(parent) = dest_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    info!(
        "extracting audio: {} -> {}",
        source_path.display(),
        dest_path.display()
    );

    let output = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(source_path)
        .args(["-vn", "-acodec", &options.codec, "-ab", &options.bitrate])
        .args(["-ar", &options.sample_rate.to_string()])
        .arg(dest_path)
        .output()
        .map_err(|e| PipelineError::Toolchain(format!("failed to run ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PipelineError::Toolchain(format!(
            "audio extraction failed: {stderr}"
        )));
    }

    if !dest_path.exists() {
        return Err(PipelineError::Toolchain(
            "ffmpeg reported success but destination was not created".to_string(),
        ));
    }

    Ok(())
}

/// Split `source_path` into segments bounded by `options.max_size_bytes` and
/// `options.max_segment_seconds` (§4.3 algorithm: compute segment count from
/// size first, then re-derive it if the resulting per-segment duration would
/// exceed the seconds bound).
pub fn split_audio(
    source_path: &Path,
    dest_dir: &Path,
    options: &SplitOptions,
) -> Result<Vec<Segment>> {
    check_ffmpeg()?;
    std::fs::create_dir_all(dest_dir)?;

    let duration = probe_duration(source_path)?;
    let file_size = std::fs::metadata(source_path)?.len();

    let mut segment_count = ((file_size as f64) / (options.max_size_bytes as f64)).ceil() as u64;
    segment_count = segment_count.max(1);

    let mut per_segment_seconds = duration / segment_count as f64;
    if per_segment_seconds > options.max_segment_seconds as f64 {
        segment_count = (duration / options.max_segment_seconds as f64).ceil() as u64;
        segment_count = segment_count.max(1);
        per_segment_seconds = duration / segment_count as f64;
    }

    debug!(
        "splitting {} into {} segments of ~{:.1}s each",
        source_path.display(),
        segment_count,
        per_segment_seconds
    );

    let mut segments = Vec::with_capacity(segment_count as usize);
    for index in 0..segment_count {
        let start = index as f64 * per_segment_seconds;
        let segment_path = dest_dir.join(format!("segment_{index:04}.mp3"));

        let output = Command::new("ffmpeg")
            .arg("-y")
            .args(["-ss", &format!("{start:.3}")])
            .arg("-i")
            .arg(source_path)
            .args(["-t", &format!("{per_segment_seconds:.3}")])
            .args(["-vn", "-acodec", "libmp3lame", "-ab", "192k", "-ar", "44100"])
            .arg(&segment_path)
            .output()
            .map_err(|e| PipelineError::Toolchain(format!("failed to run ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Toolchain(format!(
                "segment {index} extraction failed: {stderr}"
            )));
        }

        segments.push(Segment {
            path: segment_path,
            start_seconds: start,
        });
    }

    if segments.is_empty() {
        return Err(PipelineError::Toolchain(
            "split produced no segments".to_string(),
        ));
    }

    Ok(segments)
}

/// Loudness-normalize and downmix to mono 44.1kHz high-quality MP3 — used by
/// the orchestrator's problem-file handling (§4.8 `invalid_audio` /
/// `empty_output` preprocessing path).
pub fn normalize_audio(source_path: &Path, dest_path: &Path) -> Result<()> {
    check_ffmpeg()?;

    let output = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(source_path)
        .args(["-af", "loudnorm"])
        .args(["-ac", "1", "-ar", "44100", "-acodec", "libmp3lame", "-ab", "192k"])
        .arg(dest_path)
        .output()
        .map_err(|e| PipelineError::Toolchain(format!("failed to run ffmpeg: {e}")))?;

    if !output.status.success() {
        warn!(
            "loudness normalization failed for {}: {}",
            source_path.display(),
            String::from_utf8_lossy(&output.stderr)
        );
        return Err(PipelineError::Toolchain(
            "loudness normalization failed".to_string(),
        ));
    }
    Ok(())
}

/// Error-tolerant decode-and-reencode — used for the `invalid_audio`
/// problem-file class (§4.8). Falls back to raw PCM extraction then
/// re-encode if the first pass also fails.
pub fn repair_audio(source_path: &Path, dest_path: &Path) -> Result<()> {
    check_ffmpeg()?;

    let first = Command::new("ffmpeg")
        .args(["-y", "-err_detect", "ignore_err"])
        .arg("-i")
        .arg(source_path)
        .args(["-ac", "1", "-ar", "44100", "-acodec", "libmp3lame", "-ab", "192k"])
        .arg(dest_path)
        .output()
        .map_err(|e| PipelineError::Toolchain(format!("failed to run ffmpeg: {e}")))?;

    if first.status.success() && dest_path.exists() {
        return Ok(());
    }

    warn!(
        "tolerant decode failed for {}, falling back to raw PCM re-encode",
        source_path.display()
    );

    let tmp_pcm = dest_path.with_extension("pcm.wav");
    let pcm = Command::new("ffmpeg")
        .args(["-y", "-f", "s16le", "-ar", "44100", "-ac", "1"])
        .arg("-i")
        .arg(source_path)
        .arg(&tmp_pcm)
        .output()
        .map_err(|e| PipelineError::Toolchain(format!("failed to run ffmpeg: {e}")))?;

    if !pcm.status.success() {
        return Err(PipelineError::Toolchain(format!(
            "raw PCM recovery failed: {}",
            String::from_utf8_lossy(&pcm.stderr)
        )));
    }

    let reencode = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(&tmp_pcm)
        .args(["-acodec", "libmp3lame", "-ab", "192k"])
        .arg(dest_path)
        .output()
        .map_err(|e| PipelineError::Toolchain(format!("failed to run ffmpeg: {e}")))?;

    let _ = std::fs::remove_file(&tmp_pcm);

    if !reencode.status.success() {
        return Err(PipelineError::Toolchain(
            "re-encode after raw PCM recovery failed".to_string(),
        ));
    }

    Ok(())
}

//! File discovery (design doc §3 Lifecycle: "A MediaFile is created by
//! discovery (directory scan) or single-file add"). Grounded in the
//! original `core_modules/file_manager.py::discover_files`: walk a
//! directory, skip paths already recorded, classify by extension, sanitize
//! the filename, and register each new file with the tracking store.
//!
//! CLI surface (§6) doesn't name a `discover` command explicitly, but the
//! lifecycle it describes requires one to get files into the store at all
//! (SPEC_FULL §C: silence is an invitation, not a prohibition).

use crate::config::{ChecksumAlgorithm, Config};
use crate::error::Result;
use crate::layout::sanitize_filename;
use crate::store::models::MediaType;
use crate::store::Store;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Content hash for `MediaFile.checksum` (§3), streamed in fixed-size
/// chunks so large recordings don't need to be read into memory at once.
/// `ChecksumAlgorithm` only has one variant today (sha256) but the match
/// keeps the config-driven seam spec.md §3 calls for.
fn compute_checksum(path: &Path, algorithm: ChecksumAlgorithm) -> std::io::Result<String> {
    match algorithm {
        ChecksumAlgorithm::Sha256 => {
            let mut file = std::fs::File::open(path)?;
            let mut hasher = Sha256::new();
            let mut buf = [0u8; 64 * 1024];
            loop {
                let read = file.read(&mut buf)?;
                if read == 0 {
                    break;
                }
                hasher.update(&buf[..read]);
            }
            Ok(format!("{:x}", hasher.finalize()))
        }
    }
}

/// Classify `ext` (no leading dot, already lower-cased) against the
/// configured extension lists.
fn classify_extension(ext: &str, config: &Config) -> Option<MediaType> {
    if config.media_extensions.audio.iter().any(|e| e == ext) {
        Some(MediaType::Audio)
    } else if config.media_extensions.video.iter().any(|e| e == ext) {
        Some(MediaType::Video)
    } else {
        None
    }
}

/// Scan `directory` recursively, registering every audio/video file not
/// already recorded by `original_path`. Returns the file ids of newly
/// discovered files, in walk order. A file that fails to probe its
/// duration is still registered — `duration` is nullable until probed
/// (§3 MediaFile.duration_seconds).
pub async fn discover_files(
    store: &Store,
    config: &Config,
    directory: &Path,
    limit: Option<usize>,
) -> Result<Vec<Uuid>> {
    if !directory.is_dir() {
        return Err(crate::error::PipelineError::Configuration(format!(
            "not a directory: {}",
            directory.display()
        )));
    }

    let mut discovered = Vec::new();
    let mut skipped = 0usize;

    for entry in WalkDir::new(directory).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_lowercase(),
            None => continue,
        };
        let Some(media_type) = classify_extension(&ext, config) else {
            continue;
        };

        let path_str = path.to_string_lossy().to_string();
        if store.get_by_path(&path_str).await?.is_some() {
            skipped += 1;
            continue;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());
        let safe_filename = sanitize_filename(&file_name);
        let file_size = std::fs::metadata(path).map(|m| m.len() as i64).ok();
        let duration = crate::avtool::probe_duration(path).ok();
        let checksum = compute_checksum(path, config.checksum_algorithm).ok();

        match store
            .add_media(
                &path_str,
                &safe_filename,
                media_type,
                file_size,
                duration,
                checksum.as_deref(),
                None,
            )
            .await
        {
            Ok(id) => discovered.push(id),
            Err(e) => warn!("could not register discovered file {path_str}: {e}"),
        }

        if let Some(limit) = limit {
            if discovered.len() >= limit {
                info!("discover: reached limit of {limit} file(s)");
                break;
            }
        }
    }

    info!(
        "discover: found {} new file(s), skipped {skipped} already-known file(s)",
        discovered.len()
    );

    Ok(discovered)
}

/// Register a single file (§3 Lifecycle "or single-file add"), independent
/// of any directory scan.
pub async fn add_single_file(store: &Store, config: &Config, path: &Path) -> Result<Uuid> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    let media_type = classify_extension(&ext, config)
        .ok_or_else(|| crate::error::PipelineError::Configuration(format!("unsupported media extension: {ext}")))?;

    let path_str = path.to_string_lossy().to_string();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let safe_filename = sanitize_filename(&file_name);
    let file_size = std::fs::metadata(path).map(|m| m.len() as i64).ok();
    let duration = crate::avtool::probe_duration(path).ok();
    let checksum = compute_checksum(path, config.checksum_algorithm).ok();

    store
        .add_media(
            &path_str,
            &safe_filename,
            media_type,
            file_size,
            duration,
            checksum.as_deref(),
            None,
        )
        .await
}

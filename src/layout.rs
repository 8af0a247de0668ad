//! Artifact Layout (design doc §4.2). Pure path-resolver functions over a
//! per-item directory scheme, plus an idempotent "materialize source"
//! operation. The legacy flat-per-type scheme from the original system is
//! intentionally not read or written (Open Question #1).

use crate::error::{PipelineError, Result};
use std::path::{Path, PathBuf};

/// A `safe_filename` split into its stem and lower-cased extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeName {
    pub stem: String,
    pub ext: String,
}

impl SafeName {
    pub fn parse(safe_filename: &str) -> Self {
        match safe_filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => SafeName {
                stem: stem.to_string(),
                ext: ext.to_lowercase(),
            },
            _ => SafeName {
                stem: safe_filename.to_string(),
                ext: String::new(),
            },
        }
    }

    pub fn filename(&self) -> String {
        if self.ext.is_empty() {
            self.stem.clone()
        } else {
            format!("{}.{}", self.stem, self.ext)
        }
    }
}

/// Resolves canonical on-disk paths for one file's artifacts (§6 On-disk
/// output). All paths live under `<output_root>/<stem>/`.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    output_root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// `<output_root>/<stem>/`
    pub fn item_dir(&self, safe_filename: &str) -> PathBuf {
        let name = SafeName::parse(safe_filename);
        self.output_root.join(&name.stem)
    }

    /// `<stem>.<ext>` — the source media linked/copied into the item dir.
    pub fn source_path(&self, safe_filename: &str) -> PathBuf {
        let name = SafeName::parse(safe_filename);
        self.item_dir(safe_filename).join(name.filename())
    }

    /// `<stem>.<audio_ext>` — extracted audio for video sources.
    pub fn extracted_audio_path(&self, safe_filename: &str, audio_ext: &str) -> PathBuf {
        let name = SafeName::parse(safe_filename);
        self.item_dir(safe_filename)
            .join(format!("{}.{audio_ext}", name.stem))
    }

    /// `<stem>.txt`
    pub fn transcript_path(&self, safe_filename: &str) -> PathBuf {
        let name = SafeName::parse(safe_filename);
        self.item_dir(safe_filename).join(format!("{}.txt", name.stem))
    }

    /// `<stem>.txt.segments.json`
    pub fn segments_json_path(&self, safe_filename: &str) -> PathBuf {
        let name = SafeName::parse(safe_filename);
        self.item_dir(safe_filename)
            .join(format!("{}.txt.segments.json", name.stem))
    }

    /// `<stem>.orig.srt`
    pub fn orig_srt_path(&self, safe_filename: &str) -> PathBuf {
        let name = SafeName::parse(safe_filename);
        self.item_dir(safe_filename)
            .join(format!("{}.orig.srt", name.stem))
    }

    /// `<stem>.<lang>.txt`
    pub fn translation_path(&self, safe_filename: &str, lang: &str) -> PathBuf {
        let name = SafeName::parse(safe_filename);
        self.item_dir(safe_filename)
            .join(format!("{}.{lang}.txt", name.stem))
    }

    /// `<stem>.<lang>.srt`
    pub fn subtitle_path(&self, safe_filename: &str, lang: &str) -> PathBuf {
        let name = SafeName::parse(safe_filename);
        self.item_dir(safe_filename)
            .join(format!("{}.{lang}.srt", name.stem))
    }

    /// Idempotently ensure the item directory exists and the original media
    /// is available as `<stem>.<ext>` inside it: symlink preferred, falling
    /// back to a copy when symlinking fails (e.g. cross-device, or on
    /// filesystems without symlink support).
    pub fn materialize_source(&self, original_path: &Path, safe_filename: &str) -> Result<PathBuf> {
        let dir = self.item_dir(safe_filename);
        std::fs::create_dir_all(&dir)?;

        let dest = self.source_path(safe_filename);
        if dest.exists() {
            return Ok(dest);
        }

        let original_abs = if original_path.is_absolute() {
            original_path.to_path_buf()
        } else {
            std::fs::canonicalize(original_path)?
        };

        #[cfg(unix)]
        {
            if std::os::unix::fs::symlink(&original_abs, &dest).is_ok() {
                return Ok(dest);
            }
        }

        std::fs::copy(&original_abs, &dest).map_err(PipelineError::Io)?;
        Ok(dest)
    }
}

/// Sanitize a filename into the stable `safe_filename` used for artifact
/// naming (§3 MediaFile.safe_filename): ASCII-folded, lower-cased,
/// non-alphanumerics collapsed to a single `_`, trimmed; empty collapses to
/// `"file"`; extension preserved lower-cased. Timestamp-free (Open Question
/// #2 resolves the source's two conflicting rules in favor of this one).
pub fn sanitize_filename(filename: &str) -> String {
    let (base, ext) = match filename.rsplit_once('.') {
        Some((b, e)) if !b.is_empty() => (b, format!(".{}", e.to_lowercase())),
        _ => (filename, String::new()),
    };

    let folded: String = unicode_fold_ascii(base).to_lowercase();

    let mut collapsed = String::with_capacity(folded.len());
    let mut last_was_underscore = false;
    for c in folded.chars() {
        if c.is_ascii_alphanumeric() {
            collapsed.push(c);
            last_was_underscore = false;
        } else if !last_was_underscore {
            collapsed.push('_');
            last_was_underscore = true;
        }
    }

    let trimmed = collapsed.trim_matches('_');
    let stem = if trimmed.is_empty() { "file" } else { trimmed };

    format!("{stem}{ext}")
}

/// Best-effort ASCII folding: strips combining diacritics after NFKD-style
/// decomposition is unavailable without a Unicode normalization crate, so we
/// fall back to dropping any non-ASCII byte that survives a simple transliteration
/// table for the common Latin-1 supplement accented letters.
fn unicode_fold_ascii(s: &str) -> String {
    s.chars()
        .filter_map(|c| {
            if c.is_ascii() {
                Some(c)
            } else {
                translit(c)
            }
        })
        .collect()
}

fn translit(c: char) -> Option<char> {
    let folded = match c {
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'Ç' | 'ç' => 'c',
        'È' | 'É' | 'Ê' | 'Ë' | 'è' | 'é' | 'ê' | 'ë' => 'e',
        'Ì' | 'Í' | 'Î' | 'Ï' | 'ì' | 'í' | 'î' | 'ï' => 'i',
        'Ñ' | 'ñ' => 'n',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'Ø' | 'ø' => 'o',
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'ù' | 'ú' | 'û' | 'ü' => 'u',
        'Ý' | 'ý' | 'ÿ' => 'y',
        'ß' => 's',
        _ => return None,
    };
    Some(folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_name_parse() {
        let n = SafeName::parse("interview_one.mp4");
        assert_eq!(n.stem, "interview_one");
        assert_eq!(n.ext, "mp4");
    }

    #[test]
    fn test_safe_name_no_extension() {
        let n = SafeName::parse("file");
        assert_eq!(n.stem, "file");
        assert_eq!(n.ext, "");
    }

    #[test]
    fn test_paths_all_live_under_item_dir() {
        let layout = ArtifactLayout::new("/out");
        let safe = "interview.mp4";
        assert_eq!(layout.item_dir(safe), PathBuf::from("/out/interview"));
        assert_eq!(
            layout.transcript_path(safe),
            PathBuf::from("/out/interview/interview.txt")
        );
        assert_eq!(
            layout.segments_json_path(safe),
            PathBuf::from("/out/interview/interview.txt.segments.json")
        );
        assert_eq!(
            layout.orig_srt_path(safe),
            PathBuf::from("/out/interview/interview.orig.srt")
        );
        assert_eq!(
            layout.translation_path(safe, "he"),
            PathBuf::from("/out/interview/interview.he.txt")
        );
        assert_eq!(
            layout.subtitle_path(safe, "he"),
            PathBuf::from("/out/interview/interview.he.srt")
        );
    }

    #[test]
    fn test_sanitize_filename_boundary_cases() {
        assert_eq!(sanitize_filename("!!!.mp4"), "file.mp4");
        assert_eq!(sanitize_filename("Über File(1).mp3"), "uber_file_1.mp3");
        assert_eq!(sanitize_filename("Video.MKV"), "video.mkv");
    }

    #[test]
    fn test_sanitize_filename_idempotent() {
        for name in ["!!!.mp4", "Über File(1).mp3", "Video.MKV", "a__b--c.txt"] {
            let once = sanitize_filename(name);
            let twice = sanitize_filename(&once);
            assert_eq!(once, twice);
        }
    }

    proptest::proptest! {
        #[test]
        fn prop_sanitize_filename_idempotent(s in "[\\PC]{0,40}") {
            let once = sanitize_filename(&s);
            let twice = sanitize_filename(&once);
            proptest::prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_sanitize_filename_charset(s in "[\\PC]{0,40}") {
            let sanitized = sanitize_filename(&s);
            for c in sanitized.chars() {
                proptest::prop_assert!(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.');
            }
        }
    }

    #[test]
    fn test_materialize_source_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let original = tmp.path().join("source.mp3");
        std::fs::write(&original, b"fake audio bytes").unwrap();

        let output_root = tmp.path().join("out");
        let layout = ArtifactLayout::new(&output_root);

        let first = layout.materialize_source(&original, "source.mp3").unwrap();
        assert!(first.exists());
        let second = layout.materialize_source(&original, "source.mp3").unwrap();
        assert_eq!(first, second);
    }
}

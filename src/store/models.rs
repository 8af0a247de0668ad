use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Audio => "audio",
            MediaType::Video => "video",
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "audio" => Ok(MediaType::Audio),
            "video" => Ok(MediaType::Video),
            other => Err(format!("unknown media_type: {other}")),
        }
    }
}

/// Every stage's status set (design doc §3 ProcessingStatus and §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    NotStarted,
    InProgress,
    Completed,
    Failed,
    QaFailed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::NotStarted => "not_started",
            StageStatus::InProgress => "in_progress",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
            StageStatus::QaFailed => "qa_failed",
        }
    }
}

impl std::str::FromStr for StageStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(StageStatus::NotStarted),
            "in_progress" => Ok(StageStatus::InProgress),
            "completed" => Ok(StageStatus::Completed),
            "failed" => Ok(StageStatus::Failed),
            "qa_failed" => Ok(StageStatus::QaFailed),
            other => Err(format!("unknown stage status: {other}")),
        }
    }
}

/// Overall per-file status (design doc §3 ProcessingStatus.overall_status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Pending => "pending",
            OverallStatus::InProgress => "in_progress",
            OverallStatus::Completed => "completed",
            OverallStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for OverallStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OverallStatus::Pending),
            "in_progress" => Ok(OverallStatus::InProgress),
            "completed" => Ok(OverallStatus::Completed),
            "failed" => Ok(OverallStatus::Failed),
            other => Err(format!("unknown overall status: {other}")),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MediaFile {
    pub file_id: String,
    pub original_path: String,
    pub safe_filename: String,
    pub file_size: Option<i64>,
    pub duration: Option<f64>,
    pub checksum: Option<String>,
    pub media_type: String,
    pub detected_language: Option<String>,
    pub created_at: String,
}

impl MediaFile {
    pub fn id(&self) -> Uuid {
        Uuid::parse_str(&self.file_id).unwrap_or_default()
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type.parse().unwrap_or(MediaType::Audio)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessingStatus {
    pub file_id: String,
    pub overall_status: String,
    pub transcription_status: String,
    pub translation_en_status: String,
    pub translation_he_status: String,
    pub translation_de_status: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub last_updated: String,
    pub attempts: i64,
}

impl ProcessingStatus {
    /// Look up the translation status column for an arbitrary target
    /// language. The schema ships three fixed columns grounded in the
    /// original system (`translation_en_status`, `translation_he_status`,
    /// `translation_de_status`); other values return `None`.
    pub fn translation_status(&self, lang: &str) -> Option<StageStatus> {
        let raw = match lang {
            "en" => &self.translation_en_status,
            "he" => &self.translation_he_status,
            "de" => &self.translation_de_status,
            _ => return None,
        };
        raw.parse().ok()
    }

    pub fn transcription(&self) -> StageStatus {
        self.transcription_status.parse().unwrap_or(StageStatus::NotStarted)
    }

    pub fn overall(&self) -> OverallStatus {
        self.overall_status.parse().unwrap_or(OverallStatus::Pending)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ErrorLogEntry {
    pub error_id: i64,
    pub file_id: String,
    pub process_stage: String,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QualityEvaluation {
    pub eval_id: i64,
    pub file_id: String,
    pub language: String,
    pub model: String,
    pub score: f64,
    pub issues: Option<String>,
    pub comment: Option<String>,
    pub evaluated_at: String,
}

impl QualityEvaluation {
    pub fn issues_list(&self) -> Vec<String> {
        self.issues
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }
}

/// Whitelisted update descriptor for `update_media_metadata` (design doc §9:
/// "replace dynamic kwargs with an explicit update-descriptor"). Unknown
/// fields simply cannot be expressed — the whitelist is compile-time.
#[derive(Debug, Clone, Default)]
pub struct MediaMetadataUpdate {
    pub file_size: Option<i64>,
    pub duration: Option<f64>,
    pub checksum: Option<String>,
    pub detected_language: Option<String>,
    pub safe_filename: Option<String>,
}

/// Whitelisted update descriptor for `update_status`.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub overall_status: Option<OverallStatus>,
    pub transcription_status: Option<StageStatus>,
    pub translation_lang: Option<String>,
    pub translation_status: Option<StageStatus>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StatusUpdate {
    pub fn transcription(status: StageStatus) -> Self {
        Self {
            transcription_status: Some(status),
            ..Default::default()
        }
    }

    pub fn translation(lang: impl Into<String>, status: StageStatus) -> Self {
        Self {
            translation_lang: Some(lang.into()),
            translation_status: Some(status),
            ..Default::default()
        }
    }

    pub fn overall(status: OverallStatus) -> Self {
        Self {
            overall_status: Some(status),
            ..Default::default()
        }
    }

    /// Build the right `StatusUpdate` for an opaque stage tag (`"transcription"`
    /// or `"translation_<lang>"`) — used by the generic worker pool (§4.8),
    /// which only knows the stage it's running, not which status column
    /// that maps to.
    pub fn for_stage(stage: &str, status: StageStatus) -> Option<Self> {
        if stage == "transcription" {
            return Some(Self::transcription(status));
        }
        stage.strip_prefix("translation_").map(|lang| Self::translation(lang, status))
    }
}

/// A stage identifier as used in the error log's `process_stage` column and
/// throughout the orchestrator (design doc GLOSSARY: "Stage").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Discovery,
    Extraction,
    Transcription,
    Translation(String),
}

impl Stage {
    pub fn tag(&self) -> String {
        match self {
            Stage::Discovery => "discovery".to_string(),
            Stage::Extraction => "extraction".to_string(),
            Stage::Transcription => "transcription".to_string(),
            Stage::Translation(lang) => format!("translation_{lang}"),
        }
    }
}

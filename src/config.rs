use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Supported translation provider variants (design doc §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProviderKind {
    /// Variant A — DeepL. Does not support the RTL target language.
    Deepl,
    /// Variant B — Google Cloud Translation.
    Google,
    /// Variant C — Microsoft Translator (REST).
    Microsoft,
    /// Variant D — LLM-style provider with a strict JSON response schema.
    Openai,
}

impl std::fmt::Display for TranslationProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TranslationProviderKind::Deepl => "deepl",
            TranslationProviderKind::Google => "google",
            TranslationProviderKind::Microsoft => "microsoft",
            TranslationProviderKind::Openai => "openai",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TranslationProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deepl" => Ok(TranslationProviderKind::Deepl),
            "google" => Ok(TranslationProviderKind::Google),
            "microsoft" => Ok(TranslationProviderKind::Microsoft),
            "openai" => Ok(TranslationProviderKind::Openai),
            _ => Err(format!("unknown translation provider: {s}")),
        }
    }
}

/// Recognized extensions per media type (§6 Configuration object).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaExtensions {
    pub audio: Vec<String>,
    pub video: Vec<String>,
}

impl Default for MediaExtensions {
    fn default() -> Self {
        Self {
            audio: vec![
                "mp3".into(),
                "wav".into(),
                "m4a".into(),
                "flac".into(),
                "ogg".into(),
            ],
            video: vec!["mp4".into(), "mov".into(), "mkv".into(), "avi".into()],
        }
    }
}

/// Full pipeline configuration (§6 Configuration object). Loaded from a TOML
/// file, then overridden by environment variables, mirroring the teacher's
/// `Config::load()` precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_directory: PathBuf,
    pub database_file: PathBuf,

    pub media_extensions: MediaExtensions,

    pub extract_audio_format: String,
    pub extract_audio_quality: String,

    pub max_audio_size_mb: u64,
    pub max_segment_seconds: u64,

    pub api_retries: u32,
    pub segment_pause_seconds: u64,
    pub api_timeout_seconds: u64,

    pub transcription_workers: usize,
    pub translation_workers: usize,
    pub batch_size: usize,

    pub stalled_timeout_minutes: u64,
    pub check_interval_seconds: u64,
    pub restart_interval_seconds: u64,

    pub force_reprocess: bool,
    pub force_language: Option<String>,
    pub auto_detect_language: bool,

    /// Show a per-batch `indicatif` progress bar while a worker pool drains
    /// (teacher's `TranscriptionOrchestrator::with_progress`); disabled
    /// automatically isn't necessary here since `finish_and_clear` leaves no
    /// trace in non-interactive logs either way.
    pub show_progress: bool,

    /// Supported target languages (Open Question #5): default `{en, he, de}`.
    pub target_languages: Vec<String>,
    /// The right-to-left target language among `target_languages`.
    pub rtl_target_language: String,
    /// The default Western target used for paragraph routing (§4.7 step 5).
    pub default_western_target: String,
    /// Fallback source-language hint (§4.6 step 3), default `deu`.
    pub default_language_hint: String,

    /// Default translation provider per target language; falls back to
    /// `default_translation_provider` when a target has no explicit entry.
    pub translation_provider_by_target: HashMap<String, TranslationProviderKind>,
    pub default_translation_provider: TranslationProviderKind,

    /// Open Question #4: RTL-polish model names are configuration, never a
    /// hardcoded contract.
    pub rtl_polish_primary_model: String,
    pub rtl_polish_secondary_model: String,
    pub rtl_polish_glossary_path: Option<PathBuf>,

    pub checksum_algorithm: ChecksumAlgorithm,

    /// ElevenLabs Scribe model id (§4.4 Transcription Provider Adapter).
    pub elevenlabs_model_id: String,
    /// Whether to request diarization from the provider at all; the
    /// per-request `diarize` flag in §4.6 step 4 is ANDed with this.
    pub elevenlabs_speaker_detection: bool,

    /// Per-call HTTP timeout multiplier applied only during `retry` runs
    /// (`--timeout-multiplier`); never persisted back to this struct.
    #[serde(skip)]
    pub retry_timeout_multiplier: f64,

    #[serde(skip)]
    pub deepl_api_key: Option<String>,
    #[serde(skip)]
    pub google_api_key: Option<String>,
    #[serde(skip)]
    pub google_project_location: Option<String>,
    #[serde(skip)]
    pub microsoft_api_key: Option<String>,
    #[serde(skip)]
    pub microsoft_region: Option<String>,
    #[serde(skip)]
    pub openai_api_key: Option<String>,
    #[serde(skip)]
    pub elevenlabs_api_key: Option<String>,
    #[serde(skip)]
    pub google_credentials_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Sha256,
}

impl Default for ChecksumAlgorithm {
    fn default() -> Self {
        ChecksumAlgorithm::Sha256
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("./output"),
            database_file: PathBuf::from("./scribe.db"),
            media_extensions: MediaExtensions::default(),
            extract_audio_format: "mp3".to_string(),
            extract_audio_quality: "192k".to_string(),
            max_audio_size_mb: 25,
            max_segment_seconds: 600,
            api_retries: 8,
            segment_pause_seconds: 1,
            api_timeout_seconds: 300,
            transcription_workers: 5,
            translation_workers: 5,
            batch_size: 10,
            stalled_timeout_minutes: 30,
            check_interval_seconds: 60,
            restart_interval_seconds: 600,
            force_reprocess: false,
            force_language: None,
            auto_detect_language: true,
            show_progress: true,
            target_languages: vec!["en".into(), "he".into(), "de".into()],
            rtl_target_language: "he".into(),
            default_western_target: "en".into(),
            default_language_hint: "deu".into(),
            translation_provider_by_target: HashMap::new(),
            default_translation_provider: TranslationProviderKind::Deepl,
            rtl_polish_primary_model: "gpt-4o".into(),
            rtl_polish_secondary_model: "gpt-4o-mini".into(),
            rtl_polish_glossary_path: None,
            checksum_algorithm: ChecksumAlgorithm::default(),
            elevenlabs_model_id: "scribe_v1".to_string(),
            elevenlabs_speaker_detection: true,
            retry_timeout_multiplier: 1.0,
            deepl_api_key: None,
            google_api_key: None,
            google_project_location: None,
            microsoft_api_key: None,
            microsoft_region: None,
            openai_api_key: None,
            elevenlabs_api_key: None,
            google_credentials_path: None,
        }
    }
}

impl Config {
    /// Load configuration: defaults, then a TOML file if present, then
    /// environment variables (provider API keys are environment-only, never
    /// persisted to the file — they are secrets per §6).
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                match toml::from_str::<Config>(&contents) {
                    Ok(file_config) => config = file_config,
                    Err(e) => {
                        tracing::warn!("ignoring malformed config file {:?}: {e}", config_path);
                    }
                }
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SCRIBE_OUTPUT_DIRECTORY") {
            self.output_directory = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SCRIBE_DATABASE_FILE") {
            self.database_file = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("SCRIBE_MAX_AUDIO_SIZE_MB") {
            if let Ok(n) = v.parse() {
                self.max_audio_size_mb = n;
            }
        }
        if let Ok(v) = std::env::var("SCRIBE_API_RETRIES") {
            if let Ok(n) = v.parse() {
                self.api_retries = n;
            }
        }
        if let Ok(v) = std::env::var("SCRIBE_FORCE_LANGUAGE") {
            self.force_language = Some(v);
        }

        self.deepl_api_key = std::env::var("DEEPL_API_KEY").ok();
        self.google_api_key = std::env::var("GOOGLE_TRANSLATE_API_KEY").ok();
        self.google_project_location = std::env::var("GOOGLE_PROJECT_LOCATION").ok();
        self.microsoft_api_key = std::env::var("MICROSOFT_TRANSLATOR_KEY").ok();
        self.microsoft_region = std::env::var("MICROSOFT_TRANSLATOR_REGION").ok();
        self.openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        self.elevenlabs_api_key = std::env::var("ELEVENLABS_API_KEY").ok();
        self.google_credentials_path = std::env::var("GOOGLE_APPLICATION_CREDENTIALS")
            .ok()
            .map(PathBuf::from);
    }

    pub fn validate(&self) -> Result<()> {
        if self.transcription_workers == 0 || self.translation_workers == 0 {
            return Err(PipelineError::Configuration(
                "worker pool sizes must be greater than 0".to_string(),
            ));
        }
        if self.max_audio_size_mb == 0 {
            return Err(PipelineError::Configuration(
                "max_audio_size_mb must be greater than 0".to_string(),
            ));
        }
        if !self.target_languages.contains(&self.rtl_target_language) {
            return Err(PipelineError::Configuration(format!(
                "rtl_target_language {:?} is not in target_languages",
                self.rtl_target_language
            )));
        }
        if self.elevenlabs_api_key.is_none() {
            tracing::warn!("ELEVENLABS_API_KEY not set; transcription calls will fail");
        }
        Ok(())
    }

    /// Provider configured for one target language, falling back to the
    /// process-wide default (§6: recognized options; provider selection is
    /// not itself a named config key in spec.md, so target overrides are an
    /// additive convenience, not a contract).
    pub fn provider_for_target(&self, target_lang: &str) -> TranslationProviderKind {
        self.translation_provider_by_target
            .get(target_lang)
            .copied()
            .unwrap_or(self.default_translation_provider)
    }

    pub fn max_audio_bytes(&self) -> u64 {
        self.max_audio_size_mb * 1024 * 1024
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("scribe-pipeline").join("config.toml"))
    }
}

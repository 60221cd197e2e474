//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Static description of a launchable capability module.
///
/// The path is resolved against the configured project root at launch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSpec {
    /// Symbolic name, used in notifications and audit entries.
    pub name: String,
    /// Executable path, relative to the project root.
    pub path: PathBuf,
    /// Extra arguments passed to the worker.
    #[serde(default)]
    pub args: Vec<String>,
}

impl WorkerSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            args: Vec::new(),
        }
    }
}

/// How commands are received and feedback is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoMode {
    /// Read commands from stdin, print feedback to stdout.
    #[default]
    Console,
    /// Microphone capture + speech APIs.
    Voice,
}

/// Voice I/O configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// I/O mode (console or voice).
    pub mode: IoMode,
    /// Base URL of the speech API (Whisper-compatible).
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Transcription model.
    pub stt_model: String,
    /// Synthesis model.
    pub tts_model: String,
    /// Synthesis voice.
    pub tts_voice: String,
    /// Seconds of audio captured per listen.
    pub record_secs: u32,
    /// Capture command producing WAV on stdout; `{secs}` is replaced with
    /// the capture duration.
    pub capture_command: String,
    /// Playback command consuming WAV on stdin.
    pub playback_command: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_stt_model() -> String {
    "whisper-1".to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

fn default_tts_voice() -> String {
    "alloy".to_string()
}

fn default_record_secs() -> u32 {
    4
}

fn default_capture_command() -> String {
    "arecord -q -f S16_LE -r 16000 -c 1 -t wav -d {secs} -".to_string()
}

fn default_playback_command() -> String {
    "aplay -q -".to_string()
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            mode: IoMode::default(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            stt_model: default_stt_model(),
            tts_model: default_tts_model(),
            tts_voice: default_tts_voice(),
            record_secs: default_record_secs(),
            capture_command: default_capture_command(),
            playback_command: default_playback_command(),
        }
    }
}

/// Top-level dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Project root against which worker paths are resolved.
    pub root_dir: PathBuf,
    /// The reading/OCR module.
    pub reading: WorkerSpec,
    /// The object-detection module.
    pub detection: WorkerSpec,
    /// Voice I/O settings.
    pub voice: VoiceConfig,
    /// Override for the audit event database location.
    pub event_db: Option<PathBuf>,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_reading_spec() -> WorkerSpec {
    WorkerSpec::new("reading", "reading/read")
}

fn default_detection_spec() -> WorkerSpec {
    WorkerSpec::new("detection", "yolo/detect")
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            reading: default_reading_spec(),
            detection: default_detection_spec(),
            voice: VoiceConfig::default(),
            event_db: None,
        }
    }
}

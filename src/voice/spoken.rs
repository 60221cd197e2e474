//! Microphone-backed command source and spoken feedback.
//!
//! Audio capture and playback are delegated to external commands (arecord
//! and aplay by default), so the crate carries no in-process audio stack.
//! Speech round-trips are timed and recorded to the event log.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::audit::EventLog;
use crate::config::VoiceConfig;
use crate::voice::{CommandSource, Feedback, SpeechToText, TextToSpeech, VoiceError};

fn split_command(template: &str) -> Result<(String, Vec<String>), VoiceError> {
    let mut parts = template.split_whitespace().map(String::from);
    let program = parts.next().ok_or_else(|| {
        VoiceError::Audio(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "empty audio command",
        ))
    })?;
    Ok((program, parts.collect()))
}

fn resolve_api_key(config: &VoiceConfig) -> Result<String, VoiceError> {
    std::env::var(&config.api_key_env)
        .map_err(|_| VoiceError::MissingApiKey(config.api_key_env.clone()))
}

/// Listens on the microphone and transcribes each capture.
pub struct VoiceSource {
    stt: SpeechToText,
    events: EventLog,
    capture_command: String,
}

impl VoiceSource {
    /// Build a source from the voice configuration.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::MissingApiKey` if the configured environment
    /// variable is unset.
    pub fn from_config(config: &VoiceConfig, events: EventLog) -> Result<Self, VoiceError> {
        let api_key = resolve_api_key(config)?;
        Ok(Self {
            stt: SpeechToText::new(
                config.base_url.clone(),
                api_key,
                config.stt_model.clone(),
            ),
            events,
            capture_command: config
                .capture_command
                .replace("{secs}", &config.record_secs.to_string()),
        })
    }

    async fn capture(&self) -> Result<Vec<u8>, VoiceError> {
        let (program, args) = split_command(&self.capture_command)?;
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Err(VoiceError::Audio(std::io::Error::other(format!(
                "capture command exited with {}",
                output.status
            ))));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl CommandSource for VoiceSource {
    async fn listen(&mut self) -> Option<String> {
        let audio = match self.capture().await {
            Ok(audio) => audio,
            Err(err) => {
                tracing::warn!(error = %err, "Audio capture failed");
                return None;
            }
        };

        let start = Instant::now();
        match self.stt.transcribe(&audio).await {
            Ok(text) if text.trim().is_empty() => None,
            Ok(text) => {
                let elapsed = start.elapsed().as_secs_f64();
                if let Err(err) = self
                    .events
                    .record("STT", "-", &format!("Heard: {text}"), Some(elapsed))
                    .await
                {
                    tracing::warn!(error = %err, "Failed to record STT event");
                }
                Some(text)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Transcription failed");
                None
            }
        }
    }
}

/// Speaks feedback messages through the synthesizer.
pub struct VoiceFeedback {
    tts: TextToSpeech,
    events: EventLog,
    playback_command: String,
}

impl VoiceFeedback {
    /// Build feedback from the voice configuration.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::MissingApiKey` if the configured environment
    /// variable is unset.
    pub fn from_config(config: &VoiceConfig, events: EventLog) -> Result<Self, VoiceError> {
        let api_key = resolve_api_key(config)?;
        Ok(Self {
            tts: TextToSpeech::new(
                config.base_url.clone(),
                api_key,
                config.tts_model.clone(),
                config.tts_voice.clone(),
            ),
            events,
            playback_command: config.playback_command.clone(),
        })
    }

    async fn play(&self, audio: &[u8]) -> Result<(), VoiceError> {
        let (program, args) = split_command(&self.playback_command)?;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(audio).await?;
            stdin.shutdown().await?;
        }
        let status = child.wait().await?;
        if !status.success() {
            return Err(VoiceError::Audio(std::io::Error::other(format!(
                "playback command exited with {status}"
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl Feedback for VoiceFeedback {
    async fn notify(&self, message: &str) -> Result<(), VoiceError> {
        let start = Instant::now();
        let audio = self.tts.synthesize(message).await?;
        self.play(&audio).await?;

        let elapsed = start.elapsed().as_secs_f64();
        if let Err(err) = self
            .events
            .record("TTS", "-", &format!("Spoke: {message}"), Some(elapsed))
            .await
        {
            tracing::warn!(error = %err, "Failed to record TTS event");
        }
        Ok(())
    }
}

//! Speech collaborators: command input and user feedback.
//!
//! The dispatch loop only sees the [`CommandSource`] and [`Feedback`]
//! traits. Two implementations ship: a console pair (the default, runs with
//! no credentials) and a spoken pair built on the speech API clients.

mod console;
mod spoken;
mod stt;
mod tts;

pub use console::*;
pub use spoken::*;
pub use stt::*;
pub use tts::*;

use async_trait::async_trait;

/// Error type for speech operations.
#[derive(thiserror::Error, Debug)]
pub enum VoiceError {
    /// The configured API key environment variable is not set.
    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),

    /// Speech-to-text request failed.
    #[error("Speech-to-text failed: {0}")]
    Stt(String),

    /// Text-to-speech request failed.
    #[error("Text-to-speech failed: {0}")]
    Tts(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Audio capture or playback failed.
    #[error("Audio I/O error: {0}")]
    Audio(#[from] std::io::Error),
}

/// Source of spoken commands.
#[async_trait]
pub trait CommandSource: Send {
    /// Block until the next utterance.
    ///
    /// Returns `None` when no speech was detected; the caller treats that as
    /// a no-op iteration, never as an error.
    async fn listen(&mut self) -> Option<String>;
}

/// Best-effort user feedback (spoken or printed).
///
/// Callers on the dispatch path swallow errors from `notify`; feedback
/// failure never aborts the loop.
#[async_trait]
pub trait Feedback: Send + Sync {
    /// Deliver one message to the user.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError` if delivery fails.
    async fn notify(&self, message: &str) -> Result<(), VoiceError>;
}

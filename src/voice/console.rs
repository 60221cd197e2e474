//! Console implementations of the speech collaborators.

use async_trait::async_trait;
use owo_colors::OwoColorize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::voice::{CommandSource, Feedback, VoiceError};

/// Reads commands line-by-line from stdin.
pub struct ConsoleSource {
    lines: Lines<BufReader<Stdin>>,
}

impl ConsoleSource {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for ConsoleSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandSource for ConsoleSource {
    async fn listen(&mut self) -> Option<String> {
        match self.lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => None,
            Ok(Some(line)) => Some(line),
            Ok(None) => {
                // stdin closed; treat as a spoken quit so the loop ends.
                tracing::info!("stdin closed, treating as exit");
                Some("exit".to_string())
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read from stdin");
                None
            }
        }
    }
}

/// Prints feedback to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleFeedback;

#[async_trait]
impl Feedback for ConsoleFeedback {
    async fn notify(&self, message: &str) -> Result<(), VoiceError> {
        println!("{} {message}", "[dispatcher]".cyan().bold());
        Ok(())
    }
}

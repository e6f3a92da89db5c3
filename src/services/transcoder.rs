//! Audio transcoding via an external ffmpeg-compatible process

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Transcoding errors
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Transcoder exited non-zero
    #[error("Transcoder failed: {0}")]
    Process(String),

    /// Could not spawn the transcoder or prepare the output location
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transcoder seam; the production implementation shells out, tests
/// substitute a fake.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert one input file into one output file.
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError>;

    /// File extension of the produced container.
    fn output_extension(&self) -> &str;
}

/// ffmpeg-compatible subprocess transcoder.
pub struct FfmpegTranscoder {
    command: String,
    codec: String,
    bitrate_kbps: u32,
    extension: String,
}

impl FfmpegTranscoder {
    /// OGG Vorbis at 320 kbps.
    pub fn new() -> Self {
        Self {
            command: "ffmpeg".to_string(),
            codec: "libvorbis".to_string(),
            bitrate_kbps: 320,
            extension: "ogg".to_string(),
        }
    }

    /// Override the transcoder binary (e.g. from the TOML config).
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let result = Command::new(&self.command)
            .arg("-i")
            .arg(input)
            .args([
                "-c:a",
                &self.codec,
                "-b:a",
                &format!("{}k", self.bitrate_kbps),
                "-vn", // No video
                "-y",  // Overwrite output
            ])
            .arg(output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(TranscodeError::Process(stderr.trim().to_string()));
        }

        debug!(
            input = %input.display(),
            output = %output.display(),
            "Transcode completed"
        );

        Ok(())
    }

    fn output_extension(&self) -> &str {
        &self.extension
    }
}

//! Acoustic fingerprint generation via an external generator process
//!
//! The generator (fpcalc-compatible) is invoked with a file path and
//! prints a JSON object `{"duration": .., "fingerprint": ".."}` on
//! stdout; failures surface as a non-zero exit with diagnostics on
//! stderr.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Fingerprinting errors
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// Generator exited non-zero
    #[error("Fingerprint generator failed: {0}")]
    Process(String),

    /// Generator output did not parse
    #[error("Invalid generator output: {0}")]
    InvalidOutput(String),

    /// Could not spawn the generator
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A generated fingerprint plus the duration the generator measured.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub fingerprint: String,
    pub duration_secs: f64,
}

/// Fingerprint generator seam; the production implementation shells
/// out, tests substitute a fake.
#[async_trait]
pub trait FingerprintGenerator: Send + Sync {
    async fn generate(&self, path: &Path) -> Result<Fingerprint, FingerprintError>;
}

/// Generator JSON output structure.
#[derive(Debug, Deserialize)]
struct GeneratorOutput {
    duration: f64,
    fingerprint: String,
}

/// fpcalc-compatible subprocess runner.
pub struct FpcalcRunner {
    command: String,
}

impl FpcalcRunner {
    pub fn new() -> Self {
        Self {
            command: "fpcalc".to_string(),
        }
    }

    /// Override the generator binary (e.g. from the TOML config).
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }
}

impl Default for FpcalcRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FingerprintGenerator for FpcalcRunner {
    async fn generate(&self, path: &Path) -> Result<Fingerprint, FingerprintError> {
        let output = Command::new(&self.command)
            .arg("-json")
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FingerprintError::Process(stderr.trim().to_string()));
        }

        let parsed: GeneratorOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| FingerprintError::InvalidOutput(format!("JSON parse error: {}", e)))?;

        if parsed.fingerprint.is_empty() {
            return Err(FingerprintError::InvalidOutput(
                "empty fingerprint".to_string(),
            ));
        }

        debug!(
            file = %path.display(),
            duration_s = parsed.duration,
            "Generated fingerprint"
        );

        Ok(Fingerprint {
            fingerprint: parsed.fingerprint,
            duration_secs: parsed.duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generator_output() {
        let raw = r#"{"duration": 183.42, "fingerprint": "AQAAT0mUaEkSRZEG"}"#;
        let parsed: GeneratorOutput = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.fingerprint, "AQAAT0mUaEkSRZEG");
        assert!((parsed.duration - 183.42).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_generator_output_rejects_garbage() {
        assert!(serde_json::from_str::<GeneratorOutput>("DURATION=183").is_err());
    }

    #[tokio::test]
    async fn test_missing_generator_binary_is_io_error() {
        let runner = FpcalcRunner::new().with_command("/nonexistent/fpcalc-binary");
        let result = runner.generate(Path::new("/tmp/whatever.mp3")).await;
        assert!(matches!(result, Err(FingerprintError::Io(_))));
    }
}

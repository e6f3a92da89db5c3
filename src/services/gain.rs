//! Album loudness analysis via an external gain calculator
//!
//! The calculator (mp3gain/aacgain-compatible) is invoked once per
//! album in directory mode, or once per standalone file in track mode.
//! It mutates loudness tags as a side effect and prints a tab-separated
//! report; the report is parsed here to distribute the album-level
//! gain/peak values to every member file.

use crate::types::{AlbumGainData, GainValues};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Row label the calculator uses for the album summary line.
const ALBUM_ROW: &str = "Album";

/// Gain calculation errors
#[derive(Debug, Error)]
pub enum GainError {
    /// Calculator exited non-zero
    #[error("Gain calculator failed: {0}")]
    Process(String),

    /// Report did not parse
    #[error("Invalid gain report: {0}")]
    InvalidReport(String),

    /// Could not spawn the calculator
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Gain calculator seam; the production implementation shells out,
/// tests substitute a fake.
#[async_trait]
pub trait GainCalculator: Send + Sync {
    /// Album mode: analyze a directory's file set as one unit and
    /// distribute the album gain/peak to every member file.
    async fn analyze_album(
        &self,
        dir: &Path,
        files: &[PathBuf],
    ) -> Result<AlbumGainData, GainError>;

    /// Track mode: analyze one standalone file.
    async fn analyze_single(&self, file: &Path) -> Result<AlbumGainData, GainError>;
}

/// One parsed report row.
#[derive(Debug, Clone, PartialEq)]
struct ReportRow {
    file: String,
    gain_db: f64,
    peak: f64,
}

/// Parse the tab-separated report: a header line, one row per file,
/// and an `Album` summary row. Unparseable rows are skipped with a
/// warning; a report with no usable rows is an error.
fn parse_gain_report(report: &str) -> Result<(Vec<ReportRow>, Option<GainValues>), GainError> {
    let mut rows = Vec::new();
    let mut album = None;

    for (index, line) in report.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        let columns: Vec<&str> = line.split('\t').collect();
        if index == 0 && columns.first().map(|c| c.trim()) == Some("File") {
            continue; // header
        }
        if columns.len() < 3 {
            warn!(line, "Skipping malformed gain report row");
            continue;
        }

        let gain_db: f64 = match columns[1].trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(line, "Skipping gain report row with unparseable gain");
                continue;
            }
        };
        let peak: f64 = match columns[2].trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(line, "Skipping gain report row with unparseable peak");
                continue;
            }
        };

        if columns[0].trim() == ALBUM_ROW {
            album = Some(GainValues {
                album_gain: gain_db,
                album_peak: peak,
            });
        } else {
            rows.push(ReportRow {
                file: columns[0].to_string(),
                gain_db,
                peak,
            });
        }
    }

    if rows.is_empty() && album.is_none() {
        return Err(GainError::InvalidReport(
            "no usable rows in gain report".to_string(),
        ));
    }

    Ok((rows, album))
}

/// mp3gain-compatible subprocess runner.
pub struct GainRunner {
    command: String,
}

impl GainRunner {
    pub fn new() -> Self {
        Self {
            command: "mp3gain".to_string(),
        }
    }

    /// Override the calculator binary (e.g. from the TOML config).
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    async fn run(&self, album_mode: bool, target: &Path) -> Result<String, GainError> {
        let mut command = Command::new(&self.command);
        command.arg("-o"); // tab-delimited report
        if album_mode {
            command.arg("-a"); // album (directory) analysis
        }
        let output = command
            .arg(target)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GainError::Process(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Default for GainRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GainCalculator for GainRunner {
    async fn analyze_album(
        &self,
        dir: &Path,
        files: &[PathBuf],
    ) -> Result<AlbumGainData, GainError> {
        let report = self.run(true, dir).await?;
        let (rows, album) = parse_gain_report(&report)?;
        for row in &rows {
            debug!(file = %row.file, gain_db = row.gain_db, peak = row.peak, "Track gain");
        }

        // The album row is authoritative; without one, fall back to the
        // loudest-track peak and first-row gain so the data still
        // covers the album's files.
        let album = album.unwrap_or_else(|| GainValues {
            album_gain: rows.first().map(|r| r.gain_db).unwrap_or(0.0),
            album_peak: rows.iter().map(|r| r.peak).fold(0.0, f64::max),
        });

        let mut data = AlbumGainData::default();
        for file in files {
            data.insert(file.clone(), album);
        }

        debug!(
            album = %dir.display(),
            files = files.len(),
            album_gain = album.album_gain,
            album_peak = album.album_peak,
            "Album gain computed"
        );

        Ok(data)
    }

    async fn analyze_single(&self, file: &Path) -> Result<AlbumGainData, GainError> {
        let report = self.run(false, file).await?;
        let (rows, album) = parse_gain_report(&report)?;

        // Track mode: the file's own row doubles as its album values;
        // some calculators still print an Album row for a single file.
        let values = match (rows.first(), album) {
            (Some(row), _) => GainValues {
                album_gain: row.gain_db,
                album_peak: row.peak,
            },
            (None, Some(album)) => album,
            (None, None) => {
                return Err(GainError::InvalidReport(
                    "gain report contains no row for the file".to_string(),
                ))
            }
        };

        let mut data = AlbumGainData::default();
        data.insert(file.to_path_buf(), values);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "File\tdB gain\tPeak\n\
        /music/Album1/01.mp3\t-2.15\t0.912\n\
        /music/Album1/02.mp3\t-3.40\t0.988\n\
        Album\t-2.80\t0.988\n";

    #[test]
    fn test_parse_report_with_album_row() {
        let (rows, album) = parse_gain_report(REPORT).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].file, "/music/Album1/01.mp3");
        assert!((rows[1].gain_db - (-3.40)).abs() < f64::EPSILON);

        let album = album.unwrap();
        assert!((album.album_gain - (-2.80)).abs() < f64::EPSILON);
        assert!((album.album_peak - 0.988).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_report_without_album_row() {
        let report = "File\tdB gain\tPeak\n/music/one.mp3\t1.25\t0.5\n";
        let (rows, album) = parse_gain_report(report).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(album.is_none());
    }

    #[test]
    fn test_parse_report_skips_malformed_rows() {
        let report = "File\tdB gain\tPeak\n\
            garbage line without tabs\n\
            /music/one.mp3\tnot-a-number\t0.5\n\
            /music/two.mp3\t-1.0\t0.7\n";
        let (rows, album) = parse_gain_report(report).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].file, "/music/two.mp3");
        assert!(album.is_none());
    }

    #[test]
    fn test_parse_empty_report_is_error() {
        assert!(parse_gain_report("").is_err());
        assert!(parse_gain_report("File\tdB gain\tPeak\n").is_err());
    }
}

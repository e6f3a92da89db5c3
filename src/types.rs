//! Core data model shared across the processing pipeline

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Tag snapshot read through the tag codec.
///
/// The pipeline never holds a long-lived file handle; each operation
/// re-opens the file and produces a fresh snapshot.
#[derive(Debug, Clone, Default)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub comment: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,

    /// Acoustic fingerprint previously written by this tool (or a
    /// compatible tagger).
    pub fingerprint: Option<String>,
    /// Identity id resolved by the remote lookup service.
    pub identity_id: Option<String>,

    pub track_gain: Option<f64>,
    pub track_peak: Option<f64>,
    pub album_gain: Option<f64>,
    pub album_peak: Option<f64>,

    pub duration_secs: Option<f64>,
    pub bitrate_kbps: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
}

impl TrackTags {
    /// Whether the file already carries fingerprint/identity fields.
    pub fn has_identity(&self) -> bool {
        self.fingerprint.is_some() || self.identity_id.is_some()
    }
}

/// Loudness values distributed to every member of one album-mode
/// gain-calculator run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainValues {
    /// Album gain in dB
    pub album_gain: f64,
    /// Album peak (linear)
    pub album_peak: f64,
}

/// Per-file album loudness data, produced once per album before
/// per-track dispatch and consumed read-only by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct AlbumGainData {
    values: HashMap<PathBuf, GainValues>,
}

impl AlbumGainData {
    pub fn insert(&mut self, path: PathBuf, values: GainValues) {
        self.values.insert(path, values);
    }

    pub fn get(&self, path: &Path) -> Option<GainValues> {
        self.values.get(path).copied()
    }

    pub fn merge(&mut self, other: AlbumGainData) {
        self.values.extend(other.values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Option bundle attached to every processing task.
#[derive(Debug, Clone, Default)]
pub struct ProcessingOptions {
    /// Transcode lossless sources into the output directory
    pub encode: bool,
    /// Allow transcoding even when the source is lossy
    pub force_lossy: bool,
    /// Destination directory for transcoded files
    pub output_dir: Option<PathBuf>,
    /// Mirror the input structure under the output directory instead of
    /// flattening
    pub preserve_structure: bool,
    /// Mark album loudness data as applied when available
    pub compute_gain: bool,
    /// Run the fingerprint tagging state machine
    pub tag_identity: bool,
    /// Overwrite existing fingerprint/identity tags
    pub force: bool,
    /// Simulation mode: run read/compute stages, suppress writes
    pub dry_run: bool,
    /// Suppress per-file progress output
    pub quiet: bool,
}

/// The unit submitted to the scheduler: one file plus its options and a
/// reference to any album gain data covering it.
#[derive(Debug, Clone)]
pub struct ProcessingTask {
    pub path: PathBuf,
    /// Input root the file was discovered under; used to mirror
    /// directory structure when transcoding.
    pub base_dir: Option<PathBuf>,
    pub options: ProcessingOptions,
    pub gain: Arc<AlbumGainData>,
}

impl ProcessingTask {
    pub fn new(path: PathBuf, options: ProcessingOptions) -> Self {
        Self {
            path,
            base_dir: None,
            options,
            gain: Arc::new(AlbumGainData::default()),
        }
    }

    pub fn with_base_dir(mut self, base_dir: PathBuf) -> Self {
        self.base_dir = Some(base_dir);
        self
    }

    pub fn with_gain(mut self, gain: Arc<AlbumGainData>) -> Self {
        self.gain = gain;
        self
    }
}

/// Identity-tagging outcome, one per task that ran the tagging stage.
///
/// Closed enumeration: the aggregator matches exhaustively, so adding a
/// variant is a compile-time-checked change everywhere it is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagOutcome {
    /// Tags written (or would be written, in a dry run)
    Processed,
    /// Existing tags present and force not set
    Skipped,
    /// File access, fingerprinting, or write error
    Failed,
    /// Remote identity call errored or returned an error envelope
    LookupFailed,
    /// Remote call succeeded but matched nothing
    NoResults,
}

impl TagOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagOutcome::Processed => "processed",
            TagOutcome::Skipped => "skipped",
            TagOutcome::Failed => "failed",
            TagOutcome::LookupFailed => "lookup_failed",
            TagOutcome::NoResults => "no_results",
        }
    }
}

impl fmt::Display for TagOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-task result record. Every submitted task yields exactly one of
/// these; stage failures land in their own fields and are never thrown
/// past the pipeline boundary.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub input: PathBuf,
    /// Transcode output, when the encode stage produced (or reused) one
    pub output: Option<PathBuf>,
    pub encode_error: Option<String>,
    pub gain_applied: bool,
    pub tag_outcome: Option<TagOutcome>,
    pub tag_error: Option<String>,
}

impl ProcessingResult {
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            output: None,
            encode_error: None,
            gain_applied: false,
            tag_outcome: None,
            tag_error: None,
        }
    }
}

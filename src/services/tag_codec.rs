//! Tag codec: the single component allowed to touch audio file tags
//!
//! An explicitly constructed, injectable service object shared by
//! reference (`Arc<dyn TagCodec>`); the pipeline re-opens the file for
//! every operation instead of holding a handle.

use crate::types::TrackTags;
use lofty::config::WriteOptions;
use lofty::file::FileType;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Tag item key carrying the acoustic fingerprint.
pub const FINGERPRINT_KEY: &str = "ACOUSTID_FINGERPRINT";
/// Tag item key carrying the resolved identity id.
pub const IDENTITY_KEY: &str = "ACOUSTID_ID";

/// Tag codec errors
#[derive(Debug, Error)]
pub enum TagCodecError {
    /// Cannot open or parse the file
    #[error("Failed to read file: {0}")]
    Read(String),

    /// Cannot persist the updated tags
    #[error("Failed to write tags: {0}")]
    Write(String),

    /// I/O error (file copy/rename)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Narrow contract over the tag library. Tag I/O is short and local,
/// so the methods are synchronous; a trait object keeps tests
/// deterministic with a fake implementation.
pub trait TagCodec: Send + Sync {
    /// Read a tag/properties snapshot.
    fn read(&self, path: &Path) -> Result<TrackTags, TagCodecError>;

    /// Persist fingerprint (+ identity id, if resolved) atomically:
    /// stage a copy in a scratch directory, tag the copy, then
    /// rename-replace the original. The scratch directory is removed on
    /// every exit path.
    fn write_identity(
        &self,
        path: &Path,
        fingerprint: &str,
        identity_id: Option<&str>,
    ) -> Result<(), TagCodecError>;

    /// Codec-reported lossless flag, for container formats whose
    /// extension alone is ambiguous.
    fn is_lossless(&self, path: &Path) -> Result<bool, TagCodecError>;
}

/// Production codec backed by lofty.
#[derive(Debug, Default)]
pub struct LoftyCodec {}

impl LoftyCodec {
    pub fn new() -> Self {
        Self {}
    }
}

/// Parse a gain value from a tag string (e.g., "-5.23 dB" -> -5.23)
fn parse_gain(s: &str) -> Option<f64> {
    let s = s.trim();
    let s = s.strip_suffix("dB").unwrap_or(s);
    s.trim().parse().ok()
}

/// Look a text item up across all of the file's tags, primary first.
fn get_text(tagged: &lofty::file::TaggedFile, key: &ItemKey) -> Option<String> {
    if let Some(value) = tagged.primary_tag().and_then(|t| t.get_string(key)) {
        return Some(value.to_string());
    }
    tagged
        .tags()
        .iter()
        .find_map(|t| t.get_string(key))
        .map(str::to_string)
}

impl TagCodec for LoftyCodec {
    fn read(&self, path: &Path) -> Result<TrackTags, TagCodecError> {
        let tagged = Probe::open(path)
            .map_err(|e| TagCodecError::Read(e.to_string()))?
            .read()
            .map_err(|e| TagCodecError::Read(e.to_string()))?;

        let properties = tagged.properties();
        let mut tags = TrackTags {
            duration_secs: Some(properties.duration().as_secs_f64()),
            bitrate_kbps: properties.audio_bitrate(),
            sample_rate: properties.sample_rate(),
            channels: properties.channels(),
            ..TrackTags::default()
        };

        if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
            tags.title = tag.title().map(|s| s.to_string());
            tags.artist = tag.artist().map(|s| s.to_string());
            tags.album = tag.album().map(|s| s.to_string());
            tags.genre = tag.genre().map(|s| s.to_string());
            tags.comment = tag.comment().map(|s| s.to_string());
            tags.year = tag.year();
            tags.track_number = tag.track();
        }

        tags.fingerprint = get_text(&tagged, &ItemKey::Unknown(FINGERPRINT_KEY.to_string()));
        tags.identity_id = get_text(&tagged, &ItemKey::Unknown(IDENTITY_KEY.to_string()));

        tags.track_gain =
            get_text(&tagged, &ItemKey::ReplayGainTrackGain).and_then(|v| parse_gain(&v));
        tags.track_peak =
            get_text(&tagged, &ItemKey::ReplayGainTrackPeak).and_then(|v| v.trim().parse().ok());
        tags.album_gain =
            get_text(&tagged, &ItemKey::ReplayGainAlbumGain).and_then(|v| parse_gain(&v));
        tags.album_peak =
            get_text(&tagged, &ItemKey::ReplayGainAlbumPeak).and_then(|v| v.trim().parse().ok());

        debug!(
            file = %path.display(),
            fingerprinted = tags.fingerprint.is_some(),
            identified = tags.identity_id.is_some(),
            "Read tag snapshot"
        );

        Ok(tags)
    }

    fn write_identity(
        &self,
        path: &Path,
        fingerprint: &str,
        identity_id: Option<&str>,
    ) -> Result<(), TagCodecError> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| TagCodecError::Write(format!("{} has no parent", path.display())))?;
        let file_name = path
            .file_name()
            .ok_or_else(|| TagCodecError::Write(format!("{} has no file name", path.display())))?;

        // Scratch dir in the same directory so the final rename never
        // crosses a filesystem boundary.
        let scratch = tempfile::Builder::new()
            .prefix(".tunesmith-")
            .tempdir_in(parent)?;
        let staged = scratch.path().join(file_name);
        std::fs::copy(path, &staged)?;

        let write_result = write_items(&staged, fingerprint, identity_id);

        let result = match write_result {
            Ok(()) => {
                std::fs::rename(&staged, path)?;
                debug!(
                    file = %path.display(),
                    identified = identity_id.is_some(),
                    "Wrote identity tags"
                );
                Ok(())
            }
            Err(e) => Err(e),
        };

        // Scratch cleanup is best-effort on every exit path; a removal
        // failure never fails the task.
        if let Err(e) = scratch.close() {
            warn!(file = %path.display(), error = %e, "Failed to remove scratch directory");
        }

        result
    }

    fn is_lossless(&self, path: &Path) -> Result<bool, TagCodecError> {
        let tagged = Probe::open(path)
            .map_err(|e| TagCodecError::Read(e.to_string()))?
            .read()
            .map_err(|e| TagCodecError::Read(e.to_string()))?;

        let lossless = match tagged.file_type() {
            FileType::Flac | FileType::Wav | FileType::Aiff | FileType::WavPack | FileType::Ape => {
                true
            }
            FileType::Mpeg | FileType::Opus | FileType::Vorbis | FileType::Speex | FileType::Aac => {
                false
            }
            // MP4-family containers hold both ALAC and AAC; ALAC decodes
            // with a bit depth, AAC does not.
            FileType::Mp4 => tagged.properties().bit_depth().is_some(),
            _ => false,
        };

        Ok(lossless)
    }
}

/// Tag the staged copy in place.
fn write_items(
    staged: &Path,
    fingerprint: &str,
    identity_id: Option<&str>,
) -> Result<(), TagCodecError> {
    let mut tagged = Probe::open(staged)
        .map_err(|e| TagCodecError::Write(e.to_string()))?
        .read()
        .map_err(|e| TagCodecError::Write(e.to_string()))?;

    let tag_type = tagged.primary_tag_type();
    if tagged.tag(tag_type).is_none() {
        tagged.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged
        .tag_mut(tag_type)
        .expect("tag inserted above");

    tag.insert_text(
        ItemKey::Unknown(FINGERPRINT_KEY.to_string()),
        fingerprint.to_string(),
    );
    if let Some(id) = identity_id {
        tag.insert_text(ItemKey::Unknown(IDENTITY_KEY.to_string()), id.to_string());
    }

    tag.save_to_path(staged, WriteOptions::default())
        .map_err(|e| TagCodecError::Write(e.to_string()))
}

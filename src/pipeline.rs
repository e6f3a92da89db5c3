//! Per-track processing pipeline
//!
//! Composes format classification, optional transcode, album gain
//! marking, and the fingerprint tagging state machine into one ordered
//! procedure. Each stage's failure is captured in its own result
//! field; the pipeline always returns a result and never raises, so a
//! failed encode still lets later stages run against the original
//! path.

use crate::services::format_classifier::FormatClassifier;
use crate::services::transcoder::Transcoder;
use crate::tagger::IdentityTagger;
use crate::types::{ProcessingResult, ProcessingTask};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Compute the deterministic transcode output path: mirror the input
/// structure under the output directory when a base is known and
/// structure preservation is requested, else flatten.
pub fn encode_output_path(
    input: &Path,
    base_dir: Option<&Path>,
    output_dir: &Path,
    preserve_structure: bool,
    extension: &str,
) -> PathBuf {
    if preserve_structure {
        if let Some(base) = base_dir {
            if let Ok(relative) = input.strip_prefix(base) {
                return output_dir.join(relative).with_extension(extension);
            }
        }
    }

    let file_name = input
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("output"));
    output_dir.join(file_name).with_extension(extension)
}

/// The per-track pipeline service.
pub struct TrackPipeline {
    classifier: FormatClassifier,
    transcoder: Arc<dyn Transcoder>,
    tagger: IdentityTagger,
}

impl TrackPipeline {
    pub fn new(
        classifier: FormatClassifier,
        transcoder: Arc<dyn Transcoder>,
        tagger: IdentityTagger,
    ) -> Self {
        Self {
            classifier,
            transcoder,
            tagger,
        }
    }

    /// Run all requested stages against one task.
    pub async fn process(&self, task: &ProcessingTask) -> ProcessingResult {
        let mut result = ProcessingResult::new(task.path.clone());
        let mut working_path = task.path.clone();
        let options = &task.options;

        if options.encode {
            match self.plan_encode(task) {
                Err(message) => {
                    warn!(file = %task.path.display(), error = %message, "Encode stage rejected");
                    result.encode_error = Some(message);
                }
                Ok(output) if output.exists() => {
                    debug!(
                        file = %task.path.display(),
                        output = %output.display(),
                        "Transcode output already exists, reusing"
                    );
                    result.output = Some(output.clone());
                    working_path = output;
                }
                Ok(output) if options.dry_run => {
                    info!(
                        file = %task.path.display(),
                        output = %output.display(),
                        "Dry run: would transcode"
                    );
                    result.output = Some(output);
                    // The output was not produced; later stages keep
                    // the original working path.
                }
                Ok(output) => match self.transcoder.transcode(&task.path, &output).await {
                    Ok(()) => {
                        result.output = Some(output.clone());
                        working_path = output;
                    }
                    Err(e) => {
                        warn!(file = %task.path.display(), error = %e, "Transcode failed");
                        result.encode_error = Some(e.to_string());
                    }
                },
            }
        }

        if options.compute_gain && task.gain.get(&task.path).is_some() {
            // Album-level gain was computed once per album before
            // dispatch; the per-track stage only records coverage.
            result.gain_applied = true;
        }

        if options.tag_identity {
            let tag_result = self
                .tagger
                .tag(&working_path, options.force, options.dry_run)
                .await;
            result.tag_outcome = Some(tag_result.outcome);
            result.tag_error = tag_result.error;
        }

        result
    }

    /// Validate the encode sub-stage and compute its output path.
    fn plan_encode(&self, task: &ProcessingTask) -> Result<PathBuf, String> {
        let options = &task.options;
        let output_dir = options
            .output_dir
            .as_ref()
            .ok_or_else(|| "no output directory configured".to_string())?;

        if !self.classifier.is_lossless(&task.path) && !options.force_lossy {
            return Err("refusing to transcode lossy source (use --force-lossy to override)".to_string());
        }

        Ok(encode_output_path(
            &task.path,
            task.base_dir.as_deref(),
            output_dir,
            options.preserve_structure,
            self.transcoder.output_extension(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_flattens_by_default() {
        let out = encode_output_path(
            Path::new("/music/Artist/Album/01 - Track.flac"),
            Some(Path::new("/music")),
            Path::new("/converted"),
            false,
            "ogg",
        );
        assert_eq!(out, PathBuf::from("/converted/01 - Track.ogg"));
    }

    #[test]
    fn test_output_path_mirrors_structure() {
        let out = encode_output_path(
            Path::new("/music/Artist/Album/01 - Track.flac"),
            Some(Path::new("/music")),
            Path::new("/converted"),
            true,
            "ogg",
        );
        assert_eq!(out, PathBuf::from("/converted/Artist/Album/01 - Track.ogg"));
    }

    #[test]
    fn test_output_path_mirror_without_base_flattens() {
        let out = encode_output_path(
            Path::new("/music/Artist/Album/track.flac"),
            None,
            Path::new("/converted"),
            true,
            "ogg",
        );
        assert_eq!(out, PathBuf::from("/converted/track.ogg"));
    }
}

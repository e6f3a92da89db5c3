//! Audio format classification: lossless, lossy, or ambiguous
//!
//! Extension fast paths cover the common cases without opening the
//! file; ambiguous container extensions fall through to the tag codec's
//! reported lossless flag. Any read failure classifies as lossy, so a
//! broken file is refused transcoding rather than transcoded from a
//! possibly-lossy source.

use super::tag_codec::TagCodec;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Extensions that are always lossless encodings.
pub const LOSSLESS_EXTENSIONS: &[&str] = &["flac", "wav", "aiff", "ape"];

/// Extensions that are always lossy encodings.
pub const LOSSY_EXTENSIONS: &[&str] = &["mp3", "ogg", "opus", "aac"];

/// Container extensions that can hold either; the codec decides.
pub const AMBIGUOUS_EXTENSIONS: &[&str] = &["m4a", "mp4", "wma"];

/// Lowercased extension of a supported audio file, `None` otherwise.
pub fn supported_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    if LOSSLESS_EXTENSIONS.contains(&ext.as_str())
        || LOSSY_EXTENSIONS.contains(&ext.as_str())
        || AMBIGUOUS_EXTENSIONS.contains(&ext.as_str())
    {
        Some(ext)
    } else {
        None
    }
}

/// Check if a path carries a supported audio extension.
pub fn is_audio_file(path: &Path) -> bool {
    supported_extension(path).is_some()
}

/// Format classifier service
pub struct FormatClassifier {
    codec: Arc<dyn TagCodec>,
}

impl FormatClassifier {
    pub fn new(codec: Arc<dyn TagCodec>) -> Self {
        Self { codec }
    }

    /// Whether the file's audio encoding is lossless.
    ///
    /// Known extensions answer without consulting the codec; ambiguous
    /// containers open the file and use the codec-reported flag. Read
    /// failures default to `false`.
    pub fn is_lossless(&self, path: &Path) -> bool {
        let ext = match supported_extension(path) {
            Some(ext) => ext,
            None => return false,
        };

        if LOSSLESS_EXTENSIONS.contains(&ext.as_str()) {
            return true;
        }
        if LOSSY_EXTENSIONS.contains(&ext.as_str()) {
            return false;
        }

        match self.codec.is_lossless(path) {
            Ok(lossless) => lossless,
            Err(e) => {
                warn!(
                    file = %path.display(),
                    error = %e,
                    "Could not inspect ambiguous container, treating as lossy"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tag_codec::TagCodecError;
    use crate::types::TrackTags;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlagCodec {
        lossless: Result<bool, ()>,
        calls: AtomicUsize,
    }

    impl TagCodec for FlagCodec {
        fn read(&self, _path: &Path) -> Result<TrackTags, TagCodecError> {
            Ok(TrackTags::default())
        }

        fn write_identity(
            &self,
            _path: &Path,
            _fingerprint: &str,
            _identity_id: Option<&str>,
        ) -> Result<(), TagCodecError> {
            Ok(())
        }

        fn is_lossless(&self, _path: &Path) -> Result<bool, TagCodecError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.lossless
                .map_err(|_| TagCodecError::Read("unreadable".to_string()))
        }
    }

    fn classifier(lossless: Result<bool, ()>) -> (FormatClassifier, Arc<FlagCodec>) {
        let codec = Arc::new(FlagCodec {
            lossless,
            calls: AtomicUsize::new(0),
        });
        (FormatClassifier::new(codec.clone()), codec)
    }

    #[test]
    fn test_supported_extension() {
        assert_eq!(
            supported_extension(Path::new("a/track.FLAC")),
            Some("flac".to_string())
        );
        assert_eq!(
            supported_extension(Path::new("a/track.m4a")),
            Some("m4a".to_string())
        );
        assert_eq!(supported_extension(Path::new("a/cover.jpg")), None);
        assert_eq!(supported_extension(Path::new("a/noext")), None);
    }

    #[test]
    fn test_known_extensions_skip_codec() {
        let (classifier, codec) = classifier(Ok(true));

        assert!(classifier.is_lossless(Path::new("x.wav")));
        assert!(classifier.is_lossless(Path::new("x.flac")));
        assert!(!classifier.is_lossless(Path::new("x.mp3")));
        assert!(!classifier.is_lossless(Path::new("x.ogg")));

        assert_eq!(codec.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ambiguous_consults_codec() {
        let (classifier, codec) = classifier(Ok(true));
        assert!(classifier.is_lossless(Path::new("x.m4a")));
        assert_eq!(codec.calls.load(Ordering::SeqCst), 1);

        let (classifier, _) = classifier_pair_lossy();
        assert!(!classifier.is_lossless(Path::new("x.m4a")));
    }

    fn classifier_pair_lossy() -> (FormatClassifier, Arc<FlagCodec>) {
        classifier(Ok(false))
    }

    #[test]
    fn test_codec_read_failure_defaults_to_lossy() {
        let (classifier, codec) = classifier(Err(()));
        assert!(!classifier.is_lossless(Path::new("/nonexistent/x.m4a")));
        assert_eq!(codec.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsupported_extension_is_not_lossless() {
        let (classifier, codec) = classifier(Ok(true));
        assert!(!classifier.is_lossless(Path::new("x.txt")));
        assert_eq!(codec.calls.load(Ordering::SeqCst), 0);
    }
}

//! Shared test doubles and fixture helpers
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tunesmith::services::fingerprinter::{Fingerprint, FingerprintError, FingerprintGenerator};
use tunesmith::services::identity_client::{IdentityLookup, LookupError, LookupOutcome};
use tunesmith::services::tag_codec::{TagCodec, TagCodecError};
use tunesmith::services::transcoder::{TranscodeError, Transcoder};
use tunesmith::services::FormatClassifier;
use tunesmith::types::TrackTags;
use tunesmith::{IdentityTagger, TrackPipeline};

/// In-memory tag store standing in for the tag library.
#[derive(Default)]
pub struct FakeCodec {
    pub tags: Mutex<HashMap<PathBuf, TrackTags>>,
    pub read_calls: AtomicUsize,
    pub write_calls: AtomicUsize,
    pub fail_writes: bool,
    pub lossless: bool,
}

impl FakeCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lossless(mut self, lossless: bool) -> Self {
        self.lossless = lossless;
        self
    }

    pub fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Pre-seed a file with existing identity tags.
    pub fn seed(&self, path: &Path, fingerprint: &str, identity_id: Option<&str>) {
        let mut tags = self.tags.lock().unwrap();
        let entry = tags.entry(path.to_path_buf()).or_default();
        entry.fingerprint = Some(fingerprint.to_string());
        entry.identity_id = identity_id.map(str::to_string);
    }

    pub fn stored(&self, path: &Path) -> Option<TrackTags> {
        self.tags.lock().unwrap().get(path).cloned()
    }
}

impl TagCodec for FakeCodec {
    fn read(&self, path: &Path) -> Result<TrackTags, TagCodecError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .tags
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default())
    }

    fn write_identity(
        &self,
        path: &Path,
        fingerprint: &str,
        identity_id: Option<&str>,
    ) -> Result<(), TagCodecError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(TagCodecError::Write("disk full".to_string()));
        }
        let mut tags = self.tags.lock().unwrap();
        let entry = tags.entry(path.to_path_buf()).or_default();
        entry.fingerprint = Some(fingerprint.to_string());
        if let Some(id) = identity_id {
            entry.identity_id = Some(id.to_string());
        }
        Ok(())
    }

    fn is_lossless(&self, _path: &Path) -> Result<bool, TagCodecError> {
        Ok(self.lossless)
    }
}

/// Fingerprint generator double with a concurrency gauge.
pub struct FakeGenerator {
    pub calls: AtomicUsize,
    pub fail: bool,
    pub delay_ms: u64,
    current: AtomicUsize,
    pub max_concurrent: AtomicUsize,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
            delay_ms: 0,
            current: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

#[async_trait]
impl FingerprintGenerator for FakeGenerator {
    async fn generate(&self, path: &Path) -> Result<Fingerprint, FingerprintError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);

        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        self.current.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(FingerprintError::Process("decoder exploded".to_string()));
        }
        Ok(Fingerprint {
            fingerprint: format!("FP:{}", path.display()),
            duration_secs: 180.0,
        })
    }
}

/// Identity lookup double.
pub enum LookupBehavior {
    Match(String),
    Empty,
    TransportError,
    ErrorEnvelope,
}

pub struct FakeLookup {
    pub calls: AtomicUsize,
    pub behavior: LookupBehavior,
}

impl FakeLookup {
    pub fn new(behavior: LookupBehavior) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            behavior,
        }
    }
}

#[async_trait]
impl IdentityLookup for FakeLookup {
    async fn lookup(
        &self,
        _fingerprint: &str,
        _duration_secs: u64,
    ) -> Result<LookupOutcome, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            LookupBehavior::Match(id) => Ok(LookupOutcome::Matched {
                id: id.clone(),
                score: 0.95,
            }),
            LookupBehavior::Empty => Ok(LookupOutcome::NoResults),
            LookupBehavior::TransportError => {
                Err(LookupError::Network("connection refused".to_string()))
            }
            LookupBehavior::ErrorEnvelope => {
                Err(LookupError::Service("invalid API key".to_string()))
            }
        }
    }
}

/// Transcoder double; creates the output file so exists-checks work.
pub struct FakeTranscoder {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, _input: &Path, output: &Path) -> Result<(), TranscodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TranscodeError::Process("unsupported codec".to_string()));
        }
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, b"transcoded")?;
        Ok(())
    }

    fn output_extension(&self) -> &str {
        "ogg"
    }
}

/// Bundle of fakes behind a pipeline, with handles kept for
/// call-counting assertions.
pub struct PipelineHarness {
    pub pipeline: Arc<TrackPipeline>,
    pub codec: Arc<FakeCodec>,
    pub generator: Arc<FakeGenerator>,
    pub lookup: Option<Arc<FakeLookup>>,
    pub transcoder: Arc<FakeTranscoder>,
}

pub fn build_harness(
    codec: FakeCodec,
    generator: FakeGenerator,
    lookup: Option<FakeLookup>,
    transcoder: FakeTranscoder,
) -> PipelineHarness {
    let codec = Arc::new(codec);
    let generator = Arc::new(generator);
    let lookup = lookup.map(Arc::new);
    let transcoder = Arc::new(transcoder);

    let tagger = IdentityTagger::new(
        codec.clone(),
        generator.clone(),
        lookup
            .clone()
            .map(|l| l as Arc<dyn IdentityLookup>),
    );
    let pipeline = TrackPipeline::new(
        FormatClassifier::new(codec.clone()),
        transcoder.clone(),
        tagger,
    );

    PipelineHarness {
        pipeline: Arc::new(pipeline),
        codec,
        generator,
        lookup,
        transcoder,
    }
}

/// Build a tagger over fakes, keeping the fakes for assertions.
pub fn build_tagger(
    codec: Arc<FakeCodec>,
    generator: Arc<FakeGenerator>,
    lookup: Option<Arc<FakeLookup>>,
) -> IdentityTagger {
    IdentityTagger::new(
        codec,
        generator,
        lookup.map(|l| l as Arc<dyn IdentityLookup>),
    )
}

/// Create an audio fixture file with plausible magic bytes.
pub fn write_audio_file(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let bytes: &[u8] = match path.extension().and_then(|e| e.to_str()) {
        Some("flac") => b"fLaC\x00\x00\x00\x22",
        Some("wav") => b"RIFF\x00\x00\x00\x00WAVE",
        Some("ogg") => b"OggS\x00\x00\x00\x00",
        _ => b"ID3\x03\x00\x00\x00\x00\x00\x00",
    };
    std::fs::write(path, bytes).unwrap();
}

//! Fingerprint tagging state machine
//!
//! One file in, one terminal outcome out. Stages run strictly in
//! order and short-circuit on the first failure: existence check,
//! existing-tag check, fingerprint generation, duration retrieval,
//! identity lookup, dry-run short-circuit, atomic tag write.

use crate::services::fingerprinter::FingerprintGenerator;
use crate::services::identity_client::{IdentityLookup, LookupOutcome};
use crate::services::tag_codec::TagCodec;
use crate::types::TagOutcome;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Terminal outcome plus any error text for the result record.
#[derive(Debug, Clone)]
pub struct TagResult {
    pub outcome: TagOutcome,
    pub error: Option<String>,
}

impl TagResult {
    fn ok(outcome: TagOutcome) -> Self {
        Self {
            outcome,
            error: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            outcome: TagOutcome::Failed,
            error: Some(message.into()),
        }
    }
}

/// The identity tagging service. Collaborators are injected so the
/// state machine is testable without a network, a generator binary, or
/// real tag I/O.
pub struct IdentityTagger {
    codec: Arc<dyn TagCodec>,
    generator: Arc<dyn FingerprintGenerator>,
    lookup: Option<Arc<dyn IdentityLookup>>,
}

impl IdentityTagger {
    /// `lookup` is `None` when no API key is configured; the run is
    /// then fingerprint-only.
    pub fn new(
        codec: Arc<dyn TagCodec>,
        generator: Arc<dyn FingerprintGenerator>,
        lookup: Option<Arc<dyn IdentityLookup>>,
    ) -> Self {
        Self {
            codec,
            generator,
            lookup,
        }
    }

    /// Run the state machine against one file.
    pub async fn tag(&self, path: &Path, force: bool, dry_run: bool) -> TagResult {
        // Stage 1: existence check.
        match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return TagResult::failed(format!("{} is not a regular file", path.display())),
            Err(e) => return TagResult::failed(format!("cannot access {}: {}", path.display(), e)),
        }

        // Stage 2: existing-tag check.
        let existing = match self.codec.read(path) {
            Ok(tags) => tags,
            Err(e) => return TagResult::failed(e.to_string()),
        };
        if existing.has_identity() {
            if !force {
                debug!(file = %path.display(), "Identity tags already present, skipping");
                return TagResult::ok(TagOutcome::Skipped);
            }
            info!(file = %path.display(), "Identity tags already present, overwriting (force)");
        }

        // Stage 3: fingerprint generation. Failure here is terminal;
        // no lookup or write is attempted.
        let fingerprint = match self.generator.generate(path).await {
            Ok(fp) => fp,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Fingerprint generation failed");
                return TagResult::failed(e.to_string());
            }
        };

        // Stage 4: duration, used only as a lookup parameter. A
        // missing duration does not fail the task.
        let duration_secs = match existing.duration_secs {
            Some(d) => d.round() as u64,
            None => {
                debug!(file = %path.display(), "Duration unavailable, using 0 for lookup");
                0
            }
        };

        // Stage 5: identity lookup, at most one attempt per run.
        let mut identity: Option<String> = None;
        let mut outcome = TagOutcome::Processed;
        if let Some(lookup) = &self.lookup {
            match lookup.lookup(&fingerprint.fingerprint, duration_secs).await {
                Ok(LookupOutcome::Matched { id, score }) => {
                    debug!(file = %path.display(), identity = %id, score, "Identity resolved");
                    identity = Some(id);
                }
                Ok(LookupOutcome::NoResults) => {
                    info!(file = %path.display(), "No identity match for fingerprint");
                    outcome = TagOutcome::NoResults;
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Identity lookup failed");
                    return TagResult {
                        outcome: TagOutcome::LookupFailed,
                        error: Some(e.to_string()),
                    };
                }
            }
        }

        // Stage 6: dry-run short-circuit. The codec's save path is
        // never reached.
        if dry_run {
            match &identity {
                Some(id) => {
                    info!(file = %path.display(), identity = %id, "Dry run: would write fingerprint and identity")
                }
                None => info!(file = %path.display(), "Dry run: would write fingerprint"),
            }
            return TagResult::ok(outcome);
        }

        // Stage 7: atomic write. A late failure overrides any earlier
        // non-failing status.
        match self
            .codec
            .write_identity(path, &fingerprint.fingerprint, identity.as_deref())
        {
            Ok(()) => TagResult::ok(outcome),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Tag write failed");
                TagResult::failed(e.to_string())
            }
        }
    }
}

//! Outcome aggregation and run summary
//!
//! Purely additive counters, one `record` per task. The identity
//! counters are keyed by the closed [`TagOutcome`] enumeration and
//! matched exhaustively, so a new outcome variant fails to compile
//! until every consumer handles it.

use crate::types::{ProcessingResult, TagOutcome};
use std::fmt::Write as _;

/// Aggregate counters over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeTally {
    /// Total tasks recorded
    pub total: usize,

    // Identity-tagging outcomes
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub lookup_failed: usize,
    pub no_results: usize,

    // Pipeline-level counters for stages that carry no identity status
    pub encoded: usize,
    pub encode_failures: usize,
    pub gain_applied: usize,
    pub failures: usize,
}

impl OutcomeTally {
    /// Tally one identity-tagging status.
    pub fn increment(&mut self, outcome: TagOutcome) {
        match outcome {
            TagOutcome::Processed => self.processed += 1,
            TagOutcome::Skipped => self.skipped += 1,
            TagOutcome::Failed => self.failed += 1,
            TagOutcome::LookupFailed => self.lookup_failed += 1,
            TagOutcome::NoResults => self.no_results += 1,
        }
    }

    pub fn increment_success(&mut self) {
        self.increment(TagOutcome::Processed);
    }

    pub fn increment_skipped(&mut self) {
        self.increment(TagOutcome::Skipped);
    }

    pub fn increment_failed(&mut self) {
        self.failures += 1;
    }

    pub fn increment_encode_failure(&mut self) {
        self.encode_failures += 1;
    }

    /// Tally one task's result. Write-once: the caller records each
    /// result exactly once, and nothing ever decrements.
    pub fn record(&mut self, result: &ProcessingResult) {
        self.total += 1;

        if result.output.is_some() {
            self.encoded += 1;
        }
        if result.encode_error.is_some() {
            self.encode_failures += 1;
        }
        if result.gain_applied {
            self.gain_applied += 1;
        }
        if let Some(outcome) = result.tag_outcome {
            self.increment(outcome);
        }
    }

    /// Sum of the five identity status counters.
    pub fn identity_total(&self) -> usize {
        self.processed + self.skipped + self.failed + self.lookup_failed + self.no_results
    }

    /// Render the aggregate report.
    pub fn summary(&self, dry_run: bool) -> String {
        let mut out = String::new();
        if dry_run {
            let _ = writeln!(out, "Summary (dry run, nothing was written):");
        } else {
            let _ = writeln!(out, "Summary:");
        }
        let _ = writeln!(out, "  files processed:   {}", self.total);
        let _ = writeln!(out, "  tagged:            {}", self.processed);
        let _ = writeln!(out, "  skipped (tagged):  {}", self.skipped);
        let _ = writeln!(out, "  no identity match: {}", self.no_results);
        let _ = writeln!(out, "  lookup failures:   {}", self.lookup_failed);
        let _ = writeln!(out, "  tagging failures:  {}", self.failed);
        let _ = writeln!(out, "  transcoded:        {}", self.encoded);
        let _ = writeln!(out, "  transcode errors:  {}", self.encode_failures);
        let _ = writeln!(out, "  album gain:        {}", self.gain_applied);
        if self.failures > 0 {
            let _ = writeln!(out, "  other failures:    {}", self.failures);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn result_with(outcome: Option<TagOutcome>) -> ProcessingResult {
        let mut result = ProcessingResult::new(PathBuf::from("/music/t.mp3"));
        result.tag_outcome = outcome;
        result
    }

    #[test]
    fn test_counters_sum_to_submitted_tasks() {
        let mut tally = OutcomeTally::default();
        let outcomes = [
            Some(TagOutcome::Processed),
            Some(TagOutcome::Processed),
            Some(TagOutcome::Skipped),
            Some(TagOutcome::Failed),
            Some(TagOutcome::LookupFailed),
            Some(TagOutcome::NoResults),
            None, // encode/gain-only task
        ];
        for outcome in outcomes {
            tally.record(&result_with(outcome));
        }

        assert_eq!(tally.total, 7);
        assert_eq!(tally.identity_total(), 6);
        assert_eq!(tally.processed, 2);
        assert_eq!(tally.skipped, 1);
        assert_eq!(tally.failed, 1);
        assert_eq!(tally.lookup_failed, 1);
        assert_eq!(tally.no_results, 1);
    }

    #[test]
    fn test_pipeline_counters() {
        let mut tally = OutcomeTally::default();

        let mut ok = ProcessingResult::new(PathBuf::from("/music/a.flac"));
        ok.output = Some(PathBuf::from("/out/a.ogg"));
        ok.gain_applied = true;
        tally.record(&ok);

        let mut rejected = ProcessingResult::new(PathBuf::from("/music/b.mp3"));
        rejected.encode_error = Some("lossy source".to_string());
        tally.record(&rejected);

        assert_eq!(tally.encoded, 1);
        assert_eq!(tally.encode_failures, 1);
        assert_eq!(tally.gain_applied, 1);
        assert_eq!(tally.identity_total(), 0);
    }

    #[test]
    fn test_summary_mentions_dry_run() {
        let tally = OutcomeTally::default();
        assert!(tally.summary(true).contains("dry run"));
        assert!(!tally.summary(false).contains("dry run"));
    }

    #[test]
    fn test_named_increments() {
        let mut tally = OutcomeTally::default();
        tally.increment_success();
        tally.increment_skipped();
        tally.increment_failed();
        tally.increment_encode_failure();

        assert_eq!(tally.processed, 1);
        assert_eq!(tally.skipped, 1);
        assert_eq!(tally.failures, 1);
        assert_eq!(tally.encode_failures, 1);
    }
}

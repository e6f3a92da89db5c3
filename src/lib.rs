//! tunesmith library interface
//!
//! Batch audio processing: album/singles classification, optional
//! transcoding, album loudness metadata, and fingerprint-based
//! identity tagging with a remote lookup service.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod pool;
pub mod report;
pub mod services;
pub mod tagger;
pub mod types;

pub use crate::error::{Error, Result};
pub use crate::pipeline::TrackPipeline;
pub use crate::pool::{process_batch, PoolError, PoolStatus, WorkerPool};
pub use crate::report::OutcomeTally;
pub use crate::tagger::IdentityTagger;
pub use crate::types::{
    AlbumGainData, ProcessingOptions, ProcessingResult, ProcessingTask, TagOutcome,
};

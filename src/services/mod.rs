//! Collaborator services and classification components

pub mod fingerprinter;
pub mod folder_analyzer;
pub mod format_classifier;
pub mod gain;
pub mod identity_client;
pub mod tag_codec;
pub mod transcoder;

pub use fingerprinter::{FingerprintGenerator, FpcalcRunner};
pub use folder_analyzer::Classification;
pub use format_classifier::FormatClassifier;
pub use gain::{GainCalculator, GainRunner};
pub use identity_client::{AcoustidClient, IdentityLookup};
pub use tag_codec::{LoftyCodec, TagCodec};
pub use transcoder::{FfmpegTranscoder, Transcoder};

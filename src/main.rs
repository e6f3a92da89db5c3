//! tunesmith - batch audio fingerprint tagger
//!
//! Walks the given files and directories, classifies them into albums
//! and singles, optionally transcodes and computes album loudness
//! metadata, fingerprints every track, resolves identities against a
//! remote lookup service, and writes the results back into the files.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tunesmith::config::{self, TomlConfig};
use tunesmith::pool::{self, ProgressCallback};
use tunesmith::services::folder_analyzer::{self, Classification};
use tunesmith::services::gain::{GainCalculator, GainRunner};
use tunesmith::services::{
    AcoustidClient, FfmpegTranscoder, FormatClassifier, FpcalcRunner, IdentityLookup, LoftyCodec,
    TagCodec,
};
use tunesmith::types::{AlbumGainData, ProcessingOptions, ProcessingTask};
use tunesmith::{IdentityTagger, OutcomeTally, TrackPipeline};

const DEFAULT_CONCURRENCY: usize = 4;

/// Command-line arguments for tunesmith
#[derive(Parser, Debug)]
#[command(name = "tunesmith")]
#[command(about = "Batch audio tagger: album classification, loudness metadata, fingerprint identification")]
#[command(version)]
struct Args {
    /// Files or directories to process
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Transcode lossless sources into the output directory
    #[arg(long)]
    encode: bool,

    /// Allow transcoding even when the source is lossy
    #[arg(long)]
    force_lossy: bool,

    /// Output directory for transcoded files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Mirror the input directory structure under the output directory
    #[arg(long)]
    preserve_structure: bool,

    /// Compute and apply album loudness metadata
    #[arg(long)]
    gain: bool,

    /// Skip fingerprinting and identity tagging
    #[arg(long)]
    no_tag: bool,

    /// Overwrite existing fingerprint/identity tags
    #[arg(short, long)]
    force: bool,

    /// Simulate the run without writing tags or files
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Only print warnings and the final summary
    #[arg(short, long)]
    quiet: bool,

    /// Identity service API key (falls back to TUNESMITH_API_KEY, then
    /// the config file)
    #[arg(long)]
    api_key: Option<String>,

    /// Treat matching directories as singles rather than albums
    #[arg(long = "singles", value_name = "PATTERN")]
    singles_patterns: Vec<String>,

    /// Maximum number of concurrently processed tracks
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.quiet {
        "tunesmith=warn"
    } else {
        "tunesmith=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let toml_config = match &args.config {
        Some(path) => config::load_toml_config(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TomlConfig::default(),
    };

    if args.encode && args.output_dir.is_none() {
        bail!("--encode requires --output-dir");
    }

    let classification = folder_analyzer::analyze(&args.inputs, &args.singles_patterns);
    if classification.is_empty() {
        bail!("no audio files found in the given inputs");
    }
    info!(
        albums = classification.albums.len(),
        singles = classification.singles.len(),
        files = classification.file_count(),
        "Classified inputs"
    );

    let api_key = config::resolve_api_key(args.api_key.as_deref(), &toml_config);
    let tag_identity = !args.no_tag;
    if tag_identity && api_key.is_none() {
        info!("No API key configured; fingerprinting without identity lookup");
    }

    let gain_data = if args.gain {
        compute_gain_stage(&classification, &toml_config, args.dry_run).await
    } else {
        AlbumGainData::default()
    };
    let gain_data = Arc::new(gain_data);

    let options = ProcessingOptions {
        encode: args.encode,
        force_lossy: args.force_lossy,
        output_dir: args.output_dir.clone(),
        preserve_structure: args.preserve_structure,
        compute_gain: args.gain,
        tag_identity,
        force: args.force,
        dry_run: args.dry_run,
        quiet: args.quiet,
    };

    let pipeline = Arc::new(build_pipeline(&toml_config, api_key)?);
    let tasks = build_tasks(&classification, &args.inputs, &options, gain_data);
    let total = tasks.len();

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight tracks");
            ctrl_c_cancel.cancel();
        }
    });

    let progress: Option<ProgressCallback> = if options.quiet {
        None
    } else {
        Some(Arc::new(|done: usize, total: usize, path: &Path| {
            info!("[{}/{}] {}", done, total, path.display());
        }))
    };

    let concurrency = args
        .concurrency
        .or(toml_config.concurrency)
        .unwrap_or(DEFAULT_CONCURRENCY);
    let results = pool::process_batch(pipeline, tasks, concurrency, cancel, progress).await;

    if results.len() < total {
        warn!(
            completed = results.len(),
            total, "Run interrupted before all tracks were processed"
        );
    }

    let mut tally = OutcomeTally::default();
    for result in &results {
        tally.record(result);
    }
    print!("{}", tally.summary(args.dry_run));

    Ok(())
}

/// Run the gain calculator once per album and once per single,
/// collecting per-file album gain data. Failures are per-item
/// warnings, never a batch abort.
async fn compute_gain_stage(
    classification: &Classification,
    toml_config: &TomlConfig,
    dry_run: bool,
) -> AlbumGainData {
    if dry_run {
        // The calculator writes loudness tags as a side effect, so a
        // simulation run must not invoke it at all.
        info!(
            albums = classification.albums.len(),
            singles = classification.singles.len(),
            "Dry run: skipping loudness analysis"
        );
        return AlbumGainData::default();
    }

    let mut runner = GainRunner::new();
    if let Some(command) = &toml_config.gain_command {
        runner = runner.with_command(command.as_str());
    }

    let mut data = AlbumGainData::default();
    for (dir, files) in &classification.albums {
        match runner.analyze_album(dir, files).await {
            Ok(album_data) => data.merge(album_data),
            Err(e) => {
                warn!(album = %dir.display(), error = %e, "Album gain analysis failed");
            }
        }
    }
    for single in &classification.singles {
        match runner.analyze_single(single).await {
            Ok(single_data) => data.merge(single_data),
            Err(e) => {
                warn!(file = %single.display(), error = %e, "Track gain analysis failed");
            }
        }
    }

    info!(files = data.len(), "Loudness analysis complete");
    data
}

fn build_pipeline(toml_config: &TomlConfig, api_key: Option<String>) -> Result<TrackPipeline> {
    let codec: Arc<dyn TagCodec> = Arc::new(LoftyCodec::new());

    let mut generator = FpcalcRunner::new();
    if let Some(command) = &toml_config.fingerprint_command {
        generator = generator.with_command(command.as_str());
    }

    let lookup: Option<Arc<dyn IdentityLookup>> = match api_key {
        Some(key) => Some(Arc::new(
            AcoustidClient::new(key).context("building identity lookup client")?,
        )),
        None => None,
    };

    let mut transcoder = FfmpegTranscoder::new();
    if let Some(command) = &toml_config.transcode_command {
        transcoder = transcoder.with_command(command.as_str());
    }

    let tagger = IdentityTagger::new(codec.clone(), Arc::new(generator), lookup);
    Ok(TrackPipeline::new(
        FormatClassifier::new(codec),
        Arc::new(transcoder),
        tagger,
    ))
}

/// Flatten the classification into tasks, attaching each file's input
/// root for structure mirroring and the shared gain data.
fn build_tasks(
    classification: &Classification,
    inputs: &[PathBuf],
    options: &ProcessingOptions,
    gain: Arc<AlbumGainData>,
) -> Vec<ProcessingTask> {
    let roots: Vec<&PathBuf> = inputs.iter().filter(|p| p.is_dir()).collect();
    let base_for = |file: &Path| -> Option<PathBuf> {
        roots
            .iter()
            .find(|root| file.starts_with(root))
            .map(|root| root.to_path_buf())
    };

    let mut tasks = Vec::with_capacity(classification.file_count());
    for files in classification.albums.values() {
        for file in files {
            let mut task = ProcessingTask::new(file.clone(), options.clone()).with_gain(gain.clone());
            if let Some(base) = base_for(file) {
                task = task.with_base_dir(base);
            }
            tasks.push(task);
        }
    }
    for file in &classification.singles {
        let mut task = ProcessingTask::new(file.clone(), options.clone()).with_gain(gain.clone());
        if let Some(base) = base_for(file) {
            task = task.with_base_dir(base);
        }
        tasks.push(task);
    }
    tasks
}

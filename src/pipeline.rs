//! Batch directory conversion.
//!
//! Walks one source directory (non-recursive), picks out files whose
//! extension is on the recognized raster allow-list, and runs each through
//! the size-targeted encoder. Output filenames are the source stem with
//! the canonical `.avif` extension, so `photo.JPG` becomes `photo.avif`.
//!
//! ## Per-file isolation
//!
//! One broken image never stops the batch: a missing, undecodable or
//! unencodable source is recorded as a [`ConversionResult::Failed`] for
//! that file and processing moves on. The batch itself only fails on
//! directory-level problems (unreadable source dir, uncreatable
//! destination).
//!
//! ## Parallelism
//!
//! Files are converted on the rayon pool. Two invariants make that safe:
//! scratch paths are derived from source filenames (unique within the
//! directory, see [`encoder::scratch_path_for`]), and every report row
//! carries its source filename, so ordering carries no meaning. Entries
//! are sorted before dispatch and reports are collected in that same
//! order, which keeps re-runs deterministic.

use crate::codec::{self, AvifCodec, Codec};
use crate::encoder::{self, EncodeError, EncodeTarget, Encoded, QualityPolicy};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of converting one source file. Exactly one of these exists per
/// input, and it never changes after the conversion finishes.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionResult {
    /// Encoded within the ceiling (or no ceiling was set); file written.
    Success { quality: u32, size_bytes: u64 },
    /// Search budget ran out above the ceiling; the last attempt was kept.
    SizeUnmet { quality: u32, size_bytes: u64 },
    /// Nothing was written for this file.
    Failed { error: String },
}

/// One report row: which source, which output name, what happened.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub filename: String,
    pub output: String,
    pub result: ConversionResult,
}

/// Everything one batch run needs, passed in explicitly — there is no
/// process-wide configuration.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub target: EncodeTarget,
    pub policy: QualityPolicy,
}

/// Convert every recognized image in `source_dir` with the production
/// AVIF codec.
pub fn run(options: &BatchOptions) -> Result<Vec<FileReport>, PipelineError> {
    run_with_codec(&AvifCodec::new(), options)
}

/// Convert using a specific codec (allows testing with a mock).
pub fn run_with_codec(
    codec: &impl Codec,
    options: &BatchOptions,
) -> Result<Vec<FileReport>, PipelineError> {
    fs::create_dir_all(&options.dest_dir)?;

    let mut sources: Vec<PathBuf> = fs::read_dir(&options.source_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_source_extension(p))
        .collect();
    sources.sort();

    Ok(sources
        .par_iter()
        .map(|source| convert_one(codec, source, options))
        .collect())
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(codec::is_source_extension)
}

/// Destination filename: source stem with the canonical extension.
fn output_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    format!("{stem}.{}", codec::CANONICAL_EXTENSION)
}

fn convert_one(codec: &impl Codec, source: &Path, options: &BatchOptions) -> FileReport {
    let filename = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let output = output_name(source);

    let result = match convert_inner(codec, source, &output, options) {
        Ok(Encoded {
            quality,
            size_bytes,
            met_ceiling: true,
        }) => ConversionResult::Success {
            quality,
            size_bytes,
        },
        Ok(Encoded {
            quality,
            size_bytes,
            met_ceiling: false,
        }) => ConversionResult::SizeUnmet {
            quality,
            size_bytes,
        },
        Err(e) => ConversionResult::Failed {
            error: e.to_string(),
        },
    };

    FileReport {
        filename,
        output,
        result,
    }
}

fn convert_inner(
    codec: &impl Codec,
    source: &Path,
    output: &str,
    options: &BatchOptions,
) -> Result<Encoded, EncodeError> {
    if !source.exists() {
        return Err(EncodeError::InputNotFound(source.to_path_buf()));
    }
    let image = codec.decode(source)?;
    let scratch = encoder::scratch_path_for(&options.dest_dir, source);
    let dest = options.dest_dir.join(output);
    encoder::encode_to_size(codec, &image, &options.target, &options.policy, scratch, &dest)
}

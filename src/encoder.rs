//! Size-targeted AVIF encoding.
//!
//! The heart of the converter: given a decoded raster, a target geometry
//! and an optional byte ceiling, produce one AVIF file that fits the
//! ceiling at the highest quality a bounded search can find.
//!
//! ## The search loop
//!
//! The raster is resampled to the exact target dimensions **once** and the
//! resampled copy is reused for every attempt. The loop then walks the
//! quality knob downward:
//!
//! ```text
//! quality = start
//! loop:
//!     encode resampled raster → scratch file, measure
//!     fits the ceiling?            → promote scratch, done (success)
//!     at the floor, or attempts
//!     exhausted?                   → promote scratch anyway (ceiling unmet)
//!     otherwise                    → quality -= step (clamped to floor), retry
//! ```
//!
//! Each attempt truncates and rewrites the same scratch file, so the file
//! always holds the **most recent** attempt — the lowest quality tried so
//! far, not the smallest of all attempts. When the ceiling is unreachable,
//! that last attempt is what gets kept: a best-effort result rather than
//! nothing.
//!
//! The quality floor is tried at most once. A step that would land below
//! the floor is clamped onto it, and an oversized attempt *at* the floor
//! ends the search.
//!
//! ## Scratch discipline
//!
//! Attempts never touch the destination path. They go to a scratch file
//! guard that removes itself unless promoted, so the destination either holds a
//! complete previous file or a complete new one — never a partial write,
//! never an abandoned oversized attempt. A codec error on any attempt
//! abandons the conversion immediately; the guard deletes the scratch and
//! nothing appears at the destination.

use crate::codec::{Codec, CodecError};
use image::DynamicImage;
use image::imageops::FilterType;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("source image not found: {0}")]
    InputNotFound(PathBuf),
    #[error("codec failure: {0}")]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Quality-search policy: where the walk starts, where it stops, how fast
/// it descends, and how many encodes it may spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPolicy {
    pub start: u32,
    pub floor: u32,
    pub step: u32,
    pub max_attempts: u32,
}

impl QualityPolicy {
    /// Build a policy with all values forced into a usable range:
    /// qualities into 1–100 with `floor <= start`, step and attempts >= 1.
    pub fn new(start: u32, floor: u32, step: u32, max_attempts: u32) -> Self {
        let start = start.clamp(1, 100);
        Self {
            start,
            floor: floor.clamp(1, start),
            step: step.max(1),
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            start: 80,
            floor: 20,
            step: 5,
            max_attempts: 15,
        }
    }
}

/// Output geometry and optional size ceiling for one conversion.
#[derive(Debug, Clone, Copy)]
pub struct EncodeTarget {
    /// Exact output width in pixels (no aspect-ratio inference).
    pub width: u32,
    /// Exact output height in pixels.
    pub height: u32,
    /// Maximum acceptable encoded size in bytes. `None` disables the
    /// search: one encode at the policy's start quality.
    pub size_ceiling: Option<u64>,
}

/// What one finished conversion produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoded {
    /// Quality of the attempt that was promoted to the destination.
    pub quality: u32,
    /// Size of the promoted file in bytes.
    pub size_bytes: u64,
    /// False when the search ran out of budget above the ceiling and the
    /// last attempt was kept anyway.
    pub met_ceiling: bool,
}

/// Scratch path for a conversion, derived from the *source* filename so
/// that no two in-flight conversions can collide — even two sources whose
/// stems map to the same destination name.
pub fn scratch_path_for(dest_dir: &Path, source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest_dir.join(format!(".{name}.tmp"))
}

/// Temporary encode target that deletes itself unless promoted.
struct ScratchFile {
    path: PathBuf,
    promoted: bool,
}

impl ScratchFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            promoted: false,
        }
    }

    /// Truncate the scratch file, encode one attempt into it, and return
    /// the resulting size on disk.
    fn write_attempt(
        &self,
        codec: &impl Codec,
        image: &DynamicImage,
        quality: u32,
    ) -> Result<u64, EncodeError> {
        let file = fs::File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        codec.encode(image, quality, &mut writer)?;
        writer.flush()?;
        Ok(fs::metadata(&self.path)?.len())
    }

    /// Move the scratch file onto the destination path in one rename.
    fn promote(mut self, dest: &Path) -> Result<(), EncodeError> {
        fs::rename(&self.path, dest)?;
        self.promoted = true;
        Ok(())
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.promoted {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Resample `image` to the target dimensions and encode it under the size
/// ceiling, staging attempts at `scratch_path` and promoting the winner to
/// `dest`.
///
/// Returns the promoted attempt's quality and size; `met_ceiling` reports
/// whether the ceiling was actually reached. On error nothing exists at
/// `dest` or `scratch_path`.
pub fn encode_to_size(
    codec: &impl Codec,
    image: &DynamicImage,
    target: &EncodeTarget,
    policy: &QualityPolicy,
    scratch_path: PathBuf,
    dest: &Path,
) -> Result<Encoded, EncodeError> {
    let resampled = image.resize_exact(target.width, target.height, FilterType::Lanczos3);
    let scratch = ScratchFile::new(scratch_path);

    let Some(ceiling) = target.size_ceiling else {
        let size_bytes = scratch.write_attempt(codec, &resampled, policy.start)?;
        scratch.promote(dest)?;
        return Ok(Encoded {
            quality: policy.start,
            size_bytes,
            met_ceiling: true,
        });
    };

    let mut quality = policy.start;
    let mut attempts = 0;
    loop {
        let size_bytes = scratch.write_attempt(codec, &resampled, quality)?;
        attempts += 1;

        if size_bytes <= ceiling {
            scratch.promote(dest)?;
            return Ok(Encoded {
                quality,
                size_bytes,
                met_ceiling: true,
            });
        }

        if quality == policy.floor || attempts >= policy.max_attempts {
            // Budget exhausted: keep the last attempt rather than nothing.
            scratch.promote(dest)?;
            return Ok(Encoded {
                quality,
                size_bytes,
                met_ceiling: false,
            });
        }

        quality = quality.saturating_sub(policy.step).max(policy.floor);
    }
}

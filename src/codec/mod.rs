//! Image decode and AVIF encode — pure Rust, zero external dependencies.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `image` crate (pure Rust decoders) |
//! | Decode (AVIF) | `avif-parse` (container) + `rav1d` (AV1 decode) + custom YUV→RGB |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//!
//! The [`Codec`] trait is the seam between pixel work and everything above
//! it: the size-search loop in [`encoder`](crate::encoder) and the batch
//! logic in [`pipeline`](crate::pipeline) only ever talk to a `Codec`, so
//! their tests swap in a recording mock instead of paying for rav1e.

pub mod decode;
pub mod encode;

use image::DynamicImage;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Extension every converted image is written with.
pub const CANONICAL_EXTENSION: &str = "avif";

/// Source extensions the batch pipeline accepts, compared case-insensitively.
pub const SOURCE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif"];

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Returns true when `ext` names a recognized source format.
pub fn is_source_extension(ext: &str) -> bool {
    SOURCE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e))
}

/// Trait for the decode/encode pair every conversion needs.
///
/// `Sync` so a single codec instance can be shared across rayon workers.
pub trait Codec: Sync {
    /// Decode a source image from disk into an in-memory raster.
    fn decode(&self, path: &Path) -> Result<DynamicImage, CodecError>;

    /// Encode `image` at the given quality (1–100) into `writer`.
    fn encode(
        &self,
        image: &DynamicImage,
        quality: u32,
        writer: &mut dyn Write,
    ) -> Result<(), CodecError>;
}

/// Production codec backed by the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct AvifCodec;

impl AvifCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AvifCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for AvifCodec {
    fn decode(&self, path: &Path) -> Result<DynamicImage, CodecError> {
        decode::load_image(path)
    }

    fn encode(
        &self,
        image: &DynamicImage,
        quality: u32,
        writer: &mut dyn Write,
    ) -> Result<(), CodecError> {
        encode::write_avif(image, quality, writer)
    }
}

//! AVIF encoding via the `image` crate's rav1e-backed encoder.

use super::CodecError;
use image::DynamicImage;
use image::codecs::avif::AvifEncoder;
use std::io::Write;

/// rav1e speed preset: 6 trades a little density for reasonable throughput.
const ENCODER_SPEED: u8 = 6;

/// Encode `image` into `writer` as AVIF at the given quality (1–100).
pub fn write_avif(
    image: &DynamicImage,
    quality: u32,
    writer: &mut dyn Write,
) -> Result<(), CodecError> {
    let quality = quality.clamp(1, 100) as u8;
    let encoder = AvifEncoder::new_with_speed_quality(writer, ENCODER_SPEED, quality);
    image
        .write_with_encoder(encoder)
        .map_err(|e| CodecError::Encode(format!("AVIF encode failed: {e}")))
}

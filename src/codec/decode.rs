//! Source image decoding.
//!
//! JPEG, PNG, GIF and WebP go through the `image` crate's pure Rust
//! decoders. AVIF is special-cased: the `image` crate's `"avif"` feature
//! only enables the **encoder** (rav1e); decoding requires `"avif-native"`,
//! a C library we don't link. Instead the container is parsed with
//! `avif-parse` and the AV1 payload is decoded with `rav1d` (pure Rust port
//! of dav1d), followed by a BT.601 YUV→RGB conversion.

use super::CodecError;
use image::{DynamicImage, ImageReader};
use std::path::Path;

fn is_avif(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("avif"))
}

/// Load and decode a source image from disk.
pub fn load_image(path: &Path) -> Result<DynamicImage, CodecError> {
    if is_avif(path) {
        return decode_avif(path);
    }
    ImageReader::open(path)
        .map_err(CodecError::Io)?
        .decode()
        .map_err(|e| CodecError::Decode(format!("failed to decode {}: {e}", path.display())))
}

/// Decode an AVIF file: `avif-parse` for the container, `rav1d` for the AV1
/// primary item.
fn decode_avif(path: &Path) -> Result<DynamicImage, CodecError> {
    let raw = std::fs::read(path).map_err(CodecError::Io)?;
    let container = avif_parse::read_avif(&mut std::io::Cursor::new(&raw)).map_err(|e| {
        CodecError::Decode(format!("failed to parse AVIF {}: {e:?}", path.display()))
    })?;
    decode_av1_frame(&container.primary_item)
}

/// Decode a single AV1 still frame through rav1d.
///
/// The decoder context, input buffer and output picture are all released
/// before this function returns, on success and on every failure path.
fn decode_av1_frame(av1: &[u8]) -> Result<DynamicImage, CodecError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use std::ptr::NonNull;

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    unsafe {
        rav1d::src::lib::dav1d_default_settings(NonNull::new(settings.as_mut_ptr()).unwrap())
    };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc =
        unsafe { rav1d::src::lib::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(CodecError::Decode(format!(
            "AV1 decoder init failed ({})",
            rc.0
        )));
    }

    // Copy the frame into a decoder-owned buffer
    let mut data = Dav1dData::default();
    let buf = unsafe { rav1d::src::lib::dav1d_data_create(NonNull::new(&mut data), av1.len()) };
    if buf.is_null() {
        unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(CodecError::Decode(
            "AV1 frame buffer allocation failed".into(),
        ));
    }
    unsafe { std::ptr::copy_nonoverlapping(av1.as_ptr(), buf, av1.len()) };

    let rc = unsafe { rav1d::src::lib::dav1d_send_data(ctx, NonNull::new(&mut data)) };
    if rc.0 != 0 {
        unsafe {
            rav1d::src::lib::dav1d_data_unref(NonNull::new(&mut data));
            rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
        }
        return Err(CodecError::Decode(format!("AV1 frame rejected ({})", rc.0)));
    }

    let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
    let rc = unsafe { rav1d::src::lib::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
    if rc.0 != 0 {
        unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(CodecError::Decode(format!(
            "AV1 picture unavailable ({})",
            rc.0
        )));
    }

    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let rgb = rgb_from_picture(&pic);

    unsafe {
        rav1d::src::lib::dav1d_picture_unref(NonNull::new(&mut pic));
        rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
    }

    image::RgbImage::from_raw(width, height, rgb?)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| CodecError::Decode("decoded AV1 plane sizes are inconsistent".into()))
}

/// Raw view of one decoded plane. `sample` handles both 8-bit and 16-bit
/// (10/12 bpc) storage.
struct PlaneView {
    ptr: *const u8,
    stride: isize,
}

impl PlaneView {
    #[inline]
    fn sample(&self, x: u32, y: u32, bpc: u32) -> f32 {
        if bpc <= 8 {
            (unsafe { *self.ptr.offset(y as isize * self.stride + x as isize) }) as f32
        } else {
            let offset = y as isize * self.stride + x as isize * 2;
            (unsafe { *(self.ptr.offset(offset) as *const u16) }) as f32
        }
    }
}

/// Convert a decoded picture's YUV planes to interleaved RGB8 using BT.601
/// coefficients, scaling 10/12-bit samples down to 8-bit.
fn rgb_from_picture(
    pic: &rav1d::include::dav1d::picture::Dav1dPicture,
) -> Result<Vec<u8>, CodecError> {
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };

    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let bpc = pic.p.bpc as u32;
    let layout = pic.p.layout;

    // (chroma subsampled horizontally, vertically, luma-only)
    let (ss_x, ss_y, monochrome) = if layout == DAV1D_PIXEL_LAYOUT_I400 {
        (false, false, true)
    } else if layout == DAV1D_PIXEL_LAYOUT_I420 {
        (true, true, false)
    } else if layout == DAV1D_PIXEL_LAYOUT_I422 {
        (true, false, false)
    } else if layout == DAV1D_PIXEL_LAYOUT_I444 {
        (false, false, false)
    } else {
        return Err(CodecError::Decode(format!(
            "unsupported AVIF pixel layout: {layout}"
        )));
    };

    let luma = PlaneView {
        ptr: pic.data[0].unwrap().as_ptr() as *const u8,
        stride: pic.stride[0],
    };
    let chroma = if monochrome {
        None
    } else {
        Some((
            PlaneView {
                ptr: pic.data[1].unwrap().as_ptr() as *const u8,
                stride: pic.stride[1],
            },
            PlaneView {
                ptr: pic.data[2].unwrap().as_ptr() as *const u8,
                stride: pic.stride[1],
            },
        ))
    };

    let max_val = ((1u32 << bpc) - 1) as f32;
    let scale = 255.0 / max_val;
    let center = (1u32 << (bpc - 1)) as f32;

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for row in 0..height {
        for col in 0..width {
            let y = luma.sample(col, row, bpc);
            let (r, g, b) = match &chroma {
                Some((cb, cr)) => {
                    let cx = if ss_x { col / 2 } else { col };
                    let cy = if ss_y { row / 2 } else { row };
                    let u = cb.sample(cx, cy, bpc) - center;
                    let v = cr.sample(cx, cy, bpc) - center;
                    (
                        (y + 1.402 * v) * scale,
                        (y - 0.344136 * u - 0.714136 * v) * scale,
                        (y + 1.772 * u) * scale,
                    )
                }
                None => {
                    let g = y * scale;
                    (g, g, g)
                }
            };
            rgb.push(r.clamp(0.0, 255.0) as u8);
            rgb.push(g.clamp(0.0, 255.0) as u8);
            rgb.push(b.clamp(0.0, 255.0) as u8);
        }
    }

    Ok(rgb)
}

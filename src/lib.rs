//! # avif-press
//!
//! A batch re-encoder for web galleries: takes a directory of photos in
//! whatever formats they arrived in, and produces uniform AVIF files that
//! each fit under a byte budget. A companion `export` command turns a
//! SQL-defined table into the matching gallery index, deriving the image
//! filename each row points at.
//!
//! # Architecture: Two Independent Commands
//!
//! ```text
//! convert   source_dir/  →  dest_dir/*.avif         (resample + size-targeted encode)
//! export    schema.sql + data.sql  →  keys.txt + gallery.json
//! ```
//!
//! The two commands share nothing but filesystem conventions: `convert`
//! writes `<stem>.avif` files, and `export` derives `image_path` values
//! ending in `.avif` so the index lines up with the converted assets.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`codec`] | Decode (JPEG/PNG/GIF/WebP/AVIF) and encode (AVIF) behind the [`codec::Codec`] seam |
//! | [`encoder`] | Size-targeted encoding: one resample, then a bounded descending-quality search |
//! | [`pipeline`] | Batch directory conversion: enumerate, filter, convert, report per file |
//! | [`export`] | SQL → gallery index: ephemeral SQLite store, sanitized join keys, JSON artifact |
//! | [`output`] | CLI report formatting — pure `format_*` functions, thin `print_*` wrappers |
//!
//! # Design Decisions
//!
//! ## AVIF-Only Output
//!
//! Every converted image is AVIF, regardless of the source format. The
//! format has had [100% browser support since September 2023](https://caniuse.com/avif)
//! and compresses far below JPEG at equivalent quality, which is what makes
//! a 50 KB-per-image gallery budget realistic in the first place. One
//! output format also keeps destination directories trivially predictable:
//! source stem + `.avif`, nothing else.
//!
//! ## Quality Search, Not Rate Control
//!
//! Hitting a byte ceiling with AVIF is done the blunt way: encode, measure,
//! lower the quality knob, repeat. There is no rate-distortion model and no
//! perceptual metric — just a monotonic walk from a start quality down to a
//! floor, bounded by a maximum attempt count. See [`encoder`] for the exact
//! loop contract, including what gets kept when the budget is unreachable.
//!
//! ## Scratch-Then-Rename
//!
//! No encode attempt ever touches a destination path directly. Attempts go
//! to a scratch file next to the destination and the winner is promoted
//! with a single `rename`, so a reader of the destination directory can
//! never observe a half-written or oversized file. The scratch file cleans
//! itself up on every exit path, including codec failures.
//!
//! ## Pure-Rust Imaging (No ImageMagick, No FFmpeg)
//!
//! The [`codec`] module uses the `image` crate (Lanczos3 resampling, rav1e
//! AVIF encoding) plus `avif-parse`/`rav1d` for AVIF input — all pure Rust,
//! statically linked. No `apt install`, no Homebrew, no version conflicts:
//! the binary can be dropped onto any machine that hosts the gallery build.
//!
//! ## Ephemeral Export Store
//!
//! The `export` command executes the schema and data scripts against an
//! in-memory SQLite database that lives exactly as long as one run. There
//! is no database file to manage or migrate; the SQL scripts are the source
//! of truth and the store is rebuilt from them every time.

pub mod codec;
pub mod encoder;
pub mod export;
pub mod output;
pub mod pipeline;

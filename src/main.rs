use avif_press::encoder::{EncodeTarget, QualityPolicy};
use avif_press::export::ExportOptions;
use avif_press::pipeline::BatchOptions;
use avif_press::{export, output, pipeline};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "avif-press")]
#[command(about = "Batch image-to-AVIF converter with a per-file size ceiling")]
#[command(long_about = "\
Batch image-to-AVIF converter with a per-file size ceiling

convert re-encodes every recognized image in a source directory
(jpg, jpeg, png, gif, webp, avif — case-insensitive) to AVIF at exact
output dimensions. With --target-size-kb each file is encoded repeatedly
at descending quality until it fits the ceiling; the search is bounded by
a quality floor and a maximum attempt count, and when the ceiling is
unreachable the last (lowest-quality) attempt is kept as a best effort.

export rebuilds a table from a schema script and a data script in an
in-memory SQLite store, then writes a plain-text listing of per-row
filesystem-safe keys and a JSON gallery index in which every row carries
an image_path pointing at the matching converted .avif file.

  avif-press convert --source shoot/ --dest site/img --width 1280 --height 720 --target-size-kb 50
  avif-press export --schema create_template.sql --data data.sql --table quotes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Re-encode a directory of images to AVIF, optionally under a size ceiling
    Convert(ConvertArgs),
    /// Export a SQL-defined table to a key listing and a JSON gallery index
    Export(ExportArgs),
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// Directory of source images
    #[arg(long, default_value = "input_img")]
    source: PathBuf,

    /// Directory for converted images (created if absent)
    #[arg(long, default_value = "output_img")]
    dest: PathBuf,

    /// Exact output width in pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Exact output height in pixels
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Per-file size ceiling in kilobytes; omit to encode once at the start quality
    #[arg(long)]
    target_size_kb: Option<u64>,

    /// Quality the search starts from
    #[arg(long, default_value_t = 80)]
    start_quality: u32,

    /// Quality floor the search will not go below
    #[arg(long, default_value_t = 20)]
    min_quality: u32,

    /// Quality decrement after each oversized attempt
    #[arg(long, default_value_t = 5)]
    quality_step: u32,

    /// Maximum encode attempts per file
    #[arg(long, default_value_t = 15)]
    max_attempts: u32,

    /// Worker threads (defaults to the number of cores)
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(clap::Args)]
struct ExportArgs {
    /// SQL script with the CREATE statements
    #[arg(long, default_value = "create_template.sql")]
    schema: PathBuf,

    /// SQL script with the INSERT statements
    #[arg(long, default_value = "data.sql")]
    data: PathBuf,

    /// Table to export
    #[arg(long)]
    table: String,

    /// Zero-based column index left out of the join keys
    #[arg(long, default_value_t = 9)]
    exclude_column: usize,

    /// Output path for the newline-joined key listing
    #[arg(long, default_value = "stripped_elements.txt")]
    keys_out: PathBuf,

    /// Output path for the JSON gallery index
    #[arg(long, default_value = "quotes.json")]
    json_out: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Convert(args) => {
            init_thread_pool(args.threads);
            let options = BatchOptions {
                source_dir: args.source,
                dest_dir: args.dest,
                target: EncodeTarget {
                    width: args.width,
                    height: args.height,
                    size_ceiling: args.target_size_kb.map(|kb| kb * 1024),
                },
                policy: QualityPolicy::new(
                    args.start_quality,
                    args.min_quality,
                    args.quality_step,
                    args.max_attempts,
                ),
            };
            let reports = pipeline::run(&options)?;
            output::print_conversion_report(&reports, options.target.size_ceiling);
        }
        Command::Export(args) => {
            let options = ExportOptions {
                schema_path: args.schema,
                data_path: args.data,
                table: args.table,
                excluded_column: args.exclude_column,
                keys_path: args.keys_out,
                json_path: args.json_out,
            };
            // Any export failure is fatal: propagate for a non-zero exit.
            let summary = export::export(&options)?;
            output::print_export_summary(&summary);
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool for the convert command.
///
/// Caps at the number of available CPU cores — the flag can constrain
/// down, not up.
fn init_thread_pool(threads: Option<usize>) {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let threads = threads.unwrap_or(cores).clamp(1, cores);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

//! CLI output formatting for both commands.
//!
//! Every outcome is reported against its identifying filename (or row
//! count, for the export) together with the achieved state — quality and
//! size where a file was written, the error otherwise:
//!
//! ```text
//! photo-01.jpg → photo-01.avif  q=60 44.9 KB
//! photo-02.png → photo-02.avif  q=20 61.2 KB (over 50.0 KB ceiling, kept last attempt)
//! corrupt.gif  failed: codec failure: decode failed: ...
//!
//! 1 converted, 1 over ceiling, 1 failed
//! ```
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure — no I/O, no side effects.

use crate::export::ExportSummary;
use crate::pipeline::{ConversionResult, FileReport};

fn format_kb(bytes: u64) -> String {
    format!("{:.1} KB", bytes as f64 / 1024.0)
}

/// Format the per-file rows plus a one-line summary for a batch run.
pub fn format_conversion_report(
    reports: &[FileReport],
    size_ceiling: Option<u64>,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut converted = 0usize;
    let mut over = 0usize;
    let mut failed = 0usize;

    for report in reports {
        match &report.result {
            ConversionResult::Success {
                quality,
                size_bytes,
            } => {
                converted += 1;
                lines.push(format!(
                    "{} → {}  q={} {}",
                    report.filename,
                    report.output,
                    quality,
                    format_kb(*size_bytes)
                ));
            }
            ConversionResult::SizeUnmet {
                quality,
                size_bytes,
            } => {
                over += 1;
                let ceiling = size_ceiling.map(format_kb).unwrap_or_default();
                lines.push(format!(
                    "{} → {}  q={} {} (over {} ceiling, kept last attempt)",
                    report.filename,
                    report.output,
                    quality,
                    format_kb(*size_bytes),
                    ceiling
                ));
            }
            ConversionResult::Failed { error } => {
                failed += 1;
                lines.push(format!("{}  failed: {}", report.filename, error));
            }
        }
    }

    if !reports.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "{converted} converted, {over} over ceiling, {failed} failed"
    ));
    lines
}

pub fn print_conversion_report(reports: &[FileReport], size_ceiling: Option<u64>) {
    for line in format_conversion_report(reports, size_ceiling) {
        println!("{line}");
    }
}

/// Format the export run summary.
pub fn format_export_summary(summary: &ExportSummary) -> Vec<String> {
    vec![
        format!("{} rows exported", summary.rows),
        format!("keys → {}", summary.keys_path.display()),
        format!("index → {}", summary.json_path.display()),
    ]
}

pub fn print_export_summary(summary: &ExportSummary) {
    for line in format_export_summary(summary) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(filename: &str, result: ConversionResult) -> FileReport {
        FileReport {
            filename: filename.to_string(),
            output: filename.replace(".jpg", ".avif"),
            result,
        }
    }

    #[test]
    fn success_rows_show_quality_and_size() {
        let reports = vec![report(
            "a.jpg",
            ConversionResult::Success {
                quality: 60,
                size_bytes: 46_080,
            },
        )];

        let lines = format_conversion_report(&reports, Some(51_200));
        assert_eq!(lines[0], "a.jpg → a.avif  q=60 45.0 KB");
        assert_eq!(lines.last().unwrap(), "1 converted, 0 over ceiling, 0 failed");
    }

    #[test]
    fn unmet_rows_name_the_ceiling() {
        let reports = vec![report(
            "a.jpg",
            ConversionResult::SizeUnmet {
                quality: 20,
                size_bytes: 62_669,
            },
        )];

        let lines = format_conversion_report(&reports, Some(51_200));
        assert_eq!(
            lines[0],
            "a.jpg → a.avif  q=20 61.2 KB (over 50.0 KB ceiling, kept last attempt)"
        );
    }

    #[test]
    fn failed_rows_carry_the_error() {
        let reports = vec![report(
            "a.jpg",
            ConversionResult::Failed {
                error: "codec failure: boom".to_string(),
            },
        )];

        let lines = format_conversion_report(&reports, None);
        assert_eq!(lines[0], "a.jpg  failed: codec failure: boom");
        assert_eq!(lines.last().unwrap(), "0 converted, 0 over ceiling, 1 failed");
    }

    #[test]
    fn empty_batch_still_summarizes() {
        let lines = format_conversion_report(&[], None);
        assert_eq!(lines, vec!["0 converted, 0 over ceiling, 0 failed"]);
    }
}

//! Shared helpers for the mediaforge command line client.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use mediaforge_core::engine::ProgressEvent;
use mediaforge_core::fetcher::DownloadProgress;
use mediaforge_core::MediaFormat;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so stdout stays free for JSON output.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();
}

/// Format of `path` from its extension, unless given explicitly.
pub fn input_format(path: &Path, explicit: Option<&str>) -> Result<MediaFormat> {
    let raw = match explicit {
        Some(raw) => raw.to_string(),
        None => path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string)
            .with_context(|| format!("{} has no extension; pass --from", path.display()))?,
    };
    MediaFormat::from_extension(&raw).ok_or_else(|| anyhow!("Unknown format '{raw}'"))
}

/// Where to write each output buffer.
///
/// One buffer goes to `output` (or `<input stem>.<ext>`); several buffers get
/// a 1-based page suffix.
pub fn output_paths(
    input: &Path,
    output: Option<&Path>,
    to: MediaFormat,
    count: usize,
) -> Vec<PathBuf> {
    let base = output.map(Path::to_path_buf).unwrap_or_else(|| {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        input.with_file_name(format!("{stem}.{}", to.extension()))
    });

    if count <= 1 {
        return vec![base];
    }

    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let ext = base
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| to.extension().to_string());
    (1..=count)
        .map(|page| base.with_file_name(format!("{stem}-{page}.{ext}")))
        .collect()
}

/// One stderr line per conversion progress event.
pub fn conversion_progress_line(event: &ProgressEvent) -> String {
    let message = event
        .message
        .as_deref()
        .map(|m| format!(" {m}"))
        .unwrap_or_default();
    format!(
        "[{} #{}] {:>5.1}%{}",
        event.strategy, event.attempt, event.progress_percent, message
    )
}

/// Download progress as a percentage, or a byte count when the size is unknown.
pub fn download_progress_line(progress: &DownloadProgress) -> String {
    match progress.percent() {
        Some(percent) => format!("{percent:>5.1}%"),
        None => format!("{} bytes", progress.bytes_received),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaforge_core::ExecutionStrategy;

    #[test]
    fn test_conversion_progress_line() {
        let event = ProgressEvent {
            strategy: ExecutionStrategy::LocalDegraded,
            attempt: 2,
            progress_percent: 42.0,
            message: Some("decoding".to_string()),
        };
        assert_eq!(
            conversion_progress_line(&event),
            "[local-degraded #2]  42.0% decoding"
        );
    }

    #[test]
    fn test_download_progress_line() {
        let known = DownloadProgress {
            bytes_received: 50,
            total_bytes: Some(200),
            bytes_per_sec: 10.0,
            eta_secs: Some(15.0),
        };
        assert_eq!(download_progress_line(&known), " 25.0%");

        let unknown = DownloadProgress {
            total_bytes: None,
            eta_secs: None,
            ..known
        };
        assert_eq!(download_progress_line(&unknown), "50 bytes");
    }

    #[test]
    fn test_input_format_from_extension() {
        assert_eq!(
            input_format(Path::new("/tmp/photo.JPG"), None).unwrap(),
            MediaFormat::Jpeg
        );
        assert_eq!(
            input_format(Path::new("/tmp/data"), Some("csv")).unwrap(),
            MediaFormat::Csv
        );
        assert!(input_format(Path::new("/tmp/data"), None).is_err());
        assert!(input_format(Path::new("/tmp/a.xyz"), None).is_err());
    }

    #[test]
    fn test_single_output_defaults_next_to_input() {
        let paths = output_paths(Path::new("/tmp/in/photo.png"), None, MediaFormat::Webp, 1);
        assert_eq!(paths, vec![PathBuf::from("/tmp/in/photo.webp")]);
    }

    #[test]
    fn test_pages_get_numbered() {
        let paths = output_paths(
            Path::new("doc.pdf"),
            Some(Path::new("out/page.png")),
            MediaFormat::Png,
            3,
        );
        assert_eq!(
            paths,
            vec![
                PathBuf::from("out/page-1.png"),
                PathBuf::from("out/page-2.png"),
                PathBuf::from("out/page-3.png"),
            ]
        );
    }
}

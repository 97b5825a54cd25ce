//! PDF pages rendered locally with pdftoppm.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::raster::{decode, encode};
use super::{CodecRequest, LocalCodec};
use crate::engine::error::ConversionError;
use crate::engine::job::ConversionResult;
use crate::engine::progress::ProgressFn;
use crate::format::MediaFormat;
use crate::sandbox::SandboxDirectory;
use crate::transcoder::process::{run_binary, Invocation};

const PAGE_PREFIX: &str = "page";
const RENDER_DPI: &str = "150";

pub struct PdfRasterizer {
    pdftoppm: Option<PathBuf>,
    sandbox_root: PathBuf,
    timeout_secs: u64,
}

impl PdfRasterizer {
    /// `pdftoppm` is `None` when no local rasterizer was found.
    pub fn new(pdftoppm: Option<PathBuf>, sandbox_root: PathBuf, timeout_secs: u64) -> Self {
        Self {
            pdftoppm,
            sandbox_root,
            timeout_secs,
        }
    }

    async fn render(
        &self,
        pdftoppm: &Path,
        sandbox: &SandboxDirectory,
        request: &CodecRequest,
        progress: &ProgressFn<'_>,
    ) -> Result<Vec<Vec<u8>>, ConversionError> {
        let input = sandbox.file("input.pdf");
        tokio::fs::write(&input, &request.payload).await?;

        let args = vec![
            "-r".to_string(),
            RENDER_DPI.to_string(),
            "-png".to_string(),
            input.display().to_string(),
            sandbox.file(PAGE_PREFIX).display().to_string(),
        ];
        run_binary(Invocation::new(pdftoppm, args, self.timeout_secs), sandbox, |_| {}).await?;
        progress(50.0, Some("rendered"));

        let pages = page_files(sandbox.path()).await?;
        if pages.is_empty() {
            return Err(ConversionError::encode_failed("document has no pages"));
        }

        let total = pages.len();
        let mut buffers = Vec::with_capacity(total);
        for (index, page) in pages.iter().enumerate() {
            let png = tokio::fs::read(page).await?;
            let buffer = if request.to == MediaFormat::Png {
                png
            } else {
                encode(&decode(&png, MediaFormat::Png)?, request.to, request.quality)?
            };
            buffers.push(buffer);
            progress(50.0 + 45.0 * (index + 1) as f32 / total as f32, None);
        }

        Ok(buffers)
    }
}

/// Page number from names like `page-7.png` or `page-007.png`.
fn page_number(name: &str) -> Option<u32> {
    name.strip_prefix(PAGE_PREFIX)?
        .trim_start_matches('-')
        .strip_suffix(".png")?
        .parse()
        .ok()
}

async fn page_files(dir: &Path) -> Result<Vec<PathBuf>, ConversionError> {
    let mut pages = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(number) = page_number(&name) {
            pages.push((number, entry.path()));
        }
    }
    pages.sort_by_key(|(number, _)| *number);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

#[async_trait]
impl LocalCodec for PdfRasterizer {
    fn name(&self) -> &str {
        "pdf"
    }

    async fn convert(
        &self,
        request: CodecRequest,
        progress: &ProgressFn<'_>,
    ) -> Result<ConversionResult, ConversionError> {
        let pdftoppm = self
            .pdftoppm
            .as_deref()
            .ok_or_else(|| ConversionError::decode_unsupported("no local PDF rasterizer"))?;

        let sandbox = SandboxDirectory::create(&self.sandbox_root).await?;
        let result = self.render(pdftoppm, &sandbox, &request, progress).await;
        sandbox.close().await;

        result.map(|buffers| ConversionResult::Multiple { buffers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OperationKind;
    use bytes::Bytes;
    use tempfile::TempDir;

    fn no_progress(_: f32, _: Option<&str>) {}

    #[test]
    fn test_page_number() {
        assert_eq!(page_number("page-1.png"), Some(1));
        assert_eq!(page_number("page-012.png"), Some(12));
        assert_eq!(page_number("input.pdf"), None);
        assert_eq!(page_number("page-x.png"), None);
    }

    #[tokio::test]
    async fn test_without_rasterizer() {
        let root = TempDir::new().unwrap();
        let codec = PdfRasterizer::new(None, root.path().to_path_buf(), 10);
        let request = CodecRequest {
            kind: OperationKind::PaginatedDocument,
            from: MediaFormat::Pdf,
            to: MediaFormat::Png,
            payload: Bytes::from_static(b"%PDF-1.4"),
            quality: None,
        };

        let err = codec.convert(request, &no_progress).await.unwrap_err();
        assert!(matches!(err, ConversionError::DecodeUnsupported { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pages_returned_in_order() {
        use crate::testing::fixtures::png_fixture;
        use std::os::unix::fs::PermissionsExt;

        let bin = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();

        // Fake pdftoppm: copies three fixture pages next to the output prefix.
        let pages = TempDir::new().unwrap();
        for (n, side) in [(1, 2), (2, 3), (10, 4)] {
            std::fs::write(pages.path().join(format!("page-{n}.png")), png_fixture(side, side))
                .unwrap();
        }
        let script = bin.path().join("pdftoppm");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\neval out=\\${{$#}}\ncp {}/page-*.png \"$(dirname \"$out\")\"\n",
                pages.path().display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let codec = PdfRasterizer::new(Some(script), root.path().to_path_buf(), 10);
        let request = CodecRequest {
            kind: OperationKind::PaginatedDocument,
            from: MediaFormat::Pdf,
            to: MediaFormat::Png,
            payload: Bytes::from_static(b"%PDF-1.4"),
            quality: None,
        };

        let result = codec.convert(request, &no_progress).await.unwrap();
        let widths: Vec<u32> = result
            .buffers()
            .iter()
            .map(|b| image::load_from_memory(b).unwrap().width())
            .collect();
        assert_eq!(widths, vec![2, 3, 4]);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}

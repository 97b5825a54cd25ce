//! Raster conversions with the `image` crate.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use super::{CodecRequest, LocalCodec};
use crate::engine::error::ConversionError;
use crate::engine::job::ConversionResult;
use crate::engine::progress::ProgressFn;
use crate::format::MediaFormat;

const DEFAULT_JPEG_QUALITY: u8 = 85;
const ICO_MAX_SIDE: u32 = 256;

pub struct RasterCodec;

fn image_format(format: MediaFormat) -> Option<ImageFormat> {
    match format {
        MediaFormat::Png => Some(ImageFormat::Png),
        MediaFormat::Jpeg => Some(ImageFormat::Jpeg),
        MediaFormat::Webp => Some(ImageFormat::WebP),
        MediaFormat::Gif => Some(ImageFormat::Gif),
        MediaFormat::Bmp => Some(ImageFormat::Bmp),
        MediaFormat::Tiff => Some(ImageFormat::Tiff),
        MediaFormat::Ico => Some(ImageFormat::Ico),
        _ => None,
    }
}

pub(crate) fn decode(bytes: &[u8], from: MediaFormat) -> Result<DynamicImage, ConversionError> {
    let format = image_format(from)
        .ok_or_else(|| ConversionError::decode_unsupported(format!("no local decoder for {from}")))?;
    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ConversionError::decode_unsupported(format!("{from}: {e}")))
}

/// Encodes `img` as `to`. WebP output is lossless.
pub(crate) fn encode(
    img: &DynamicImage,
    to: MediaFormat,
    quality: Option<f32>,
) -> Result<Vec<u8>, ConversionError> {
    let format = image_format(to)
        .ok_or_else(|| ConversionError::decode_unsupported(format!("no local encoder for {to}")))?;

    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);

    let result = match to {
        MediaFormat::Jpeg => {
            let q = quality
                .map(|q| ((q * 100.0).round() as u8).clamp(1, 100))
                .unwrap_or(DEFAULT_JPEG_QUALITY);
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(JpegEncoder::new_with_quality(&mut cursor, q))
        }
        MediaFormat::Ico => {
            let icon = if img.width() > ICO_MAX_SIDE || img.height() > ICO_MAX_SIDE {
                img.thumbnail(ICO_MAX_SIDE, ICO_MAX_SIDE)
            } else {
                img.clone()
            };
            DynamicImage::ImageRgba8(icon.to_rgba8()).write_to(&mut cursor, format)
        }
        MediaFormat::Webp | MediaFormat::Gif | MediaFormat::Bmp => {
            DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut cursor, format)
        }
        _ => img.write_to(&mut cursor, format),
    };

    result.map_err(|e| ConversionError::encode_failed(format!("{to}: {e}")))?;
    Ok(buffer)
}

#[async_trait]
impl LocalCodec for RasterCodec {
    fn name(&self) -> &str {
        "raster"
    }

    async fn convert(
        &self,
        request: CodecRequest,
        progress: &ProgressFn<'_>,
    ) -> Result<ConversionResult, ConversionError> {
        let img = decode(&request.payload, request.from)?;
        progress(40.0, Some("decoded"));

        let buffer = encode(&img, request.to, request.quality)?;
        progress(90.0, Some("encoded"));

        Ok(ConversionResult::Single { buffer })
    }
}

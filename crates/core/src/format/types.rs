//! Closed set of formats known to the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::FormatError;

/// Every format the engine can accept or produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    // Raster images
    Png,
    Jpeg,
    Webp,
    Gif,
    Bmp,
    Tiff,
    Ico,
    Avif,
    Heic,
    // Paginated documents
    Pdf,
    // Proprietary camera raw
    Cr2,
    Nef,
    Arw,
    Dng,
    // Video
    Mp4,
    Webm,
    Mkv,
    Mov,
    Avi,
    // Audio
    Mp3,
    Wav,
    Ogg,
    Flac,
    M4a,
    Opus,
    // Tabular text
    Csv,
    Tsv,
    Json,
    // Compressed output
    Gz,
}

/// Broad grouping used to derive the operation kind of a format pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatFamily {
    Raster,
    Document,
    RawCamera,
    Video,
    Audio,
    Tabular,
    Archive,
}

impl MediaFormat {
    pub const ALL: [MediaFormat; 29] = [
        Self::Png,
        Self::Jpeg,
        Self::Webp,
        Self::Gif,
        Self::Bmp,
        Self::Tiff,
        Self::Ico,
        Self::Avif,
        Self::Heic,
        Self::Pdf,
        Self::Cr2,
        Self::Nef,
        Self::Arw,
        Self::Dng,
        Self::Mp4,
        Self::Webm,
        Self::Mkv,
        Self::Mov,
        Self::Avi,
        Self::Mp3,
        Self::Wav,
        Self::Ogg,
        Self::Flac,
        Self::M4a,
        Self::Opus,
        Self::Csv,
        Self::Tsv,
        Self::Json,
        Self::Gz,
    ];

    /// Parses a file extension (without the dot), accepting common aliases.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        let format = match ext.as_str() {
            "png" | "apng" => Self::Png,
            "jpg" | "jpeg" | "jfif" => Self::Jpeg,
            "webp" => Self::Webp,
            "gif" => Self::Gif,
            "bmp" => Self::Bmp,
            "tif" | "tiff" => Self::Tiff,
            "ico" => Self::Ico,
            "avif" => Self::Avif,
            "heic" | "heif" => Self::Heic,
            "pdf" => Self::Pdf,
            "cr2" => Self::Cr2,
            "nef" => Self::Nef,
            "arw" => Self::Arw,
            "dng" => Self::Dng,
            "mp4" | "m4v" => Self::Mp4,
            "webm" => Self::Webm,
            "mkv" => Self::Mkv,
            "mov" | "qt" => Self::Mov,
            "avi" => Self::Avi,
            "mp3" => Self::Mp3,
            "wav" | "wave" => Self::Wav,
            "ogg" | "oga" => Self::Ogg,
            "flac" => Self::Flac,
            "m4a" | "aac" => Self::M4a,
            "opus" => Self::Opus,
            "csv" => Self::Csv,
            "tsv" | "tab" => Self::Tsv,
            "json" => Self::Json,
            "gz" | "gzip" => Self::Gz,
            _ => return None,
        };
        Some(format)
    }

    /// Canonical file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
            Self::Ico => "ico",
            Self::Avif => "avif",
            Self::Heic => "heic",
            Self::Pdf => "pdf",
            Self::Cr2 => "cr2",
            Self::Nef => "nef",
            Self::Arw => "arw",
            Self::Dng => "dng",
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Mkv => "mkv",
            Self::Mov => "mov",
            Self::Avi => "avi",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Ogg => "ogg",
            Self::Flac => "flac",
            Self::M4a => "m4a",
            Self::Opus => "opus",
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Json => "json",
            Self::Gz => "gz",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Ico => "image/x-icon",
            Self::Avif => "image/avif",
            Self::Heic => "image/heic",
            Self::Pdf => "application/pdf",
            Self::Cr2 | Self::Nef | Self::Arw | Self::Dng => "application/octet-stream",
            Self::Mp4 => "video/mp4",
            Self::Webm => "video/webm",
            Self::Mkv => "video/x-matroska",
            Self::Mov => "video/quicktime",
            Self::Avi => "video/x-msvideo",
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Ogg => "audio/ogg",
            Self::Flac => "audio/flac",
            Self::M4a => "audio/mp4",
            Self::Opus => "audio/opus",
            Self::Csv => "text/csv",
            Self::Tsv => "text/tab-separated-values",
            Self::Json => "application/json",
            Self::Gz => "application/gzip",
        }
    }

    /// Maps a MIME type (parameters ignored) back to a format.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let format = match essence.as_str() {
            "image/png" | "image/apng" => Self::Png,
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/webp" => Self::Webp,
            "image/gif" => Self::Gif,
            "video/mp4" => Self::Mp4,
            "video/webm" => Self::Webm,
            "video/x-matroska" => Self::Mkv,
            "video/quicktime" => Self::Mov,
            "video/x-msvideo" | "video/avi" => Self::Avi,
            "audio/mpeg" | "audio/mp3" => Self::Mp3,
            "audio/wav" | "audio/x-wav" | "audio/wave" => Self::Wav,
            "audio/ogg" | "audio/vorbis" => Self::Ogg,
            "audio/flac" | "audio/x-flac" => Self::Flac,
            "audio/mp4" | "audio/x-m4a" | "audio/aac" => Self::M4a,
            "audio/opus" => Self::Opus,
            "audio/webm" => Self::Webm,
            "application/pdf" => Self::Pdf,
            _ => return None,
        };
        Some(format)
    }

    pub fn family(&self) -> FormatFamily {
        match self {
            Self::Png
            | Self::Jpeg
            | Self::Webp
            | Self::Gif
            | Self::Bmp
            | Self::Tiff
            | Self::Ico
            | Self::Avif
            | Self::Heic => FormatFamily::Raster,
            Self::Pdf => FormatFamily::Document,
            Self::Cr2 | Self::Nef | Self::Arw | Self::Dng => FormatFamily::RawCamera,
            Self::Mp4 | Self::Webm | Self::Mkv | Self::Mov | Self::Avi => FormatFamily::Video,
            Self::Mp3 | Self::Wav | Self::Ogg | Self::Flac | Self::M4a | Self::Opus => {
                FormatFamily::Audio
            }
            Self::Csv | Self::Tsv | Self::Json => FormatFamily::Tabular,
            Self::Gz => FormatFamily::Archive,
        }
    }

    pub fn is_audio_or_video(&self) -> bool {
        matches!(self.family(), FormatFamily::Audio | FormatFamily::Video)
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for MediaFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| FormatError::Unknown(s.to_string()))
    }
}

/// The kind of work a conversion performs, derived from its format pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    RasterImage,
    PaginatedDocument,
    TimeBasedMedia,
    TabularCompress,
}

impl OperationKind {
    /// Derives the operation for a pair, or `None` when the pair is undeclared.
    pub fn for_pair(from: MediaFormat, to: MediaFormat) -> Option<Self> {
        use FormatFamily::*;

        match (from.family(), to.family()) {
            (Raster | RawCamera, Raster) => Some(Self::RasterImage),
            (Document, Raster) => Some(Self::PaginatedDocument),
            (Video, Video | Audio) | (Audio, Audio) => Some(Self::TimeBasedMedia),
            (Tabular, Tabular | Archive) => Some(Self::TabularCompress),
            _ => None,
        }
    }

    /// Whether the server transcoding services accept this kind of work.
    pub fn remote_capable(&self) -> bool {
        !matches!(self, Self::TabularCompress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RasterImage => "raster_image",
            Self::PaginatedDocument => "paginated_document",
            Self::TimeBasedMedia => "time_based_media",
            Self::TabularCompress => "tabular_compress",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

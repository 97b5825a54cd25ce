//! Deciding whether a direct response is media the caller can use.

use reqwest::Url;

use crate::format::{FormatFamily, MediaFormat};

/// Classifies a direct response by its declared content type and URL.
///
/// Returns the media format for a direct hit, `None` when the response is
/// something else (typically an HTML page embedding a player).
pub fn classify(content_type: Option<&str>, url: &Url) -> Option<MediaFormat> {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let declared = match essence.as_str() {
        "application/ogg" => Some(MediaFormat::Ogg),
        other => MediaFormat::from_mime_type(other),
    }
    .filter(MediaFormat::is_audio_or_video);
    let by_extension = url_extension(url);

    if essence.starts_with("video/") {
        return declared.or(by_extension).or(Some(MediaFormat::Mp4));
    }
    if essence.starts_with("audio/") {
        return declared.or(by_extension).or(Some(MediaFormat::Mp3));
    }
    if essence.starts_with("text/") {
        return None;
    }
    declared.or(by_extension)
}

/// Audio or video format named by the last path segment's extension.
pub fn url_extension(url: &Url) -> Option<MediaFormat> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let (_, ext) = segment.rsplit_once('.')?;
    MediaFormat::from_extension(ext).filter(MediaFormat::is_audio_or_video)
}

/// Client-facing filename: the URL's last path segment stem with the
/// format's extension, restricted to a safe character set.
pub fn filename_for(url: &Url, format: MediaFormat) -> String {
    let stem = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|segment| {
            let decoded = urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| segment.to_string());
            match decoded.rsplit_once('.') {
                Some((stem, _)) => stem.to_string(),
                None => decoded,
            }
        })
        .map(|stem| {
            stem.chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '))
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| default_stem(format).to_string());

    format!("{}.{}", stem, format.extension())
}

fn default_stem(format: MediaFormat) -> &'static str {
    match format.family() {
        FormatFamily::Audio => "audio",
        _ => "video",
    }
}

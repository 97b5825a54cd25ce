//! Invocation recipes for the external conversion binaries.
//!
//! Recipes are plain data keyed by target format. Each family builds its
//! table once at startup through [`RecipeTable::validated`], which refuses to
//! start when a supported output has no recipe.

use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use super::error::TranscodeError;
use crate::format::{FormatFamily, MediaFormat};

/// The two server transcoding services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscodeFamily {
    Raster,
    Media,
}

const RASTER_OUTPUTS: &[MediaFormat] = &[
    MediaFormat::Png,
    MediaFormat::Jpeg,
    MediaFormat::Webp,
    MediaFormat::Gif,
    MediaFormat::Bmp,
    MediaFormat::Tiff,
    MediaFormat::Ico,
    MediaFormat::Avif,
    MediaFormat::Heic,
];

const MEDIA_OUTPUTS: &[MediaFormat] = &[
    MediaFormat::Mp4,
    MediaFormat::Webm,
    MediaFormat::Mkv,
    MediaFormat::Mov,
    MediaFormat::Avi,
    MediaFormat::Gif,
    MediaFormat::Mp3,
    MediaFormat::Wav,
    MediaFormat::Ogg,
    MediaFormat::Flac,
    MediaFormat::M4a,
    MediaFormat::Opus,
];

impl TranscodeFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raster => "raster",
            Self::Media => "media",
        }
    }

    /// Every format this family can produce.
    pub fn outputs(&self) -> &'static [MediaFormat] {
        match self {
            Self::Raster => RASTER_OUTPUTS,
            Self::Media => MEDIA_OUTPUTS,
        }
    }

    pub fn accepts_input(&self, format: MediaFormat) -> bool {
        match self {
            Self::Raster => matches!(
                format.family(),
                FormatFamily::Raster | FormatFamily::Document | FormatFamily::RawCamera
            ),
            Self::Media => format.is_audio_or_video(),
        }
    }

    /// Parses and checks the `from`/`to` query parameters of a convert request.
    pub fn validate_pair(
        &self,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<(MediaFormat, MediaFormat), TranscodeError> {
        let from_raw = from
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| TranscodeError::invalid_request("missing 'from' parameter"))?;
        let to_raw = to
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| TranscodeError::invalid_request("missing 'to' parameter"))?;

        let from = MediaFormat::from_extension(from_raw).ok_or_else(|| {
            TranscodeError::invalid_request(format!("unknown source format '{from_raw}'"))
        })?;
        let to = MediaFormat::from_extension(to_raw).ok_or_else(|| {
            TranscodeError::invalid_request(format!("unknown target format '{to_raw}'"))
        })?;

        if !self.accepts_input(from) {
            return Err(TranscodeError::invalid_request(format!(
                "{} conversion does not accept {from} input",
                self.as_str()
            )));
        }
        if !self.outputs().contains(&to) {
            return Err(TranscodeError::invalid_request(format!(
                "{} conversion cannot produce {to}",
                self.as_str()
            )));
        }
        if from.family() == FormatFamily::Audio && to.family() != FormatFamily::Audio {
            return Err(TranscodeError::invalid_request(format!(
                "cannot convert audio ({from}) to a visual format ({to})"
            )));
        }

        Ok((from, to))
    }
}

/// How a 0.0–1.0 quality hint maps onto binary arguments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QualityControl {
    None,
    /// `-quality N` (1–100).
    ImageQuality { default: u8 },
    /// `-crf N`; lower is better.
    Crf { best: u8, worst: u8, default: u8 },
    /// `-b:a Nk`.
    AudioBitrate {
        min_kbps: u32,
        max_kbps: u32,
        default_kbps: u32,
    },
}

impl QualityControl {
    pub fn args(&self, hint: Option<f32>) -> Vec<String> {
        let hint = hint.map(|h| h.clamp(0.0, 1.0));
        match *self {
            Self::None => Vec::new(),
            Self::ImageQuality { default } => {
                let q = hint
                    .map(|h| ((h * 100.0).round() as u8).max(1))
                    .unwrap_or(default);
                vec!["-quality".to_string(), q.to_string()]
            }
            Self::Crf {
                best,
                worst,
                default,
            } => {
                let crf = hint
                    .map(|h| (worst as f32 - h * (worst - best) as f32).round() as u8)
                    .unwrap_or(default);
                vec!["-crf".to_string(), crf.to_string()]
            }
            Self::AudioBitrate {
                min_kbps,
                max_kbps,
                default_kbps,
            } => {
                let kbps = hint
                    .map(|h| (min_kbps as f32 + h * (max_kbps - min_kbps) as f32).round() as u32)
                    .unwrap_or(default_kbps);
                vec!["-b:a".to_string(), format!("{kbps}k")]
            }
        }
    }
}

/// One invocation template for a target format.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub target: MediaFormat,
    /// Video codec (ffmpeg only).
    pub codec: Option<&'static str>,
    /// Audio codec (ffmpeg only).
    pub audio_codec: Option<&'static str>,
    /// ffmpeg muxer or ImageMagick coder prefix.
    pub container: &'static str,
    pub filters: Option<&'static str>,
    pub quality: QualityControl,
    pub extra: &'static [&'static str],
}

impl Recipe {
    fn image(target: MediaFormat, container: &'static str, quality: QualityControl) -> Self {
        Self {
            target,
            codec: None,
            audio_codec: None,
            container,
            filters: None,
            quality,
            extra: &[],
        }
    }

    fn audio(
        target: MediaFormat,
        audio_codec: &'static str,
        container: &'static str,
        quality: QualityControl,
    ) -> Self {
        Self {
            target,
            codec: None,
            audio_codec: Some(audio_codec),
            container,
            filters: None,
            quality,
            extra: &[],
        }
    }

    fn extra(mut self, extra: &'static [&'static str]) -> Self {
        self.extra = extra;
        self
    }
}

const GIF_PALETTE_FILTER: &str =
    "fps=12,scale='min(480,iw)':-2:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse";

const H264_CRF: QualityControl = QualityControl::Crf {
    best: 18,
    worst: 35,
    default: 23,
};

fn raster_recipes() -> Vec<Recipe> {
    use MediaFormat::*;
    vec![
        Recipe::image(Png, "png", QualityControl::None),
        Recipe::image(Jpeg, "jpg", QualityControl::ImageQuality { default: 85 })
            .extra(&["-background", "white", "-flatten"]),
        Recipe::image(Webp, "webp", QualityControl::ImageQuality { default: 80 }),
        Recipe::image(Gif, "gif", QualityControl::None),
        Recipe::image(Bmp, "bmp", QualityControl::None),
        Recipe::image(Tiff, "tiff", QualityControl::None).extra(&["-compress", "lzw"]),
        Recipe::image(Ico, "ico", QualityControl::None)
            .extra(&["-define", "icon:auto-resize=256,128,64,48,32,16"]),
        Recipe::image(Avif, "avif", QualityControl::ImageQuality { default: 60 }),
        Recipe::image(Heic, "heic", QualityControl::ImageQuality { default: 70 }),
    ]
}

fn media_recipes() -> Vec<Recipe> {
    use MediaFormat::*;
    vec![
        Recipe {
            target: Mp4,
            codec: Some("libx264"),
            audio_codec: Some("aac"),
            container: "mp4",
            filters: None,
            quality: H264_CRF,
            extra: &["-preset", "veryfast", "-pix_fmt", "yuv420p", "-movflags", "+faststart"],
        },
        Recipe {
            target: Webm,
            codec: Some("libvpx-vp9"),
            audio_codec: Some("libopus"),
            container: "webm",
            filters: None,
            quality: QualityControl::Crf {
                best: 24,
                worst: 50,
                default: 32,
            },
            extra: &["-b:v", "0", "-row-mt", "1"],
        },
        Recipe {
            target: Mkv,
            codec: Some("libx264"),
            audio_codec: Some("aac"),
            container: "matroska",
            filters: None,
            quality: H264_CRF,
            extra: &["-preset", "veryfast"],
        },
        Recipe {
            target: Mov,
            codec: Some("libx264"),
            audio_codec: Some("aac"),
            container: "mov",
            filters: None,
            quality: H264_CRF,
            extra: &["-pix_fmt", "yuv420p"],
        },
        Recipe {
            target: Avi,
            codec: Some("mpeg4"),
            audio_codec: Some("libmp3lame"),
            container: "avi",
            filters: None,
            quality: QualityControl::None,
            extra: &["-q:v", "5"],
        },
        Recipe {
            target: Gif,
            codec: None,
            audio_codec: None,
            container: "gif",
            filters: Some(GIF_PALETTE_FILTER),
            quality: QualityControl::None,
            extra: &["-an"],
        },
        Recipe::audio(
            Mp3,
            "libmp3lame",
            "mp3",
            QualityControl::AudioBitrate {
                min_kbps: 96,
                max_kbps: 320,
                default_kbps: 192,
            },
        ),
        Recipe::audio(Wav, "pcm_s16le", "wav", QualityControl::None),
        Recipe::audio(
            Ogg,
            "libvorbis",
            "ogg",
            QualityControl::AudioBitrate {
                min_kbps: 64,
                max_kbps: 320,
                default_kbps: 160,
            },
        ),
        Recipe::audio(Flac, "flac", "flac", QualityControl::None),
        Recipe::audio(
            M4a,
            "aac",
            "ipod",
            QualityControl::AudioBitrate {
                min_kbps: 96,
                max_kbps: 256,
                default_kbps: 160,
            },
        )
        .extra(&["-movflags", "+faststart"]),
        Recipe::audio(
            Opus,
            "libopus",
            "opus",
            QualityControl::AudioBitrate {
                min_kbps: 48,
                max_kbps: 256,
                default_kbps: 128,
            },
        ),
    ]
}

/// Recipes for one family, keyed by target format.
#[derive(Debug, Clone)]
pub struct RecipeTable {
    family: TranscodeFamily,
    recipes: HashMap<MediaFormat, Recipe>,
}

impl RecipeTable {
    /// Builds the family's table and checks that every supported output has
    /// a well-formed recipe.
    pub fn validated(family: TranscodeFamily) -> Result<Self, TranscodeError> {
        let list = match family {
            TranscodeFamily::Raster => raster_recipes(),
            TranscodeFamily::Media => media_recipes(),
        };
        let recipes: HashMap<_, _> = list.into_iter().map(|r| (r.target, r)).collect();

        for format in family.outputs() {
            match recipes.get(format) {
                Some(recipe) if !recipe.container.is_empty() => {}
                _ => return Err(TranscodeError::MissingRecipe { format: *format }),
            }
        }

        Ok(Self { family, recipes })
    }

    pub fn family(&self) -> TranscodeFamily {
        self.family
    }

    pub fn get(&self, to: MediaFormat) -> Result<&Recipe, TranscodeError> {
        self.recipes
            .get(&to)
            .ok_or(TranscodeError::MissingRecipe { format: to })
    }

    /// Arguments for `magick`.
    pub fn magick_args(
        &self,
        from: MediaFormat,
        to: MediaFormat,
        input: &Path,
        output: &Path,
        quality: Option<f32>,
    ) -> Result<Vec<String>, TranscodeError> {
        let recipe = self.get(to)?;
        let mut args = Vec::new();

        if from == MediaFormat::Pdf {
            args.extend(["-density".to_string(), "150".to_string()]);
            args.push(format!("{}[0]", input.display()));
        } else {
            args.push(input.display().to_string());
        }

        args.push("-auto-orient".to_string());
        args.extend(recipe.extra.iter().map(|s| s.to_string()));
        args.extend(recipe.quality.args(quality));
        args.push(format!("{}:{}", recipe.container, output.display()));

        Ok(args)
    }

    /// Arguments for `ffmpeg`. With `progress` set, machine-readable progress
    /// lines (`out_time_ms=`) are written to stderr.
    pub fn ffmpeg_args(
        &self,
        from: MediaFormat,
        to: MediaFormat,
        input: &Path,
        output: &Path,
        quality: Option<f32>,
        log_level: &str,
        progress: bool,
    ) -> Result<Vec<String>, TranscodeError> {
        if from.family() == FormatFamily::Audio && to.family() != FormatFamily::Audio {
            return Err(TranscodeError::invalid_request(format!(
                "cannot convert audio ({from}) to a visual format ({to})"
            )));
        }
        let recipe = self.get(to)?;

        let mut args: Vec<String> = ["-hide_banner", "-nostdin", "-y", "-loglevel", log_level]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if progress {
            args.extend(["-progress".to_string(), "pipe:2".to_string(), "-nostats".to_string()]);
        }
        args.extend(["-i".to_string(), input.display().to_string()]);

        if to.family() == FormatFamily::Audio {
            args.push("-vn".to_string());
        }
        if let Some(codec) = recipe.codec {
            args.extend(["-c:v".to_string(), codec.to_string()]);
        }
        if let Some(filters) = recipe.filters {
            args.extend(["-vf".to_string(), filters.to_string()]);
        }
        if let Some(codec) = recipe.audio_codec {
            args.extend(["-c:a".to_string(), codec.to_string()]);
        }
        args.extend(recipe.quality.args(quality));
        args.extend(recipe.extra.iter().map(|s| s.to_string()));
        args.extend([
            "-f".to_string(),
            recipe.container.to_string(),
            output.display().to_string(),
        ]);

        Ok(args)
    }
}

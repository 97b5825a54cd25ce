pub mod config;
pub mod engine;
pub mod fetcher;
pub mod format;
pub mod sandbox;
pub mod single_flight;
pub mod telemetry;
pub mod testing;
pub mod transcoder;

pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError, SanitizedConfig,
};
pub use engine::{
    ConversionEngine, ConversionError, ConversionJob, ConversionOutcome, ConversionResult,
    EngineConfig, ExecutionStrategy,
};
pub use fetcher::{FetchError, FetchMode, FetchedMedia, MediaFetcher, RemoteSourceDescriptor};
pub use format::{FormatFamily, MediaFormat, OperationKind};
pub use sandbox::SandboxDirectory;
pub use transcoder::{MediaTranscoder, RasterTranscoder, TranscodeError, Transcoder};

//! Execution strategy resolution.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::capabilities::CapabilitySnapshot;
use super::error::ConversionError;
use crate::format::{MediaFormat, OperationKind};

/// Where a conversion attempt runs. Derived per attempt, never stored on a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStrategy {
    LocalIsolated,
    LocalDegraded,
    Remote,
}

impl ExecutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalIsolated => "local-isolated",
            Self::LocalDegraded => "local-degraded",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Targets whose encoders are impractical to run locally.
pub const SERVER_ONLY_TARGETS: &[MediaFormat] = &[
    MediaFormat::Avif,
    MediaFormat::Heic,
    MediaFormat::Mov,
    MediaFormat::Avi,
    MediaFormat::Mkv,
];

/// Picks the first venue for a format pair.
///
/// Pure: the same pair and snapshot always give the same answer.
pub fn resolve(
    from: MediaFormat,
    to: MediaFormat,
    capabilities: &CapabilitySnapshot,
) -> Result<ExecutionStrategy, ConversionError> {
    let kind = OperationKind::for_pair(from, to).ok_or_else(|| {
        ConversionError::UnsupportedFormat {
            from: from.to_string(),
            to: to.to_string(),
        }
    })?;

    if SERVER_ONLY_TARGETS.contains(&to) {
        return Ok(ExecutionStrategy::Remote);
    }

    if !capabilities.isolated_execution_available {
        return Ok(match kind {
            OperationKind::TimeBasedMedia => ExecutionStrategy::Remote,
            _ => ExecutionStrategy::LocalDegraded,
        });
    }

    Ok(ExecutionStrategy::LocalIsolated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use MediaFormat::*;

    fn isolated() -> CapabilitySnapshot {
        CapabilitySnapshot::full()
    }

    fn no_isolation() -> CapabilitySnapshot {
        CapabilitySnapshot {
            isolated_execution_available: false,
            ..CapabilitySnapshot::full()
        }
    }

    #[test]
    fn test_server_only_targets_go_remote() {
        for to in [Avif, Heic] {
            assert_eq!(resolve(Png, to, &isolated()).unwrap(), ExecutionStrategy::Remote);
        }
        for to in [Mov, Avi, Mkv] {
            assert_eq!(resolve(Mp4, to, &isolated()).unwrap(), ExecutionStrategy::Remote);
        }
    }

    #[test]
    fn test_without_isolation() {
        let caps = no_isolation();
        assert_eq!(resolve(Mp4, Webm, &caps).unwrap(), ExecutionStrategy::Remote);
        assert_eq!(resolve(Wav, Mp3, &caps).unwrap(), ExecutionStrategy::Remote);
        assert_eq!(resolve(Png, Jpeg, &caps).unwrap(), ExecutionStrategy::LocalDegraded);
        assert_eq!(resolve(Pdf, Png, &caps).unwrap(), ExecutionStrategy::LocalDegraded);
        assert_eq!(resolve(Csv, Json, &caps).unwrap(), ExecutionStrategy::LocalDegraded);
    }

    #[test]
    fn test_isolated_by_default() {
        assert_eq!(resolve(Png, Webp, &isolated()).unwrap(), ExecutionStrategy::LocalIsolated);
        assert_eq!(resolve(Mp4, Mp3, &isolated()).unwrap(), ExecutionStrategy::LocalIsolated);
    }

    #[test]
    fn test_resolve_is_deterministic_over_declared_pairs() {
        for caps in [isolated(), no_isolation()] {
            for from in MediaFormat::ALL {
                for to in MediaFormat::ALL {
                    let first = resolve(from, to, &caps);
                    let second = resolve(from, to, &caps);
                    match (first, second) {
                        (Ok(a), Ok(b)) => assert_eq!(a, b),
                        (Err(_), Err(_)) => assert!(OperationKind::for_pair(from, to).is_none()),
                        _ => panic!("resolve({from}, {to}) is not deterministic"),
                    }
                }
            }
        }
    }
}

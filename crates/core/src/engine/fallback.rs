//! Fallback decisions between execution strategies.

use super::error::{ConversionError, ErrorKind};
use super::strategy::ExecutionStrategy;
use crate::format::OperationKind;

/// Where a job stands in its fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackState {
    Attempting(ExecutionStrategy),
    Done,
    Failed,
}

/// Per-job state machine deciding whether a failed attempt gets another venue.
#[derive(Debug)]
pub struct FallbackController {
    kind: OperationKind,
    state: FallbackState,
    attempted: Vec<(ExecutionStrategy, ErrorKind)>,
}

impl FallbackController {
    pub fn new(kind: OperationKind, initial: ExecutionStrategy) -> Self {
        Self {
            kind,
            state: FallbackState::Attempting(initial),
            attempted: Vec::new(),
        }
    }

    pub fn state(&self) -> &FallbackState {
        &self.state
    }

    /// Number of attempts that have failed so far.
    pub fn failures(&self) -> usize {
        self.attempted.len()
    }

    pub fn succeed(&mut self) {
        self.state = FallbackState::Done;
    }

    /// Records a failure of the current attempt and returns the strategy for
    /// the next one, or `None` when the job has failed for good.
    pub fn fail(&mut self, error: &ConversionError) -> Option<ExecutionStrategy> {
        let FallbackState::Attempting(current) = self.state else {
            return None;
        };
        let kind = error.kind();

        let repeated = self.attempted.contains(&(current, kind));
        self.attempted.push((current, kind));

        let next = if repeated {
            None
        } else {
            Self::transition(self.kind, current, kind)
        };
        let next = next.filter(|next| !self.attempted.iter().any(|(s, _)| s == next));

        self.state = match next {
            Some(strategy) => FallbackState::Attempting(strategy),
            None => FallbackState::Failed,
        };
        next
    }

    fn transition(
        operation: OperationKind,
        current: ExecutionStrategy,
        error: ErrorKind,
    ) -> Option<ExecutionStrategy> {
        use ExecutionStrategy::*;

        match (current, error) {
            (LocalIsolated, ErrorKind::DecodeUnsupported | ErrorKind::ChannelFault) => {
                Some(LocalDegraded)
            }
            (LocalDegraded, ErrorKind::ChannelFault)
                if operation == OperationKind::TimeBasedMedia =>
            {
                Some(Remote)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExecutionStrategy::*;

    fn decode() -> ConversionError {
        ConversionError::decode_unsupported("no codec")
    }

    fn fault() -> ConversionError {
        ConversionError::channel_fault("worker crashed")
    }

    #[test]
    fn test_isolated_failures_degrade() {
        let mut fallback = FallbackController::new(OperationKind::RasterImage, LocalIsolated);
        assert_eq!(fallback.fail(&fault()), Some(LocalDegraded));
        assert_eq!(fallback.state(), &FallbackState::Attempting(LocalDegraded));

        let mut fallback = FallbackController::new(OperationKind::RasterImage, LocalIsolated);
        assert_eq!(fallback.fail(&decode()), Some(LocalDegraded));
    }

    #[test]
    fn test_degraded_media_fault_goes_remote() {
        let mut fallback = FallbackController::new(OperationKind::TimeBasedMedia, LocalIsolated);
        assert_eq!(fallback.fail(&fault()), Some(LocalDegraded));
        assert_eq!(fallback.fail(&fault()), Some(Remote));
        assert_eq!(fallback.fail(&ConversionError::Transport("refused".into())), None);
        assert_eq!(fallback.state(), &FallbackState::Failed);
        assert_eq!(fallback.failures(), 3);
    }

    #[test]
    fn test_degraded_raster_fault_is_terminal() {
        let mut fallback = FallbackController::new(OperationKind::RasterImage, LocalDegraded);
        assert_eq!(fallback.fail(&fault()), None);
        assert_eq!(fallback.state(), &FallbackState::Failed);
    }

    #[test]
    fn test_degraded_decode_unsupported_is_terminal() {
        for kind in [
            OperationKind::RasterImage,
            OperationKind::PaginatedDocument,
            OperationKind::TimeBasedMedia,
            OperationKind::TabularCompress,
        ] {
            let mut fallback = FallbackController::new(kind, LocalIsolated);
            assert_eq!(fallback.fail(&decode()), Some(LocalDegraded), "{kind}");
            assert_eq!(fallback.fail(&decode()), None, "{kind}");
            assert_eq!(fallback.state(), &FallbackState::Failed, "{kind}");
            assert_eq!(fallback.failures(), 2, "{kind}");
        }
    }

    #[test]
    fn test_encode_failure_is_terminal() {
        let mut fallback = FallbackController::new(OperationKind::RasterImage, LocalIsolated);
        assert_eq!(fallback.fail(&ConversionError::encode_failed("disk full")), None);
    }

    #[test]
    fn test_remote_failure_is_terminal() {
        let mut fallback = FallbackController::new(OperationKind::TimeBasedMedia, Remote);
        let err = ConversionError::Remote {
            status: 500,
            message: "ffmpeg failed".into(),
        };
        assert_eq!(fallback.fail(&err), None);
    }

    #[test]
    fn test_success_ends_the_chain() {
        let mut fallback = FallbackController::new(OperationKind::RasterImage, LocalIsolated);
        fallback.succeed();
        assert_eq!(fallback.state(), &FallbackState::Done);
        assert_eq!(fallback.fail(&fault()), None);
    }
}

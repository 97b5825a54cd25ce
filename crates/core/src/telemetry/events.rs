use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::ExecutionStrategy;
use crate::format::{MediaFormat, OperationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded,
    Failed,
}

/// Run lifecycle events. The run id is generated by the emitting client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    #[serde(rename = "run_begin")]
    Begin {
        run_id: Uuid,
        operation: OperationKind,
        from: MediaFormat,
        to: MediaFormat,
        strategy: ExecutionStrategy,
    },
    #[serde(rename = "run_finish")]
    Finish {
        run_id: Uuid,
        outcome: RunOutcome,
        duration_ms: u64,
        attempts: u32,
        /// Strategy of the last attempt.
        strategy: ExecutionStrategy,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl RunEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Begin { .. } => "run_begin",
            Self::Finish { .. } => "run_finish",
        }
    }

    pub fn run_id(&self) -> Uuid {
        match self {
            Self::Begin { run_id, .. } | Self::Finish { run_id, .. } => *run_id,
        }
    }
}

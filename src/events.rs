//! Stage-transition events for observability.
//!
//! The orchestrator emits a monotonically increasing sequence of
//! entry/exit events per run. Consumers (metrics, tracing, dashboards)
//! plug in through [`StageObserver`]; the pipeline itself never depends
//! on what they do with the events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Entered,
    Exited,
}

/// One stage-entry or stage-exit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    /// Monotonically increasing within one run, starting at 0
    pub seq: u64,
    pub run_id: Uuid,
    pub stage: Stage,
    pub kind: EventKind,
    pub at: DateTime<Utc>,
}

/// Sink for stage events. Implementations must be cheap and non-blocking;
/// they run inline on the orchestrator task.
pub trait StageObserver: Send + Sync {
    fn on_event(&self, event: &StageEvent);
}

/// Default observer: structured log lines via `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StageObserver for TracingObserver {
    fn on_event(&self, event: &StageEvent) {
        tracing::info!(
            run_id = %event.run_id,
            seq = event.seq,
            stage = %event.stage,
            kind = ?event.kind,
            "pipeline stage event"
        );
    }
}

/// Observer that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl StageObserver for NullObserver {
    fn on_event(&self, _event: &StageEvent) {}
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records every event for later assertions.
    #[derive(Debug, Default)]
    pub struct RecordingObserver {
        events: Mutex<Vec<StageEvent>>,
    }

    impl RecordingObserver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<StageEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl StageObserver for RecordingObserver {
        fn on_event(&self, event: &StageEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = StageEvent {
            seq: 3,
            run_id: Uuid::new_v4(),
            stage: Stage::Search,
            kind: EventKind::Entered,
            at: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"search\""));
        assert!(json.contains("\"entered\""));

        let parsed: StageEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.seq, 3);
        assert_eq!(parsed.kind, EventKind::Entered);
    }

    #[test]
    fn test_null_observer_accepts_events() {
        let observer = NullObserver;
        observer.on_event(&StageEvent {
            seq: 0,
            run_id: Uuid::new_v4(),
            stage: Stage::Init,
            kind: EventKind::Exited,
            at: Utc::now(),
        });
    }
}

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use propledger_core::{OrgId, SagaId, TraceId};

/// Lifecycle status of a saga instance.
///
/// `running → completed` on the happy path, `running → failed` on an
/// unrecoverable step error, `running → compensating → compensated` when
/// rollback is invoked. The three terminal states accept no further
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStatus {
    Running,
    Completed,
    Failed,
    Compensating,
    Compensated,
}

impl SagaStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Completed | SagaStatus::Failed | SagaStatus::Compensated
        )
    }
}

impl fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SagaStatus::Running => "running",
            SagaStatus::Completed => "completed",
            SagaStatus::Failed => "failed",
            SagaStatus::Compensating => "compensating",
            SagaStatus::Compensated => "compensated",
        };
        f.write_str(name)
    }
}

/// Persisted state of one saga instance.
///
/// Mutated only by the orchestrator's transitions and never deleted;
/// terminal instances are retained for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaState {
    pub id: SagaId,
    pub org_id: OrgId,
    pub name: String,
    pub current_step: String,
    pub payload: JsonValue,
    pub status: SagaStatus,
    pub trace_id: TraceId,

    /// Caller-supplied runtime limit. Exceeding it flags the instance
    /// for operator recovery; it never auto-aborts.
    pub timeout: Duration,
    pub last_heartbeat_at: DateTime<Utc>,

    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub result: Option<JsonValue>,
    pub error: Option<String>,
}

impl SagaState {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Shallow-merge a patch into the stored payload.
    ///
    /// Object patches overwrite matching top-level keys and leave the rest
    /// alone; a null patch is a no-op; any other patch replaces the payload
    /// outright.
    pub fn merge_payload(&mut self, patch: JsonValue) {
        match (&mut self.payload, patch) {
            (_, JsonValue::Null) => {}
            (JsonValue::Object(base), JsonValue::Object(patch)) => {
                for (key, value) in patch {
                    base.insert(key, value);
                }
            }
            (payload, patch) => *payload = patch,
        }
    }

    /// Time since the last heartbeat. Zero if the clock reads earlier than
    /// the heartbeat.
    pub fn heartbeat_age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_heartbeat_at).to_std().unwrap_or_default()
    }

    /// Total wall-clock runtime so far.
    pub fn runtime(&self, now: DateTime<Utc>) -> Duration {
        (now - self.started_at).to_std().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_state(payload: JsonValue) -> SagaState {
        let now = Utc::now();
        SagaState {
            id: SagaId::new(),
            org_id: OrgId::new(),
            name: "test".to_string(),
            current_step: "first".to_string(),
            payload,
            status: SagaStatus::Running,
            trace_id: TraceId::new(),
            timeout: Duration::from_secs(1800),
            last_heartbeat_at: now,
            started_at: now,
            updated_at: now,
            result: None,
            error: None,
        }
    }

    #[test]
    fn object_patch_merges_shallowly() {
        let mut state = test_state(json!({"a": 1, "b": {"nested": true}}));
        state.merge_payload(json!({"b": "flat", "c": 3}));

        assert_eq!(state.payload, json!({"a": 1, "b": "flat", "c": 3}));
    }

    #[test]
    fn null_patch_changes_nothing() {
        let mut state = test_state(json!({"a": 1}));
        state.merge_payload(JsonValue::Null);

        assert_eq!(state.payload, json!({"a": 1}));
    }

    #[test]
    fn scalar_patch_replaces_payload() {
        let mut state = test_state(json!({"a": 1}));
        state.merge_payload(json!(42));

        assert_eq!(state.payload, json!(42));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!SagaStatus::Running.is_terminal());
        assert!(!SagaStatus::Compensating.is_terminal());
        assert!(SagaStatus::Completed.is_terminal());
        assert!(SagaStatus::Failed.is_terminal());
        assert!(SagaStatus::Compensated.is_terminal());
    }

    #[test]
    fn heartbeat_age_clamps_at_zero() {
        let state = test_state(JsonValue::Null);
        let before = state.last_heartbeat_at - chrono::Duration::seconds(10);

        assert_eq!(state.heartbeat_age(before), Duration::ZERO);
        assert!(state.heartbeat_age(state.last_heartbeat_at + chrono::Duration::seconds(90))
            >= Duration::from_secs(90));
    }
}

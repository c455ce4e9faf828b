use crate::api::ApiError;
use serde::{Deserialize, Serialize};

/// Response envelope shared by every endpoint of the review service.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn into_result(self) -> Result<T, ApiError> {
        if !self.success {
            return Err(ApiError::Server(self.error));
        }
        self.data.ok_or(ApiError::MissingData)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningTask {
    pub task_id: String,
    pub progress: f64,
    #[serde(default)]
    pub step: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedTask {
    pub task_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTask {
    pub task_id: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// State of the shared analysis queue at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    #[serde(default)]
    pub running: Vec<RunningTask>,
    #[serde(default, rename = "recent_completed")]
    pub recently_completed: Vec<CompletedTask>,
    #[serde(default, rename = "recent_failed")]
    pub recently_failed: Vec<FailedTask>,
}

impl QueueSnapshot {
    pub fn find_running(&self, task_id: &str) -> Option<&RunningTask> {
        self.running.iter().find(|t| t.task_id == task_id)
    }

    pub fn is_completed(&self, task_id: &str) -> bool {
        self.recently_completed.iter().any(|t| t.task_id == task_id)
    }

    pub fn find_failed(&self, task_id: &str) -> Option<&FailedTask> {
        self.recently_failed.iter().find(|t| t.task_id == task_id)
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
            && self.recently_completed.is_empty()
            && self.recently_failed.is_empty()
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerRequest {
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerOutcome {
    pub queued: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUEUE_JSON: &str = r#"{
        "success": true,
        "data": {
            "running": [
                {"task_id": "hw-17", "progress": 42.5, "step": "Clustering errors"},
                {"task_id": "hw-18", "progress": 0, "step": "Queued"}
            ],
            "recent_completed": [{"task_id": "hw-12"}],
            "recent_failed": [{"task_id": "hw-9", "error": "model timeout"}]
        }
    }"#;

    #[test]
    fn test_parse_queue_envelope() {
        let envelope: ApiEnvelope<QueueSnapshot> = serde_json::from_str(QUEUE_JSON).unwrap();
        let snapshot = envelope.into_result().unwrap();

        assert_eq!(snapshot.running.len(), 2);
        let running = snapshot.find_running("hw-17").unwrap();
        assert!((running.progress - 42.5).abs() < f64::EPSILON);
        assert_eq!(running.step, "Clustering errors");

        assert!(snapshot.is_completed("hw-12"));
        assert!(!snapshot.is_completed("hw-17"));

        let failed = snapshot.find_failed("hw-9").unwrap();
        assert_eq!(failed.error.as_deref(), Some("model timeout"));
        assert!(snapshot.find_failed("hw-12").is_none());
    }

    #[test]
    fn test_missing_lists_default_to_empty() {
        let envelope: ApiEnvelope<QueueSnapshot> =
            serde_json::from_str(r#"{"success": true, "data": {"running": []}}"#).unwrap();
        let snapshot = envelope.into_result().unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_server_failure_envelope() {
        let envelope: ApiEnvelope<QueueSnapshot> =
            serde_json::from_str(r#"{"success": false, "error": "queue offline"}"#).unwrap();

        match envelope.into_result() {
            Err(ApiError::Server(message)) => assert_eq!(message.as_deref(), Some("queue offline")),
            other => panic!("expected server error, got {:?}", other),
        }
    }

    #[test]
    fn test_success_without_data() {
        let envelope: ApiEnvelope<QueueSnapshot> =
            serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(matches!(envelope.into_result(), Err(ApiError::MissingData)));
    }

    #[test]
    fn test_trigger_request_serialization() {
        let body = serde_json::to_value(TriggerRequest {
            priority: Priority::High,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"priority": "high"}));
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_parse_trigger_outcome() {
        let envelope: ApiEnvelope<TriggerOutcome> = serde_json::from_str(
            r#"{"success": true, "data": {"queued": false, "message": "already running"}}"#,
        )
        .unwrap();
        let outcome = envelope.into_result().unwrap();
        assert!(!outcome.queued);
        assert_eq!(outcome.message.as_deref(), Some("already running"));
    }
}

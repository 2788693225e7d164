use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a polling response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum PollResponse {
    #[serde(rename = "done")]
    Done {
        #[serde(rename = "callbackData", default)]
        callback_data: Value,
    },
    #[serde(rename = "still waiting")]
    StillWaiting,
}

/// Where the server's post-upload processing stands
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionState {
    InProgress,
    Done(Value),
}

impl From<PollResponse> for CompletionState {
    fn from(response: PollResponse) -> Self {
        match response {
            PollResponse::Done { callback_data } => CompletionState::Done(callback_data),
            PollResponse::StillWaiting => CompletionState::InProgress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_poll_responses() {
        let done: PollResponse =
            serde_json::from_value(json!({"status": "done", "callbackData": {"ok": true}})).unwrap();
        assert_eq!(
            CompletionState::from(done),
            CompletionState::Done(json!({"ok": true}))
        );

        let waiting: PollResponse =
            serde_json::from_value(json!({"status": "still waiting"})).unwrap();
        assert_eq!(CompletionState::from(waiting), CompletionState::InProgress);

        let bare: PollResponse = serde_json::from_value(json!({"status": "done"})).unwrap();
        assert_eq!(CompletionState::from(bare), CompletionState::Done(Value::Null));
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(serde_json::from_value::<PollResponse>(json!({"status": "failed"})).is_err());
        assert!(serde_json::from_value::<PollResponse>(json!({"nope": 1})).is_err());
    }
}

use serde::{Deserialize, Serialize};
use wfcore::workflow::Metadata;

/// An action a user executes against the pending approval of a
/// document.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct TransitionRequest {
    pub action_key: String,
    pub comment: Option<String>,
    /// Merged into the instance context when the action moves it.
    pub metadata: Option<Metadata>,
    /// Recorded on the closed step for a `delegate` action.
    pub delegated_to: Option<i64>,
}

impl TransitionRequest {
    pub fn new(action_key: impl Into<String>) -> Self {
        Self {
            action_key: action_key.into(),
            .. Default::default()
        }
    }

    pub fn comment(mut self, value: impl Into<String>) -> Self {
        self.comment = Some(value.into());
        self
    }

    pub fn metadata(mut self, value: Metadata) -> Self {
        self.metadata = Some(value);
        self
    }

    pub fn delegated_to(mut self, value: i64) -> Self {
        self.delegated_to = Some(value);
        self
    }
}

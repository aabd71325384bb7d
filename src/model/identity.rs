use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

/// A person as the client describes them: an email plus whatever profile fields were sent.
///
/// Used for the session identity, an assignment's publisher, and a submission's examinee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Identity {
    #[validate(email)]
    pub email: String,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl Identity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            profile: Map::new(),
        }
    }
}

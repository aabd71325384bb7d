use serde::{Deserialize, Serialize};
use serde_json::Number;
use uuid::Uuid;
use validator::Validate;

use crate::model::identity::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Easy,
    Medium,
    Hard,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Easy => "easy",
            Level::Medium => "medium",
            Level::Hard => "hard",
        }
    }
}

/// The fields a publisher may overwrite on an existing assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentFields {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    pub description: String,
    #[validate(length(min = 1, message = "dueDate must not be empty"))]
    pub due_date: String,
    pub level: Level,
    #[validate(custom(function = "crate::model::non_negative"))]
    pub marks: Number,
    #[validate(url(message = "thumbnail must be a URL"))]
    pub thumbnail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewAssignment {
    #[serde(flatten)]
    #[validate(nested)]
    pub fields: AssignmentFields,
    #[validate(nested)]
    pub publisher: Identity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: AssignmentFields,
    pub publisher: Identity,
}

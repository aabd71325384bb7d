use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use uuid::Uuid;
use validator::Validate;

use crate::model::identity::Identity;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    #[default]
    Pending,
    Checked,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Checked => "checked",
        }
    }
}

/// A new submission. Fields copied from the assignment (title, marks, links, notes)
/// are kept verbatim in `details`.
///
/// The grading fields are typed here as on [`Submission`] so a body that decodes now
/// also decodes when listed later. They are cleared before the submission is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewSubmission {
    #[validate(nested)]
    pub examinee: Identity,
    #[serde(default)]
    pub status: SubmissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examiner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examiner_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obtained_marks: Option<Number>,
    #[serde(rename = "feedBack", default, skip_serializing_if = "Option::is_none")]
    pub feed_back: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl NewSubmission {
    /// Resets the submission to its ungraded state.
    pub fn clear_grade(&mut self) {
        self.status = SubmissionStatus::Pending;
        self.examiner = None;
        self.examiner_name = None;
        self.obtained_marks = None;
        self.feed_back = None;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    #[validate(custom(function = "crate::model::non_negative"))]
    pub obtained_marks: Number,
    #[serde(rename = "feedBack")]
    pub feed_back: String,
    pub status: SubmissionStatus,
    #[validate(email)]
    pub examiner: String,
    pub examiner_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub examinee: Identity,
    pub status: SubmissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examiner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examiner_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obtained_marks: Option<Number>,
    #[serde(rename = "feedBack", default, skip_serializing_if = "Option::is_none")]
    pub feed_back: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

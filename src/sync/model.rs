use serde::Serialize;

/// Unix seconds, as stored in every `time*` column.
pub type Timestamp = i64;

/// A submitted plain text that may need copying into feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibleSubmission {
    pub submission_id: i64,
    pub user_id: i64,
    pub assignment_id: i64,
    pub time_modified: Timestamp,
    pub plaintext: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub id: i64,
    pub assignment_id: i64,
    pub user_id: i64,
    pub time_created: Timestamp,
    pub time_modified: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGrade {
    pub assignment_id: i64,
    pub user_id: i64,
    pub time_created: Timestamp,
    pub time_modified: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: i64,
    pub grade_id: i64,
    pub assignment_id: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeedback<'a> {
    pub grade_id: i64,
    pub assignment_id: i64,
    pub text: &'a str,
}

//! In-memory `SyncStore` for exercising the job without SQLite.

use super::model::{EligibleSubmission, Feedback, Grade, NewFeedback, NewGrade, Timestamp};
use super::scope::EligibilityQuery;
use super::store::SyncStore;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

#[derive(Default)]
pub struct FakeStore {
    values: RefCell<HashMap<String, String>>,
    submissions: RefCell<Vec<EligibleSubmission>>,
    grades: RefCell<Vec<Grade>>,
    feedback: RefCell<Vec<Feedback>>,
    next_id: Cell<i64>,
    fail_feedback_inserts: Cell<bool>,
}

impl FakeStore {
    pub fn push_submission(&self, submission: EligibleSubmission) {
        self.submissions.borrow_mut().push(submission);
    }

    pub fn replace_submission(&self, submission: EligibleSubmission) {
        let mut subs = self.submissions.borrow_mut();
        subs.retain(|s| s.submission_id != submission.submission_id);
        subs.push(submission);
    }

    pub fn fail_feedback_inserts(&self) {
        self.fail_feedback_inserts.set(true);
    }

    pub fn value(&self, name: &str) -> Option<String> {
        self.values.borrow().get(name).cloned()
    }

    pub fn grade_count(&self) -> usize {
        self.grades.borrow().len()
    }

    pub fn feedback_count(&self) -> usize {
        self.feedback.borrow().len()
    }

    pub fn grade_for(&self, assignment_id: i64, user_id: i64) -> Option<Grade> {
        self.find_grade(assignment_id, user_id).ok().flatten()
    }

    pub fn feedback_for(&self, assignment_id: i64, user_id: i64) -> Option<Feedback> {
        let grade = self.grade_for(assignment_id, user_id)?;
        self.find_feedback(grade.id).ok().flatten()
    }

    fn next_id(&self) -> i64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }
}

impl SyncStore for FakeStore {
    fn get_value(&self, name: &str) -> anyhow::Result<Option<String>> {
        Ok(self.value(name))
    }

    fn set_value(&self, name: &str, value: &str) -> anyhow::Result<()> {
        self.values
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    // Scope filtering is covered by the SQLite store tests.
    fn eligible_submissions(
        &self,
        query: &EligibilityQuery,
    ) -> anyhow::Result<Vec<EligibleSubmission>> {
        Ok(self
            .submissions
            .borrow()
            .iter()
            .filter(|s| s.time_modified >= query.since)
            .cloned()
            .collect())
    }

    fn find_grade(&self, assignment_id: i64, user_id: i64) -> anyhow::Result<Option<Grade>> {
        Ok(self
            .grades
            .borrow()
            .iter()
            .find(|g| g.assignment_id == assignment_id && g.user_id == user_id)
            .cloned())
    }

    fn touch_grade(&self, grade_id: i64, now: Timestamp) -> anyhow::Result<()> {
        let mut grades = self.grades.borrow_mut();
        let grade = grades
            .iter_mut()
            .find(|g| g.id == grade_id)
            .ok_or_else(|| anyhow::anyhow!("no grade {grade_id}"))?;
        grade.time_modified = now;
        Ok(())
    }

    fn insert_grade(&self, grade: &NewGrade) -> anyhow::Result<i64> {
        if self.find_grade(grade.assignment_id, grade.user_id)?.is_some() {
            anyhow::bail!("UNIQUE constraint failed: assign_grades.assignment, assign_grades.userid");
        }
        let id = self.next_id();
        self.grades.borrow_mut().push(Grade {
            id,
            assignment_id: grade.assignment_id,
            user_id: grade.user_id,
            time_created: grade.time_created,
            time_modified: grade.time_modified,
        });
        Ok(id)
    }

    fn find_feedback(&self, grade_id: i64) -> anyhow::Result<Option<Feedback>> {
        Ok(self
            .feedback
            .borrow()
            .iter()
            .find(|f| f.grade_id == grade_id)
            .cloned())
    }

    fn insert_feedback(&self, feedback: &NewFeedback<'_>) -> anyhow::Result<i64> {
        if self.fail_feedback_inserts.get() {
            anyhow::bail!("disk I/O error");
        }
        if self.find_feedback(feedback.grade_id)?.is_some() {
            anyhow::bail!("UNIQUE constraint failed: assignfeedback_plaincomment.grade");
        }
        let id = self.next_id();
        self.feedback.borrow_mut().push(Feedback {
            id,
            grade_id: feedback.grade_id,
            assignment_id: feedback.assignment_id,
            text: feedback.text.to_string(),
        });
        Ok(id)
    }

    fn update_feedback_text(&self, feedback_id: i64, text: &str) -> anyhow::Result<()> {
        let mut rows = self.feedback.borrow_mut();
        let row = rows
            .iter_mut()
            .find(|f| f.id == feedback_id)
            .ok_or_else(|| anyhow::anyhow!("no feedback {feedback_id}"))?;
        row.text = text.to_string();
        Ok(())
    }
}

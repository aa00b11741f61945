use super::model::{EligibleSubmission, Feedback, Grade, NewFeedback, NewGrade, Timestamp};
use super::scope::EligibilityQuery;
use anyhow::Context;
use rusqlite::{params_from_iter, Connection, OptionalExtension};

/// Data access the sync job needs. Every call is its own unit of work; nothing
/// here opens a transaction spanning several calls.
pub trait SyncStore {
    fn get_value(&self, name: &str) -> anyhow::Result<Option<String>>;
    /// Insert or overwrite.
    fn set_value(&self, name: &str, value: &str) -> anyhow::Result<()>;

    fn eligible_submissions(
        &self,
        query: &EligibilityQuery,
    ) -> anyhow::Result<Vec<EligibleSubmission>>;

    fn find_grade(&self, assignment_id: i64, user_id: i64) -> anyhow::Result<Option<Grade>>;
    fn touch_grade(&self, grade_id: i64, now: Timestamp) -> anyhow::Result<()>;
    fn insert_grade(&self, grade: &NewGrade) -> anyhow::Result<i64>;

    fn find_feedback(&self, grade_id: i64) -> anyhow::Result<Option<Feedback>>;
    fn insert_feedback(&self, feedback: &NewFeedback<'_>) -> anyhow::Result<i64>;
    fn update_feedback_text(&self, feedback_id: i64, text: &str) -> anyhow::Result<()>;
}

pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl SyncStore for SqliteStore<'_> {
    fn get_value(&self, name: &str) -> anyhow::Result<Option<String>> {
        crate::db::config_get(self.conn, name)
    }

    fn set_value(&self, name: &str, value: &str) -> anyhow::Result<()> {
        crate::db::config_set(self.conn, name, value)
    }

    fn eligible_submissions(
        &self,
        query: &EligibilityQuery,
    ) -> anyhow::Result<Vec<EligibleSubmission>> {
        let (sql, params) = query.sql();
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok(EligibleSubmission {
                    submission_id: row.get(0)?,
                    user_id: row.get(1)?,
                    assignment_id: row.get(2)?,
                    time_modified: row.get(3)?,
                    plaintext: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read eligible submissions")?;
        Ok(rows)
    }

    fn find_grade(&self, assignment_id: i64, user_id: i64) -> anyhow::Result<Option<Grade>> {
        let grade = self
            .conn
            .query_row(
                "SELECT id, assignment, userid, timecreated, timemodified
                 FROM assign_grades
                 WHERE assignment = ? AND userid = ?",
                (assignment_id, user_id),
                |r| {
                    Ok(Grade {
                        id: r.get(0)?,
                        assignment_id: r.get(1)?,
                        user_id: r.get(2)?,
                        time_created: r.get(3)?,
                        time_modified: r.get(4)?,
                    })
                },
            )
            .optional()
            .context("failed to look up assign_grades")?;
        Ok(grade)
    }

    fn touch_grade(&self, grade_id: i64, now: Timestamp) -> anyhow::Result<()> {
        self.conn
            .execute(
                "UPDATE assign_grades SET timemodified = ? WHERE id = ?",
                (now, grade_id),
            )
            .with_context(|| format!("failed to update assign_grades {grade_id}"))?;
        Ok(())
    }

    fn insert_grade(&self, grade: &NewGrade) -> anyhow::Result<i64> {
        self.conn
            .execute(
                "INSERT INTO assign_grades(assignment, userid, timecreated, timemodified)
                 VALUES(?, ?, ?, ?)",
                (
                    grade.assignment_id,
                    grade.user_id,
                    grade.time_created,
                    grade.time_modified,
                ),
            )
            .context("failed to insert into assign_grades")?;
        Ok(self.conn.last_insert_rowid())
    }

    fn find_feedback(&self, grade_id: i64) -> anyhow::Result<Option<Feedback>> {
        let feedback = self
            .conn
            .query_row(
                "SELECT id, grade, assignment, plaincomment
                 FROM assignfeedback_plaincomment
                 WHERE grade = ?",
                [grade_id],
                |r| {
                    Ok(Feedback {
                        id: r.get(0)?,
                        grade_id: r.get(1)?,
                        assignment_id: r.get(2)?,
                        text: r.get(3)?,
                    })
                },
            )
            .optional()
            .context("failed to look up assignfeedback_plaincomment")?;
        Ok(feedback)
    }

    fn insert_feedback(&self, feedback: &NewFeedback<'_>) -> anyhow::Result<i64> {
        self.conn
            .execute(
                "INSERT INTO assignfeedback_plaincomment(assignment, grade, plaincomment)
                 VALUES(?, ?, ?)",
                (feedback.assignment_id, feedback.grade_id, feedback.text),
            )
            .context("failed to insert into assignfeedback_plaincomment")?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_feedback_text(&self, feedback_id: i64, text: &str) -> anyhow::Result<()> {
        self.conn
            .execute(
                "UPDATE assignfeedback_plaincomment SET plaincomment = ? WHERE id = ?",
                (text, feedback_id),
            )
            .with_context(|| format!("failed to update assignfeedback_plaincomment {feedback_id}"))?;
        Ok(())
    }
}

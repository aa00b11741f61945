use super::log::SyncLog;
use super::model::{EligibleSubmission, NewFeedback, NewGrade, Timestamp};
use super::store::SyncStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GradeLookup {
    Existing(i64),
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Grade and feedback both existed; feedback text replaced.
    FeedbackUpdated { grade_id: i64, feedback_id: i64 },
    /// Grade existed without feedback.
    FeedbackCreated { grade_id: i64, feedback_id: i64 },
    GradeAndFeedbackCreated { grade_id: i64, feedback_id: i64 },
}

pub fn copy_to_feedback(
    store: &dyn SyncStore,
    log: &dyn SyncLog,
    submission: &EligibleSubmission,
    now: Timestamp,
) -> anyhow::Result<UpsertOutcome> {
    let grade = touch_existing_grade(store, log, submission, now)?;

    let GradeLookup::Existing(grade_id) = grade else {
        let grade_id = store.insert_grade(&NewGrade {
            assignment_id: submission.assignment_id,
            user_id: submission.user_id,
            time_created: now,
            time_modified: now,
        })?;
        log.log(&format!("Record inserted in assign_grades, ID: {grade_id}"), 1);
        let feedback_id = insert_feedback(store, log, submission, grade_id)?;
        return Ok(UpsertOutcome::GradeAndFeedbackCreated {
            grade_id,
            feedback_id,
        });
    };

    match store.find_feedback(grade_id)? {
        Some(feedback) => {
            log.log(
                &format!(
                    "Updating assignfeedback_plaincomment, submission ID: {}. Grade ID {}",
                    submission.submission_id, grade_id
                ),
                1,
            );
            store.update_feedback_text(feedback.id, &submission.plaintext)?;
            Ok(UpsertOutcome::FeedbackUpdated {
                grade_id,
                feedback_id: feedback.id,
            })
        }
        // The assignment joined the category after this grade was created.
        None => {
            let feedback_id = insert_feedback(store, log, submission, grade_id)?;
            Ok(UpsertOutcome::FeedbackCreated {
                grade_id,
                feedback_id,
            })
        }
    }
}

fn touch_existing_grade(
    store: &dyn SyncStore,
    log: &dyn SyncLog,
    submission: &EligibleSubmission,
    now: Timestamp,
) -> anyhow::Result<GradeLookup> {
    let Some(grade) = store.find_grade(submission.assignment_id, submission.user_id)? else {
        return Ok(GradeLookup::Missing);
    };
    store.touch_grade(grade.id, now)?;
    log.log(
        &format!(
            "Updated assign_grades for user ID {} and assignment ID {}",
            submission.user_id, submission.assignment_id
        ),
        1,
    );
    Ok(GradeLookup::Existing(grade.id))
}

fn insert_feedback(
    store: &dyn SyncStore,
    log: &dyn SyncLog,
    submission: &EligibleSubmission,
    grade_id: i64,
) -> anyhow::Result<i64> {
    let id = store.insert_feedback(&NewFeedback {
        grade_id,
        assignment_id: submission.assignment_id,
        text: &submission.plaintext,
    })?;
    log.log(
        &format!("Record inserted in assignfeedback_plaincomment, ID: {id}"),
        1,
    );
    Ok(id)
}

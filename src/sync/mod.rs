//! Copies submitted plain text into plain comment feedback.
//!
//! One run:
//! 1. read the watermark, seeding it with "now" on the very first run;
//! 2. overwrite it with "now" (the run start) before touching any submission;
//! 3. select submissions modified at/after the old watermark in the configured scope;
//! 4. per submission, refresh or create the grade and insert or update its feedback.
//!
//! Writes are not wrapped in a transaction. A failure stops the batch and leaves
//! earlier submissions committed and the watermark advanced.

pub mod log;
pub mod model;
pub mod scope;
pub mod store;
pub mod upsert;
pub mod watermark;

use crate::config::ScopeConfig;
use anyhow::Context;
use self::log::SyncLog;
use self::model::Timestamp;
use self::store::SyncStore;
use self::upsert::UpsertOutcome;
use self::watermark::Watermark;
use serde::Serialize;
use uuid::Uuid;

pub trait Clock {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub run_id: String,
    pub started_at: Timestamp,
    pub lower_bound: Timestamp,
    pub first_run: bool,
    pub scope: ScopeConfig,
    pub processed: usize,
    pub grades_created: usize,
    pub grades_touched: usize,
    pub feedback_created: usize,
    pub feedback_updated: usize,
}

impl SyncReport {
    fn record(&mut self, outcome: UpsertOutcome) {
        self.processed += 1;
        match outcome {
            UpsertOutcome::FeedbackUpdated { .. } => {
                self.grades_touched += 1;
                self.feedback_updated += 1;
            }
            UpsertOutcome::FeedbackCreated { .. } => {
                self.grades_touched += 1;
                self.feedback_created += 1;
            }
            UpsertOutcome::GradeAndFeedbackCreated { .. } => {
                self.grades_created += 1;
                self.feedback_created += 1;
            }
        }
    }
}

pub struct SyncJob<'a> {
    store: &'a dyn SyncStore,
    log: &'a dyn SyncLog,
    clock: &'a dyn Clock,
}

impl<'a> SyncJob<'a> {
    pub fn new(store: &'a dyn SyncStore, log: &'a dyn SyncLog, clock: &'a dyn Clock) -> Self {
        Self { store, log, clock }
    }

    pub fn run(&self, scope: &ScopeConfig) -> anyhow::Result<SyncReport> {
        let run_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("copy_to_plaincomment", run_id = %run_id);
        let _guard = span.enter();

        self.log.log("Starting copy to plain comment", 0);

        let started_at = self.clock.now();
        let watermark = watermark::load_watermark(self.store, started_at)
            .context("failed to load watermark")?;
        watermark::advance_watermark(self.store, started_at)
            .context("failed to advance watermark")?;

        let query = scope::resolve(scope, watermark.lower_bound());
        self.log.log(&query.describe(), 0);
        let submissions = self.store.eligible_submissions(&query)?;

        let mut report = SyncReport {
            run_id,
            started_at,
            lower_bound: query.since,
            first_run: watermark == Watermark::FirstRun,
            scope: scope.clone(),
            processed: 0,
            grades_created: 0,
            grades_touched: 0,
            feedback_created: 0,
            feedback_updated: 0,
        };

        for submission in &submissions {
            self.log.log(
                &format!(
                    "Processing submission {} for user {}",
                    submission.submission_id, submission.user_id
                ),
                1,
            );
            let outcome = upsert::copy_to_feedback(self.store, self.log, submission, started_at)
                .with_context(|| {
                    format!(
                        "submission {} (assignment {}, user {})",
                        submission.submission_id, submission.assignment_id, submission.user_id
                    )
                });
            match outcome {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    self.log.log(
                        &format!(
                            "Stopped after {} of {} submissions: {e:#}",
                            report.processed,
                            submissions.len()
                        ),
                        0,
                    );
                    return Err(e);
                }
            }
        }

        self.log.log(
            &format!(
                "Finishing copy to plain comment: {} processed, {} feedback created, {} updated",
                report.processed, report.feedback_created, report.feedback_updated
            ),
            0,
        );
        Ok(report)
    }
}

#[cfg(test)]
mod fake;

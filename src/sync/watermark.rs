use super::model::Timestamp;
use super::store::SyncStore;
use anyhow::Context;

pub const WATERMARK_KEY: &str = "assignsubmission_plaintext_copytoplaincomment_lastrun";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watermark {
    /// Nothing was recorded; the run has no lower bound.
    FirstRun,
    Since(Timestamp),
}

impl Watermark {
    pub fn lower_bound(self) -> Timestamp {
        match self {
            Watermark::FirstRun => 0,
            Watermark::Since(t) => t,
        }
    }
}

pub fn read_watermark(store: &dyn SyncStore) -> anyhow::Result<Option<Timestamp>> {
    let Some(raw) = store.get_value(WATERMARK_KEY)? else {
        return Ok(None);
    };
    let value = raw
        .trim()
        .parse::<Timestamp>()
        .with_context(|| format!("stored watermark is not a timestamp: {raw:?}"))?;
    Ok(Some(value))
}

/// Seeds the watermark with `now` when absent.
pub fn load_watermark(store: &dyn SyncStore, now: Timestamp) -> anyhow::Result<Watermark> {
    match read_watermark(store)? {
        Some(t) => Ok(Watermark::Since(t)),
        None => {
            store.set_value(WATERMARK_KEY, &now.to_string())?;
            Ok(Watermark::FirstRun)
        }
    }
}

/// Must run before any submission is processed: a run that fails halfway
/// still counts as having started at `now`, so its unprocessed submissions
/// are only picked up again once they are modified again.
pub fn advance_watermark(store: &dyn SyncStore, now: Timestamp) -> anyhow::Result<()> {
    store.set_value(WATERMARK_KEY, &now.to_string())
}

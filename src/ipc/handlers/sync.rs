use crate::config;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_i64, require_db, require_id};
use crate::ipc::types::{AppState, Request};
use crate::sync::log::TracingLog;
use crate::sync::store::{SqliteStore, SyncStore};
use crate::sync::watermark;
use crate::sync::{Clock, FixedClock, SyncJob, SystemClock};
use serde_json::json;

fn handle_sync_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let store = SqliteStore::new(conn);
    match watermark::read_watermark(&store) {
        Ok(w) => ok(&req.id, json!({ "watermark": w })),
        Err(e) => err(&req.id, "db_query_failed", format!("{e:#}"), None),
    }
}

fn handle_sync_run(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let now = match optional_i64(req, "now") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let scope = match config::load_scope_config(conn) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };

    let store = SqliteStore::new(conn);
    let log = TracingLog;
    let clock: Box<dyn Clock> = match now {
        Some(t) => Box::new(FixedClock(t)),
        None => Box::new(SystemClock),
    };

    match SyncJob::new(&store, &log, clock.as_ref()).run(&scope) {
        Ok(report) => ok(&req.id, json!(report)),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "copy to plain comment failed");
            err(&req.id, "sync_failed", format!("{e:#}"), None)
        }
    }
}

fn handle_feedback_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignment_id = match require_id(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let user_id = match require_id(req, "userId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let store = SqliteStore::new(conn);
    let grade = match store.find_grade(assignment_id, user_id) {
        Ok(g) => g,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };
    let feedback = match grade.as_ref().map(|g| store.find_feedback(g.id)).transpose() {
        Ok(f) => f.flatten(),
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };
    ok(&req.id, json!({ "grade": grade, "feedback": feedback }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sync.status" => Some(handle_sync_status(state, req)),
        "sync.run" => Some(handle_sync_run(state, req)),
        "feedback.get" => Some(handle_feedback_get(state, req)),
        _ => None,
    }
}

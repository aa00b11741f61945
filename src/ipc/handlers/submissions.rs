use crate::config;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_str, require_db, require_id};
use crate::ipc::types::{AppState, Request};
use crate::submission::{self, SubmissionError};
use crate::sync::{Clock, SystemClock};
use serde_json::json;

fn submission_err(req: &Request, e: SubmissionError) -> serde_json::Value {
    let details = match &e {
        SubmissionError::WordLimitExceeded { limit, count } => {
            Some(json!({ "limit": limit, "count": count }))
        }
        _ => None,
    };
    err(&req.id, e.code(), format!("{e:#}"), details)
}

fn handle_submissions_save(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let text = match req.params.get("text").and_then(|v| v.as_str()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing text", None),
    };
    let status = match optional_str(req, "status") {
        Ok(v) => v.unwrap_or("submitted"),
        Err(e) => return e,
    };

    let cfg = match config::load_assignment_config(conn, assignment_id) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };

    match submission::save(
        conn,
        cfg.word_limit(),
        assignment_id,
        user_id,
        text,
        status,
        SystemClock.now(),
    ) {
        Ok(saved) => ok(&req.id, json!(saved)),
        Err(e) => submission_err(req, e),
    }
}

fn handle_submissions_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let submission_id = match require_id(req, "submissionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match submission::get(conn, submission_id) {
        Ok(Some(row)) => ok(
            &req.id,
            json!({
                "submissionId": row.submission_id,
                "assignmentId": row.assignment_id,
                "text": row.plaintext,
                "wordCount": submission::count_words(&row.plaintext),
                "summary": submission::summary(&row.plaintext),
                "isEmpty": submission::is_empty_text(&row.plaintext),
            }),
        ),
        Ok(None) => err(&req.id, "not_found", "submission has no plain text", None),
        Err(e) => err(&req.id, "db_query_failed", format!("{e:#}"), None),
    }
}

fn handle_submissions_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let submission_id = match require_id(req, "submissionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match submission::remove(conn, submission_id) {
        Ok(removed) => ok(&req.id, json!({ "removed": removed })),
        Err(e) => err(&req.id, "db_delete_failed", format!("{e:#}"), None),
    }
}

fn handle_submissions_copy(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let source = match require_id(req, "sourceSubmissionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let dest = match require_id(req, "destSubmissionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match submission::copy_submission(conn, source, dest) {
        Ok(copied) => ok(&req.id, json!({ "copied": copied })),
        Err(e) => submission_err(req, e),
    }
}

fn handle_assign_delete_instance(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignment_id = match require_id(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match submission::delete_instance(conn, assignment_id) {
        Ok(n) => ok(&req.id, json!({ "deleted": n })),
        Err(e) => err(&req.id, "db_delete_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "submissions.save" => Some(handle_submissions_save(state, req)),
        "submissions.get" => Some(handle_submissions_get(state, req)),
        "submissions.remove" => Some(handle_submissions_remove(state, req)),
        "submissions.copy" => Some(handle_submissions_copy(state, req)),
        "assign.deleteInstance" => Some(handle_assign_delete_instance(state, req)),
        _ => None,
    }
}

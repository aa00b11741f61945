use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;

pub fn require_db<'s>(
    state: &'s AppState,
    req: &Request,
) -> Result<&'s Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn require_id(req: &Request, key: &str) -> Result<i64, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_i64()) {
        Some(v) if v > 0 => Ok(v),
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            format!("{key} must be a positive integer"),
            None,
        )),
        None => Err(err(&req.id, "bad_params", format!("missing {key}"), None)),
    }
}

pub fn optional_bool(req: &Request, key: &str) -> Result<Option<bool>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| err(&req.id, "bad_params", format!("{key} must be a boolean"), None)),
    }
}

pub fn optional_i64(req: &Request, key: &str) -> Result<Option<i64>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| err(&req.id, "bad_params", format!("{key} must be an integer"), None)),
    }
}

pub fn optional_str<'r>(req: &'r Request, key: &str) -> Result<Option<&'r str>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(Some)
            .ok_or_else(|| err(&req.id, "bad_params", format!("{key} must be a string"), None)),
    }
}

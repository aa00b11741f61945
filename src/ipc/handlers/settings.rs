use crate::config::{self, AssignmentConfigPatch, PluginSettingsPatch, WordLimitConfig};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_bool, optional_i64, optional_str, require_db, require_id};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match config::load_plugin_settings(conn) {
        Ok(settings) => ok(&req.id, json!(settings)),
        Err(e) => err(&req.id, "db_query_failed", format!("{e:#}"), None),
    }
}

fn handle_settings_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let patch = match parse_settings_patch(req) {
        Ok(p) => p,
        Err(e) => return e,
    };
    if matches!(patch.course_id, Some(v) if v < 0) {
        return err(&req.id, "bad_params", "courseId must not be negative", None);
    }
    if matches!(patch.grade_category.as_deref(), Some(v) if v.trim().is_empty()) {
        return err(&req.id, "bad_params", "gradeCategory must not be empty", None);
    }

    match config::save_plugin_settings(conn, &patch) {
        Ok(settings) => ok(&req.id, json!(settings)),
        Err(e) => err(&req.id, "db_update_failed", format!("{e:#}"), None),
    }
}

fn parse_settings_patch(req: &Request) -> Result<PluginSettingsPatch, serde_json::Value> {
    Ok(PluginSettingsPatch {
        default: optional_bool(req, "default")?,
        course_id: optional_i64(req, "courseId")?,
        grade_category: optional_str(req, "gradeCategory")?.map(str::to_string),
    })
}

/// Limit fields that are not sent keep their stored value.
fn parse_assignment_patch(
    req: &Request,
    current: WordLimitConfig,
) -> Result<AssignmentConfigPatch, serde_json::Value> {
    let word_limit = optional_i64(req, "wordLimit")?;
    let word_limit_enabled = optional_bool(req, "wordLimitEnabled")?;
    let word_limit = match (word_limit, word_limit_enabled) {
        (None, None) => None,
        (Some(v), _) if v < 0 => {
            return Err(err(&req.id, "bad_params", "wordLimit must not be negative", None));
        }
        (limit, enabled) => {
            let limit = match limit {
                Some(v) => u32::try_from(v).unwrap_or(u32::MAX),
                None => current.limit,
            };
            Some(WordLimitConfig::new(
                Some(limit),
                enabled.unwrap_or(current.enabled || limit > 0),
            ))
        }
    };
    Ok(AssignmentConfigPatch {
        enabled: optional_bool(req, "enabled")?,
        word_limit,
        plain_comment_enabled: optional_bool(req, "plainCommentEnabled")?,
    })
}

fn handle_assign_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignment_id = match require_id(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match config::load_assignment_config(conn, assignment_id) {
        Ok(cfg) => ok(&req.id, json!(cfg)),
        Err(e) => err(&req.id, "db_query_failed", format!("{e:#}"), None),
    }
}

fn handle_assign_config_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assignment_id = match require_id(req, "assignmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let current = match config::load_assignment_config(conn, assignment_id) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };
    let patch = match parse_assignment_patch(req, current.word_limit()) {
        Ok(p) => p,
        Err(e) => return e,
    };

    match config::save_assignment_config(conn, assignment_id, &patch) {
        Ok(cfg) => ok(&req.id, json!(cfg)),
        Err(e) => err(
            &req.id,
            "db_update_failed",
            format!("{e:#}"),
            Some(json!({ "table": "assign_plugin_config" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(handle_settings_get(state, req)),
        "settings.update" => Some(handle_settings_update(state, req)),
        "assign.config.get" => Some(handle_assign_config_get(state, req)),
        "assign.config.update" => Some(handle_assign_config_update(state, req)),
        _ => None,
    }
}

//! Plugin-wide and per-assignment settings.
//!
//! Plugin settings are stored in `config_plugins` under
//! [`PLUGIN`]; per-assignment settings in `assign_plugin_config`.

use crate::db;
use rusqlite::Connection;
use serde::Serialize;

pub const PLUGIN: &str = "assignsubmission_plaintext";
pub const DEFAULT_GRADE_CATEGORY: &str = "REPORT";

const SUBMISSION_PLUGIN: &str = "plaintext";
const SUBMISSION_SUBTYPE: &str = "assignsubmission";
pub const FEEDBACK_PLUGIN: &str = "plaincomment";
pub const FEEDBACK_SUBTYPE: &str = "assignfeedback";

/// Which submissions the sync job looks at. `course_id == 0` means every course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeConfig {
    pub course_id: i64,
    pub grade_category_name: String,
}

impl ScopeConfig {
    pub fn all_courses() -> Self {
        Self {
            course_id: 0,
            grade_category_name: DEFAULT_GRADE_CATEGORY.to_string(),
        }
    }

    pub fn is_all_courses(&self) -> bool {
        self.course_id == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSettings {
    pub default: bool,
    pub course_id: i64,
    pub grade_category: String,
}

impl Default for PluginSettings {
    fn default() -> Self {
        let scope = ScopeConfig::all_courses();
        Self {
            default: false,
            course_id: scope.course_id,
            grade_category: scope.grade_category_name,
        }
    }
}

impl PluginSettings {
    pub fn scope(&self) -> ScopeConfig {
        ScopeConfig {
            course_id: self.course_id,
            grade_category_name: self.grade_category.clone(),
        }
    }
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct PluginSettingsPatch {
    pub default: Option<bool>,
    pub course_id: Option<i64>,
    pub grade_category: Option<String>,
}

pub fn load_plugin_settings(conn: &Connection) -> anyhow::Result<PluginSettings> {
    let mut settings = PluginSettings::default();
    if let Some(v) = db::plugin_config_get(conn, PLUGIN, "default")? {
        settings.default = parse_flag(&v);
    }
    if let Some(v) = db::plugin_config_get(conn, PLUGIN, "ptcourseid")? {
        // Non-numeric input is treated like the admin form treats it: as 0.
        settings.course_id = v.trim().parse().unwrap_or(0);
    }
    if let Some(v) = db::plugin_config_get(conn, PLUGIN, "gcategory")? {
        settings.grade_category = v;
    }
    Ok(settings)
}

pub fn save_plugin_settings(
    conn: &Connection,
    patch: &PluginSettingsPatch,
) -> anyhow::Result<PluginSettings> {
    if let Some(v) = patch.default {
        db::plugin_config_set(conn, PLUGIN, "default", flag(v))?;
    }
    if let Some(v) = patch.course_id {
        anyhow::ensure!(v >= 0, "course id must not be negative");
        db::plugin_config_set(conn, PLUGIN, "ptcourseid", &v.to_string())?;
    }
    if let Some(v) = patch.grade_category.as_deref() {
        db::plugin_config_set(conn, PLUGIN, "gcategory", v.trim())?;
    }
    load_plugin_settings(conn)
}

pub fn load_scope_config(conn: &Connection) -> anyhow::Result<ScopeConfig> {
    Ok(load_plugin_settings(conn)?.scope())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordLimitConfig {
    pub limit: u32,
    pub enabled: bool,
}

impl WordLimitConfig {
    pub fn disabled() -> Self {
        Self {
            limit: 0,
            enabled: false,
        }
    }

    /// A zero limit or an unticked checkbox both disable the limit.
    pub fn new(limit: Option<u32>, enabled: bool) -> Self {
        match limit {
            Some(limit) if limit > 0 && enabled => Self {
                limit,
                enabled: true,
            },
            _ => Self::disabled(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentConfig {
    pub assignment_id: i64,
    pub enabled: bool,
    pub word_limit: u32,
    pub word_limit_enabled: bool,
    pub plain_comment_enabled: bool,
}

impl AssignmentConfig {
    pub fn word_limit(&self) -> WordLimitConfig {
        WordLimitConfig {
            limit: self.word_limit,
            enabled: self.word_limit_enabled,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentConfigPatch {
    pub enabled: Option<bool>,
    pub word_limit: Option<WordLimitConfig>,
    pub plain_comment_enabled: Option<bool>,
}

pub fn load_assignment_config(
    conn: &Connection,
    assignment_id: i64,
) -> anyhow::Result<AssignmentConfig> {
    let get = |plugin: &str, subtype: &str, name: &str| {
        db::assign_plugin_config_get(conn, assignment_id, plugin, subtype, name)
    };

    let enabled = match get(SUBMISSION_PLUGIN, SUBMISSION_SUBTYPE, "enabled")? {
        Some(v) => parse_flag(&v),
        None => load_plugin_settings(conn)?.default,
    };
    let word_limit = get(SUBMISSION_PLUGIN, SUBMISSION_SUBTYPE, "wordlimit")?
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(0);
    let word_limit_enabled = get(SUBMISSION_PLUGIN, SUBMISSION_SUBTYPE, "wordlimitenabled")?
        .map(|v| parse_flag(&v))
        .unwrap_or(false);
    let plain_comment_enabled = get(FEEDBACK_PLUGIN, FEEDBACK_SUBTYPE, "enabled")?
        .map(|v| parse_flag(&v))
        .unwrap_or(false);

    Ok(AssignmentConfig {
        assignment_id,
        enabled,
        word_limit,
        word_limit_enabled,
        plain_comment_enabled,
    })
}

pub fn save_assignment_config(
    conn: &Connection,
    assignment_id: i64,
    patch: &AssignmentConfigPatch,
) -> anyhow::Result<AssignmentConfig> {
    if let Some(v) = patch.enabled {
        db::assign_plugin_config_set(
            conn,
            assignment_id,
            SUBMISSION_PLUGIN,
            SUBMISSION_SUBTYPE,
            "enabled",
            flag(v),
        )?;
    }
    if let Some(limit) = patch.word_limit {
        let limit = WordLimitConfig::new(Some(limit.limit), limit.enabled);
        db::assign_plugin_config_set(
            conn,
            assignment_id,
            SUBMISSION_PLUGIN,
            SUBMISSION_SUBTYPE,
            "wordlimit",
            &limit.limit.to_string(),
        )?;
        db::assign_plugin_config_set(
            conn,
            assignment_id,
            SUBMISSION_PLUGIN,
            SUBMISSION_SUBTYPE,
            "wordlimitenabled",
            flag(limit.enabled),
        )?;
    }
    if let Some(v) = patch.plain_comment_enabled {
        db::assign_plugin_config_set(
            conn,
            assignment_id,
            FEEDBACK_PLUGIN,
            FEEDBACK_SUBTYPE,
            "enabled",
            flag(v),
        )?;
    }
    load_assignment_config(conn, assignment_id)
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim(), "1" | "true")
}

fn flag(v: bool) -> &'static str {
    if v {
        "1"
    } else {
        "0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        conn.execute("INSERT INTO course(id, fullname) VALUES(1, 'C')", [])
            .expect("course");
        conn.execute(
            "INSERT INTO assign(id, course, name) VALUES(5, 1, 'Essay')",
            [],
        )
        .expect("assign");
        conn
    }

    #[test]
    fn plugin_settings_default_to_all_courses_and_report_category() {
        let conn = conn();
        let settings = load_plugin_settings(&conn).unwrap();
        assert_eq!(settings, PluginSettings::default());
        assert_eq!(settings.scope(), ScopeConfig::all_courses());
    }

    #[test]
    fn plugin_settings_patch_keeps_untouched_fields() {
        let conn = conn();
        save_plugin_settings(
            &conn,
            &PluginSettingsPatch {
                course_id: Some(12),
                ..Default::default()
            },
        )
        .unwrap();
        let settings = save_plugin_settings(
            &conn,
            &PluginSettingsPatch {
                grade_category: Some("  Term 1 ".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(settings.course_id, 12);
        assert_eq!(settings.grade_category, "Term 1");
        assert!(!settings.default);
    }

    #[test]
    fn word_limit_without_checkbox_is_stored_as_disabled_zero() {
        let conn = conn();
        let cfg = save_assignment_config(
            &conn,
            5,
            &AssignmentConfigPatch {
                word_limit: Some(WordLimitConfig {
                    limit: 250,
                    enabled: false,
                }),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cfg.word_limit, 0);
        assert!(!cfg.word_limit_enabled);
    }

    #[test]
    fn assignment_enabled_falls_back_to_plugin_default() {
        let conn = conn();
        assert!(!load_assignment_config(&conn, 5).unwrap().enabled);
        save_plugin_settings(
            &conn,
            &PluginSettingsPatch {
                default: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(load_assignment_config(&conn, 5).unwrap().enabled);
    }
}

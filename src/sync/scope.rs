use super::model::Timestamp;
use crate::config::{ScopeConfig, FEEDBACK_PLUGIN, FEEDBACK_SUBTYPE};
use rusqlite::types::Value;

pub const SUBMITTED: &str = "submitted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    AllCourses,
    /// Exact `grade_categories.fullname` match inside one course.
    CourseCategory { course_id: i64, category_name: String },
}

/// Predicate for one run: submitted, modified at/after `since`, plain comment
/// feedback enabled on the assignment, and inside `scope`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityQuery {
    pub since: Timestamp,
    pub scope: Scope,
}

pub fn resolve(config: &ScopeConfig, since: Timestamp) -> EligibilityQuery {
    let scope = if config.is_all_courses() {
        Scope::AllCourses
    } else {
        Scope::CourseCategory {
            course_id: config.course_id,
            category_name: config.grade_category_name.clone(),
        }
    };
    EligibilityQuery { since, scope }
}

const SELECT_ALL_COURSES: &str = "
    SELECT DISTINCT sub.id, u.id, sub.assignment, sub.timemodified, pt.plaintext
    FROM users u
    JOIN assign_submission sub ON sub.userid = u.id
    JOIN assignsubmission_plaintext pt ON pt.submission = sub.id
    JOIN assign_plugin_config pg ON pg.assignment = sub.assignment
    WHERE sub.status = ?
      AND sub.timemodified >= ?
      AND pg.plugin = ?
      AND pg.subtype = ?
      AND pg.name = 'enabled'
      AND pg.value = '1'";

const SELECT_COURSE_CATEGORY: &str = "
    SELECT DISTINCT sub.id, u.id, sub.assignment, sub.timemodified, pt.plaintext
    FROM users u
    JOIN assign_submission sub ON sub.userid = u.id
    JOIN assignsubmission_plaintext pt ON pt.submission = sub.id
    JOIN assign_plugin_config pg ON pg.assignment = sub.assignment
    JOIN assign a ON a.id = sub.assignment
    JOIN grade_items gi ON gi.iteminstance = a.id
                       AND gi.itemtype = 'mod'
                       AND gi.itemmodule = 'assign'
    JOIN grade_categories gcat ON gcat.id = gi.categoryid
    WHERE sub.status = ?
      AND sub.timemodified >= ?
      AND pg.plugin = ?
      AND pg.subtype = ?
      AND pg.name = 'enabled'
      AND pg.value = '1'
      AND a.course = ?
      AND gcat.courseid = ?
      AND gcat.fullname = ?";

impl EligibilityQuery {
    pub fn sql(&self) -> (&'static str, Vec<Value>) {
        let mut params = vec![
            Value::Text(SUBMITTED.to_string()),
            Value::Integer(self.since),
            Value::Text(FEEDBACK_PLUGIN.to_string()),
            Value::Text(FEEDBACK_SUBTYPE.to_string()),
        ];
        match &self.scope {
            Scope::AllCourses => (SELECT_ALL_COURSES, params),
            Scope::CourseCategory {
                course_id,
                category_name,
            } => {
                params.push(Value::Integer(*course_id));
                params.push(Value::Integer(*course_id));
                params.push(Value::Text(category_name.clone()));
                (SELECT_COURSE_CATEGORY, params)
            }
        }
    }

    pub fn describe(&self) -> String {
        match &self.scope {
            Scope::AllCourses => format!("Looking for submissions since last run: {}", self.since),
            Scope::CourseCategory {
                course_id,
                category_name,
            } => format!(
                "Looking for submissions since last run: {} for course: {} and grading category: {}",
                self.since, course_id, category_name
            ),
        }
    }
}

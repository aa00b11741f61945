use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "plaintext.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS config(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            value TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS config_plugins(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            plugin TEXT NOT NULL,
            name TEXT NOT NULL,
            value TEXT NOT NULL,
            UNIQUE(plugin, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL,
            firstname TEXT NOT NULL DEFAULT '',
            lastname TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS course(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fullname TEXT NOT NULL,
            shortname TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS assign(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            course INTEGER NOT NULL,
            name TEXT NOT NULL,
            timemodified INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(course) REFERENCES course(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assign_course ON assign(course)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS assign_plugin_config(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            assignment INTEGER NOT NULL,
            plugin TEXT NOT NULL,
            subtype TEXT NOT NULL,
            name TEXT NOT NULL,
            value TEXT NOT NULL,
            FOREIGN KEY(assignment) REFERENCES assign(id),
            UNIQUE(assignment, plugin, subtype, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assign_submission(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            assignment INTEGER NOT NULL,
            userid INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'new',
            attemptnumber INTEGER NOT NULL DEFAULT 0,
            timecreated INTEGER NOT NULL DEFAULT 0,
            timemodified INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(assignment) REFERENCES assign(id),
            FOREIGN KEY(userid) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assign_submission_status_time
         ON assign_submission(status, timemodified)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assign_submission_assignment_user
         ON assign_submission(assignment, userid)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignsubmission_plaintext(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            submission INTEGER NOT NULL UNIQUE,
            plaintext TEXT NOT NULL DEFAULT '',
            FOREIGN KEY(submission) REFERENCES assign_submission(id)
        )",
        [],
    )?;
    // Host databases may carry the table without the assignment column.
    ensure_plaintext_assignment(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignsubmission_plaintext_assignment
         ON assignsubmission_plaintext(assignment)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_categories(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            courseid INTEGER NOT NULL,
            fullname TEXT NOT NULL,
            FOREIGN KEY(courseid) REFERENCES course(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_items(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            courseid INTEGER NOT NULL,
            categoryid INTEGER,
            itemtype TEXT NOT NULL,
            itemmodule TEXT,
            iteminstance INTEGER,
            FOREIGN KEY(courseid) REFERENCES course(id),
            FOREIGN KEY(categoryid) REFERENCES grade_categories(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_items_instance
         ON grade_items(itemmodule, iteminstance)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assign_grades(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            assignment INTEGER NOT NULL,
            userid INTEGER NOT NULL,
            grade REAL NOT NULL DEFAULT -1,
            timecreated INTEGER NOT NULL,
            timemodified INTEGER NOT NULL,
            FOREIGN KEY(assignment) REFERENCES assign(id),
            FOREIGN KEY(userid) REFERENCES users(id),
            UNIQUE(assignment, userid)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignfeedback_plaincomment(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            assignment INTEGER NOT NULL,
            grade INTEGER NOT NULL UNIQUE,
            plaincomment TEXT NOT NULL DEFAULT '',
            FOREIGN KEY(assignment) REFERENCES assign(id),
            FOREIGN KEY(grade) REFERENCES assign_grades(id)
        )",
        [],
    )?;

    Ok(())
}

fn ensure_plaintext_assignment(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "assignsubmission_plaintext", "assignment")? {
        return Ok(());
    }

    conn.execute(
        "ALTER TABLE assignsubmission_plaintext ADD COLUMN assignment INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    // Backfill from the owning submission row.
    conn.execute(
        "UPDATE assignsubmission_plaintext
         SET assignment = COALESCE(
           (SELECT sub.assignment FROM assign_submission sub
            WHERE sub.id = assignsubmission_plaintext.submission),
           0
         )",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn config_get(conn: &Connection, name: &str) -> anyhow::Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM config WHERE name = ?", [name], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(value)
}

pub fn config_set(conn: &Connection, name: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO config(name, value) VALUES(?, ?)
         ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        (name, value),
    )
    .with_context(|| format!("failed to store config {name}"))?;
    Ok(())
}

pub fn plugin_config_get(
    conn: &Connection,
    plugin: &str,
    name: &str,
) -> anyhow::Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM config_plugins WHERE plugin = ? AND name = ?",
            (plugin, name),
            |r| r.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn plugin_config_set(
    conn: &Connection,
    plugin: &str,
    name: &str,
    value: &str,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO config_plugins(plugin, name, value) VALUES(?, ?, ?)
         ON CONFLICT(plugin, name) DO UPDATE SET value = excluded.value",
        (plugin, name, value),
    )
    .with_context(|| format!("failed to store {plugin}/{name}"))?;
    Ok(())
}

pub fn assign_plugin_config_get(
    conn: &Connection,
    assignment: i64,
    plugin: &str,
    subtype: &str,
    name: &str,
) -> anyhow::Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM assign_plugin_config
             WHERE assignment = ? AND plugin = ? AND subtype = ? AND name = ?",
            (assignment, plugin, subtype, name),
            |r| r.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn assign_plugin_config_set(
    conn: &Connection,
    assignment: i64,
    plugin: &str,
    subtype: &str,
    name: &str,
    value: &str,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO assign_plugin_config(assignment, plugin, subtype, name, value)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(assignment, plugin, subtype, name) DO UPDATE SET value = excluded.value",
        (assignment, plugin, subtype, name, value),
    )
    .with_context(|| format!("failed to store {subtype}_{plugin}/{name} for assignment {assignment}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("first init");
        init_schema(&conn).expect("second init");
        assert!(table_has_column(&conn, "assignsubmission_plaintext", "assignment").unwrap());
    }

    #[test]
    fn plaintext_assignment_column_is_backfilled() {
        let conn = Connection::open_in_memory().expect("open");
        conn.execute_batch(
            "CREATE TABLE assign_submission(id INTEGER PRIMARY KEY, assignment INTEGER NOT NULL,
               userid INTEGER NOT NULL, status TEXT NOT NULL DEFAULT 'new',
               attemptnumber INTEGER NOT NULL DEFAULT 0, timecreated INTEGER NOT NULL DEFAULT 0,
               timemodified INTEGER NOT NULL DEFAULT 0);
             CREATE TABLE assignsubmission_plaintext(id INTEGER PRIMARY KEY,
               submission INTEGER NOT NULL UNIQUE, plaintext TEXT NOT NULL DEFAULT '');
             INSERT INTO assign_submission(id, assignment, userid) VALUES(3, 42, 7);
             INSERT INTO assignsubmission_plaintext(submission, plaintext) VALUES(3, 'old');",
        )
        .expect("legacy tables");

        init_schema(&conn).expect("migrate");
        let assignment: i64 = conn
            .query_row(
                "SELECT assignment FROM assignsubmission_plaintext WHERE submission = 3",
                [],
                |r| r.get(0),
            )
            .expect("row");
        assert_eq!(assignment, 42);
    }

    #[test]
    fn config_set_overwrites() {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("init");
        assert_eq!(config_get(&conn, "k").unwrap(), None);
        config_set(&conn, "k", "1").unwrap();
        config_set(&conn, "k", "2").unwrap();
        assert_eq!(config_get(&conn, "k").unwrap().as_deref(), Some("2"));
    }
}

//! Plain text submissions as students save them.

use crate::config::WordLimitConfig;
use crate::sync::model::Timestamp;
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use thiserror::Error;

const SUMMARY_CHARS: usize = 140;

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error(
        "The word limit for this assignment is {limit} words and you are attempting to submit \
         {count} words. Please review your submission and try again."
    )]
    WordLimitExceeded { limit: u32, count: usize },
    #[error("submission {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for SubmissionError {
    fn from(e: rusqlite::Error) -> Self {
        SubmissionError::Storage(e.into())
    }
}

impl SubmissionError {
    pub fn code(&self) -> &'static str {
        match self {
            SubmissionError::WordLimitExceeded { .. } => "word_limit_exceeded",
            SubmissionError::NotFound(_) => "not_found",
            SubmissionError::Storage(_) => "db_update_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaintextSubmission {
    pub id: i64,
    pub submission_id: i64,
    pub assignment_id: i64,
    pub plaintext: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub submission_id: i64,
    pub plaintext_id: i64,
    pub created: bool,
    pub word_count: usize,
}

/// Tags are dropped; a word is a whitespace-separated token with at least one
/// letter or digit.
pub fn count_words(text: &str) -> usize {
    strip_tags(text)
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count()
}

/// A `<` opens a tag only when followed by a letter, `/`, `!` or `?`; any other
/// `<` (as in `3 < 5`) is text. A tag never closed by `>` is kept as text.
/// Inline tags join their neighbours (`<b>He</b>llo` is one word); every other
/// tag separates words.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut tag: Option<String> = None;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if let Some(body) = tag.as_mut() {
            if c == '>' {
                if !is_inline_tag(body) {
                    out.push(' ');
                }
                tag = None;
            } else {
                body.push(c);
            }
            continue;
        }
        if c == '<' && chars.peek().is_some_and(|&next| opens_tag(next)) {
            tag = Some(String::new());
        } else {
            out.push(c);
        }
    }
    if let Some(body) = tag {
        out.push('<');
        out.push_str(&body);
    }
    out
}

const INLINE_TAGS: [&str; 18] = [
    "a", "abbr", "b", "big", "code", "del", "em", "i", "ins", "mark", "s", "small", "span",
    "strike", "strong", "sub", "sup", "u",
];

fn is_inline_tag(body: &str) -> bool {
    let name = tag_name(body.strip_prefix('/').unwrap_or(body));
    INLINE_TAGS.contains(&name.as_str())
}

fn tag_name(body: &str) -> String {
    body.chars()
        .take_while(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase()
}

fn opens_tag(next: char) -> bool {
    next.is_ascii_alphabetic() || matches!(next, '/' | '!' | '?')
}

/// Lowercased names of the opening tags in `text`.
fn opening_tag_names(text: &str) -> impl Iterator<Item = String> + '_ {
    text.match_indices('<').filter_map(|(at, _)| {
        let rest = &text[at + 1..];
        rest.starts_with(|c: char| c.is_ascii_alphabetic())
            .then(|| tag_name(rest))
    })
}

pub fn check_word_count(limit: WordLimitConfig, text: &str) -> Result<usize, SubmissionError> {
    let count = count_words(text);
    if limit.enabled && count > limit.limit as usize {
        return Err(SubmissionError::WordLimitExceeded {
            limit: limit.limit,
            count,
        });
    }
    Ok(count)
}

const INSERTED_RESOURCES: [&str; 3] = ["img", "video", "audio"];

/// Empty means no words and no embedded image, video or audio element.
pub fn is_empty_text(text: &str) -> bool {
    let text = text.trim();
    count_words(text) == 0
        && !opening_tag_names(text).any(|name| INSERTED_RESOURCES.contains(&name.as_str()))
}

/// First 140 characters, prefixed with the word count when shortened.
pub fn summary(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= SUMMARY_CHARS {
        return text.to_string();
    }
    let short: String = text.chars().take(SUMMARY_CHARS).collect();
    format!("({} words) {}...", count_words(text), short.trim_end())
}

pub fn get(conn: &Connection, submission_id: i64) -> anyhow::Result<Option<PlaintextSubmission>> {
    let row = conn
        .query_row(
            "SELECT id, submission, assignment, plaintext
             FROM assignsubmission_plaintext WHERE submission = ?",
            [submission_id],
            |r| {
                Ok(PlaintextSubmission {
                    id: r.get(0)?,
                    submission_id: r.get(1)?,
                    assignment_id: r.get(2)?,
                    plaintext: r.get(3)?,
                })
            },
        )
        .optional()
        .context("failed to read assignsubmission_plaintext")?;
    Ok(row)
}

/// Validates against the word limit, then creates or updates the text for the
/// (assignment, user) submission and stamps the submission row.
pub fn save(
    conn: &Connection,
    limit: WordLimitConfig,
    assignment_id: i64,
    user_id: i64,
    text: &str,
    status: &str,
    now: Timestamp,
) -> Result<SaveOutcome, SubmissionError> {
    let word_count = check_word_count(limit, text.trim())?;

    // The submission stamp and the text land together or not at all.
    let tx = conn.unchecked_transaction()?;
    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM assign_submission
             WHERE assignment = ? AND userid = ?
             ORDER BY attemptnumber DESC, id DESC
             LIMIT 1",
            (assignment_id, user_id),
            |r| r.get(0),
        )
        .optional()?;

    let submission_id = match existing {
        Some(id) => {
            tx.execute(
                "UPDATE assign_submission SET status = ?, timemodified = ? WHERE id = ?",
                (status, now, id),
            )?;
            id
        }
        None => {
            tx.execute(
                "INSERT INTO assign_submission(assignment, userid, status, timecreated, timemodified)
                 VALUES(?, ?, ?, ?, ?)",
                (assignment_id, user_id, status, now, now),
            )?;
            tx.last_insert_rowid()
        }
    };

    let (plaintext_id, created) = match get(&tx, submission_id)? {
        Some(row) => {
            tx.execute(
                "UPDATE assignsubmission_plaintext SET plaintext = ? WHERE id = ?",
                (text, row.id),
            )?;
            (row.id, false)
        }
        None => {
            tx.execute(
                "INSERT INTO assignsubmission_plaintext(assignment, submission, plaintext)
                 VALUES(?, ?, ?)",
                (assignment_id, submission_id, text),
            )?;
            (tx.last_insert_rowid(), true)
        }
    };
    tx.commit()?;

    tracing::debug!(
        submission_id,
        plaintext_id,
        created,
        word_count,
        "plain text submission saved"
    );

    Ok(SaveOutcome {
        submission_id,
        plaintext_id,
        created,
        word_count,
    })
}

pub fn remove(conn: &Connection, submission_id: i64) -> anyhow::Result<bool> {
    let n = conn.execute(
        "DELETE FROM assignsubmission_plaintext WHERE submission = ?",
        [submission_id],
    )?;
    Ok(n > 0)
}

/// Copies the text of `source` onto `dest`, for a new attempt based on the previous one.
pub fn copy_submission(
    conn: &Connection,
    source_submission_id: i64,
    dest_submission_id: i64,
) -> Result<bool, SubmissionError> {
    let Some(source) = get(conn, source_submission_id)? else {
        return Ok(false);
    };
    let dest_exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM assign_submission WHERE id = ?",
            [dest_submission_id],
            |r| r.get(0),
        )
        .optional()?;
    if dest_exists.is_none() {
        return Err(SubmissionError::NotFound(dest_submission_id));
    }
    conn.execute(
        "INSERT INTO assignsubmission_plaintext(assignment, submission, plaintext)
         VALUES(?, ?, ?)",
        (source.assignment_id, dest_submission_id, &source.plaintext),
    )?;
    Ok(true)
}

pub fn delete_instance(conn: &Connection, assignment_id: i64) -> anyhow::Result<usize> {
    let n = conn.execute(
        "DELETE FROM assignsubmission_plaintext WHERE assignment = ?",
        [assignment_id],
    )?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        conn.execute_batch(
            "INSERT INTO users(id, username) VALUES(9, 'ana');
             INSERT INTO course(id, fullname) VALUES(1, 'C');
             INSERT INTO assign(id, course, name) VALUES(5, 1, 'Essay');",
        )
        .expect("seed");
        conn
    }

    #[test]
    fn count_words_ignores_tags_and_punctuation_runs() {
        assert_eq!(count_words("Hello world"), 2);
        assert_eq!(count_words("  one\ttwo\nthree  "), 3);
        assert_eq!(count_words("<p>Hello</p><p>world</p>"), 2);
        assert_eq!(count_words("wait - what ?"), 2);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn angle_brackets_in_plain_text_are_words_not_tags() {
        let text = "if 3 < 5 then one two three four five six seven eight";
        assert_eq!(count_words(text), 12);
        assert_eq!(count_words("a<b"), 1);
        assert_eq!(count_words("x > y"), 2);
        assert_eq!(count_words("x<y and then no closing bracket"), 6);
        assert_eq!(count_words("<b>He</b>llo"), 1);
        assert_eq!(count_words("one<br>two<br/>three"), 3);
        assert_eq!(count_words("<!-- note --><p>kept</p>"), 1);

        let err = check_word_count(WordLimitConfig::new(Some(5), true), text).unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::WordLimitExceeded { limit: 5, count: 12 }
        ));
    }

    #[test]
    fn embedded_media_is_not_empty() {
        assert!(is_empty_text(""));
        assert!(is_empty_text("<p> </p>"));
        assert!(!is_empty_text(r#"<img src="a.png">"#));
        assert!(!is_empty_text(r#"<p><IMG src="a.png"/></p>"#));
        assert!(!is_empty_text("<video src=\"v.mp4\"></video>"));
        assert!(!is_empty_text("<audio controls></audio>"));
        assert!(!is_empty_text("3 < 5"));
        assert!(is_empty_text("<imgur>"));
    }

    #[test]
    fn word_limit_only_applies_when_enabled() {
        let text = "one two three four";
        assert_eq!(check_word_count(WordLimitConfig::disabled(), text).unwrap(), 4);
        assert_eq!(
            check_word_count(WordLimitConfig::new(Some(4), true), text).unwrap(),
            4
        );
        let err = check_word_count(WordLimitConfig::new(Some(3), true), text).unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::WordLimitExceeded { limit: 3, count: 4 }
        ));
        assert!(err.to_string().starts_with("The word limit for this assignment is 3 words"));
    }

    #[test]
    fn save_creates_then_updates_in_place() {
        let conn = conn();
        let first = save(
            &conn,
            WordLimitConfig::disabled(),
            5,
            9,
            "Hello world",
            "submitted",
            100,
        )
        .unwrap();
        assert!(first.created);
        assert_eq!(first.word_count, 2);

        let second = save(
            &conn,
            WordLimitConfig::disabled(),
            5,
            9,
            "Updated text here",
            "submitted",
            200,
        )
        .unwrap();
        assert!(!second.created);
        assert_eq!(second.submission_id, first.submission_id);
        assert_eq!(second.plaintext_id, first.plaintext_id);

        let stored = get(&conn, first.submission_id).unwrap().unwrap();
        assert_eq!(stored.plaintext, "Updated text here");
        let modified: i64 = conn
            .query_row(
                "SELECT timemodified FROM assign_submission WHERE id = ?",
                [first.submission_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(modified, 200);
    }

    #[test]
    fn failed_text_write_leaves_submission_untouched() {
        let conn = conn();
        let first = save(&conn, WordLimitConfig::disabled(), 5, 9, "v1", "draft", 100).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_plaintext_update BEFORE UPDATE ON assignsubmission_plaintext
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .unwrap();

        let err = save(&conn, WordLimitConfig::disabled(), 5, 9, "v2", "submitted", 200)
            .unwrap_err();
        assert_eq!(err.code(), "db_update_failed");

        let (status, modified): (String, i64) = conn
            .query_row(
                "SELECT status, timemodified FROM assign_submission WHERE id = ?",
                [first.submission_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!((status.as_str(), modified), ("draft", 100));
        assert_eq!(get(&conn, first.submission_id).unwrap().unwrap().plaintext, "v1");
    }

    #[test]
    fn rejected_save_writes_nothing() {
        let conn = conn();
        let err = save(
            &conn,
            WordLimitConfig::new(Some(1), true),
            5,
            9,
            "too many words",
            "submitted",
            100,
        )
        .unwrap_err();
        assert_eq!(err.code(), "word_limit_exceeded");
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM assign_submission", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn copy_remove_and_delete_instance() {
        let conn = conn();
        let saved = save(&conn, WordLimitConfig::disabled(), 5, 9, "draft", "draft", 1).unwrap();
        conn.execute(
            "INSERT INTO assign_submission(id, assignment, userid, attemptnumber) VALUES(50, 5, 9, 1)",
            [],
        )
        .unwrap();

        assert!(copy_submission(&conn, saved.submission_id, 50).unwrap());
        assert_eq!(get(&conn, 50).unwrap().unwrap().plaintext, "draft");
        assert!(matches!(
            copy_submission(&conn, saved.submission_id, 999),
            Err(SubmissionError::NotFound(999))
        ));

        assert!(remove(&conn, 50).unwrap());
        assert!(!remove(&conn, 50).unwrap());
        assert_eq!(delete_instance(&conn, 5).unwrap(), 1);
        assert!(get(&conn, saved.submission_id).unwrap().is_none());
    }

    #[test]
    fn summary_shortens_long_text_with_word_count() {
        assert_eq!(summary("  short  "), "short");
        let long = "word ".repeat(40);
        let s = summary(&long);
        assert!(s.starts_with("(40 words) word word"));
        assert!(s.ends_with("..."));
        assert!(is_empty_text("  <br>  "));
    }
}

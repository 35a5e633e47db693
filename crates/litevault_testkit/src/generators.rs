//! Property-based test generators using proptest.
//!
//! Statements generated here all target a `notes(id INTEGER PRIMARY KEY,
//! body TEXT)` table; see [`NOTES_TABLE_SQL`].

use proptest::prelude::*;

/// Schema the generated statements run against.
pub const NOTES_TABLE_SQL: &str = "CREATE TABLE notes(id INTEGER PRIMARY KEY, body TEXT)";

/// A write against the `notes` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteWrite {
    /// Inserts a row.
    Insert(String),
    /// Rewrites every row's body.
    UpdateAll(String),
    /// Deletes rows whose id is at most the bound.
    DeleteUpTo(u32),
    /// Matches no rows, so leaves the file unchanged.
    NoOp,
}

impl NoteWrite {
    /// Renders the statement as SQL.
    pub fn to_sql(&self) -> String {
        match self {
            NoteWrite::Insert(body) => {
                format!("INSERT INTO notes(body) VALUES ('{}')", escape(body))
            }
            NoteWrite::UpdateAll(body) => format!("UPDATE notes SET body = '{}'", escape(body)),
            NoteWrite::DeleteUpTo(id) => format!("DELETE FROM notes WHERE id <= {id}"),
            NoteWrite::NoOp => "DELETE FROM notes WHERE id < 0".to_string(),
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('\'', "''")
}

/// Strategy for generating note bodies, quotes included.
pub fn note_body_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 ']{0,40}").expect("Invalid regex")
}

/// Strategy for generating a single write.
pub fn note_write_strategy() -> impl Strategy<Value = NoteWrite> {
    prop_oneof![
        4 => note_body_strategy().prop_map(NoteWrite::Insert),
        1 => note_body_strategy().prop_map(NoteWrite::UpdateAll),
        1 => (0u32..8).prop_map(NoteWrite::DeleteUpTo),
        1 => Just(NoteWrite::NoOp),
    ]
}

/// Strategy for generating a sequence of writes.
pub fn note_writes_strategy(max_len: usize) -> impl Strategy<Value = Vec<NoteWrite>> {
    prop::collection::vec(note_write_strategy(), 1..=max_len)
}

/// Strategy for generating valid generation counts.
pub fn generation_count_strategy() -> impl Strategy<Value = usize> {
    1usize..=5
}

/// Strategy for generating valid usernames.
pub fn username_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_.-]{0,31}").expect("Invalid regex")
}

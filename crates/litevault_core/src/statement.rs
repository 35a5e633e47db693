//! Client statement classification and result rows.

use rusqlite::types::ValueRef;
use serde::Serialize;

/// Leading keywords that mark a statement as a write.
const WRITE_KEYWORDS: [&str; 7] = [
    "insert", "update", "delete", "replace", "create", "drop", "alter",
];

/// Whether a client statement reads or mutates the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Goes through the change-sync path.
    Write,
    /// Runs under a shared lock and returns rows.
    Read,
}

impl StatementKind {
    /// Classifies `sql` by its first keyword, ignoring case and leading
    /// whitespace.
    ///
    /// # Example
    ///
    /// ```rust
    /// use litevault_core::StatementKind;
    ///
    /// assert_eq!(StatementKind::classify("  INSERT INTO t VALUES (1)"), StatementKind::Write);
    /// assert_eq!(StatementKind::classify("select * from t"), StatementKind::Read);
    /// ```
    #[must_use]
    pub fn classify(sql: &str) -> Self {
        let keyword: String = sql
            .trim_start()
            .chars()
            .take_while(char::is_ascii_alphabetic)
            .collect::<String>()
            .to_ascii_lowercase();

        if WRITE_KEYWORDS.contains(&keyword.as_str()) {
            StatementKind::Write
        } else {
            StatementKind::Read
        }
    }

    /// Returns true for [`StatementKind::Write`].
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, StatementKind::Write)
    }
}

/// A single column value returned by a read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// 64-bit integer.
    Integer(i64),
    /// Floating point.
    Real(f64),
    /// UTF-8 text (invalid sequences are replaced).
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(r) => SqlValue::Real(r),
            ValueRef::Text(bytes) => SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
        }
    }
}

/// Rows produced by a read, with column names in select order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    /// Column names.
    pub columns: Vec<String>,
    /// One entry per row, aligned with `columns`.
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryRows {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no rows were returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_keywords_classify_as_write() {
        for sql in [
            "INSERT INTO t VALUES (1)",
            "update t set x = 2",
            "\n\tDelete from t",
            "REPLACE INTO t VALUES (3)",
            "create table t(x)",
            "DROP TABLE t",
            "alter table t add column y",
        ] {
            assert_eq!(StatementKind::classify(sql), StatementKind::Write, "{sql}");
        }
    }

    #[test]
    fn everything_else_is_read() {
        for sql in ["SELECT 1", "pragma table_info(t)", "", "insertion", "WITH x AS (SELECT 1) SELECT * FROM x"] {
            assert_eq!(StatementKind::classify(sql), StatementKind::Read, "{sql}");
        }
    }

    #[test]
    fn values_serialize_untagged() {
        let row = vec![
            SqlValue::Integer(1),
            SqlValue::Text("a".into()),
            SqlValue::Null,
            SqlValue::Real(1.5),
        ];
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"[1,"a",null,1.5]"#);
    }
}

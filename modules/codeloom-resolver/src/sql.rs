//! Shallow SQL tokenizer.
//!
//! Extracts the table and column name sets a query touches; downstream
//! only depends on those sets, so a full SQL grammar is deliberately out
//! of scope and a real parser can be swapped in behind this interface.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SqlNames {
    pub tables: BTreeSet<String>,
    pub columns: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// SELECT-only queries.
    Reads,
    /// UPDATE / INSERT / DELETE.
    Modifies,
    Other,
}

const KEYWORDS: [&str; 20] = [
    "select", "from", "where", "join", "update", "into", "insert", "delete", "set", "on",
    "and", "or", "not", "null", "values", "as", "order", "group", "by", "limit",
];

fn table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:from|join|update|into)\s+`?(\w+)`?").unwrap())
}

fn column_clause_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:select|where|set|on)\s+`?(\w+)`?").unwrap())
}

fn column_assign_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`?(\w+)`?\s*=").unwrap())
}

/// Extract table and column names from a query string.
pub fn extract_names(query: &str) -> SqlNames {
    let mut names = SqlNames::default();

    for capture in table_re().captures_iter(query) {
        names.tables.insert(capture[1].to_lowercase());
    }

    for capture in column_clause_re()
        .captures_iter(query)
        .chain(column_assign_re().captures_iter(query))
    {
        let name = capture[1].to_lowercase();
        if KEYWORDS.contains(&name.as_str()) || names.tables.contains(&name) {
            continue;
        }
        if name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        names.columns.insert(name);
    }

    names
}

/// Classify a query for table-edge refinement.
pub fn classify(query: &str) -> QueryKind {
    static MODIFY: OnceLock<Regex> = OnceLock::new();
    static READ: OnceLock<Regex> = OnceLock::new();
    let modify = MODIFY
        .get_or_init(|| Regex::new(r"(?i)\b(?:update|insert|delete)\b").unwrap());
    let read = READ.get_or_init(|| Regex::new(r"(?i)\bselect\b").unwrap());

    if modify.is_match(query) {
        QueryKind::Modifies
    } else if read.is_match(query) {
        QueryKind::Reads
    } else {
        QueryKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn select_extracts_tables_and_columns() {
        let names = extract_names("SELECT name FROM users WHERE id=?");
        assert_eq!(names.tables, set(&["users"]));
        assert_eq!(names.columns, set(&["name", "id"]));
        assert_eq!(classify("SELECT name FROM users WHERE id=?"), QueryKind::Reads);
    }

    #[test]
    fn update_extracts_and_classifies() {
        let names = extract_names("UPDATE users SET name = 'x' WHERE id = 3");
        assert_eq!(names.tables, set(&["users"]));
        assert!(names.columns.contains("name"));
        assert!(names.columns.contains("id"));
        assert_eq!(classify("UPDATE users SET name='x'"), QueryKind::Modifies);
    }

    #[test]
    fn join_tables_are_collected() {
        let names =
            extract_names("SELECT u.id FROM users u JOIN orders o ON u.id = o.user_id");
        assert!(names.tables.contains("users"));
        assert!(names.tables.contains("orders"));
    }

    #[test]
    fn insert_is_a_modification() {
        let names = extract_names("INSERT INTO audit_log VALUES (1, 'x')");
        assert_eq!(names.tables, set(&["audit_log"]));
        assert_eq!(classify("INSERT INTO audit_log VALUES (1)"), QueryKind::Modifies);
    }

    #[test]
    fn keywords_and_numbers_are_not_columns() {
        let names = extract_names("SELECT * FROM t WHERE 1=1");
        assert!(!names.columns.contains("1"));
        assert!(!names.columns.contains("select"));
    }
}

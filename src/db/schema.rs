//! SQL DDL for the local application store.
//!
//! The embedded schema is the same file the migration runner reads, so a
//! first run without a migrations directory ends up with identical tables.

/// Bumped whenever `SQLITE_INIT` changes; stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

pub const SQLITE_INIT: &str = include_str!("../../migrations/0001_init.sql");

/// Split the bundled DDL into executable statements.
/// sqlx runs one statement per query; the schema contains no triggers, so a
/// plain `;` split is sufficient.
pub fn statements() -> impl Iterator<Item = &'static str> {
    SQLITE_INIT
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !is_comment_only(s))
}

fn is_comment_only(stmt: &str) -> bool {
    stmt.lines()
        .map(str::trim)
        .all(|l| l.is_empty() || l.starts_with("--"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_is_created() {
        let creates: Vec<_> = statements()
            .filter(|s| s.starts_with("CREATE TABLE"))
            .collect();
        for table in [
            "users",
            "servers",
            "saved_searches",
            "search_history",
            "local_files",
            "node_history",
            "ai_settings",
        ] {
            assert!(
                creates
                    .iter()
                    .any(|s| s.contains(&format!("IF NOT EXISTS {table} ("))),
                "missing table {table}"
            );
        }
    }
}

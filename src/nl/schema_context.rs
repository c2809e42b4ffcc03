/// Tables a generated query may reference. Must stay in lockstep with
/// `schema_text()`; the tests below cross-check the two.
pub const ALLOWED_TABLES: &[&str] = &["File", "Email", "TrelloCard", "SyncStatus"];

/// The subset of allowlisted tables holding per-user rows. Queries touching
/// these must carry the caller's user id; `SyncStatus` is a pure lookup table.
pub const USER_SCOPED_TABLES: &[&str] = &["File", "Email", "TrelloCard"];

/// Schema description handed to the generators. Static, versioned with the
/// code; pure data with no side effects.
pub fn schema_text() -> &'static str {
    r#"# DATABASE SCHEMA (v1)

Engine: DuckDB. Identifiers are case sensitive and must be double-quoted.

## Table: "File" (user-scoped: filter with "user_id" = '<caller id>')
| Column | Type | Notes |
|---|---|---|
| id | VARCHAR | primary key |
| user_id | VARCHAR | owning user |
| name | VARCHAR | file name |
| mime_type | VARCHAR | e.g. application/pdf |
| owners | VARCHAR | JSON array of owner email addresses; use json_each to expand before aggregating by owner |
| size_bytes | BIGINT | may exceed 2^53; returned as a string |
| web_link | VARCHAR | |
| modified_at | TIMESTAMP | |
| created_at | TIMESTAMP | |

## Table: "Email" (user-scoped: filter with "user_id" = '<caller id>')
| Column | Type | Notes |
|---|---|---|
| id | VARCHAR | primary key |
| user_id | VARCHAR | owning user |
| subject | VARCHAR | |
| sender | VARCHAR | |
| recipients | VARCHAR | comma separated |
| snippet | VARCHAR | first lines of the body |
| is_unread | BOOLEAN | |
| received_at | TIMESTAMP | |

## Table: "TrelloCard" (user-scoped: filter with "user_id" = '<caller id>')
| Column | Type | Notes |
|---|---|---|
| id | VARCHAR | primary key |
| user_id | VARCHAR | owning user |
| name | VARCHAR | card title |
| description | VARCHAR | |
| board_name | VARCHAR | |
| list_name | VARCHAR | |
| due_at | TIMESTAMP | nullable |
| is_closed | BOOLEAN | archived cards |
| updated_at | TIMESTAMP | |

## Table: "SyncStatus" (reference table, no user filter required)
| Column | Type | Notes |
|---|---|---|
| source | VARCHAR | 'drive', 'gmail' or 'trello' |
| last_synced_at | TIMESTAMP | |
| record_count | BIGINT | |
"#
}

pub fn is_user_scoped(table: &str) -> bool {
    USER_SCOPED_TABLES.contains(&table)
}

#[cfg(test)]
mod tests {
    use super::*;

    // A table named in the schema text but missing from the allowlist (or the
    // reverse) silently breaks either generation or validation.
    #[test]
    fn schema_text_and_allowlist_stay_in_lockstep() {
        let text = schema_text();
        for table in ALLOWED_TABLES {
            assert!(
                text.contains(&format!("## Table: \"{}\"", table)),
                "allowlisted table {} missing from schema text",
                table
            );
        }

        let described = text
            .lines()
            .filter(|l| l.starts_with("## Table: "))
            .count();
        assert_eq!(described, ALLOWED_TABLES.len());
    }

    #[test]
    fn user_scoped_tables_are_a_subset_of_the_allowlist() {
        for table in USER_SCOPED_TABLES {
            assert!(ALLOWED_TABLES.contains(table));
        }
        assert!(!is_user_scoped("SyncStatus"));
        assert!(is_user_scoped("File"));
    }
}

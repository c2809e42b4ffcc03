use crate::nl::schema_context::{is_user_scoped, ALLOWED_TABLES};
use regex::Regex;
use std::sync::LazyLock;

/// Hard cap on generated statement length. Anything longer is almost
/// certainly a prompt-injection-amplified payload, not a real query.
pub const MAX_SQL_LENGTH: usize = 5000;

/// Row-count ceiling enforced on every executed query.
pub const ROW_LIMIT_CEILING: u64 = 1000;

/// Verdict of the safety validator over one candidate statement.
///
/// `is_valid == true` guarantees `sanitized_sql` is present, starts with
/// SELECT, contains no forbidden token, references only allowlisted tables,
/// carries the caller's user id on every user-scoped table it touches, and
/// has a LIMIT no larger than the ceiling.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub sanitized_sql: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn invalid(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            sanitized_sql: None,
            errors,
            warnings: Vec::new(),
        }
    }
}

/// Mutating and administrative verbs. The scan is a word-boundary match over
/// the whole statement, string literals included: a literal containing DROP
/// is rejected too. Accepted false-positive policy, safety over
/// permissiveness.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "CREATE", "TRUNCATE", "GRANT", "REVOKE",
    "ATTACH", "DETACH", "PRAGMA", "VACUUM", "CALL", "COPY", "EXPORT", "INSTALL", "LOAD",
];

/// Functions that reach outside the database (filesystem, environment).
const FORBIDDEN_FUNCTIONS: &[&str] = &["read_csv", "read_csv_auto", "read_parquet", "glob", "getenv"];

static FORBIDDEN_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({})\b", FORBIDDEN_KEYWORDS.join("|"))).unwrap()
});

static FORBIDDEN_FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({})\s*\(", FORBIDDEN_FUNCTIONS.join("|"))).unwrap()
});

static TABLE_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:FROM|JOIN)\s+"?([A-Za-z_][A-Za-z0-9_]*)"?"#).unwrap()
});

static LIMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\s+(\d+)").unwrap());

static WILDCARD_LIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIKE\s+'%").unwrap());

/// Statically validates one candidate statement for the given caller.
///
/// Generator output is untrusted input; this is the trust boundary. Checks
/// run in order and stop at the first failing category, accumulating every
/// message within that category:
///
/// 1. basic shape (non-empty, length cap, balanced parentheses, leading SELECT)
/// 2. forbidden keyword/function scan
/// 3. FROM/JOIN table allowlist
/// 4. per-user isolation on user-scoped tables
/// 5. LIMIT rewrite to the ceiling (always succeeds)
/// 6. advisory performance warnings (non-blocking)
pub fn validate(sql: &str, user_id: &str) -> ValidationResult {
    let trimmed = sql.trim();

    // 1. basic shape
    let mut errors = Vec::new();
    if trimmed.is_empty() {
        return ValidationResult::invalid(vec!["SQL query is empty".to_string()]);
    }
    if trimmed.len() > MAX_SQL_LENGTH {
        errors.push(format!(
            "SQL query exceeds maximum length of {} characters",
            MAX_SQL_LENGTH
        ));
    }
    if !parentheses_balanced(trimmed) {
        errors.push("SQL query has unbalanced parentheses".to_string());
    }
    if !trimmed.to_uppercase().starts_with("SELECT") {
        let verb = trimmed
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_uppercase();
        errors.push(format!("Only SELECT statements are allowed, found: {}", verb));
    }
    if !errors.is_empty() {
        return ValidationResult::invalid(errors);
    }

    // 2. forbidden operations
    let mut errors = Vec::new();
    for capture in FORBIDDEN_KEYWORD_RE.captures_iter(trimmed) {
        let keyword = capture[1].to_uppercase();
        let message = format!("Forbidden SQL keyword: {}", keyword);
        if !errors.contains(&message) {
            errors.push(message);
        }
    }
    for capture in FORBIDDEN_FUNCTION_RE.captures_iter(trimmed) {
        errors.push(format!(
            "Forbidden SQL function: {}",
            capture[1].to_lowercase()
        ));
    }
    if !errors.is_empty() {
        return ValidationResult::invalid(errors);
    }

    // 3. table allowlist
    let tables = referenced_tables(trimmed);
    let mut errors = Vec::new();
    for table in &tables {
        if !ALLOWED_TABLES
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(table))
        {
            errors.push(format!("Table is not allowed: {}", table));
        }
    }
    if !errors.is_empty() {
        return ValidationResult::invalid(errors);
    }

    // 4. user isolation. Literal pattern match, not an AST walk: the user id
    // must appear in an equality against user_id somewhere in the text. A
    // query binding the id through a subquery parameter is wrongly rejected
    // and an unrelated comparison containing the literal id is wrongly
    // accepted; known limitation, deliberately not hardened here.
    let isolation_re = user_filter_pattern(user_id);
    let mut errors = Vec::new();
    for table in &tables {
        let canonical = ALLOWED_TABLES
            .iter()
            .find(|allowed| allowed.eq_ignore_ascii_case(table))
            .copied()
            .unwrap_or(table.as_str());
        if is_user_scoped(canonical) && !isolation_re.is_match(trimmed) {
            errors.push(format!(
                "Query references table {} without filtering by the caller's user id",
                canonical
            ));
        }
    }
    if !errors.is_empty() {
        return ValidationResult::invalid(errors);
    }

    // 6 before 5: warnings look at the statement as generated, before the
    // LIMIT rewrite hides the missing clause.
    let mut warnings = Vec::new();
    let upper = trimmed.to_uppercase();
    let has_limit = LIMIT_RE.is_match(trimmed);
    if upper.contains("GROUP BY") && !has_limit {
        warnings.push("GROUP BY without LIMIT may aggregate many rows".to_string());
    }
    if upper.contains("ORDER BY") && !has_limit {
        warnings.push("ORDER BY without LIMIT may sort many rows".to_string());
    }
    if WILDCARD_LIKE_RE.is_match(trimmed) {
        warnings.push("Leading-wildcard LIKE cannot use an index".to_string());
    }

    // 5. safety-limit rewrite; never fails
    let sanitized = enforce_row_limit(trimmed);

    ValidationResult {
        is_valid: true,
        sanitized_sql: Some(sanitized),
        errors: Vec::new(),
        warnings,
    }
}

fn parentheses_balanced(sql: &str) -> bool {
    let mut depth: i64 = 0;
    for ch in sql.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Identifiers following FROM/JOIN, deduplicated, quoting-tolerant. Derived
/// aliases and subqueries are invisible to this extraction; that is the same
/// heuristic trade-off as the isolation check.
fn referenced_tables(sql: &str) -> Vec<String> {
    let mut tables = Vec::new();
    for capture in TABLE_REF_RE.captures_iter(sql) {
        let name = capture[1].to_string();
        if !tables.iter().any(|t: &String| t.eq_ignore_ascii_case(&name)) {
            tables.push(name);
        }
    }
    tables
}

/// Equality of the literal user id against a user_id column, tolerant of
/// identifier quoting, value quoting style and comparison order.
fn user_filter_pattern(user_id: &str) -> Regex {
    let id = regex::escape(user_id);
    Regex::new(&format!(
        r#"(?i)("?user_id"?\s*=\s*['"]{id}['"])|(['"]{id}['"]\s*=\s*"?user_id"?)"#
    ))
    .unwrap()
}

/// Appends or tightens the LIMIT clause so at most `ROW_LIMIT_CEILING` rows
/// can come back. Idempotent: running it over its own output is a no-op.
fn enforce_row_limit(sql: &str) -> String {
    let trimmed = sql.trim().trim_end_matches(';').trim_end();

    if !LIMIT_RE.is_match(trimmed) {
        return format!("{} LIMIT {}", trimmed, ROW_LIMIT_CEILING);
    }

    LIMIT_RE
        .replace_all(trimmed, |caps: &regex::Captures| {
            let value: u64 = caps[1].parse().unwrap_or(ROW_LIMIT_CEILING);
            format!("LIMIT {}", value.min(ROW_LIMIT_CEILING))
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const UID: &str = "user-123";

    fn assert_valid(sql: &str) -> ValidationResult {
        let result = validate(sql, UID);
        assert!(result.is_valid, "expected valid, got {:?}", result.errors);
        result
    }

    #[test]
    fn accepts_scoped_select_and_appends_limit() {
        let result = assert_valid(
            r#"SELECT COUNT(*) as file_count FROM "File" WHERE "user_id" = 'user-123'"#,
        );
        let sql = result.sanitized_sql.unwrap();
        assert!(sql.ends_with("LIMIT 1000"), "got: {}", sql);
    }

    #[test]
    fn rejects_empty_sql() {
        let result = validate("   ", UID);
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["SQL query is empty"]);
        assert!(result.sanitized_sql.is_none());
    }

    #[test]
    fn rejects_non_select_leading_verb() {
        let result = validate(r#"WITH x AS (SELECT 1) SELECT * FROM x"#, UID);
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("Only SELECT"));
    }

    #[test]
    fn rejects_overlong_sql() {
        let filler = "x".repeat(MAX_SQL_LENGTH);
        let result = validate(&format!("SELECT '{}'", filler), UID);
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("maximum length"));
    }

    #[test]
    fn rejects_unbalanced_parentheses() {
        let result = validate(r#"SELECT COUNT(* FROM "File""#, UID);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("parentheses")));
    }

    #[test]
    fn rejects_drop_by_name() {
        let result = validate(r#"DROP TABLE "File";"#, UID);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("DROP")));

        // Smuggled after a SELECT it is caught by the keyword scan instead
        let result = validate(r#"SELECT 1; DROP TABLE "File";"#, UID);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("DROP")));
    }

    #[test]
    fn keyword_scan_hits_string_literals_too() {
        let result = validate(
            r#"SELECT * FROM "Email" WHERE "subject" = 'please DELETE this' AND "user_id" = 'user-123'"#,
            UID,
        );
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("DELETE")));
    }

    #[test]
    fn keyword_scan_runs_even_with_nested_noise_parentheses() {
        let result = validate(r#"SELECT ((1)) FROM "File" WHERE (1=1) AND 'TRUNCATE' = 'x'"#, UID);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("TRUNCATE")));
    }

    #[test]
    fn column_names_containing_keywords_are_fine() {
        // created_at and updated_at must not trip the CREATE/UPDATE scan
        assert_valid(
            r#"SELECT "created_at" FROM "File" WHERE "user_id" = 'user-123' LIMIT 10"#,
        );
        assert_valid(
            r#"SELECT "updated_at" FROM "TrelloCard" WHERE "user_id" = 'user-123' LIMIT 10"#,
        );
    }

    #[test]
    fn rejects_forbidden_functions() {
        let result = validate(r#"SELECT * FROM read_csv('/etc/passwd')"#, UID);
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("read_csv")));
    }

    #[test]
    fn rejects_unknown_table_by_name() {
        let result = validate(
            r#"SELECT * FROM "Secrets" WHERE "user_id" = 'user-123'"#,
            UID,
        );
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["Table is not allowed: Secrets"]);
    }

    #[test]
    fn rejects_missing_user_isolation_naming_the_table() {
        let result = validate(r#"SELECT * FROM "File""#, UID);
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("File"));
        assert!(result.errors[0].contains("user id"));
    }

    #[test]
    fn lookup_tables_need_no_isolation() {
        assert_valid(r#"SELECT * FROM "SyncStatus""#);
    }

    #[test]
    fn isolation_accepts_reversed_comparison_and_quoting_styles() {
        assert_valid(r#"SELECT * FROM "Email" WHERE 'user-123' = "user_id" LIMIT 5"#);
        assert_valid(r#"SELECT * FROM "Email" WHERE user_id = 'user-123' LIMIT 5"#);
    }

    #[test]
    fn isolation_requires_the_callers_own_id() {
        let result = validate(
            r#"SELECT * FROM "Email" WHERE "user_id" = 'someone-else'"#,
            UID,
        );
        assert!(!result.is_valid);
    }

    #[test]
    fn join_tables_are_each_checked() {
        let result = validate(
            r#"SELECT * FROM "File" f JOIN "Hidden" h ON f.id = h.id WHERE "user_id" = 'user-123'"#,
            UID,
        );
        assert!(!result.is_valid);
        assert!(result.errors.iter().any(|e| e.contains("Hidden")));
    }

    #[test]
    fn oversized_limit_is_rewritten_down_not_rejected() {
        let result = assert_valid(
            r#"SELECT * FROM "File" WHERE "user_id" = 'user-123' LIMIT 5000"#,
        );
        assert!(result.sanitized_sql.unwrap().ends_with("LIMIT 1000"));
    }

    #[test]
    fn limit_within_ceiling_is_preserved() {
        let result = assert_valid(
            r#"SELECT * FROM "File" WHERE "user_id" = 'user-123' LIMIT 25"#,
        );
        assert!(result.sanitized_sql.unwrap().ends_with("LIMIT 25"));
    }

    #[test]
    fn sanitization_is_idempotent() {
        let first = assert_valid(r#"SELECT * FROM "File" WHERE "user_id" = 'user-123'"#);
        let sanitized = first.sanitized_sql.unwrap();
        let second = assert_valid(&sanitized);
        assert_eq!(second.sanitized_sql.unwrap(), sanitized);
    }

    #[test]
    fn sanitized_sql_has_exactly_one_limit() {
        let result = assert_valid(r#"SELECT * FROM "File" WHERE "user_id" = 'user-123';"#);
        let sql = result.sanitized_sql.unwrap();
        assert_eq!(LIMIT_RE.find_iter(&sql).count(), 1);
        assert!(!sql.contains(';'));
    }

    #[test]
    fn warns_on_group_by_without_limit() {
        let result = assert_valid(
            r#"SELECT "mime_type", COUNT(*) FROM "File" WHERE "user_id" = 'user-123' GROUP BY "mime_type""#,
        );
        assert!(result.warnings.iter().any(|w| w.contains("GROUP BY")));
        // rewrite still happened
        assert!(result.sanitized_sql.unwrap().contains("LIMIT 1000"));
    }

    #[test]
    fn warns_on_leading_wildcard_like() {
        let result = assert_valid(
            r#"SELECT * FROM "Email" WHERE "subject" LIKE '%urgent%' AND "user_id" = 'user-123' LIMIT 10"#,
        );
        assert!(result.warnings.iter().any(|w| w.contains("LIKE")));
    }

    #[test]
    fn user_id_with_regex_metacharacters_is_escaped() {
        let uid = "user.123+x";
        let sql = format!(r#"SELECT * FROM "File" WHERE "user_id" = '{}'"#, uid);
        assert!(validate(&sql, uid).is_valid);
        assert!(!validate(r#"SELECT * FROM "File" WHERE "user_id" = 'userX123+x'"#, uid).is_valid);
    }
}

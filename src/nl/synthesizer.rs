use crate::llm::client::{ChatClient, ChatMessage};
use crate::llm::LlmError;
use crate::nl::executor::Row;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Marker handed to the model when a query matched nothing. Never an empty
/// string: the model must be told explicitly that zero rows came back.
pub const NO_RESULTS_MARKER: &str = "No results found.";

/// Rows beyond this many are summarized as a trailing count.
const DISPLAY_ROW_CAP: usize = 50;

/// Cell strings longer than this are truncated with an ellipsis.
const CELL_TEXT_CAP: usize = 100;

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}([T ].*)?$").unwrap());

/// Turns query rows into a natural-language answer grounded in those rows.
pub struct ResponseSynthesizer {
    chat: Arc<ChatClient>,
    model: String,
}

impl ResponseSynthesizer {
    pub fn new(chat: Arc<ChatClient>, model: String) -> Self {
        Self { chat, model }
    }

    pub async fn generate_response(
        &self,
        question: &str,
        sql: &str,
        rows: &[Row],
        explanation: &str,
    ) -> Result<String, LlmError> {
        let formatted = format_results(rows);
        debug!(formatted_len = formatted.len(), "Formatted rows for synthesis");

        let prompt = format!(
            r#"A user asked: "{question}"

The following SQL query was run on their personal data (files, emails and Trello cards):
{sql}

Query explanation: {explanation}

Query results:
{formatted}

Answer the user's question conversationally, based strictly on the query results above.
Do not invent any facts that are not present in the results. If the results say "{NO_RESULTS_MARKER}",
say that nothing matched. Keep the answer short."#,
        );

        self.chat
            .chat(&self.model, 0.3, vec![ChatMessage::user(prompt)])
            .await
    }
}

/// Compact textual rendering of query results for model consumption.
///
/// Zero rows produce the explicit no-results marker, one row renders as
/// key:value lines, more rows as a header, delimiter and up to
/// `DISPLAY_ROW_CAP` data rows with a trailing omission note.
pub fn format_results(rows: &[Row]) -> String {
    match rows {
        [] => NO_RESULTS_MARKER.to_string(),
        [row] => row
            .iter()
            .map(|(name, value)| format!("{}: {}", name, format_cell(value)))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => {
            let columns: Vec<&String> = rows[0].keys().collect();
            let mut out = columns
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(" | ");
            out.push('\n');
            out.push_str(&vec!["---"; columns.len()].join(" | "));

            for row in rows.iter().take(DISPLAY_ROW_CAP) {
                out.push('\n');
                let line = columns
                    .iter()
                    .map(|c| format_cell(row.get(*c).unwrap_or(&Value::Null)))
                    .collect::<Vec<_>>()
                    .join(" | ");
                out.push_str(&line);
            }

            if rows.len() > DISPLAY_ROW_CAP {
                out.push_str(&format!(
                    "\n... and {} more rows",
                    rows.len() - DISPLAY_ROW_CAP
                ));
            }
            out
        }
    }
}

/// Formats one cell by value type: long strings truncated, numbers with
/// thousands separators, date-like values as YYYY-MM-DD, null as the
/// literal `null`.
fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => {
            if ISO_DATE_RE.is_match(s) {
                return s.chars().take(10).collect();
            }
            if s.chars().count() > CELL_TEXT_CAP {
                let truncated: String = s.chars().take(CELL_TEXT_CAP).collect();
                format!("{}...", truncated)
            } else {
                s.clone()
            }
        }
        other => other.to_string(),
    }
}

fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return group_thousands(&i.to_string());
    }
    if let Some(u) = n.as_u64() {
        return group_thousands(&u.to_string());
    }
    match n.as_f64() {
        Some(f) => {
            let text = f.to_string();
            match text.split_once('.') {
                Some((whole, frac)) => format!("{}.{}", group_thousands(whole), frac),
                None => group_thousands(&text),
            }
        }
        None => n.to_string(),
    }
}

/// Inserts thousands separators into a decimal integer string, sign aware.
fn group_thousands(digits: &str) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };

    let mut grouped = String::new();
    let chars: Vec<char> = digits.chars().collect();
    for (i, ch) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*ch);
    }
    format!("{}{}", sign, grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        let mut map = Row::new();
        for (name, value) in pairs {
            map.insert(name.to_string(), value.clone());
        }
        map
    }

    #[test]
    fn empty_results_produce_the_marker() {
        assert_eq!(format_results(&[]), NO_RESULTS_MARKER);
    }

    #[test]
    fn single_row_renders_as_key_value_lines() {
        let rows = vec![row(&[("file_count", json!(25))])];
        assert_eq!(format_results(&rows), "file_count: 25");
    }

    #[test]
    fn multiple_rows_render_header_and_delimiter() {
        let rows = vec![
            row(&[("name", json!("a.txt")), ("size_bytes", json!(10))]),
            row(&[("name", json!("b.txt")), ("size_bytes", json!(20))]),
        ];
        let out = format_results(&rows);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "name | size_bytes");
        assert_eq!(lines[1], "--- | ---");
        assert_eq!(lines[2], "a.txt | 10");
        assert_eq!(lines[3], "b.txt | 20");
    }

    #[test]
    fn rows_beyond_the_display_cap_are_summarized() {
        let rows: Vec<Row> = (0..60).map(|i| row(&[("n", json!(i))])).collect();
        let out = format_results(&rows);
        assert!(out.ends_with("... and 10 more rows"));
        // header + delimiter + 50 data rows + trailer
        assert_eq!(out.lines().count(), 53);
    }

    #[test]
    fn long_strings_are_truncated_with_ellipsis() {
        let long = "x".repeat(150);
        let cell = format_cell(&json!(long));
        assert_eq!(cell.chars().count(), 103);
        assert!(cell.ends_with("..."));
    }

    #[test]
    fn numbers_get_thousands_separators() {
        assert_eq!(format_cell(&json!(1234567)), "1,234,567");
        assert_eq!(format_cell(&json!(-1234)), "-1,234");
        assert_eq!(format_cell(&json!(999)), "999");
        assert_eq!(format_cell(&json!(1234.5)), "1,234.5");
    }

    #[test]
    fn date_like_strings_display_as_plain_dates() {
        assert_eq!(
            format_cell(&json!("2024-03-01T09:30:00+00:00")),
            "2024-03-01"
        );
        assert_eq!(format_cell(&json!("2024-03-01")), "2024-03-01");
        // Large-integer-as-string values are not dates
        assert_eq!(
            format_cell(&json!("9007199254740992")),
            "9007199254740992"
        );
    }

    #[test]
    fn null_renders_as_literal_null() {
        assert_eq!(format_cell(&Value::Null), "null");
    }
}

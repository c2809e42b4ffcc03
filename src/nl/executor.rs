use crate::db::pool::DuckDbConnectionManager;
use crate::error::AppError;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use duckdb::types::{TimeUnit, ValueRef};
use r2d2::Pool;
use serde_json::{json, Value};
use tracing::{debug, info};

/// One result row: column name to JSON value, in SELECT order.
pub type Row = serde_json::Map<String, Value>;

/// Integers beyond this magnitude silently lose precision in a JSON number
/// (IEEE 754 double mantissa), so they are rendered as strings instead.
const MAX_SAFE_INTEGER: i128 = 9_007_199_254_740_991;

/// Runs sanitized SQL against the store and returns normalized rows.
///
/// Thin by design: the statement arriving here has already passed the safety
/// validator, so the only concern left is the engine's serialization quirks.
pub struct QueryExecutor {
    pool: Pool<DuckDbConnectionManager>,
}

impl QueryExecutor {
    pub fn new(pool: Pool<DuckDbConnectionManager>) -> Self {
        Self { pool }
    }

    /// Executes one read-only statement. Engine failures surface as a
    /// DatabaseError tagged with the operation name; never retried here.
    pub async fn execute(&self, sanitized_sql: &str) -> Result<Vec<Row>, AppError> {
        let pool = self.pool.clone();
        let sql = sanitized_sql.to_string();

        debug!(sql = %sql, "Executing sanitized query");

        // DuckDB statements are not Send; all connection use stays on a
        // blocking thread.
        let rows = tokio::task::spawn_blocking(move || -> Result<Vec<Row>, String> {
            let conn = pool.get().map_err(|e| e.to_string())?;
            let mut stmt = conn.prepare(&sql).map_err(|e| e.to_string())?;

            let mut rows = stmt.query([]).map_err(|e| e.to_string())?;

            let column_names: Vec<String> = rows
                .as_ref()
                .map(|s| {
                    (0..s.column_count())
                        .filter_map(|i| s.column_name(i).ok().map(|n| n.to_string()))
                        .collect()
                })
                .unwrap_or_default();

            let mut result_rows = Vec::new();
            while let Some(row) = rows.next().map_err(|e| e.to_string())? {
                let mut mapped = Row::new();
                for (idx, name) in column_names.iter().enumerate() {
                    let value = match row.get_ref(idx) {
                        Ok(value_ref) => normalize_value(value_ref).unwrap_or_else(|| {
                            // Unmodelled column type: fall back to the
                            // engine's own string rendering
                            row.get::<_, String>(idx)
                                .map(Value::String)
                                .unwrap_or(Value::Null)
                        }),
                        Err(e) => return Err(e.to_string()),
                    };
                    mapped.insert(name.clone(), value);
                }
                result_rows.push(mapped);
            }

            Ok(result_rows)
        })
        .await
        .map_err(|e| AppError::database("execute_query", e.to_string()))?
        .map_err(|e| AppError::database("execute_query", e))?;

        info!(row_count = rows.len(), "Query executed");
        Ok(rows)
    }

    /// Liveness probe used by the health endpoint: a real round trip, not a
    /// configuration check.
    pub async fn ping(&self) -> bool {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            pool.get()
                .ok()
                .and_then(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0)).ok())
                == Some(1)
        })
        .await
        .unwrap_or(false)
    }
}

/// Maps an engine value to JSON. Returns None for column types this layer
/// does not model, so the caller can fall back to a string rendering.
fn normalize_value(value: ValueRef<'_>) -> Option<Value> {
    let json = match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(v) => json!(v),
        ValueRef::SmallInt(v) => json!(v),
        ValueRef::Int(v) => json!(v),
        ValueRef::BigInt(v) => lossless_int(v as i128),
        ValueRef::HugeInt(v) => lossless_int(v),
        ValueRef::UTinyInt(v) => json!(v),
        ValueRef::USmallInt(v) => json!(v),
        ValueRef::UInt(v) => json!(v),
        ValueRef::UBigInt(v) => lossless_int(v as i128),
        ValueRef::Float(v) => json!(v),
        ValueRef::Double(v) => json!(v),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).to_string()),
        ValueRef::Timestamp(unit, raw) => Value::String(format_timestamp(unit, raw)),
        ValueRef::Date32(days) => Value::String(format_date32(days)),
        _ => return None,
    };
    Some(json)
}

/// Arbitrary-precision integers round-trip through JSON as strings once they
/// leave the double-safe range; smaller values stay plain numbers.
fn lossless_int(v: i128) -> Value {
    if (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&v) {
        json!(v as i64)
    } else {
        Value::String(v.to_string())
    }
}

fn format_timestamp(unit: TimeUnit, raw: i64) -> String {
    let timestamp: Option<DateTime<Utc>> = match unit {
        TimeUnit::Second => Utc.timestamp_opt(raw, 0).single(),
        TimeUnit::Millisecond => Utc.timestamp_millis_opt(raw).single(),
        TimeUnit::Microsecond => Utc.timestamp_micros(raw).single(),
        TimeUnit::Nanosecond => Some(Utc.timestamp_nanos(raw)),
    };
    match timestamp {
        Some(ts) => ts.to_rfc3339(),
        None => raw.to_string(),
    }
}

fn format_date32(days: i32) -> String {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    match epoch.checked_add_signed(Duration::days(days as i64)) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => days.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_integers_stay_numbers() {
        assert_eq!(lossless_int(25), json!(25));
        assert_eq!(lossless_int(-42), json!(-42));
        assert_eq!(lossless_int(MAX_SAFE_INTEGER), json!(9_007_199_254_740_991i64));
    }

    #[test]
    fn big_integers_become_strings() {
        assert_eq!(
            lossless_int(MAX_SAFE_INTEGER + 1),
            Value::String("9007199254740992".to_string())
        );
        assert_eq!(
            lossless_int(i128::from(i64::MIN) * 10),
            Value::String((i128::from(i64::MIN) * 10).to_string())
        );
    }

    #[test]
    fn timestamps_render_as_rfc3339() {
        let rendered = format_timestamp(TimeUnit::Microsecond, 1_700_000_000_000_000);
        assert!(rendered.starts_with("2023-11-14T"), "got: {}", rendered);
    }

    #[test]
    fn date32_renders_as_iso_date() {
        assert_eq!(format_date32(0), "1970-01-01");
        assert_eq!(format_date32(19_000), "2022-01-08");
    }

    #[test]
    fn null_and_text_normalize() {
        assert_eq!(normalize_value(ValueRef::Null), Some(Value::Null));
        assert_eq!(
            normalize_value(ValueRef::Text(b"hello")),
            Some(Value::String("hello".to_string()))
        );
    }
}

use serde_json::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::{MySql, Transaction};

use crate::error::AppError;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn to_sql_value(value: &Value) -> Result<SqlValue, AppError> {
    Ok(match value {
        Value::String(s) => {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                SqlValue::Date(d)
            } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                SqlValue::DateTime(dt)
            } else if let Ok(t) = NaiveTime::parse_from_str(s, "%H:%M:%S") {
                SqlValue::Time(t)
            } else {
                SqlValue::String(s.clone())
            }
        }
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                SqlValue::U64(u)
            } else if let Some(i) = n.as_i64() {
                SqlValue::I64(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::F64(f)
            } else {
                return Err(AppError::validation("Unsupported number"));
            }
        }
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Null => SqlValue::Null,
        _ => return Err(AppError::validation("Unsupported JSON value type")),
    })
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
/// Only keys listed in `allowed_columns` may appear in the payload; the
/// column names are spliced into the statement, values are bound.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed_columns: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, AppError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| AppError::validation("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(AppError::validation("No fields provided for update"));
    }

    if let Some(unknown) = obj.keys().find(|k| !allowed_columns.contains(&k.as_str())) {
        return Err(AppError::validation(format!("Field '{unknown}' cannot be updated")));
    }

    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = obj
        .values()
        .map(to_sql_value)
        .collect::<Result<Vec<_>, _>>()?;

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(
    tx: &mut Transaction<'_, MySql>,
    update: SqlUpdate,
) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Time(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(&mut **tx).await?;
    Ok(result.rows_affected())
}

/// Page, page size and row offset for `LIMIT ? OFFSET ?` listings.
/// Pages start at 1 and hold 1 to 100 rows (20 when unset).
pub fn page_window(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    (page, per_page, u64::from(page - 1) * u64::from(per_page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_window_clamps_and_never_overflows() {
        assert_eq!(page_window(None, None), (1, 20, 0));
        assert_eq!(page_window(Some(0), Some(0)), (1, 1, 0));
        assert_eq!(page_window(Some(3), Some(500)), (3, 100, 200));
        assert_eq!(
            page_window(Some(50_000_000), Some(100)),
            (50_000_000, 100, 4_999_999_900)
        );
        assert_eq!(
            page_window(Some(u32::MAX), Some(100)).2,
            u64::from(u32::MAX - 1) * 100
        );
    }

    const EMPLOYEE_COLUMNS: &[&str] = &["first_name", "hire_date", "department_id"];

    #[test]
    fn builds_set_clause_and_binds_id_last() {
        let update = build_update_sql(
            "employees",
            &json!({"first_name": "Jane", "hire_date": "2024-02-01"}),
            EMPLOYEE_COLUMNS,
            "id",
            5,
        )
        .unwrap();

        assert_eq!(
            update.sql,
            "UPDATE employees SET first_name = ?, hire_date = ? WHERE id = ?"
        );
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("Jane".into()),
                SqlValue::Date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()),
                SqlValue::U64(5),
            ]
        );
    }

    #[test]
    fn unknown_columns_are_refused() {
        let err = build_update_sql(
            "employees",
            &json!({"id = 1; DROP TABLE employees; --": 1}),
            EMPLOYEE_COLUMNS,
            "id",
            5,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn empty_and_non_object_payloads_are_refused() {
        assert!(build_update_sql("employees", &json!({}), EMPLOYEE_COLUMNS, "id", 1).is_err());
        assert!(build_update_sql("employees", &json!([1]), EMPLOYEE_COLUMNS, "id", 1).is_err());
    }
}

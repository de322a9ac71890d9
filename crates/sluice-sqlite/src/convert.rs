use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::ErrorCode;
use sluice_core::{Row, SluiceError, Value};
use std::sync::Arc;

pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Real(v) => SqlValue::Real(*v),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

pub(crate) fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

pub(crate) fn read_row(row: &rusqlite::Row<'_>, columns: &Arc<[String]>) -> Result<Row, SluiceError> {
    let mut values = Vec::with_capacity(columns.len());
    for i in 0..columns.len() {
        values.push(from_sql(row.get_ref(i).map_err(classify)?));
    }
    Ok(Row::new(Arc::clone(columns), values))
}

/// Map a driver error raised while running statements onto the taxonomy.
pub(crate) fn classify(err: rusqlite::Error) -> SluiceError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
            SluiceError::Transient(err.to_string())
        }
        Some(ErrorCode::OperationInterrupted) => SluiceError::Cancelled,
        Some(ErrorCode::CannotOpen)
        | Some(ErrorCode::NotADatabase)
        | Some(ErrorCode::PermissionDenied)
        | Some(ErrorCode::AuthorizationForStatementDenied) => {
            SluiceError::Connection(err.to_string())
        }
        _ => SluiceError::Query(err.to_string()),
    }
}

/// Errors while opening or configuring a connection are connection errors,
/// except lock contention which stays transient.
pub(crate) fn classify_open(err: rusqlite::Error) -> SluiceError {
    match classify(err) {
        SluiceError::Query(msg) => SluiceError::Connection(msg),
        other => other,
    }
}

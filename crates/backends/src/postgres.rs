//! Thin `tokio-postgres` time-series client.
//!
//! Statements arrive fully parameterized; this client only binds the
//! params and converts result rows into engine values.

use crate::{TimeSeriesStore, TsStatement};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use srql_common::models::{Row, Value};
use srql_error::{ErrorCode, ErrorContext, Result, SrqlError};
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls};

pub struct PostgresTimeSeriesStore {
    client: Client,
}

impl PostgresTimeSeriesStore {
    /// Connect and drive the connection on a background task.
    pub async fn connect(url: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(url, NoTls)
            .await
            .map_err(|e| store_unavailable(format!("Connection failed: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "Time-series store connection terminated");
            }
        });

        Ok(PostgresTimeSeriesStore { client })
    }
}

#[async_trait]
impl TimeSeriesStore for PostgresTimeSeriesStore {
    async fn query(&self, statement: &TsStatement) -> Result<Vec<Row>> {
        let owned: Vec<Box<dyn ToSql + Sync + Send>> =
            statement.params.iter().map(to_sql_value).collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            owned.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)).collect();

        let rows = self
            .client
            .query(statement.sql.as_str(), &refs)
            .await
            .map_err(map_postgres_error)?;

        rows.iter().map(convert_row).collect()
    }
}

fn to_sql_value(value: &Value) -> Box<dyn ToSql + Sync + Send> {
    match value {
        Value::Null => Box::new(Option::<String>::None),
        Value::Bool(b) => Box::new(*b),
        Value::Int(i) => Box::new(*i),
        Value::Float(f) => Box::new(*f),
        Value::Str(s) => Box::new(s.clone()),
        Value::Timestamp(t) => Box::new(*t),
        Value::StrList(items) => Box::new(items.clone()),
    }
}

fn convert_row(row: &tokio_postgres::Row) -> Result<Row> {
    let mut out = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = convert_column(row, idx, column.type_())
            .map_err(|e| malformed(column.name(), &e))?;
        out.push(column.name(), value);
    }
    Ok(out)
}

fn convert_column(
    row: &tokio_postgres::Row,
    idx: usize,
    column_type: &Type,
) -> std::result::Result<Value, tokio_postgres::Error> {
    let value = match *column_type {
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)?
            .map_or(Value::Null, Value::Bool),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)?
            .map_or(Value::Null, |v| Value::Int(v.into())),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)?
            .map_or(Value::Null, |v| Value::Int(v.into())),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)?
            .map_or(Value::Null, Value::Int),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map_or(Value::Null, |v| Value::Float(v.into())),
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)?
            .map_or(Value::Null, Value::Float),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map_or(Value::Null, Value::Timestamp),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map_or(Value::Null, |v| Value::Timestamp(v.and_utc())),
        _ => row
            .try_get::<_, Option<String>>(idx)?
            .map_or(Value::Null, Value::Str),
    };
    Ok(value)
}

fn map_postgres_error(e: tokio_postgres::Error) -> SrqlError {
    // A SQLSTATE means the store parsed and rejected the statement;
    // anything else is transport-level.
    if let Some(db) = e.as_db_error() {
        SrqlError::new(
            ErrorCode::StatementRejected,
            format!("Time-series store rejected the statement: {}", db.message()),
        )
        .with_context(ErrorContext::Backend {
            backend: "timeseries".to_string(),
            detail: db.code().code().to_string(),
        })
    } else {
        store_unavailable(e.to_string())
    }
}

fn store_unavailable(detail: String) -> SrqlError {
    SrqlError::new(
        ErrorCode::StoreUnavailable,
        format!("Time-series store unavailable: {detail}"),
    )
    .with_context(ErrorContext::Backend {
        backend: "timeseries".to_string(),
        detail,
    })
}

fn malformed(column: &str, e: &tokio_postgres::Error) -> SrqlError {
    SrqlError::new(
        ErrorCode::MalformedResult,
        format!("Could not decode column '{column}': {e}"),
    )
    .with_context(ErrorContext::Backend {
        backend: "timeseries".to_string(),
        detail: column.to_string(),
    })
}

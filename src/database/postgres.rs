use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{postgres::PgArguments, query::Query, PgPool, Postgres, Row as _};

use crate::config;
use crate::database::manager::DatabaseError;
use crate::database::store::{Bucket, Row, Store};
use crate::filter::{is_valid_identifier, quote_identifier, Filter, FilterData};

/// Postgres-backed store. Rows travel as JSON in both directions:
/// reads use `row_to_json`, writes use `jsonb_populate_record` so values are
/// coerced to the column types declared in the schema.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_rows(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>, DatabaseError> {
        let mut q = sqlx::query(sql);
        for p in params {
            q = bind_value(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }
}

fn log_sql(kind: &str, sql: &str) {
    if config::config().database.enable_query_logging {
        tracing::debug!("{}: {}", kind, sql);
    }
}

fn checked(name: &str) -> Result<String, DatabaseError> {
    if is_valid_identifier(name) {
        Ok(quote_identifier(name))
    } else {
        Err(DatabaseError::InvalidIdentifier(name.to_string()))
    }
}

fn decode_row(row: &sqlx::postgres::PgRow) -> Result<Row, DatabaseError> {
    let v: Value = row.try_get("row")?;
    match v {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::Serialization(format!("expected JSON object, got {}", other))),
    }
}

/// Bind a JSON scalar with the closest Postgres type.
/// RFC 3339 strings bind as timestamptz so they compare against timestamp columns.
fn bind_value<'q>(
    q: Query<'q, Postgres, PgArguments>,
    v: Value,
) -> Query<'q, Postgres, PgArguments> {
    match v {
        Value::Null => q.bind(None::<String>),
        Value::Bool(b) => q.bind(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => match DateTime::parse_from_rfc3339(&s) {
            Ok(dt) => q.bind(dt.with_timezone(&Utc)),
            Err(_) => q.bind(s),
        },
        other => q.bind(sqlx::types::Json(other)),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn select(&self, table: &str, filter: FilterData) -> Result<Vec<Row>, DatabaseError> {
        let mut f = Filter::new(table)?;
        f.assign(filter)?;
        let sql = f.to_sql()?;
        let wrapped = format!("SELECT row_to_json(t) AS row FROM ({}) t", sql.query);
        log_sql("select", &wrapped);
        self.fetch_rows(&wrapped, sql.params).await
    }

    async fn count(&self, table: &str, filter: FilterData) -> Result<i64, DatabaseError> {
        let mut f = Filter::new(table)?;
        if let Some(where_clause) = filter.where_clause {
            f.where_clause(where_clause)?;
        }
        let sql = f.to_count_sql()?;
        let mut q = sqlx::query(&sql.query);
        for p in sql.params {
            q = bind_value(q, p);
        }
        let row = q.fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>("count")?)
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row, DatabaseError> {
        let table_sql = checked(table)?;
        row.remove("id");

        let sql = if row.is_empty() {
            format!("INSERT INTO {t} DEFAULT VALUES RETURNING row_to_json({t}.*) AS row", t = table_sql)
        } else {
            let columns = row.keys().map(|c| checked(c)).collect::<Result<Vec<_>, _>>()?.join(", ");
            format!(
                "INSERT INTO {t} ({cols}) SELECT {cols} FROM jsonb_populate_record(NULL::{t}, $1) \
                 RETURNING row_to_json({t}.*) AS row",
                t = table_sql,
                cols = columns
            )
        };
        log_sql("insert", &sql);

        let q = sqlx::query(&sql);
        let q = if row.is_empty() { q } else { q.bind(sqlx::types::Json(Value::Object(row))) };
        let inserted = q.fetch_one(&self.pool).await?;
        decode_row(&inserted)
    }

    async fn update(&self, table: &str, id: i64, mut changes: Row) -> Result<Option<Row>, DatabaseError> {
        let table_sql = checked(table)?;
        changes.remove("id");

        if changes.is_empty() {
            let rows = self.select(table, FilterData::eq("id", id)).await?;
            return Ok(rows.into_iter().next());
        }

        let columns = changes.keys().map(|c| checked(c)).collect::<Result<Vec<_>, _>>()?;
        let set_clause = if columns.len() == 1 {
            format!("{c} = (SELECT {c} FROM jsonb_populate_record(NULL::{t}, $1))", c = columns[0], t = table_sql)
        } else {
            let cols = columns.join(", ");
            format!("({c}) = (SELECT {c} FROM jsonb_populate_record(NULL::{t}, $1))", c = cols, t = table_sql)
        };
        let sql = format!(
            "UPDATE {t} SET {set} WHERE \"id\" = $2 RETURNING row_to_json({t}.*) AS row",
            t = table_sql,
            set = set_clause
        );
        log_sql("update", &sql);

        let updated = sqlx::query(&sql)
            .bind(sqlx::types::Json(Value::Object(changes)))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        updated.as_ref().map(decode_row).transpose()
    }

    async fn delete(&self, table: &str, filter: FilterData) -> Result<u64, DatabaseError> {
        let mut f = Filter::new(table)?;
        if let Some(where_clause) = filter.where_clause {
            f.where_clause(where_clause)?;
        }
        let sql = f.to_delete_sql()?;
        log_sql("delete", &sql.query);
        let mut q = sqlx::query(&sql.query);
        for p in sql.params {
            q = bind_value(q, p);
        }
        let result = q.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn aggregate(
        &self,
        table: &str,
        filter: FilterData,
        group_by: &str,
        sum_column: &str,
    ) -> Result<Vec<Bucket>, DatabaseError> {
        let group_sql = checked(group_by)?;
        let sum_sql = checked(sum_column)?;
        let mut f = Filter::new(table)?;
        if let Some(where_clause) = filter.where_clause {
            f.where_clause(where_clause)?;
        }
        let predicate = f.to_where_sql()?;

        let mut sql = format!(
            "SELECT ({g})::text AS key, COUNT(*) AS count, COALESCE(SUM({s}), 0)::float8 AS total FROM {t}",
            g = group_sql,
            s = sum_sql,
            t = checked(table)?
        );
        if !predicate.query.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate.query);
        }
        sql.push_str(" GROUP BY 1 ORDER BY 1 ASC NULLS LAST");
        log_sql("aggregate", &sql);

        let mut q = sqlx::query(&sql);
        for p in predicate.params {
            q = bind_value(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| -> Result<Bucket, DatabaseError> {
                Ok(Bucket {
                    key: r.try_get::<Option<String>, _>("key")?,
                    count: r.try_get::<i64, _>("count")?,
                    total: r.try_get::<f64, _>("total")?,
                })
            })
            .collect()
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

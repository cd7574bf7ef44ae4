//! PostgreSQL store.
//!
//! Rows travel as JSONB: reads use `to_jsonb(t.*)`, writes go through
//! `jsonb_populate_record` so column types come from the table definition.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgArguments;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::debug;

use crate::config::CONFIG;
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::record::Record;
use crate::database::store::{Store, StoreTransaction};
use crate::filter::filter_where::valid_identifier;
use crate::filter::{Filter, SqlResult};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, DatabaseError> {
        Ok(Self::new(DatabaseManager::pool_for(url).await?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, DatabaseError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PgTransaction {
    async fn fetch_records(&mut self, sql: &SqlResult) -> Result<Vec<Record>, DatabaseError> {
        if CONFIG.database.enable_query_logging {
            debug!(query = %sql.query, params = sql.params.len(), "sql");
        }

        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param_query(q, p);
        }
        let rows = q.fetch_all(&mut *self.tx).await?;

        rows.iter()
            .map(|row| {
                let value: Value = row.try_get("record")?;
                match value {
                    Value::Object(map) => Ok(Record::from_sql_data(map)),
                    other => Err(DatabaseError::QueryError(format!(
                        "expected JSON object row, got {}",
                        other
                    ))),
                }
            })
            .collect()
    }
}

fn check_columns<'a>(columns: impl IntoIterator<Item = &'a String>) -> Result<(), DatabaseError> {
    for column in columns {
        if !valid_identifier(column) {
            return Err(DatabaseError::QueryError(format!("Invalid column name: {}", column)));
        }
    }
    Ok(())
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn select(&mut self, filter: &Filter) -> Result<Vec<Record>, DatabaseError> {
        let sql = filter.to_select_sql();
        self.fetch_records(&sql).await
    }

    async fn count(&mut self, filter: &Filter) -> Result<i64, DatabaseError> {
        let sql = filter.to_count_sql();
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param_query(q, p);
        }
        let row = q.fetch_one(&mut *self.tx).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    async fn insert(&mut self, table: &str, record: &Record) -> Result<Record, DatabaseError> {
        if !valid_identifier(table) {
            return Err(DatabaseError::QueryError(format!("Invalid table name: {}", table)));
        }
        check_columns(record.fields().keys())?;

        let columns: Vec<String> = record.fields().keys().map(|c| format!("\"{}\"", c)).collect();
        let sql = SqlResult {
            query: format!(
                "INSERT INTO \"{0}\" ({1}) SELECT {1} FROM jsonb_populate_record(NULL::\"{0}\", $1) \
                 RETURNING to_jsonb(\"{0}\".*) AS record",
                table,
                columns.join(", ")
            ),
            params: vec![record.to_json()],
        };

        self.fetch_records(&sql)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::QueryError(format!("insert into {} returned no row", table)))
    }

    async fn update(
        &mut self,
        filter: &Filter,
        changes: &Map<String, Value>,
    ) -> Result<Vec<Record>, DatabaseError> {
        if changes.is_empty() {
            return self.select(filter).await;
        }
        check_columns(changes.keys())?;

        let table = filter.table_name();
        let assignments: Vec<String> = changes
            .keys()
            .map(|c| format!("\"{0}\" = _src.\"{0}\"", c))
            .collect();
        // $1 is the change set, filter parameters follow
        let where_result = filter.to_where_sql(1);

        let mut params = vec![Value::Object(changes.clone())];
        params.extend(where_result.params);
        let sql = SqlResult {
            query: format!(
                "UPDATE \"{0}\" SET {1} FROM jsonb_populate_record(NULL::\"{0}\", $1) AS _src \
                 WHERE {2} RETURNING to_jsonb(\"{0}\".*) AS record",
                table,
                assignments.join(", "),
                where_result.query
            ),
            params,
        };
        self.fetch_records(&sql).await
    }

    async fn delete(&mut self, filter: &Filter) -> Result<Vec<Record>, DatabaseError> {
        let sql = filter.to_delete_sql();
        self.fetch_records(&sql).await
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        // JSONB
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}

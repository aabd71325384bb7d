use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{
    Pool, Postgres, QueryBuilder, Row,
    postgres::{PgPoolOptions, PgRow},
    types::Json,
};
use tracing::info;
use uuid::Uuid;

use super::{
    Collection, DeleteAck, Document, DocumentStore, Filter, InsertAck, Page, StoreError, UpdateAck,
};
use crate::config::DatabaseConfig;

const SCHEMA: &str = "tech_assignment";

/// JSONB document store. Each collection is a table of `(id, seq, doc)` rows, ordered by `seq`.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

fn table(collection: Collection) -> String {
    format!("{SCHEMA}.{}", collection.name())
}

impl PostgresStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.connect_options())
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        let mut transaction = self.pool.begin().await?;

        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {SCHEMA};"))
            .execute(&mut *transaction)
            .await?;

        for collection in [Collection::Assignments, Collection::Submitted] {
            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS {}(
                    id UUID PRIMARY KEY,
                    seq BIGINT GENERATED ALWAYS AS IDENTITY,
                    doc JSONB NOT NULL
                );",
                table(collection)
            ))
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?;
        info!("Schema '{SCHEMA}' ready");
        Ok(())
    }
}

/// Compares as JSONB so only JSON strings match, never a number or bool with the same text.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    builder.push(" WHERE TRUE");
    for (path, value) in filter.clauses() {
        let segments: Vec<String> = path.split('.').map(str::to_owned).collect();
        builder
            .push(" AND doc #> ")
            .push_bind(segments)
            .push("::text[] = to_jsonb(")
            .push_bind(value.clone())
            .push("::text)");
    }
}

fn to_document(row: &PgRow) -> Result<Document, StoreError> {
    let id: Uuid = row.try_get("id")?;
    let Json(doc): Json<Value> = row.try_get("doc")?;
    match doc {
        Value::Object(body) => Ok(Document { id, body }),
        _ => Err(StoreError::NotAnObject(id)),
    }
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn insert_one(
        &self,
        collection: Collection,
        body: Map<String, Value>,
    ) -> Result<InsertAck, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(&format!(
            "INSERT INTO {} (id, doc) VALUES ($1, $2);",
            table(collection)
        ))
        .bind(id)
        .bind(Json(Value::Object(body)))
        .execute(&self.pool)
        .await?;

        Ok(InsertAck {
            acknowledged: true,
            inserted_id: id,
        })
    }

    async fn find(
        &self,
        collection: Collection,
        filter: &Filter,
        page: Option<Page>,
    ) -> Result<Vec<Document>, StoreError> {
        let mut builder = QueryBuilder::new(format!("SELECT id, doc FROM {}", table(collection)));
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY seq");

        if let Some(Page { skip, limit }) = page {
            if let Some(limit) = limit {
                builder.push(" LIMIT ").push_bind(clamp(limit));
            }
            builder.push(" OFFSET ").push_bind(clamp(skip));
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(to_document).collect()
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
        let mut builder =
            QueryBuilder::new(format!("SELECT COUNT(*) AS total FROM {}", table(collection)));
        push_filter(&mut builder, filter);

        let row = builder.build().fetch_one(&self.pool).await?;
        let total: i64 = row.try_get("total")?;
        Ok(total.max(0) as u64)
    }

    async fn find_one(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT id, doc FROM {} WHERE id = $1;",
            table(collection)
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(to_document).transpose()
    }

    async fn update_one(
        &self,
        collection: Collection,
        id: Uuid,
        set: Map<String, Value>,
        upsert: bool,
    ) -> Result<UpdateAck, StoreError> {
        let table = table(collection);
        let set = Json(Value::Object(set));

        if upsert {
            // No row back means the document exists and already holds these values.
            let row = sqlx::query(&format!(
                "INSERT INTO {table} AS t (id, doc) VALUES ($1, $2)
                ON CONFLICT (id) DO UPDATE SET doc = t.doc || EXCLUDED.doc
                WHERE t.doc IS DISTINCT FROM t.doc || EXCLUDED.doc
                RETURNING (xmax = 0) AS inserted;"
            ))
            .bind(id)
            .bind(set)
            .fetch_optional(&self.pool)
            .await?;

            return Ok(match row {
                None => UpdateAck::matched(false),
                Some(row) if row.try_get::<bool, _>("inserted")? => UpdateAck::upserted(id),
                Some(_) => UpdateAck::matched(true),
            });
        }

        let row = sqlx::query(&format!(
            "WITH target AS (
                SELECT id, doc FROM {table} WHERE id = $1 FOR UPDATE
            ), changed AS (
                UPDATE {table} t SET doc = t.doc || $2
                FROM target
                WHERE t.id = target.id AND target.doc IS DISTINCT FROM target.doc || $2
                RETURNING t.id
            )
            SELECT (SELECT COUNT(*) FROM target) AS matched,
                   (SELECT COUNT(*) FROM changed) AS modified;"
        ))
        .bind(id)
        .bind(set)
        .fetch_one(&self.pool)
        .await?;

        let matched: i64 = row.try_get("matched")?;
        let modified: i64 = row.try_get("modified")?;
        Ok(if matched == 0 {
            UpdateAck::missed()
        } else {
            UpdateAck::matched(modified > 0)
        })
    }

    async fn delete_one(&self, collection: Collection, id: Uuid) -> Result<DeleteAck, StoreError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1;", table(collection)))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(DeleteAck {
            acknowledged: true,
            deleted_count: result.rows_affected(),
        })
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_binds_paths_as_text_arrays() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT id, doc FROM tech_assignment.submitted");
        push_filter(
            &mut builder,
            &Filter::all().eq("status", "pending").eq("examinee.email", "a@b.com"),
        );

        assert_eq!(
            builder.sql(),
            "SELECT id, doc FROM tech_assignment.submitted WHERE TRUE \
             AND doc #> $1::text[] = to_jsonb($2::text) \
             AND doc #> $3::text[] = to_jsonb($4::text)"
        );
    }

    #[test]
    fn tables_live_in_schema() {
        assert_eq!(table(Collection::Assignments), "tech_assignment.assignments");
        assert_eq!(table(Collection::Submitted), "tech_assignment.submitted");
    }
}

use async_trait::async_trait;
use chrono::Utc;
use profilesync_core::filter::validate_path;
use profilesync_core::{Document, DocumentId, DocumentStore, Filters, StoreError};
use serde_json::{Map, Value};
use sqlx::SqlitePool;

/// [`DocumentStore`] backed by the `documents` table.
///
/// Filters compile to `json_extract` comparisons; unique fields become
/// partial expression indexes named `uq:<collection>:<field>`.
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

// Row type for database queries
#[derive(sqlx::FromRow)]
struct DocumentRow {
    document_id: String,
    data: String,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document, StoreError> {
        let data: Map<String, Value> = serde_json::from_str(&self.data).map_err(|e| {
            StoreError::Backend(format!("corrupt document {}: {}", self.document_id, e))
        })?;
        Ok(Document::new(DocumentId::new(self.document_id), data))
    }
}

const UNIQUE_INDEX_PREFIX: &str = "uq:";

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Map a failed write, recognising violations of our unique indexes.
    fn write_error(collection: &str, err: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                if let Some(field) = violated_field(db_err.message(), collection) {
                    return StoreError::UniqueViolation {
                        collection: collection.to_string(),
                        field,
                    };
                }
            }
        }
        backend(err)
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Pull the field out of `UNIQUE constraint failed: index 'uq:<collection>:<field>'`.
fn violated_field(message: &str, collection: &str) -> Option<String> {
    let index = message.split("index '").nth(1)?.trim_end_matches('\'');
    let (index_collection, field) = index
        .strip_prefix(UNIQUE_INDEX_PREFIX)?
        .split_once(':')?;

    (index_collection == collection).then(|| field.to_string())
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn find_many(
        &self,
        collection: &str,
        filters: &Filters,
    ) -> Result<Vec<Document>, StoreError> {
        filters.validate()?;

        let mut sql = String::from("SELECT document_id, data FROM documents WHERE collection = ?");
        // json_extract maps true/false to 1/0, so the JSON types are compared too.
        for (path, _) in filters.predicates() {
            sql.push_str(&format!(
                " AND json_type(data, '$.{path}') = json_type(?, '$') \
                 AND json_extract(data, '$.{path}') = json_extract(?, '$')"
            ));
        }
        sql.push_str(" ORDER BY seq");

        let mut query = sqlx::query_as::<_, DocumentRow>(&sql).bind(collection);
        for (_, value) in filters.predicates() {
            let json = value.to_string();
            query = query.bind(json.clone()).bind(json);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(backend)?;
        rows.into_iter().map(DocumentRow::into_document).collect()
    }

    async fn find_one(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, StoreError> {
        let row: Option<DocumentRow> = sqlx::query_as(
            "SELECT document_id, data FROM documents WHERE collection = ? AND document_id = ?",
        )
        .bind(collection)
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(DocumentRow::into_document).transpose()
    }

    async fn create(
        &self,
        collection: &str,
        data: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        validate_path(collection)?;

        let id = DocumentId::generate();
        let json = Value::Object(data.clone()).to_string();

        sqlx::query(
            "INSERT INTO documents (collection, document_id, data, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(collection)
        .bind(id.as_str())
        .bind(&json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Self::write_error(collection, e))?;

        Ok(Document::new(id, data))
    }

    async fn delete(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, StoreError> {
        let row: Option<DocumentRow> = sqlx::query_as(
            "DELETE FROM documents WHERE collection = ? AND document_id = ? \
             RETURNING document_id, data",
        )
        .bind(collection)
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(DocumentRow::into_document).transpose()
    }

    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        // Both end up inside the statement text.
        validate_path(collection)?;
        validate_path(field)?;

        let sql = format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS \"{prefix}{collection}:{field}\" \
             ON documents (json_extract(data, '$.{field}')) \
             WHERE collection = '{collection}'",
            prefix = UNIQUE_INDEX_PREFIX,
        );

        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::write_error(collection, e))?;

        tracing::debug!(%collection, %field, "Unique index ensured");
        Ok(())
    }
}

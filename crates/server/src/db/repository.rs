use deadpool_postgres::Pool;
use fhir_term_core::{CodeEntry, CodeId};
use tokio_postgres::Row;

use crate::error::AppError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS code (
    id BIGSERIAL PRIMARY KEY,
    code_name TEXT,
    value TEXT,
    int_value INTEGER,
    description TEXT,
    resource_contents BYTEA
);
DROP INDEX IF EXISTS code_name_value_idx;
CREATE UNIQUE INDEX IF NOT EXISTS code_name_value_key ON code (code_name, value);
";

const COLUMNS: &str = "id, code_name, value, int_value, description, resource_contents";

/// Repository for persisted code entries
#[derive(Clone)]
pub struct CodeRepository {
    pool: Pool,
}

impl CodeRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create the `code` table if it does not exist
    pub async fn ensure_schema(&self) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        client.batch_execute(SCHEMA).await?;
        Ok(())
    }

    /// Round-trip a trivial query
    pub async fn ping(&self) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        client.query_one("SELECT 1", &[]).await?;
        Ok(())
    }

    /// Every stored entry, in id order
    pub async fn load_all(&self) -> Result<Vec<CodeEntry>, AppError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(&format!("SELECT {} FROM code ORDER BY id", COLUMNS), &[])
            .await?;

        rows.iter().map(row_to_entry).collect()
    }

    /// Exact (code_name, value) match
    pub async fn find(&self, code_name: &str, value: &str) -> Result<Option<CodeEntry>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {} FROM code WHERE code_name = $1 AND value = $2 ORDER BY id LIMIT 1",
                    COLUMNS
                ),
                &[&code_name, &value],
            )
            .await?;

        row.as_ref().map(row_to_entry).transpose()
    }

    /// Insert a new entry and return its generated id
    pub async fn insert(&self, entry: &CodeEntry) -> Result<CodeId, AppError> {
        if entry.id().is_some() {
            return Err(AppError::Conflict(format!("code {} is already persisted", entry)));
        }

        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "INSERT INTO code (code_name, value, int_value, description, resource_contents) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
                &[
                    &entry.code_name,
                    &entry.value,
                    &entry.int_value,
                    &entry.description,
                    &entry.resource_contents(),
                ],
            )
            .await?;

        Ok(CodeId::new(row.get(0)))
    }

    /// Overwrite the stored row of `base` with `entry`, provided the row
    /// still holds exactly what `base` holds. False when the row is gone or
    /// was changed by another writer.
    pub async fn update(&self, base: &CodeEntry, entry: &CodeEntry) -> Result<bool, AppError> {
        let id = base
            .id()
            .ok_or_else(|| AppError::BadRequest("cannot update an unsaved code entry".to_string()))?;
        if entry.id() != Some(id) {
            return Err(AppError::BadRequest(format!(
                "replacement for code entry {} carries a different id",
                id
            )));
        }

        let client = self.pool.get().await?;
        let updated = client
            .execute(
                "UPDATE code SET code_name = $2, value = $3, int_value = $4, description = $5, \
                 resource_contents = $6 WHERE id = $1 \
                 AND code_name IS NOT DISTINCT FROM $7 AND value IS NOT DISTINCT FROM $8 \
                 AND int_value IS NOT DISTINCT FROM $9 AND description IS NOT DISTINCT FROM $10 \
                 AND resource_contents IS NOT DISTINCT FROM $11",
                &[
                    &id.get(),
                    &entry.code_name,
                    &entry.value,
                    &entry.int_value,
                    &entry.description,
                    &entry.resource_contents(),
                    &base.code_name,
                    &base.value,
                    &base.int_value,
                    &base.description,
                    &base.resource_contents(),
                ],
            )
            .await?;

        Ok(updated > 0)
    }

    /// Delete the row with `id`; false when there was none
    pub async fn delete(&self, id: CodeId) -> Result<bool, AppError> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM code WHERE id = $1", &[&id.get()])
            .await?;

        Ok(deleted > 0)
    }
}

fn row_to_entry(row: &Row) -> Result<CodeEntry, AppError> {
    let mut entry = CodeEntry::default();
    entry.code_name = row.try_get("code_name")?;
    entry.value = row.try_get("value")?;
    entry.int_value = row.try_get("int_value")?;
    entry.description = row.try_get("description")?;
    entry.set_resource_contents(row.try_get("resource_contents")?);

    let id: i64 = row.try_get("id")?;
    Ok(entry.assign_id(CodeId::new(id))?)
}

//! Postgres-backed `ResultStore`. Mirrors the teacher's `db::store` pattern of
//! a thin repository wrapping a `sqlx::PgPool`, but queries are built with the
//! runtime-checked `sqlx::query`/`query_as` API rather than the `query!` macro
//! family, since those require a live `DATABASE_URL` at compile time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fhirval_core::{Aspect, AspectBreakdown, Issue, ValidationResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

use crate::error::Result;
use crate::store::ResultStore;

pub struct PostgresResultStore {
    pool: PgPool,
}

impl PostgresResultStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates `validation_result` and its indexes if they do not already
    /// exist (SS 6 "Persisted state layout": indexed on `(resourceId,
    /// settingsHash, resourceHash)` and on `validatedAt`). A production
    /// deployment would normally run this through a migration tool; this
    /// keeps a bare `DATABASE_URL` enough to boot (SS 6 exit code 2 only
    /// fires when the connection itself fails, not on a missing table).
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS validation_result (
                id TEXT PRIMARY KEY,
                resource_type TEXT NOT NULL,
                resource_id TEXT NOT NULL,
                settings_hash TEXT NOT NULL,
                resource_hash TEXT NOT NULL,
                validated_at TIMESTAMPTZ NOT NULL,
                is_valid BOOLEAN NOT NULL,
                validation_score SMALLINT NOT NULL,
                error_count INTEGER NOT NULL,
                warning_count INTEGER NOT NULL,
                information_count INTEGER NOT NULL,
                issues JSONB NOT NULL,
                aspect_breakdown JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS validation_result_fingerprint_idx \
             ON validation_result (resource_id, settings_hash, resource_hash)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS validation_result_validated_at_idx ON validation_result (validated_at)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn row_to_result(row: &sqlx::postgres::PgRow) -> Result<ValidationResult> {
        let issues: serde_json::Value = row.try_get("issues")?;
        let aspect_breakdown: serde_json::Value = row.try_get("aspect_breakdown")?;
        Ok(ValidationResult {
            id: row.try_get("id")?,
            resource_type: row.try_get("resource_type")?,
            resource_id: row.try_get("resource_id")?,
            settings_hash: row.try_get("settings_hash")?,
            resource_hash: row.try_get("resource_hash")?,
            validated_at: row.try_get("validated_at")?,
            is_valid: row.try_get("is_valid")?,
            validation_score: row.try_get::<i16, _>("validation_score")? as u8,
            error_count: row.try_get::<i32, _>("error_count")? as usize,
            warning_count: row.try_get::<i32, _>("warning_count")? as usize,
            information_count: row.try_get::<i32, _>("information_count")? as usize,
            issues: serde_json::from_value::<Vec<Issue>>(issues)?,
            aspect_breakdown: serde_json::from_value::<HashMap<Aspect, AspectBreakdown>>(aspect_breakdown)?,
        })
    }
}

#[async_trait]
impl ResultStore for PostgresResultStore {
    async fn store(&self, result: &ValidationResult) -> Result<()> {
        let issues = serde_json::to_value(&result.issues)?;
        let aspect_breakdown = serde_json::to_value(&result.aspect_breakdown)?;
        sqlx::query(
            r#"
            INSERT INTO validation_result
                (id, resource_type, resource_id, settings_hash, resource_hash, validated_at,
                 is_valid, validation_score, error_count, warning_count, information_count,
                 issues, aspect_breakdown)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                validated_at = EXCLUDED.validated_at,
                is_valid = EXCLUDED.is_valid,
                validation_score = EXCLUDED.validation_score,
                error_count = EXCLUDED.error_count,
                warning_count = EXCLUDED.warning_count,
                information_count = EXCLUDED.information_count,
                issues = EXCLUDED.issues,
                aspect_breakdown = EXCLUDED.aspect_breakdown
            "#,
        )
        .bind(&result.id)
        .bind(&result.resource_type)
        .bind(&result.resource_id)
        .bind(&result.settings_hash)
        .bind(&result.resource_hash)
        .bind(result.validated_at)
        .bind(result.is_valid)
        .bind(result.validation_score as i16)
        .bind(result.error_count as i32)
        .bind(result.warning_count as i32)
        .bind(result.information_count as i32)
        .bind(issues)
        .bind(aspect_breakdown)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn lookup(
        &self,
        resource_id: &str,
        settings_hash: &str,
        resource_hash: &str,
    ) -> Result<Option<ValidationResult>> {
        let row = sqlx::query(
            "SELECT * FROM validation_result WHERE resource_id = $1 AND settings_hash = $2 AND resource_hash = $3",
        )
        .bind(resource_id)
        .bind(settings_hash)
        .bind(resource_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_result).transpose()
    }

    async fn latest_for_resource(&self, resource_id: &str) -> Result<Option<ValidationResult>> {
        let row = sqlx::query("SELECT * FROM validation_result WHERE resource_id = $1 ORDER BY validated_at DESC LIMIT 1")
            .bind(resource_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_result).transpose()
    }

    async fn list_by_type(&self, resource_type: &str, limit: usize, offset: usize) -> Result<Vec<ValidationResult>> {
        let rows = sqlx::query(
            "SELECT DISTINCT ON (resource_id) * FROM validation_result \
             WHERE resource_type = $1 ORDER BY resource_id, validated_at DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(resource_type)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_result).collect()
    }

    async fn count_total(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(DISTINCT resource_id) AS n FROM validation_result")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    async fn count_valid(&self) -> Result<u64> {
        // Counts the most recent result per resource, matching the dashboard's
        // "success rate = valid / validated" definition (SS 4.13).
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM (
                SELECT DISTINCT ON (resource_id) is_valid
                FROM validation_result
                ORDER BY resource_id, validated_at DESC
            ) latest
            WHERE is_valid
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    async fn all_latest(&self) -> Result<Vec<ValidationResult>> {
        let rows = sqlx::query(
            "SELECT DISTINCT ON (resource_id) * FROM validation_result ORDER BY resource_id, validated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_result).collect()
    }

    async fn cleanup_older_than(&self, before: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM validation_result WHERE validated_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("TRUNCATE TABLE validation_result").execute(&self.pool).await?;
        Ok(())
    }
}

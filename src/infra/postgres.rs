//! PostgreSQL-backed tenant store.
//!
//! Tenant records are stored as JSONB documents keyed by tenant id, so the
//! schema survives descriptor evolution without migrations.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPool;

use crate::domain::{EnabledModule, Tenant, TenantDescriptor};

use super::{Result, TenantError, TenantStore};

/// `TenantStore` over a PostgreSQL pool.
pub struct PgTenantStore {
    pool: PgPool,
}

impl PgTenantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the backing table and index if they do not exist yet.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tenants (
                id VARCHAR(255) PRIMARY KEY,
                descriptor JSONB NOT NULL,
                enabled JSONB NOT NULL DEFAULT '[]'::jsonb,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(TenantError::Database)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_tenants_updated_at
            ON tenants (updated_at)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(TenantError::Database)?;

        Ok(())
    }

    fn row_to_tenant(id: String, descriptor: Value, enabled: Value) -> Result<Tenant> {
        let descriptor: TenantDescriptor = serde_json::from_value(descriptor)
            .map_err(|e| TenantError::internal(format!("bad descriptor for tenant {id}: {e}")))?;
        let enabled: Vec<EnabledModule> = serde_json::from_value(enabled)
            .map_err(|e| TenantError::internal(format!("bad enabled set for tenant {id}: {e}")))?;
        Ok(Tenant::with_enabled(descriptor, enabled))
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Result<Value> {
        serde_json::to_value(value).map_err(|e| TenantError::internal(e.to_string()))
    }
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn insert(&self, tenant: &Tenant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tenants (id, descriptor, enabled, updated_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(tenant.id())
        .bind(Self::to_json(&tenant.descriptor)?)
        .bind(Self::to_json(&tenant.enabled)?)
        .execute(&self.pool)
        .await
        .map_err(TenantError::Database)?;
        Ok(())
    }

    async fn update_descriptor(&self, td: &TenantDescriptor) -> Result<()> {
        // Upsert: a fresh tenant gets an empty enabled set, an existing one
        // keeps its set untouched.
        sqlx::query(
            r#"
            INSERT INTO tenants (id, descriptor, enabled, updated_at)
            VALUES ($1, $2, '[]'::jsonb, NOW())
            ON CONFLICT (id)
            DO UPDATE SET descriptor = EXCLUDED.descriptor, updated_at = NOW()
            "#,
        )
        .bind(&td.id)
        .bind(Self::to_json(td)?)
        .execute(&self.pool)
        .await
        .map_err(TenantError::Database)?;
        Ok(())
    }

    async fn update_modules(&self, id: &str, enabled: &[EnabledModule]) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tenants SET enabled = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(Self::to_json(&enabled)?)
        .execute(&self.pool)
        .await
        .map_err(TenantError::Database)?;

        if result.rows_affected() == 0 {
            return Err(TenantError::not_found(format!("tenant not found: {id}")));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(TenantError::Database)?;

        if result.rows_affected() == 0 {
            return Err(TenantError::not_found(format!("tenant not found: {id}")));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Tenant>> {
        let rows: Vec<(String, Value, Value)> =
            sqlx::query_as("SELECT id, descriptor, enabled FROM tenants ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(TenantError::Database)?;

        rows.into_iter()
            .map(|(id, descriptor, enabled)| Self::row_to_tenant(id, descriptor, enabled))
            .collect()
    }
}

//! In-memory tenant store.
//!
//! Backs the `TenantStore` seam without a database: storeless test
//! setups and single-node deployments that still want store/memory
//! coherence exercised.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{EnabledModule, Tenant, TenantDescriptor};

use super::{Result, TenantError, TenantStore};

/// `TenantStore` over a process-local map.
#[derive(Default)]
pub struct MemTenantStore {
    records: RwLock<HashMap<String, Tenant>>,
}

impl MemTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct read of a stored record, for coherence assertions.
    pub async fn read(&self, id: &str) -> Result<Tenant> {
        let records = self.records.read().await;
        records
            .get(id)
            .cloned()
            .ok_or_else(|| TenantError::not_found(format!("tenant not found: {id}")))
    }
}

#[async_trait]
impl TenantStore for MemTenantStore {
    async fn insert(&self, tenant: &Tenant) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(tenant.id().to_string(), tenant.clone());
        Ok(())
    }

    async fn update_descriptor(&self, td: &TenantDescriptor) -> Result<()> {
        let mut records = self.records.write().await;
        let tenant = match records.get(&td.id) {
            Some(existing) => Tenant::with_enabled(td.clone(), existing.enabled.clone()),
            None => Tenant::new(td.clone()),
        };
        records.insert(td.id.clone(), tenant);
        Ok(())
    }

    async fn update_modules(&self, id: &str, enabled: &[EnabledModule]) -> Result<()> {
        let mut records = self.records.write().await;
        let tenant = records
            .get_mut(id)
            .ok_or_else(|| TenantError::not_found(format!("tenant not found: {id}")))?;
        tenant.enabled = enabled.to_vec();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut records = self.records.write().await;
        records
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| TenantError::not_found(format!("tenant not found: {id}")))
    }

    async fn list(&self) -> Result<Vec<Tenant>> {
        let records = self.records.read().await;
        let mut tenants: Vec<Tenant> = records.values().cloned().collect();
        tenants.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(tenants)
    }
}

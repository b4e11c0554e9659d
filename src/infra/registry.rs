//! Process-wide tenant map with write-through persistence.
//!
//! The registry is the only shared mutable resource of the lifecycle
//! manager; `add`/`get`/`put`/`remove`/`keys` are linearizable (the write
//! lock is held across the store round-trip of a mutation, so memory is
//! never ahead of the store). Reads hand out clones; the registry owns
//! every `Tenant` value it holds.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::{Tenant, TenantDescriptor};

use super::{Result, TenantError, TenantStore};

/// Concurrency-safe mapping `tenant id -> Tenant`.
///
/// `map_name` names the shared map in a clustered deployment; `None`
/// forces a process-local map, which is semantically identical on a single
/// node but keeps tenants invisible to the rest of the cluster.
pub struct TenantRegistry {
    map_name: Option<String>,
    store: Option<Arc<dyn TenantStore>>,
    entries: RwLock<HashMap<String, Tenant>>,
}

impl TenantRegistry {
    pub fn new(store: Option<Arc<dyn TenantStore>>, map_name: Option<String>) -> Self {
        match &map_name {
            Some(name) => info!(map = %name, "tenant map initialized"),
            None => info!("tenant map initialized (local only)"),
        }
        Self {
            map_name,
            store,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Whether this node shares its tenant map with the cluster.
    pub fn is_local(&self) -> bool {
        self.map_name.is_none()
    }

    /// Insert a new tenant. Fails `User` on a duplicate id. Store-first:
    /// on store failure the memory map is untouched.
    pub async fn add(&self, tenant: Tenant) -> Result<String> {
        let id = tenant.id().to_string();
        let mut entries = self.entries.write().await;
        if entries.contains_key(&id) {
            return Err(TenantError::user(format!("Duplicate tenant id {id}")));
        }
        if let Some(store) = &self.store {
            store.insert(&tenant).await.map_err(|e| {
                warn!(tenant = %id, error = %e, "adding tenant to store failed");
                e
            })?;
        }
        entries.insert(id.clone(), tenant);
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Result<Tenant> {
        let entries = self.entries.read().await;
        entries
            .get(id)
            .cloned()
            .ok_or_else(|| TenantError::not_found(format!("tenant not found: {id}")))
    }

    /// Unconditional in-memory replace. Callers use this only after the
    /// corresponding store update has already succeeded.
    pub async fn put(&self, tenant: Tenant) {
        let mut entries = self.entries.write().await;
        entries.insert(tenant.id().to_string(), tenant);
    }

    /// Remove a tenant, store-first. `NotFound` from the store is
    /// tolerated; the memory entry is removed either way. Returns whether
    /// the memory entry existed.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        if let Some(store) = &self.store {
            match store.delete(id).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!(tenant = %id, "store had no record to delete");
                }
                Err(e) => {
                    warn!(tenant = %id, error = %e, "deleting tenant from store failed");
                    return Err(TenantError::internal(e.to_string()));
                }
            }
        }
        Ok(entries.remove(id).is_some())
    }

    /// Sorted snapshot of current tenant ids.
    pub async fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Replace a tenant's descriptor, preserving its enabled set (a fresh
    /// record with an empty set when the tenant is new). Store-first; a
    /// store failure surfaces as `Internal`.
    pub async fn update_descriptor(&self, td: TenantDescriptor) -> Result<()> {
        let mut entries = self.entries.write().await;
        let tenant = match entries.get(&td.id) {
            Some(existing) => Tenant::with_enabled(td.clone(), existing.enabled.clone()),
            None => Tenant::new(td.clone()),
        };
        if let Some(store) = &self.store {
            if let Err(e) = store.update_descriptor(&td).await {
                warn!(tenant = %td.id, error = %e, "updating tenant descriptor in store failed");
                return Err(TenantError::internal(e.to_string()));
            }
        }
        entries.insert(td.id.clone(), tenant);
        Ok(())
    }

    /// Memory-only insert used by bootstrap; the records come from the
    /// store, so there is no store round-trip. Fails `Internal` on a
    /// duplicate.
    pub async fn publish_local(&self, tenant: Tenant) -> Result<()> {
        let id = tenant.id().to_string();
        let mut entries = self.entries.write().await;
        if entries.contains_key(&id) {
            return Err(TenantError::internal(format!(
                "tenant already present while loading: {id}"
            )));
        }
        entries.insert(id, tenant);
        Ok(())
    }

    /// Id of the first tenant (in sorted key order) with `module_id`
    /// enabled, over a snapshot of the keys.
    pub async fn first_module_user(&self, module_id: &str) -> Result<Option<String>> {
        for id in self.keys().await {
            let tenant = self.get(&id).await?;
            if tenant.is_enabled(module_id) {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Descriptors of all tenants, sorted by id.
    ///
    /// The key set is a snapshot; each value is read afterwards and may be
    /// newer than the snapshot. A key that vanished in between aggregates
    /// to `Internal`, matching the fan-out contract.
    pub async fn list_descriptors(&self) -> Result<Vec<TenantDescriptor>> {
        let keys = self.keys().await;
        let mut out = Vec::with_capacity(keys.len());
        for id in keys {
            match self.get(&id).await {
                Ok(t) => out.push(t.descriptor),
                Err(e) => {
                    warn!(tenant = %id, error = %e, "listing tenants: per-key read failed");
                    return Err(TenantError::internal(e.to_string()));
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::traits::MockTenantStore;

    fn tenant(id: &str) -> Tenant {
        Tenant::new(TenantDescriptor::new(id))
    }

    #[tokio::test]
    async fn add_is_store_first() {
        let mut store = MockTenantStore::new();
        store
            .expect_insert()
            .returning(|_| Err(TenantError::internal("db down")));
        let store: Arc<dyn TenantStore> = Arc::new(store);
        let reg = TenantRegistry::new(Some(store), None);

        let err = reg.add(tenant("acme")).await.unwrap_err();
        assert!(matches!(err, TenantError::Internal(_)));
        // store failure leaves memory untouched
        assert!(reg.get("acme").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn remove_tolerates_store_not_found() {
        let mut store = MockTenantStore::new();
        store.expect_insert().returning(|_| Ok(()));
        store
            .expect_delete()
            .returning(|id| Err(TenantError::not_found(format!("tenant not found: {id}"))));
        let store: Arc<dyn TenantStore> = Arc::new(store);
        let reg = TenantRegistry::new(Some(store), None);

        reg.add(tenant("acme")).await.unwrap();
        assert!(reg.remove("acme").await.unwrap());
        assert!(reg.get("acme").await.unwrap_err().is_not_found());
    }

    #[test]
    fn force_local_mode_has_no_map_name() {
        assert!(TenantRegistry::new(None, None).is_local());
        assert!(!TenantRegistry::new(None, Some("tenants".to_string())).is_local());
    }

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let reg = TenantRegistry::new(None, None);
        reg.add(tenant("acme")).await.unwrap();
        let got = reg.get("acme").await.unwrap();
        assert_eq!(got.id(), "acme");
    }

    #[tokio::test]
    async fn duplicate_add_fails_user() {
        let reg = TenantRegistry::new(None, None);
        reg.add(tenant("acme")).await.unwrap();
        let err = reg.add(tenant("acme")).await.unwrap_err();
        assert!(matches!(err, TenantError::User(_)));
    }

    #[tokio::test]
    async fn remove_reports_existence() {
        let reg = TenantRegistry::new(None, None);
        reg.add(tenant("acme")).await.unwrap();
        assert!(reg.remove("acme").await.unwrap());
        assert!(!reg.remove("acme").await.unwrap());
        assert!(reg.get("acme").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn update_descriptor_preserves_enabled_set() {
        let reg = TenantRegistry::new(None, None);
        let mut t = tenant("acme");
        t.enable_module("mod-users-1.0.0");
        reg.add(t).await.unwrap();

        let mut td = TenantDescriptor::new("acme");
        td.name = Some("Acme Corp".to_string());
        reg.update_descriptor(td).await.unwrap();

        let got = reg.get("acme").await.unwrap();
        assert_eq!(got.descriptor.name.as_deref(), Some("Acme Corp"));
        assert!(got.is_enabled("mod-users-1.0.0"));
    }

    #[tokio::test]
    async fn list_descriptors_is_sorted() {
        let reg = TenantRegistry::new(None, None);
        reg.add(tenant("zeta")).await.unwrap();
        reg.add(tenant("acme")).await.unwrap();
        let ids: Vec<String> = reg
            .list_descriptors()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["acme", "zeta"]);
    }
}

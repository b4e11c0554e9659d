//! The tenant lifecycle manager facade.
//!
//! Owns the registry, the catalog and store seams, and the late-bound
//! proxy (the proxy itself routes through tenants, so it is wired after
//! construction). All public operations are async and propagate the
//! four-kind error taxonomy; none retries.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::OnceLock;

use tracing::{info, warn};

use crate::domain::{
    InstallOptions, InterfaceDescriptor, ModuleDescriptor, Tenant, TenantDescriptor,
    TenantModuleAction,
};
use crate::infra::{
    ModuleCatalog, ProxyService, Result, TenantError, TenantRegistry, TenantStore,
};
use crate::lifecycle::{ChangeEngine, InstallOrchestrator};

pub struct TenantManager {
    catalog: Arc<dyn ModuleCatalog>,
    store: Option<Arc<dyn TenantStore>>,
    proxy: OnceLock<Arc<dyn ProxyService>>,
    registry: TenantRegistry,
}

impl TenantManager {
    /// `map_name` names the cluster-shared tenant map; `None` forces a
    /// process-local map (single-node semantics, no cross-node tenant
    /// visibility).
    pub fn new(
        catalog: Arc<dyn ModuleCatalog>,
        store: Option<Arc<dyn TenantStore>>,
        map_name: Option<String>,
    ) -> Self {
        let registry = TenantRegistry::new(store.clone(), map_name);
        Self {
            catalog,
            store,
            proxy: OnceLock::new(),
            registry,
        }
    }

    /// Wire the proxy service. One-shot; a second call is ignored with a
    /// warning.
    pub fn set_proxy(&self, proxy: Arc<dyn ProxyService>) {
        if self.proxy.set(proxy).is_err() {
            warn!("proxy service already set, ignoring");
        }
    }

    fn proxy_ref(&self) -> Option<&dyn ProxyService> {
        self.proxy.get().map(|p| p.as_ref())
    }

    fn engine(&self) -> ChangeEngine<'_> {
        ChangeEngine::new(
            self.catalog.as_ref(),
            self.proxy_ref(),
            self.store.as_deref(),
            &self.registry,
        )
    }

    /// One-shot load of the store into the registry at startup.
    ///
    /// A non-empty registry short-circuits: another node already loaded
    /// the shared map. Insert failures aggregate into one `Internal`.
    pub async fn load_tenants(&self) -> Result<()> {
        if !self.registry.keys().await.is_empty() {
            info!("not loading tenants, looks like someone already did");
            return Ok(());
        }
        let Some(store) = &self.store else {
            info!("no storage to load tenants from, starting with empty");
            return Ok(());
        };
        let mut errors = Vec::new();
        for tenant in store.list().await? {
            let id = tenant.id().to_string();
            if let Err(e) = self.registry.publish_local(tenant).await {
                errors.push(format!("{id}: {e}"));
            }
        }
        if errors.is_empty() {
            info!("all tenants loaded");
            Ok(())
        } else {
            Err(TenantError::internal(format!(
                "loading tenants failed: {}",
                errors.join("; ")
            )))
        }
    }

    /// Insert a new tenant. Fails `User` on an empty or duplicate id.
    pub async fn insert(&self, tenant: Tenant) -> Result<String> {
        if tenant.id().is_empty() {
            return Err(TenantError::user("tenant id must not be empty"));
        }
        self.registry.add(tenant).await
    }

    /// Replace a tenant's descriptor, preserving its enabled modules;
    /// creates the tenant when absent.
    pub async fn update_descriptor(&self, td: TenantDescriptor) -> Result<()> {
        self.registry.update_descriptor(td).await
    }

    /// Descriptors of all tenants, sorted by id.
    pub async fn list(&self) -> Result<Vec<TenantDescriptor>> {
        self.registry.list_descriptors().await
    }

    pub async fn get(&self, id: &str) -> Result<Tenant> {
        self.registry.get(id).await
    }

    /// Delete a tenant. Returns whether it existed; a store record absent
    /// on delete is tolerated.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.registry.remove(id).await
    }

    /// Sorted ids of the tenant's enabled modules.
    pub async fn list_modules(&self, id: &str) -> Result<Vec<String>> {
        Ok(self.registry.get(id).await?.list_modules())
    }

    /// Succeeds when no tenant has the module enabled; fails `InUse` with
    /// the first using tenant otherwise. Used to gate module deletion and
    /// undeployment.
    pub async fn get_module_user(&self, module_id: &str) -> Result<()> {
        match self.registry.first_module_user(module_id).await? {
            Some(tenant_id) => Err(TenantError::InUse { tenant_id }),
            None => Ok(()),
        }
    }

    /// Interfaces provided by the tenant's enabled modules. `full` keeps
    /// every provided entry; otherwise one id/version stub per distinct
    /// interface id.
    pub async fn list_interfaces(
        &self,
        tenant_id: &str,
        full: bool,
        interface_type: Option<&str>,
    ) -> Result<Vec<InterfaceDescriptor>> {
        let tenant = self.registry.get(tenant_id).await?;
        let modules = self.catalog.get_enabled_modules(&tenant).await?;
        let mut seen = HashSet::new();
        let mut interfaces = Vec::new();
        for md in &modules {
            for provided in &md.provides {
                let type_ok = interface_type.is_none_or(|t| provided.is_type(t));
                if !type_ok {
                    continue;
                }
                if full {
                    interfaces.push(provided.clone());
                } else if seen.insert(provided.id.clone()) {
                    interfaces.push(InterfaceDescriptor::new(&provided.id, &provided.version));
                }
            }
        }
        Ok(interfaces)
    }

    /// Enabled modules of the tenant providing the named interface.
    pub async fn list_modules_from_interface(
        &self,
        tenant_id: &str,
        interface_name: &str,
        interface_type: Option<&str>,
    ) -> Result<Vec<ModuleDescriptor>> {
        let tenant = self.registry.get(tenant_id).await?;
        let modules = self.catalog.get_enabled_modules(&tenant).await?;
        Ok(modules
            .into_iter()
            .filter(|md| {
                md.provides.iter().any(|p| {
                    p.id == interface_name && interface_type.is_none_or(|t| p.is_type(t))
                })
            })
            .collect())
    }

    /// Enable one module and/or disable another for a tenant: dependency
    /// check, tenant-init call, permissions broadcast, then commit.
    /// Returns the enabled module id ("" for a pure disable).
    ///
    /// Concurrent transitions on the same tenant are not serialized here;
    /// callers must not overlap them.
    pub async fn enable_and_disable_module(
        &self,
        tenant_id: &str,
        module_from: Option<&str>,
        module_to: Option<&str>,
    ) -> Result<String> {
        let mut tenant = self.registry.get(tenant_id).await?;
        self.engine()
            .enable_and_disable(&mut tenant, module_from, module_to)
            .await
    }

    /// Plan and execute an install/upgrade. `requested = None` upgrades
    /// every enabled module to its newest available version. Returns the
    /// resolved plan; with `options.simulate` nothing else happens.
    ///
    /// Concurrent runs on the same tenant are the caller's to serialize.
    pub async fn install_upgrade_modules(
        &self,
        tenant_id: &str,
        requested: Option<Vec<TenantModuleAction>>,
        options: &InstallOptions,
    ) -> Result<Vec<TenantModuleAction>> {
        let mut tenant = self.registry.get(tenant_id).await?;
        let orchestrator = InstallOrchestrator::new(
            self.catalog.as_ref(),
            self.proxy_ref(),
            self.store.as_deref(),
            &self.registry,
        );
        orchestrator
            .install_upgrade(&mut tenant, requested, options)
            .await
    }
}

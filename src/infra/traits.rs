//! Trait seams for the external collaborators the lifecycle manager
//! consumes: the module catalog, the proxy service, and the durable
//! tenant store.

use std::collections::BTreeMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;

use crate::domain::{
    EnabledModule, ModuleDescriptor, Tenant, TenantDescriptor, TenantModuleAction,
};

use super::Result;

/// Read-only module catalog: descriptor lookup, version resolution, and
/// dependency/conflict analysis over candidate sets.
///
/// The catalog is immutable from the engine's perspective during a single
/// transition; a concurrent catalog change leaves the operation correct for
/// the snapshot it captured.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ModuleCatalog: Send + Sync {
    /// Descriptor for an exact module id.
    async fn get(&self, id: &str) -> Result<ModuleDescriptor>;

    /// Descriptor for a possibly partial id, resolved to the newest
    /// matching version.
    async fn get_latest(&self, id: &str) -> Result<ModuleDescriptor>;

    /// Descriptors of every module the tenant has enabled.
    async fn get_enabled_modules(&self, tenant: &Tenant) -> Result<Vec<ModuleDescriptor>>;

    /// All published modules, optionally filtered by name, with or without
    /// pre-releases.
    async fn get_modules_with_filter<'a>(
        &self,
        name: Option<&'a str>,
        include_pre_release: bool,
    ) -> Result<Vec<ModuleDescriptor>>;

    /// Diagnostic for unsatisfied dependencies in `modules`; empty when
    /// satisfied.
    fn check_all_dependencies(&self, modules: &BTreeMap<String, ModuleDescriptor>) -> String;

    /// Diagnostic for conflicts in `modules`; empty when none.
    fn check_all_conflicts(&self, modules: &BTreeMap<String, ModuleDescriptor>) -> String;

    /// Append the enables required to close `md`'s dependencies (and then
    /// `md` itself) to `plan`, updating `enabled` to the projected state.
    fn add_module_dependencies(
        &self,
        md: &ModuleDescriptor,
        available: &BTreeMap<String, ModuleDescriptor>,
        enabled: &mut BTreeMap<String, ModuleDescriptor>,
        plan: &mut Vec<TenantModuleAction>,
    );

    /// Append disables for modules depending on `md` (and then `md`
    /// itself) to `plan`, updating `enabled` to the projected state.
    fn remove_module_dependencies(
        &self,
        md: &ModuleDescriptor,
        enabled: &mut BTreeMap<String, ModuleDescriptor>,
        plan: &mut Vec<TenantModuleAction>,
    );
}

/// Invokes HTTP endpoints on modules on behalf of a tenant and provisions
/// module instances. Timeout and cancellation policy belong to the
/// implementation; a cancellation surfaces as a plain failure here.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ProxyService: Send + Sync {
    /// POST `body` to a system endpoint of `module_id` as `tenant_id`.
    async fn call_system_interface(
        &self,
        tenant_id: &str,
        module_id: &str,
        path: &str,
        body: &Value,
    ) -> Result<()>;

    /// Deploy an instance of the module if none is running.
    async fn auto_deploy(&self, md: &ModuleDescriptor) -> Result<()>;

    /// Undeploy the module's instances.
    async fn auto_undeploy(&self, md: &ModuleDescriptor) -> Result<()>;
}

/// Durable persistence for tenant records. Optional: without a store the
/// registry is memory-only. All lifecycle mutations write store-first, so
/// a memory entry implies a durable entry whenever a store is configured.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn insert(&self, tenant: &Tenant) -> Result<()>;

    async fn update_descriptor(&self, td: &TenantDescriptor) -> Result<()>;

    async fn update_modules(&self, id: &str, enabled: &[EnabledModule]) -> Result<()>;

    /// May fail `NotFound`; callers on the delete path tolerate that.
    async fn delete(&self, id: &str) -> Result<()>;

    async fn list(&self) -> Result<Vec<Tenant>>;
}

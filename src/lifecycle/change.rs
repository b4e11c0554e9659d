//! The enable/disable state machine for one module transition.
//!
//! A transition `(tenant, md_from?, md_to?)` runs RESOLVE, DEPCHECK,
//! TENANT_INIT, PERMISSIONS, COMMIT as straight-line async steps; each
//! failure terminates the transition and leaves durable state untouched.
//! External side effects are never rolled back: after a successful tenant
//! init, a later failure leaves the module initialized but unrecorded,
//! and a reconciliation warning is logged.
//!
//! Concurrent transitions on the same tenant are the caller's to
//! serialize; the engine operates on a cloned record until commit.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::domain::{ModuleDescriptor, PermissionsBroadcast, Tenant, TenantInitBody};
use crate::infra::{ModuleCatalog, ProxyService, Result, TenantError, TenantRegistry, TenantStore};

use super::interfaces;

/// Drives one module transition for one tenant.
pub struct ChangeEngine<'a> {
    catalog: &'a dyn ModuleCatalog,
    proxy: Option<&'a dyn ProxyService>,
    store: Option<&'a dyn TenantStore>,
    registry: &'a TenantRegistry,
}

impl<'a> ChangeEngine<'a> {
    pub fn new(
        catalog: &'a dyn ModuleCatalog,
        proxy: Option<&'a dyn ProxyService>,
        store: Option<&'a dyn TenantStore>,
        registry: &'a TenantRegistry,
    ) -> Self {
        Self {
            catalog,
            proxy,
            store,
            registry,
        }
    }

    fn proxy(&self) -> Result<&'a dyn ProxyService> {
        self.proxy
            .ok_or_else(|| TenantError::internal("proxy service not configured"))
    }

    /// The full machine: resolve ids, check dependencies, then run the
    /// side-effecting transition. Returns the committed module id, or an
    /// empty string for a pure disable.
    pub async fn enable_and_disable(
        &self,
        tenant: &mut Tenant,
        module_from: Option<&str>,
        module_to: Option<&str>,
    ) -> Result<String> {
        // RESOLVE: partial ids for the target resolve to the newest version.
        let md_to = match module_to {
            Some(id) => Some(self.catalog.get_latest(id).await?),
            None => None,
        };
        let md_from = match module_from {
            Some(id) => Some(self.catalog.get(id).await?),
            None => None,
        };
        self.check_dependencies(tenant, md_from.as_ref(), md_to.as_ref())
            .await?;
        debug!(tenant = %tenant.id(), "depcheck ok");
        self.transition(tenant, md_from.as_ref(), md_to.as_ref())
            .await
    }

    /// DEPCHECK: validate the projected enabled set
    /// `enabled ∪ {md_to} ∖ {md_from}` against the catalog's combined
    /// dependency/conflict predicate.
    pub(crate) async fn check_dependencies(
        &self,
        tenant: &Tenant,
        md_from: Option<&ModuleDescriptor>,
        md_to: Option<&ModuleDescriptor>,
    ) -> Result<()> {
        let mut mods: BTreeMap<String, ModuleDescriptor> = self
            .catalog
            .get_enabled_modules(tenant)
            .await?
            .into_iter()
            .map(|md| (md.id.clone(), md))
            .collect();
        if let Some(from) = md_from {
            mods.remove(&from.id);
        }
        if let Some(to) = md_to {
            if mods.contains_key(&to.id) {
                return Err(TenantError::user(format!(
                    "Module {} already provided",
                    to.id
                )));
            }
            mods.insert(to.id.clone(), to.clone());
        }
        let conflicts = self.catalog.check_all_conflicts(&mods);
        let deps = self.catalog.check_all_dependencies(&mods);
        if conflicts.is_empty() && deps.is_empty() {
            Ok(())
        } else {
            Err(TenantError::user(format!("{conflicts} {deps}")))
        }
    }

    /// TENANT_INIT → PERMISSIONS → COMMIT. Entry point for the install
    /// orchestrator, whose plan was already validated as a whole.
    pub(crate) async fn transition(
        &self,
        tenant: &mut Tenant,
        md_from: Option<&ModuleDescriptor>,
        md_to: Option<&ModuleDescriptor>,
    ) -> Result<String> {
        let Some(md_to) = md_to else {
            // Pure disable: straight to commit.
            let from = md_from
                .ok_or_else(|| TenantError::internal("transition with neither from nor to"))?;
            self.commit(tenant, Some(from.id.as_str()), None).await?;
            return Ok(String::new());
        };

        // TENANT_INIT
        match interfaces::tenant_interface(md_to) {
            Err(e) if e.is_not_found() => {
                debug!(module = %md_to.id, "no support for tenant init");
            }
            Err(e) => return Err(e),
            Ok(path) => {
                let body = TenantInitBody {
                    module_to: md_to.id.clone(),
                    module_from: md_from.map(|md| md.id.clone()),
                };
                debug!(tenant = %tenant.id(), module = %md_to.id, path = %path, "tenant init");
                self.proxy()?
                    .call_system_interface(tenant.id(), &md_to.id, &path, &body.to_value())
                    .await?;
            }
        }

        // PERMISSIONS, then COMMIT. From here on the module is already
        // tenant-initialized, so a failure leaves it initialized but not
        // recorded as enabled.
        let result = self.permissions_phase(tenant, md_to).await;
        let result = match result {
            Ok(()) => self
                .commit(tenant, md_from.map(|md| md.id.as_str()), Some(md_to.id.as_str()))
                .await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            warn!(
                tenant = %tenant.id(),
                module = %md_to.id,
                error = %e,
                "transition aborted after tenant init; module left initialized but not enabled"
            );
        }
        result?;
        Ok(md_to.id.clone())
    }

    /// PERMISSIONS: pick the permissions module and broadcast.
    ///
    /// When no enabled module provides `_tenantPermissions` but `md_to`
    /// does, every already-enabled module gets a backfill broadcast (in
    /// insertion order) before `md_to`'s own: their permissions had no
    /// sink while the permissions module was absent.
    async fn permissions_phase(&self, tenant: &Tenant, md_to: &ModuleDescriptor) -> Result<()> {
        match interfaces::find_permissions_provider(tenant, self.catalog).await {
            Err(e) if e.is_not_found() => {
                if md_to.system_interface("_tenantPermissions").is_some() {
                    debug!(tenant = %tenant.id(), module = %md_to.id, "reloading permissions of all enabled modules");
                    let enabled: Vec<String> =
                        tenant.enabled_ids().map(str::to_string).collect();
                    for mid in enabled {
                        let md = self.catalog.get(&mid).await?;
                        self.tenant_perms(tenant, &md, md_to).await?;
                    }
                    self.tenant_perms(tenant, md_to, md_to).await
                } else {
                    debug!(
                        tenant = %tenant.id(),
                        "no _tenantPermissions interface found, carrying on without it"
                    );
                    Ok(())
                }
            }
            Err(e) => Err(e),
            Ok(perms_mod) => {
                // The enabling module's own permissions surface overrides
                // the tenant's current provider.
                let host = if md_to.system_interface("_tenantPermissions").is_some() {
                    md_to
                } else {
                    &perms_mod
                };
                self.tenant_perms(tenant, md_to, host).await
            }
        }
    }

    /// POST `target`'s permission sets to `host`'s `_tenantPermissions`
    /// endpoint.
    async fn tenant_perms(
        &self,
        tenant: &Tenant,
        target: &ModuleDescriptor,
        host: &ModuleDescriptor,
    ) -> Result<()> {
        let path = host
            .system_interface("_tenantPermissions")
            .and_then(interfaces::permissions_post_path)
            .ok_or_else(|| {
                TenantError::user(format!(
                    "Bad _tenantPermissions interface in module {}. No path to POST to",
                    host.id
                ))
            })?;
        let body = PermissionsBroadcast {
            module_id: target.id.clone(),
            perms: target.permission_sets.clone(),
        };
        debug!(
            tenant = %tenant.id(),
            target = %target.id,
            host = %host.id,
            path = %path,
            "permissions broadcast"
        );
        self.proxy()?
            .call_system_interface(tenant.id(), &host.id, &path, &body.to_value())
            .await
    }

    /// COMMIT: mutate the record, write the store first when configured,
    /// then publish to the registry.
    async fn commit(
        &self,
        tenant: &mut Tenant,
        module_from: Option<&str>,
        module_to: Option<&str>,
    ) -> Result<()> {
        debug!(
            tenant = %tenant.id(),
            from = module_from.unwrap_or("-"),
            to = module_to.unwrap_or("-"),
            "commit"
        );
        if let Some(from) = module_from {
            tenant.disable_module(from);
        }
        if let Some(to) = module_to {
            tenant.enable_module(to);
        }
        if let Some(store) = self.store {
            store.update_modules(tenant.id(), &tenant.enabled).await?;
        }
        self.registry.put(tenant.clone()).await;
        Ok(())
    }
}

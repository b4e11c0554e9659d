//! Three-phase execution of an install plan.
//!
//! Phase 1 auto-deploys every module the plan enables or confirms, phase
//! 2 applies each action through the change engine, phase 3 undeploys
//! modules that no tenant uses any more. Phases 1 and 3 only run when the
//! deploy option is set; the first failure in any phase aborts the whole
//! operation with no rollback.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::domain::{
    Action, InstallOptions, ModuleDescriptor, Tenant, TenantModuleAction,
};
use crate::infra::{ModuleCatalog, ProxyService, Result, TenantError, TenantRegistry, TenantStore};

use super::change::ChangeEngine;
use super::planner::InstallPlanner;

pub struct InstallOrchestrator<'a> {
    catalog: &'a dyn ModuleCatalog,
    proxy: Option<&'a dyn ProxyService>,
    registry: &'a TenantRegistry,
    engine: ChangeEngine<'a>,
}

impl<'a> InstallOrchestrator<'a> {
    pub fn new(
        catalog: &'a dyn ModuleCatalog,
        proxy: Option<&'a dyn ProxyService>,
        store: Option<&'a dyn TenantStore>,
        registry: &'a TenantRegistry,
    ) -> Self {
        Self {
            catalog,
            proxy,
            registry,
            engine: ChangeEngine::new(catalog, proxy, store, registry),
        }
    }

    fn proxy(&self) -> Result<&'a dyn ProxyService> {
        self.proxy
            .ok_or_else(|| TenantError::internal("proxy service not configured"))
    }

    /// Plan and execute an install/upgrade for one tenant. With
    /// `options.simulate` the resolved plan is returned untouched and
    /// nothing is deployed, applied, or persisted.
    pub async fn install_upgrade(
        &self,
        tenant: &mut Tenant,
        requested: Option<Vec<TenantModuleAction>>,
        options: &InstallOptions,
    ) -> Result<Vec<TenantModuleAction>> {
        let planned = InstallPlanner::new(self.catalog)
            .build_plan(tenant, requested, options)
            .await?;
        if options.simulate {
            debug!(tenant = %tenant.id(), "simulate: returning resolved plan");
            return Ok(planned.plan);
        }

        if options.deploy {
            self.deploy_phase(&planned.plan, &planned.mods_available)
                .await?;
        }
        self.apply_phase(tenant, &planned.plan, &planned.mods_available)
            .await?;
        if options.deploy {
            self.undeploy_phase(&planned.plan, &planned.mods_available)
                .await?;
        }
        info!(tenant = %tenant.id(), actions = planned.plan.len(), "install complete");
        Ok(planned.plan)
    }

    /// Phase 1: every enabled or confirmed module gets an instance.
    async fn deploy_phase(
        &self,
        plan: &[TenantModuleAction],
        available: &BTreeMap<String, ModuleDescriptor>,
    ) -> Result<()> {
        for tm in plan {
            if matches!(tm.action, Action::Enable | Action::UpToDate) {
                let md = available
                    .get(&tm.id)
                    .ok_or_else(|| TenantError::internal(format!("planned module vanished: {}", tm.id)))?;
                debug!(module = %md.id, "auto-deploy");
                self.proxy()?.auto_deploy(md).await?;
            }
        }
        Ok(())
    }

    /// Phase 2: apply each action through the change engine. The plan was
    /// validated as a whole, so the engine enters at tenant init. One
    /// mutable record is threaded through, so later actions observe
    /// earlier commits.
    async fn apply_phase(
        &self,
        tenant: &mut Tenant,
        plan: &[TenantModuleAction],
        available: &BTreeMap<String, ModuleDescriptor>,
    ) -> Result<()> {
        for tm in plan {
            let (md_from, md_to) = match tm.action {
                Action::Enable => (
                    tm.from.as_ref().and_then(|f| available.get(f)),
                    available.get(&tm.id),
                ),
                Action::Disable => (available.get(&tm.id), None),
                Action::UpToDate => (None, None),
            };
            if md_from.is_none() && md_to.is_none() {
                continue;
            }
            self.engine.transition(tenant, md_from, md_to).await?;
        }
        Ok(())
    }

    /// Phase 3: undeploy modules leaving the tenant, unless some tenant
    /// still uses them (or the user probe fails, which also skips).
    async fn undeploy_phase(
        &self,
        plan: &[TenantModuleAction],
        available: &BTreeMap<String, ModuleDescriptor>,
    ) -> Result<()> {
        for tm in plan {
            let leaving = match tm.action {
                Action::Enable => tm.from.as_deref(),
                Action::Disable => Some(tm.id.as_str()),
                Action::UpToDate => None,
            };
            let Some(md) = leaving.and_then(|id| available.get(id)) else {
                continue;
            };
            match self.registry.first_module_user(&md.id).await {
                Ok(Some(user)) => {
                    debug!(module = %md.id, tenant = %user, "still in use, skipping undeploy");
                }
                Err(e) => {
                    debug!(module = %md.id, error = %e, "module user probe failed, skipping undeploy");
                }
                Ok(None) => {
                    debug!(module = %md.id, "auto-undeploy");
                    self.proxy()?.auto_undeploy(md).await?;
                }
            }
        }
        Ok(())
    }
}

//! Install/upgrade planning.
//!
//! Turns a list of requested module actions (or an empty "upgrade
//! everything" request) into a dependency-closed, validated plan:
//! enables dependency-first, disables dependent-first, `uptodate`
//! markers for targets already at the requested version.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::domain::{
    Action, InstallOptions, ModuleDescriptor, ModuleId, Tenant, TenantModuleAction,
};
use crate::infra::{ModuleCatalog, Result, TenantError};

/// Builds plans against a catalog snapshot.
pub struct InstallPlanner<'a> {
    catalog: &'a dyn ModuleCatalog,
}

/// A validated plan plus the catalog snapshot it was planned against.
pub struct PlannedInstall {
    pub plan: Vec<TenantModuleAction>,
    pub mods_available: BTreeMap<String, ModuleDescriptor>,
}

impl<'a> InstallPlanner<'a> {
    pub fn new(catalog: &'a dyn ModuleCatalog) -> Self {
        Self { catalog }
    }

    /// Resolve `requested` (or derive the upgrade set when `None`) into a
    /// closed plan. The returned plan is the authoritative output; the
    /// input list is consumed.
    pub async fn build_plan(
        &self,
        tenant: &Tenant,
        requested: Option<Vec<TenantModuleAction>>,
        options: &InstallOptions,
    ) -> Result<PlannedInstall> {
        let mods_available: BTreeMap<String, ModuleDescriptor> = self
            .catalog
            .get_modules_with_filter(None, options.pre_release)
            .await?
            .into_iter()
            .map(|md| (md.id.clone(), md))
            .collect();
        let mut mods_enabled: BTreeMap<String, ModuleDescriptor> = mods_available
            .iter()
            .filter(|(id, _)| tenant.is_enabled(id))
            .map(|(id, md)| (id.clone(), md.clone()))
            .collect();

        let requested = match requested {
            Some(actions) => actions,
            None => upgrade_actions(&mods_available, &mods_enabled),
        };

        let mut plan: Vec<TenantModuleAction> = Vec::new();
        for tm in &requested {
            match tm.action {
                Action::Enable => {
                    self.plan_enable(&tm.id, &mods_available, &mut mods_enabled, &mut plan)?
                }
                Action::UpToDate => require_enabled(&mods_enabled, &tm.id)?,
                Action::Disable => {
                    self.plan_disable(&tm.id, &mods_available, &mut mods_enabled, &mut plan)?
                }
            }
        }

        let diag = self.catalog.check_all_dependencies(&mods_enabled);
        if !diag.is_empty() {
            warn!(tenant = %tenant.id(), diagnostic = %diag, "planned module set has unsatisfied dependencies");
            return Err(TenantError::user(diag));
        }
        debug!(tenant = %tenant.id(), actions = plan.len(), "plan resolved");
        Ok(PlannedInstall {
            plan,
            mods_available,
        })
    }

    fn plan_enable(
        &self,
        id: &str,
        available: &BTreeMap<String, ModuleDescriptor>,
        enabled: &mut BTreeMap<String, ModuleDescriptor>,
        plan: &mut Vec<TenantModuleAction>,
    ) -> Result<()> {
        let mid = ModuleId::new(id);
        let id = if mid.has_sem_ver() {
            id.to_string()
        } else {
            mid.latest_of(available.keys())
        };
        let Some(md) = available.get(&id) else {
            return Err(TenantError::not_found(id));
        };
        if enabled.contains_key(&id) {
            if !plan.iter().any(|tm| tm.id == id) {
                plan.push(TenantModuleAction::up_to_date(&id));
            }
        } else {
            self.catalog
                .add_module_dependencies(md, available, enabled, plan);
        }
        Ok(())
    }

    fn plan_disable(
        &self,
        id: &str,
        available: &BTreeMap<String, ModuleDescriptor>,
        enabled: &mut BTreeMap<String, ModuleDescriptor>,
        plan: &mut Vec<TenantModuleAction>,
    ) -> Result<()> {
        let mid = ModuleId::new(id);
        let id = if mid.has_sem_ver() {
            id.to_string()
        } else {
            mid.latest_of(enabled.keys())
        };
        require_enabled(enabled, &id)?;
        let md = available
            .get(&id)
            .or_else(|| enabled.get(&id))
            .cloned()
            .ok_or_else(|| TenantError::not_found(id.clone()))?;
        self.catalog.remove_module_dependencies(&md, enabled, plan);
        Ok(())
    }
}

fn require_enabled(enabled: &BTreeMap<String, ModuleDescriptor>, id: &str) -> Result<()> {
    if enabled.contains_key(id) {
        Ok(())
    } else {
        Err(TenantError::not_found(id.to_string()))
    }
}

/// Upgrade request: one enable-with-from per enabled module whose product
/// has a newer available version.
fn upgrade_actions(
    available: &BTreeMap<String, ModuleDescriptor>,
    enabled: &BTreeMap<String, ModuleDescriptor>,
) -> Vec<TenantModuleAction> {
    let mut actions = Vec::new();
    for f_id in enabled.keys() {
        let u_id = ModuleId::new(f_id).latest_of(available.keys());
        if u_id != *f_id {
            debug!(from = %f_id, to = %u_id, "upgrade candidate");
            actions.push(TenantModuleAction::upgrade(&u_id, f_id));
        }
    }
    actions
}

//! Resolution of the reserved system interfaces a module may provide.
//!
//! `_tenant` is the per-tenant init hook, `_tenantPermissions` the sink
//! for permission broadcasts. Several deprecated shapes of the `_tenant`
//! interface are still honored: the proper form is a system interface
//! with a POST routing entry; a provided `_tenant` with no routing
//! entries falls back to the well-known path.

use tracing::{debug, warn};

use crate::domain::{InterfaceDescriptor, ModuleDescriptor, Tenant};
use crate::infra::{ModuleCatalog, Result, TenantError};

/// Fallback path for legacy `_tenant` interfaces without routing entries.
const LEGACY_TENANT_PATH: &str = "/_/tenant";

/// Resolve the path of `md`'s `_tenant` interface.
///
/// `NotFound` when the module provides no `_tenant` interface at all (the
/// caller treats that as "no tenant init support" and skips the call);
/// `User` when the interface exists at an unsupported version.
pub fn tenant_interface(md: &ModuleDescriptor) -> Result<String> {
    let Some(pi) = md.provides.iter().find(|p| p.id == "_tenant") else {
        return Err(TenantError::not_found(format!(
            "No _tenant interface found for {}",
            md.id
        )));
    };
    if pi.version != "1.0" {
        return Err(TenantError::user("Interface _tenant must be version 1.0"));
    }
    if pi.is_system() {
        for re in pi.all_routing_entries() {
            if re.matches(None, "POST") {
                if let Some(path) = &re.path {
                    debug!(module = %md.id, path = %path, "resolved _tenant path");
                    return Ok(path.clone());
                }
                if let Some(pattern) = &re.path_pattern {
                    debug!(module = %md.id, pattern = %pattern, "resolved _tenant path pattern");
                    return Ok(pattern.clone());
                }
            }
        }
    }
    warn!(
        module = %md.id,
        "module uses old-fashioned tenant interface; define interfaceType=system \
         with a routing entry. Falling back to calling /_/tenant"
    );
    Ok(LEGACY_TENANT_PATH.to_string())
}

/// POST path of a `_tenantPermissions` interface, if it declares one.
///
/// All routing entries are walked; the last POST-capable entry wins, its
/// `path` preferred over `path_pattern`. `None` means there is nothing to
/// POST to, which the caller reports as a bad interface.
pub fn permissions_post_path(perm_int: &InterfaceDescriptor) -> Option<String> {
    let mut perm_path: Option<String> = None;
    for re in perm_int.all_routing_entries() {
        if re.matches(None, "POST") {
            perm_path = match &re.path {
                Some(p) if !p.is_empty() => Some(p.clone()),
                _ => re.path_pattern.clone(),
            };
        }
    }
    perm_path.filter(|p| !p.is_empty())
}

/// First enabled module (insertion order) providing `_tenantPermissions`
/// as a system interface; `NotFound` when no enabled module does.
pub async fn find_permissions_provider(
    tenant: &Tenant,
    catalog: &dyn ModuleCatalog,
) -> Result<ModuleDescriptor> {
    for mid in tenant.enabled_ids() {
        let md = catalog.get(mid).await?;
        if md.system_interface("_tenantPermissions").is_some() {
            debug!(tenant = %tenant.id(), module = %mid, "found permissions provider");
            return Ok(md);
        }
    }
    Err(TenantError::not_found(
        "No module provides _tenantPermissions",
    ))
}

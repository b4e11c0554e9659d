//! Common fixtures for the lifecycle integration tests: descriptor
//! builders, an in-memory catalog with real dependency closure, and a
//! recording proxy.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use modgate_tenants::infra::{ModuleCatalog, ProxyService, Result, TenantError};
use modgate_tenants::{
    InterfaceDescriptor, ModuleDescriptor, ModuleId, Permission, RoutingEntry, Tenant,
    TenantDescriptor, TenantModuleAction,
};

pub fn tenant(id: &str) -> Tenant {
    Tenant::new(TenantDescriptor::new(id))
}

/// Builder for module descriptors in the catalog fixture.
pub struct ModuleBuilder {
    md: ModuleDescriptor,
}

impl ModuleBuilder {
    pub fn new(id: &str) -> Self {
        let product = ModuleId::new(id).product().to_string();
        Self {
            md: ModuleDescriptor {
                id: id.to_string(),
                name: product,
                ..Default::default()
            },
        }
    }

    /// Provide a plain (non-system) interface.
    pub fn provides(mut self, id: &str, version: &str) -> Self {
        self.md.provides.push(InterfaceDescriptor::new(id, version));
        self
    }

    pub fn requires(mut self, id: &str, version: &str) -> Self {
        self.md.requires.push(modgate_tenants::domain::InterfaceReference {
            id: id.to_string(),
            version: version.to_string(),
        });
        self
    }

    /// Provide a proper `_tenant` system interface with a POST path.
    pub fn tenant_interface(mut self, path: &str) -> Self {
        let mut pi = InterfaceDescriptor::new("_tenant", "1.0");
        pi.interface_type = Some("system".to_string());
        pi.routing_entries = vec![RoutingEntry {
            methods: vec!["POST".to_string(), "DELETE".to_string()],
            path: Some(path.to_string()),
            path_pattern: None,
        }];
        self.md.provides.push(pi);
        self
    }

    /// Provide the legacy `_tenant` shape: version 1.0, no routing entries.
    pub fn legacy_tenant_interface(mut self) -> Self {
        self.md.provides.push(InterfaceDescriptor::new("_tenant", "1.0"));
        self
    }

    /// Provide a `_tenantPermissions` system interface with a POST path.
    pub fn permissions_interface(mut self, path: &str) -> Self {
        let mut pi = InterfaceDescriptor::new("_tenantPermissions", "1.0");
        pi.interface_type = Some("system".to_string());
        pi.routing_entries = vec![RoutingEntry {
            methods: vec!["POST".to_string()],
            path: Some(path.to_string()),
            path_pattern: None,
        }];
        self.md.provides.push(pi);
        self
    }

    pub fn permission(mut self, name: &str) -> Self {
        self.md.permission_sets.push(Permission {
            permission_name: name.to_string(),
            ..Default::default()
        });
        self
    }

    pub fn build(self) -> ModuleDescriptor {
        self.md
    }
}

fn version_satisfies(provided: &str, required: &str) -> bool {
    let major = |v: &str| v.split('.').next().unwrap_or("0").to_string();
    if major(provided) != major(required) {
        return false;
    }
    use modgate_tenants::domain::ModuleVersion;
    ModuleVersion::parse(provided) >= ModuleVersion::parse(required)
}

fn provides_interface(md: &ModuleDescriptor, id: &str, version: &str) -> bool {
    md.provides
        .iter()
        .any(|p| p.id == id && version_satisfies(&p.version, version))
}

/// In-memory module catalog with interface-based dependency closure.
pub struct StaticCatalog {
    modules: BTreeMap<String, ModuleDescriptor>,
}

impl StaticCatalog {
    pub fn new(modules: Vec<ModuleDescriptor>) -> Self {
        Self {
            modules: modules.into_iter().map(|md| (md.id.clone(), md)).collect(),
        }
    }

    fn add_closure(
        &self,
        md: &ModuleDescriptor,
        available: &BTreeMap<String, ModuleDescriptor>,
        enabled: &mut BTreeMap<String, ModuleDescriptor>,
        plan: &mut Vec<TenantModuleAction>,
    ) {
        for req in &md.requires {
            let satisfied = enabled
                .values()
                .any(|m| provides_interface(m, &req.id, &req.version));
            if satisfied {
                continue;
            }
            // newest available provider of the missing interface
            let provider = available
                .values()
                .filter(|m| provides_interface(m, &req.id, &req.version))
                .max_by(|a, b| {
                    let va = ModuleId::new(&a.id);
                    let vb = ModuleId::new(&b.id);
                    va.version().cmp(&vb.version())
                })
                .cloned();
            if let Some(provider) = provider {
                self.add_closure(&provider, available, enabled, plan);
            }
        }
        // replace an enabled module of the same product, if any
        let product = ModuleId::new(&md.id).product().to_string();
        let from = enabled
            .keys()
            .find(|id| *id != &md.id && ModuleId::new(id).product() == product)
            .cloned();
        match from {
            Some(f) => {
                enabled.remove(&f);
                plan.push(TenantModuleAction::upgrade(&md.id, &f));
            }
            None => plan.push(TenantModuleAction::enable(&md.id)),
        }
        enabled.insert(md.id.clone(), md.clone());
    }

    fn remove_closure(
        &self,
        md: &ModuleDescriptor,
        enabled: &mut BTreeMap<String, ModuleDescriptor>,
        plan: &mut Vec<TenantModuleAction>,
    ) {
        if enabled.remove(&md.id).is_none() {
            return;
        }
        // disable dependents whose requirement is no longer satisfied
        let dependents: Vec<ModuleDescriptor> = enabled
            .values()
            .filter(|m| {
                m.requires.iter().any(|req| {
                    provides_interface(md, &req.id, &req.version)
                        && !enabled
                            .values()
                            .any(|other| provides_interface(other, &req.id, &req.version))
                })
            })
            .cloned()
            .collect();
        for dep in dependents {
            self.remove_closure(&dep, enabled, plan);
        }
        plan.push(TenantModuleAction::disable(&md.id));
    }
}

#[async_trait]
impl ModuleCatalog for StaticCatalog {
    async fn get(&self, id: &str) -> Result<ModuleDescriptor> {
        self.modules
            .get(id)
            .cloned()
            .ok_or_else(|| TenantError::not_found(format!("module not found: {id}")))
    }

    async fn get_latest(&self, id: &str) -> Result<ModuleDescriptor> {
        let mid = ModuleId::new(id);
        let resolved = if mid.has_sem_ver() {
            id.to_string()
        } else {
            mid.latest_of(self.modules.keys())
        };
        self.get(&resolved).await
    }

    async fn get_enabled_modules(&self, tenant: &Tenant) -> Result<Vec<ModuleDescriptor>> {
        let mut out = Vec::new();
        for mid in tenant.enabled_ids() {
            out.push(self.get(mid).await?);
        }
        Ok(out)
    }

    async fn get_modules_with_filter<'a>(
        &self,
        name: Option<&'a str>,
        include_pre_release: bool,
    ) -> Result<Vec<ModuleDescriptor>> {
        Ok(self
            .modules
            .values()
            .filter(|md| {
                let mid = ModuleId::new(&md.id);
                let name_ok = name.is_none_or(|n| mid.product() == n);
                let pre_ok = include_pre_release
                    || !mid.version().is_some_and(|v| v.is_pre_release());
                name_ok && pre_ok
            })
            .cloned()
            .collect())
    }

    fn check_all_dependencies(&self, modules: &BTreeMap<String, ModuleDescriptor>) -> String {
        let mut problems = Vec::new();
        for md in modules.values() {
            for req in &md.requires {
                let satisfied = modules
                    .values()
                    .any(|m| provides_interface(m, &req.id, &req.version));
                if !satisfied {
                    problems.push(format!(
                        "Missing dependency: {} requires {} {}",
                        md.id, req.id, req.version
                    ));
                }
            }
        }
        problems.join("; ")
    }

    fn check_all_conflicts(&self, modules: &BTreeMap<String, ModuleDescriptor>) -> String {
        let mut problems = Vec::new();
        let mut seen: BTreeMap<String, &str> = BTreeMap::new();
        for md in modules.values() {
            let product = ModuleId::new(&md.id).product().to_string();
            if let Some(other) = seen.get(&product) {
                problems.push(format!("Module {} conflicts with {}", md.id, other));
            } else {
                seen.insert(product, &md.id);
            }
        }
        problems.join("; ")
    }

    fn add_module_dependencies(
        &self,
        md: &ModuleDescriptor,
        available: &BTreeMap<String, ModuleDescriptor>,
        enabled: &mut BTreeMap<String, ModuleDescriptor>,
        plan: &mut Vec<TenantModuleAction>,
    ) {
        self.add_closure(md, available, enabled, plan);
    }

    fn remove_module_dependencies(
        &self,
        md: &ModuleDescriptor,
        enabled: &mut BTreeMap<String, ModuleDescriptor>,
        plan: &mut Vec<TenantModuleAction>,
    ) {
        self.remove_closure(md, enabled, plan);
    }
}

/// What the proxy was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyCall {
    System {
        tenant: String,
        module: String,
        path: String,
        body: Value,
    },
    Deploy(String),
    Undeploy(String),
}

/// `ProxyService` that records calls and fails on demand.
#[derive(Default)]
pub struct RecordingProxy {
    calls: Mutex<Vec<ProxyCall>>,
    fail_paths: Mutex<HashSet<String>>,
}

impl RecordingProxy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every system call to `path` fail.
    pub fn fail_path(&self, path: &str) {
        self.fail_paths.lock().unwrap().insert(path.to_string());
    }

    pub fn calls(&self) -> Vec<ProxyCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn system_calls(&self) -> Vec<ProxyCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, ProxyCall::System { .. }))
            .collect()
    }
}

#[async_trait]
impl ProxyService for RecordingProxy {
    async fn call_system_interface(
        &self,
        tenant_id: &str,
        module_id: &str,
        path: &str,
        body: &Value,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(ProxyCall::System {
            tenant: tenant_id.to_string(),
            module: module_id.to_string(),
            path: path.to_string(),
            body: body.clone(),
        });
        if self.fail_paths.lock().unwrap().contains(path) {
            return Err(TenantError::internal(format!("POST {path} failed")));
        }
        Ok(())
    }

    async fn auto_deploy(&self, md: &ModuleDescriptor) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(ProxyCall::Deploy(md.id.clone()));
        Ok(())
    }

    async fn auto_undeploy(&self, md: &ModuleDescriptor) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(ProxyCall::Undeploy(md.id.clone()));
        Ok(())
    }
}

/// Assert that a result is Ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a result is Err and return the error
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    };
}

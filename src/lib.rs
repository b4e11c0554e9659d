//! ModGate tenant lifecycle manager.
//!
//! Authoritative control plane for the tenants of a module-routing
//! gateway: which modules each tenant has enabled, at which versions, and
//! the staged protocol that installs, upgrades, and disables them
//! (dependency resolution, optional deployment, per-module tenant-init
//! callbacks, permission broadcasts, optional undeployment).
//!
//! ## Modules
//!
//! - [`domain`] - Tenant records, module descriptors, install plans
//! - [`infra`] - Errors, collaborator traits, the tenant registry, stores
//! - [`lifecycle`] - The module-change protocol
//! - [`manager`] - The [`TenantManager`] facade
//! - [`config`] / [`telemetry`] - Embedding support

pub mod config;
pub mod domain;
pub mod infra;
pub mod lifecycle;
pub mod manager;
pub mod telemetry;

// Re-export commonly used types
pub use domain::{
    Action, EnabledModule, InstallOptions, InterfaceDescriptor, ModuleDescriptor, ModuleId,
    Permission, RoutingEntry, Tenant, TenantDescriptor, TenantModuleAction,
};

pub use infra::{
    MemTenantStore, ModuleCatalog, PgTenantStore, ProxyService, Result, TenantError,
    TenantRegistry, TenantStore,
};

pub use manager::TenantManager;

//! Tenant records.
//!
//! A tenant is an isolation boundary that enables a curated set of module
//! versions. The record itself is pure state; all side-effecting
//! transitions live in the lifecycle layer, which operates on a cloned
//! record until commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::module::ModuleId;

/// Human-facing tenant fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantDescriptor {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TenantDescriptor {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }
}

/// One enabled module with its enable timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnabledModule {
    pub id: String,
    pub enabled_at: DateTime<Utc>,
}

/// A tenant and its enabled module set.
///
/// `enabled` preserves insertion order; the permissions-provider scan and
/// the backfill broadcast depend on it. Uniqueness by exact module id is
/// maintained by the mutators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub descriptor: TenantDescriptor,
    #[serde(default)]
    pub enabled: Vec<EnabledModule>,
}

impl Tenant {
    pub fn new(descriptor: TenantDescriptor) -> Self {
        Self {
            descriptor,
            enabled: Vec::new(),
        }
    }

    pub fn with_enabled(descriptor: TenantDescriptor, enabled: Vec<EnabledModule>) -> Self {
        Self { descriptor, enabled }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// Insert `module_id` with the current timestamp. Re-enabling an id
    /// refreshes its timestamp and moves it to the end of the order.
    pub fn enable_module(&mut self, module_id: &str) {
        self.enabled.retain(|m| m.id != module_id);
        self.enabled.push(EnabledModule {
            id: module_id.to_string(),
            enabled_at: Utc::now(),
        });
    }

    /// Remove by exact id. Unknown ids are a no-op.
    pub fn disable_module(&mut self, module_id: &str) {
        self.enabled.retain(|m| m.id != module_id);
    }

    pub fn is_enabled(&self, module_id: &str) -> bool {
        self.enabled.iter().any(|m| m.id == module_id)
    }

    /// True when some enabled module shares the product of `module_id`.
    pub fn has_product(&self, module_id: &ModuleId) -> bool {
        self.enabled
            .iter()
            .any(|m| ModuleId::new(&m.id).product() == module_id.product())
    }

    /// Enabled ids in insertion order.
    pub fn enabled_ids(&self) -> impl Iterator<Item = &str> {
        self.enabled.iter().map(|m| m.id.as_str())
    }

    /// Sorted id list, the external view.
    pub fn list_modules(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.enabled.iter().map(|m| m.id.clone()).collect();
        ids.sort();
        ids
    }
}

//! Install plans and the wire bodies the lifecycle protocol emits.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::module::Permission;

/// Verb of a planned module action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Enable,
    Disable,
    #[serde(rename = "uptodate")]
    UpToDate,
}

/// One unit of an install plan.
///
/// `id` may be partially qualified on input (no version); the planner
/// resolves it. `from` is the upgrade hint: the module id being replaced
/// by an enable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TenantModuleAction {
    pub id: String,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl TenantModuleAction {
    pub fn enable(id: &str) -> Self {
        Self {
            id: id.to_string(),
            action: Action::Enable,
            from: None,
        }
    }

    pub fn upgrade(id: &str, from: &str) -> Self {
        Self {
            id: id.to_string(),
            action: Action::Enable,
            from: Some(from.to_string()),
        }
    }

    pub fn disable(id: &str) -> Self {
        Self {
            id: id.to_string(),
            action: Action::Disable,
            from: None,
        }
    }

    pub fn up_to_date(id: &str) -> Self {
        Self {
            id: id.to_string(),
            action: Action::UpToDate,
            from: None,
        }
    }
}

/// Options governing one install/upgrade run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstallOptions {
    /// Auto-deploy enabled modules before applying, auto-undeploy leaving
    /// modules after.
    pub deploy: bool,
    /// Resolve and validate the plan, then return it without side effects.
    pub simulate: bool,
    /// Include pre-release module versions in resolution.
    pub pre_release: bool,
}

/// POST body of the `_tenant` init call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenantInitBody {
    pub module_to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_from: Option<String>,
}

impl TenantInitBody {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("tenant init body serializes")
    }
}

/// POST body of a `_tenantPermissions` broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsBroadcast {
    pub module_id: String,
    pub perms: Vec<Permission>,
}

impl PermissionsBroadcast {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("permissions broadcast serializes")
    }
}

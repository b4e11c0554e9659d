//! Environment-driven configuration.

/// Configuration for the tenant lifecycle manager.
#[derive(Debug, Clone)]
pub struct TenantsConfig {
    /// Name of the cluster-shared tenant map.
    pub map_name: String,
    /// Use a process-local map even in cluster mode. The node then cannot
    /// share tenants with the cluster.
    pub force_local_map: bool,
    /// PostgreSQL connection string; `None` runs without durable storage.
    pub database_url: Option<String>,
    /// Resolve pre-release module versions by default.
    pub include_pre_release: bool,
}

impl Default for TenantsConfig {
    fn default() -> Self {
        Self {
            map_name: "tenants".to_string(),
            force_local_map: false,
            database_url: None,
            include_pre_release: false,
        }
    }
}

impl TenantsConfig {
    pub fn from_env() -> Self {
        Self {
            map_name: std::env::var("MODGATE_TENANT_MAP")
                .unwrap_or_else(|_| "tenants".to_string()),
            force_local_map: std::env::var("MODGATE_FORCE_LOCAL_MAP")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            database_url: std::env::var("DATABASE_URL").ok(),
            include_pre_release: std::env::var("MODGATE_PRE_RELEASE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// The shared-map name to hand the registry; `None` when forced local.
    pub fn shared_map_name(&self) -> Option<String> {
        if self.force_local_map {
            None
        } else {
            Some(self.map_name.clone())
        }
    }
}

//! Error types for the tenant lifecycle manager.
//!
//! Failures carry a four-way kind taxonomy as a discriminated union, not an
//! exception hierarchy: client-caused (`User`), addressed-entity-absent
//! (`NotFound`), invariant or sub-system breakage (`Internal`), and the
//! module-user probe signal (`InUse`). Nothing is retried inside the TLM;
//! errors are wrapped with their original kind and logged at the boundary
//! where they are first observed.

use thiserror::Error;

/// Errors surfaced by tenant lifecycle operations.
#[derive(Error, Debug)]
pub enum TenantError {
    /// Client-caused: duplicate tenant id, interface version mismatch,
    /// dependency/conflict diagnostics, bad permissions interface.
    #[error("{0}")]
    User(String),

    /// Addressed entity absent: unknown tenant or module, missing system
    /// interface, uptodate target not enabled.
    #[error("{0}")]
    NotFound(String),

    /// Invariant violation or unexpected sub-system failure.
    #[error("internal error: {0}")]
    Internal(String),

    /// A module is still enabled by a tenant; payload is that tenant's id.
    #[error("in use by tenant {tenant_id}")]
    InUse { tenant_id: String },

    /// Store transport failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl TenantError {
    pub fn user(msg: impl Into<String>) -> Self {
        Self::User(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for tenant lifecycle operations.
pub type Result<T> = std::result::Result<T, TenantError>;

//! Error types for composing and provisioning the deployment.

use std::sync::Arc;

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while composing or provisioning the deployment.
///
/// `Error` is `Clone` because a single failure is observed by every
/// deferred value that depends on the failed resource.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Identity Errors
    // =========================================================================
    /// Ambient project or service identity could not be resolved.
    #[error("identity resolution failed: {0}")]
    IdentityResolution(String),

    // =========================================================================
    // Resource Lifecycle Errors
    // =========================================================================
    /// Provider rejected a create request. `reason` is the provider's message.
    #[error("failed to create {resource}: {reason}")]
    ResourceCreationFailed { resource: String, reason: String },

    /// Provider rejected an in-place update.
    #[error("failed to update {resource}: {reason}")]
    ResourceUpdateFailed { resource: String, reason: String },

    /// Provider rejected a delete request.
    #[error("failed to delete {resource}: {reason}")]
    ResourceDeleteFailed { resource: String, reason: String },

    /// Resource is not known to the provider.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// IAM policy could not be applied. The server cannot unseal without it.
    #[error("failed to apply IAM policy on {resource}: {reason}")]
    PolicyBindingFailed { resource: String, reason: String },

    /// Provider returned outputs of a different resource kind.
    #[error("unexpected outputs for {resource}: expected {expected}")]
    UnexpectedOutputs { resource: String, expected: String },

    // =========================================================================
    // Composition Errors
    // =========================================================================
    /// A value referenced by the server configuration never resolved,
    /// or resolved empty.
    #[error("unresolved value for '{field}': {reason}")]
    UnresolvedValue { field: String, reason: String },

    /// Invalid input (names, domains, limits).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Run was aborted after an earlier fatal failure.
    #[error("skipped {resource}: run aborted after an earlier failure")]
    Aborted { resource: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration could not be loaded or extracted.
    #[error("configuration error: {0}")]
    Config(String),

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Returns true if this error was caused by an earlier failure rather
    /// than by the resource it is reported for.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

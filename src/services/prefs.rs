//! The update pipeline's durable preference store.

use thiserror::Error;

/// Keys written by the payload pipeline that the cleanup action resets.
pub mod keys {
    pub const UPDATE_STATE_NEXT_OPERATION: &str = "update-state-next-operation";
    pub const UPDATE_STATE_NEXT_DATA_OFFSET: &str = "update-state-next-data-offset";
    pub const UPDATE_STATE_NEXT_DATA_LENGTH: &str = "update-state-next-data-length";
    pub const UPDATE_STATE_SHA256_CONTEXT: &str = "update-state-sha-256-context";
    pub const UPDATE_STATE_SIGNED_SHA256_CONTEXT: &str = "update-state-signed-sha-256-context";
    pub const UPDATE_STATE_SIGNATURE_BLOB: &str = "update-state-signature-blob";
    pub const MANIFEST_METADATA_SIZE: &str = "manifest-metadata-size";
    pub const MANIFEST_SIGNATURE_SIZE: &str = "manifest-signature-size";
    pub const RESUMED_UPDATE_FAILURES: &str = "resumed-update-failures";
    pub const POST_INSTALL_SUCCEEDED: &str = "post-install-succeeded";
    pub const VERITY_WRITTEN: &str = "verity-written";

    /// Non-empty while dynamic partition metadata for the update is in place.
    pub const DYNAMIC_PARTITION_METADATA_UPDATED: &str = "dynamic-partition-metadata-updated";
}

/// Errors returned by a preference store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrefsError {
    /// The store does not accept writes.
    #[error("preference store is read-only")]
    ReadOnly,

    /// A write or delete failed.
    #[error("failed to update preference {key}: {reason}")]
    Write { key: String, reason: String },
}

/// A durable string/integer key-value store.
pub trait Preferences: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get_string(&self, key: &str) -> Option<String>;

    fn set_string(&self, key: &str, value: &str) -> Result<(), PrefsError>;

    fn set_i64(&self, key: &str, value: i64) -> Result<(), PrefsError>;

    /// Removes `key`. Removing a missing key succeeds.
    fn delete(&self, key: &str) -> Result<(), PrefsError>;
}

//! Provisioning-side immutability guard
//!
//! Object lock cannot be turned off once a bucket has been created with it.
//! The compiler itself is stateless and never sees prior provisioning state,
//! so the check lives here for the caller that does.

use log::warn;

use crate::compiler::CompiledArtifact;
use crate::errors::ImmutabilityError;

/// Reject an artifact that would disable object lock on a bucket that was
/// previously provisioned with it.
///
/// `previously_enabled` comes from the provisioning layer's own record of the
/// bucket. Enabling object lock on a bucket that never had it is allowed.
pub fn ensure_object_lock_monotonic(
    previously_enabled: bool,
    artifact: &CompiledArtifact,
) -> Result<(), ImmutabilityError> {
    if previously_enabled && artifact.object_lock.is_none() {
        warn!("Refusing to disable object lock on bucket {}", artifact.bucket);
        return Err(ImmutabilityError::ObjectLockDisabled {
            bucket: artifact.bucket.clone(),
        });
    }
    Ok(())
}

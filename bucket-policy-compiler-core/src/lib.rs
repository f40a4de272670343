//! This crate provides the core of the bucket policy compiler:
//! - Configuration model and validation
//! - Resource policy composition with non-removable baseline statements
//! - Lifecycle rule compilation
//! - The object lock immutability guard for provisioning callers
//!

pub mod compiler;
mod errors;
pub mod guard;
pub mod lifecycle;
pub mod model;
pub mod policy;
pub mod validation;

// Re-exports for a small, focused public API
pub use compiler::{compile, BucketBaseline, CompiledArtifact, Compiler, CompilerOptions};
pub use errors::{ImmutabilityError, ValidationError, Violation};
pub use guard::ensure_object_lock_monotonic;
pub use lifecycle::{LifecycleRule, Transition};
pub use model::{
    BucketSecurityConfig, CorsRule, Environment, LoggingConfig, ObjectLockConfig, ObjectLockMode,
    ObjectLockSettings, Partition,
};
pub use policy::{Condition, Effect, PolicyDocument, PolicyStatement, Principal};
pub use validation::validate;

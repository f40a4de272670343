//! Error types for configuration validation and the immutability guard.

use serde::Serialize;
use thiserror::Error;

/// A single broken configuration rule.
///
/// Every variant names the offending field path (for example
/// `lifecycle_rules[1].id`) so operators can fix all problems in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Violation {
    #[error("name: bucket name '{name}' does not match pattern {pattern}")]
    InvalidBucketName { name: String, pattern: &'static str },

    #[error("environment: '{value}' is not one of dev, staging, prod, test")]
    UnknownEnvironment { value: String },

    #[error("partition: '{value}' is not one of aws, aws-cn, aws-us-gov")]
    UnknownPartition { value: String },

    #[error("kms_key_id: missing encryption key reference; server-side encryption is mandatory")]
    MissingEncryptionKey,

    #[error("kms_key_id: '{value}' is not a KMS key ARN, alias ARN or key id")]
    InvalidEncryptionKey { value: String },

    #[error("kms_key_id: key is in partition '{key_partition}' but the bucket is in '{partition}'")]
    EncryptionKeyPartitionMismatch {
        key_partition: String,
        partition: String,
    },

    #[error("object_lock: object lock is enabled but no object lock settings were supplied")]
    MissingObjectLockConfig,

    #[error("object_lock.mode: '{value}' is not one of GOVERNANCE, COMPLIANCE")]
    UnknownObjectLockMode { value: String },

    #[error("object_lock.retention_days: must be greater than zero, got {days}")]
    NonPositiveRetentionDays { days: i64 },

    #[error("object_lock.retention_days: {days} exceeds the maximum of {max} days")]
    RetentionDaysTooLong { days: i64, max: i64 },

    #[error("object_lock: settings supplied while object_lock_enabled is false")]
    ObjectLockConfigIgnored,

    #[error("{field}: trusted principal identifier must not be blank")]
    BlankTrustedPrincipal { field: String },

    #[error("trusted_principal_actions: explicit action list must not be empty")]
    EmptyTrustedActions,

    #[error("{field}: lifecycle rule id must not be blank")]
    BlankLifecycleRuleId { field: String },

    #[error("{field}: duplicate lifecycle rule id '{id}'")]
    DuplicateLifecycleRuleId { field: String, id: String },

    #[error("{field}: lifecycle rule defines no transition, expiration or cleanup action")]
    EmptyLifecycleRule { field: String },

    #[error("{field}: after_days {current} must be greater than the preceding transition's {previous}")]
    NonMonotonicTransition {
        field: String,
        previous: u32,
        current: u32,
    },

    #[error("{field}: '{value}' is not a recognized transition storage class")]
    UnknownStorageClass { field: String, value: String },

    #[error("{field}: must be greater than zero")]
    NonPositiveDays { field: String },

    #[error("{field}: expiration after {expiration} days must come after the last transition at {last_transition} days")]
    ExpirationBeforeTransition {
        field: String,
        expiration: u32,
        last_transition: u32,
    },

    #[error("{field}: statement must list at least one action")]
    EmptyStatementActions { field: String },

    #[error("{field}: statement must list at least one resource")]
    EmptyStatementResources { field: String },

    #[error("{field}: bucket policy statements require a principal")]
    MissingStatementPrincipal { field: String },

    #[error("{field}: a principal of type * must list exactly the identifier *")]
    WildcardPrincipalWithIdentifiers { field: String },

    #[error("{field}: must not be blank")]
    BlankField { field: String },

    #[error("{field}: condition {test} on {variable} is declared more than once")]
    DuplicateCondition {
        field: String,
        test: String,
        variable: String,
    },

    #[error("{field}: sid '{sid}' is reserved for a baseline statement")]
    ReservedStatementSid { field: String, sid: String },

    #[error("{field}: sid '{sid}' is already used by another statement")]
    DuplicateStatementSid { field: String, sid: String },

    #[error("logging.target_bucket: '{value}' is not a valid bucket name")]
    InvalidLoggingTarget { value: String },

    #[error("{field}: CORS rule must allow at least one origin")]
    EmptyCorsOrigins { field: String },

    #[error("{field}: CORS rule must allow at least one method")]
    EmptyCorsMethods { field: String },

    #[error("{field}: '{value}' is not one of GET, PUT, POST, DELETE, HEAD")]
    UnknownCorsMethod { field: String, value: String },

    #[error("{field}: must not be negative, got {value}")]
    NegativeCorsMaxAge { field: String, value: i64 },
}

/// A configuration rejected by the validator.
///
/// Holds every violation found, in check order; the first entry is the
/// first rule the configuration broke.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid bucket configuration: {}", summarize(.violations))]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    /// Turn a list of collected violations into a result. An empty list means
    /// the configuration passed.
    pub(crate) fn check(violations: Vec<Violation>) -> Result<(), Self> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Self { violations })
        }
    }

    /// All violations, in the order the checks ran.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// The first violated rule.
    pub fn first(&self) -> Option<&Violation> {
        self.violations.first()
    }

    /// True if any violation matches the predicate.
    pub fn any(&self, predicate: impl Fn(&Violation) -> bool) -> bool {
        self.violations.iter().any(predicate)
    }
}

impl From<Violation> for ValidationError {
    fn from(violation: Violation) -> Self {
        Self {
            violations: vec![violation],
        }
    }
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Raised by the provisioning-side immutability guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImmutabilityError {
    #[error("bucket '{bucket}' was previously provisioned with object lock; object lock cannot be disabled")]
    ObjectLockDisabled { bucket: String },
}

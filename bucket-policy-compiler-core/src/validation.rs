//! Configuration validation
//!
//! Every check runs on every call and pushes what it finds into one list, so
//! a single pass reports all broken fields instead of the first one. Checks
//! run in a fixed order; [`ValidationError::first`] is therefore the first
//! rule the configuration violated.

use std::collections::HashSet;
use std::sync::LazyLock;

use log::warn;
use regex::Regex;

use crate::compiler::CompilerOptions;
use crate::errors::{ValidationError, Violation};
use crate::lifecycle::{LifecycleRule, StorageClass, Transition};
use crate::model::{
    BucketSecurityConfig, CorsRule, Environment, ObjectLockMode, Partition, CORS_METHODS,
};
use crate::policy::composer::effective_sid;
use crate::policy::{BaselineSid, PolicyStatement};

/// Bucket names: lowercase alphanumerics and hyphens, not hyphen-bounded.
pub const BUCKET_NAME_PATTERN: &str = r"^[a-z0-9][a-z0-9-]*[a-z0-9]$";

/// KMS key ARN, KMS alias ARN, or bare key id.
pub const KMS_KEY_PATTERN: &str = concat!(
    r"^(?:arn:aws(?:-cn|-us-gov)?:kms:[a-z]{2}(?:-[a-z]+)+-\d:\d{12}:",
    r"(?:key/(?:[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}|mrk-[0-9a-f]{32})",
    r"|alias/[A-Za-z0-9/_-]+)",
    r"|[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})$"
);

/// Longest default retention the provider accepts (100 years).
pub const MAX_RETENTION_DAYS: i64 = 36_500;

static BUCKET_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(BUCKET_NAME_PATTERN).expect("bucket name pattern is valid"));

static KMS_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(KMS_KEY_PATTERN).expect("KMS key pattern is valid"));

/// Validate a configuration with the default (permissive) options.
pub fn validate(config: &BucketSecurityConfig) -> Result<(), ValidationError> {
    validate_with(config, &CompilerOptions::default())
}

pub(crate) fn validate_with(
    config: &BucketSecurityConfig,
    options: &CompilerOptions,
) -> Result<(), ValidationError> {
    let mut violations = Vec::new();

    check_bucket_name(config, &mut violations);
    check_environment(config, &mut violations);
    check_partition(config, &mut violations);
    check_encryption_key(config, &mut violations);
    check_object_lock(config, options, &mut violations);
    check_trusted_principals(config, &mut violations);
    check_lifecycle_rules(&config.lifecycle_rules, &mut violations);
    check_custom_statements(&config.custom_statements, &mut violations);
    check_logging(config, &mut violations);
    check_cors_rules(&config.cors_rules, &mut violations);

    ValidationError::check(violations)
}

/// True if `name` is an acceptable bucket name.
pub fn is_valid_bucket_name(name: &str) -> bool {
    BUCKET_NAME_RE.is_match(name)
}

fn check_bucket_name(config: &BucketSecurityConfig, violations: &mut Vec<Violation>) {
    if !is_valid_bucket_name(&config.name) {
        violations.push(Violation::InvalidBucketName {
            name: config.name.clone(),
            pattern: BUCKET_NAME_PATTERN,
        });
    }
}

fn check_environment(config: &BucketSecurityConfig, violations: &mut Vec<Violation>) {
    if let Err(violation) = config.environment.parse::<Environment>() {
        violations.push(violation);
    }
}

fn check_partition(config: &BucketSecurityConfig, violations: &mut Vec<Violation>) {
    if let Err(violation) = config.partition.parse::<Partition>() {
        violations.push(violation);
    }
}

fn check_encryption_key(config: &BucketSecurityConfig, violations: &mut Vec<Violation>) {
    match config.encryption_key() {
        None => violations.push(Violation::MissingEncryptionKey),
        Some(key) if !KMS_KEY_RE.is_match(key) => {
            violations.push(Violation::InvalidEncryptionKey {
                value: key.to_string(),
            });
        }
        Some(key) => check_key_partition(config, key, violations),
    }
}

/// A key ARN must live in the bucket's partition. Bare key ids carry no
/// partition, and an unknown bucket partition is reported on its own.
fn check_key_partition(
    config: &BucketSecurityConfig,
    key: &str,
    violations: &mut Vec<Violation>,
) {
    if config.partition.parse::<Partition>().is_err() {
        return;
    }
    let key_partition = match key.strip_prefix("arn:").and_then(|rest| rest.split(':').next()) {
        Some(key_partition) => key_partition,
        None => return,
    };
    if key_partition != config.partition {
        violations.push(Violation::EncryptionKeyPartitionMismatch {
            key_partition: key_partition.to_string(),
            partition: config.partition.clone(),
        });
    }
}

fn check_object_lock(
    config: &BucketSecurityConfig,
    options: &CompilerOptions,
    violations: &mut Vec<Violation>,
) {
    match (config.object_lock_enabled, &config.object_lock) {
        (true, None) => violations.push(Violation::MissingObjectLockConfig),
        (true, Some(lock)) => {
            if let Err(violation) = lock.mode.parse::<ObjectLockMode>() {
                violations.push(violation);
            }
            if lock.retention_days <= 0 {
                violations.push(Violation::NonPositiveRetentionDays {
                    days: lock.retention_days,
                });
            } else if lock.retention_days > MAX_RETENTION_DAYS {
                violations.push(Violation::RetentionDaysTooLong {
                    days: lock.retention_days,
                    max: MAX_RETENTION_DAYS,
                });
            }
        }
        (false, Some(_)) if options.strict_object_lock => {
            violations.push(Violation::ObjectLockConfigIgnored);
        }
        (false, Some(_)) => {
            warn!(
                "Bucket {}: object lock settings supplied but object_lock_enabled is false; ignoring them",
                config.name
            );
        }
        (false, None) => {}
    }
}

fn check_trusted_principals(config: &BucketSecurityConfig, violations: &mut Vec<Violation>) {
    for (index, principal) in config.trusted_principals.iter().enumerate() {
        if principal.trim().is_empty() {
            violations.push(Violation::BlankTrustedPrincipal {
                field: format!("trusted_principals[{}]", index),
            });
        }
    }

    if let Some(actions) = &config.trusted_principal_actions {
        if actions.is_empty() {
            violations.push(Violation::EmptyTrustedActions);
        }
        check_blank_entries("trusted_principal_actions", actions, violations);
    }
}

fn check_lifecycle_rules(rules: &[LifecycleRule], violations: &mut Vec<Violation>) {
    let mut seen_ids = HashSet::new();

    for (index, rule) in rules.iter().enumerate() {
        let field = format!("lifecycle_rules[{}]", index);

        if rule.id.trim().is_empty() {
            violations.push(Violation::BlankLifecycleRuleId {
                field: format!("{}.id", field),
            });
        } else if !seen_ids.insert(rule.id.as_str()) {
            violations.push(Violation::DuplicateLifecycleRuleId {
                field: format!("{}.id", field),
                id: rule.id.clone(),
            });
        }

        if !rule.has_action() {
            violations.push(Violation::EmptyLifecycleRule {
                field: field.clone(),
            });
        }

        check_transitions(&format!("{}.transitions", field), &rule.transitions, violations);
        check_expiration(
            &format!("{}.expiration_after_days", field),
            rule.expiration_after_days,
            &rule.transitions,
            violations,
        );

        check_transitions(
            &format!("{}.noncurrent_transitions", field),
            &rule.noncurrent_transitions,
            violations,
        );
        check_expiration(
            &format!("{}.noncurrent_expiration_after_days", field),
            rule.noncurrent_expiration_after_days,
            &rule.noncurrent_transitions,
            violations,
        );

        if rule.abort_incomplete_multipart_upload_days == Some(0) {
            violations.push(Violation::NonPositiveDays {
                field: format!("{}.abort_incomplete_multipart_upload_days", field),
            });
        }
    }
}

/// Transitions must name a known storage class and be strictly increasing in
/// `after_days`.
fn check_transitions(field: &str, transitions: &[Transition], violations: &mut Vec<Violation>) {
    let mut previous: Option<u32> = None;

    for (index, transition) in transitions.iter().enumerate() {
        if transition.storage_class.parse::<StorageClass>().is_err() {
            violations.push(Violation::UnknownStorageClass {
                field: format!("{}[{}].storage_class", field, index),
                value: transition.storage_class.clone(),
            });
        }

        if let Some(previous) = previous {
            if transition.after_days <= previous {
                violations.push(Violation::NonMonotonicTransition {
                    field: format!("{}[{}].after_days", field, index),
                    previous,
                    current: transition.after_days,
                });
            }
        }
        previous = Some(transition.after_days);
    }
}

fn check_expiration(
    field: &str,
    expiration: Option<u32>,
    transitions: &[Transition],
    violations: &mut Vec<Violation>,
) {
    let Some(expiration) = expiration else {
        return;
    };

    if expiration == 0 {
        violations.push(Violation::NonPositiveDays {
            field: field.to_string(),
        });
    } else if let Some(last) = transitions.last() {
        if expiration <= last.after_days {
            violations.push(Violation::ExpirationBeforeTransition {
                field: field.to_string(),
                expiration,
                last_transition: last.after_days,
            });
        }
    }
}

fn check_custom_statements(statements: &[PolicyStatement], violations: &mut Vec<Violation>) {
    let mut seen_sids = HashSet::new();

    for (index, statement) in statements.iter().enumerate() {
        let field = format!("custom_statements[{}]", index);

        if statement.actions.is_empty() {
            violations.push(Violation::EmptyStatementActions {
                field: format!("{}.actions", field),
            });
        }
        check_blank_entries(&format!("{}.actions", field), &statement.actions, violations);

        if statement.resources.is_empty() {
            violations.push(Violation::EmptyStatementResources {
                field: format!("{}.resources", field),
            });
        }
        check_blank_entries(
            &format!("{}.resources", field),
            &statement.resources,
            violations,
        );

        if statement.principals.is_empty() {
            violations.push(Violation::MissingStatementPrincipal {
                field: format!("{}.principals", field),
            });
        }
        for (i, principal) in statement.principals.iter().enumerate() {
            let principal_field = format!("{}.principals[{}]", field, i);
            if principal.principal_type.trim().is_empty() {
                violations.push(Violation::BlankField {
                    field: format!("{}.type", principal_field),
                });
            }
            if principal.identifiers.is_empty() {
                violations.push(Violation::BlankField {
                    field: format!("{}.identifiers", principal_field),
                });
            } else if principal.principal_type == "*" && !principal.is_wildcard() {
                violations.push(Violation::WildcardPrincipalWithIdentifiers {
                    field: format!("{}.identifiers", principal_field),
                });
            }
            check_blank_entries(
                &format!("{}.identifiers", principal_field),
                &principal.identifiers,
                violations,
            );
        }

        let mut seen_conditions = HashSet::new();
        for (i, condition) in statement.conditions.iter().enumerate() {
            let condition_field = format!("{}.conditions[{}]", field, i);
            if condition.test.trim().is_empty() {
                violations.push(Violation::BlankField {
                    field: format!("{}.test", condition_field),
                });
            }
            if condition.variable.trim().is_empty() {
                violations.push(Violation::BlankField {
                    field: format!("{}.variable", condition_field),
                });
            }
            if condition.values.is_empty() {
                violations.push(Violation::BlankField {
                    field: format!("{}.values", condition_field),
                });
            }
            if !seen_conditions.insert((condition.test.as_str(), condition.variable.as_str())) {
                violations.push(Violation::DuplicateCondition {
                    field: condition_field,
                    test: condition.test.clone(),
                    variable: condition.variable.clone(),
                });
            }
        }

        let sid = effective_sid(index, statement);
        if statement.sid.is_some() && BaselineSid::is_reserved(&sid) {
            violations.push(Violation::ReservedStatementSid {
                field: format!("{}.sid", field),
                sid: sid.into_owned(),
            });
        } else if !seen_sids.insert(sid.clone()) {
            violations.push(Violation::DuplicateStatementSid {
                field: format!("{}.sid", field),
                sid: sid.into_owned(),
            });
        }
    }
}

fn check_logging(config: &BucketSecurityConfig, violations: &mut Vec<Violation>) {
    if let Some(logging) = &config.logging {
        if !is_valid_bucket_name(&logging.target_bucket) {
            violations.push(Violation::InvalidLoggingTarget {
                value: logging.target_bucket.clone(),
            });
        }
    }
}

fn check_cors_rules(rules: &[CorsRule], violations: &mut Vec<Violation>) {
    for (index, rule) in rules.iter().enumerate() {
        let field = format!("cors_rules[{}]", index);

        if rule.allowed_origins.is_empty() {
            violations.push(Violation::EmptyCorsOrigins {
                field: format!("{}.allowed_origins", field),
            });
        }
        check_blank_entries(
            &format!("{}.allowed_origins", field),
            &rule.allowed_origins,
            violations,
        );

        if rule.allowed_methods.is_empty() {
            violations.push(Violation::EmptyCorsMethods {
                field: format!("{}.allowed_methods", field),
            });
        }
        for (i, method) in rule.allowed_methods.iter().enumerate() {
            if !CORS_METHODS.contains(&method.as_str()) {
                violations.push(Violation::UnknownCorsMethod {
                    field: format!("{}.allowed_methods[{}]", field, i),
                    value: method.clone(),
                });
            }
        }

        if let Some(max_age) = rule.max_age_seconds {
            if max_age < 0 {
                violations.push(Violation::NegativeCorsMaxAge {
                    field: format!("{}.max_age_seconds", field),
                    value: max_age,
                });
            }
        }
    }
}

fn check_blank_entries(field: &str, entries: &[String], violations: &mut Vec<Violation>) {
    for (index, entry) in entries.iter().enumerate() {
        if entry.trim().is_empty() {
            violations.push(Violation::BlankField {
                field: format!("{}[{}]", field, index),
            });
        }
    }
}

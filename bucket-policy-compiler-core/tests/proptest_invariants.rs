//! Property-based tests for compile determinism and the baseline statements.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use bucket_policy_compiler_core::policy::BaselineSid;
use bucket_policy_compiler_core::{
    compile, BucketSecurityConfig, Effect, LifecycleRule, ObjectLockConfig, PolicyStatement,
    Principal,
};
use proptest::prelude::*;

const KEY: &str = "arn:aws:kms:us-east-1:111122223333:key/1234abcd-12ab-34cd-56ef-1234567890ab";

fn bucket_name_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9-]{0,20}[a-z0-9]"
}

fn principals_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        "[0-9]{12}".prop_map(|account| format!("arn:aws:iam::{}:role/app", account)),
        0..4,
    )
}

fn custom_statement_strategy() -> impl Strategy<Value = PolicyStatement> {
    (any::<bool>(), "s3:[A-Z][a-zA-Z]{2,12}").prop_map(|(allow, action)| {
        let statement = if allow {
            PolicyStatement::allow(vec![action], vec!["arn:aws:s3:::data/*".to_string()])
        } else {
            PolicyStatement::deny(vec![action], vec!["arn:aws:s3:::data/*".to_string()])
        };
        statement.with_principal(Principal::aws(vec!["111122223333".to_string()]))
    })
}

fn lifecycle_strategy() -> impl Strategy<Value = Vec<LifecycleRule>> {
    prop::collection::vec(1u32..400, 0..4).prop_map(|days| {
        days.into_iter()
            .enumerate()
            .map(|(i, d)| LifecycleRule::new(format!("rule-{}", i)).with_expiration(d))
            .collect()
    })
}

fn config_strategy() -> impl Strategy<Value = BucketSecurityConfig> {
    (
        bucket_name_strategy(),
        prop_oneof![Just("dev"), Just("staging"), Just("prod"), Just("test")],
        principals_strategy(),
        prop::collection::vec(custom_statement_strategy(), 0..5),
        lifecycle_strategy(),
        any::<bool>(),
        prop_oneof![Just("GOVERNANCE"), Just("COMPLIANCE")],
        1i64..3650,
    )
        .prop_map(
            |(name, env, principals, statements, rules, lock_enabled, mode, days)| {
                let mut config =
                    BucketSecurityConfig::new(name, env, KEY).with_trusted_principals(principals);
                config.custom_statements = statements;
                config.lifecycle_rules = rules;
                config.object_lock_enabled = lock_enabled;
                config.object_lock = Some(ObjectLockConfig {
                    mode: mode.to_string(),
                    retention_days: days,
                });
                config
            },
        )
}

proptest! {
    #[test]
    fn compile_is_deterministic(config in config_strategy()) {
        let first = compile(&config).unwrap().to_json().unwrap();
        let second = compile(&config).unwrap().to_json().unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn baseline_denies_appear_exactly_once(config in config_strategy()) {
        let artifact = compile(&config).unwrap();
        for sid in [
            BaselineSid::DenyInsecureTransport,
            BaselineSid::DenyUnencryptedObjectUploads,
            BaselineSid::DenyIncorrectEncryptionKey,
        ] {
            prop_assert_eq!(
                artifact.policy_document.statements_with_sid(sid.as_str()).count(),
                1
            );
        }
    }

    #[test]
    fn no_trusted_allow_without_principals(config in config_strategy()) {
        let artifact = compile(&config).unwrap();
        let allow_count = artifact
            .policy_document
            .statements_with_sid(BaselineSid::AllowTrustedPrincipals.as_str())
            .count();
        prop_assert_eq!(allow_count, usize::from(!config.trusted_principals.is_empty()));
        if config.trusted_principals.is_empty() {
            prop_assert!(artifact
                .policy_document
                .statements
                .iter()
                .take(3)
                .all(|s| s.effect == Effect::Deny));
        }
    }

    #[test]
    fn object_lock_present_iff_enabled(config in config_strategy()) {
        let artifact = compile(&config).unwrap();
        prop_assert_eq!(artifact.object_lock.is_some(), config.object_lock_enabled);
        let value = serde_json::to_value(&artifact).unwrap();
        prop_assert_eq!(
            value.get("object_lock_configuration").is_some(),
            config.object_lock_enabled
        );
    }

    #[test]
    fn non_positive_retention_is_rejected(days in -1000i64..=0) {
        let config = BucketSecurityConfig::new("vault", "prod", KEY)
            .with_object_lock("GOVERNANCE", days);
        prop_assert!(compile(&config).is_err());
    }
}

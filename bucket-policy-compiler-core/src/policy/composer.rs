//! Statement composition
//!
//! The policy document is a fold over a fixed pipeline of statement rules.
//! Each rule is a plain function of the configuration; the pipeline order is
//! the document order. The three baseline deny rules have no configuration
//! input that can suppress them.

use std::borrow::Cow;

use log::{debug, trace};

use super::{Condition, PolicyStatement, Principal};
use crate::model::BucketSecurityConfig;

/// Actions granted to trusted principals when the configuration does not
/// list its own.
pub const DEFAULT_TRUSTED_ACTIONS: [&str; 10] = [
    "s3:GetObject",
    "s3:GetObjectVersion",
    "s3:PutObject",
    "s3:DeleteObject",
    "s3:DeleteObjectVersion",
    "s3:ListBucket",
    "s3:ListBucketVersions",
    "s3:GetBucketLocation",
    "s3:AbortMultipartUpload",
    "s3:ListMultipartUploadParts",
];

const SECURE_TRANSPORT_KEY: &str = "aws:SecureTransport";
const SSE_HEADER_KEY: &str = "s3:x-amz-server-side-encryption";
const SSE_KMS_KEY_ID_KEY: &str = "s3:x-amz-server-side-encryption-aws-kms-key-id";
const SSE_KMS_MARKER: &str = "aws:kms";

/// Statement ids owned by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaselineSid {
    DenyInsecureTransport,
    AllowTrustedPrincipals,
    DenyUnencryptedObjectUploads,
    DenyIncorrectEncryptionKey,
}

impl BaselineSid {
    pub const ALL: [Self; 4] = [
        Self::DenyInsecureTransport,
        Self::AllowTrustedPrincipals,
        Self::DenyUnencryptedObjectUploads,
        Self::DenyIncorrectEncryptionKey,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DenyInsecureTransport => "DenyInsecureTransport",
            Self::AllowTrustedPrincipals => "AllowTrustedPrincipals",
            Self::DenyUnencryptedObjectUploads => "DenyUnencryptedObjectUploads",
            Self::DenyIncorrectEncryptionKey => "DenyIncorrectEncryptionKey",
        }
    }

    /// True if `sid` belongs to a compiler-owned statement.
    pub fn is_reserved(sid: &str) -> bool {
        Self::ALL.iter().any(|baseline| baseline.as_str() == sid)
    }
}

/// The sid a custom statement ends up with: its own, or
/// `CustomStatement{index}` when it has none.
pub(crate) fn effective_sid(index: usize, statement: &PolicyStatement) -> Cow<'_, str> {
    match &statement.sid {
        Some(sid) => Cow::Borrowed(sid.as_str()),
        None => Cow::Owned(format!("CustomStatement{}", index)),
    }
}

struct StatementContext<'a> {
    config: &'a BucketSecurityConfig,
    bucket_arn: String,
    objects_arn: String,
}

impl StatementContext<'_> {
    fn bucket_and_objects(&self) -> Vec<String> {
        vec![self.bucket_arn.clone(), self.objects_arn.clone()]
    }
}

type StatementRule = fn(&StatementContext<'_>) -> Vec<PolicyStatement>;

const STATEMENT_PIPELINE: [StatementRule; 5] = [
    deny_insecure_transport,
    allow_trusted_principals,
    deny_unencrypted_uploads,
    deny_incorrect_encryption_key,
    custom_statements,
];

/// Compose the ordered statement list for a validated configuration.
pub fn compose(config: &BucketSecurityConfig) -> Vec<PolicyStatement> {
    let context = StatementContext {
        config,
        bucket_arn: config.bucket_arn(),
        objects_arn: config.objects_arn(),
    };

    let statements: Vec<PolicyStatement> = STATEMENT_PIPELINE
        .iter()
        .flat_map(|rule| rule(&context))
        .collect();

    debug!(
        "Composed {} statements for bucket {} ({} custom)",
        statements.len(),
        config.name,
        config.custom_statements.len()
    );
    statements
}

fn deny_insecure_transport(context: &StatementContext<'_>) -> Vec<PolicyStatement> {
    vec![PolicyStatement::deny(vec!["s3:*".to_string()], context.bucket_and_objects())
        .with_sid(BaselineSid::DenyInsecureTransport.as_str())
        .with_principal(Principal::wildcard())
        .with_condition(Condition::new(
            "Bool",
            SECURE_TRANSPORT_KEY,
            vec!["false".to_string()],
        ))]
}

fn allow_trusted_principals(context: &StatementContext<'_>) -> Vec<PolicyStatement> {
    let config = context.config;
    if config.trusted_principals.is_empty() {
        trace!("No trusted principals for {}, skipping allow statement", config.name);
        return Vec::new();
    }

    let actions = match &config.trusted_principal_actions {
        Some(actions) => actions.clone(),
        None => DEFAULT_TRUSTED_ACTIONS
            .iter()
            .map(ToString::to_string)
            .collect(),
    };

    vec![PolicyStatement::allow(actions, context.bucket_and_objects())
        .with_sid(BaselineSid::AllowTrustedPrincipals.as_str())
        .with_principal(Principal::aws(config.trusted_principals.clone()))]
}

fn deny_unencrypted_uploads(context: &StatementContext<'_>) -> Vec<PolicyStatement> {
    vec![PolicyStatement::deny(
        vec!["s3:PutObject".to_string()],
        vec![context.objects_arn.clone()],
    )
    .with_sid(BaselineSid::DenyUnencryptedObjectUploads.as_str())
    .with_principal(Principal::wildcard())
    .with_condition(Condition::new(
        "StringNotEquals",
        SSE_HEADER_KEY,
        vec![SSE_KMS_MARKER.to_string()],
    ))]
}

// IfExists: uploads that omit the key header are already caught by the
// unencrypted-upload statement.
fn deny_incorrect_encryption_key(context: &StatementContext<'_>) -> Vec<PolicyStatement> {
    let key = context.config.encryption_key().unwrap_or_default();
    vec![PolicyStatement::deny(
        vec!["s3:PutObject".to_string()],
        vec![context.objects_arn.clone()],
    )
    .with_sid(BaselineSid::DenyIncorrectEncryptionKey.as_str())
    .with_principal(Principal::wildcard())
    .with_condition(Condition::new(
        "StringNotEqualsIfExists",
        SSE_KMS_KEY_ID_KEY,
        vec![key.to_string()],
    ))]
}

fn custom_statements(context: &StatementContext<'_>) -> Vec<PolicyStatement> {
    context
        .config
        .custom_statements
        .iter()
        .enumerate()
        .map(|(index, statement)| PolicyStatement {
            sid: Some(effective_sid(index, statement).into_owned()),
            ..statement.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Effect;

    const KEY: &str = "arn:aws:kms:us-east-1:111122223333:key/1234abcd-12ab-34cd-56ef-1234567890ab";

    fn base_config() -> BucketSecurityConfig {
        BucketSecurityConfig::new("my-data-bucket", "prod", KEY)
    }

    fn sids(statements: &[PolicyStatement]) -> Vec<&str> {
        statements
            .iter()
            .map(|s| s.sid.as_deref().unwrap_or(""))
            .collect()
    }

    #[test]
    fn test_baseline_only_without_principals() {
        let statements = compose(&base_config());
        assert_eq!(
            sids(&statements),
            vec![
                "DenyInsecureTransport",
                "DenyUnencryptedObjectUploads",
                "DenyIncorrectEncryptionKey"
            ]
        );
    }

    #[test]
    fn test_insecure_transport_covers_bucket_and_objects() {
        let statements = compose(&base_config());
        let transport = &statements[0];
        assert_eq!(transport.effect, Effect::Deny);
        assert_eq!(transport.actions, vec!["s3:*"]);
        assert_eq!(
            transport.resources,
            vec!["arn:aws:s3:::my-data-bucket", "arn:aws:s3:::my-data-bucket/*"]
        );
        assert_eq!(
            transport.conditions,
            vec![Condition::new("Bool", "aws:SecureTransport", vec!["false".to_string()])]
        );
    }

    #[test]
    fn test_trusted_principals_use_default_actions() {
        let config = base_config().with_trusted_principals(vec!["role/A".to_string()]);
        let statements = compose(&config);

        assert_eq!(statements.len(), 4);
        let allow = &statements[1];
        assert_eq!(allow.sid.as_deref(), Some("AllowTrustedPrincipals"));
        assert_eq!(allow.effect, Effect::Allow);
        assert_eq!(allow.actions, DEFAULT_TRUSTED_ACTIONS.to_vec());
        assert_eq!(allow.principals, vec![Principal::aws(vec!["role/A".to_string()])]);
    }

    #[test]
    fn test_trusted_principals_with_explicit_actions() {
        let mut config = base_config().with_trusted_principals(vec!["role/A".to_string()]);
        config.trusted_principal_actions = Some(vec!["s3:GetObject".to_string()]);

        let statements = compose(&config);
        assert_eq!(statements[1].actions, vec!["s3:GetObject"]);
    }

    #[test]
    fn test_wrong_key_statement_uses_if_exists() {
        let statements = compose(&base_config());
        let wrong_key = &statements[2];
        assert_eq!(wrong_key.resources, vec!["arn:aws:s3:::my-data-bucket/*"]);
        assert_eq!(wrong_key.conditions[0].test, "StringNotEqualsIfExists");
        assert_eq!(wrong_key.conditions[0].values, vec![KEY]);

        let missing_header = &statements[1];
        assert_eq!(missing_header.conditions[0].test, "StringNotEquals");
        assert_eq!(missing_header.conditions[0].values, vec!["aws:kms"]);
    }

    #[test]
    fn test_custom_statements_appended_in_order_with_default_sid() {
        let first = PolicyStatement::deny(
            vec!["s3:DeleteBucket".to_string()],
            vec!["arn:aws:s3:::my-data-bucket".to_string()],
        )
        .with_principal(Principal::wildcard());
        let second = PolicyStatement::allow(
            vec!["s3:GetObject".to_string()],
            vec!["arn:aws:s3:::my-data-bucket/*".to_string()],
        )
        .with_sid("ReadOnly")
        .with_principal(Principal::aws(vec!["role/B".to_string()]));

        let config = base_config()
            .with_custom_statement(first.clone())
            .with_custom_statement(second.clone());
        let statements = compose(&config);

        assert_eq!(statements.len(), 5);
        assert_eq!(statements[3].sid.as_deref(), Some("CustomStatement0"));
        assert_eq!(statements[3].actions, first.actions);
        assert_eq!(statements[4], second);
        // caller's statement is untouched
        assert_eq!(config.custom_statements[0].sid, None);
    }

    #[test]
    fn test_reserved_sids() {
        assert!(BaselineSid::is_reserved("DenyInsecureTransport"));
        assert!(!BaselineSid::is_reserved("CustomStatement0"));
    }
}

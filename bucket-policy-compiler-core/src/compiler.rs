//! Top-level compiler
//!
//! Runs the validator, then the statement composer and the lifecycle compiler,
//! and bundles their output into a [`CompiledArtifact`]. Compilation is
//! all-or-nothing: a validation failure returns the error untouched and no
//! artifact is produced.

use log::debug;
use serde::ser::Serializer;
use serde::Serialize;

use crate::errors::ValidationError;
use crate::lifecycle::{self, LifecycleConfiguration, LifecycleRule};
use crate::model::{
    BucketSecurityConfig, CorsRule, LoggingConfig, ObjectLockMode, ObjectLockSettings,
};
use crate::policy::{composer, PolicyDocument};
use crate::validation::validate_with;

/// Knobs that change how strictly a configuration is judged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Reject object lock settings supplied while object lock is disabled,
    /// instead of ignoring them with a warning.
    pub strict_object_lock: bool,
}

/// Bucket compiler
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompilerOptions,
}

impl Compiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile a configuration into its artifact bundle.
    pub fn compile(
        &self,
        config: &BucketSecurityConfig,
    ) -> Result<CompiledArtifact, ValidationError> {
        validate_with(config, &self.options)?;

        let policy_document = PolicyDocument::new(composer::compose(config));
        let lifecycle_rule_set = lifecycle::compile(&config.lifecycle_rules);

        let object_lock = if config.object_lock_enabled {
            config
                .object_lock
                .as_ref()
                .map(ObjectLockSettings::try_from)
                .transpose()?
        } else {
            None
        };

        debug!(
            "Compiled bucket {}: {} statements, {} lifecycle rules, object lock {}",
            config.name,
            policy_document.statements.len(),
            lifecycle_rule_set.len(),
            object_lock.map_or("disabled", |lock| lock.mode.as_str())
        );

        Ok(CompiledArtifact {
            bucket: config.name.clone(),
            baseline: BucketBaseline::new(config.encryption_key().unwrap_or_default()),
            policy_document,
            lifecycle_rule_set,
            object_lock,
            logging: config.logging.clone(),
            cors_rules: config.cors_rules.clone(),
        })
    }
}

/// Compile with default options.
pub fn compile(config: &BucketSecurityConfig) -> Result<CompiledArtifact, ValidationError> {
    Compiler::new().compile(config)
}

/// Public access block flags. Always fully on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublicAccessBlock {
    pub block_public_acls: bool,
    pub ignore_public_acls: bool,
    pub block_public_policy: bool,
    pub restrict_public_buckets: bool,
}

/// Bucket settings the provisioning layer must apply regardless of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketBaseline {
    pub public_access_block: PublicAccessBlock,
    pub versioning_enabled: bool,
    pub kms_key_id: String,
    pub bucket_key_enabled: bool,
}

impl BucketBaseline {
    fn new(kms_key_id: &str) -> Self {
        Self {
            public_access_block: PublicAccessBlock {
                block_public_acls: true,
                ignore_public_acls: true,
                block_public_policy: true,
                restrict_public_buckets: true,
            },
            versioning_enabled: true,
            kms_key_id: kms_key_id.to_string(),
            bucket_key_enabled: true,
        }
    }
}

/// Everything one compile produces for the provisioning layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    pub bucket: String,
    pub baseline: BucketBaseline,
    pub policy_document: PolicyDocument,
    /// Empty means no lifecycle configuration is attached.
    pub lifecycle_rule_set: Vec<LifecycleRule>,
    /// Present iff object lock was requested.
    pub object_lock: Option<ObjectLockSettings>,
    pub logging: Option<LoggingConfig>,
    pub cors_rules: Vec<CorsRule>,
}

impl CompiledArtifact {
    pub fn lifecycle_configuration(&self) -> Option<LifecycleConfiguration<'_>> {
        LifecycleConfiguration::from_rules(&self.lifecycle_rule_set)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for CompiledArtifact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ArtifactJson {
            bucket: &self.bucket,
            baseline: BaselineJson::from(&self.baseline),
            policy_document: &self.policy_document,
            lifecycle_configuration: self.lifecycle_configuration(),
            object_lock_configuration: self.object_lock.map(ObjectLockJson::from),
            logging: self.logging.as_ref().map(|logging| LoggingJson {
                target_bucket: &logging.target_bucket,
                target_prefix: logging.target_prefix.as_deref().unwrap_or_default(),
            }),
            cors_configuration: if self.cors_rules.is_empty() {
                None
            } else {
                Some(CorsJson {
                    cors_rules: self.cors_rules.iter().map(CorsRuleJson::from).collect(),
                })
            },
        }
        .serialize(serializer)
    }
}

#[derive(Serialize)]
struct ArtifactJson<'a> {
    bucket: &'a str,
    baseline: BaselineJson<'a>,
    policy_document: &'a PolicyDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    lifecycle_configuration: Option<LifecycleConfiguration<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    object_lock_configuration: Option<ObjectLockJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logging: Option<LoggingJson<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cors_configuration: Option<CorsJson<'a>>,
}

#[derive(Serialize)]
struct BaselineJson<'a> {
    public_access_block: PublicAccessBlock,
    versioning: StatusJson,
    server_side_encryption: EncryptionJson<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StatusJson {
    status: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EncryptionJson<'a> {
    rules: [EncryptionRuleJson<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EncryptionRuleJson<'a> {
    apply_server_side_encryption_by_default: EncryptionDefaultJson<'a>,
    bucket_key_enabled: bool,
}

#[derive(Serialize)]
struct EncryptionDefaultJson<'a> {
    #[serde(rename = "SSEAlgorithm")]
    sse_algorithm: &'static str,
    #[serde(rename = "KMSMasterKeyID")]
    kms_master_key_id: &'a str,
}

impl<'a> From<&'a BucketBaseline> for BaselineJson<'a> {
    fn from(baseline: &'a BucketBaseline) -> Self {
        Self {
            public_access_block: baseline.public_access_block,
            versioning: StatusJson {
                status: if baseline.versioning_enabled {
                    "Enabled"
                } else {
                    "Suspended"
                },
            },
            server_side_encryption: EncryptionJson {
                rules: [EncryptionRuleJson {
                    apply_server_side_encryption_by_default: EncryptionDefaultJson {
                        sse_algorithm: "aws:kms",
                        kms_master_key_id: &baseline.kms_key_id,
                    },
                    bucket_key_enabled: baseline.bucket_key_enabled,
                }],
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectLockJson {
    object_lock_enabled: &'static str,
    rule: ObjectLockRuleJson,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectLockRuleJson {
    default_retention: DefaultRetentionJson,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DefaultRetentionJson {
    mode: ObjectLockMode,
    days: u32,
}

impl From<ObjectLockSettings> for ObjectLockJson {
    fn from(settings: ObjectLockSettings) -> Self {
        Self {
            object_lock_enabled: "Enabled",
            rule: ObjectLockRuleJson {
                default_retention: DefaultRetentionJson {
                    mode: settings.mode,
                    days: settings.retention_days,
                },
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct LoggingJson<'a> {
    target_bucket: &'a str,
    target_prefix: &'a str,
}

#[derive(Serialize)]
struct CorsJson<'a> {
    #[serde(rename = "CORSRules")]
    cors_rules: Vec<CorsRuleJson<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CorsRuleJson<'a> {
    allowed_origins: &'a [String],
    allowed_methods: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    allowed_headers: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    expose_headers: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_age_seconds: Option<i64>,
}

impl<'a> From<&'a CorsRule> for CorsRuleJson<'a> {
    fn from(rule: &'a CorsRule) -> Self {
        Self {
            allowed_origins: &rule.allowed_origins,
            allowed_methods: &rule.allowed_methods,
            allowed_headers: &rule.allowed_headers,
            expose_headers: &rule.expose_headers,
            max_age_seconds: rule.max_age_seconds,
        }
    }
}

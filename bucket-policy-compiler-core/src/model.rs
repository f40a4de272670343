//! Input configuration model
//!
//! This module holds the declarative description of a bucket's desired
//! security posture. Values are deserialized as-is from the configuration
//! layer; closed sets such as the environment or the object lock mode stay raw
//! strings here so the validator can report unrecognized values instead of the
//! deserializer failing on the first one.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::Violation;
use crate::lifecycle::LifecycleRule;
use crate::policy::PolicyStatement;

/// Declarative security configuration for one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
#[schemars(description = "Desired security posture of a single storage bucket.")]
pub struct BucketSecurityConfig {
    #[schemars(description = "Bucket name; lowercase letters, digits and hyphens")]
    pub name: String,

    #[schemars(description = "One of dev, staging, prod, test")]
    pub environment: String,

    #[serde(default = "default_partition")]
    #[schemars(description = "ARN partition; defaults to aws")]
    pub partition: String,

    #[serde(default)]
    #[schemars(description = "KMS key ARN, alias ARN or key id used for server-side encryption")]
    pub kms_key_id: Option<String>,

    #[serde(default)]
    pub logging: Option<LoggingConfig>,

    #[serde(default)]
    pub object_lock_enabled: bool,

    #[serde(default)]
    pub object_lock: Option<ObjectLockConfig>,

    #[serde(default)]
    #[schemars(description = "Principal ARNs granted access through an Allow statement")]
    pub trusted_principals: Vec<String>,

    #[serde(default)]
    #[schemars(description = "Actions granted to trusted principals; a default set applies when omitted")]
    pub trusted_principal_actions: Option<Vec<String>>,

    #[serde(default)]
    pub lifecycle_rules: Vec<LifecycleRule>,

    #[serde(default)]
    pub custom_statements: Vec<PolicyStatement>,

    #[serde(default)]
    pub cors_rules: Vec<CorsRule>,

    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

fn default_partition() -> String {
    Partition::Aws.as_str().to_string()
}

impl BucketSecurityConfig {
    /// Create a configuration with the mandatory fields set and everything
    /// else empty.
    pub fn new(
        name: impl Into<String>,
        environment: impl Into<String>,
        kms_key_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            environment: environment.into(),
            partition: default_partition(),
            kms_key_id: Some(kms_key_id.into()),
            logging: None,
            object_lock_enabled: false,
            object_lock: None,
            trusted_principals: Vec::new(),
            trusted_principal_actions: None,
            lifecycle_rules: Vec::new(),
            custom_statements: Vec::new(),
            cors_rules: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_object_lock(mut self, mode: impl Into<String>, retention_days: i64) -> Self {
        self.object_lock_enabled = true;
        self.object_lock = Some(ObjectLockConfig {
            mode: mode.into(),
            retention_days,
        });
        self
    }

    #[must_use]
    pub fn with_trusted_principals(mut self, principals: Vec<String>) -> Self {
        self.trusted_principals = principals;
        self
    }

    #[must_use]
    pub fn with_lifecycle_rule(mut self, rule: LifecycleRule) -> Self {
        self.lifecycle_rules.push(rule);
        self
    }

    #[must_use]
    pub fn with_custom_statement(mut self, statement: PolicyStatement) -> Self {
        self.custom_statements.push(statement);
        self
    }

    /// `arn:<partition>:s3:::<name>`
    pub fn bucket_arn(&self) -> String {
        format!("arn:{}:s3:::{}", self.partition, self.name)
    }

    /// `arn:<partition>:s3:::<name>/*`
    pub fn objects_arn(&self) -> String {
        format!("{}/*", self.bucket_arn())
    }

    /// The key reference with surrounding whitespace removed, if any was
    /// supplied at all.
    pub fn encryption_key(&self) -> Option<&str> {
        self.kms_key_id
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Deployment environment tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
    Test,
}

impl Environment {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Staging => "staging",
            Self::Prod => "prod",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Violation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Self::Dev),
            "staging" => Ok(Self::Staging),
            "prod" => Ok(Self::Prod),
            "test" => Ok(Self::Test),
            other => Err(Violation::UnknownEnvironment {
                value: other.to_string(),
            }),
        }
    }
}

/// ARN partition the bucket lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Aws,
    AwsCn,
    AwsUsGov,
}

impl Partition {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::AwsCn => "aws-cn",
            Self::AwsUsGov => "aws-us-gov",
        }
    }
}

impl FromStr for Partition {
    type Err = Violation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aws" => Ok(Self::Aws),
            "aws-cn" => Ok(Self::AwsCn),
            "aws-us-gov" => Ok(Self::AwsUsGov),
            other => Err(Violation::UnknownPartition {
                value: other.to_string(),
            }),
        }
    }
}

/// Object lock retention mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ObjectLockMode {
    #[serde(rename = "GOVERNANCE")]
    Governance,
    #[serde(rename = "COMPLIANCE")]
    Compliance,
}

impl ObjectLockMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Governance => "GOVERNANCE",
            Self::Compliance => "COMPLIANCE",
        }
    }
}

impl fmt::Display for ObjectLockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectLockMode {
    type Err = Violation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GOVERNANCE" => Ok(Self::Governance),
            "COMPLIANCE" => Ok(Self::Compliance),
            other => Err(Violation::UnknownObjectLockMode {
                value: other.to_string(),
            }),
        }
    }
}

/// Object lock settings as supplied by the configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ObjectLockConfig {
    #[schemars(description = "GOVERNANCE or COMPLIANCE")]
    pub mode: String,
    #[schemars(description = "Default retention period in days; must be positive")]
    pub retention_days: i64,
}

/// Validated object lock settings carried by the compiled artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectLockSettings {
    pub mode: ObjectLockMode,
    pub retention_days: u32,
}

impl TryFrom<&ObjectLockConfig> for ObjectLockSettings {
    type Error = Violation;

    fn try_from(config: &ObjectLockConfig) -> Result<Self, Self::Error> {
        let mode = config.mode.parse()?;
        let retention_days = u32::try_from(config.retention_days)
            .ok()
            .filter(|days| *days > 0)
            .ok_or(Violation::NonPositiveRetentionDays {
                days: config.retention_days,
            })?;
        Ok(Self {
            mode,
            retention_days,
        })
    }
}

/// Server access logging destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub target_bucket: String,
    #[serde(default)]
    pub target_prefix: Option<String>,
}

/// One cross-origin resource sharing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CorsRule {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    #[serde(default)]
    pub allowed_headers: Vec<String>,
    #[serde(default)]
    pub expose_headers: Vec<String>,
    #[serde(default)]
    pub max_age_seconds: Option<i64>,
}

/// HTTP methods a CORS rule may allow.
pub const CORS_METHODS: [&str; 5] = ["GET", "PUT", "POST", "DELETE", "HEAD"];

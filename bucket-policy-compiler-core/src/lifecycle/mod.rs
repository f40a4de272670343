//! Lifecycle rule compilation
//!
//! Lifecycle rules pass through compilation unchanged once validated. An
//! empty rule list compiles to an empty rule set, which tells the
//! provisioning side not to attach a lifecycle configuration at all.

use std::fmt;
use std::str::FromStr;

use log::debug;
use schemars::JsonSchema;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// A time-based transition to another storage class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Transition {
    pub after_days: u32,
    pub storage_class: String,
}

impl Transition {
    #[must_use]
    pub fn new(after_days: u32, storage_class: impl Into<String>) -> Self {
        Self {
            after_days,
            storage_class: storage_class.into(),
        }
    }
}

/// One lifecycle rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LifecycleRule {
    pub id: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    #[schemars(description = "Object key prefix the rule applies to; whole bucket when omitted")]
    pub prefix: Option<String>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub expiration_after_days: Option<u32>,
    #[serde(default)]
    pub noncurrent_transitions: Vec<Transition>,
    #[serde(default)]
    pub noncurrent_expiration_after_days: Option<u32>,
    #[serde(default)]
    pub abort_incomplete_multipart_upload_days: Option<u32>,
}

fn enabled_by_default() -> bool {
    true
}

impl LifecycleRule {
    /// An enabled rule with no actions.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            prefix: None,
            transitions: Vec::new(),
            expiration_after_days: None,
            noncurrent_transitions: Vec::new(),
            noncurrent_expiration_after_days: None,
            abort_incomplete_multipart_upload_days: None,
        }
    }

    #[must_use]
    pub fn with_transition(mut self, after_days: u32, storage_class: &str) -> Self {
        self.transitions.push(Transition::new(after_days, storage_class));
        self
    }

    #[must_use]
    pub fn with_expiration(mut self, after_days: u32) -> Self {
        self.expiration_after_days = Some(after_days);
        self
    }

    #[must_use]
    pub fn with_noncurrent_transition(mut self, after_days: u32, storage_class: &str) -> Self {
        self.noncurrent_transitions
            .push(Transition::new(after_days, storage_class));
        self
    }

    #[must_use]
    pub fn with_noncurrent_expiration(mut self, after_days: u32) -> Self {
        self.noncurrent_expiration_after_days = Some(after_days);
        self
    }

    /// True if the rule carries at least one action for the provider to run.
    pub fn has_action(&self) -> bool {
        !self.transitions.is_empty()
            || self.expiration_after_days.is_some()
            || !self.noncurrent_transitions.is_empty()
            || self.noncurrent_expiration_after_days.is_some()
            || self.abort_incomplete_multipart_upload_days.is_some()
    }
}

/// Storage classes a lifecycle transition may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    StandardIa,
    OnezoneIa,
    IntelligentTiering,
    GlacierIr,
    Glacier,
    DeepArchive,
}

impl StorageClass {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StandardIa => "STANDARD_IA",
            Self::OnezoneIa => "ONEZONE_IA",
            Self::IntelligentTiering => "INTELLIGENT_TIERING",
            Self::GlacierIr => "GLACIER_IR",
            Self::Glacier => "GLACIER",
            Self::DeepArchive => "DEEP_ARCHIVE",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a storage class name is not a transition target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStorageClass;

impl FromStr for StorageClass {
    type Err = UnknownStorageClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STANDARD_IA" => Ok(Self::StandardIa),
            "ONEZONE_IA" => Ok(Self::OnezoneIa),
            "INTELLIGENT_TIERING" => Ok(Self::IntelligentTiering),
            "GLACIER_IR" => Ok(Self::GlacierIr),
            "GLACIER" => Ok(Self::Glacier),
            "DEEP_ARCHIVE" => Ok(Self::DeepArchive),
            _ => Err(UnknownStorageClass),
        }
    }
}

/// Compile validated lifecycle rules into the rule set handed to the
/// provisioning layer.
pub fn compile(rules: &[LifecycleRule]) -> Vec<LifecycleRule> {
    if rules.is_empty() {
        debug!("No lifecycle rules configured; no lifecycle configuration will be attached");
    }
    rules.to_vec()
}

/// Lifecycle-policy JSON view over a compiled rule set
/// (`Rules[]` with `ID`, `Status`, `Filter`, `Transitions`, ...).
#[derive(Debug, Clone, Copy)]
pub struct LifecycleConfiguration<'a> {
    rules: &'a [LifecycleRule],
}

impl<'a> LifecycleConfiguration<'a> {
    /// `None` for an empty rule set.
    pub fn from_rules(rules: &'a [LifecycleRule]) -> Option<Self> {
        if rules.is_empty() {
            None
        } else {
            Some(Self { rules })
        }
    }
}

impl Serialize for LifecycleConfiguration<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RulesJson {
            rules: self.rules.iter().map(RuleJson::from).collect(),
        }
        .serialize(serializer)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RulesJson<'a> {
    rules: Vec<RuleJson<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RuleJson<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    status: &'static str,
    filter: FilterJson<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    transitions: Vec<TransitionJson<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration: Option<DaysJson>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    noncurrent_version_transitions: Vec<NoncurrentTransitionJson<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    noncurrent_version_expiration: Option<NoncurrentDaysJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    abort_incomplete_multipart_upload: Option<AbortJson>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FilterJson<'a> {
    prefix: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TransitionJson<'a> {
    days: u32,
    storage_class: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NoncurrentTransitionJson<'a> {
    noncurrent_days: u32,
    storage_class: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DaysJson {
    days: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct NoncurrentDaysJson {
    noncurrent_days: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AbortJson {
    days_after_initiation: u32,
}

impl<'a> From<&'a LifecycleRule> for RuleJson<'a> {
    fn from(rule: &'a LifecycleRule) -> Self {
        Self {
            id: &rule.id,
            status: if rule.enabled { "Enabled" } else { "Disabled" },
            filter: FilterJson {
                prefix: rule.prefix.as_deref().unwrap_or_default(),
            },
            transitions: rule
                .transitions
                .iter()
                .map(|t| TransitionJson {
                    days: t.after_days,
                    storage_class: &t.storage_class,
                })
                .collect(),
            expiration: rule.expiration_after_days.map(|days| DaysJson { days }),
            noncurrent_version_transitions: rule
                .noncurrent_transitions
                .iter()
                .map(|t| NoncurrentTransitionJson {
                    noncurrent_days: t.after_days,
                    storage_class: &t.storage_class,
                })
                .collect(),
            noncurrent_version_expiration: rule
                .noncurrent_expiration_after_days
                .map(|noncurrent_days| NoncurrentDaysJson { noncurrent_days }),
            abort_incomplete_multipart_upload: rule
                .abort_incomplete_multipart_upload_days
                .map(|days_after_initiation| AbortJson {
                    days_after_initiation,
                }),
        }
    }
}

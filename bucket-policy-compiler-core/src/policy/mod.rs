//! Access-control policy types
//!
//! [`PolicyStatement`] is the configuration-facing shape of a statement
//! (`principals`, `actions`, `resources`, `conditions`), which is also how
//! custom statements are written in configuration files. [`PolicyDocument`]
//! renders an ordered list of statements into the standard statement-based
//! policy JSON (`Version`, `Statement[]` with `Sid`, `Effect`, `Principal`,
//! `Action`, `Resource`, `Condition`).

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

pub mod composer;

pub use composer::{compose, BaselineSid, DEFAULT_TRUSTED_ACTIONS};

/// Policy language version stamped on every document.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Statement effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Effect {
    Allow,
    Deny,
}

/// A principal block: a principal type and its identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Principal {
    #[serde(rename = "type")]
    #[schemars(description = "Principal type such as AWS, Service or *")]
    pub principal_type: String,
    pub identifiers: Vec<String>,
}

impl Principal {
    /// Anyone, rendered as `"Principal": "*"`.
    #[must_use]
    pub fn wildcard() -> Self {
        Self {
            principal_type: "*".to_string(),
            identifiers: vec!["*".to_string()],
        }
    }

    #[must_use]
    pub fn aws(identifiers: Vec<String>) -> Self {
        Self {
            principal_type: "AWS".to_string(),
            identifiers,
        }
    }

    /// True only for the anonymous principal: type `*` with the single
    /// identifier `*`.
    pub fn is_wildcard(&self) -> bool {
        self.principal_type == "*" && matches!(self.identifiers.as_slice(), [id] if id == "*")
    }
}

/// A condition: operator (`test`), context key (`variable`) and values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    pub test: String,
    pub variable: String,
    pub values: Vec<String>,
}

impl Condition {
    #[must_use]
    pub fn new(test: &str, variable: &str, values: Vec<String>) -> Self {
        Self {
            test: test.to_string(),
            variable: variable.to_string(),
            values,
        }
    }
}

/// One access-control statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PolicyStatement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    #[serde(default)]
    pub principals: Vec<Principal>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl PolicyStatement {
    #[must_use]
    pub fn new(effect: Effect, actions: Vec<String>, resources: Vec<String>) -> Self {
        Self {
            sid: None,
            effect,
            principals: Vec::new(),
            actions,
            resources,
            conditions: Vec::new(),
        }
    }

    #[must_use]
    pub fn allow(actions: Vec<String>, resources: Vec<String>) -> Self {
        Self::new(Effect::Allow, actions, resources)
    }

    #[must_use]
    pub fn deny(actions: Vec<String>, resources: Vec<String>) -> Self {
        Self::new(Effect::Deny, actions, resources)
    }

    #[must_use]
    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principals.push(principal);
        self
    }

    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// An ordered policy document.
///
/// Statement order is part of the output contract: two compilations of the
/// same configuration must serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDocument {
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    #[must_use]
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self { statements }
    }

    /// Statements whose sid matches `sid`.
    pub fn statements_with_sid<'a>(
        &'a self,
        sid: &'a str,
    ) -> impl Iterator<Item = &'a PolicyStatement> + 'a {
        self.statements
            .iter()
            .filter(move |statement| statement.sid.as_deref() == Some(sid))
    }
}

impl Serialize for PolicyDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        DocumentJson {
            version: POLICY_VERSION,
            statement: self.statements.iter().map(StatementJson::from).collect(),
        }
        .serialize(serializer)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DocumentJson<'a> {
    version: &'static str,
    statement: Vec<StatementJson<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StatementJson<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sid: Option<&'a str>,
    effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    principal: Option<PrincipalJson<'a>>,
    action: &'a [String],
    resource: &'a [String],
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    condition: BTreeMap<&'a str, BTreeMap<&'a str, Vec<&'a str>>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum PrincipalJson<'a> {
    Anyone(&'static str),
    ByType(BTreeMap<&'a str, Vec<&'a str>>),
}

impl<'a> From<&'a PolicyStatement> for StatementJson<'a> {
    fn from(statement: &'a PolicyStatement) -> Self {
        let principal = if statement.principals.is_empty() {
            None
        } else if statement.principals.iter().any(Principal::is_wildcard) {
            Some(PrincipalJson::Anyone("*"))
        } else {
            let mut by_type: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for principal in &statement.principals {
                by_type
                    .entry(principal.principal_type.as_str())
                    .or_default()
                    .extend(principal.identifiers.iter().map(String::as_str));
            }
            Some(PrincipalJson::ByType(by_type))
        };

        let mut condition: BTreeMap<&str, BTreeMap<&str, Vec<&str>>> = BTreeMap::new();
        for c in &statement.conditions {
            condition
                .entry(c.test.as_str())
                .or_default()
                .entry(c.variable.as_str())
                .or_default()
                .extend(c.values.iter().map(String::as_str));
        }

        Self {
            sid: statement.sid.as_deref(),
            effect: statement.effect,
            principal,
            action: &statement.actions,
            resource: &statement.resources,
            condition,
        }
    }
}

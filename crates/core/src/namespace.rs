// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! `project/branch` namespaced name grammar: each half matches
//! `[A-Za-z0-9_-]+`, non-empty; any other shape is rejected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

fn is_valid_component(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// A parsed, validated `project/branch` name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespacedName {
    project: String,
    branch: String,
}

impl NamespacedName {
    pub fn new(project: impl Into<String>, branch: impl Into<String>) -> Result<Self, EngineError> {
        let project = project.into();
        let branch = branch.into();
        if !is_valid_component(&project) || !is_valid_component(&branch) {
            return Err(EngineError::user_with_hint(
                format!("invalid namespaced name '{project}/{branch}'"),
                "names must match [A-Za-z0-9_-]+ and be non-empty",
            ));
        }
        Ok(Self { project, branch })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Deterministic dataset short name for this branch: `project-branch`.
    pub fn dataset_name(&self) -> String {
        format!("{}-{}", self.project, self.branch)
    }

    /// Deterministic container name for this branch: `<prefix>-project-branch`.
    pub fn container_name(&self, prefix: &str) -> String {
        format!("{}-{}-{}", prefix, self.project, self.branch)
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.branch)
    }
}

impl FromStr for NamespacedName {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(2, '/');
        let project = parts.next().unwrap_or("");
        let branch = match parts.next() {
            Some(b) => b,
            None => {
                return Err(EngineError::user_with_hint(
                    format!("'{s}' is not a namespaced name"),
                    "expected the form project/branch",
                ))
            }
        };
        Self::new(project, branch)
    }
}

impl Serialize for NamespacedName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NamespacedName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Is this a valid bare component (project name or branch name) on its own?
pub fn is_valid_name(s: &str) -> bool {
    is_valid_component(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_names() {
        let n: NamespacedName = "api/dev-1".parse().unwrap();
        assert_eq!(n.project(), "api");
        assert_eq!(n.branch(), "dev-1");
        assert_eq!(n.to_string(), "api/dev-1");
    }

    #[test]
    fn rejects_missing_slash() {
        assert!("api".parse::<NamespacedName>().is_err());
    }

    #[test]
    fn rejects_empty_components() {
        assert!("api/".parse::<NamespacedName>().is_err());
        assert!("/dev".parse::<NamespacedName>().is_err());
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!("api/dev.1".parse::<NamespacedName>().is_err());
        assert!("ap i/dev".parse::<NamespacedName>().is_err());
    }

    #[test]
    fn dataset_and_container_names_are_deterministic() {
        let n = NamespacedName::new("api", "dev").unwrap();
        assert_eq!(n.dataset_name(), "api-dev");
        assert_eq!(n.container_name("pgfork"), "pgfork-api-dev");
    }
}

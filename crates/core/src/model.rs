// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Domain model: projects, branches, snapshots, backup config.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{BranchId, ProjectId, SnapshotId};

/// Default filesystem pool path new projects are rooted under, absent
/// an explicit override in project config.
pub const DATASET_BASE_PATH_DEFAULT: &str = "tank/pgfork";

/// A logical grouping of branches sharing credentials and an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub image: String,
    pub cert_dir: String,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        db_user: impl Into<String>,
        db_password: impl Into<String>,
        db_name: impl Into<String>,
        image: impl Into<String>,
        cert_dir: impl Into<String>,
    ) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            db_user: db_user.into(),
            db_password: db_password.into(),
            db_name: db_name.into(),
            image: image.into(),
            cert_dir: cert_dir.into(),
        }
    }
}

/// Lifecycle state of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchLifecycle {
    Created,
    Running,
    Stopped,
}

/// A writable database instance, forked from a parent branch or primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub project_name: String,
    pub branch_name: String,
    pub parent_id: Option<BranchId>,
    pub origin_snapshot: Option<String>,
    pub dataset_name: String,
    pub container_name: String,
    pub port: Option<u16>,
    pub lifecycle: BranchLifecycle,
    pub created_at: DateTime<Utc>,
}

impl Branch {
    /// Is this the project's primary branch (no parent, no origin snapshot)?
    pub fn is_primary(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn namespaced(&self) -> String {
        format!("{}/{}", self.project_name, self.branch_name)
    }
}

/// A named point-in-time image of a branch's dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub branch_name: String,
    pub fs_ref: String,
    pub created_at: DateTime<Utc>,
    pub label: Option<String>,
}

/// Optional remote object-store backup destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupConfig {
    pub endpoint: String,
    pub bucket: String,
    pub credentials: String,
    pub repository_prefix: String,
    pub local_config_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_branch_has_no_parent() {
        let branch = Branch {
            id: BranchId::new(),
            project_name: "api".into(),
            branch_name: "main".into(),
            parent_id: None,
            origin_snapshot: None,
            dataset_name: "api-main".into(),
            container_name: "pgfork-api-main".into(),
            port: None,
            lifecycle: BranchLifecycle::Created,
            created_at: Utc::now(),
        };
        assert!(branch.is_primary());
        assert_eq!(branch.namespaced(), "api/main");
    }
}

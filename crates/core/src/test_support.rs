// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Builders and proptest strategies shared across crates' test suites.
//! Compiled only under `#[cfg(test)]` or the `test-support` feature.

use chrono::Utc;

use crate::id::{BranchId, ProjectId};
use crate::model::{Branch, BranchLifecycle, Project};

/// Build a project with throwaway credentials, for tests that only care
/// about identity and naming.
pub fn fake_project(name: &str) -> Project {
    Project {
        id: ProjectId::new(),
        name: name.to_string(),
        db_user: "postgres".to_string(),
        db_password: "test".to_string(),
        db_name: "postgres".to_string(),
        image: "postgres:16".to_string(),
        cert_dir: "/tmp/pgfork-test-certs".to_string(),
    }
}

/// Build a primary branch for `project_name`, named `main`.
pub fn fake_primary_branch(project_name: &str) -> Branch {
    Branch {
        id: BranchId::new(),
        project_name: project_name.to_string(),
        branch_name: "main".to_string(),
        parent_id: None,
        origin_snapshot: None,
        dataset_name: format!("{project_name}-main"),
        container_name: format!("pgfork-{project_name}-main"),
        port: None,
        lifecycle: BranchLifecycle::Created,
        created_at: Utc::now(),
    }
}

/// Build a non-primary branch forked from `parent`.
pub fn fake_child_branch(parent: &Branch, branch_name: &str) -> Branch {
    Branch {
        id: BranchId::new(),
        project_name: parent.project_name.clone(),
        branch_name: branch_name.to_string(),
        parent_id: Some(parent.id),
        origin_snapshot: Some(format!("{}@fork", parent.dataset_name)),
        dataset_name: format!("{}-{}", parent.project_name, branch_name),
        container_name: format!("pgfork-{}-{}", parent.project_name, branch_name),
        port: None,
        lifecycle: BranchLifecycle::Created,
        created_at: Utc::now(),
    }
}

#[cfg(feature = "proptest")]
pub mod strategies {
    use proptest::prelude::*;

    /// Arbitrary valid namespaced-name component: `[A-Za-z0-9_-]+`.
    pub fn name_component() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_-]{1,16}"
    }
}

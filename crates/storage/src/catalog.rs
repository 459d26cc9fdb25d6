// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! The catalog document: the single JSON state file.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pgfork_core::{BackupConfig, Branch, EngineError, Project, Snapshot};

/// On-disk schema version. Bump and add a migration if the shape changes.
pub const CATALOG_VERSION: u32 = 1;

/// A project together with its branches, the shape persisted in the
/// catalog ("projects array with embedded branches").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    #[serde(flatten)]
    pub project: Project,
    pub branches: Vec<Branch>,
}

/// The full catalog document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub version: u32,
    pub initialized_at: DateTime<Utc>,
    pub pool_id: String,
    pub dataset_base_path: String,
    pub projects: Vec<ProjectEntry>,
    pub snapshots: Vec<Snapshot>,
    pub backup: Option<BackupConfig>,
}

impl CatalogDocument {
    pub fn new(pool_id: impl Into<String>, dataset_base_path: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            version: CATALOG_VERSION,
            initialized_at: now,
            pool_id: pool_id.into(),
            dataset_base_path: dataset_base_path.into(),
            projects: Vec::new(),
            snapshots: Vec::new(),
            backup: None,
        }
    }

    // ---- projects -----------------------------------------------------

    pub fn project(&self, name: &str) -> Option<&ProjectEntry> {
        self.projects.iter().find(|p| p.project.name == name)
    }

    pub fn project_mut(&mut self, name: &str) -> Option<&mut ProjectEntry> {
        self.projects.iter_mut().find(|p| p.project.name == name)
    }

    pub fn add_project(&mut self, project: Project, primary: Branch) -> Result<(), EngineError> {
        if self.project(&project.name).is_some() {
            return Err(EngineError::user(format!("project '{}' already exists", project.name)));
        }
        if !primary.is_primary() {
            return Err(EngineError::invariant("project's first branch must be primary"));
        }
        self.projects.push(ProjectEntry { project, branches: vec![primary] });
        Ok(())
    }

    pub fn remove_project(&mut self, name: &str) -> Result<ProjectEntry, EngineError> {
        let idx = self
            .projects
            .iter()
            .position(|p| p.project.name == name)
            .ok_or_else(|| EngineError::user(format!("project '{name}' not found")))?;
        Ok(self.projects.remove(idx))
    }

    // ---- branches -------------------------------------------------------

    pub fn branch(&self, project_name: &str, branch_name: &str) -> Option<&Branch> {
        self.project(project_name)?
            .branches
            .iter()
            .find(|b| b.branch_name == branch_name)
    }

    pub fn branch_mut(&mut self, project_name: &str, branch_name: &str) -> Option<&mut Branch> {
        self.project_mut(project_name)?
            .branches
            .iter_mut()
            .find(|b| b.branch_name == branch_name)
    }

    pub fn add_branch(&mut self, project_name: &str, branch: Branch) -> Result<(), EngineError> {
        let entry = self
            .project_mut(project_name)
            .ok_or_else(|| EngineError::user(format!("project '{project_name}' not found")))?;
        if entry.branches.iter().any(|b| b.branch_name == branch.branch_name) {
            return Err(EngineError::user(format!(
                "branch '{project_name}/{}' already exists",
                branch.branch_name
            )));
        }
        entry.branches.push(branch);
        Ok(())
    }

    pub fn remove_branch(&mut self, project_name: &str, branch_name: &str) -> Result<Branch, EngineError> {
        let entry = self
            .project_mut(project_name)
            .ok_or_else(|| EngineError::user(format!("project '{project_name}' not found")))?;
        let idx = entry
            .branches
            .iter()
            .position(|b| b.branch_name == branch_name)
            .ok_or_else(|| EngineError::user(format!("branch '{project_name}/{branch_name}' not found")))?;
        Ok(entry.branches.remove(idx))
    }

    pub fn children_of(&self, project_name: &str, branch_id: pgfork_core::BranchId) -> Vec<&Branch> {
        self.project(project_name)
            .map(|p| p.branches.iter().filter(|b| b.parent_id == Some(branch_id)).collect())
            .unwrap_or_default()
    }

    // ---- snapshots ------------------------------------------------------

    pub fn add_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn remove_snapshot(&mut self, id: pgfork_core::SnapshotId) -> Result<Snapshot, EngineError> {
        let idx = self
            .snapshots
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| EngineError::user(format!("snapshot '{id}' not found")))?;
        Ok(self.snapshots.remove(idx))
    }

    pub fn snapshots_for_branch(&self, branch_name: &str) -> Vec<&Snapshot> {
        self.snapshots.iter().filter(|s| s.branch_name == branch_name).collect()
    }

    /// Remove every snapshot recorded against a (now being deleted)
    /// namespaced branch name; returns the count removed.
    pub fn remove_snapshots_for_branch(&mut self, namespaced_branch_name: &str) -> usize {
        let before = self.snapshots.len();
        self.snapshots.retain(|s| s.branch_name != namespaced_branch_name);
        before - self.snapshots.len()
    }

    /// Remove every snapshot recorded against any branch of a (now being
    /// deleted) project; returns the count removed.
    pub fn remove_snapshots_for_project(&mut self, project_name: &str) -> usize {
        let prefix = format!("{project_name}/");
        let before = self.snapshots.len();
        self.snapshots.retain(|s| !s.branch_name.starts_with(&prefix));
        before - self.snapshots.len()
    }

    // ---- backup config --------------------------------------------------

    pub fn set_backup_config(&mut self, config: BackupConfig) {
        self.backup = Some(config);
    }

    pub fn clear_backup_config(&mut self) {
        self.backup = None;
    }

    // ---- invariants --------------------------------------------

    /// Validate all six catalog invariants. Called on every load and
    /// before every save; no silent repair.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut project_names = HashSet::new();
        let mut namespaced_names = HashSet::new();

        for entry in &self.projects {
            // I1: project names unique.
            if !project_names.insert(entry.project.name.as_str()) {
                return Err(EngineError::invariant(format!(
                    "duplicate project name '{}'",
                    entry.project.name
                )));
            }

            // I2: exactly one primary branch per project.
            let primaries = entry.branches.iter().filter(|b| b.is_primary()).count();
            if primaries != 1 {
                return Err(EngineError::invariant(format!(
                    "project '{}' has {primaries} primary branches, expected 1",
                    entry.project.name
                )));
            }

            let mut by_id = std::collections::HashMap::new();
            for branch in &entry.branches {
                by_id.insert(branch.id, branch);

                // I1: namespaced names unique across the whole catalog.
                let namespaced = branch.namespaced();
                if !namespaced_names.insert(namespaced.clone()) {
                    return Err(EngineError::invariant(format!("duplicate branch name '{namespaced}'")));
                }

                // I3: branch's projectName matches its owning project.
                if branch.project_name != entry.project.name {
                    return Err(EngineError::invariant(format!(
                        "branch '{namespaced}' projectName '{}' does not match owning project '{}'",
                        branch.project_name, entry.project.name
                    )));
                }

                // I4: dataset/container names are deterministic functions of the namespaced name.
                let expected_dataset = format!("{}-{}", branch.project_name, branch.branch_name);
                if branch.dataset_name != expected_dataset {
                    return Err(EngineError::invariant(format!(
                        "branch '{namespaced}' dataset name '{}' is not deterministic (expected '{expected_dataset}')",
                        branch.dataset_name
                    )));
                }
            }

            // I5: every branch reachable from the primary via parent edges.
            for branch in &entry.branches {
                let mut current = branch;
                let mut hops = 0;
                while let Some(parent_id) = current.parent_id {
                    hops += 1;
                    if hops > entry.branches.len() {
                        return Err(EngineError::invariant(format!(
                            "branch '{}' has a cyclic lineage", branch.namespaced()
                        )));
                    }
                    current = by_id.get(&parent_id).ok_or_else(|| {
                        EngineError::invariant(format!(
                            "branch '{}' has dangling parent reference",
                            branch.namespaced()
                        ))
                    })?;
                }
            }
        }

        // I6: no snapshot refers to a non-existent branch.
        for snapshot in &self.snapshots {
            if !namespaced_names.contains(&snapshot.branch_name)
                && !self.projects.iter().any(|p| {
                    p.branches.iter().any(|b| b.branch_name == snapshot.branch_name)
                })
            {
                return Err(EngineError::invariant(format!(
                    "snapshot '{}' refers to non-existent branch '{}'",
                    snapshot.id, snapshot.branch_name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgfork_core::test_support::{fake_child_branch, fake_primary_branch, fake_project};

    fn new_doc() -> CatalogDocument {
        CatalogDocument::new("tank", "tank/pgfork", Utc::now())
    }

    #[test]
    fn add_and_find_project() {
        let mut doc = new_doc();
        let project = fake_project("api");
        let primary = fake_primary_branch("api");
        doc.add_project(project, primary).unwrap();
        assert!(doc.project("api").is_some());
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_project() {
        let mut doc = new_doc();
        doc.add_project(fake_project("api"), fake_primary_branch("api")).unwrap();
        let err = doc.add_project(fake_project("api"), fake_primary_branch("api")).unwrap_err();
        assert_eq!(err.kind(), pgfork_core::ErrorKind::User);
    }

    #[test]
    fn add_branch_then_detect_lineage() {
        let mut doc = new_doc();
        doc.add_project(fake_project("api"), fake_primary_branch("api")).unwrap();
        let primary = doc.branch("api", "main").unwrap().clone();
        let child = fake_child_branch(&primary, "dev");
        doc.add_branch("api", child).unwrap();
        assert!(doc.validate().is_ok());
        let children = doc.children_of("api", primary.id);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].branch_name, "dev");
    }

    #[test]
    fn validate_catches_missing_primary() {
        let mut doc = new_doc();
        let project = fake_project("api");
        let mut primary = fake_primary_branch("api");
        primary.parent_id = Some(pgfork_core::BranchId::new());
        doc.projects.push(ProjectEntry { project, branches: vec![primary] });
        assert!(doc.validate().is_err());
    }

    #[test]
    fn validate_catches_dangling_snapshot() {
        let mut doc = new_doc();
        doc.add_project(fake_project("api"), fake_primary_branch("api")).unwrap();
        doc.add_snapshot(Snapshot {
            id: pgfork_core::SnapshotId::new(),
            branch_name: "ghost".into(),
            fs_ref: "api-ghost@x".into(),
            created_at: Utc::now(),
            label: None,
        });
        assert!(doc.validate().is_err());
    }

    #[test]
    fn remove_branch_and_project() {
        let mut doc = new_doc();
        doc.add_project(fake_project("api"), fake_primary_branch("api")).unwrap();
        let primary = doc.branch("api", "main").unwrap().clone();
        doc.add_branch("api", fake_child_branch(&primary, "dev")).unwrap();
        doc.remove_branch("api", "dev").unwrap();
        assert!(doc.branch("api", "dev").is_none());
        doc.remove_project("api").unwrap();
        assert!(doc.project("api").is_none());
    }
}

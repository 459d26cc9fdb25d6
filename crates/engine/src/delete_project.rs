// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! deleteProject: as deleteBranch with all branches as
//! descendants, primary removed last, TLS material cleaned up.

use pgfork_core::{Clock, EngineError, NamespacedName};
use tracing::info;

use crate::orchestrator::Orchestrator;

impl<C: Clock> Orchestrator<C> {
    pub async fn delete_project(&self, name: &str, force: bool) -> Result<(), EngineError> {
        let doc = self.store.load()?;
        let entry = doc.project(name).ok_or_else(|| EngineError::user(format!("project '{name}' not found")))?;

        if !force && entry.branches.len() > 1 {
            return Err(EngineError::user_with_hint(
                format!("project '{name}' has non-primary branches"),
                "pass force to delete them too",
            ));
        }

        let non_primary: Vec<String> =
            entry.branches.iter().filter(|b| !b.is_primary()).map(|b| b.branch_name.clone()).collect();
        let primary = entry.branches.iter().find(|b| b.is_primary()).cloned();
        drop(doc);

        for branch_name in non_primary {
            let ns = NamespacedName::new(name, branch_name)?;
            self.delete_branch(&ns, true).await?;
        }

        if let Some(primary) = primary {
            self.destroy_branch_resources(&primary).await?;
        }

        let cert_dir = self.config.cert_dir(name);
        let _ = std::fs::remove_dir_all(&cert_dir);

        self.store.with_lock(|doc| {
            doc.remove_snapshots_for_project(name);
            doc.remove_project(name).map(|_| ())
        })?;
        info!(project = %name, "project deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::orchestrator::Orchestrator;
    use pgfork_adapters::{container::fake::FakeContainerDriver, pool::fake::FakePoolDriver};
    use pgfork_core::FakeClock;
    use std::sync::Arc;

    fn test_orchestrator(dir: &std::path::Path) -> Orchestrator<FakeClock> {
        Orchestrator::new(
            EngineConfig::new(dir),
            Arc::new(FakePoolDriver::new()),
            Arc::new(FakeContainerDriver::new()),
            FakeClock::new(),
        )
    }

    #[tokio::test]
    async fn delete_project_refuses_without_force_when_branches_exist() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.create_project("api", None, None).await.unwrap();
        let dev = NamespacedName::new("api", "dev").unwrap();
        orch.create_branch(&dev, None, None).await.unwrap();

        assert!(orch.delete_project("api", false).await.is_err());
        orch.delete_project("api", true).await.unwrap();
        assert!(orch.store.load().unwrap().project("api").is_none());
    }

    #[tokio::test]
    async fn delete_project_with_only_primary_needs_no_force() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.create_project("api", None, None).await.unwrap();
        orch.delete_project("api", false).await.unwrap();
        assert!(orch.store.load().unwrap().project("api").is_none());
    }
}

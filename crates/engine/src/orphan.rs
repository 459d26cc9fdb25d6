// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! detectOrphans + cleanup(dryRun?, force?): reconciles the
//! catalog with externally visible reality. A process crash mid-orchestration
//! leaves orphans that the rollback journal never had a chance to undo;
//! this is the explicit reconciliation path this tool offers for that case.

use pgfork_core::{Clock, EngineError};
use tracing::info;

use crate::config::CONTAINER_PREFIX;
use crate::orchestrator::Orchestrator;

/// An externally visible resource with no corresponding catalog record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Orphan {
    Dataset(String),
    Container(String),
}

impl<C: Clock> Orchestrator<C> {
    pub async fn detect_orphans(&self) -> Result<Vec<Orphan>, EngineError> {
        let (known_datasets, known_containers) = if self.store.exists() {
            let doc = self.store.load()?;
            let datasets: std::collections::HashSet<String> =
                doc.projects.iter().flat_map(|p| p.branches.iter().map(|b| b.dataset_name.clone())).collect();
            let containers: std::collections::HashSet<String> =
                doc.projects.iter().flat_map(|p| p.branches.iter().map(|b| b.container_name.clone())).collect();
            (datasets, containers)
        } else {
            (std::collections::HashSet::new(), std::collections::HashSet::new())
        };

        let mut orphans = Vec::new();
        for dataset in self.pool.list_datasets().await? {
            if !known_datasets.contains(&dataset) {
                orphans.push(Orphan::Dataset(dataset));
            }
        }
        for container in self.container.list_by_name_prefix(CONTAINER_PREFIX).await? {
            if !known_containers.contains(&container) {
                orphans.push(Orphan::Container(container));
            }
        }
        Ok(orphans)
    }

    /// With `dry_run`, only reports orphans. With `force`, also destroys
    /// them (unmount+destroy dataset, force-remove container).
    pub async fn cleanup(&self, dry_run: bool, force: bool) -> Result<Vec<Orphan>, EngineError> {
        let orphans = self.detect_orphans().await?;
        if dry_run || !force {
            return Ok(orphans);
        }
        for orphan in &orphans {
            match orphan {
                Orphan::Dataset(name) => {
                    let _ = self.pool.unmount_dataset(name).await;
                    self.pool.destroy_dataset(name, true).await?;
                }
                Orphan::Container(name) => {
                    self.container.remove(name, true).await?;
                }
            }
        }
        info!(count = orphans.len(), "orphans reconciled");
        Ok(orphans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use pgfork_adapters::{container::fake::FakeContainerDriver, pool::fake::FakePoolDriver};
    use pgfork_core::FakeClock;
    use std::collections::BTreeMap;
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
    async fn detects_dataset_and_container_with_no_catalog_record() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.create_project("api", None, None).await.unwrap();

        orch.pool.create_dataset("api-crash", &BTreeMap::new()).await.unwrap();
        orch.container.create(&pgfork_adapters::ContainerSpec {
            name: "pgfork-orphan".into(),
            image: "postgres:16".into(),
            env: BTreeMap::new(),
            mounts: vec![],
        })
        .await
        .unwrap();

        let orphans = orch.detect_orphans().await.unwrap();
        assert!(orphans.contains(&Orphan::Dataset("api-crash".into())));
        assert!(orphans.contains(&Orphan::Container("pgfork-orphan".into())));
        // The healthy, cataloged primary branch's own resources are not orphans.
        assert!(!orphans.iter().any(|o| matches!(o, Orphan::Dataset(d) if d == "api-main")));
    }

    #[tokio::test]
    async fn dry_run_reports_without_destroying() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.pool.create_dataset("ghost", &BTreeMap::new()).await.unwrap();

        let orphans = orch.cleanup(true, true).await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert!(orch.pool.dataset_exists("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn force_destroys_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let orch = test_orchestrator(dir.path());
        orch.pool.create_dataset("ghost", &BTreeMap::new()).await.unwrap();

        let removed = orch.cleanup(false, true).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert!(!orch.pool.dataset_exists("ghost").await.unwrap());
    }
}

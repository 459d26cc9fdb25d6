// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Resolves the storage pool's base dataset path before the catalog
//! necessarily exists, so the `ZfsPoolDriver` it feeds can be constructed
//! with the right prefix on the very first `project create`.

use std::sync::Arc;

use pgfork_adapters::{PoolDriver, ZfsPoolDriver};
use pgfork_engine::config::CONTAINER_PREFIX;

use crate::config::Config;

/// Build the pool driver for this invocation.
///
/// If an explicit pool was configured, or the catalog already records
/// one, use it directly. Otherwise probe `zpool list` the same way
/// `createProject`'s auto-detection does, since pool-level operations
/// don't depend on the dataset base path.
pub async fn build_pool_driver(config: &Config) -> anyhow::Result<Arc<dyn PoolDriver>> {
    if let Some(pool) = &config.pool_name {
        return Ok(Arc::new(ZfsPoolDriver::new(format!("{pool}/{CONTAINER_PREFIX}"))));
    }

    if let Some(base_path) = existing_catalog_base_path(config) {
        return Ok(Arc::new(ZfsPoolDriver::new(base_path)));
    }

    let probe = ZfsPoolDriver::new(String::new());
    let pools = probe.list_pools().await?;
    match pools.len() {
        1 => Ok(Arc::new(ZfsPoolDriver::new(format!("{}/{CONTAINER_PREFIX}", pools[0])))),
        0 => Err(anyhow::anyhow!("no storage pool found; create one first or pass --pool")),
        _ => Err(anyhow::anyhow!("multiple storage pools found: {}; pass --pool to disambiguate", pools.join(", "))),
    }
}

fn existing_catalog_base_path(config: &Config) -> Option<String> {
    let catalog_path = config.state_dir.join("catalog.json");
    let bytes = std::fs::read(catalog_path).ok()?;
    let doc: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    doc.get("dataset_base_path").and_then(|v| v.as_str()).map(str::to_string)
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Builds the container specification for a branch: the bind
//! mounts, environment, and port request shared by project creation and
//! branch creation.

use std::collections::BTreeMap;
use std::path::Path;

use pgfork_adapters::ContainerSpec;
use pgfork_core::Project;

use crate::config::{CONTAINER_CERT_PATH, CONTAINER_DATA_PATH, CONTAINER_WAL_ARCHIVE_PATH};

pub fn build(
    container_name: &str,
    project: &Project,
    mountpoint: &Path,
    wal_archive_path: &Path,
    cert_dir: &Path,
) -> ContainerSpec {
    let mut env = BTreeMap::new();
    env.insert("POSTGRES_USER".to_string(), project.db_user.clone());
    env.insert("POSTGRES_PASSWORD".to_string(), project.db_password.clone());
    env.insert("POSTGRES_DB".to_string(), project.db_name.clone());
    env.insert("PGDATA".to_string(), CONTAINER_DATA_PATH.to_string());

    ContainerSpec {
        name: container_name.to_string(),
        image: project.image.clone(),
        env,
        mounts: vec![
            (mountpoint.to_string_lossy().into_owned(), CONTAINER_DATA_PATH.to_string(), false),
            (wal_archive_path.to_string_lossy().into_owned(), CONTAINER_WAL_ARCHIVE_PATH.to_string(), false),
            (cert_dir.to_string_lossy().into_owned(), CONTAINER_CERT_PATH.to_string(), true),
        ],
    }
}

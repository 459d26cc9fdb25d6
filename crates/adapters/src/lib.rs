// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! pgfork-adapters: drivers wrapping the external systems the engine
//! orchestrates — copy-on-write pool, container runtime, WAL archive,
//! optional object-store backup.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod backup;
pub mod container;
pub mod pool;
pub mod process;
pub mod wal;

pub use backup::{BackupAdapter, BackupEntry, PayloadKind, ResticBackupAdapter};
pub use container::{ContainerDriver, ContainerSpec, ContainerStatus, DockerContainerDriver};
pub use pool::{PoolDriver, SnapshotInfo, ZfsPoolDriver};
pub use wal::{ArchiveInfo, SegmentGap, WalManager};

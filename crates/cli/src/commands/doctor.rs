// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! `pgfork doctor` — read-only preflight: is everything this tool shells
//! out to actually present and usable.

use anyhow::Result;
use pgfork_adapters::process;
use serde::Serialize;

use crate::config::Config;
use crate::output::OutputFormat;

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    available: bool,
    detail: String,
}

pub async fn handle(config: &Config, format: OutputFormat) -> Result<()> {
    let mut checks = Vec::new();

    checks.push(match process::run("zpool", &["version"]).await {
        Ok(out) => DoctorCheck { name: "zpool".into(), available: true, detail: out.lines().next().unwrap_or("").to_string() },
        Err(e) => DoctorCheck { name: "zpool".into(), available: false, detail: e.to_string() },
    });

    checks.push(match process::run("docker", &["version", "--format", "{{.Server.Version}}"]).await {
        Ok(out) => DoctorCheck { name: "docker".into(), available: true, detail: format!("server {out}") },
        Err(e) => DoctorCheck { name: "docker".into(), available: false, detail: e.to_string() },
    });

    checks.push(match process::run("restic", &["version"]).await {
        Ok(out) => DoctorCheck { name: "restic".into(), available: true, detail: out },
        Err(e) => DoctorCheck { name: "restic".into(), available: false, detail: e.to_string() },
    });

    let state_dir_ok = std::fs::create_dir_all(&config.state_dir).is_ok();
    checks.push(DoctorCheck {
        name: "state directory".into(),
        available: state_dir_ok,
        detail: config.state_dir.display().to_string(),
    });

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&checks)?),
        OutputFormat::Text => {
            for check in &checks {
                let marker = if check.available { "ok" } else { "FAIL" };
                println!("[{marker}] {:<16} {}", check.name, check.detail);
            }
        }
    }
    Ok(())
}

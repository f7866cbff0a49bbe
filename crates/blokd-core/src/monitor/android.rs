use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use std::time::Duration;

use super::usage::{most_recent_app, parse_appops_allowed, parse_usage_events};
use super::ForegroundMonitor;
use crate::config::FOREGROUND_WINDOW;

const DUMPSYS: &str = "/system/bin/dumpsys";
const APPOPS: &str = "/system/bin/appops";
const COMMAND_TIMEOUT: Duration = Duration::from_millis(1500);

/// Foreground monitor backed by the Android usage-stats service.
///
/// Samples `dumpsys usagestats` and selects the most-recently-used
/// package inside the trailing event window. Permission probes go through
/// `appops`, covering both the usage-access and overlay grants.
pub struct AndroidMonitor {
    self_package: String,
}

impl AndroidMonitor {
    #[must_use]
    pub fn new(self_package: &str) -> Self {
        Self {
            self_package: self_package.to_string(),
        }
    }

    async fn op_allowed(&self, op: &str) -> Result<bool> {
        let output = run_command(APPOPS, &["get", &self.self_package, op]).await?;
        Ok(parse_appops_allowed(&output))
    }
}

#[async_trait]
impl ForegroundMonitor for AndroidMonitor {
    async fn current_app(&self) -> Result<Option<String>> {
        let dump = match run_command(DUMPSYS, &["usagestats"]).await {
            Ok(out) => out,
            Err(e) => {
                log::debug!("dumpsys usagestats failed: {e:?}");
                return Ok(None);
            }
        };

        let events = parse_usage_events(&dump);
        Ok(most_recent_app(
            &events,
            Local::now().naive_local(),
            FOREGROUND_WINDOW,
        ))
    }

    async fn permissions_granted(&self) -> Result<bool> {
        let usage_access = self.op_allowed("GET_USAGE_STATS").await?;
        let overlay = self.op_allowed("SYSTEM_ALERT_WINDOW").await?;
        Ok(usage_access && overlay)
    }
}

async fn run_command(program: &str, args: &[&str]) -> Result<String> {
    let output = tokio::time::timeout(
        COMMAND_TIMEOUT,
        tokio::process::Command::new(program).args(args).output(),
    )
    .await
    .context("Command timeout")?
    .with_context(|| format!("Failed to execute: {program}"))?;

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

use anyhow::Result;
use async_trait::async_trait;

#[cfg(test)]
use std::sync::Mutex;

/// Capability interface for showing the full-screen block notice in place
/// of a blocked application.
#[async_trait]
pub trait InterstitialLauncher: Send + Sync {
    /// Show the blocking screen for `package`.
    async fn show(&self, package: &str) -> Result<()>;
}

#[async_trait]
impl<T: InterstitialLauncher + ?Sized> InterstitialLauncher for std::sync::Arc<T> {
    async fn show(&self, package: &str) -> Result<()> {
        (**self).show(package).await
    }
}

/// Create the platform interstitial launcher
///
/// # Errors
///
/// Returns an error if the current platform is not supported
pub fn create_interstitial() -> Result<Box<dyn InterstitialLauncher>> {
    #[cfg(target_os = "android")]
    {
        Ok(Box::new(android::ActivityInterstitial::new(
            crate::config::SELF_PACKAGE,
        )))
    }

    #[cfg(not(target_os = "android"))]
    {
        anyhow::bail!("Unsupported platform: the blocking screen requires Android")
    }
}

#[cfg(target_os = "android")]
pub mod android {
    use anyhow::{Context, Result};
    use async_trait::async_trait;

    use super::InterstitialLauncher;

    const AM: &str = "/system/bin/am";
    const BLOCKING_ACTIVITY: &str = ".BlockingActivity";

    /// Launches the blocking activity through the activity manager.
    pub struct ActivityInterstitial {
        component: String,
    }

    impl ActivityInterstitial {
        #[must_use]
        pub fn new(self_package: &str) -> Self {
            Self {
                component: format!("{self_package}/{BLOCKING_ACTIVITY}"),
            }
        }
    }

    #[async_trait]
    impl InterstitialLauncher for ActivityInterstitial {
        async fn show(&self, package: &str) -> Result<()> {
            let status = tokio::process::Command::new(AM)
                .args([
                    "start",
                    "-n",
                    &self.component,
                    "--es",
                    "blocked_package",
                    package,
                ])
                .status()
                .await
                .context("Failed to execute activity manager")?;

            if !status.success() {
                anyhow::bail!("am start exited with {status}");
            }
            Ok(())
        }
    }
}

/// Test double recording every package the daemon tried to block.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingInterstitial {
    shown: Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingInterstitial {
    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().map_or_else(|_| Vec::new(), |s| s.clone())
    }
}

#[cfg(test)]
#[async_trait]
impl InterstitialLauncher for RecordingInterstitial {
    async fn show(&self, package: &str) -> Result<()> {
        if let Ok(mut shown) = self.shown.lock() {
            shown.push(package.to_string());
        }
        Ok(())
    }
}

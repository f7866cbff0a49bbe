use anyhow::Result;
use async_trait::async_trait;

#[cfg(target_os = "android")]
pub mod android;

pub mod scripted;
pub mod usage;

/// Capability interface over the platform's foreground-application query
/// and the permissions it depends on.
#[async_trait]
pub trait ForegroundMonitor: Send + Sync {
    /// Identify the application currently in the foreground.
    ///
    /// `Ok(None)` means "no foreground app" and is not a failure.
    async fn current_app(&self) -> Result<Option<String>>;

    /// Check whether the permissions required for monitoring are still
    /// granted. Revocation is fatal to a running session.
    async fn permissions_granted(&self) -> Result<bool>;
}

#[async_trait]
impl<T: ForegroundMonitor + ?Sized> ForegroundMonitor for std::sync::Arc<T> {
    async fn current_app(&self) -> Result<Option<String>> {
        (**self).current_app().await
    }

    async fn permissions_granted(&self) -> Result<bool> {
        (**self).permissions_granted().await
    }
}

/// Create the platform foreground monitor
///
/// # Errors
///
/// Returns an error if the current platform is not supported
pub fn create_monitor() -> Result<Box<dyn ForegroundMonitor>> {
    #[cfg(target_os = "android")]
    {
        Ok(Box::new(android::AndroidMonitor::new(
            crate::config::SELF_PACKAGE,
        )))
    }

    #[cfg(not(target_os = "android"))]
    {
        anyhow::bail!("Unsupported platform: foreground monitoring requires Android")
    }
}

// src/notify.rs

use log::info;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifications are not permitted")]
    PermissionDenied,
    #[error("notification failed: {0}")]
    Failed(String),
}

/// Fire-and-forget user notifications about a batch.
///
/// The download loop logs and drops any error returned here.
pub trait Notifier: Send + Sync {
    fn notify_progress(&self, total: usize, current: usize, label: &str) -> Result<(), NotifyError>;
    fn notify_complete(&self, success_count: usize) -> Result<(), NotifyError>;
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_progress(&self, total: usize, current: usize, label: &str) -> Result<(), NotifyError> {
        let percent = if total == 0 { 0 } else { current * 100 / total };
        info!("Downloading {} ({}/{}) {}%", label, current, total, percent);
        Ok(())
    }

    fn notify_complete(&self, success_count: usize) -> Result<(), NotifyError> {
        info!("Download finished: {} chapters downloaded", success_count);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify_progress(&self, _: usize, _: usize, _: &str) -> Result<(), NotifyError> {
        Ok(())
    }

    fn notify_complete(&self, _: usize) -> Result<(), NotifyError> {
        Ok(())
    }
}

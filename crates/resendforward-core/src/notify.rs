//! User-facing notifications

use resendforward_common::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Error,
}

/// Single-line toast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub title: String,
    pub description: Option<String>,
}

impl Notification {
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            title: title.into(),
            description: None,
        }
    }

    pub fn error(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            level: Level::Error,
            title: title.into(),
            description,
        }
    }
}

/// Notification sink
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that forwards to an unbounded channel
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!("Notification receiver dropped");
        }
    }
}

/// Create a channel notifier and its receiving end
pub fn channel() -> (ChannelNotifier, mpsc::UnboundedReceiver<Notification>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelNotifier { tx }, rx)
}

/// Notifier that writes toasts to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        let description = notification.description.as_deref().unwrap_or("");
        match notification.level {
            Level::Success => info!("{} {}", notification.title, description),
            Level::Error => error!("{} {}", notification.title, description),
        }
    }
}

/// Uniform error handler.
///
/// Benign cancellations are dropped here and never reach the user.
pub fn report_error(notifier: &dyn Notifier, err: &Error) {
    if err.is_cancellation() {
        debug!("Ignoring cancelled request");
        return;
    }
    error!(code = err.code(), status = err.status_code(), "{}", err);
    notifier.notify(Notification::error("An error occurred", Some(err.to_string())));
}

// # Notifier Trait
//
// Best-effort side channel for reporting what the loop did.
//
// ## Implementations
//
// - Telegram: `uddns-notifier-telegram` crate
// - No-op: [`NoopNotifier`], used when nothing is configured

use async_trait::async_trait;

use crate::error::Result;

/// A message for the side channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Optional headline
    pub title: Option<String>,
    /// Message body
    pub message: String,
}

impl Notification {
    /// Create a notification without a title
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            title: None,
            message: message.into(),
        }
    }

    /// Attach a title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Title and message joined as plain text
    pub fn to_text(&self) -> String {
        match &self.title {
            Some(title) => format!("{}\n{}", title, self.message),
            None => self.message.clone(),
        }
    }
}

/// Trait for notifier implementations
///
/// Failures are reported as [`crate::Error::Notify`] and are never allowed
/// to affect the outcome of an update cycle. The loop logs them and moves on.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification
    async fn notify(&self, notification: &Notification) -> Result<()>;

    /// Get the notifier name (for logging/debugging)
    fn notifier_name(&self) -> &'static str;
}

/// Notifier that accepts everything and sends nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notification: &Notification) -> Result<()> {
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "noop"
    }
}

/// Helper trait for constructing notifiers from configuration
pub trait NotifierFactory: Send + Sync {
    /// Create a Notifier instance from configuration
    fn create(&self, config: &crate::config::NotifierConfig) -> Result<Box<dyn Notifier>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_always_succeeds() {
        let notifier = NoopNotifier;
        assert!(notifier.notify(&Notification::new("hello")).await.is_ok());
    }

    #[test]
    fn title_is_the_first_line() {
        let n = Notification::new("IPv4 1.2.3.4").with_title("uddns");
        assert_eq!(n.to_text(), "uddns\nIPv4 1.2.3.4");
        assert_eq!(Notification::new("plain").to_text(), "plain");
    }
}

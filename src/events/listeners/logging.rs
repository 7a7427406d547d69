use async_trait::async_trait;

use crate::events::{Listener, SessionEvent};

/// Writes every event through the `log` crate.
///
/// Security events are always logged at `warn` or above, whatever the
/// configured level.
pub struct LoggingListener {
    level: log::Level,
}

impl LoggingListener {
    /// Logs at `info`.
    pub fn new() -> Self {
        Self {
            level: log::Level::Info,
        }
    }

    pub fn with_level(level: log::Level) -> Self {
        Self { level }
    }

    fn level_for(&self, event: &SessionEvent) -> log::Level {
        if event.is_security_event() {
            self.level.min(log::Level::Warn)
        } else {
            self.level
        }
    }
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Listener for LoggingListener {
    async fn handle(&self, event: &SessionEvent) {
        log::log!(
            target: "warden_auth::events",
            self.level_for(event),
            "event={} {:?}",
            event.name(),
            event
        );
    }
}

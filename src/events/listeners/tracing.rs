use async_trait::async_trait;

use crate::events::{Listener, SessionEvent};

/// Emits events as `tracing` events. Requires the `tracing` feature.
pub struct TracingListener;

#[async_trait]
impl Listener for TracingListener {
    async fn handle(&self, event: &SessionEvent) {
        if event.is_security_event() {
            tracing::warn!(
                target: "warden_auth::events",
                event_name = event.name(),
                ?event,
                "security event"
            );
        } else {
            tracing::info!(
                target: "warden_auth::events",
                event_name = event.name(),
                ?event,
                "session event"
            );
        }
    }
}

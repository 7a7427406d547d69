use async_trait::async_trait;

use super::SessionEvent;

/// Handles dispatched [`SessionEvent`]s.
///
/// Listeners run inline in the dispatching action, in registration order;
/// keep them quick or hand work off to a channel.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    async fn handle(&self, event: &SessionEvent);
}

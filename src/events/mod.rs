//! Lifecycle events.
//!
//! Actions dispatch a [`SessionEvent`] for every state transition. With no
//! registered listeners dispatch is a no-op. Token reuse is reported here as
//! [`SessionEvent::TokenReuseDetected`]; register a listener to forward it to
//! a security log or alerting pipeline.
//!
//! ```rust,ignore
//! use warden::register_event_listeners;
//! use warden::events::listeners::LoggingListener;
//!
//! register_event_listeners(|registry| {
//!     registry.listen(LoggingListener::new());
//! });
//! ```
//!
//! Custom listeners implement [`Listener`]:
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use warden::events::{Listener, SessionEvent};
//!
//! struct ReuseAlarm;
//!
//! #[async_trait]
//! impl Listener for ReuseAlarm {
//!     async fn handle(&self, event: &SessionEvent) {
//!         if let SessionEvent::TokenReuseDetected { session_id, .. } = event {
//!             // page the on-call
//!         }
//!     }
//! }
//! ```

mod event;
mod listener;
mod registry;

pub mod listeners;

pub use event::SessionEvent;
pub use listener::Listener;
pub use registry::{EventRegistry, dispatch, register_event_listeners};

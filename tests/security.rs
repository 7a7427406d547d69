//! Security properties of the session lifecycle: token tampering, refresh
//! token replay, concurrent rotation and reclamation.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::{Mutex, Once};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use warden::actions::RefreshAction;
use warden::events::{Listener, SessionEvent};
use warden::store::UserId;
use warden::{
    AuthError, ExpirySweeper, InMemoryLeaseStore, InMemorySessionStore, RefreshGuard, Session,
    SessionManager, SessionMutation, SessionStatus, SessionStore, StoreError, TokenCodec,
    TokenConfig, WardenConfig, register_event_listeners,
};

const SECRET: &str = "security-suite-secret-at-least-32-bytes";

static CAPTURED: Mutex<Vec<SessionEvent>> = Mutex::new(Vec::new());
static REGISTER: Once = Once::new();

struct CaptureListener;

#[async_trait]
impl Listener for CaptureListener {
    async fn handle(&self, event: &SessionEvent) {
        CAPTURED.lock().unwrap().push(event.clone());
    }
}

fn capture_events() {
    REGISTER.call_once(|| {
        register_event_listeners(|registry| {
            registry.listen(CaptureListener);
        });
    });
}

fn captured_for(session_id: &str) -> Vec<SessionEvent> {
    CAPTURED
        .lock()
        .unwrap()
        .iter()
        .filter(|event| match event {
            SessionEvent::SessionCreated { session_id: id, .. }
            | SessionEvent::SessionRefreshed { session_id: id, .. }
            | SessionEvent::SessionRevoked { session_id: id, .. }
            | SessionEvent::TokenReuseDetected { session_id: id, .. } => id == session_id,
            _ => false,
        })
        .cloned()
        .collect()
}

fn codec() -> TokenCodec {
    TokenCodec::new(TokenConfig::new(SECRET).unwrap())
}

fn manager() -> SessionManager<InMemorySessionStore, InMemoryLeaseStore> {
    SessionManager::new(
        InMemorySessionStore::new(),
        InMemoryLeaseStore::new(),
        codec(),
        WardenConfig::default(),
    )
    .unwrap()
}

/// Delays every compare-and-swap so concurrent refreshes overlap.
#[derive(Clone)]
struct SlowCasStore {
    inner: InMemorySessionStore,
    delay: StdDuration,
}

#[async_trait]
impl SessionStore for SlowCasStore {
    async fn create(&self, session: Session) -> Result<(), StoreError> {
        self.inner.create(session).await
    }

    async fn get(&self, session_id: &str) -> Result<Session, StoreError> {
        self.inner.get(session_id).await
    }

    async fn compare_and_swap(
        &self,
        session_id: &str,
        expected_version: u64,
        mutation: SessionMutation,
    ) -> Result<Session, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner
            .compare_and_swap(session_id, expected_version, mutation)
            .await
    }

    async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.inner.delete_expired_before(cutoff).await
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Session>, StoreError> {
        self.inner.list_for_user(user_id).await
    }
}

#[tokio::test]
async fn test_refresh_token_reuse_revokes_and_reports() {
    capture_events();
    let manager = manager();

    let issued = manager.login(42, None, None).await.unwrap();
    let session_id = issued.session.session_id.clone();
    let stolen = issued.tokens.refresh_token.expose_secret().to_owned();

    let legit = manager.refresh(&stolen, None, None).await.unwrap();
    let attack = manager.refresh(&stolen, Some("203.0.113.66"), None).await;
    assert_eq!(attack.unwrap_err(), AuthError::TokenReuseDetected);

    let session = manager.store().get(&session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Revoked);

    // the legitimate holder is locked out too and must log in again
    let result = manager
        .refresh(legit.tokens.refresh_token.expose_secret(), None, None)
        .await;
    assert_eq!(result.unwrap_err(), AuthError::SessionInvalid);

    let events = captured_for(&session_id);
    let reuse = events
        .iter()
        .find(|event| event.is_security_event())
        .expect("reuse event");
    match reuse {
        SessionEvent::TokenReuseDetected {
            user_id,
            presented_version,
            current_version,
            client_ip,
            ..
        } => {
            assert_eq!(*user_id, 42);
            assert_eq!(*presented_version, 0);
            assert_eq!(*current_version, 1);
            assert_eq!(client_ip.as_deref(), Some("203.0.113.66"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(
        events
            .iter()
            .any(|event| matches!(event, SessionEvent::SessionCreated { .. }))
    );
}

#[tokio::test]
async fn test_single_bit_flip_is_rejected() {
    let codec = codec();
    let manager = manager();
    let issued = manager.login(1, None, None).await.unwrap();

    for token in [
        issued.tokens.access_token.expose_secret(),
        issued.tokens.refresh_token.expose_secret(),
    ] {
        let bytes = token.as_bytes();
        for i in 0..bytes.len() {
            let mut tampered = bytes.to_vec();
            tampered[i] ^= 1;
            let tampered = String::from_utf8(tampered).unwrap();

            let result = codec.decode(&tampered);
            assert_eq!(
                result.unwrap_err(),
                AuthError::InvalidSignature,
                "bit flip at byte {i} was accepted"
            );
        }
    }
}

#[tokio::test]
async fn test_foreign_key_tokens_rejected() {
    let other = TokenCodec::new(TokenConfig::new("a-completely-different-signing-secret").unwrap());
    let manager = manager();
    let issued = manager.login(1, None, None).await.unwrap();

    assert_eq!(
        other
            .decode(issued.tokens.access_token.expose_secret())
            .unwrap_err(),
        AuthError::InvalidSignature
    );
    let forged = manager
        .refresh(
            &other
                .issue(
                    warden::TokenKind::Refresh,
                    &issued.session.session_id,
                    1,
                    0,
                    Duration::hours(1),
                )
                .unwrap(),
            None,
            None,
        )
        .await;
    assert_eq!(forged.unwrap_err(), AuthError::InvalidSignature);
}

#[tokio::test]
async fn test_concurrent_refresh_has_single_winner() {
    let store = SlowCasStore {
        inner: InMemorySessionStore::new(),
        delay: StdDuration::from_millis(50),
    };
    let manager = SessionManager::new(
        store.clone(),
        InMemoryLeaseStore::new(),
        codec(),
        WardenConfig::default(),
    )
    .unwrap();

    let issued = manager.login(5, None, None).await.unwrap();
    let token = issued.tokens.refresh_token.expose_secret();

    let (a, b) = tokio::join!(
        manager.refresh(token, None, None),
        manager.refresh(token, None, None)
    );

    let (winner, loser) = match (a, b) {
        (Ok(w), Err(l)) | (Err(l), Ok(w)) => (w, l),
        other => panic!("expected exactly one winner, got {other:?}"),
    };
    assert_eq!(loser, AuthError::RefreshInProgress);
    assert_eq!(winner.session.refresh_token_version, 1);

    let session = store.get(&issued.session.session_id).await.unwrap();
    assert!(session.is_active());
    assert_eq!(session.refresh_token_version, 1);
}

#[tokio::test]
async fn test_cas_catches_refresh_that_bypassed_the_lease() {
    let store = SlowCasStore {
        inner: InMemorySessionStore::new(),
        delay: StdDuration::from_millis(50),
    };
    let manager = SessionManager::new(
        store.clone(),
        InMemoryLeaseStore::new(),
        codec(),
        WardenConfig::default(),
    )
    .unwrap();
    let issued = manager.login(5, None, None).await.unwrap();
    let token = issued.tokens.refresh_token.expose_secret();

    // two instances that do not share a lease store
    let lease_ttl = Duration::seconds(10);
    let first = RefreshAction::new(
        store.clone(),
        RefreshGuard::new(InMemoryLeaseStore::new(), lease_ttl),
        codec(),
        WardenConfig::default(),
    );
    let second = RefreshAction::new(
        store.clone(),
        RefreshGuard::new(InMemoryLeaseStore::new(), lease_ttl),
        codec(),
        WardenConfig::default(),
    );

    let (a, b) = tokio::join!(
        first.execute(token, None, None),
        second.execute(token, None, None)
    );

    let loser = match (a, b) {
        (Ok(_), Err(l)) | (Err(l), Ok(_)) => l,
        other => panic!("expected exactly one winner, got {other:?}"),
    };
    assert_eq!(loser, AuthError::ConcurrentModification);

    // a lost race is not reuse; the session survives
    let session = store.get(&issued.session.session_id).await.unwrap();
    assert!(session.is_active());
    assert_eq!(session.refresh_token_version, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_refresh_does_not_block_the_session() {
    let store = SlowCasStore {
        inner: InMemorySessionStore::new(),
        delay: StdDuration::from_millis(200),
    };
    let leases = InMemoryLeaseStore::new();
    let manager = SessionManager::new(
        store.clone(),
        leases.clone(),
        codec(),
        WardenConfig::default(),
    )
    .unwrap();

    let issued = manager.login(8, None, None).await.unwrap();
    let token = issued.tokens.refresh_token.expose_secret();

    // the caller gives up while the rotation is waiting on the store
    let abandoned =
        tokio::time::timeout(StdDuration::from_millis(20), manager.refresh(token, None, None))
            .await;
    assert!(abandoned.is_err());

    // let the lease released on drop go through
    tokio::time::sleep(StdDuration::from_millis(1)).await;
    assert!(leases.is_empty());

    let session = store.get(&issued.session.session_id).await.unwrap();
    assert_eq!(session.refresh_token_version, 0);

    let retried = manager.refresh(token, None, None).await.unwrap();
    assert_eq!(retried.session.refresh_token_version, 1);
}

#[tokio::test]
async fn test_sweeper_never_deletes_refreshable_sessions() {
    let store = InMemorySessionStore::new();
    let leases = InMemoryLeaseStore::new();
    let now = Utc::now();

    let offsets = [-120, -1, 60, 3600, 86_400];
    for (i, secs) in offsets.iter().enumerate() {
        let refresh_expires_at = now + Duration::seconds(*secs);
        store
            .create(Session::new(
                format!("s-{i}"),
                1,
                None,
                None,
                now - Duration::days(1),
                refresh_expires_at.min(now),
                refresh_expires_at,
            ))
            .await
            .unwrap();
    }

    let report = ExpirySweeper::new(store.clone(), leases, StdDuration::from_secs(60))
        .sweep_once()
        .await
        .unwrap();
    assert_eq!(report.sessions, 2);

    let swept_at = Utc::now();
    for (i, secs) in offsets.iter().enumerate() {
        let kept = store.get(&format!("s-{i}")).await.is_ok();
        if now + Duration::seconds(*secs) >= swept_at {
            assert!(kept, "session s-{i} deleted while refreshable");
        }
    }
}

use chrono::Utc;
use serde::Serialize;

use super::store_failure;
use crate::store::{SessionInfo, SessionStore, UserId};
use crate::AuthError;

/// Page size used when the caller passes `0`.
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// One page of a user's sessions, most recently active first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionPage {
    pub sessions: Vec<SessionInfo>,
    /// Zero-based page index.
    pub page: usize,
    pub per_page: usize,
    /// Usable sessions across all pages.
    pub total: usize,
}

impl SessionPage {
    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.per_page)
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages()
    }
}

/// Lists a user's usable sessions: `Active` with an open refresh window.
pub struct ListSessionsAction<S: SessionStore> {
    store: S,
}

impl<S: SessionStore> ListSessionsAction<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// All usable sessions, most recently active first.
    pub async fn execute(&self, user_id: UserId) -> Result<Vec<SessionInfo>, AuthError> {
        let now = Utc::now();
        let sessions = self
            .store
            .list_for_user(user_id)
            .await
            .map_err(|e| store_failure("list_for_user", "-", e))?;

        let mut usable: Vec<SessionInfo> = sessions
            .iter()
            .filter(|s| s.is_active() && !s.is_refresh_expired_at(now))
            .map(SessionInfo::from)
            .collect();
        usable.sort_by(|a, b| {
            b.last_activity_at
                .cmp(&a.last_activity_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });

        Ok(usable)
    }

    /// Page `page` (zero-based) of [`execute`](Self::execute).
    ///
    /// `per_page` of `0` means [`DEFAULT_PAGE_SIZE`]; larger values are capped
    /// at [`MAX_PAGE_SIZE`]. A page past the end is empty.
    pub async fn execute_page(
        &self,
        user_id: UserId,
        page: usize,
        per_page: usize,
    ) -> Result<SessionPage, AuthError> {
        let per_page = match per_page {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };

        let usable = self.execute(user_id).await?;
        let total = usable.len();
        let sessions = usable
            .into_iter()
            .skip(page.saturating_mul(per_page))
            .take(per_page)
            .collect();

        Ok(SessionPage {
            sessions,
            page,
            per_page,
            total,
        })
    }
}

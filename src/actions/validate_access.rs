use crate::token::{TokenClaims, TokenCodec, TokenKind};
use crate::AuthError;

/// Stateless access-token check.
///
/// Consults no store: a revoked session's access tokens remain valid until
/// they expire. Keep the access TTL short accordingly.
pub struct ValidateAccessAction {
    codec: TokenCodec,
}

impl ValidateAccessAction {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "validate_access", skip_all, err)
    )]
    pub fn execute(&self, access_token: &str) -> Result<TokenClaims, AuthError> {
        self.codec.verify(access_token, TokenKind::Access)
    }
}

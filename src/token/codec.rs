use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;

use super::{TokenClaims, TokenConfig, TokenKind};
use crate::config::expires_after;
use crate::crypto::{JTI_LENGTH, generate_token};
use crate::store::UserId;
use crate::{AuthError, SecretString};

/// An access token and a refresh token bound to the same session version.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl TokenPair {
    /// Seconds until the access token expires, clamped at zero.
    pub fn expires_in(&self) -> i64 {
        (self.access_expires_at - Utc::now()).num_seconds().max(0)
    }

    /// Seconds until the refresh token expires, clamped at zero.
    pub fn refresh_expires_in(&self) -> i64 {
        (self.refresh_expires_at - Utc::now()).num_seconds().max(0)
    }
}

/// Encodes and verifies session tokens. Stateless and cheap to clone.
#[derive(Clone)]
pub struct TokenCodec {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(config: TokenConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        let encoding_key = EncodingKey::from_secret(secret);
        let decoding_key = DecodingKey::from_secret(secret);

        let mut validation = Validation::new(Algorithm::HS256);
        // `exp < now` is expired, no grace period
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(ref iss) = config.issuer {
            validation.set_issuer(&[iss]);
        }
        if let Some(ref aud) = config.audience {
            validation.set_audience(&[aud]);
        }

        Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Issues a token of `kind` that expires at `now + ttl`.
    pub fn issue(
        &self,
        kind: TokenKind,
        session_id: &str,
        user_id: UserId,
        version: u64,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let expires_at = expires_after(now, ttl)?;
        self.issue_at(kind, session_id, user_id, version, now, expires_at)
    }

    /// Issues a token with explicit timestamps, so that the token's `exp`
    /// matches the expiry recorded on the session.
    pub fn issue_at(
        &self,
        kind: TokenKind,
        session_id: &str,
        user_id: UserId,
        version: u64,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = TokenClaims {
            kind,
            sid: session_id.to_owned(),
            sub: user_id.to_string(),
            ver: version,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: generate_token(JTI_LENGTH),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::ConfigurationError(format!("token encoding failed: {e}")))
    }

    /// Issues an access and a refresh token for the same session version.
    pub fn issue_pair(
        &self,
        session_id: &str,
        user_id: UserId,
        version: u64,
        issued_at: DateTime<Utc>,
        access_expires_at: DateTime<Utc>,
        refresh_expires_at: DateTime<Utc>,
    ) -> Result<TokenPair, AuthError> {
        let access_token = self.issue_at(
            TokenKind::Access,
            session_id,
            user_id,
            version,
            issued_at,
            access_expires_at,
        )?;
        let refresh_token = self.issue_at(
            TokenKind::Refresh,
            session_id,
            user_id,
            version,
            issued_at,
            refresh_expires_at,
        )?;

        Ok(TokenPair {
            access_token: SecretString::new(access_token),
            refresh_token: SecretString::new(refresh_token),
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Verifies signature, expiry and kind, returning the claims.
    ///
    /// Errors are `Expired` when `exp` has passed, `KindMismatch` when the
    /// token is of the other kind, and `InvalidSignature` for anything else
    /// (bad signature, malformed token, foreign issuer or audience).
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<TokenClaims, AuthError> {
        let claims = self.decode(token)?;

        if claims.kind != expected {
            return Err(AuthError::KindMismatch);
        }

        Ok(claims)
    }

    /// Verifies signature and expiry without checking the kind.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidSignature,
            })?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-32-bytes-long-key-01";

    fn codec() -> TokenCodec {
        TokenCodec::new(TokenConfig::new(SECRET).unwrap())
    }

    #[test]
    fn test_issue_verify_round_trip() {
        let codec = codec();
        let token = codec
            .issue(TokenKind::Access, "sess-1", 42, 5, Duration::minutes(15))
            .unwrap();

        let claims = codec.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.sid, "sess-1");
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.ver, 5);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_kind_mismatch() {
        let codec = codec();
        let token = codec
            .issue(TokenKind::Access, "sess-1", 42, 0, Duration::minutes(15))
            .unwrap();

        assert_eq!(
            codec.verify(&token, TokenKind::Refresh),
            Err(AuthError::KindMismatch)
        );
    }

    #[test]
    fn test_expired_token() {
        let codec = codec();
        let token = codec
            .issue(TokenKind::Refresh, "sess-1", 42, 0, Duration::seconds(-30))
            .unwrap();

        assert_eq!(
            codec.verify(&token, TokenKind::Refresh),
            Err(AuthError::Expired)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let other = TokenCodec::new(TokenConfig::new("test-secret-32-bytes-long-key-02").unwrap());
        let token = codec()
            .issue(TokenKind::Access, "sess-1", 42, 0, Duration::minutes(1))
            .unwrap();

        assert_eq!(
            other.verify(&token, TokenKind::Access),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_garbage_token() {
        assert_eq!(
            codec().verify("not-a-token", TokenKind::Access),
            Err(AuthError::InvalidSignature)
        );
        assert_eq!(
            codec().verify("", TokenKind::Access),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_forged_with_none_algorithm() {
        let codec = codec();
        let token = codec
            .issue(TokenKind::Access, "sess-1", 42, 0, Duration::minutes(1))
            .unwrap();
        let payload = token.split('.').nth(1).unwrap();
        // {"alg":"none","typ":"JWT"}
        let forged = format!("eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.{payload}.");

        assert_eq!(
            codec.verify(&forged, TokenKind::Access),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_issuer_and_audience() {
        let config = TokenConfig::new(SECRET)
            .unwrap()
            .with_issuer("warden")
            .with_audience("gateway");
        let codec = TokenCodec::new(config);

        let token = codec
            .issue(TokenKind::Access, "sess-1", 1, 0, Duration::minutes(1))
            .unwrap();
        let claims = codec.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.iss.as_deref(), Some("warden"));
        assert_eq!(claims.aud.as_deref(), Some("gateway"));

        let other_audience = TokenCodec::new(
            TokenConfig::new(SECRET)
                .unwrap()
                .with_issuer("warden")
                .with_audience("billing"),
        );
        assert_eq!(
            other_audience.verify(&token, TokenKind::Access),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_pair_shares_version_and_unique_jti() {
        let codec = codec();
        let now = Utc::now();
        let pair = codec
            .issue_pair(
                "sess-1",
                9,
                4,
                now,
                now + Duration::minutes(15),
                now + Duration::days(7),
            )
            .unwrap();

        let access = codec
            .verify(pair.access_token.expose_secret(), TokenKind::Access)
            .unwrap();
        let refresh = codec
            .verify(pair.refresh_token.expose_secret(), TokenKind::Refresh)
            .unwrap();

        assert_eq!(access.ver, 4);
        assert_eq!(refresh.ver, 4);
        assert_eq!(access.sid, refresh.sid);
        assert_ne!(access.jti, refresh.jti);
        assert!(access.exp <= refresh.exp);
        assert!(pair.expires_in() > 0);
        assert!(pair.refresh_expires_in() > pair.expires_in());
    }

    #[test]
    fn test_issue_rejects_ttl_past_timestamp_range() {
        let result = codec().issue(TokenKind::Access, "sess-1", 42, 0, Duration::MAX);
        assert!(matches!(result, Err(AuthError::ConfigurationError(_))));
    }
}

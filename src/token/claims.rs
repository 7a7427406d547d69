use serde::{Deserialize, Serialize};

use crate::AuthError;
use crate::store::UserId;

/// Kind of session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived credential authorizing individual requests.
    Access,
    /// Long-lived credential used only to obtain a new pair.
    Refresh,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Claims embedded in every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Token kind.
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// Session id.
    pub sid: String,
    /// Subject - the user id.
    pub sub: String,
    /// Refresh-token version of the session at issuance.
    pub ver: u64,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

impl TokenClaims {
    /// Returns the user id from the `sub` claim.
    pub fn user_id(&self) -> Result<UserId, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidSignature)
    }

    pub fn session_id(&self) -> &str {
        &self.sid
    }

    pub fn version(&self) -> u64 {
        self.ver
    }

    pub fn is_access_token(&self) -> bool {
        self.kind == TokenKind::Access
    }

    pub fn is_refresh_token(&self) -> bool {
        self.kind == TokenKind::Refresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str) -> TokenClaims {
        TokenClaims {
            kind: TokenKind::Refresh,
            sid: "s-1".to_owned(),
            sub: sub.to_owned(),
            ver: 2,
            iat: 0,
            exp: 60,
            jti: "j".to_owned(),
            iss: None,
            aud: None,
        }
    }

    #[test]
    fn test_kind_serializes_as_typ() {
        let json = serde_json::to_value(claims("7")).unwrap();
        assert_eq!(json["typ"], "refresh");
        assert!(json.get("iss").is_none());
    }

    #[test]
    fn test_user_id_parse() {
        assert_eq!(claims("7").user_id().unwrap(), 7);
        assert_eq!(claims("x").user_id(), Err(AuthError::InvalidSignature));
    }
}

//! Signed, time-bounded session tokens.
//!
//! Tokens are HS256 JWTs carrying the session id, the owning user, and the
//! session's refresh-token version at issuance. Verification is purely
//! cryptographic and never touches a store, so the gateway can reject forged
//! or expired access tokens without a round trip.
//!
//! # Example
//!
//! ```rust
//! use chrono::Duration;
//! use warden::token::{TokenCodec, TokenConfig, TokenKind};
//!
//! let codec = TokenCodec::new(TokenConfig::new("0123456789abcdef0123456789abcdef").unwrap());
//! let token = codec
//!     .issue(TokenKind::Refresh, "session-1", 42, 3, Duration::days(7))
//!     .unwrap();
//!
//! let claims = codec.verify(&token, TokenKind::Refresh).unwrap();
//! assert_eq!(claims.sid, "session-1");
//! assert_eq!(claims.user_id().unwrap(), 42);
//! assert_eq!(claims.ver, 3);
//! ```

mod claims;
mod codec;
mod config;

pub use claims::{TokenClaims, TokenKind};
pub use codec::{TokenCodec, TokenPair};
pub use config::{MIN_SECRET_LENGTH, TokenConfig};

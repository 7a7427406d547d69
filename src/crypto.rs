//! Random identifiers.
//!
//! Session ids are UUIDv4 strings. Lease holder tokens and JWT ids are
//! alphanumeric strings drawn from the thread-local CSPRNG.

use rand::Rng;
use uuid::Uuid;

/// Length of lease holder tokens.
pub const LEASE_TOKEN_LENGTH: usize = 32;

/// Length of the `jti` claim.
pub const JTI_LENGTH: usize = 16;

/// Generates a random alphanumeric string of `length` characters.
///
/// ```rust
/// use warden::crypto::generate_token;
///
/// let token = generate_token(24);
/// assert_eq!(token.len(), 24);
/// ```
pub fn generate_token(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(rng.sample(rand::distributions::Alphanumeric)))
        .collect()
}

/// Generates a fresh session id. Ids are never reused.
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

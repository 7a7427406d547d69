use std::fmt;

use crate::{AuthError, SecretString};

/// Minimum length of the HS256 signing secret in bytes.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Signing configuration for [`TokenCodec`](super::TokenCodec).
///
/// Token lifetimes are not part of this struct; they come from
/// [`WardenConfig`](crate::WardenConfig) and are passed per issuance.
#[derive(Clone)]
pub struct TokenConfig {
    pub(crate) secret: SecretString,
    pub(crate) issuer: Option<String>,
    pub(crate) audience: Option<String>,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &self.secret)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

impl TokenConfig {
    /// Creates a configuration with the given signing secret.
    ///
    /// # Errors
    /// Returns `AuthError::ConfigurationError` if the secret is shorter than
    /// [`MIN_SECRET_LENGTH`] bytes.
    pub fn new(secret: impl Into<SecretString>) -> Result<Self, AuthError> {
        let secret = secret.into();

        if secret.len() < MIN_SECRET_LENGTH {
            return Err(AuthError::ConfigurationError(format!(
                "token secret must be at least {MIN_SECRET_LENGTH} bytes, got {}",
                secret.len()
            )));
        }

        Ok(Self {
            secret,
            issuer: None,
            audience: None,
        })
    }

    /// Sets the `iss` claim; tokens from other issuers are rejected.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Sets the `aud` claim; tokens for other audiences are rejected.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }
}

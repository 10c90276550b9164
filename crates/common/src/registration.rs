//! CI-platform side of the runner lifecycle
//!
//! The reconciler only talks to the CI platform through [`RegistrationGateway`], so the
//! GitHub client can be swapped for a fake in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::Result;
use crate::label::RunnerLabel;

/// Short-lived, single-use runner registration credential.
///
/// Deliberately has no `Display` impl and a redacted `Debug` impl so it cannot end up in a
/// log line by accident. Reading the secret consumes the token.
pub struct RegistrationToken {
    secret: String,
    expires_at: Option<DateTime<Utc>>,
}

impl RegistrationToken {
    pub fn new(secret: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the platform-reported expiry has passed
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }

    /// Consume the token and hand out the secret
    pub fn into_secret(self) -> String {
        self.secret
    }
}

impl fmt::Debug for RegistrationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Operations the reconciler needs from the CI platform.
#[async_trait]
pub trait RegistrationGateway: Send + Sync {
    /// Issue a fresh registration token. Fails with `Authorization` when the credential
    /// lacks rights.
    async fn issue_registration_token(&self) -> Result<RegistrationToken>;

    /// Single check: is a runner carrying `label` reporting online right now?
    async fn runner_online(&self, label: &RunnerLabel) -> Result<bool>;

    /// Remove every runner carrying `label`. A runner that is already gone is not an error.
    async fn remove_runner(&self, label: &RunnerLabel) -> Result<()>;

    /// URL the agent registers against, e.g. `https://github.com/owner/repo`
    fn registration_url(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_token_debug_is_redacted() {
        let token = RegistrationToken::new("AABBCCDDEEFF", None);
        let debug = format!("{:?}", token);
        assert!(!debug.contains("AABBCCDDEEFF"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_token_expiry() {
        let past = RegistrationToken::new("t", Some(Utc::now() - Duration::minutes(1)));
        let future = RegistrationToken::new("t", Some(Utc::now() + Duration::hours(1)));
        let unknown = RegistrationToken::new("t", None);

        assert!(past.is_expired());
        assert!(!future.is_expired());
        assert!(!unknown.is_expired());
    }
}

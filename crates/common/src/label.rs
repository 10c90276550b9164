//! Runner label generation
//!
//! A label ties a cloud instance to the runner registration it produces. It names the
//! instance, is attached to the runner as a label, and is the key used to check whether
//! the runner came online. It is not a credential, so a non-cryptographic RNG is enough.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by every generated label
pub const LABEL_PREFIX: &str = "actions-";

/// Number of random characters after the prefix
pub const LABEL_SUFFIX_LEN: usize = 8;

const LABEL_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Correlation key between a cloud instance and a runner registration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunnerLabel(String);

impl RunnerLabel {
    /// Generate a fresh label, e.g. `actions-k3v9q0xa`
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..LABEL_SUFFIX_LEN)
            .map(|_| LABEL_CHARSET[rng.gen_range(0..LABEL_CHARSET.len())] as char)
            .collect();

        Self(format!("{}{}", LABEL_PREFIX, suffix))
    }

    /// Wrap a label supplied by the caller (stop path)
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunnerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RunnerLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
